//! A registry bundled with its backends.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use super::build::{BuildOptions, BuildReport, ReportParser};
use super::vitis::VitisBackend;
use super::vivado::VivadoBackend;
use super::Backend;
use crate::config::RegistryConfig;
use crate::context::BuildContext;
use crate::errors::FlowError;
use crate::pipeline::{PipelineRunner, RunOutcome, StageRegistry};
use crate::tools::ToolRunner;

/// One build session: a registry, the backends registered into it, and
/// the runner that executes their flows.
#[derive(Debug, Default)]
pub struct BuildSession {
    registry: StageRegistry,
    backends: BTreeMap<String, Arc<dyn Backend>>,
    runner: PipelineRunner,
}

impl BuildSession {
    /// Creates a session with an empty registry.
    #[must_use]
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            registry: StageRegistry::with_config(config),
            ..Self::default()
        }
    }

    /// Creates a session with the Vivado and Vitis backends registered.
    ///
    /// # Errors
    ///
    /// Returns any backend registration error.
    pub fn with_default_backends() -> Result<Self, FlowError> {
        Self::with_default_backends_and_config(RegistryConfig::default())
    }

    /// Creates a session with the Vivado and Vitis backends registered into
    /// a registry built from `config`.
    ///
    /// # Errors
    ///
    /// Returns any backend registration error.
    pub fn with_default_backends_and_config(config: RegistryConfig) -> Result<Self, FlowError> {
        let mut session = Self::new(config);
        session.register_default_backends()?;
        Ok(session)
    }

    /// Registers the Vivado and Vitis backends into this session's registry.
    ///
    /// # Errors
    ///
    /// Returns any backend registration error, e.g. a conflict under
    /// [`OverridePolicy::Forbid`](crate::config::OverridePolicy::Forbid)
    /// when they are already registered.
    pub fn register_default_backends(&mut self) -> Result<(), FlowError> {
        let vivado = VivadoBackend::register(&self.registry)?;
        let vitis = VitisBackend::register(&self.registry, &vivado)?;
        self.add_backend(Arc::new(vivado));
        self.add_backend(Arc::new(vitis));
        Ok(())
    }

    /// Replaces the runner.
    #[must_use]
    pub fn with_runner(mut self, runner: PipelineRunner) -> Self {
        self.runner = runner;
        self
    }

    /// Returns the registry.
    #[must_use]
    pub fn registry(&self) -> &StageRegistry {
        &self.registry
    }

    /// Adds a backend whose flows are already registered.
    pub fn add_backend(&mut self, backend: Arc<dyn Backend>) {
        self.backends.insert(backend.name().to_string(), backend);
    }

    /// Lists the backend names.
    #[must_use]
    pub fn backend_names(&self) -> Vec<&str> {
        self.backends.keys().map(String::as_str).collect()
    }

    /// Gets a backend by name.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::UnknownBackend`] if none is registered under `name`.
    pub fn backend(&self, name: &str) -> Result<Arc<dyn Backend>, FlowError> {
        self.backends
            .get(name)
            .cloned()
            .ok_or_else(|| FlowError::UnknownBackend(name.to_string()))
    }

    /// Runs `backend:flow` against the context.
    ///
    /// # Errors
    ///
    /// Returns structural errors only. Action failures are in the outcome.
    pub async fn run_flow(
        &self,
        backend: &str,
        flow: &str,
        ctx: &mut BuildContext,
    ) -> Result<RunOutcome, FlowError> {
        let target = self.backend(backend)?.flow(flow)?;
        self.runner.run_target(&self.registry, &target, ctx).await
    }

    /// Runs the backend's writer flow.
    ///
    /// # Errors
    ///
    /// Returns structural errors only.
    pub async fn write(&self, backend: &str, ctx: &mut BuildContext) -> Result<RunOutcome, FlowError> {
        let target = self.backend(backend)?.writer_flow().clone();
        self.runner.run_target(&self.registry, &target, ctx).await
    }

    /// Builds a written project with the backend's toolchain.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::UnknownBackend`] or [`FlowError::Build`].
    pub async fn build(
        &self,
        backend: &str,
        ctx: &BuildContext,
        options: &BuildOptions,
        tools: &dyn ToolRunner,
        reports: &dyn ReportParser,
    ) -> Result<BuildReport, FlowError> {
        let backend = self.backend(backend)?;
        info!(backend = backend.name(), options = %options.tcl_args(), "Building project");
        Ok(backend.build(ctx, options, tools, reports).await?)
    }

    /// Clears every flow, action and backend.
    pub fn reset(&mut self) {
        self.registry.reset();
        self.backends.clear();
    }
}
