//! The Vitis HLS backend, derived from Vivado.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::build::{run_hls_build, BuildOptions, BuildReport, BuildRequest, ReportParser};
use super::passes::{layer_templates, FifoDepthOptimization};
use super::validate::vitis_validators;
use super::vivado::VivadoBackend;
use super::writer::{HlsWriter, MakeStamp, WriterFlavor};
use super::Backend;
use crate::context::BuildContext;
use crate::core::StageId;
use crate::errors::{ActionError, FlowError};
use crate::pipeline::{FlowComposer, Insertion, StageRegistry};
use crate::stages::{SharedAction, StageActions};
use crate::tools::ToolRunner;

/// Scope of the Vitis flows.
pub const VITIS_SCOPE: &str = "vitis";

const HLS_TOOL: &str = "vitis_hls";

/// Layer classes with Vitis-specific templates.
const TEMPLATE_CLASSES: &[&str] = &["Conv1D", "Conv2D"];

/// HLS backend for Vitis, built on top of [`VivadoBackend`]'s flows.
#[derive(Debug, Clone)]
pub struct VitisBackend {
    validation: StageId,
    apply_templates: StageId,
    ip: StageId,
    write: StageId,
    fifo_depth_optimization: StageId,
}

impl VitisBackend {
    /// Registers the Vitis flows on top of an already registered Vivado backend.
    ///
    /// `vitis:ip` is `vivado:ip` with `vitis:validation` inserted before
    /// `vivado:init_layers` and `vitis:apply_templates` inserted before
    /// `vivado:apply_templates`. The Vivado flows are not modified.
    ///
    /// # Errors
    ///
    /// Returns any registration or composition error, e.g.
    /// [`FlowError::AnchorNotFound`] if the Vivado `ip` flow was overridden
    /// without its anchors.
    pub fn register(registry: &StageRegistry, vivado: &VivadoBackend) -> Result<Self, FlowError> {
        let table = registry.actions();
        let validators = vitis_validators();
        let validator_names: Vec<String> = validators.iter().map(|v| v.name().to_string()).collect();
        for action in validators {
            table.register(action);
        }
        let named: [SharedAction; 3] = [
            Arc::new(MakeStamp),
            Arc::new(HlsWriter::new(WriterFlavor::Vitis)),
            Arc::new(FifoDepthOptimization::new(VITIS_SCOPE)),
        ];
        for action in named {
            table.register(action);
        }

        let flow = |local: &str| StageId::new(VITIS_SCOPE, local);

        let validation = registry.register_named(
            flow("validation")?,
            validator_names.as_slice(),
            vec![vivado.init_layers().clone()],
        )?;
        let apply_templates = registry.register(
            flow("apply_templates")?,
            StageActions::deferred(|| layer_templates(VITIS_SCOPE, TEMPLATE_CLASSES)),
            vec![vivado.init_layers().clone()],
        )?;

        let composer = FlowComposer::new(registry);
        let ip = composer.derive(
            flow("ip")?,
            vivado.ip(),
            &[
                Insertion::before(vivado.init_layers().clone(), validation.clone()),
                Insertion::before(vivado.apply_templates().clone(), apply_templates.clone()),
            ],
            StageActions::None,
        )?;

        let write = registry.register_named(
            flow("write")?,
            &[MakeStamp::NAME, "vitis:write_hls"],
            vec![ip.clone()],
        )?;

        let fifo_id = flow("fifo_depth_optimization")?;
        let head = table.resolve(&fifo_id, &["vitis:fifo_depth_optimization"])?;
        let fifo_actions = composer.append_flow_actions(head, &write)?;
        let fifo_depth_optimization = registry.register(fifo_id, fifo_actions, vec![ip.clone()])?;

        info!(
            backend = VITIS_SCOPE,
            base = vivado.ip().scope(),
            flows = registry.flows_in_scope(VITIS_SCOPE).len(),
            "Registered backend"
        );

        Ok(Self {
            validation,
            apply_templates,
            ip,
            write,
            fifo_depth_optimization,
        })
    }

    /// `vitis:validation`.
    #[must_use]
    pub fn validation(&self) -> &StageId {
        &self.validation
    }

    /// `vitis:apply_templates`.
    #[must_use]
    pub fn apply_templates(&self) -> &StageId {
        &self.apply_templates
    }

    /// `vitis:ip`.
    #[must_use]
    pub fn ip(&self) -> &StageId {
        &self.ip
    }

    /// `vitis:write`.
    #[must_use]
    pub fn write(&self) -> &StageId {
        &self.write
    }

    /// `vitis:fifo_depth_optimization`.
    #[must_use]
    pub fn fifo_depth_optimization(&self) -> &StageId {
        &self.fifo_depth_optimization
    }
}

#[async_trait]
impl Backend for VitisBackend {
    fn name(&self) -> &str {
        VITIS_SCOPE
    }

    fn default_flow(&self) -> &StageId {
        &self.ip
    }

    fn writer_flow(&self) -> &StageId {
        &self.write
    }

    async fn build(
        &self,
        ctx: &BuildContext,
        options: &BuildOptions,
        tools: &dyn ToolRunner,
        reports: &dyn ReportParser,
    ) -> Result<BuildReport, ActionError> {
        let request = BuildRequest {
            hls_tool: HLS_TOOL,
            output_dir: ctx.output_dir(),
            project: ctx.project_name(),
            accelerator: &ctx.config().accelerator,
            options,
        };
        run_hls_build(request, tools, reports).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn registered() -> (StageRegistry, VivadoBackend, VitisBackend) {
        let registry = StageRegistry::new();
        let vivado = VivadoBackend::register(&registry).unwrap();
        let vitis = VitisBackend::register(&registry, &vivado).unwrap();
        (registry, vivado, vitis)
    }

    fn qualified(ids: &[StageId]) -> Vec<String> {
        ids.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_ip_requires_inserted_at_anchors() {
        let (registry, _, vitis) = registered();
        let ip = registry.lookup(vitis.ip()).unwrap();

        assert_eq!(
            qualified(ip.requires()),
            vec![
                "model:optimize",
                "vitis:validation",
                "vivado:init_layers",
                "vivado:streaming",
                "vivado:optimize",
                "vivado:specific_types",
                "vitis:apply_templates",
                "vivado:apply_templates",
            ]
        );
    }

    #[test]
    fn test_vivado_ip_untouched() {
        let (registry, vivado, _) = registered();
        let ip = registry.lookup(vivado.ip()).unwrap();
        assert_eq!(ip.requires().len(), 6);
        assert!(!qualified(ip.requires()).iter().any(|id| id.starts_with("vitis:")));
    }

    #[test]
    fn test_vitis_write_uses_vitis_writer() {
        let (registry, _, vitis) = registered();
        let write = registry.lookup(vitis.write()).unwrap();
        let names: Vec<String> = write
            .actions()
            .materialize()
            .unwrap()
            .iter()
            .map(|a| a.name().to_string())
            .collect();
        assert_eq!(names, vec!["make_stamp", "vitis:write_hls"]);
    }

    #[test]
    fn test_missing_anchor_fails() {
        let registry = StageRegistry::new();
        let vivado = VivadoBackend::register(&registry).unwrap();
        // Override vivado:ip without the init_layers anchor.
        registry
            .register(vivado.ip().clone(), StageActions::None, vec![vivado.model().optimize.clone()])
            .unwrap();

        let err = VitisBackend::register(&registry, &vivado).unwrap_err();
        assert!(matches!(err, FlowError::AnchorNotFound(_)));
    }
}
