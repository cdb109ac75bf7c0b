//! The Vivado HLS backend.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use super::build::{run_hls_build, BuildOptions, BuildReport, BuildRequest, ReportParser};
use super::model::ModelFlows;
use super::passes::{
    init_layers, layer_templates, optimize_reuse, specific_types, streaming, FifoDepthOptimization,
};
use super::writer::{HlsWriter, MakeStamp, WriterFlavor};
use super::Backend;
use crate::context::BuildContext;
use crate::core::StageId;
use crate::errors::{ActionError, FlowError};
use crate::pipeline::{FlowComposer, StageRegistry};
use crate::stages::{SharedAction, StageActions};
use crate::tools::ToolRunner;

/// Scope of the Vivado flows.
pub const VIVADO_SCOPE: &str = "vivado";

const HLS_TOOL: &str = "vivado_hls";

const TEMPLATE_CLASSES: &[&str] = &[
    "Dense",
    "Conv1D",
    "Conv2D",
    "Activation",
    "BatchNormalization",
    "Pooling2D",
];

/// The base HLS backend.
#[derive(Debug, Clone)]
pub struct VivadoBackend {
    model: ModelFlows,
    init_layers: StageId,
    streaming: StageId,
    optimize: StageId,
    specific_types: StageId,
    apply_templates: StageId,
    ip: StageId,
    write: StageId,
    fifo_depth_optimization: StageId,
}

impl VivadoBackend {
    /// Registers the model flows and every Vivado flow.
    ///
    /// # Errors
    ///
    /// Returns any registration error.
    pub fn register(registry: &StageRegistry) -> Result<Self, FlowError> {
        let model = ModelFlows::register(registry)?;

        let table = registry.actions();
        let named: [SharedAction; 7] = [
            init_layers("vivado:init_layer_defaults"),
            streaming("vivado:set_stream_depths"),
            optimize_reuse("vivado:optimize_reuse"),
            specific_types("vivado:specific_types"),
            Arc::new(MakeStamp),
            Arc::new(HlsWriter::new(WriterFlavor::Vivado)),
            Arc::new(FifoDepthOptimization::new(VIVADO_SCOPE)),
        ];
        for action in named {
            table.register(action);
        }

        let flow = |local: &str| StageId::new(VIVADO_SCOPE, local);

        let init_layers = registry.register_named(
            flow("init_layers")?,
            &["vivado:init_layer_defaults"],
            vec![model.optimize.clone()],
        )?;
        let streaming = registry.register_named(
            flow("streaming")?,
            &["vivado:set_stream_depths"],
            vec![init_layers.clone()],
        )?;
        let optimize = registry.register_named(
            flow("optimize")?,
            &["vivado:optimize_reuse"],
            vec![init_layers.clone()],
        )?;
        let specific_types = registry.register_named(
            flow("specific_types")?,
            &["vivado:specific_types"],
            vec![init_layers.clone()],
        )?;
        let apply_templates = registry.register(
            flow("apply_templates")?,
            StageActions::deferred(|| layer_templates(VIVADO_SCOPE, TEMPLATE_CLASSES)),
            vec![init_layers.clone()],
        )?;

        let ip = registry.register(
            flow("ip")?,
            StageActions::None,
            vec![
                model.optimize.clone(),
                init_layers.clone(),
                streaming.clone(),
                optimize.clone(),
                specific_types.clone(),
                apply_templates.clone(),
            ],
        )?;

        let write = registry.register_named(
            flow("write")?,
            &[MakeStamp::NAME, "vivado:write_hls"],
            vec![ip.clone()],
        )?;

        let fifo_id = flow("fifo_depth_optimization")?;
        let head = table.resolve(&fifo_id, &["vivado:fifo_depth_optimization"])?;
        let fifo_actions = FlowComposer::new(registry).append_flow_actions(head, &write)?;
        let fifo_depth_optimization = registry.register(fifo_id, fifo_actions, vec![ip.clone()])?;

        info!(backend = VIVADO_SCOPE, flows = registry.flows_in_scope(VIVADO_SCOPE).len(), "Registered backend");

        Ok(Self {
            model,
            init_layers,
            streaming,
            optimize,
            specific_types,
            apply_templates,
            ip,
            write,
            fifo_depth_optimization,
        })
    }

    /// Model flows this backend builds on.
    #[must_use]
    pub fn model(&self) -> &ModelFlows {
        &self.model
    }

    /// `vivado:init_layers`.
    #[must_use]
    pub fn init_layers(&self) -> &StageId {
        &self.init_layers
    }

    /// `vivado:streaming`.
    #[must_use]
    pub fn streaming(&self) -> &StageId {
        &self.streaming
    }

    /// `vivado:optimize`.
    #[must_use]
    pub fn optimize(&self) -> &StageId {
        &self.optimize
    }

    /// `vivado:specific_types`.
    #[must_use]
    pub fn specific_types(&self) -> &StageId {
        &self.specific_types
    }

    /// `vivado:apply_templates`.
    #[must_use]
    pub fn apply_templates(&self) -> &StageId {
        &self.apply_templates
    }

    /// `vivado:ip`.
    #[must_use]
    pub fn ip(&self) -> &StageId {
        &self.ip
    }

    /// `vivado:write`.
    #[must_use]
    pub fn write(&self) -> &StageId {
        &self.write
    }

    /// `vivado:fifo_depth_optimization`.
    #[must_use]
    pub fn fifo_depth_optimization(&self) -> &StageId {
        &self.fifo_depth_optimization
    }
}

#[async_trait]
impl Backend for VivadoBackend {
    fn name(&self) -> &str {
        VIVADO_SCOPE
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
        let mut options = options.clone();
        if options.bitfile {
            warn!(backend = VIVADO_SCOPE, "Bitfile generation is not supported, skipping");
            options.bitfile = false;
        }

        let request = BuildRequest {
            hls_tool: HLS_TOOL,
            output_dir: ctx.output_dir(),
            project: ctx.project_name(),
            accelerator: &ctx.config().accelerator,
            options: &options,
        };
        run_hls_build(request, tools, reports).await
    }
}
