//! HLS backends.
//!
//! A backend registers its flows into a [`StageRegistry`](crate::pipeline::StageRegistry)
//! under its own scope. [`VivadoBackend`] is the base; [`VitisBackend`]
//! derives its `ip` flow from Vivado's by inserting its own stages at
//! anchors, and reuses Vivado's passes by id.

mod build;
mod model;
mod passes;
mod session;
mod validate;
mod vitis;
mod vivado;
mod writer;

pub use build::{run_hls_build, BuildOptions, BuildReport, BuildRequest, EmptyReportParser, ReportParser};
pub use model::{ModelFlows, MODEL_SCOPE};
pub use passes::{
    init_layers, layer_templates, optimize_reuse, specific_types, streaming, FifoDepthOptimization,
    LayerTemplate, DEFAULT_STREAM_DEPTH, FIFO_PROFILE_KEY, IO_TYPES_KEY,
};
pub use session::BuildSession;
pub use validate::{
    validate_conv_implementation, validate_resource_strategy, validate_resource_unrolled_strategy,
    vitis_validators,
};
pub use vitis::{VitisBackend, VITIS_SCOPE};
pub use vivado::{VivadoBackend, VIVADO_SCOPE};
pub use writer::{firmware_source, project_tcl, HlsWriter, MakeStamp, WriterFlavor, STAMP_LEN};

use std::fmt::Debug;

use async_trait::async_trait;

use crate::context::BuildContext;
use crate::core::StageId;
use crate::errors::{ActionError, FlowError};
use crate::tools::ToolRunner;

/// A registered HLS backend.
#[async_trait]
pub trait Backend: Send + Sync + Debug {
    /// Scope the backend registers its flows under.
    fn name(&self) -> &str;

    /// The flow that produces a complete IP, e.g. `vitis:ip`.
    fn default_flow(&self) -> &StageId;

    /// The flow that writes the project to disk.
    fn writer_flow(&self) -> &StageId;

    /// Returns the id of one of this backend's flows.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::InvalidStageId`] if `local` is malformed.
    fn flow(&self, local: &str) -> Result<StageId, FlowError> {
        StageId::new(self.name(), local)
    }

    /// Runs the HLS toolchain on the project written for `ctx`.
    ///
    /// # Errors
    ///
    /// Returns an error if a tool is missing, fails, or its reports cannot be read.
    async fn build(
        &self,
        ctx: &BuildContext,
        options: &BuildOptions,
        tools: &dyn ToolRunner,
        reports: &dyn ReportParser,
    ) -> Result<BuildReport, ActionError>;
}
