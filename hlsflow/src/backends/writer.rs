//! Project writers.

use std::path::Path;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::config::{BuildConfig, Interface};
use crate::context::BuildContext;
use crate::errors::ActionError;
use crate::stages::Action;

/// Number of hex digits kept from the stamp digest.
pub const STAMP_LEN: usize = 8;

/// Stamps the build with a digest of its configuration and layers.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeStamp;

impl MakeStamp {
    /// Action name.
    pub const NAME: &'static str = "make_stamp";

    /// Computes the stamp for a context.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be serialized.
    pub fn compute(ctx: &BuildContext) -> Result<String, ActionError> {
        let bytes = serde_json::to_vec(&(ctx.config(), ctx.layers()))
            .map_err(|e| ActionError::Other(e.into()))?;
        let digest = hex::encode(Sha256::digest(&bytes));
        Ok(digest[..STAMP_LEN].to_string())
    }
}

#[async_trait]
impl Action for MakeStamp {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn run(&self, ctx: &mut BuildContext) -> Result<(), ActionError> {
        let stamp = Self::compute(ctx)?;
        debug!(stamp = %stamp, "Stamped build");
        ctx.set_stamp(stamp);
        Ok(())
    }
}

/// Which backend's project layout to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterFlavor {
    /// Plain Vivado HLS project.
    Vivado,
    /// Vitis HLS project with accelerator settings and header overrides.
    Vitis,
}

impl WriterFlavor {
    /// Backend name written into `project.tcl`.
    #[must_use]
    pub fn backend(self) -> &'static str {
        match self {
            Self::Vivado => "vivado",
            Self::Vitis => "vitis",
        }
    }
}

/// Renders `project.tcl`.
///
/// For Vitis AXI-stream designs the bit width lines follow the board
/// scripts' convention: `bit_width_hls_output` carries the input precision
/// width and `bit_width_hls_input` the output precision width.
#[must_use]
pub fn project_tcl(config: &BuildConfig, flavor: WriterFlavor) -> String {
    let mut lines = vec![
        "variable project_name".to_string(),
        format!("set project_name \"{}\"", config.project_name),
        "variable backend".to_string(),
        format!("set backend \"{}\"", flavor.backend()),
        "variable part".to_string(),
        format!("set part \"{}\"", config.part),
        "variable clock_period".to_string(),
        format!("set clock_period {}", config.clock_period),
        "variable clock_uncertainty".to_string(),
        format!("set clock_uncertainty {}", config.clock_uncertainty),
        "variable version".to_string(),
        format!("set version \"{}\"", config.version),
        "variable maximum_size".to_string(),
        format!("set maximum_size {}", config.maximum_size),
    ];

    if flavor == WriterFlavor::Vitis && config.accelerator.interface == Interface::AxiStream {
        let (in_bit, out_bit) = config.accelerator.io_bitwidth();
        lines.push(format!("set bit_width_hls_output {in_bit}"));
        lines.push(format!("set bit_width_hls_input {out_bit}"));
    }
    lines.join("\n") + "\n"
}

/// Renders the top-level firmware source.
#[must_use]
pub fn firmware_source(ctx: &BuildContext) -> String {
    let project = ctx.project_name();
    let mut lines = vec![
        format!("// {project} generated by hlsflow"),
        format!("// stamp: {}", ctx.stamp().unwrap_or("none")),
        format!("#include \"{project}.h\""),
        String::new(),
        format!("void {project}() {{"),
    ];
    for layer in ctx.layers() {
        if let Some(depth) = layer.fifo_depth {
            lines.push(format!(
                "    #pragma HLS STREAM variable={}_out depth={depth}",
                layer.name
            ));
        }
        match ctx.generated().get(&layer.name) {
            Some(code) => lines.extend(code.lines().map(|line| format!("    {line}"))),
            None => lines.push(format!(
                "    // {}: no template for {}",
                layer.name, layer.class_name
            )),
        }
    }
    lines.push("}".to_string());
    lines.join("\n") + "\n"
}

/// Writes the HLS project tree into the output directory.
#[derive(Debug, Clone)]
pub struct HlsWriter {
    name: String,
    flavor: WriterFlavor,
}

impl HlsWriter {
    /// Creates the writer for a backend.
    #[must_use]
    pub fn new(flavor: WriterFlavor) -> Self {
        Self {
            name: format!("{}:write_hls", flavor.backend()),
            flavor,
        }
    }

    async fn copy_nnet_utils_overrides(template_dir: &Path, firmware: &Path) -> Result<usize, ActionError> {
        let src = template_dir.join("vitis").join("nnet_utils");
        if !tokio::fs::try_exists(&src).await? {
            return Ok(0);
        }

        let dst = firmware.join("nnet_utils");
        tokio::fs::create_dir_all(&dst).await?;

        let mut copied = 0;
        let mut entries = tokio::fs::read_dir(&src).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "h") {
                tokio::fs::copy(&path, dst.join(entry.file_name())).await?;
                copied += 1;
            }
        }
        Ok(copied)
    }
}

#[async_trait]
impl Action for HlsWriter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &mut BuildContext) -> Result<(), ActionError> {
        let out_dir = ctx.output_dir().to_path_buf();
        let firmware = out_dir.join("firmware");
        tokio::fs::create_dir_all(&firmware).await?;

        tokio::fs::write(out_dir.join("project.tcl"), project_tcl(ctx.config(), self.flavor)).await?;
        tokio::fs::write(
            firmware.join(format!("{}.cpp", ctx.project_name())),
            firmware_source(ctx),
        )
        .await?;

        let mut overrides = 0;
        if self.flavor == WriterFlavor::Vitis {
            if let Some(template_dir) = ctx.config().template_dir.clone() {
                overrides = Self::copy_nnet_utils_overrides(&template_dir, &firmware).await?;
            }
        }

        info!(
            backend = self.flavor.backend(),
            output_dir = %out_dir.display(),
            overrides,
            "Wrote HLS project"
        );
        Ok(())
    }
}
