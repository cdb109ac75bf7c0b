//! Running the HLS toolchain on a written project.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::AcceleratorConfig;
use crate::errors::ActionError;
use crate::tools::{require, ToolInvocation, ToolRunner};

/// Switches passed to `build_prj.tcl`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOptions {
    /// Reset the HLS project.
    #[serde(default)]
    pub reset: bool,
    /// Run C simulation.
    #[serde(default = "default_true")]
    pub csim: bool,
    /// Run C synthesis.
    #[serde(default = "default_true")]
    pub synth: bool,
    /// Run co-simulation.
    #[serde(default)]
    pub cosim: bool,
    /// Validate co-simulation results.
    #[serde(default)]
    pub validation: bool,
    /// Export the IP.
    #[serde(default)]
    pub export: bool,
    /// Run logic synthesis.
    #[serde(default)]
    pub vsynth: bool,
    /// Profile FIFO occupancy for depth optimization.
    #[serde(default)]
    pub fifo_opt: bool,
    /// Produce a bitfile after the HLS build.
    #[serde(default)]
    pub bitfile: bool,
}

fn default_true() -> bool {
    true
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            reset: false,
            csim: true,
            synth: true,
            cosim: false,
            validation: false,
            export: false,
            vsynth: false,
            fifo_opt: false,
            bitfile: false,
        }
    }
}

impl BuildOptions {
    /// Creates the default options (C simulation and synthesis).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables co-simulation.
    #[must_use]
    pub fn with_cosim(mut self, cosim: bool) -> Self {
        self.cosim = cosim;
        self
    }

    /// Enables or disables IP export.
    #[must_use]
    pub fn with_export(mut self, export: bool) -> Self {
        self.export = export;
        self
    }

    /// Enables or disables bitfile generation.
    #[must_use]
    pub fn with_bitfile(mut self, bitfile: bool) -> Self {
        self.bitfile = bitfile;
        self
    }

    /// Enables or disables FIFO profiling.
    #[must_use]
    pub fn with_fifo_opt(mut self, fifo_opt: bool) -> Self {
        self.fifo_opt = fifo_opt;
        self
    }

    /// Renders the `key=value` argument understood by `build_prj.tcl`.
    #[must_use]
    pub fn tcl_args(&self) -> String {
        let flag = |b: bool| u8::from(b);
        format!(
            "reset={} csim={} synth={} cosim={} validation={} export={} vsynth={} fifo_opt={}",
            flag(self.reset),
            flag(self.csim),
            flag(self.synth),
            flag(self.cosim),
            flag(self.validation),
            flag(self.export),
            flag(self.vsynth),
            flag(self.fifo_opt),
        )
    }
}

/// Results read back from the tool reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildReport {
    /// Project that was built.
    pub project: String,
    /// Report sections keyed by name.
    #[serde(default)]
    pub sections: BTreeMap<String, serde_json::Value>,
}

impl BuildReport {
    /// Creates an empty report for a project.
    #[must_use]
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            sections: BTreeMap::new(),
        }
    }

    /// Adds a section.
    #[must_use]
    pub fn with_section(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.sections.insert(name.into(), value);
        self
    }
}

/// Reads tool reports out of a project directory.
pub trait ReportParser: Send + Sync {
    /// Parses the reports of `project` under `output_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the reports exist but cannot be read.
    fn parse(&self, output_dir: &Path, project: &str) -> Result<BuildReport, ActionError>;
}

/// A parser that returns an empty report.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyReportParser;

impl ReportParser for EmptyReportParser {
    fn parse(&self, _output_dir: &Path, project: &str) -> Result<BuildReport, ActionError> {
        Ok(BuildReport::new(project))
    }
}

/// Everything one HLS build needs.
#[derive(Clone, Copy)]
pub struct BuildRequest<'a> {
    /// HLS program, e.g. `vitis_hls`.
    pub hls_tool: &'a str,
    /// Project output directory.
    pub output_dir: &'a Path,
    /// Project name.
    pub project: &'a str,
    /// Board settings, used for bitfile generation.
    pub accelerator: &'a AcceleratorConfig,
    /// Build switches.
    pub options: &'a BuildOptions,
}

/// Runs the HLS tool, then the optional bitfile step, then the report parser.
///
/// # Errors
///
/// Returns [`ActionError::Tool`] if a tool is missing or exits unsuccessfully.
pub async fn run_hls_build(
    request: BuildRequest<'_>,
    tools: &dyn ToolRunner,
    reports: &dyn ReportParser,
) -> Result<BuildReport, ActionError> {
    require(tools, request.hls_tool)?;

    let hls = ToolInvocation::new(request.hls_tool, request.output_dir)
        .args(["-f", "build_prj.tcl"])
        .arg(request.options.tcl_args());
    tools.invoke(&hls).await?;

    if request.options.bitfile {
        if request.accelerator.is_alveo() {
            make_xclbin(request, tools).await?;
        } else {
            let vivado = vivado_batch(request.output_dir);
            tools.invoke(&vivado).await?;
        }
    }

    let report = reports.parse(request.output_dir, request.project)?;
    info!(project = %request.project, sections = report.sections.len(), "Build finished");
    Ok(report)
}

fn vivado_batch(dir: &Path) -> ToolInvocation {
    ToolInvocation::new("vivado", dir).args(["-mode", "batch", "-source", "design.tcl"])
}

fn absolute(dir: &Path) -> std::io::Result<PathBuf> {
    if dir.is_absolute() {
        Ok(dir.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(dir))
    }
}

/// Links the exported kernel into an `.xclbin` for an Alveo platform.
async fn make_xclbin(request: BuildRequest<'_>, tools: &dyn ToolRunner) -> Result<(), ActionError> {
    let dir = absolute(request.output_dir)?;
    let project = request.project;
    let Some(platform) = request.accelerator.platform() else {
        return Err(ActionError::rejected("Alveo bitfile requires a platform"));
    };

    tokio::fs::create_dir_all(dir.join("xo_files")).await?;
    tools.invoke(&vivado_batch(&dir)).await?;

    let ip_repo = dir.join(format!("{project}_prj")).join("solution1/impl/ip");
    let xclbin_dir = dir.join("xclbin_files");
    tokio::fs::create_dir_all(&xclbin_dir).await?;

    let link = ToolInvocation::new("v++", &xclbin_dir)
        .args(["-t", "hw", "--platform", platform, "--link"])
        .arg(format!("../xo_files/{project}_kernel.xo"))
        .arg("-o")
        .arg(format!("{project}_kernel.xclbin"))
        .arg("--user_ip_repo_paths")
        .arg(ip_repo.display().to_string());

    if let Err(err) = tools.invoke(&link).await {
        warn!(error = %err, "Kernel link failed, check the Vitis/Vivado logs");
        return Err(err.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{MockToolRunner, ToolError};
    use mockall::predicate::eq;
    use mockall::Sequence;

    fn request<'a>(
        dir: &'a Path,
        accel: &'a AcceleratorConfig,
        options: &'a BuildOptions,
    ) -> BuildRequest<'a> {
        BuildRequest {
            hls_tool: "vitis_hls",
            output_dir: dir,
            project: "myproject",
            accelerator: accel,
            options,
        }
    }

    #[test]
    fn test_tcl_args() {
        let opts = BuildOptions::new().with_cosim(true);
        assert_eq!(
            opts.tcl_args(),
            "reset=0 csim=1 synth=1 cosim=1 validation=0 export=0 vsynth=0 fifo_opt=0"
        );
    }

    #[test]
    fn test_options_deserialize_defaults() {
        let opts: BuildOptions = serde_json::from_str(r#"{"export": true}"#).unwrap();
        assert!(opts.csim && opts.synth && opts.export);
        assert!(!opts.bitfile);
    }

    #[tokio::test]
    async fn test_missing_tool() {
        let dir = tempfile::tempdir().unwrap();
        let accel = AcceleratorConfig::default();
        let opts = BuildOptions::new();

        let mut tools = MockToolRunner::new();
        tools.expect_locate().returning(|_| None);
        tools.expect_invoke().never();

        let err = run_hls_build(request(dir.path(), &accel, &opts), &tools, &EmptyReportParser)
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Tool(ToolError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_hls_invocation() {
        let dir = tempfile::tempdir().unwrap();
        let accel = AcceleratorConfig::default();
        let opts = BuildOptions::new();
        let expected = ToolInvocation::new("vitis_hls", dir.path())
            .args(["-f", "build_prj.tcl"])
            .arg(opts.tcl_args());

        let mut tools = MockToolRunner::new();
        tools
            .expect_locate()
            .with(eq("vitis_hls"))
            .returning(|p| Some(PathBuf::from("/opt/xilinx/bin").join(p)));
        tools
            .expect_invoke()
            .withf(move |inv| *inv == expected)
            .times(1)
            .returning(|_| Ok(()));

        let report = run_hls_build(request(dir.path(), &accel, &opts), &tools, &EmptyReportParser)
            .await
            .unwrap();
        assert_eq!(report.project, "myproject");
    }

    #[tokio::test]
    async fn test_hls_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let accel = AcceleratorConfig::default();
        let opts = BuildOptions::new().with_bitfile(true);

        let mut tools = MockToolRunner::new();
        tools.expect_locate().returning(|p| Some(PathBuf::from(p)));
        tools
            .expect_invoke()
            .times(1)
            .returning(|inv| Err(ToolError::failed(inv.program.clone(), Some(1))));

        let err = run_hls_build(request(dir.path(), &accel, &opts), &tools, &EmptyReportParser)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("status 1"));
    }

    #[tokio::test]
    async fn test_bitfile_non_alveo_runs_vivado() {
        let dir = tempfile::tempdir().unwrap();
        let accel = AcceleratorConfig::new("pynq-z2");
        let opts = BuildOptions::new().with_bitfile(true);

        let mut seq = Sequence::new();
        let mut tools = MockToolRunner::new();
        tools.expect_locate().returning(|p| Some(PathBuf::from(p)));
        tools
            .expect_invoke()
            .withf(|inv| inv.program == "vitis_hls")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        tools
            .expect_invoke()
            .withf(|inv| inv.program == "vivado" && inv.args.contains(&"design.tcl".to_string()))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        run_hls_build(request(dir.path(), &accel, &opts), &tools, &EmptyReportParser)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_bitfile_alveo_links_xclbin() {
        let dir = tempfile::tempdir().unwrap();
        let accel = AcceleratorConfig::new("alveo-u250");
        let opts = BuildOptions::new().with_bitfile(true);

        let mut seq = Sequence::new();
        let mut tools = MockToolRunner::new();
        tools.expect_locate().returning(|p| Some(PathBuf::from(p)));
        tools
            .expect_invoke()
            .withf(|inv| inv.program == "vitis_hls")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        tools
            .expect_invoke()
            .withf(|inv| inv.program == "vivado")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        tools
            .expect_invoke()
            .withf(|inv| {
                inv.program == "v++"
                    && inv.working_dir.ends_with("xclbin_files")
                    && inv.args.contains(&"xilinx_u250_xdma_201830_2".to_string())
                    && inv.args.contains(&"../xo_files/myproject_kernel.xo".to_string())
                    && inv.args.last().is_some_and(|p| p.ends_with("myproject_prj/solution1/impl/ip"))
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        run_hls_build(request(dir.path(), &accel, &opts), &tools, &EmptyReportParser)
            .await
            .unwrap();

        assert!(dir.path().join("xo_files").is_dir());
        assert!(dir.path().join("xclbin_files").is_dir());
    }
}
