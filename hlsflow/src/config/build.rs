//! Project configuration consumed by backend stages.

use crate::errors::FlowError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// How tensors move between layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IoType {
    /// Fully partitioned arrays.
    #[default]
    IoParallel,
    /// FIFO streams between layers.
    IoStream,
}

impl fmt::Display for IoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IoParallel => write!(f, "io_parallel"),
            Self::IoStream => write!(f, "io_stream"),
        }
    }
}

/// Accelerator top-level interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interface {
    /// AXI4-Stream.
    #[default]
    AxiStream,
    /// AXI4 master.
    AxiMaster,
    /// AXI4-Lite.
    AxiLite,
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AxiStream => write!(f, "axi_stream"),
            Self::AxiMaster => write!(f, "axi_master"),
            Self::AxiLite => write!(f, "axi_lite"),
        }
    }
}

/// Layer implementation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Fully unrolled, lowest latency.
    #[default]
    Latency,
    /// Reuse multipliers according to the reuse factor.
    Resource,
    /// Resource strategy with the inner loop unrolled.
    ResourceUnrolled,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latency => write!(f, "latency"),
            Self::Resource => write!(f, "resource"),
            Self::ResourceUnrolled => write!(f, "resource_unrolled"),
        }
    }
}

/// Numeric type at the accelerator boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Precision {
    /// 32-bit float.
    Float,
    /// 64-bit float.
    Double,
    /// `ap_fixed<width, integer>`.
    Fixed {
        /// Total bits.
        width: u32,
        /// Integer bits.
        integer: i32,
    },
    /// `ap_int<width>`.
    Int {
        /// Total bits.
        width: u32,
    },
}

impl Precision {
    /// Returns the number of bits this type occupies on the wire.
    #[must_use]
    pub fn bit_width(&self) -> u32 {
        match self {
            Self::Float => 32,
            Self::Double => 64,
            Self::Fixed { width, .. } | Self::Int { width } => *width,
        }
    }
}

impl Default for Precision {
    fn default() -> Self {
        Self::Float
    }
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float => write!(f, "float"),
            Self::Double => write!(f, "double"),
            Self::Fixed { width, integer } => write!(f, "ap_fixed<{width},{integer}>"),
            Self::Int { width } => write!(f, "ap_int<{width}>"),
        }
    }
}

impl FromStr for Precision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        let bad = || format!("unsupported precision '{s}'");

        match compact.as_str() {
            "float" => return Ok(Self::Float),
            "double" => return Ok(Self::Double),
            _ => {}
        }

        let args = |prefix: &str| {
            compact
                .strip_prefix(prefix)
                .and_then(|rest| rest.strip_suffix('>'))
                .map(|inner| inner.split(',').map(str::to_string).collect::<Vec<_>>())
        };

        if let Some(parts) = args("ap_fixed<") {
            let [width, integer] = parts.as_slice() else {
                return Err(bad());
            };
            let width: u32 = width.parse().map_err(|_| bad())?;
            let integer: i32 = integer.parse().map_err(|_| bad())?;
            if width == 0 {
                return Err(bad());
            }
            return Ok(Self::Fixed { width, integer });
        }

        if let Some(parts) = args("ap_int<") {
            let [width] = parts.as_slice() else {
                return Err(bad());
            };
            let width: u32 = width.parse().map_err(|_| bad())?;
            if width == 0 {
                return Err(bad());
            }
            return Ok(Self::Int { width });
        }

        Err(bad())
    }
}

impl TryFrom<String> for Precision {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Precision> for String {
    fn from(p: Precision) -> Self {
        p.to_string()
    }
}

/// Board-level accelerator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceleratorConfig {
    /// Target board.
    #[serde(default = "default_board")]
    pub board: String,
    /// Top-level interface.
    #[serde(default)]
    pub interface: Interface,
    /// Host driver flavour.
    #[serde(default = "default_driver")]
    pub driver: String,
    /// Input precision.
    #[serde(default)]
    pub input_precision: Precision,
    /// Output precision.
    #[serde(default)]
    pub output_precision: Precision,
    /// Deployment platform, Alveo boards only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
}

/// Default Alveo deployment platform.
pub const DEFAULT_PLATFORM: &str = "xilinx_u250_xdma_201830_2";

fn default_board() -> String {
    "pynq-z2".to_string()
}

fn default_driver() -> String {
    "python".to_string()
}

impl Default for AcceleratorConfig {
    fn default() -> Self {
        Self::new(default_board())
    }
}

impl AcceleratorConfig {
    /// Creates settings for a board. Alveo boards get the default platform.
    #[must_use]
    pub fn new(board: impl Into<String>) -> Self {
        let board = board.into();
        let platform = is_alveo(&board).then(|| DEFAULT_PLATFORM.to_string());
        Self {
            board,
            interface: Interface::default(),
            driver: default_driver(),
            input_precision: Precision::default(),
            output_precision: Precision::default(),
            platform,
        }
    }

    /// Sets the interface.
    #[must_use]
    pub fn with_interface(mut self, interface: Interface) -> Self {
        self.interface = interface;
        self
    }

    /// Sets the input and output precision.
    #[must_use]
    pub fn with_precision(mut self, input: Precision, output: Precision) -> Self {
        self.input_precision = input;
        self.output_precision = output;
        self
    }

    /// Sets the platform. Ignored for non-Alveo boards.
    #[must_use]
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        if self.is_alveo() {
            self.platform = Some(platform.into());
        }
        self
    }

    /// Returns true for Alveo data-center boards.
    #[must_use]
    pub fn is_alveo(&self) -> bool {
        is_alveo(&self.board)
    }

    /// Returns the platform, falling back to the default for Alveo boards.
    #[must_use]
    pub fn platform(&self) -> Option<&str> {
        match &self.platform {
            Some(p) => Some(p.as_str()),
            None if self.is_alveo() => Some(DEFAULT_PLATFORM),
            None => None,
        }
    }

    /// Returns `(input_bits, output_bits)` for the AXI stream.
    #[must_use]
    pub fn io_bitwidth(&self) -> (u32, u32) {
        (self.input_precision.bit_width(), self.output_precision.bit_width())
    }
}

fn is_alveo(board: &str) -> bool {
    board.starts_with("alveo")
}

/// Project configuration shared by every stage of a build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Project (top function) name.
    #[serde(default = "default_project_name")]
    pub project_name: String,
    /// Output directory for the generated project.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// FPGA part.
    #[serde(default = "default_part")]
    pub part: String,
    /// Clock period in ns.
    #[serde(default = "default_clock_period")]
    pub clock_period: f64,
    /// Clock uncertainty, e.g. `"27%"`.
    #[serde(default = "default_clock_uncertainty")]
    pub clock_uncertainty: String,
    /// I/O implementation.
    #[serde(default)]
    pub io_type: IoType,
    /// Project version written to the TCL script.
    #[serde(default = "default_version")]
    pub version: String,
    /// Maximum array size written to the TCL script.
    #[serde(default = "default_maximum_size")]
    pub maximum_size: u64,
    /// Default strategy applied to layers without one.
    #[serde(default)]
    pub strategy: Strategy,
    /// Default reuse factor applied to layers without one.
    #[serde(default = "default_reuse_factor")]
    pub reuse_factor: u32,
    /// FIFO depth chosen by FIFO depth optimization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fifo_depth: Option<u32>,
    /// Root of the template tree (`<dir>/vitis/nnet_utils/*.h`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_dir: Option<PathBuf>,
    /// Accelerator settings.
    #[serde(default)]
    pub accelerator: AcceleratorConfig,
}

fn default_project_name() -> String {
    "myproject".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("my-hls-test")
}

fn default_part() -> String {
    "xcvu13p-flga2577-2-e".to_string()
}

fn default_clock_period() -> f64 {
    5.0
}

fn default_clock_uncertainty() -> String {
    "27%".to_string()
}

fn default_version() -> String {
    "1.0.0".to_string()
}

fn default_maximum_size() -> u64 {
    4096
}

fn default_reuse_factor() -> u32 {
    1
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            project_name: default_project_name(),
            output_dir: default_output_dir(),
            part: default_part(),
            clock_period: default_clock_period(),
            clock_uncertainty: default_clock_uncertainty(),
            io_type: IoType::default(),
            version: default_version(),
            maximum_size: default_maximum_size(),
            strategy: Strategy::default(),
            reuse_factor: default_reuse_factor(),
            fifo_depth: None,
            template_dir: None,
            accelerator: AcceleratorConfig::default(),
        }
    }
}

impl BuildConfig {
    /// Creates the initial configuration with backend defaults.
    #[must_use]
    pub fn create_initial_config() -> Self {
        Self::default()
    }

    /// Parses a configuration from JSON. Missing fields take defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or a value is invalid.
    pub fn from_json_str(json: &str) -> Result<Self, FlowError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, FlowError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Sets the project name.
    #[must_use]
    pub fn with_project_name(mut self, name: impl Into<String>) -> Self {
        self.project_name = name.into();
        self
    }

    /// Sets the output directory.
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Sets the part.
    #[must_use]
    pub fn with_part(mut self, part: impl Into<String>) -> Self {
        self.part = part.into();
        self
    }

    /// Sets the clock period and uncertainty.
    #[must_use]
    pub fn with_clock(mut self, period: f64, uncertainty: impl Into<String>) -> Self {
        self.clock_period = period;
        self.clock_uncertainty = uncertainty.into();
        self
    }

    /// Sets the I/O type.
    #[must_use]
    pub fn with_io_type(mut self, io_type: IoType) -> Self {
        self.io_type = io_type;
        self
    }

    /// Sets the default strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Sets the FIFO depth used by FIFO depth optimization.
    #[must_use]
    pub fn with_fifo_depth(mut self, depth: u32) -> Self {
        self.fifo_depth = Some(depth);
        self
    }

    /// Sets the template directory.
    #[must_use]
    pub fn with_template_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.template_dir = Some(dir.into());
        self
    }

    /// Sets the accelerator settings.
    #[must_use]
    pub fn with_accelerator(mut self, accelerator: AcceleratorConfig) -> Self {
        self.accelerator = accelerator;
        self
    }
}
