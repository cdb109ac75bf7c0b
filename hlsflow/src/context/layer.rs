//! Layer descriptions carried through the build.

use crate::config::Strategy;
use serde::{Deserialize, Serialize};

/// One layer of the model being built.
///
/// Stages treat the model as opaque apart from these fields: validators read
/// them, initializers fill defaults, templates turn them into code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    /// Unique layer name.
    pub name: String,
    /// Layer class, e.g. `Dense`, `Conv2D`, `Activation`, `Linear`.
    pub class_name: String,
    /// Implementation strategy, filled by layer initialization when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<Strategy>,
    /// Reuse factor, filled by layer initialization when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reuse_factor: Option<u32>,
    /// Convolution implementation (`LineBuffer`, `Encoded`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conv_implementation: Option<String>,
    /// Output FIFO depth for streaming designs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fifo_depth: Option<u32>,
}

impl Layer {
    /// Creates a layer with no implementation attributes set.
    #[must_use]
    pub fn new(name: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class_name: class_name.into(),
            strategy: None,
            reuse_factor: None,
            conv_implementation: None,
            fifo_depth: None,
        }
    }

    /// Sets the strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Sets the reuse factor.
    #[must_use]
    pub fn with_reuse_factor(mut self, reuse_factor: u32) -> Self {
        self.reuse_factor = Some(reuse_factor);
        self
    }

    /// Sets the convolution implementation.
    #[must_use]
    pub fn with_conv_implementation(mut self, implementation: impl Into<String>) -> Self {
        self.conv_implementation = Some(implementation.into());
        self
    }

    /// Returns true for convolution layers.
    #[must_use]
    pub fn is_conv(&self) -> bool {
        self.class_name.starts_with("Conv")
    }
}
