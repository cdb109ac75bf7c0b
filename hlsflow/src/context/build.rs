//! The mutable build context passed through every stage.

use super::Layer;
use crate::config::BuildConfig;
use crate::core::StageId;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use uuid::Uuid;

/// Shared state of one build.
///
/// Every action of a run receives the same `&mut BuildContext`, in
/// sequence. Later stages see what earlier stages left behind.
#[derive(Debug, Clone)]
pub struct BuildContext {
    run_id: Uuid,
    config: BuildConfig,
    layers: Vec<Layer>,
    generated: BTreeMap<String, String>,
    stamp: Option<String>,
    warnings: Vec<String>,
    applied: Vec<StageId>,
    data: HashMap<String, serde_json::Value>,
}

impl BuildContext {
    /// Creates a context for a build of `layers` under `config`.
    #[must_use]
    pub fn new(config: BuildConfig, layers: Vec<Layer>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            config,
            layers,
            generated: BTreeMap::new(),
            stamp: None,
            warnings: Vec::new(),
            applied: Vec::new(),
            data: HashMap::new(),
        }
    }

    /// Returns the build's unique id.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Returns the configuration for modification.
    pub fn config_mut(&mut self) -> &mut BuildConfig {
        &mut self.config
    }

    /// Returns the output directory.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.config.output_dir
    }

    /// Returns the project name.
    #[must_use]
    pub fn project_name(&self) -> &str {
        &self.config.project_name
    }

    /// Returns the layers.
    #[must_use]
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Returns the layers for modification.
    pub fn layers_mut(&mut self) -> &mut Vec<Layer> {
        &mut self.layers
    }

    /// Returns generated code keyed by layer name.
    #[must_use]
    pub fn generated(&self) -> &BTreeMap<String, String> {
        &self.generated
    }

    /// Stores generated code for a layer, replacing any previous code.
    pub fn set_generated(&mut self, layer: impl Into<String>, code: impl Into<String>) {
        self.generated.insert(layer.into(), code.into());
    }

    /// Returns true if code has been generated for the layer.
    #[must_use]
    pub fn has_generated(&self, layer: &str) -> bool {
        self.generated.contains_key(layer)
    }

    /// Returns the project stamp, once computed.
    #[must_use]
    pub fn stamp(&self) -> Option<&str> {
        self.stamp.as_deref()
    }

    /// Sets the project stamp.
    pub fn set_stamp(&mut self, stamp: impl Into<String>) {
        self.stamp = Some(stamp.into());
    }

    /// Returns warnings recorded by validation.
    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Records a warning.
    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Returns the stages applied so far, in order. Stages applied more than
    /// once appear more than once.
    #[must_use]
    pub fn applied_stages(&self) -> &[StageId] {
        &self.applied
    }

    /// Returns true if the stage has been applied in this build.
    #[must_use]
    pub fn has_applied(&self, stage: &StageId) -> bool {
        self.applied.contains(stage)
    }

    /// Records that a stage finished.
    pub fn mark_applied(&mut self, stage: StageId) {
        self.applied.push(stage);
    }

    /// Gets a free-form value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// Sets a free-form value, returning the previous one.
    pub fn set(&mut self, key: impl Into<String>, value: serde_json::Value) -> Option<serde_json::Value> {
        self.data.insert(key.into(), value)
    }
}

impl Default for BuildContext {
    fn default() -> Self {
        Self::new(BuildConfig::default(), Vec::new())
    }
}
