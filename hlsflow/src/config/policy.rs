//! Registry and runner policies.

use serde::{Deserialize, Serialize};

/// What the registry does when a stage id is registered twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverridePolicy {
    /// The newest registration replaces the old descriptor.
    #[default]
    Allow,
    /// Re-registration fails with a duplicate registration error.
    Forbid,
}

/// Configuration for a stage registry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Override policy for re-registration.
    #[serde(default)]
    pub override_policy: OverridePolicy,
}

impl RegistryConfig {
    /// Creates a new registry configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the override policy.
    #[must_use]
    pub fn with_override_policy(mut self, policy: OverridePolicy) -> Self {
        self.override_policy = policy;
        self
    }

    /// Shorthand for a registry that rejects re-registration.
    #[must_use]
    pub fn strict() -> Self {
        Self::new().with_override_policy(OverridePolicy::Forbid)
    }
}

/// Configuration for the pipeline runner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Skip stages the build context already records as applied.
    #[serde(default)]
    pub skip_applied_stages: bool,
}

impl RunnerConfig {
    /// Creates a new runner configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables skipping of already applied stages.
    #[must_use]
    pub fn with_skip_applied_stages(mut self, skip: bool) -> Self {
        self.skip_applied_stages = skip;
        self
    }
}
