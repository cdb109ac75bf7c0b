//! Error types for hlsflow.
//!
//! Structural errors (unknown stage, unknown action, missing anchor, cycle,
//! forbidden override) abort a build before any action runs. Action errors
//! abort the remaining sequence and are reported through the run outcome.

use crate::core::StageId;
use crate::tools::ToolError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for hlsflow operations.
#[derive(Debug, Error)]
pub enum FlowError {
    /// A stage id was looked up but never registered.
    #[error("{0}")]
    UnknownStage(#[from] UnknownStageError),

    /// A named action was not found in the action table.
    #[error("{0}")]
    UnknownAction(#[from] UnknownActionError),

    /// A composition anchor is missing from the base flow.
    #[error("{0}")]
    AnchorNotFound(#[from] AnchorNotFoundError),

    /// A dependency cycle was found while resolving.
    #[error("{0}")]
    CyclicDependency(#[from] CycleDetectedError),

    /// A stage was re-registered while overrides are forbidden.
    #[error("{0}")]
    DuplicateRegistration(#[from] DuplicateRegistrationError),

    /// A stage id is malformed.
    #[error("Invalid stage id: {0}")]
    InvalidStageId(String),

    /// No backend is registered under the name.
    #[error("Unknown backend '{0}'")]
    UnknownBackend(String),

    /// A stage action failed.
    #[error("{0}")]
    StageAction(#[from] StageActionFailure),

    /// Building a written project failed.
    #[error("Build failed: {0}")]
    Build(#[from] ActionError),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl FlowError {
    /// Returns true for errors caused by the shape of the flow graph rather
    /// than by the work of an action.
    #[must_use]
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::UnknownStage(_)
                | Self::UnknownAction(_)
                | Self::AnchorNotFound(_)
                | Self::CyclicDependency(_)
                | Self::DuplicateRegistration(_)
                | Self::InvalidStageId(_)
                | Self::UnknownBackend(_)
        )
    }

    /// Returns the contract error info for structural errors.
    #[must_use]
    pub fn error_info(&self) -> Option<&ContractErrorInfo> {
        match self {
            Self::UnknownStage(e) => Some(&e.error_info),
            Self::UnknownAction(e) => Some(&e.error_info),
            Self::AnchorNotFound(e) => Some(&e.error_info),
            Self::CyclicDependency(e) => Some(&e.error_info),
            Self::DuplicateRegistration(e) => Some(&e.error_info),
            _ => None,
        }
    }
}

/// Metadata about a contract error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "FLOW-004-CYCLE").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("code".to_string(), serde_json::Value::String(self.code.clone()));
        map.insert("summary".to_string(), serde_json::Value::String(self.summary.clone()));

        if let Some(ref hint) = self.fix_hint {
            map.insert("fix_hint".to_string(), serde_json::Value::String(hint.clone()));
        }
        if !self.context.is_empty() {
            let context_map: serde_json::Map<String, serde_json::Value> = self
                .context
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect();
            map.insert("context".to_string(), serde_json::Value::Object(context_map));
        }

        map
    }
}

/// Error raised when a stage id is not in the registry.
#[derive(Debug, Clone, Error)]
#[error("Unknown stage '{stage}'{}", .required_by.as_ref().map(|r| format!(" (required by '{r}')")).unwrap_or_default())]
pub struct UnknownStageError {
    /// The missing stage.
    pub stage: StageId,
    /// The stage whose `requires` list named it, if any.
    pub required_by: Option<StageId>,
    /// Contract error info.
    pub error_info: ContractErrorInfo,
}

impl UnknownStageError {
    /// Creates a new unknown stage error.
    #[must_use]
    pub fn new(stage: StageId) -> Self {
        let info = ContractErrorInfo::new(
            "FLOW-001-UNKNOWN_STAGE",
            format!("Stage '{stage}' is not registered"),
        )
        .with_fix_hint("Register the stage before resolving, and name it with its full 'scope:name' id.");

        Self {
            stage,
            required_by: None,
            error_info: info,
        }
    }

    /// Records which stage required the missing one.
    #[must_use]
    pub fn required_by(mut self, parent: StageId) -> Self {
        self.error_info = self
            .error_info
            .with_context_entry("required_by", parent.to_string());
        self.required_by = Some(parent);
        self
    }
}

/// Error raised when a named action is not in the action table.
#[derive(Debug, Clone, Error)]
#[error("Unknown action '{action}' for stage '{stage}'")]
pub struct UnknownActionError {
    /// The stage being registered.
    pub stage: StageId,
    /// The unresolvable action name.
    pub action: String,
    /// Contract error info.
    pub error_info: ContractErrorInfo,
}

impl UnknownActionError {
    /// Creates a new unknown action error.
    #[must_use]
    pub fn new(stage: StageId, action: impl Into<String>) -> Self {
        let action = action.into();
        let info = ContractErrorInfo::new(
            "FLOW-002-UNKNOWN_ACTION",
            format!("Action '{action}' is not registered"),
        )
        .with_context_entry("stage", stage.to_string());

        Self {
            stage,
            action,
            error_info: info,
        }
    }
}

/// Error raised when a composition anchor is missing from the base flow.
#[derive(Debug, Clone, Error)]
#[error("Anchor '{anchor}' not found in requires of '{base}'")]
pub struct AnchorNotFoundError {
    /// The base flow being extended.
    pub base: StageId,
    /// The missing anchor.
    pub anchor: StageId,
    /// Contract error info.
    pub error_info: ContractErrorInfo,
}

impl AnchorNotFoundError {
    /// Creates a new anchor not found error.
    #[must_use]
    pub fn new(base: StageId, anchor: StageId) -> Self {
        let info = ContractErrorInfo::new(
            "FLOW-003-ANCHOR",
            format!("'{base}' does not require '{anchor}'"),
        )
        .with_fix_hint("Insert relative to a stage that the base flow lists in its requires.");

        Self {
            base,
            anchor,
            error_info: info,
        }
    }
}

/// Error raised when a cycle is detected in the stage graph.
#[derive(Debug, Clone, Error)]
#[error("Cycle detected in flow graph: {}", .cycle_path.iter().map(ToString::to_string).collect::<Vec<_>>().join(" -> "))]
pub struct CycleDetectedError {
    /// The path of stages forming the cycle; first and last entries match.
    pub cycle_path: Vec<StageId>,
    /// Contract error info.
    pub error_info: ContractErrorInfo,
}

impl CycleDetectedError {
    /// Creates a new cycle detected error.
    #[must_use]
    pub fn new(cycle_path: Vec<StageId>) -> Self {
        let rendered = cycle_path
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" -> ");
        let info = ContractErrorInfo::new(
            "FLOW-004-CYCLE",
            format!("Flow graph contains a dependency cycle: {rendered}"),
        )
        .with_fix_hint("Remove one of the requires edges in the cycle to break it.");

        Self {
            cycle_path,
            error_info: info,
        }
    }
}

/// Error raised when re-registering a stage while overrides are forbidden.
#[derive(Debug, Clone, Error)]
#[error("Stage '{stage}' is already registered")]
pub struct DuplicateRegistrationError {
    /// The stage that already exists.
    pub stage: StageId,
    /// Contract error info.
    pub error_info: ContractErrorInfo,
}

impl DuplicateRegistrationError {
    /// Creates a new duplicate registration error.
    #[must_use]
    pub fn new(stage: StageId) -> Self {
        let info = ContractErrorInfo::new(
            "FLOW-005-DUPLICATE",
            format!("Stage '{stage}' registered twice"),
        )
        .with_fix_hint("Use a distinct local name or allow overrides in the registry config.");

        Self {
            stage,
            error_info: info,
        }
    }
}

/// Errors returned by a single action.
#[derive(Debug, Error)]
pub enum ActionError {
    /// The action refused the current configuration.
    #[error("Rejected: {reason}")]
    Rejected {
        /// Why the configuration was rejected.
        reason: String,
    },

    /// An external tool invoked by the action failed.
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// IO error while reading or writing artifacts.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other failure.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ActionError {
    /// Creates a rejection.
    #[must_use]
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }
}

/// A stage action failed during a run.
#[derive(Debug, Error)]
#[error("Stage '{stage}' failed in action '{action}': {source}")]
pub struct StageActionFailure {
    /// The stage whose action failed.
    pub stage: StageId,
    /// The failing action's name.
    pub action: String,
    /// The underlying error.
    #[source]
    pub source: ActionError,
}

impl StageActionFailure {
    /// Creates a new stage action failure.
    #[must_use]
    pub fn new(stage: StageId, action: impl Into<String>, source: ActionError) -> Self {
        Self {
            stage,
            action: action.into(),
            source,
        }
    }
}

/// Provides default suggestions for flow error codes.
pub struct ContractSuggestions;

impl ContractSuggestions {
    /// Gets a suggestion for a given error code.
    #[must_use]
    pub fn get(code: &str) -> Option<&'static str> {
        match code {
            "FLOW-001-UNKNOWN_STAGE" => Some(
                "Lookups never fall back to a base backend. \
                 Name the base flow explicitly, e.g. 'vivado:init_layers'.",
            ),
            "FLOW-002-UNKNOWN_ACTION" => Some(
                "Register the action in the action table before registering flows that name it.",
            ),
            "FLOW-003-ANCHOR" => Some(
                "Check the base flow's requires list; anchors must be direct requirements.",
            ),
            "FLOW-004-CYCLE" => Some(
                "Check stage requires for circular references. \
                 A write flow should require the ip flow, never the reverse.",
            ),
            "FLOW-005-DUPLICATE" => Some(
                "Overrides are disabled for this registry. Pick a different local name.",
            ),
            _ => None,
        }
    }
}
