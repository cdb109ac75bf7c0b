//! Qualified stage identifiers.

use crate::errors::FlowError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Separator between the scope and the local name.
pub const SCOPE_SEPARATOR: char = ':';

fn segment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.\-]*$").expect("segment pattern is valid")
    })
}

/// Uniquely names a stage within the registry.
///
/// A stage id is a `(scope, local name)` pair rendered as `"scope:local"`.
/// The scope is usually the owning backend (`vivado`, `vitis`), the local
/// name the flow purpose (`validation`, `ip`, `write`). Two backends can
/// register the same local name without colliding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StageId {
    scope: String,
    local: String,
}

impl StageId {
    /// Creates a new identifier from a scope and a local name.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::InvalidStageId`] if either segment is empty or
    /// contains characters outside `[A-Za-z0-9_.-]`.
    pub fn new(scope: impl Into<String>, local: impl Into<String>) -> Result<Self, FlowError> {
        let scope = scope.into();
        let local = local.into();

        for segment in [&scope, &local] {
            if !segment_pattern().is_match(segment) {
                return Err(FlowError::InvalidStageId(format!(
                    "'{scope}{SCOPE_SEPARATOR}{local}': segment '{segment}' is not a valid name"
                )));
            }
        }

        Ok(Self { scope, local })
    }

    /// Parses a qualified `"scope:local"` name.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::InvalidStageId`] if the name has no scope or
    /// either segment is malformed.
    pub fn parse(qualified: &str) -> Result<Self, FlowError> {
        match qualified.split_once(SCOPE_SEPARATOR) {
            Some((scope, local)) => Self::new(scope, local),
            None => Err(FlowError::InvalidStageId(format!(
                "'{qualified}' is not qualified; expected 'scope{SCOPE_SEPARATOR}name'"
            ))),
        }
    }

    /// Returns the scope (owning backend).
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Returns the local name.
    #[must_use]
    pub fn local(&self) -> &str {
        &self.local
    }

    /// Returns the qualified `"scope:local"` form.
    #[must_use]
    pub fn qualified(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SCOPE_SEPARATOR}{}", self.scope, self.local)
    }
}

impl FromStr for StageId {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for StageId {
    type Error = FlowError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for StageId {
    type Error = FlowError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<StageId> for String {
    fn from(id: StageId) -> Self {
        id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_qualified() {
        let id = StageId::parse("vitis:validation").unwrap();
        assert_eq!(id.scope(), "vitis");
        assert_eq!(id.local(), "validation");
        assert_eq!(id.to_string(), "vitis:validation");
    }

    #[test]
    fn test_same_local_name_different_scope() {
        let a = StageId::parse("vivado:write").unwrap();
        let b = StageId::parse("vitis:write").unwrap();
        assert_ne!(a, b);
        assert_eq!(a.local(), b.local());
    }

    #[test]
    fn test_unqualified_rejected() {
        let err = StageId::parse("write").unwrap_err();
        assert!(matches!(err, FlowError::InvalidStageId(_)));
    }

    #[test]
    fn test_bad_segments_rejected() {
        assert!(StageId::new("", "write").is_err());
        assert!(StageId::new("vivado", "").is_err());
        assert!(StageId::new("viv ado", "write").is_err());
        assert!(StageId::parse("vivado:write:extra").is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let id = StageId::parse("model:optimize").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, r#""model:optimize""#);

        let back: StageId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<StageId>(r#""optimize""#).is_err());
    }
}
