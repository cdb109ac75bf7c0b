//! Flow composition: derive a flow from a base flow's `requires`.

use super::{DependencyResolver, StageRegistry};
use crate::core::StageId;
use crate::errors::{AnchorNotFoundError, FlowError};
use crate::stages::{SharedAction, StageActions};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Where an inserted stage goes relative to its anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    /// Immediately before the anchor.
    Before,
    /// Immediately after the anchor.
    After,
}

/// One anchor-relative insertion into a `requires` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insertion {
    /// Existing entry to insert next to.
    pub anchor: StageId,
    /// Stage id to insert.
    pub stage: StageId,
    /// Side of the anchor.
    pub position: Position,
}

impl Insertion {
    /// Inserts `stage` immediately before `anchor`.
    #[must_use]
    pub fn before(anchor: StageId, stage: StageId) -> Self {
        Self {
            anchor,
            stage,
            position: Position::Before,
        }
    }

    /// Inserts `stage` immediately after `anchor`.
    #[must_use]
    pub fn after(anchor: StageId, stage: StageId) -> Self {
        Self {
            anchor,
            stage,
            position: Position::After,
        }
    }
}

/// Applies insertions to a copy of `requires`.
///
/// Insertions apply in order; each one looks for the first occurrence of its
/// anchor in the list as modified by the insertions before it.
///
/// # Errors
///
/// Returns [`AnchorNotFoundError`] for the first anchor not in the list.
pub fn insert_relative(
    base: &StageId,
    requires: &[StageId],
    insertions: &[Insertion],
) -> Result<Vec<StageId>, AnchorNotFoundError> {
    let mut list = requires.to_vec();
    for insertion in insertions {
        let index = list
            .iter()
            .position(|id| id == &insertion.anchor)
            .ok_or_else(|| AnchorNotFoundError::new(base.clone(), insertion.anchor.clone()))?;
        let at = match insertion.position {
            Position::Before => index,
            Position::After => index + 1,
        };
        list.insert(at, insertion.stage.clone());
    }
    Ok(list)
}

/// Builds derived flows out of registered ones.
///
/// Composition never touches the base descriptor: it reads the base's
/// `requires`, copies it, and hands back the edited copy for registration
/// under a new id.
#[derive(Debug, Clone, Copy)]
pub struct FlowComposer<'a> {
    registry: &'a StageRegistry,
}

impl<'a> FlowComposer<'a> {
    /// Creates a composer over a registry.
    #[must_use]
    pub fn new(registry: &'a StageRegistry) -> Self {
        Self { registry }
    }

    /// Returns the base flow's `requires` with the insertions applied.
    ///
    /// # Errors
    ///
    /// - [`FlowError::UnknownStage`] if the base is not registered.
    /// - [`FlowError::AnchorNotFound`] if an anchor is not in the list.
    pub fn extend(&self, base: &StageId, insertions: &[Insertion]) -> Result<Vec<StageId>, FlowError> {
        let descriptor = self.registry.lookup(base)?;
        let requires = insert_relative(base, descriptor.requires(), insertions)?;
        debug!(
            base = %base,
            insertions = insertions.len(),
            requires = ?requires.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "Extended flow"
        );
        Ok(requires)
    }

    /// Extends `base` and registers the result as `id`.
    ///
    /// # Errors
    ///
    /// Returns any error of [`extend`](Self::extend) or of registration.
    pub fn derive(
        &self,
        id: StageId,
        base: &StageId,
        insertions: &[Insertion],
        actions: StageActions,
    ) -> Result<StageId, FlowError> {
        let requires = self.extend(base, insertions)?;
        self.registry.register(id, actions, requires)
    }

    /// Returns `head` followed by `flow`'s own actions.
    ///
    /// This is how a flow re-runs another flow's work after its own: an
    /// optimization flow lists `[optimize] + write actions`, so the write
    /// actions run again on the mutated context even when the write flow
    /// already ran earlier in the build. The write flow's actions are
    /// captured now.
    ///
    /// # Errors
    ///
    /// Returns [`FlowError::UnknownStage`] if `flow` is not registered.
    pub fn append_flow_actions(
        &self,
        head: Vec<SharedAction>,
        flow: &StageId,
    ) -> Result<StageActions, FlowError> {
        let descriptor = self.registry.lookup(flow)?;
        let mut actions = head;
        actions.extend(descriptor.actions().materialize().unwrap_or_default());
        Ok(StageActions::Fixed(actions))
    }

    /// Returns `head` followed by every action of `target`'s resolved
    /// sequence, prerequisites included.
    ///
    /// # Errors
    ///
    /// Returns any resolve error for `target`.
    pub fn append_resolved_actions(
        &self,
        head: Vec<SharedAction>,
        target: &StageId,
    ) -> Result<StageActions, FlowError> {
        let plan = DependencyResolver::new(self.registry).resolve(target)?;
        let mut actions = head;
        actions.extend(plan.actions());
        Ok(StageActions::Fixed(actions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::NoOpAction;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn id(s: &str) -> StageId {
        StageId::parse(s).unwrap()
    }

    fn names(actions: &StageActions) -> Vec<String> {
        actions
            .materialize()
            .unwrap_or_default()
            .iter()
            .map(|a| a.name().to_string())
            .collect()
    }

    #[test]
    fn test_insert_before() {
        let list = vec![id("b:p"), id("b:a"), id("b:q")];
        let out = insert_relative(&id("b:flow"), &list, &[Insertion::before(id("b:a"), id("c:x"))]).unwrap();
        assert_eq!(out, vec![id("b:p"), id("c:x"), id("b:a"), id("b:q")]);
    }

    #[test]
    fn test_insert_after() {
        let list = vec![id("b:p"), id("b:a"), id("b:q")];
        let out = insert_relative(&id("b:flow"), &list, &[Insertion::after(id("b:a"), id("c:x"))]).unwrap();
        assert_eq!(out, vec![id("b:p"), id("b:a"), id("c:x"), id("b:q")]);
    }

    #[test]
    fn test_insert_uses_first_occurrence() {
        let list = vec![id("b:a"), id("b:p"), id("b:a")];
        let out = insert_relative(&id("b:flow"), &list, &[Insertion::after(id("b:a"), id("c:x"))]).unwrap();
        assert_eq!(out, vec![id("b:a"), id("c:x"), id("b:p"), id("b:a")]);
    }

    #[test]
    fn test_insertions_see_earlier_insertions() {
        let list = vec![id("b:init"), id("b:templates")];
        let out = insert_relative(
            &id("b:ip"),
            &list,
            &[
                Insertion::before(id("b:init"), id("c:validation")),
                Insertion::after(id("c:validation"), id("c:extra")),
                Insertion::before(id("b:templates"), id("c:templates")),
            ],
        )
        .unwrap();
        assert_eq!(
            out,
            vec![id("c:validation"), id("c:extra"), id("b:init"), id("c:templates"), id("b:templates")]
        );
    }

    #[test]
    fn test_missing_anchor() {
        let list = vec![id("b:p")];
        let err = insert_relative(&id("b:flow"), &list, &[Insertion::before(id("b:a"), id("c:x"))]).unwrap_err();
        assert_eq!(err.anchor, id("b:a"));
        assert_eq!(err.base, id("b:flow"));
    }

    #[test]
    fn test_extend_is_non_destructive() {
        let registry = StageRegistry::new();
        registry.register(id("base:validate"), StageActions::None, vec![]).unwrap();
        registry
            .register(id("base:init"), StageActions::None, vec![id("base:validate")])
            .unwrap();

        let composer = FlowComposer::new(&registry);
        let requires = composer
            .extend(&id("base:init"), &[Insertion::before(id("base:validate"), id("child:validate"))])
            .unwrap();

        assert_eq!(requires, vec![id("child:validate"), id("base:validate")]);
        assert_eq!(
            registry.lookup(&id("base:init")).unwrap().requires(),
            &[id("base:validate")]
        );
    }

    #[test]
    fn test_extend_unknown_base() {
        let registry = StageRegistry::new();
        let err = FlowComposer::new(&registry)
            .extend(&id("vivado:ip"), &[])
            .unwrap_err();
        assert!(matches!(err, FlowError::UnknownStage(_)));
    }

    #[test]
    fn test_derive_registers_new_flow() {
        let registry = StageRegistry::new();
        registry.register(id("base:a"), StageActions::None, vec![]).unwrap();
        registry.register(id("base:flow"), StageActions::None, vec![id("base:a")]).unwrap();
        registry.register(id("child:b"), StageActions::None, vec![]).unwrap();

        let derived = FlowComposer::new(&registry)
            .derive(
                id("child:flow"),
                &id("base:flow"),
                &[Insertion::after(id("base:a"), id("child:b"))],
                StageActions::None,
            )
            .unwrap();

        assert_eq!(
            registry.lookup(&derived).unwrap().requires(),
            &[id("base:a"), id("child:b")]
        );
    }

    #[test]
    fn test_derive_missing_anchor_registers_nothing() {
        let registry = StageRegistry::new();
        registry.register(id("base:flow"), StageActions::None, vec![]).unwrap();

        let err = FlowComposer::new(&registry)
            .derive(
                id("child:flow"),
                &id("base:flow"),
                &[Insertion::before(id("base:a"), id("child:b"))],
                StageActions::None,
            )
            .unwrap_err();
        assert!(matches!(err, FlowError::AnchorNotFound(_)));
        assert!(!registry.contains(&id("child:flow")));
    }

    #[test]
    fn test_append_flow_actions() {
        let registry = StageRegistry::new();
        registry
            .register(
                id("base:write"),
                StageActions::fixed([
                    Arc::new(NoOpAction::new("make_stamp")) as SharedAction,
                    Arc::new(NoOpAction::new("write_hls")) as SharedAction,
                ]),
                vec![],
            )
            .unwrap();

        let actions = FlowComposer::new(&registry)
            .append_flow_actions(vec![Arc::new(NoOpAction::new("optimize")) as SharedAction], &id("base:write"))
            .unwrap();
        assert_eq!(names(&actions), vec!["optimize", "make_stamp", "write_hls"]);
    }

    #[test]
    fn test_append_resolved_actions() {
        let registry = StageRegistry::new();
        registry
            .register(
                id("base:init"),
                StageActions::fixed([Arc::new(NoOpAction::new("init")) as SharedAction]),
                vec![],
            )
            .unwrap();
        registry
            .register(
                id("base:write"),
                StageActions::fixed([Arc::new(NoOpAction::new("write_hls")) as SharedAction]),
                vec![id("base:init")],
            )
            .unwrap();

        let actions = FlowComposer::new(&registry)
            .append_resolved_actions(vec![Arc::new(NoOpAction::new("optimize")) as SharedAction], &id("base:write"))
            .unwrap();
        assert_eq!(names(&actions), vec!["optimize", "init", "write_hls"]);
    }
}
