//! Backend-independent model flows.

use std::collections::HashSet;

use tracing::debug;

use crate::context::BuildContext;
use crate::core::StageId;
use crate::errors::{ActionError, FlowError};
use crate::pipeline::StageRegistry;
use crate::stages::{action, SharedAction, StageActions};

/// Scope of the model flows.
pub const MODEL_SCOPE: &str = "model";

/// Layer class removed by `model:optimize`.
const PASS_THROUGH_CLASS: &str = "Linear";

/// Ids of the model flows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFlows {
    /// `model:convert`.
    pub convert: StageId,
    /// `model:optimize`.
    pub optimize: StageId,
}

impl ModelFlows {
    /// Registers the model flows unless they are already present.
    ///
    /// # Errors
    ///
    /// Returns any registration error.
    pub fn register(registry: &StageRegistry) -> Result<Self, FlowError> {
        let convert = StageId::new(MODEL_SCOPE, "convert")?;
        let optimize = StageId::new(MODEL_SCOPE, "optimize")?;

        if !registry.contains(&convert) {
            registry.register(convert.clone(), StageActions::fixed([check_layers()]), vec![])?;
        }
        if !registry.contains(&optimize) {
            registry.register(
                optimize.clone(),
                StageActions::fixed([remove_pass_through()]),
                vec![convert.clone()],
            )?;
        }
        Ok(Self { convert, optimize })
    }
}

fn check_layers() -> SharedAction {
    action("model:check_layers", |ctx: &mut BuildContext| {
        if ctx.layers().is_empty() {
            return Err(ActionError::rejected("model has no layers"));
        }
        let mut seen = HashSet::new();
        for layer in ctx.layers() {
            if !seen.insert(layer.name.as_str()) {
                return Err(ActionError::rejected(format!(
                    "duplicate layer name '{}'",
                    layer.name
                )));
            }
        }
        Ok(())
    })
}

fn remove_pass_through() -> SharedAction {
    action("model:remove_pass_through", |ctx: &mut BuildContext| {
        let before = ctx.layers().len();
        ctx.layers_mut().retain(|l| l.class_name != PASS_THROUGH_CLASS);
        let removed = before - ctx.layers().len();
        if removed > 0 {
            debug!(removed, "Removed pass-through layers");
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildConfig;
    use crate::context::Layer;
    use crate::pipeline::PipelineRunner;

    #[tokio::test]
    async fn test_optimize_removes_linear() {
        let registry = StageRegistry::new();
        let flows = ModelFlows::register(&registry).unwrap();

        let mut ctx = BuildContext::new(
            BuildConfig::default(),
            vec![Layer::new("fc1", "Dense"), Layer::new("lin", "Linear")],
        );
        let outcome = PipelineRunner::default()
            .run_target(&registry, &flows.optimize, &mut ctx)
            .await
            .unwrap();

        assert!(outcome.is_success());
        assert_eq!(ctx.layers().len(), 1);
    }

    #[tokio::test]
    async fn test_convert_rejects_duplicates() {
        let registry = StageRegistry::new();
        let flows = ModelFlows::register(&registry).unwrap();

        let mut ctx = BuildContext::new(
            BuildConfig::default(),
            vec![Layer::new("fc1", "Dense"), Layer::new("fc1", "Dense")],
        );
        let outcome = PipelineRunner::default()
            .run_target(&registry, &flows.convert, &mut ctx)
            .await
            .unwrap();

        assert!(!outcome.is_success());
        assert!(outcome.failure.unwrap().to_string().contains("duplicate layer"));
    }

    #[test]
    fn test_register_twice_keeps_flows() {
        let registry = StageRegistry::new();
        ModelFlows::register(&registry).unwrap();
        ModelFlows::register(&registry).unwrap();
        assert_eq!(registry.flows_in_scope(MODEL_SCOPE).len(), 2);
    }
}
