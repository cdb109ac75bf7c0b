//! Configuration validators for the Vitis backend.

use tracing::warn;

use crate::config::Strategy;
use crate::context::BuildContext;
use crate::errors::ActionError;
use crate::stages::{action, SharedAction};

/// Warns about convolution implementations Vitis handles poorly.
pub fn validate_conv_implementation() -> SharedAction {
    action("vitis:validate_conv_implementation", |ctx: &mut BuildContext| {
        let flagged: Vec<String> = ctx
            .layers()
            .iter()
            .filter(|l| l.is_conv())
            .filter(|l| {
                l.conv_implementation
                    .as_deref()
                    .is_some_and(|i| i.eq_ignore_ascii_case("encoded"))
            })
            .map(|l| l.name.clone())
            .collect();

        for layer in flagged {
            warn!(layer = %layer, "Encoded convolution is unstable with Vitis");
            ctx.warn(format!(
                "{layer}: \"Encoded\" convolution implementation may produce wrong results \
                 with Vitis; consider \"LineBuffer\""
            ));
        }
        Ok(())
    })
}

/// Warns about resource strategy layers with a reuse factor of one.
pub fn validate_resource_strategy() -> SharedAction {
    action("vitis:validate_resource_strategy", |ctx: &mut BuildContext| {
        let flagged: Vec<String> = ctx
            .layers()
            .iter()
            .filter(|l| l.strategy == Some(Strategy::Resource))
            .filter(|l| matches!(l.class_name.as_str(), "Dense" | "Conv1D" | "Conv2D"))
            .filter(|l| l.reuse_factor == Some(1))
            .map(|l| l.name.clone())
            .collect();

        for layer in flagged {
            warn!(layer = %layer, "Resource strategy with reuse factor 1");
            ctx.warn(format!(
                "{layer}: Resource strategy with reuse factor 1 may fail to meet timing with Vitis"
            ));
        }
        Ok(())
    })
}

/// Rejects unrolled resource strategy layers that cannot reuse anything.
pub fn validate_resource_unrolled_strategy() -> SharedAction {
    action(
        "vitis:validate_resource_unrolled_strategy",
        |ctx: &mut BuildContext| {
            if let Some(layer) = ctx
                .layers()
                .iter()
                .find(|l| l.strategy == Some(Strategy::ResourceUnrolled) && l.reuse_factor == Some(1))
            {
                return Err(ActionError::rejected(format!(
                    "{}: unrolled resource strategy needs a reuse factor greater than 1",
                    layer.name
                )));
            }

            let unrolled = ctx
                .layers()
                .iter()
                .filter(|l| l.strategy == Some(Strategy::ResourceUnrolled))
                .count();
            if unrolled > 0 {
                warn!(layers = unrolled, "Unrolled resource strategy may need a larger maximum_size");
            }
            Ok(())
        },
    )
}

/// Returns the three validators in execution order.
pub fn vitis_validators() -> Vec<SharedAction> {
    vec![
        validate_conv_implementation(),
        validate_resource_strategy(),
        validate_resource_unrolled_strategy(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildConfig;
    use crate::context::Layer;

    fn ctx(layers: Vec<Layer>) -> BuildContext {
        BuildContext::new(BuildConfig::default(), layers)
    }

    #[tokio::test]
    async fn test_conv_implementation_warning() {
        let mut ctx = ctx(vec![
            Layer::new("conv1", "Conv2D").with_conv_implementation("Encoded"),
            Layer::new("conv2", "Conv2D").with_conv_implementation("LineBuffer"),
        ]);
        validate_conv_implementation().run(&mut ctx).await.unwrap();

        assert_eq!(ctx.warnings().len(), 1);
        assert!(ctx.warnings()[0].starts_with("conv1"));
    }

    #[tokio::test]
    async fn test_resource_strategy_warning() {
        let mut ctx = ctx(vec![
            Layer::new("fc1", "Dense").with_strategy(Strategy::Resource).with_reuse_factor(1),
            Layer::new("fc2", "Dense").with_strategy(Strategy::Resource).with_reuse_factor(8),
        ]);
        validate_resource_strategy().run(&mut ctx).await.unwrap();

        assert_eq!(ctx.warnings().len(), 1);
    }

    #[tokio::test]
    async fn test_resource_unrolled_rejected() {
        let mut ctx = ctx(vec![Layer::new("fc1", "Dense")
            .with_strategy(Strategy::ResourceUnrolled)
            .with_reuse_factor(1)]);
        let err = validate_resource_unrolled_strategy().run(&mut ctx).await.unwrap_err();
        assert!(err.to_string().contains("fc1"));
    }

    #[tokio::test]
    async fn test_validators_pass_clean_model() {
        let mut ctx = ctx(vec![Layer::new("fc1", "Dense").with_reuse_factor(1)]);
        for validator in vitis_validators() {
            validator.run(&mut ctx).await.unwrap();
        }
        assert!(ctx.warnings().is_empty());
    }
}
