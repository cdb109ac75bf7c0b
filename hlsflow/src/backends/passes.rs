//! Layer passes shared by the HLS backends.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::IoType;
use crate::context::BuildContext;
use crate::errors::ActionError;
use crate::stages::{action, Action, SharedAction};
use async_trait::async_trait;

/// Stream depth given to layers that have none in streaming designs.
pub const DEFAULT_STREAM_DEPTH: u32 = 1;

/// Context key holding observed FIFO occupancy per layer.
pub const FIFO_PROFILE_KEY: &str = "fifo_profile";

/// Context key holding the boundary types chosen by `specific_types`.
pub const IO_TYPES_KEY: &str = "io_types";

/// Fills unset strategy and reuse factor from the project config.
pub fn init_layers(name: &str) -> SharedAction {
    action(name, |ctx: &mut BuildContext| {
        let strategy = ctx.config().strategy;
        let reuse = ctx.config().reuse_factor;
        for layer in ctx.layers_mut() {
            layer.strategy.get_or_insert(strategy);
            layer.reuse_factor.get_or_insert(reuse);
        }
        debug!(layers = ctx.layers().len(), %strategy, reuse, "Initialized layers");
        Ok(())
    })
}

/// Gives every layer an output FIFO depth in `io_stream` designs.
pub fn streaming(name: &str) -> SharedAction {
    action(name, |ctx: &mut BuildContext| {
        if ctx.config().io_type != IoType::IoStream {
            return Ok(());
        }
        let depth = ctx.config().fifo_depth.unwrap_or(DEFAULT_STREAM_DEPTH);
        for layer in ctx.layers_mut() {
            layer.fifo_depth.get_or_insert(depth);
        }
        Ok(())
    })
}

/// Clamps reuse factors to at least one.
pub fn optimize_reuse(name: &str) -> SharedAction {
    action(name, |ctx: &mut BuildContext| {
        let mut clamped = Vec::new();
        for layer in ctx.layers_mut() {
            if layer.reuse_factor == Some(0) {
                layer.reuse_factor = Some(1);
                clamped.push(layer.name.clone());
            }
        }
        for layer in clamped {
            warn!(layer = %layer, "Reuse factor 0 replaced by 1");
            ctx.warn(format!("{layer}: reuse factor 0 replaced by 1"));
        }
        Ok(())
    })
}

/// Records the accelerator boundary types.
pub fn specific_types(name: &str) -> SharedAction {
    action(name, |ctx: &mut BuildContext| {
        let accel = &ctx.config().accelerator;
        let types = serde_json::json!({
            "input": accel.input_precision.to_string(),
            "output": accel.output_precision.to_string(),
        });
        ctx.set(IO_TYPES_KEY, types);
        Ok(())
    })
}

/// Generates code for every layer of one class that has none yet.
#[derive(Debug, Clone)]
pub struct LayerTemplate {
    name: String,
    backend: &'static str,
    class_name: String,
}

impl LayerTemplate {
    /// Creates a template action for a layer class.
    #[must_use]
    pub fn new(backend: &'static str, class_name: impl Into<String>) -> Self {
        let class_name = class_name.into();
        Self {
            name: format!("{backend}:{}_template", class_name.to_lowercase()),
            backend,
            class_name,
        }
    }

    fn render(&self, layer: &crate::context::Layer) -> String {
        format!(
            "// {backend} {class} template\nnnet::{function}<{name}_config>({name}_in, {name}_out); // strategy={strategy} reuse={reuse}",
            backend = self.backend,
            class = self.class_name,
            function = self.class_name.to_lowercase(),
            name = layer.name,
            strategy = layer.strategy.unwrap_or_default(),
            reuse = layer.reuse_factor.unwrap_or(1),
        )
    }
}

#[async_trait]
impl Action for LayerTemplate {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &mut BuildContext) -> Result<(), ActionError> {
        let rendered: Vec<(String, String)> = ctx
            .layers()
            .iter()
            .filter(|layer| layer.class_name == self.class_name && !ctx.has_generated(&layer.name))
            .map(|layer| (layer.name.clone(), self.render(layer)))
            .collect();
        for (layer, code) in rendered {
            ctx.set_generated(layer, code);
        }
        Ok(())
    }
}

/// Returns one template action per layer class.
pub fn layer_templates(backend: &'static str, classes: &[&str]) -> Vec<SharedAction> {
    classes
        .iter()
        .map(|class| Arc::new(LayerTemplate::new(backend, *class)) as SharedAction)
        .collect()
}

/// Sets every layer's FIFO depth from the observed occupancy profile.
///
/// Layers missing from the profile get the configured depth. The following
/// write regenerates the project with the new depths.
#[derive(Debug, Clone)]
pub struct FifoDepthOptimization {
    name: String,
}

impl FifoDepthOptimization {
    /// Creates the pass for a backend.
    #[must_use]
    pub fn new(backend: &str) -> Self {
        Self {
            name: format!("{backend}:fifo_depth_optimization"),
        }
    }
}

#[async_trait]
impl Action for FifoDepthOptimization {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &mut BuildContext) -> Result<(), ActionError> {
        if ctx.config().io_type != IoType::IoStream {
            return Err(ActionError::rejected(
                "FIFO depth optimization only works with io_stream",
            ));
        }

        let profile = ctx.get(FIFO_PROFILE_KEY).cloned().unwrap_or_default();
        let fallback = ctx.config().fifo_depth.unwrap_or(DEFAULT_STREAM_DEPTH);
        let mut depths = Vec::with_capacity(ctx.layers().len());
        for layer in ctx.layers() {
            let depth = match profile.get(&layer.name) {
                None => fallback,
                Some(value) => {
                    let observed = value
                        .as_u64()
                        .and_then(|n| u32::try_from(n).ok())
                        .ok_or_else(|| {
                            warn!(layer = %layer.name, %value, "Unusable FIFO occupancy");
                            ActionError::rejected(format!(
                                "{}: FIFO occupancy {value} is not a 32-bit depth",
                                layer.name
                            ))
                        })?;
                    observed.saturating_add(1)
                }
            };
            depths.push(depth);
        }
        for (layer, depth) in ctx.layers_mut().iter_mut().zip(depths) {
            layer.fifo_depth = Some(depth);
        }
        info!(layers = ctx.layers().len(), "Optimized FIFO depths");
        Ok(())
    }
}
