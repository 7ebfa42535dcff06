use crate::core::layer::ConfigLayer;
use crate::core::models::{ComposeOptions, MergedConfig};
use crate::utils::{EnvVars, Logger, Result, StrataError, Timer};
use serde_json::json;

pub const DEVELOPMENT: &str = "development";
pub const PRODUCTION: &str = "production";

/// Registry of the base layer and named environment overlays. Layer order
/// is fixed: base first (weakest), the selected overlay next, explicit
/// overrides last (strongest).
#[derive(Debug, Clone)]
pub struct EnvironmentResolver {
    base: ConfigLayer,
    overlays: Vec<(String, ConfigLayer)>,
}

impl EnvironmentResolver {
    pub fn new(base: ConfigLayer) -> Self {
        Self {
            base,
            overlays: Vec::new(),
        }
    }

    /// Register (or replace) an overlay under a name.
    pub fn with_overlay(mut self, name: impl Into<String>, overlay: ConfigLayer) -> Self {
        let name = name.into();
        if let Some(slot) = self.overlays.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = overlay;
        } else {
            self.overlays.push((name, overlay));
        }
        self
    }

    pub fn environments(&self) -> Vec<String> {
        self.overlays.iter().map(|(n, _)| n.clone()).collect()
    }

    pub fn overlay(&self, environment: &str) -> Option<&ConfigLayer> {
        self.overlays
            .iter()
            .find(|(n, _)| n == environment)
            .map(|(_, layer)| layer)
    }

    /// Select the layer run for an environment: `[base, overlay,
    /// overrides?]`, weakest first.
    pub fn resolve_layers(
        &self,
        environment: &str,
        overrides: Option<ConfigLayer>,
    ) -> Result<Vec<ConfigLayer>> {
        let overlay = self.overlay(environment).ok_or_else(|| {
            StrataError::UnknownEnvironment {
                name: environment.to_string(),
                registered: self.environments(),
            }
        })?;

        let mut layers = vec![self.base.clone(), overlay.clone()];
        if let Some(overrides) = overrides {
            layers.push(overrides);
        }
        Ok(layers)
    }
}

/// Compose the final configuration for one run. The `.env` file set of the
/// working directory joins the run as a named overlay entry after the
/// environment overlay; CLI knobs become the strongest layer.
pub fn compose(resolver: &EnvironmentResolver, opts: ComposeOptions) -> Result<MergedConfig> {
    let timer = Timer::start("compose");

    let mut layers = resolver.resolve_layers(&opts.environment, opts.overrides.clone())?;
    let env_layer = EnvVars::load_for(&opts.working_dir, &opts.environment)?
        .into_layer(&opts.environment);
    layers.insert(2, env_layer);

    if let Some(cli) = cli_layer(&opts) {
        layers.push(cli);
    }

    let names: Vec<String> = layers.iter().map(|l| l.name.clone()).collect();
    Logger::layers_resolved(&names);

    let merged = MergedConfig::from_layers(&opts.environment, &layers)?;
    Logger::compose_complete(
        merged.rules.len(),
        merged.plugins.len(),
        merged.chunking.groups.len(),
        timer.elapsed(),
    );
    Ok(merged)
}

fn cli_layer(opts: &ComposeOptions) -> Option<ConfigLayer> {
    let mut layer = ConfigLayer::new("cli");
    let mut touched = false;

    if let Some(root) = &opts.output_root {
        layer = layer.with_setting("output.path", json!(root));
        touched = true;
    }
    if let Some(port) = opts.dev_port {
        layer = layer.with_setting("dev_server.port", json!(port));
        touched = true;
    }
    if let Some(host) = &opts.dev_host {
        layer = layer.with_setting("dev_server.host", json!(host));
        touched = true;
    }

    touched.then_some(layer)
}
