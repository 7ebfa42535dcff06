use crate::core::chunks::{ChunkPolicy, FallbackChunk};
use crate::core::layer::ConfigLayer;
use crate::core::merge::{fold_seq, merge_settings};
use crate::core::plugins::{PluginHook, PluginPipeline, PluginSpec};
use crate::core::rules::RuleTable;
use crate::utils::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// Options for one composition run. Everything here is pass-through
/// surface: the environment selector, an optional caller layer, and the
/// CLI-equivalent knobs that become the strongest layer.
#[derive(Debug, Clone, Default)]
pub struct ComposeOptions {
    pub environment: String,
    pub overrides: Option<ConfigLayer>,
    pub working_dir: PathBuf,
    pub output_root: Option<String>,
    pub dev_host: Option<String>,
    pub dev_port: Option<u16>,
}

impl ComposeOptions {
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
            working_dir: PathBuf::from("."),
            ..Default::default()
        }
    }

    pub fn with_overrides(mut self, overrides: ConfigLayer) -> Self {
        self.overrides = Some(overrides);
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }
}

/// The single resolved configuration: the system's sole output. Created
/// once per invocation, immutable thereafter, serializable for the
/// external build executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedConfig {
    pub environment: String,
    pub settings: Value,
    pub rules: RuleTable,
    pub plugins: PluginPipeline,
    pub chunking: ChunkPolicy,
}

impl MergedConfig {
    /// Merge an ordered run of layers into the final configuration.
    pub fn from_layers(environment: &str, layers: &[ConfigLayer]) -> Result<Self> {
        let settings = merge_settings(layers)?;
        let rules = RuleTable::new(fold_seq(layers, |l| &l.rules))?;
        let plugins = PluginPipeline::new(fold_seq::<PluginSpec, _>(layers, |l| &l.plugins));
        let chunking = chunk_policy_from(&settings, fold_seq(layers, |l| &l.chunk_groups));

        Ok(Self {
            environment: environment.to_string(),
            settings,
            rules,
            plugins,
            chunking,
        })
    }

    /// Look up a merged setting by dot-separated key path.
    pub fn setting(&self, path: &str) -> Option<&Value> {
        lookup(&self.settings, path)
    }

    pub fn plugins_for_hook(&self, hook: PluginHook) -> Vec<&PluginSpec> {
        self.plugins.for_hook(hook).collect()
    }
}

fn lookup<'v>(settings: &'v Value, path: &str) -> Option<&'v Value> {
    let mut current = settings;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

fn chunk_policy_from(settings: &Value, groups: Vec<crate::core::chunks::ChunkGroup>) -> ChunkPolicy {
    let defaults = ChunkPolicy::default();
    let fallback_defaults = FallbackChunk::default();

    ChunkPolicy {
        max_bytes: lookup(settings, "chunking.max_bytes")
            .and_then(Value::as_u64)
            .unwrap_or(defaults.max_bytes),
        min_shared_users: lookup(settings, "chunking.min_shared_users")
            .and_then(Value::as_u64)
            .map(|v| v as usize)
            .unwrap_or(defaults.min_shared_users),
        fallback: FallbackChunk {
            name: lookup(settings, "chunking.fallback.name")
                .and_then(Value::as_str)
                .unwrap_or(&fallback_defaults.name)
                .to_string(),
            min_shared_users: lookup(settings, "chunking.fallback.min_shared_users")
                .and_then(Value::as_u64)
                .map(|v| v as usize)
                .unwrap_or(fallback_defaults.min_shared_users),
            reuse_existing_chunk: lookup(settings, "chunking.fallback.reuse_existing_chunk")
                .and_then(Value::as_bool)
                .unwrap_or(fallback_defaults.reuse_existing_chunk),
        },
        groups,
    }
}

/// One artifact the executor wrote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputArtifact {
    pub path: PathBuf,
    pub size: u64,
}

/// What an external executor reports back after consuming a MergedConfig.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct BuildReport {
    pub artifacts: Vec<OutputArtifact>,
    pub success: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::chunks::ChunkGroup;
    use crate::core::rules::{ResourceMatcher, Rule};
    use serde_json::json;

    #[test]
    fn test_from_layers_folds_typed_sequences() {
        let base = ConfigLayer::new("base")
            .with_setting("output.filename", json!("[hash].js"))
            .with_rule(Rule::new(
                "scripts",
                ResourceMatcher::extensions(["js"]),
                true,
            ));
        let prod = ConfigLayer::new("production")
            .with_plugin(PluginSpec::new("clean", PluginHook::PreBuild))
            .with_plugin(PluginSpec::new("compress", PluginHook::PostBuild));
        let overrides = ConfigLayer::new("overrides")
            .with_plugin(PluginSpec::new("bundle-report", PluginHook::PostBuild));

        let merged = MergedConfig::from_layers("production", &[base, prod, overrides]).unwrap();

        assert_eq!(
            merged.plugins.names(),
            vec!["clean", "compress", "bundle-report"]
        );
        assert_eq!(merged.setting("output.filename"), Some(&json!("[hash].js")));
        assert_eq!(merged.rules.len(), 1);
    }

    #[test]
    fn test_chunk_policy_reads_settings_and_groups() {
        let base = ConfigLayer::new("base")
            .with_setting("chunking.max_bytes", json!(600_000))
            .with_setting("chunking.min_shared_users", json!(5))
            .with_setting("chunking.fallback.min_shared_users", json!(2))
            .with_chunk_group(ChunkGroup::new(
                "vendors",
                ResourceMatcher::pattern(r"node_modules"),
                -10,
            ));

        let merged = MergedConfig::from_layers("production", &[base]).unwrap();

        assert_eq!(merged.chunking.max_bytes, 600_000);
        assert_eq!(merged.chunking.min_shared_users, 5);
        assert_eq!(merged.chunking.fallback.min_shared_users, 2);
        assert_eq!(merged.chunking.groups.len(), 1);
        assert_eq!(merged.chunking.groups[0].name, "vendors");
    }

    #[test]
    fn test_merged_config_round_trips_through_json() {
        let base = ConfigLayer::new("base")
            .with_setting("devtool", json!("source-map"))
            .with_rule(Rule::new(
                "styles",
                ResourceMatcher::extensions(["css"]),
                true,
            ))
            .with_plugin(PluginSpec::new("css-extract", PluginHook::Emit));

        let merged = MergedConfig::from_layers("development", &[base]).unwrap();
        let encoded = serde_json::to_string(&merged).unwrap();
        let decoded: MergedConfig = serde_json::from_str(&encoded).unwrap();

        assert_eq!(decoded, merged);
    }
}
