use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle points an external interpreter drives plugins at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginHook {
    /// Before any transform runs: cleanup, env injection, locale filters.
    PreBuild,
    /// While artifacts are written: HTML emission, asset copies, CSS
    /// extraction.
    Emit,
    /// After the output tree exists: compression, analysis reports.
    PostBuild,
}

/// A declarative plugin entry: a name the external interpreter resolves,
/// the hook it runs at, and opaque options. The composer never constructs
/// or calls the tool behind it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginSpec {
    pub name: String,
    pub hook: PluginHook,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub options: Value,
}

impl PluginSpec {
    pub fn new(name: impl Into<String>, hook: PluginHook) -> Self {
        Self {
            name: name.into(),
            hook,
            options: Value::Null,
        }
    }

    pub fn with_options(name: impl Into<String>, hook: PluginHook, options: Value) -> Self {
        Self {
            name: name.into(),
            hook,
            options,
        }
    }
}

/// Ordered plugin set attached to a merged configuration. Order is
/// layer-then-declaration order, fixed by the merger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct PluginPipeline {
    specs: Vec<PluginSpec>,
}

impl PluginPipeline {
    pub fn new(specs: Vec<PluginSpec>) -> Self {
        Self { specs }
    }

    pub fn specs(&self) -> &[PluginSpec] {
        &self.specs
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.specs.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.specs.iter().any(|s| s.name == name)
    }

    /// Entries for one hook, preserving pipeline order.
    pub fn for_hook(&self, hook: PluginHook) -> impl Iterator<Item = &PluginSpec> {
        self.specs.iter().filter(move |s| s.hook == hook)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_for_hook_preserves_order() {
        let pipeline = PluginPipeline::new(vec![
            PluginSpec::new("clean", PluginHook::PreBuild),
            PluginSpec::new("html-emit", PluginHook::Emit),
            PluginSpec::new("env-inject", PluginHook::PreBuild),
            PluginSpec::new("compress", PluginHook::PostBuild),
        ]);

        let pre: Vec<_> = pipeline
            .for_hook(PluginHook::PreBuild)
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(pre, vec!["clean", "env-inject"]);
    }

    #[test]
    fn test_hook_serializes_snake_case() {
        let spec = PluginSpec::with_options(
            "bundle-report",
            PluginHook::PostBuild,
            json!({"mode": "static"}),
        );
        let encoded = serde_json::to_value(&spec).unwrap();
        assert_eq!(encoded["hook"], json!("post_build"));

        let decoded: PluginSpec = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, spec);
    }
}
