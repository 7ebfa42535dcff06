use crate::core::chunks::ChunkGroup;
use crate::core::plugins::PluginSpec;
use crate::core::rules::Rule;
use crate::utils::{Result, StrataError};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;

/// One key's contribution from one layer. The variant is the override
/// marker: layer authors choose it, the merger never infers it from the
/// runtime type of the value.
#[derive(Debug, Clone, PartialEq)]
pub enum Patch {
    /// Leaf scalar. Overrides a scalar beneath it, conflicts with anything
    /// structured.
    Value(Value),
    /// Key-by-key recursive merge into the mapping beneath it.
    Merge(BTreeMap<String, Patch>),
    /// Concatenation onto the sequence built so far.
    Append(Vec<Value>),
    /// Wholesale replacement of whatever is beneath it.
    Replace(Value),
}

impl Patch {
    /// Convert a plain JSON value into its default patch: scalars set,
    /// mappings merge, sequences replace (positional semantics). No marker
    /// interpretation; programmatic authors reach for `Append`/`Replace`
    /// directly.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Patch::Merge(
                map.into_iter()
                    .map(|(k, v)| (k, Patch::from_value(v)))
                    .collect(),
            ),
            Value::Array(_) => Patch::Replace(value),
            _ => Patch::Value(value),
        }
    }

    /// Parse a JSON value from an override file, honoring the documented
    /// markers: `{"$replace": v}` and `{"$append": [..]}`.
    pub fn from_json(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => {
                if map.len() == 1 {
                    if let Some(inner) = map.get("$replace") {
                        return Ok(Patch::Replace(inner.clone()));
                    }
                    if let Some(inner) = map.get("$append") {
                        return match inner {
                            Value::Array(items) => Ok(Patch::Append(items.clone())),
                            _ => Err(StrataError::config(
                                "$append marker requires a JSON array",
                            )),
                        };
                    }
                }
                let mut entries = BTreeMap::new();
                for (key, value) in map {
                    entries.insert(key, Patch::from_json(value)?);
                }
                Ok(Patch::Merge(entries))
            }
            Value::Array(_) => Ok(Patch::Replace(value)),
            _ => Ok(Patch::Value(value)),
        }
    }
}

/// A typed sequence contribution: appended onto the layers beneath unless
/// the layer explicitly replaces the whole list.
#[derive(Debug, Clone, PartialEq)]
pub enum SeqPatch<T> {
    Append(Vec<T>),
    Replace(Vec<T>),
}

impl<T> SeqPatch<T> {
    pub fn items(&self) -> &[T] {
        match self {
            SeqPatch::Append(items) | SeqPatch::Replace(items) => items,
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, SeqPatch::Append(items) if items.is_empty())
    }

    pub fn apply(&self, acc: &mut Vec<T>)
    where
        T: Clone,
    {
        match self {
            SeqPatch::Append(items) => acc.extend(items.iter().cloned()),
            SeqPatch::Replace(items) => *acc = items.clone(),
        }
    }
}

impl<T> Default for SeqPatch<T> {
    fn default() -> Self {
        SeqPatch::Append(Vec::new())
    }
}

/// A partial configuration contributed by one concern. Immutable once
/// constructed; the name only feeds diagnostics.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigLayer {
    pub name: String,
    pub settings: BTreeMap<String, Patch>,
    pub rules: SeqPatch<Rule>,
    pub plugins: SeqPatch<PluginSpec>,
    pub chunk_groups: SeqPatch<ChunkGroup>,
}

impl ConfigLayer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set a value at a dot-separated key path with default patch
    /// semantics (see `Patch::from_value`).
    pub fn with_setting(mut self, path: &str, value: Value) -> Self {
        insert_patch(&mut self.settings, path, Patch::from_value(value));
        self
    }

    /// Set an explicit patch at a dot-separated key path.
    pub fn with_patch(mut self, path: &str, patch: Patch) -> Self {
        insert_patch(&mut self.settings, path, patch);
        self
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        match &mut self.rules {
            SeqPatch::Append(items) | SeqPatch::Replace(items) => items.push(rule),
        }
        self
    }

    pub fn with_plugin(mut self, plugin: PluginSpec) -> Self {
        match &mut self.plugins {
            SeqPatch::Append(items) | SeqPatch::Replace(items) => items.push(plugin),
        }
        self
    }

    pub fn with_chunk_group(mut self, group: ChunkGroup) -> Self {
        match &mut self.chunk_groups {
            SeqPatch::Append(items) | SeqPatch::Replace(items) => items.push(group),
        }
        self
    }

    /// Mark the rule table for wholesale replacement instead of append.
    pub fn replace_rules(mut self, rules: Vec<Rule>) -> Self {
        self.rules = SeqPatch::Replace(rules);
        self
    }

    pub fn replace_plugins(mut self, plugins: Vec<PluginSpec>) -> Self {
        self.plugins = SeqPatch::Replace(plugins);
        self
    }

    pub fn replace_chunk_groups(mut self, groups: Vec<ChunkGroup>) -> Self {
        self.chunk_groups = SeqPatch::Replace(groups);
        self
    }

    /// Parse a layer from override-file JSON. The reserved top-level keys
    /// `rules`, `plugins` and `chunk_groups` deserialize into their typed
    /// descriptors; everything else lands in the settings tree with
    /// `$append`/`$replace` markers honored.
    pub fn from_json(name: impl Into<String>, value: Value) -> Result<Self> {
        let name = name.into();
        let Value::Object(map) = value else {
            return Err(StrataError::config(format!(
                "layer `{}` must be a JSON object",
                name
            )));
        };

        let mut layer = ConfigLayer::new(name);
        for (key, value) in map {
            match key.as_str() {
                "rules" => layer.rules = parse_seq(value, "rules")?,
                "plugins" => layer.plugins = parse_seq(value, "plugins")?,
                "chunk_groups" => layer.chunk_groups = parse_seq(value, "chunk_groups")?,
                _ => {
                    layer.settings.insert(key, Patch::from_json(value)?);
                }
            }
        }
        Ok(layer)
    }
}

fn insert_patch(map: &mut BTreeMap<String, Patch>, path: &str, patch: Patch) {
    match path.split_once('.') {
        None => {
            map.insert(path.to_string(), patch);
        }
        Some((head, rest)) => {
            let entry = map
                .entry(head.to_string())
                .or_insert_with(|| Patch::Merge(BTreeMap::new()));
            if !matches!(entry, Patch::Merge(_)) {
                // same-layer re-authoring of a leaf as a subtree
                *entry = Patch::Merge(BTreeMap::new());
            }
            if let Patch::Merge(inner) = entry {
                insert_patch(inner, rest, patch);
            }
        }
    }
}

fn parse_seq<T: DeserializeOwned>(value: Value, key: &str) -> Result<SeqPatch<T>> {
    let (replace, items) = match value {
        Value::Array(_) => (false, value),
        Value::Object(ref map) if map.len() == 1 && map.contains_key("$replace") => {
            (true, map["$replace"].clone())
        }
        Value::Object(ref map) if map.len() == 1 && map.contains_key("$append") => {
            (false, map["$append"].clone())
        }
        _ => {
            return Err(StrataError::config(format!(
                "`{}` must be an array, or an object with a single $append/$replace key",
                key
            )))
        }
    };

    let parsed: Vec<T> = serde_json::from_value(items)?;
    Ok(if replace {
        SeqPatch::Replace(parsed)
    } else {
        SeqPatch::Append(parsed)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_default_semantics() {
        assert_eq!(
            Patch::from_value(json!(9090)),
            Patch::Value(json!(9090))
        );
        assert_eq!(
            Patch::from_value(json!([1, 2])),
            Patch::Replace(json!([1, 2]))
        );
        match Patch::from_value(json!({"port": 9090})) {
            Patch::Merge(map) => assert_eq!(map["port"], Patch::Value(json!(9090))),
            other => panic!("expected merge, got {:?}", other),
        }
    }

    #[test]
    fn test_from_json_markers() {
        let patch = Patch::from_json(json!({"$replace": {"a": 1}})).unwrap();
        assert_eq!(patch, Patch::Replace(json!({"a": 1})));

        let patch = Patch::from_json(json!({"$append": ["x"]})).unwrap();
        assert_eq!(patch, Patch::Append(vec![json!("x")]));

        assert!(Patch::from_json(json!({"$append": "x"})).is_err());
    }

    #[test]
    fn test_with_setting_nests_by_dotted_path() {
        let layer = ConfigLayer::new("base")
            .with_setting("output.filename", json!("js/[contenthash:12].js"))
            .with_setting("output.public_path", json!("/"));

        match layer.settings.get("output") {
            Some(Patch::Merge(out)) => {
                assert_eq!(
                    out["filename"],
                    Patch::Value(json!("js/[contenthash:12].js"))
                );
                assert_eq!(out["public_path"], Patch::Value(json!("/")));
            }
            other => panic!("expected output subtree, got {:?}", other),
        }
    }

    #[test]
    fn test_layer_from_json_splits_typed_keys() {
        let layer = ConfigLayer::from_json(
            "overrides",
            json!({
                "devtool": "eval",
                "plugins": [
                    {"name": "bundle-report", "hook": "post_build", "options": {}}
                ]
            }),
        )
        .unwrap();

        assert_eq!(layer.settings.get("devtool"), Some(&Patch::Value(json!("eval"))));
        assert_eq!(layer.plugins.items().len(), 1);
        assert!(layer.rules.is_noop());
    }

    #[test]
    fn test_layer_from_json_replace_marker_on_plugins() {
        let layer = ConfigLayer::from_json(
            "overrides",
            json!({
                "plugins": {"$replace": []}
            }),
        )
        .unwrap();

        assert_eq!(layer.plugins, SeqPatch::Replace(Vec::new()));
    }

    #[test]
    fn test_layer_from_json_rejects_non_object() {
        assert!(ConfigLayer::from_json("bad", json!([1, 2])).is_err());
    }
}
