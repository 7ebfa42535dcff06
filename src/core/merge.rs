use crate::core::layer::{ConfigLayer, Patch, SeqPatch};
use crate::utils::{Result, StrataError, ValueShape};
use serde_json::{Map, Value};

/// Deep-merge the settings trees of an ordered run of layers. Later layers
/// override or extend earlier ones according to each key's patch variant;
/// incompatible shapes without a `Replace` marker are a layer-authoring bug
/// and fail with a conflict. Pure function over its inputs.
pub fn merge_settings(layers: &[ConfigLayer]) -> Result<Value> {
    let mut merged = Map::new();
    for layer in layers {
        for (key, patch) in &layer.settings {
            let existing = merged.remove(key);
            let value = apply_patch(existing, patch, key, &layer.name)?;
            merged.insert(key.clone(), value);
        }
    }
    Ok(Value::Object(merged))
}

/// Fold one typed sequence (rules, plugins, chunk groups) across layers:
/// concatenation in layer order, within-layer order preserved, unless a
/// layer carries the replace marker.
pub fn fold_seq<T, F>(layers: &[ConfigLayer], pick: F) -> Vec<T>
where
    T: Clone,
    F: Fn(&ConfigLayer) -> &SeqPatch<T>,
{
    let mut acc = Vec::new();
    for layer in layers {
        pick(layer).apply(&mut acc);
    }
    acc
}

fn patch_shape(patch: &Patch) -> ValueShape {
    match patch {
        Patch::Value(v) | Patch::Replace(v) => ValueShape::of(v),
        Patch::Merge(_) => ValueShape::Mapping,
        Patch::Append(_) => ValueShape::Sequence,
    }
}

fn apply_patch(
    existing: Option<Value>,
    patch: &Patch,
    key_path: &str,
    layer: &str,
) -> Result<Value> {
    match patch {
        Patch::Replace(value) => Ok(value.clone()),

        Patch::Value(value) => match existing {
            None => Ok(value.clone()),
            Some(prior) if ValueShape::of(&prior) == ValueShape::Scalar => Ok(value.clone()),
            Some(prior) => Err(conflict(key_path, layer, &prior, patch)),
        },

        Patch::Append(items) => match existing {
            None => Ok(Value::Array(items.clone())),
            Some(Value::Array(mut seq)) => {
                seq.extend(items.iter().cloned());
                Ok(Value::Array(seq))
            }
            Some(prior) => Err(conflict(key_path, layer, &prior, patch)),
        },

        Patch::Merge(entries) => {
            let mut base = match existing {
                None => Map::new(),
                Some(Value::Object(map)) => map,
                Some(prior) => return Err(conflict(key_path, layer, &prior, patch)),
            };
            for (key, sub) in entries {
                let path = format!("{}.{}", key_path, key);
                let prior = base.remove(key);
                let value = apply_patch(prior, sub, &path, layer)?;
                base.insert(key.clone(), value);
            }
            Ok(Value::Object(base))
        }
    }
}

fn conflict(key: &str, layer: &str, existing: &Value, patch: &Patch) -> StrataError {
    StrataError::Conflict {
        key: key.to_string(),
        layer: layer.to_string(),
        existing: ValueShape::of(existing),
        incoming: patch_shape(patch),
    }
}
