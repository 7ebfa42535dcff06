use crate::utils::{Result, StrataError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Default truncation of the BLAKE3 hex digest in output names. Twelve hex
/// characters (48 bits) keep the collision probability negligible for any
/// realistic artifact count; collisions are still detected, never assumed
/// away.
pub const DEFAULT_HASH_LEN: usize = 12;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[(contenthash|chunkhash|hash|name|ext)(?::(\d+))?\]")
        .expect("placeholder pattern")
});

/// Output-name template plus target directory. `[contenthash]`,
/// `[chunkhash]` and `[hash]` all render the content digest (optionally
/// `:N`-truncated); `[name]` and `[ext]` render the artifact stem and
/// dotted extension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamingSpec {
    pub template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

impl NamingSpec {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            dir: None,
        }
    }

    pub fn in_dir(template: impl Into<String>, dir: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            dir: Some(dir.into()),
        }
    }
}

/// A finished build artifact, described by the only things naming may
/// depend on: stem, extension and final content.
#[derive(Debug, Clone, Copy)]
pub struct Artifact<'a> {
    pub name: &'a str,
    pub ext: &'a str,
    pub content: &'a [u8],
}

impl<'a> Artifact<'a> {
    pub fn new(name: &'a str, ext: &'a str, content: &'a [u8]) -> Self {
        Self { name, ext, content }
    }
}

/// Compute the output path for an artifact. Pure over content + spec:
/// identical inputs always produce identical paths, and any content change
/// changes every hash placeholder.
pub fn output_path(artifact: &Artifact<'_>, spec: &NamingSpec) -> PathBuf {
    let digest = blake3::hash(artifact.content).to_hex().to_string();
    render(spec, artifact, &digest)
}

fn render(spec: &NamingSpec, artifact: &Artifact<'_>, digest: &str) -> PathBuf {
    let filename = PLACEHOLDER.replace_all(&spec.template, |caps: &regex::Captures<'_>| {
        let len = caps
            .get(2)
            .and_then(|m| m.as_str().parse::<usize>().ok())
            .unwrap_or(DEFAULT_HASH_LEN)
            .min(digest.len());
        match &caps[1] {
            "contenthash" | "chunkhash" | "hash" => digest[..len].to_string(),
            "name" => artifact.name.to_string(),
            "ext" => {
                if artifact.ext.is_empty() {
                    String::new()
                } else {
                    format!(".{}", artifact.ext)
                }
            }
            _ => caps[0].to_string(),
        }
    });

    match &spec.dir {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir).join(filename.as_ref()),
        _ => PathBuf::from(filename.as_ref()),
    }
}

/// Assignment registry guarding against truncated-hash collisions: two
/// distinct contents mapping to one output path abort the build instead of
/// silently overwriting each other.
#[derive(Debug, Default)]
pub struct OutputNamer {
    assigned: HashMap<PathBuf, String>,
}

impl OutputNamer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assign(&mut self, artifact: &Artifact<'_>, spec: &NamingSpec) -> Result<PathBuf> {
        let digest = blake3::hash(artifact.content).to_hex().to_string();
        let path = render(spec, artifact, &digest);

        match self.assigned.get(&path) {
            Some(prior) if prior != &digest => Err(StrataError::NamingCollision {
                path,
                first: prior[..DEFAULT_HASH_LEN].to_string(),
                second: digest[..DEFAULT_HASH_LEN].to_string(),
            }),
            _ => {
                self.assigned.insert(path.clone(), digest);
                Ok(path)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.assigned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assigned.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_naming_is_idempotent() {
        let spec = NamingSpec::in_dir("[contenthash:12].js", "js");
        let artifact = Artifact::new("main", "js", b"console.log('hello');");

        let first = output_path(&artifact, &spec);
        let second = output_path(&artifact, &spec);
        assert_eq!(first, second);
    }

    #[test]
    fn test_content_change_changes_path() {
        let spec = NamingSpec::new("[contenthash:12].js");
        let a = output_path(&Artifact::new("main", "js", b"let x = 1;"), &spec);
        let b = output_path(&Artifact::new("main", "js", b"let x = 2;"), &spec);
        assert_ne!(a, b);
    }

    #[test]
    fn test_truncation_length() {
        let spec = NamingSpec::new("[contenthash:8].js");
        let path = output_path(&Artifact::new("main", "js", b"content"), &spec);
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert_eq!(name.len(), "12345678.js".len());
    }

    #[test]
    fn test_name_and_ext_placeholders() {
        let spec = NamingSpec::in_dir("[contenthash][ext]", "font");
        let path = output_path(&Artifact::new("icons", "woff2", b"\x00\x01"), &spec);
        let text = path.to_string_lossy();
        assert!(text.starts_with("font/"));
        assert!(text.ends_with(".woff2"));

        let spec = NamingSpec::new("css/[name].css");
        let path = output_path(&Artifact::new("app", "css", b"body{}"), &spec);
        assert_eq!(path, PathBuf::from("css/app.css"));
    }

    #[test]
    fn test_hash_alias_matches_contenthash() {
        let content = b"same bytes";
        let by_hash = output_path(&Artifact::new("m", "js", content), &NamingSpec::new("[hash].js"));
        let by_content = output_path(
            &Artifact::new("m", "js", content),
            &NamingSpec::new("[contenthash].js"),
        );
        assert_eq!(by_hash, by_content);
    }

    #[test]
    fn test_collision_detected_not_overwritten() {
        // A hashless template forces the collision deterministically.
        let spec = NamingSpec::new("[name].js");
        let mut namer = OutputNamer::new();

        namer
            .assign(&Artifact::new("app", "js", b"first"), &spec)
            .unwrap();
        let err = namer
            .assign(&Artifact::new("app", "js", b"second"), &spec)
            .unwrap_err();

        assert!(matches!(err, StrataError::NamingCollision { .. }));
    }

    #[test]
    fn test_identical_content_reassigns_same_path() {
        let spec = NamingSpec::new("[contenthash:12][ext]");
        let mut namer = OutputNamer::new();
        let artifact = Artifact::new("logo", "svg", b"<svg/>");

        let first = namer.assign(&artifact, &spec).unwrap();
        let second = namer.assign(&artifact, &spec).unwrap();
        assert_eq!(first, second);
        assert_eq!(namer.len(), 1);
    }
}
