use crate::core::naming::NamingSpec;
use crate::utils::{Result, StrataError};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// Compiled patterns are shared process-wide; route() stays safe to call
// concurrently for distinct resources.
static PATTERN_CACHE: Lazy<DashMap<String, Regex>> = Lazy::new(DashMap::new);

fn compiled(pattern: &str) -> Result<Regex> {
    if let Some(regex) = PATTERN_CACHE.get(pattern) {
        return Ok(regex.value().clone());
    }
    let regex = Regex::new(pattern)?;
    PATTERN_CACHE.insert(pattern.to_string(), regex.clone());
    Ok(regex)
}

/// Predicate over a resource or module-origin path: an extension set, an
/// optional path pattern, and an optional exclusion pattern. An empty
/// matcher accepts every path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ResourceMatcher {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude: Option<String>,
}

impl ResourceMatcher {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn extensions<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            extensions: extensions.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn pattern(pattern: impl Into<String>) -> Self {
        Self {
            pattern: Some(pattern.into()),
            ..Self::default()
        }
    }

    pub fn with_exclude(mut self, exclude: impl Into<String>) -> Self {
        self.exclude = Some(exclude.into());
        self
    }

    /// Compile the patterns up front so later matching cannot fail.
    pub fn validate(&self) -> Result<()> {
        if let Some(pattern) = &self.pattern {
            compiled(pattern)?;
        }
        if let Some(exclude) = &self.exclude {
            compiled(exclude)?;
        }
        Ok(())
    }

    pub fn matches(&self, path: &Path) -> Result<bool> {
        let text = path.to_string_lossy();

        if let Some(exclude) = &self.exclude {
            if compiled(exclude)?.is_match(&text) {
                return Ok(false);
            }
        }

        if !self.extensions.is_empty() {
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_lowercase())
                .unwrap_or_default();
            if !self.extensions.iter().any(|e| e.eq_ignore_ascii_case(&ext)) {
                return Ok(false);
            }
        }

        if let Some(pattern) = &self.pattern {
            if !compiled(pattern)?.is_match(&text) {
                return Ok(false);
            }
        }

        Ok(true)
    }
}

/// One stage of a transform pipeline: an opaque external tool plus its
/// options. The composer never runs the tool, it only routes to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformStage {
    pub tool: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub options: serde_json::Value,
}

impl TransformStage {
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            options: serde_json::Value::Null,
        }
    }

    pub fn with_options(tool: impl Into<String>, options: serde_json::Value) -> Self {
        Self {
            tool: tool.into(),
            options,
        }
    }
}

/// A routing rule. Exclusivity is declared, never inferred: an exclusive
/// rule claims the resource against later exclusive rules, while
/// non-exclusive rules stack (an asset can be inlined AND compressed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub name: String,
    pub matcher: ResourceMatcher,
    pub exclusive: bool,
    pub pipeline: Vec<TransformStage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<NamingSpec>,
}

impl Rule {
    pub fn new(name: impl Into<String>, matcher: ResourceMatcher, exclusive: bool) -> Self {
        Self {
            name: name.into(),
            matcher,
            exclusive,
            pipeline: Vec::new(),
            output: None,
        }
    }

    pub fn with_stage(mut self, stage: TransformStage) -> Self {
        self.pipeline.push(stage);
        self
    }

    pub fn with_output(mut self, output: NamingSpec) -> Self {
        self.output = Some(output);
        self
    }
}

/// The resolved route for one resource: every applicable rule in
/// evaluation order.
#[derive(Debug)]
pub struct RouteMatch<'a> {
    pub path: PathBuf,
    matched: Vec<&'a Rule>,
    primary: usize,
}

impl<'a> RouteMatch<'a> {
    /// The rule that owns the resource: the first matching exclusive rule,
    /// or the first match if none are exclusive.
    pub fn primary(&self) -> &'a Rule {
        self.matched[self.primary]
    }

    pub fn rules(&self) -> &[&'a Rule] {
        &self.matched
    }

    /// All transform stages in application order.
    pub fn stages(&self) -> impl Iterator<Item = &'a TransformStage> + '_ {
        self.matched.iter().flat_map(|rule| rule.pipeline.iter())
    }
}

/// Ordered rule set routing resources to transform pipelines. Evaluation
/// is layer-then-declaration order, which the merger already fixed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleTable {
    rules: Vec<Rule>,
}

impl RuleTable {
    /// Build a table, compiling every matcher so routing cannot hit an
    /// invalid pattern later.
    pub fn new(rules: Vec<Rule>) -> Result<Self> {
        for rule in &rules {
            rule.matcher.validate()?;
        }
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Route one resource. The first matching exclusive rule wins among
    /// exclusive rules; non-exclusive matches stack in declaration order.
    /// An unmatched resource is a build-time diagnostic, never a silent
    /// pass-through.
    pub fn route(&self, path: &Path) -> Result<RouteMatch<'_>> {
        let mut matched: Vec<&Rule> = Vec::new();
        let mut primary: Option<usize> = None;
        let mut claimed = false;

        for rule in &self.rules {
            if !rule.matcher.matches(path)? {
                continue;
            }
            if rule.exclusive {
                if claimed {
                    continue;
                }
                claimed = true;
                primary = Some(matched.len());
            }
            matched.push(rule);
        }

        if matched.is_empty() {
            return Err(StrataError::UnroutedResource(path.to_path_buf()));
        }

        Ok(RouteMatch {
            path: path.to_path_buf(),
            primary: primary.unwrap_or(0),
            matched,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script_rule() -> Rule {
        Rule::new(
            "scripts",
            ResourceMatcher::extensions(["js", "jsx"]).with_exclude("node_modules"),
            true,
        )
        .with_stage(TransformStage::new("script-downlevel"))
    }

    fn style_rule() -> Rule {
        Rule::new("styles", ResourceMatcher::extensions(["css"]), true)
            .with_stage(TransformStage::new("css"))
            .with_stage(TransformStage::new("style-inject"))
    }

    #[test]
    fn test_route_by_extension() {
        let table = RuleTable::new(vec![script_rule(), style_rule()]).unwrap();

        let route = table.route(Path::new("src/app.jsx")).unwrap();
        assert_eq!(route.primary().name, "scripts");

        let route = table.route(Path::new("src/app.css")).unwrap();
        assert_eq!(route.primary().name, "styles");
    }

    #[test]
    fn test_exclude_pattern_rejects() {
        let table = RuleTable::new(vec![script_rule()]).unwrap();
        let err = table
            .route(Path::new("node_modules/react/index.js"))
            .unwrap_err();
        assert!(matches!(err, StrataError::UnroutedResource(_)));
    }

    #[test]
    fn test_first_exclusive_match_wins() {
        let first = Rule::new("first", ResourceMatcher::extensions(["css"]), true);
        let second = Rule::new("second", ResourceMatcher::extensions(["css"]), true);
        let table = RuleTable::new(vec![first, second]).unwrap();

        let route = table.route(Path::new("a.css")).unwrap();
        assert_eq!(route.primary().name, "first");
        assert_eq!(route.rules().len(), 1);
    }

    #[test]
    fn test_non_exclusive_rules_stack() {
        let inline = Rule::new("inline-small", ResourceMatcher::extensions(["svg"]), false)
            .with_stage(TransformStage::new("inline"));
        let asset = Rule::new("images", ResourceMatcher::extensions(["svg"]), true)
            .with_stage(TransformStage::new("asset"));
        let compress = Rule::new("compress", ResourceMatcher::extensions(["svg"]), false)
            .with_stage(TransformStage::new("compress"));
        let table = RuleTable::new(vec![inline, asset, compress]).unwrap();

        let route = table.route(Path::new("logo.svg")).unwrap();
        let names: Vec<_> = route.rules().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["inline-small", "images", "compress"]);
        assert_eq!(route.primary().name, "images");

        let stages: Vec<_> = route.stages().map(|s| s.tool.as_str()).collect();
        assert_eq!(stages, vec!["inline", "asset", "compress"]);
    }

    #[test]
    fn test_unrouted_resource_is_an_error() {
        let table = RuleTable::new(vec![script_rule()]).unwrap();
        let err = table.route(Path::new("readme.pdf")).unwrap_err();
        match err {
            StrataError::UnroutedResource(path) => {
                assert_eq!(path, PathBuf::from("readme.pdf"))
            }
            other => panic!("expected unrouted resource, got {}", other),
        }
    }

    #[test]
    fn test_invalid_pattern_fails_at_table_build() {
        let rule = Rule::new("bad", ResourceMatcher::pattern("[unclosed"), true);
        assert!(RuleTable::new(vec![rule]).is_err());
    }

    #[test]
    fn test_route_is_safe_from_many_threads() {
        let table = std::sync::Arc::new(
            RuleTable::new(vec![script_rule(), style_rule()]).unwrap(),
        );

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let table = table.clone();
                std::thread::spawn(move || {
                    let path = if i % 2 == 0 {
                        PathBuf::from(format!("src/mod{}.js", i))
                    } else {
                        PathBuf::from(format!("src/mod{}.css", i))
                    };
                    table.route(&path).unwrap().primary().name.clone()
                })
            })
            .collect();

        for handle in handles {
            let name = handle.join().unwrap();
            assert!(name == "scripts" || name == "styles");
        }
    }
}
