//! Built-in layers: the shared base, the development overlay and the
//! production overlay. Callers normally start from [`resolver`] and stack
//! their own override layer on top.

use crate::core::chunks::ChunkGroup;
use crate::core::layer::ConfigLayer;
use crate::core::naming::NamingSpec;
use crate::core::plugins::{PluginHook, PluginSpec};
use crate::core::resolver::{EnvironmentResolver, DEVELOPMENT, PRODUCTION};
use crate::core::rules::{ResourceMatcher, Rule, TransformStage};
use serde_json::json;

/// Resolver preloaded with the built-in base and overlays.
pub fn resolver() -> EnvironmentResolver {
    EnvironmentResolver::new(base_layer())
        .with_overlay(DEVELOPMENT, development_overlay())
        .with_overlay(PRODUCTION, production_overlay())
}

/// The shared base: entry point, content-addressed output names, the rule
/// table, split-chunk policy and environment-independent plugins.
pub fn base_layer() -> ConfigLayer {
    ConfigLayer::new("base")
        .with_setting("devtool", json!("source-map"))
        .with_setting("entry", json!("./src/index.js"))
        .with_setting("output.path", json!("assets"))
        .with_setting("output.filename", json!("js/[contenthash:12].js"))
        .with_setting("output.chunk_filename", json!("js/[chunkhash:12].js"))
        .with_setting("performance.hints", json!(false))
        .with_setting("resolve.alias.components", json!("src/components/index.js"))
        .with_setting("resolve.alias.containers", json!("src/containers/index.js"))
        .with_setting("resolve.alias.providers", json!("src/providers/index.js"))
        .with_setting("resolve.alias.hooks", json!("src/hooks/index.js"))
        .with_setting("resolve.alias.utils", json!("src/utils/index.js"))
        .with_setting("chunking.max_bytes", json!(600_000))
        .with_setting("chunking.min_shared_users", json!(5))
        .with_setting("chunking.fallback.min_shared_users", json!(2))
        .with_chunk_group(ChunkGroup::new(
            "vendors",
            ResourceMatcher::pattern(r"node_modules"),
            -10,
        ))
        .with_rule(
            Rule::new(
                "scripts",
                ResourceMatcher::extensions(["js", "jsx"]).with_exclude("node_modules"),
                true,
            )
            .with_stage(TransformStage::with_options(
                "script-downlevel",
                json!({"presets": ["env", "react"], "rc_files": false}),
            )),
        )
        .with_rule(
            Rule::new("styles", ResourceMatcher::extensions(["css"]), true)
                .with_stage(TransformStage::new("css"))
                .with_stage(TransformStage::new("style-inject")),
        )
        .with_rule(
            Rule::new("styles-less", ResourceMatcher::extensions(["less"]), true)
                .with_stage(TransformStage::with_options(
                    "less",
                    json!({"javascript_enabled": true}),
                ))
                .with_stage(TransformStage::new("css"))
                .with_stage(TransformStage::new("css-extract")),
        )
        .with_rule(
            Rule::new("fonts", ResourceMatcher::extensions(["woff", "woff2"]), true)
                .with_stage(TransformStage::new("asset"))
                .with_output(NamingSpec::in_dir("[contenthash][ext]", "font")),
        )
        .with_rule(
            Rule::new(
                "images",
                ResourceMatcher::extensions(["jpg", "jpeg", "svg"]),
                true,
            )
            .with_stage(TransformStage::with_options(
                "image-optimize",
                json!({
                    "optipng": {"optimization_level": 5},
                    "svgo": {"keep_viewbox": true}
                }),
            ))
            .with_stage(TransformStage::new("asset"))
            .with_output(NamingSpec::in_dir("[contenthash][ext]", "img")),
        )
        // markdown ships as a raw asset; it is not rendered to HTML
        .with_rule(
            Rule::new("markdown", ResourceMatcher::extensions(["md"]), true)
                .with_stage(TransformStage::new("asset"))
                .with_output(NamingSpec::new("[contenthash][ext]")),
        )
        .with_plugin(PluginSpec::with_options(
            "css-extract",
            PluginHook::Emit,
            json!({"filename": "css/[name].css"}),
        ))
        .with_plugin(PluginSpec::with_options(
            "locale-filter",
            PluginHook::PreBuild,
            json!({"package": "moment", "keep": ["pt-br"]}),
        ))
        .with_plugin(PluginSpec::with_options(
            "progress",
            PluginHook::PreBuild,
            json!({"percent_by": "entries"}),
        ))
}

fn html_emit(filename: &str) -> PluginSpec {
    PluginSpec::with_options(
        "html-emit",
        PluginHook::Emit,
        json!({
            "template": "src/index.html",
            "filename": filename,
            "show_errors": true,
            "minify": {
                "remove_comments": false,
                "collapse_whitespace": true,
                "use_short_doctype": true,
                "minify_js": true,
                "minify_css": true,
                "minify_urls": true
            }
        }),
    )
}

fn env_inject(file: &str) -> PluginSpec {
    PluginSpec::with_options(
        "env-inject",
        PluginHook::PreBuild,
        json!({"file": file, "safe": true, "system_vars": true}),
    )
}

/// Development overlay: serve from the root, hot dev server, dev env file.
pub fn development_overlay() -> ConfigLayer {
    ConfigLayer::new("development")
        .with_setting("output.public_path", json!("/"))
        .with_setting("dev_server.port", json!(9090))
        .with_setting("dev_server.index", json!("index.html"))
        .with_setting("dev_server.compress", json!(true))
        .with_setting("dev_server.open", json!(true))
        .with_setting("dev_server.hot", json!(true))
        .with_setting("dev_server.history_api_fallback", json!(true))
        .with_plugin(html_emit("index.html"))
        .with_plugin(env_inject(".env.development"))
}

/// Production overlay: clean output tree, emit HTML beside the assets,
/// prod env file, copied static images, gzip'd scripts and a static
/// bundle-analysis report.
pub fn production_overlay() -> ConfigLayer {
    ConfigLayer::new("production")
        .with_setting("output.public_path", json!("assets/js/"))
        .with_plugin(PluginSpec::with_options(
            "clean",
            PluginHook::PreBuild,
            json!({"patterns": ["assets/**/*"], "verbose": true}),
        ))
        .with_plugin(html_emit("../index.html"))
        .with_plugin(env_inject(".env.production"))
        .with_plugin(PluginSpec::with_options(
            "copy-assets",
            PluginHook::Emit,
            json!({"from": "src/assets/img", "to": "img"}),
        ))
        .with_plugin(PluginSpec::with_options(
            "compress",
            PluginHook::PostBuild,
            json!({"algorithm": "gzip", "include": "\\.js$"}),
        ))
        .with_plugin(PluginSpec::with_options(
            "bundle-report",
            PluginHook::PostBuild,
            json!({"mode": "static", "filename": "analyzer.html", "open": false}),
        ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::MergedConfig;
    use std::path::Path;

    fn merged_for(env: &str) -> MergedConfig {
        let layers = resolver().resolve_layers(env, None).unwrap();
        MergedConfig::from_layers(env, &layers).unwrap()
    }

    #[test]
    fn test_development_excludes_production_plugins() {
        let dev = merged_for(DEVELOPMENT);
        assert!(!dev.plugins.contains("compress"));
        assert!(!dev.plugins.contains("bundle-report"));
        assert!(!dev.plugins.contains("clean"));
        assert!(dev.plugins.contains("html-emit"));
        assert_eq!(dev.setting("dev_server.port"), Some(&serde_json::json!(9090)));
    }

    #[test]
    fn test_production_excludes_dev_server() {
        let prod = merged_for(PRODUCTION);
        assert!(prod.setting("dev_server").is_none());
        assert!(prod.plugins.contains("compress"));
        assert!(prod.plugins.contains("bundle-report"));
        assert_eq!(
            prod.setting("output.public_path"),
            Some(&serde_json::json!("assets/js/"))
        );
    }

    #[test]
    fn test_declared_extensions_all_route() {
        let merged = merged_for(PRODUCTION);
        for resource in [
            "src/index.js",
            "src/App.jsx",
            "src/app.css",
            "src/theme.less",
            "src/fonts/icons.woff2",
            "src/assets/logo.svg",
            "src/assets/photo.jpeg",
            "docs/README.md",
        ] {
            let route = merged.rules.route(Path::new(resource)).unwrap();
            // preset rules are all exclusive: exactly one pipeline applies
            assert_eq!(route.rules().len(), 1, "{} over-matched", resource);
        }
    }

    #[test]
    fn test_markdown_routes_as_raw_asset() {
        let merged = merged_for(DEVELOPMENT);
        let route = merged.rules.route(Path::new("notes/guide.md")).unwrap();
        assert_eq!(route.primary().name, "markdown");
        let stages: Vec<_> = route.stages().map(|s| s.tool.as_str()).collect();
        assert_eq!(stages, vec!["asset"]);
    }

    #[test]
    fn test_base_carries_vendors_group() {
        let merged = merged_for(PRODUCTION);
        assert_eq!(merged.chunking.groups.len(), 1);
        assert_eq!(merged.chunking.groups[0].name, "vendors");
        assert_eq!(merged.chunking.groups[0].priority, -10);
        assert_eq!(merged.chunking.max_bytes, 600_000);
        assert_eq!(merged.chunking.fallback.min_shared_users, 2);
    }
}
