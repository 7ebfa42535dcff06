use std::time::Instant;
use tracing::{debug, error, info, warn};

pub struct Logger;

impl Logger {
    pub fn init() {
        tracing_subscriber::fmt()
            .with_env_filter("strata=info")
            .with_target(false)
            .init();
    }

    pub fn compose_start(environment: &str, working_dir: &str) {
        info!("🧩 Strata - Build Plan Composer");
        info!("═══════════════════════════════════════");
        info!("🌍 Environment: {}", environment);
        info!("📁 Working dir: {}", working_dir);
    }

    pub fn layers_resolved(names: &[String]) {
        info!("📚 Merging {} layers: {}", names.len(), names.join(" → "));
    }

    pub fn env_file_loaded(path: &str, count: usize) {
        debug!("🔑 Loaded {} variables from {}", count, path);
    }

    pub fn compose_complete(
        rules: usize,
        plugins: usize,
        groups: usize,
        elapsed: std::time::Duration,
    ) {
        info!("");
        info!("📊 Resolved configuration:");
        info!("  • Rules: {}", rules);
        info!("  • Plugins: {}", plugins);
        info!("  • Chunk groups: {}", groups);
        info!("  • Resolution time: {:.2?}", elapsed);
        info!("");
        info!("✅ Build plan composed");
    }

    pub fn plan_summary(chunks: usize, modules: usize, inlined: usize) {
        info!(
            "📦 Chunk plan: {} chunks over {} modules ({} inlined with importer)",
            chunks, modules, inlined
        );
    }

    pub fn debug(msg: &str) {
        debug!("{}", msg);
    }

    pub fn error(msg: &str) {
        error!("❌ {}", msg);
    }

    pub fn warn(msg: &str) {
        warn!("⚠️  {}", msg);
    }
}

pub struct Timer {
    start: Instant,
    name: String,
}

impl Timer {
    pub fn start(name: &str) -> Self {
        debug!("⏱️  Starting: {}", name);
        Self {
            start: Instant::now(),
            name: name.to_string(),
        }
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.start.elapsed()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        debug!("⏱️  Completed: {} in {:.2?}", self.name, self.elapsed());
    }
}
