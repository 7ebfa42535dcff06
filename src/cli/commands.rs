use crate::core::chunks::{ChunkPlanner, ModuleRecord};
use crate::core::interfaces::FileSystemService;
use crate::core::layer::ConfigLayer;
use crate::core::models::ComposeOptions;
use crate::core::resolver::compose;
use crate::infrastructure::TokioFileSystemService;
use crate::presets;
use crate::utils::{Logger, Result, StrataError};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "strata")]
#[command(about = "Strata - layered build-configuration composer for asset pipelines")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compose the build plan for an environment
    Resolve {
        /// Target environment
        #[arg(short, long, default_value = "production")]
        env: String,
        /// Working directory
        #[arg(short, long, default_value = ".")]
        root: String,
        /// Override layer file (default: strata.config.json in the root)
        #[arg(short, long)]
        config: Option<String>,
        /// Write the plan to a file instead of stdout
        #[arg(short, long)]
        out: Option<String>,
        /// Override the output root
        #[arg(long)]
        output_root: Option<String>,
        /// Dev-server port (development only)
        #[arg(short, long)]
        port: Option<u16>,
        /// Dev-server host (development only)
        #[arg(long)]
        host: Option<String>,
    },
    /// Route resource paths through the resolved rule table
    Route {
        #[arg(short, long, default_value = "production")]
        env: String,
        #[arg(short, long, default_value = ".")]
        root: String,
        #[arg(short, long)]
        config: Option<String>,
        /// Resource paths to route
        paths: Vec<String>,
    },
    /// Plan chunk assignment for a module manifest
    Plan {
        #[arg(short, long, default_value = "production")]
        env: String,
        #[arg(short, long, default_value = ".")]
        root: String,
        #[arg(short, long)]
        config: Option<String>,
        /// JSON manifest: an array of module records
        manifest: String,
        #[arg(short, long)]
        out: Option<String>,
    },
    /// Show composer information
    Info,
}

pub struct CliHandler;

impl CliHandler {
    pub fn new() -> Self {
        Self
    }

    pub async fn run(&self) -> Result<()> {
        Logger::init();

        let cli = Cli::parse();

        match cli.command {
            Commands::Resolve {
                env,
                root,
                config,
                out,
                output_root,
                port,
                host,
            } => {
                self.handle_resolve(&env, &root, config.as_deref(), out.as_deref(), output_root, port, host)
                    .await
            }
            Commands::Route { env, root, config, paths } => {
                self.handle_route(&env, &root, config.as_deref(), &paths).await
            }
            Commands::Plan { env, root, config, manifest, out } => {
                self.handle_plan(&env, &root, config.as_deref(), &manifest, out.as_deref())
                    .await
            }
            Commands::Info => self.handle_info(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn handle_resolve(
        &self,
        env: &str,
        root: &str,
        config: Option<&str>,
        out: Option<&str>,
        output_root: Option<String>,
        port: Option<u16>,
        host: Option<String>,
    ) -> Result<()> {
        Logger::compose_start(env, root);

        let fs = TokioFileSystemService;
        let root = PathBuf::from(root);
        let overrides = self.load_overrides(&fs, &root, config).await?;

        let opts = ComposeOptions {
            environment: env.to_string(),
            overrides,
            working_dir: root,
            output_root,
            dev_host: host,
            dev_port: port,
        };

        let merged = compose(&presets::resolver(), opts)?;
        let encoded = serde_json::to_string_pretty(&merged)?;

        match out {
            Some(path) => fs.write_file(Path::new(path), &encoded).await?,
            None => println!("{}", encoded),
        }
        Ok(())
    }

    async fn handle_route(
        &self,
        env: &str,
        root: &str,
        config: Option<&str>,
        paths: &[String],
    ) -> Result<()> {
        let fs = TokioFileSystemService;
        let root = PathBuf::from(root);
        let overrides = self.load_overrides(&fs, &root, config).await?;

        let opts = ComposeOptions {
            environment: env.to_string(),
            overrides,
            working_dir: root,
            ..Default::default()
        };
        let merged = compose(&presets::resolver(), opts)?;

        let mut first_error = None;
        for path in paths {
            match merged.rules.route(Path::new(path)) {
                Ok(route) => {
                    let stages: Vec<&str> = route.stages().map(|s| s.tool.as_str()).collect();
                    println!(
                        "{} {} {} [{}]",
                        path.green(),
                        "→".dimmed(),
                        route.primary().name.bold(),
                        stages.join(" → ")
                    );
                }
                Err(err) => {
                    println!("{} {} {}", path.red(), "→".dimmed(), err.to_string().red());
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn handle_plan(
        &self,
        env: &str,
        root: &str,
        config: Option<&str>,
        manifest: &str,
        out: Option<&str>,
    ) -> Result<()> {
        let fs = TokioFileSystemService;
        let root = PathBuf::from(root);
        let overrides = self.load_overrides(&fs, &root, config).await?;

        let opts = ComposeOptions {
            environment: env.to_string(),
            overrides,
            working_dir: root,
            ..Default::default()
        };
        let merged = compose(&presets::resolver(), opts)?;

        let content = fs.read_file(Path::new(manifest)).await?;
        let modules: Vec<ModuleRecord> = serde_json::from_str(&content)?;

        let plan = ChunkPlanner::new(&merged.chunking).assign(&modules)?;
        Logger::plan_summary(plan.chunks.len(), plan.module_count(), plan.inlined_count());

        let encoded = serde_json::to_string_pretty(&plan)?;
        match out {
            Some(path) => fs.write_file(Path::new(path), &encoded).await?,
            None => println!("{}", encoded),
        }
        Ok(())
    }

    fn handle_info(&self) -> Result<()> {
        println!("{}", "🧩 Strata Composer".bold().cyan());
        println!("  Version: {}", env!("CARGO_PKG_VERSION"));
        println!("  Environments: {}", presets::resolver().environments().join(", "));
        println!("  Override file: strata.config.json ($append/$replace markers supported)");
        println!("  Hashing: BLAKE3, 12-char prefix by default");
        Ok(())
    }

    /// Load the caller override layer: an explicit --config path must
    /// exist; the conventional strata.config.json is optional.
    async fn load_overrides(
        &self,
        fs: &TokioFileSystemService,
        root: &Path,
        config: Option<&str>,
    ) -> Result<Option<ConfigLayer>> {
        let (path, required) = match config {
            Some(explicit) => {
                let p = PathBuf::from(explicit);
                let p = if p.is_absolute() { p } else { root.join(p) };
                (p, true)
            }
            None => (root.join("strata.config.json"), false),
        };

        if !fs.file_exists(&path) {
            return if required {
                Err(StrataError::config(format!(
                    "override file not found: {}",
                    path.display()
                )))
            } else {
                Logger::debug("No strata.config.json found, composing without overrides");
                Ok(None)
            };
        }

        let content = fs.read_file(&path).await?;
        let value: serde_json::Value = serde_json::from_str(&content)?;
        ConfigLayer::from_json("overrides", value).map(Some)
    }
}

impl Default for CliHandler {
    fn default() -> Self {
        Self::new()
    }
}
