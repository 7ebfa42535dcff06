//! Strata composes environment-specific build plans for front-end asset
//! pipelines from declarative configuration layers: a shared base, an
//! environment overlay and caller overrides, deep-merged under explicit
//! per-key directives. The result is a serializable [`MergedConfig`] that
//! an external executor turns into artifacts; Strata itself never runs a
//! transform or writes an output file.

pub mod cli;
pub mod core;
pub mod infrastructure;
pub mod presets;
pub mod utils;

pub use crate::core::chunks::{ChunkPlan, ChunkPlanner, ChunkPolicy, ModuleRecord};
pub use crate::core::layer::{ConfigLayer, Patch, SeqPatch};
pub use crate::core::models::{ComposeOptions, MergedConfig};
pub use crate::core::naming::{output_path, Artifact, NamingSpec, OutputNamer};
pub use crate::core::resolver::{compose, EnvironmentResolver, DEVELOPMENT, PRODUCTION};
pub use crate::utils::{Result, StrataError};
