use crate::core::models::{BuildReport, MergedConfig};
use crate::utils::Result;
use async_trait::async_trait;
use std::path::Path;

/// File system operations interface
#[async_trait]
pub trait FileSystemService: Send + Sync {
    async fn read_file(&self, path: &Path) -> Result<String>;
    async fn write_file(&self, path: &Path, content: &str) -> Result<()>;
    async fn create_directory(&self, path: &Path) -> Result<()>;
    fn file_exists(&self, path: &Path) -> bool;
}

/// The executor seam: whoever turns a merged configuration into artifacts
/// on disk. The composer never writes artifacts itself, so every
/// resolution failure happens before the first byte of output.
#[async_trait]
pub trait BuildExecutor: Send + Sync {
    async fn execute(&self, config: &MergedConfig) -> Result<BuildReport>;
}
