// Shared utilities module
pub mod env_files;
pub mod errors;
pub mod logging;

pub use env_files::*;
pub use errors::*;
pub use logging::*;
