mod filesystem;
mod traits;

pub use filesystem::FilesystemSourceProvider;
pub use traits::{SourceError, SourceProvider, SourceResult};
