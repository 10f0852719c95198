// Flat file storage and its metadata sidecar
pub mod error;
pub mod filesystem;
pub mod metadata;

pub use filesystem::{FileStore, LocalFileStore};
pub use metadata::MetadataIndex;
