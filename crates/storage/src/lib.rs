#![forbid(unsafe_code)]

pub mod json;
pub mod repository;

pub use json::{CatalogLoadError, JsonFileRepository, load_catalog, parse_catalog};
pub use repository::{InMemoryRepository, Snapshot, SnapshotRepository, Storage, StorageError};
