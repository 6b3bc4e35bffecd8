//! JSON flat-file persistence: the snapshot envelope codec, the file-backed
//! repository and the question catalog loader.

mod catalog;
mod codec;
mod file_repo;

pub use catalog::{CatalogLoadError, load_catalog, parse_catalog};
pub use codec::{SCHEMA_TAG, SCHEMA_VERSION, decode, encode};
pub use file_repo::JsonFileRepository;
