#![forbid(unsafe_code)]

pub mod catalog;
pub mod repository;
pub mod sqlite;

pub use catalog::{bundled_catalog, load_catalog_file, parse_catalog};
pub use repository::{
    InMemoryRepository, PROGRESS_KEY, ProgressRepository, ProgressSnapshot, Storage, StorageError,
};
