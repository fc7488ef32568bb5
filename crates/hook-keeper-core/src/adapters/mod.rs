//! # Storage Adapters
//!
//! Implementations of the [`Storage`](crate::storage::Storage) interface.

pub mod filesystem_storage;
pub mod memory_storage;

pub use filesystem_storage::FilesystemStorage;
pub use memory_storage::InMemoryStorage;
