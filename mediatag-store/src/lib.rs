//! # mediatag-store
//!
//! Persistence for tags, media and links, plus file fingerprinting.
//!
//! The daemon talks to a [`Persistence`] bundle of three [`Repository`]
//! tables. [`JsonTable`] keeps each table in one atomically replaced JSON
//! file; [`MemoryTable`] keeps it in process.

pub mod error;
pub mod hashing;
pub mod json_store;
pub mod memory;
pub mod persistence;
pub mod repository;
mod rows;

pub use error::StoreError;
pub use hashing::{hash_file, hash_file_or_empty};
pub use json_store::JsonTable;
pub use memory::{FaultSwitch, MemoryTable};
pub use persistence::Persistence;
pub use repository::{Record, Repository, TagRecord};
