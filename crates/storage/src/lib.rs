//! Persistence for learner records: profile, story progress, test results and
//! lesson flags. Each record is one JSON document under a fixed key; writes
//! replace the whole document.

#![forbid(unsafe_code)]

pub mod records;
pub mod repository;
pub mod sqlite;

pub use repository::{Storage, StorageError};
