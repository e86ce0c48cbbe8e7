//! Domain model for story-mode language learning: the content catalog,
//! learner profile, story progress, and test scoring rules.
//!
//! Nothing in this crate performs I/O.

#![forbid(unsafe_code)]

pub mod catalog;
pub mod error;
pub mod model;
pub mod time;

pub use catalog::{Catalog, CatalogError};
pub use error::Error;
pub use time::Clock;
