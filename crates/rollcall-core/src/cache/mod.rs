//! Local store for offline data access.
//!
//! This module provides the `LocalStore`, a key-indexed table store that
//! mirrors the server's course and student collections. Each table is
//! persisted as a JSON file in the cache directory and stamped with the
//! time it was last written.
//!
//! Students reference their course by `course_id`; removing a course from
//! the store removes its students with it.

pub mod error;
pub mod store;

pub use error::StoreError;
pub use store::{CacheAges, CachedData, LocalStore};
