//! Data models for the course catalog.
//!
//! This module contains the two entity types mirrored between the REST
//! backend and the local store:
//!
//! - `Course`: a course with schedule, professor and an optional image
//! - `Student`: a student enrolled in exactly one course
//!
//! Both carry an `id` that stays `None` until the server assigns one.

pub mod course;
pub mod student;

use serde::{de::DeserializeOwned, Serialize};

pub use course::Course;
pub use student::{Student, StudentDetail};

/// Behaviour shared by everything the local store keeps in a table.
pub trait Entity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Server-assigned primary key, `None` for drafts.
    fn id(&self) -> Option<i64>;

    /// Sort key for listings (tables are read back ordered by name).
    fn name(&self) -> &str;
}
