//! Online/offline reconciliation between the REST backend and the local store.
//!
//! One coordinator per entity type (`CourseSync`, `StudentSync`) with the
//! same policy:
//!
//! - Reads prefer the network when it is reachable, mirror the response
//!   into the `LocalStore`, and always return what the store holds
//!   afterwards. A failed remote read leaves the store untouched and the
//!   last known contents are returned.
//! - Writes go to the server first and only reach the store after the
//!   server accepted them. Creating and updating require connectivity;
//!   deleting while offline removes the local copy only.
//!
//! `Repository` bundles both coordinators over one store.

pub mod action;
pub mod course;
pub mod image;
pub mod repository;
pub mod state;
pub mod student;

#[cfg(test)]
pub(crate) mod mock;

use thiserror::Error;

use crate::api::{ApiError, Origin};
use crate::cache::StoreError;
use crate::validation::ValidationErrors;

pub use action::{Action, Cancelled};
pub use course::CourseSync;
pub use image::ImageSource;
pub use repository::{PrefetchSummary, Repository};
pub use state::{LoadingGuard, ViewState};
pub use student::StudentSync;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("No internet connection")]
    Offline,

    #[error("Error processing image file: {0}")]
    Image(#[source] std::io::Error),

    #[error("Invalid input: {0}")]
    Invalid(#[from] ValidationErrors),

    #[error(transparent)]
    Remote(#[from] ApiError),

    #[error("Local store error: {0}")]
    Store(#[from] StoreError),
}

/// The result of a read: the store-derived items plus where the remote
/// part of the read was served from. `origin` is `None` when the remote
/// read failed and the store's previous contents were returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Synced<T> {
    pub items: T,
    pub origin: Option<Origin>,
}
