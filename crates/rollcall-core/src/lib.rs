//! Core library for rollcall.
//!
//! Keeps a course and student catalog usable with or without a connection
//! to the REST backend:
//!
//! - `api`: the `RemoteApi` trait and its reqwest client
//! - `cache`: the `LocalStore` mirroring the server's tables on disk
//! - `connectivity`: reachability checks consulted before each operation
//! - `sync`: the per-entity coordinators tying the three together
//! - `validation`: form rules for course and student input

pub mod api;
pub mod cache;
pub mod config;
pub mod connectivity;
pub mod models;
pub mod sync;
pub mod utils;
pub mod validation;

pub use api::{ApiClient, ApiError, Origin};
pub use cache::LocalStore;
pub use config::Config;
pub use models::{Course, Student, StudentDetail};
pub use sync::{Action, Repository, SyncError, Synced};
