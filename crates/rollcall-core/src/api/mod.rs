//! REST API client module for the course backend.
//!
//! This module provides the `RemoteApi` trait the sync layer talks to and
//! `ApiClient`, its reqwest implementation for the `/api/course` and
//! `/api/student` endpoints.
//!
//! GET responses go through a small response cache, so every read reports
//! whether it was served from the network or from that cache.

pub mod client;
pub mod error;
pub mod remote;
pub mod response_cache;

pub use client::ApiClient;
pub use error::ApiError;
pub use remote::{Fetched, ImageUpload, Origin, RemoteApi};
pub use response_cache::ResponseCache;
