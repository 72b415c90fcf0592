use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::{Course, Student};

use super::ApiError;

/// Where the data behind a read came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Origin {
    /// A live round-trip to the server.
    Network,
    /// The transport's own response cache.
    Cache,
    /// The transport could not tell.
    Unknown,
    /// No remote call was made; the local store answered.
    Local,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Network => write!(f, "NETWORK"),
            Origin::Cache => write!(f, "CACHE"),
            Origin::Unknown => write!(f, "UNKNOWN"),
            Origin::Local => write!(f, "LOCAL"),
        }
    }
}

/// A remote read together with the origin of its response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched<T> {
    pub data: T,
    pub origin: Origin,
}

impl<T> Fetched<T> {
    pub fn new(data: T, origin: Origin) -> Self {
        Self { data, origin }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Fetched<U> {
        Fetched {
            data: f(self.data),
            origin: self.origin,
        }
    }
}

/// An image already copied to a temporary file, ready for a multipart upload.
///
/// The file is removed when the value is dropped, including when the task
/// holding it is aborted mid-upload.
#[derive(Debug, PartialEq, Eq)]
pub struct ImageUpload {
    pub path: PathBuf,
    pub file_name: String,
}

impl Drop for ImageUpload {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = ?self.path, error = %e, "Failed to remove temporary upload file");
            }
        }
    }
}

/// The REST surface the sync layer depends on.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// `GET /api/course`
    async fn fetch_courses(&self) -> Result<Fetched<Vec<Course>>, ApiError>;

    /// `POST /api/course` (multipart with image)
    async fn create_course(&self, course: &Course, image: &ImageUpload) -> Result<Course, ApiError>;

    /// `PUT /api/course/{id}`: multipart when a new image is sent, JSON otherwise
    async fn update_course(
        &self,
        id: i64,
        course: &Course,
        image: Option<&ImageUpload>,
    ) -> Result<Course, ApiError>;

    /// `DELETE /api/course/{id}`
    async fn delete_course(&self, id: i64) -> Result<(), ApiError>;

    /// `GET /api/student`
    async fn fetch_students(&self) -> Result<Fetched<Vec<Student>>, ApiError>;

    /// `GET /api/student/{id}`
    async fn fetch_student(&self, id: i64) -> Result<Fetched<Student>, ApiError>;

    /// `GET /api/student/course/{id}`
    async fn fetch_students_for_course(
        &self,
        course_id: i64,
    ) -> Result<Fetched<Vec<Student>>, ApiError>;

    /// `POST /api/student` (JSON)
    async fn create_student(&self, student: &Student) -> Result<Student, ApiError>;

    /// `PUT /api/student/{id}` (JSON)
    async fn update_student(&self, id: i64, student: &Student) -> Result<Student, ApiError>;

    /// `DELETE /api/student/{id}`
    async fn delete_student(&self, id: i64) -> Result<(), ApiError>;
}
