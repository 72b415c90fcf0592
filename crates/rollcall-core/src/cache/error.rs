use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to access cache file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to (de)serialize cache file: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Cannot store {0} without a server-assigned id")]
    MissingId(&'static str),

    #[error("Student {student_id} references course {course_id} which is not cached")]
    OrphanStudent { student_id: i64, course_id: i64 },
}
