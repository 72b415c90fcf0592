use serde::{Deserialize, Serialize};

use super::Entity;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct Student {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(rename = "courseId")]
    pub course_id: i64,
}

impl Student {
    /// Build a draft student that has not been submitted to the server yet.
    pub fn draft(
        name: impl Into<String>,
        email: impl Into<String>,
        phone: impl Into<String>,
        course_id: i64,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            email: email.into(),
            phone: phone.into(),
            course_id,
        }
    }
}

impl Entity for Student {
    fn id(&self) -> Option<i64> {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A single student as shown on the detail screen, with the name of the
/// owning course resolved from the local store when it is cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct StudentDetail {
    pub student: Student,
    pub course_name: Option<String>,
}
