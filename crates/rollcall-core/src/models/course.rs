use serde::{Deserialize, Serialize};

use super::Entity;

/// Path segment under the API base URL where course images are served.
const UPLOADS_SEGMENT: &str = "uploads";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct Course {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    pub description: String,
    #[serde(rename = "imageUrl", default)]
    pub image_url: Option<String>,
    pub schedule: String,
    pub professor: String,
}

impl Course {
    /// Build a draft course that has not been submitted to the server yet.
    pub fn draft(
        name: impl Into<String>,
        description: impl Into<String>,
        schedule: impl Into<String>,
        professor: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: description.into(),
            image_url: None,
            schedule: schedule.into(),
            professor: professor.into(),
        }
    }

    /// Resolve the relative image path returned by the server against the
    /// API base URL, e.g. `abc.jpg` -> `http://host:5000/uploads/abc.jpg`.
    pub fn image_link(&self, base_url: &str) -> Option<String> {
        let path = self.image_url.as_deref()?.trim();
        if path.is_empty() {
            return None;
        }
        if path.starts_with("http://") || path.starts_with("https://") {
            return Some(path.to_string());
        }
        Some(format!(
            "{}/{}/{}",
            base_url.trim_end_matches('/'),
            UPLOADS_SEGMENT,
            path.trim_start_matches('/')
        ))
    }
}

impl Entity for Course {
    fn id(&self) -> Option<i64> {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }
}
