//! API client for communicating with the course REST backend.
//!
//! This module provides the `ApiClient` struct, the reqwest implementation
//! of `RemoteApi`. Reads go through the `ResponseCache`; writes invalidate
//! the cached responses of the resource they touch.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::models::{Course, Student};

use super::{ApiError, Fetched, ImageUpload, Origin, RemoteApi, ResponseCache};

// ============================================================================
// Constants
// ============================================================================

/// Connect timeout in seconds.
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Whole-request timeout in seconds (covers reading and writing the body).
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

const COURSE_PATH: &str = "api/course";
const STUDENT_PATH: &str = "api/student";

/// Uploads are always materialized as `.jpg` temp files.
const IMAGE_MIME: &str = "image/jpeg";

/// API client for the course backend.
/// Clone is cheap - reqwest::Client and the response cache are shared via Arc.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Arc<str>,
    responses: Arc<ResponseCache>,
    initial_backoff: Duration,
}

impl ApiClient {
    /// Create a new API client for the server at `base_url`
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Self::with_response_cache(base_url, ResponseCache::default())
    }

    pub fn with_response_cache(base_url: &str, responses: ResponseCache) -> Result<Self, ApiError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: Arc::from(base_url.trim_end_matches('/')),
            responses: Arc::new(responses),
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        })
    }

    /// Override the first delay after a 429; it doubles on each retry.
    pub fn with_initial_backoff(mut self, initial_backoff: Duration) -> Self {
        self.initial_backoff = initial_backoff;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>, ApiError> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    fn decode<T: DeserializeOwned>(url: &str, body: &str) -> Result<T, ApiError> {
        serde_json::from_str(body).map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse JSON response from {}: {}", url, e))
        })
    }

    async fn backoff(url: &str, retries: &mut u32, backoff: &mut Duration) -> Result<(), ApiError> {
        *retries += 1;
        if *retries > MAX_RATE_LIMIT_RETRIES {
            return Err(ApiError::RateLimited);
        }
        warn!(url = url, retry = *retries, backoff_ms = backoff.as_millis() as u64, "Rate limited, backing off");
        tokio::time::sleep(*backoff).await;
        *backoff *= 2; // Exponential backoff
        Ok(())
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Fetched<T>, ApiError> {
        let url = self.url(path);

        if let Some(body) = self.responses.fresh(&url) {
            debug!(url = %url, "Serving GET from response cache");
            return Ok(Fetched::new(Self::decode(&url, &body)?, Origin::Cache));
        }

        let mut retries = 0;
        let mut backoff = self.initial_backoff;

        loop {
            let response = match self.client.get(&url).send().await {
                Ok(response) => response,
                Err(e) => {
                    if let Some(body) = self.responses.stale(&url) {
                        warn!(url = %url, error = %e, "GET failed, serving stale cached response");
                        return Ok(Fetched::new(Self::decode(&url, &body)?, Origin::Cache));
                    }
                    return Err(e.into());
                }
            };

            match Self::check_response_for_retry(response).await? {
                Some(response) => {
                    let body = response.text().await?;
                    let data = Self::decode(&url, &body)?;
                    self.responses.store(&url, &body);
                    return Ok(Fetched::new(data, Origin::Network));
                }
                None => Self::backoff(&url, &mut retries, &mut backoff).await?,
            }
        }
    }

    async fn send_json<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.url(path);
        let mut retries = 0;
        let mut backoff = self.initial_backoff;

        loop {
            let response = self
                .client
                .request(method.clone(), &url)
                .json(body)
                .send()
                .await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => {
                    let text = response.text().await?;
                    return Self::decode(&url, &text);
                }
                None => Self::backoff(&url, &mut retries, &mut backoff).await?,
            }
        }
    }

    /// Multipart bodies are consumed on send, so these are not retried.
    async fn send_multipart<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        form: Form,
    ) -> Result<T, ApiError> {
        let url = self.url(path);
        let response = self.client.request(method, &url).multipart(form).send().await?;
        let response = Self::check_response(response).await?;
        let text = response.text().await?;
        Self::decode(&url, &text)
    }

    async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let url = self.url(path);
        let response = self.client.delete(&url).send().await?;
        Self::check_response(response).await?;
        Ok(())
    }

    async fn course_form(course: &Course, image: &ImageUpload) -> Result<Form, ApiError> {
        let bytes = tokio::fs::read(&image.path).await?;
        let file = Part::bytes(bytes)
            .file_name(image.file_name.clone())
            .mime_str(IMAGE_MIME)?;

        Ok(Form::new()
            .text("Name", course.name.clone())
            .text("Description", course.description.clone())
            .text("Schedule", course.schedule.clone())
            .text("Professor", course.professor.clone())
            .part("file", file))
    }

    fn invalidate_courses(&self) {
        // Deleting or changing a course can change the student listings too
        self.responses.invalidate_prefix(&self.url(COURSE_PATH));
        self.responses.invalidate_prefix(&self.url(STUDENT_PATH));
    }

    fn invalidate_students(&self) {
        self.responses.invalidate_prefix(&self.url(STUDENT_PATH));
    }
}

#[async_trait]
impl RemoteApi for ApiClient {
    async fn fetch_courses(&self) -> Result<Fetched<Vec<Course>>, ApiError> {
        let fetched: Fetched<Vec<Course>> = self.get(COURSE_PATH).await?;
        debug!(count = fetched.data.len(), origin = %fetched.origin, "Courses fetched");
        Ok(fetched)
    }

    async fn create_course(&self, course: &Course, image: &ImageUpload) -> Result<Course, ApiError> {
        let form = Self::course_form(course, image).await?;
        let created = self.send_multipart(Method::POST, COURSE_PATH, form).await?;
        self.invalidate_courses();
        Ok(created)
    }

    async fn update_course(
        &self,
        id: i64,
        course: &Course,
        image: Option<&ImageUpload>,
    ) -> Result<Course, ApiError> {
        let path = format!("{}/{}", COURSE_PATH, id);
        let updated = match image {
            Some(image) => {
                let form = Self::course_form(course, image).await?;
                self.send_multipart(Method::PUT, &path, form).await?
            }
            None => self.send_json(Method::PUT, &path, course).await?,
        };
        self.invalidate_courses();
        Ok(updated)
    }

    async fn delete_course(&self, id: i64) -> Result<(), ApiError> {
        self.delete(&format!("{}/{}", COURSE_PATH, id)).await?;
        self.invalidate_courses();
        Ok(())
    }

    async fn fetch_students(&self) -> Result<Fetched<Vec<Student>>, ApiError> {
        self.get(STUDENT_PATH).await
    }

    async fn fetch_student(&self, id: i64) -> Result<Fetched<Student>, ApiError> {
        self.get(&format!("{}/{}", STUDENT_PATH, id)).await
    }

    async fn fetch_students_for_course(
        &self,
        course_id: i64,
    ) -> Result<Fetched<Vec<Student>>, ApiError> {
        self.get(&format!("{}/course/{}", STUDENT_PATH, course_id)).await
    }

    async fn create_student(&self, student: &Student) -> Result<Student, ApiError> {
        let created = self.send_json(Method::POST, STUDENT_PATH, student).await?;
        self.invalidate_students();
        Ok(created)
    }

    async fn update_student(&self, id: i64, student: &Student) -> Result<Student, ApiError> {
        let path = format!("{}/{}", STUDENT_PATH, id);
        let updated = self.send_json(Method::PUT, &path, student).await?;
        self.invalidate_students();
        Ok(updated)
    }

    async fn delete_student(&self, id: i64) -> Result<(), ApiError> {
        self.delete(&format!("{}/{}", STUDENT_PATH, id)).await?;
        self.invalidate_students();
        Ok(())
    }
}
