use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::api::{ApiClient, Origin, RemoteApi};
use crate::cache::{CacheAges, LocalStore};
use crate::config::Config;
use crate::connectivity::{Connectivity, StaticConnectivity, TcpProbe};

use super::{CourseSync, StudentSync, SyncError};

/// Course student lists fetched at the same time during a prefetch
const MAX_CONCURRENT_REQUESTS: usize = 5;

/// Outcome of `Repository::prefetch_all`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefetchSummary {
    pub origin: Option<Origin>,
    pub courses: usize,
    pub students: usize,
    /// Courses whose student list could not be refreshed.
    pub failed_courses: Vec<i64>,
}

/// Both coordinators over one store, remote and connectivity check.
pub struct Repository {
    pub courses: CourseSync,
    pub students: StudentSync,
    store: Arc<LocalStore>,
    connectivity: Arc<dyn Connectivity>,
}

impl Repository {
    pub fn new(
        remote: Arc<dyn RemoteApi>,
        store: Arc<LocalStore>,
        connectivity: Arc<dyn Connectivity>,
        uploads_dir: PathBuf,
    ) -> Self {
        Self {
            courses: CourseSync::new(
                remote.clone(),
                store.clone(),
                connectivity.clone(),
                uploads_dir,
            ),
            students: StudentSync::new(remote, store.clone(), connectivity.clone()),
            store,
            connectivity,
        }
    }

    /// Wire up the reqwest client, the TCP reachability probe and the
    /// on-disk store from `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let remote = ApiClient::new(&config.api_base_url)
            .with_context(|| format!("Invalid API base URL: {}", config.api_base_url))?;

        let timeout = Duration::from_millis(config.probe_timeout_ms);
        let connectivity: Arc<dyn Connectivity> =
            match TcpProbe::for_base_url(&config.api_base_url, timeout) {
                Some(probe) => Arc::new(probe.with_offline_mode(config.offline_mode)),
                None => {
                    warn!(url = %config.api_base_url, "API URL has no host, staying offline");
                    Arc::new(StaticConnectivity::new(false))
                }
            };

        let cache_dir = config.cache_dir()?;
        let store = LocalStore::open(&cache_dir)
            .with_context(|| format!("Failed to open local store at {}", cache_dir.display()))?;
        debug!(dir = %cache_dir.display(), "Local store opened");

        Ok(Self::new(
            Arc::new(remote),
            Arc::new(store),
            connectivity,
            config.uploads_dir()?,
        ))
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn cache_ages(&self) -> CacheAges {
        self.store.cache_ages()
    }

    pub async fn is_online(&self) -> bool {
        self.connectivity.is_online().await
    }

    /// Delete a course and keep the student list in step with the store's
    /// cascade.
    pub async fn delete_course(&self, id: Option<i64>) -> Result<(), SyncError> {
        self.courses.delete_course(id).await?;
        if let Some(id) = id {
            self.students.forget_course(id);
        }
        Ok(())
    }

    /// Pull the whole dataset into the store so it is available offline:
    /// the course list first, then the students of every cached course.
    pub async fn prefetch_all(&self) -> Result<PrefetchSummary, SyncError> {
        if !self.connectivity.is_online().await {
            return Err(SyncError::Offline);
        }

        let origin = self.courses.refresh().await?;
        let course_ids: Vec<i64> = self.store.courses().iter().filter_map(|c| c.id).collect();
        info!(count = course_ids.len(), "Courses prefetched, fetching students");

        let students = &self.students;
        let results: Vec<(i64, Result<Origin, SyncError>)> = stream::iter(course_ids)
            .map(|id| async move { (id, students.refresh_for_course(id).await) })
            .buffer_unordered(MAX_CONCURRENT_REQUESTS)
            .collect()
            .await;

        let mut failed_courses: Vec<i64> = results
            .into_iter()
            .filter_map(|(id, result)| match result {
                Ok(_) => None,
                Err(e) => {
                    warn!(course_id = id, error = %e, "Failed to prefetch course students");
                    Some(id)
                }
            })
            .collect();
        failed_courses.sort_unstable();

        let summary = PrefetchSummary {
            origin: Some(origin),
            courses: self.store.courses().len(),
            students: self.store.students().len(),
            failed_courses,
        };
        info!(
            courses = summary.courses,
            students = summary.students,
            failed = summary.failed_courses.len(),
            "Prefetch complete"
        );
        Ok(summary)
    }
}
