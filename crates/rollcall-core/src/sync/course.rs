use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::api::{Origin, RemoteApi};
use crate::cache::LocalStore;
use crate::connectivity::Connectivity;
use crate::models::Course;
use crate::validation::validate_course;

use super::{ImageSource, SyncError, Synced, ViewState};

/// Keeps the course list, the local store and the server in step.
pub struct CourseSync {
    remote: Arc<dyn RemoteApi>,
    store: Arc<LocalStore>,
    connectivity: Arc<dyn Connectivity>,
    uploads_dir: PathBuf,
    state: ViewState<Course>,
}

impl CourseSync {
    pub fn new(
        remote: Arc<dyn RemoteApi>,
        store: Arc<LocalStore>,
        connectivity: Arc<dyn Connectivity>,
        uploads_dir: PathBuf,
    ) -> Self {
        Self {
            remote,
            store,
            connectivity,
            uploads_dir,
            state: ViewState::new(),
        }
    }

    /// Observable list, loading flag and data source for the course screen.
    pub fn state(&self) -> &ViewState<Course> {
        &self.state
    }

    /// Read-through of the whole course list.
    ///
    /// Online, the server's list replaces the cached table first. Either
    /// way the returned list is read back from the store.
    pub async fn fetch_courses(&self) -> Synced<Vec<Course>> {
        let _loading = self.state.begin();

        let origin = if self.connectivity.is_online().await {
            match self.refresh().await {
                Ok(origin) => Some(origin),
                Err(e) => {
                    warn!(error = %e, "Failed to refresh courses, keeping cached copy");
                    None
                }
            }
        } else {
            debug!("Offline, reading courses from local store");
            Some(Origin::Local)
        };

        if let Some(origin) = origin {
            self.state.set_data_source(origin);
        }

        let courses = self.store.courses();
        self.state.set_items(courses.clone());
        info!(count = courses.len(), origin = ?origin, "Fetched courses");

        Synced {
            items: courses,
            origin,
        }
    }

    /// Replace the cached course table with the server's list.
    pub(crate) async fn refresh(&self) -> Result<Origin, SyncError> {
        let fetched = self.remote.fetch_courses().await?;
        self.store.replace_courses(&fetched.data)?;
        debug!(count = fetched.data.len(), origin = %fetched.origin, "Course table refreshed");
        Ok(fetched.origin)
    }

    /// A single course from the local store. The server has no single-course
    /// endpoint; `fetch_courses` keeps these rows current.
    pub fn course(&self, id: i64) -> Option<Course> {
        self.store.course(id)
    }

    pub fn course_has_students(&self, id: i64) -> bool {
        self.store.course_has_students(id)
    }

    /// Create a course on the server with its image, then cache the
    /// server's copy (carrying the assigned id).
    pub async fn create_course(
        &self,
        draft: &Course,
        image: &ImageSource,
    ) -> Result<Course, SyncError> {
        let _loading = self.state.begin();
        let result = self.create_inner(draft, image).await;
        if let Err(ref e) = result {
            error!(error = %e, "Error adding course");
        }
        result
    }

    async fn create_inner(&self, draft: &Course, image: &ImageSource) -> Result<Course, SyncError> {
        validate_course(draft).into_result()?;

        if !self.connectivity.is_online().await {
            return Err(SyncError::Offline);
        }

        let upload = image
            .materialize(&self.uploads_dir)
            .await
            .map_err(SyncError::Image)?;
        let result = self.remote.create_course(draft, &upload).await;
        drop(upload);
        let created = result?;

        self.store.upsert_courses(std::slice::from_ref(&created))?;
        self.state.upsert_item(created.clone());
        info!(course_id = ?created.id, "Course created");
        Ok(created)
    }

    /// Update a course on the server, sending a new image only when one was
    /// picked. A course without an id is logged and ignored (`Ok(None)`).
    pub async fn update_course(
        &self,
        course: &Course,
        image: Option<&ImageSource>,
    ) -> Result<Option<Course>, SyncError> {
        let Some(id) = course.id else {
            error!("Cannot update course: id is missing");
            return Ok(None);
        };

        let _loading = self.state.begin();
        let result = self.update_inner(id, course, image).await;
        if let Err(ref e) = result {
            error!(course_id = id, error = %e, "Error updating course");
        }
        result.map(Some)
    }

    async fn update_inner(
        &self,
        id: i64,
        course: &Course,
        image: Option<&ImageSource>,
    ) -> Result<Course, SyncError> {
        validate_course(course).into_result()?;

        if !self.connectivity.is_online().await {
            return Err(SyncError::Offline);
        }

        let upload = match image {
            Some(image) => Some(
                image
                    .materialize(&self.uploads_dir)
                    .await
                    .map_err(SyncError::Image)?,
            ),
            None => None,
        };
        let result = self.remote.update_course(id, course, upload.as_ref()).await;
        drop(upload);
        let updated = result?;

        self.store.upsert_courses(std::slice::from_ref(&updated))?;
        self.state.replace_item(updated.clone());
        info!(course_id = id, "Course updated");
        Ok(updated)
    }

    /// Delete a course. Online, the local copy (and its students) is only
    /// removed after the server confirmed; offline it is removed right away.
    /// A missing id is logged and ignored.
    pub async fn delete_course(&self, id: Option<i64>) -> Result<(), SyncError> {
        let Some(id) = id else {
            error!("Cannot delete course: id is missing");
            return Ok(());
        };

        let _loading = self.state.begin();

        if self.connectivity.is_online().await {
            if let Err(e) = self.remote.delete_course(id).await {
                error!(course_id = id, error = %e, "Error deleting course");
                return Err(e.into());
            }
        } else {
            warn!(course_id = id, "Offline, deleting course locally only");
        }

        self.store.delete_course(id)?;
        self.state.remove_item(id);
        info!(course_id = id, "Course deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::StoreError;
    use crate::connectivity::StaticConnectivity;
    use crate::models::Student;
    use crate::sync::mock::MockRemote;

    struct Harness {
        remote: Arc<MockRemote>,
        store: Arc<LocalStore>,
        connectivity: Arc<StaticConnectivity>,
        sync: CourseSync,
        dir: PathBuf,
    }

    impl Drop for Harness {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.dir);
        }
    }

    fn harness(remote: MockRemote, online: bool) -> Harness {
        let dir = std::env::temp_dir().join(format!("rollcall-course-{:016x}", rand::random::<u64>()));
        let remote = Arc::new(remote);
        let store = Arc::new(LocalStore::in_memory());
        let connectivity = Arc::new(StaticConnectivity::new(online));
        let sync = CourseSync::new(
            remote.clone(),
            store.clone(),
            connectivity.clone(),
            dir.join("uploads"),
        );
        Harness {
            remote,
            store,
            connectivity,
            sync,
            dir,
        }
    }

    fn course(id: i64, name: &str) -> Course {
        Course {
            id: Some(id),
            ..Course::draft(name, "An introductory course", "Mon 8:00", "Dr. Vega")
        }
    }

    fn draft() -> Course {
        Course::draft(
            "Linear Algebra I",
            "Vectors, matrices and linear maps",
            "Mon/Wed 8:00",
            "Dr. Elena Rojas",
        )
    }

    fn picked_image(h: &Harness) -> ImageSource {
        std::fs::create_dir_all(&h.dir).expect("mkdir");
        let path = h.dir.join("picked.jpg");
        std::fs::write(&path, b"jpeg bytes").expect("write image");
        ImageSource::new(path)
    }

    #[tokio::test]
    async fn test_fetch_online_mirrors_server() {
        let h = harness(MockRemote::new().with_courses(vec![course(1, "Algebra")]), true);

        let synced = h.sync.fetch_courses().await;
        assert_eq!(synced.items, vec![course(1, "Algebra")]);
        assert_eq!(synced.origin, Some(Origin::Network));
        assert_eq!(h.store.courses(), vec![course(1, "Algebra")]);
        assert_eq!(h.sync.state().items(), synced.items);
        assert_eq!(h.sync.state().data_source(), Some(Origin::Network));
        assert!(!h.sync.state().is_loading());
    }

    #[tokio::test]
    async fn test_fetch_reports_transport_cache_origin() {
        let remote = MockRemote::new().with_courses(vec![course(1, "Algebra")]);
        remote.set_origin(Origin::Cache);
        let h = harness(remote, true);

        let synced = h.sync.fetch_courses().await;
        assert_eq!(synced.origin, Some(Origin::Cache));
    }

    #[tokio::test]
    async fn test_fetch_offline_reads_store_without_remote_call() {
        let h = harness(MockRemote::new().with_courses(vec![course(9, "Server only")]), false);
        h.store.upsert_courses(&[course(2, "Cached")]).expect("seed");

        let synced = h.sync.fetch_courses().await;
        assert_eq!(synced.items, h.store.courses());
        assert_eq!(synced.origin, Some(Origin::Local));
        assert!(h.remote.calls().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_returns_last_known_good() {
        let h = harness(MockRemote::new(), true);
        h.store.upsert_courses(&[course(2, "Cached")]).expect("seed");
        h.remote.set_failing(true);

        let synced = h.sync.fetch_courses().await;
        assert_eq!(synced.items, vec![course(2, "Cached")]);
        assert_eq!(synced.origin, None);
        assert_eq!(h.store.courses(), vec![course(2, "Cached")]);
    }

    #[tokio::test]
    async fn test_refresh_drops_removed_courses_and_their_students() {
        let h = harness(MockRemote::new(), true);
        h.store
            .upsert_courses(&[course(1, "Algebra"), course(2, "Physics")])
            .expect("seed courses");
        h.store
            .upsert_students(&[
                Student { id: Some(5), ..Student::draft("Ana", "ana@example.com", "88887777", 1) },
                Student { id: Some(6), ..Student::draft("Luis", "luis@example.com", "88887777", 2) },
            ])
            .expect("seed students");
        h.remote.set_courses(vec![course(1, "Algebra")]);

        h.sync.fetch_courses().await;
        assert!(h.store.course(2).is_none());
        assert!(h.store.student(6).is_none());
        assert!(h.store.student(5).is_some());
    }

    #[tokio::test]
    async fn test_create_online_caches_server_copy() {
        let h = harness(MockRemote::new(), true);
        let image = picked_image(&h);

        let created = h.sync.create_course(&draft(), &image).await.expect("create");
        assert_eq!(created.id, Some(100));
        assert!(created.image_url.is_some());
        assert_eq!(h.store.course(100), Some(created.clone()));
        assert_eq!(h.sync.state().items(), vec![created.clone()]);

        // Visible afterwards, offline too
        h.connectivity.set_online(false);
        let synced = h.sync.fetch_courses().await;
        assert_eq!(synced.items, vec![created]);

        // Temporary upload file was cleaned up
        let leftovers = std::fs::read_dir(h.dir.join("uploads")).expect("uploads dir").count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_create_offline_fails_without_touching_store() {
        let h = harness(MockRemote::new(), false);
        let image = picked_image(&h);

        let err = h.sync.create_course(&draft(), &image).await.unwrap_err();
        assert!(matches!(err, SyncError::Offline));
        assert_eq!(err.to_string(), "No internet connection");
        assert!(h.store.courses().is_empty());
        assert!(h.remote.calls().is_empty());
        assert!(!h.sync.state().is_loading());
    }

    #[tokio::test]
    async fn test_create_with_unreadable_image_fails_before_network() {
        let h = harness(MockRemote::new(), true);
        let image = ImageSource::new(h.dir.join("missing.jpg"));

        let err = h.sync.create_course(&draft(), &image).await.unwrap_err();
        assert!(matches!(err, SyncError::Image(_)));
        assert!(h.remote.calls().is_empty());
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_input() {
        let h = harness(MockRemote::new(), true);
        let image = picked_image(&h);
        let invalid = Course::draft("Algebra", "short", "Mon", "Dr. Vega");

        let err = h.sync.create_course(&invalid, &image).await.unwrap_err();
        match err {
            SyncError::Invalid(errors) => {
                assert!(errors.get("name").is_some());
                assert!(errors.get("description").is_some());
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(h.remote.calls().is_empty());
    }

    #[tokio::test]
    async fn test_update_uses_json_without_new_image() {
        let existing = Course {
            image_url: Some("old.jpg".to_string()),
            ..course(1, "Linear Algebra I")
        };
        let h = harness(MockRemote::new().with_courses(vec![existing.clone()]), true);
        h.sync.fetch_courses().await;

        let edited = Course {
            professor: "Dr. Mario Solis".to_string(),
            ..existing
        };
        let updated = h
            .sync
            .update_course(&edited, None)
            .await
            .expect("update")
            .expect("course had an id");

        assert_eq!(updated.professor, "Dr. Mario Solis");
        assert_eq!(updated.image_url.as_deref(), Some("old.jpg"));
        assert_eq!(h.store.course(1), Some(updated.clone()));
        assert_eq!(h.sync.state().items(), vec![updated]);
        assert!(h.remote.calls().contains(&"PUT /api/course/1 json".to_string()));
    }

    #[tokio::test]
    async fn test_update_with_image_uses_multipart() {
        let h = harness(MockRemote::new().with_courses(vec![course(1, "Linear Algebra I")]), true);
        let image = picked_image(&h);

        h.sync
            .update_course(&course(1, "Linear Algebra I"), Some(&image))
            .await
            .expect("update");
        assert!(h.remote.calls().contains(&"PUT /api/course/1 multipart".to_string()));
    }

    #[tokio::test]
    async fn test_update_without_id_is_noop() {
        let h = harness(MockRemote::new(), true);
        let result = h.sync.update_course(&draft(), None).await.expect("no error");
        assert_eq!(result, None);
        assert!(h.remote.calls().is_empty());
    }

    #[tokio::test]
    async fn test_update_offline_fails() {
        let h = harness(MockRemote::new(), false);
        h.store.upsert_courses(&[course(1, "Linear Algebra I")]).expect("seed");

        let edited = Course {
            schedule: "Fri 10:00".to_string(),
            ..course(1, "Linear Algebra I")
        };
        let err = h.sync.update_course(&edited, None).await.unwrap_err();
        assert!(matches!(err, SyncError::Offline));
        assert_eq!(h.store.course(1).map(|c| c.schedule).as_deref(), Some("Mon 8:00"));
    }

    #[tokio::test]
    async fn test_delete_online_removes_after_server_success() {
        let h = harness(MockRemote::new().with_courses(vec![course(1, "Algebra")]), true);
        h.sync.fetch_courses().await;
        h.store
            .upsert_students(&[Student {
                id: Some(5),
                ..Student::draft("Ana", "ana@example.com", "88887777", 1)
            }])
            .expect("seed student");

        h.sync.delete_course(Some(1)).await.expect("delete");
        assert!(h.store.course(1).is_none());
        assert!(h.store.student(5).is_none());
        assert!(h.sync.state().items().is_empty());

        let synced = h.sync.fetch_courses().await;
        assert!(synced.items.is_empty());
    }

    #[tokio::test]
    async fn test_delete_remote_failure_keeps_local_copy() {
        let h = harness(MockRemote::new().with_courses(vec![course(1, "Algebra")]), true);
        h.sync.fetch_courses().await;
        h.remote.set_failing(true);

        let err = h.sync.delete_course(Some(1)).await.unwrap_err();
        assert!(matches!(err, SyncError::Remote(_)));
        assert!(h.store.course(1).is_some());
        assert_eq!(h.sync.state().items().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_offline_is_local_only() {
        let h = harness(MockRemote::new(), false);
        h.store.upsert_courses(&[course(1, "Algebra")]).expect("seed");

        h.sync.delete_course(Some(1)).await.expect("delete");
        assert!(h.store.course(1).is_none());
        assert!(h.remote.calls().is_empty());
    }

    #[tokio::test]
    async fn test_delete_without_id_is_noop() {
        let h = harness(MockRemote::new(), true);
        h.sync.delete_course(None).await.expect("no error");
        assert!(h.remote.calls().is_empty());
        assert!(!h.sync.state().is_loading());
    }

    #[tokio::test]
    async fn test_server_course_without_id_keeps_cache() {
        let h = harness(MockRemote::new().with_courses(vec![draft()]), true);
        h.store.upsert_courses(&[course(2, "Cached")]).expect("seed");

        let synced = h.sync.fetch_courses().await;
        assert_eq!(synced.origin, None);
        assert_eq!(synced.items, vec![course(2, "Cached")]);
        assert!(matches!(
            h.sync.refresh().await,
            Err(SyncError::Store(StoreError::MissingId("course")))
        ));
    }
}
