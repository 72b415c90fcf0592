use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::api::{Origin, RemoteApi};
use crate::cache::LocalStore;
use crate::connectivity::Connectivity;
use crate::models::{Student, StudentDetail};
use crate::validation::validate_student;

use super::{SyncError, Synced, ViewState};

/// Keeps the student list, the local store and the server in step.
///
/// Besides the list it tracks the student opened in the detail view along
/// with the name of the course that student belongs to.
pub struct StudentSync {
    remote: Arc<dyn RemoteApi>,
    store: Arc<LocalStore>,
    connectivity: Arc<dyn Connectivity>,
    state: ViewState<Student>,
    selected: watch::Sender<Option<Student>>,
    course_name: watch::Sender<Option<String>>,
}

impl StudentSync {
    pub fn new(
        remote: Arc<dyn RemoteApi>,
        store: Arc<LocalStore>,
        connectivity: Arc<dyn Connectivity>,
    ) -> Self {
        Self {
            remote,
            store,
            connectivity,
            state: ViewState::new(),
            selected: watch::channel(None).0,
            course_name: watch::channel(None).0,
        }
    }

    pub fn state(&self) -> &ViewState<Student> {
        &self.state
    }

    pub fn selected_student(&self) -> Option<Student> {
        self.selected.borrow().clone()
    }

    pub fn subscribe_selected(&self) -> watch::Receiver<Option<Student>> {
        self.selected.subscribe()
    }

    pub fn selected_course_name(&self) -> Option<String> {
        self.course_name.borrow().clone()
    }

    pub fn subscribe_course_name(&self) -> watch::Receiver<Option<String>> {
        self.course_name.subscribe()
    }

    /// Read-through of the student list, either all of it or the students of
    /// one course.
    pub async fn fetch_students(&self, course_id: Option<i64>) -> Synced<Vec<Student>> {
        let _loading = self.state.begin();

        let origin = if self.connectivity.is_online().await {
            let refreshed = match course_id {
                Some(id) => self.refresh_for_course(id).await,
                None => self.refresh_all().await,
            };
            match refreshed {
                Ok(origin) => Some(origin),
                Err(e) => {
                    warn!(course_id = ?course_id, error = %e, "Failed to refresh students, keeping cached copy");
                    None
                }
            }
        } else {
            debug!(course_id = ?course_id, "Offline, reading students from local store");
            Some(Origin::Local)
        };

        if let Some(origin) = origin {
            self.state.set_data_source(origin);
        }

        let students = match course_id {
            Some(id) => self.store.students_for_course(id),
            None => self.store.students(),
        };
        self.state.set_items(students.clone());
        info!(count = students.len(), course_id = ?course_id, origin = ?origin, "Fetched students");

        Synced {
            items: students,
            origin,
        }
    }

    async fn refresh_all(&self) -> Result<Origin, SyncError> {
        let fetched = self.remote.fetch_students().await?;

        let missing: BTreeSet<i64> = fetched
            .data
            .iter()
            .map(|s| s.course_id)
            .filter(|id| self.store.course(*id).is_none())
            .collect();
        if !missing.is_empty() {
            self.fill_courses(&missing).await?;
        }

        let (kept, orphans): (Vec<Student>, Vec<Student>) = fetched
            .data
            .into_iter()
            .partition(|s| self.store.course(s.course_id).is_some());
        if !orphans.is_empty() {
            warn!(
                count = orphans.len(),
                "Skipping students whose course is not on the server"
            );
        }
        self.store.replace_students(&kept)?;
        Ok(fetched.origin)
    }

    /// Pull the course list into the store when `course_ids` are not cached
    /// yet, so students referencing them can be stored. Only adds or
    /// updates courses; removals are left to `CourseSync::fetch_courses`.
    async fn fill_courses(&self, course_ids: &BTreeSet<i64>) -> Result<(), SyncError> {
        debug!(?course_ids, "Fetching courses missing from the local store");
        let fetched = self.remote.fetch_courses().await?;
        self.store.upsert_courses(&fetched.data)?;
        Ok(())
    }

    /// Make sure the course a student belongs to is cached.
    async fn ensure_course(&self, course_id: i64) -> Result<(), SyncError> {
        if self.store.course(course_id).is_none() {
            self.fill_courses(&BTreeSet::from([course_id])).await?;
        }
        Ok(())
    }

    /// Cache a student the server just returned. Failing to do so does not
    /// undo the server-side write, so it is logged rather than returned.
    async fn cache_written(&self, student: &Student) {
        if let Err(e) = self.ensure_course(student.course_id).await {
            warn!(course_id = student.course_id, error = %e, "Failed to fetch course for student");
        }
        if let Err(e) = self.store.upsert_students(std::slice::from_ref(student)) {
            warn!(student_id = ?student.id, error = %e, "Saved on server but not cached locally");
        }
    }

    /// Replace the cached students of one course with the server's list.
    pub(crate) async fn refresh_for_course(&self, course_id: i64) -> Result<Origin, SyncError> {
        let fetched = self.remote.fetch_students_for_course(course_id).await?;
        self.ensure_course(course_id).await?;
        let students: Vec<Student> = fetched
            .data
            .into_iter()
            .map(|s| Student { course_id, ..s })
            .collect();
        self.store.replace_students_for_course(course_id, &students)?;
        debug!(course_id, count = students.len(), "Course students refreshed");
        Ok(fetched.origin)
    }

    /// Read-through of one student plus the name of its course, resolved
    /// from the cached course table. Also published as the selected student.
    pub async fn fetch_student(&self, id: i64) -> Synced<Option<StudentDetail>> {
        let _loading = self.state.begin();

        let origin = if self.connectivity.is_online().await {
            match self.refresh_one(id).await {
                Ok(origin) => Some(origin),
                Err(e) => {
                    warn!(student_id = id, error = %e, "Failed to refresh student, keeping cached copy");
                    None
                }
            }
        } else {
            Some(Origin::Local)
        };

        if let Some(origin) = origin {
            self.state.set_data_source(origin);
        }

        let detail = self.store.student(id).map(|student| {
            let course_name = self.store.course(student.course_id).map(|c| c.name);
            StudentDetail {
                student,
                course_name,
            }
        });

        self.selected
            .send_replace(detail.as_ref().map(|d| d.student.clone()));
        self.course_name
            .send_replace(detail.as_ref().and_then(|d| d.course_name.clone()));
        if detail.is_none() {
            warn!(student_id = id, "Student not found");
        }

        Synced {
            items: detail,
            origin,
        }
    }

    async fn refresh_one(&self, id: i64) -> Result<Origin, SyncError> {
        let fetched = self.remote.fetch_student(id).await?;
        self.ensure_course(fetched.data.course_id).await?;
        self.store.upsert_students(std::slice::from_ref(&fetched.data))?;
        self.state.replace_item(fetched.data);
        Ok(fetched.origin)
    }

    pub fn student(&self, id: i64) -> Option<Student> {
        self.store.student(id)
    }

    /// Create a student on the server, then cache the server's copy. Once the
    /// server accepted the student this returns it, even if caching failed.
    pub async fn create_student(&self, draft: &Student) -> Result<Student, SyncError> {
        let _loading = self.state.begin();
        let result = self.create_inner(draft).await;
        if let Err(ref e) = result {
            error!(error = %e, "Error adding student");
        }
        result
    }

    async fn create_inner(&self, draft: &Student) -> Result<Student, SyncError> {
        validate_student(draft).into_result()?;

        if !self.connectivity.is_online().await {
            return Err(SyncError::Offline);
        }

        let created = self.remote.create_student(draft).await?;
        self.cache_written(&created).await;
        self.state.upsert_item(created.clone());
        info!(student_id = ?created.id, course_id = created.course_id, "Student created");
        Ok(created)
    }

    /// Update a student on the server and mirror the server's copy locally.
    /// A student without an id is logged and ignored (`Ok(None)`).
    pub async fn update_student(&self, student: &Student) -> Result<Option<Student>, SyncError> {
        let Some(id) = student.id else {
            error!("Cannot update student: id is missing");
            return Ok(None);
        };

        let _loading = self.state.begin();
        let result = self.update_inner(id, student).await;
        if let Err(ref e) = result {
            error!(student_id = id, error = %e, "Error updating student");
        }
        result.map(Some)
    }

    async fn update_inner(&self, id: i64, student: &Student) -> Result<Student, SyncError> {
        validate_student(student).into_result()?;

        if !self.connectivity.is_online().await {
            return Err(SyncError::Offline);
        }

        let updated = self.remote.update_student(id, student).await?;
        self.cache_written(&updated).await;
        self.state.replace_item(updated.clone());

        if self.selected_student().and_then(|s| s.id) == Some(id) {
            let course_name = self.store.course(updated.course_id).map(|c| c.name);
            self.selected.send_replace(Some(updated.clone()));
            self.course_name.send_replace(course_name);
        }

        info!(student_id = id, "Student updated");
        Ok(updated)
    }

    /// Delete a student. Online, the local copy is only removed after the
    /// server confirmed; offline it is removed right away. A missing id is
    /// logged and ignored.
    pub async fn delete_student(&self, id: Option<i64>) -> Result<(), SyncError> {
        let Some(id) = id else {
            error!("Cannot delete student: id is missing");
            return Ok(());
        };

        let _loading = self.state.begin();

        if self.connectivity.is_online().await {
            if let Err(e) = self.remote.delete_student(id).await {
                error!(student_id = id, error = %e, "Error deleting student");
                return Err(e.into());
            }
        } else {
            warn!(student_id = id, "Offline, deleting student locally only");
        }

        self.store.delete_student(id)?;
        self.state.remove_item(id);
        if self.selected_student().and_then(|s| s.id) == Some(id) {
            self.clear_selection();
        }
        info!(student_id = id, "Student deleted");
        Ok(())
    }

    pub fn clear_selection(&self) {
        self.selected.send_replace(None);
        self.course_name.send_replace(None);
    }

    /// Drop the students of a deleted course from the observable state. The
    /// store has already cascaded the delete.
    pub(crate) fn forget_course(&self, course_id: i64) {
        self.state.retain(|s| s.course_id != course_id);
        if self.selected_student().map(|s| s.course_id) == Some(course_id) {
            self.clear_selection();
        }
    }
}
