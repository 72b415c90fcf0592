//! In-memory stand-in for the REST backend used by the coordinator tests.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::api::{ApiError, Fetched, ImageUpload, Origin, RemoteApi};
use crate::models::{Course, Student};

/// Behaves like the server: assigns ids, keeps its own tables, and records
/// every call it receives. `set_failing(true)` turns every call into a 500.
pub(crate) struct MockRemote {
    courses: Mutex<Vec<Course>>,
    students: Mutex<Vec<Student>>,
    next_id: AtomicI64,
    origin: Mutex<Origin>,
    failing: AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl MockRemote {
    pub(crate) fn new() -> Self {
        Self {
            courses: Mutex::new(Vec::new()),
            students: Mutex::new(Vec::new()),
            next_id: AtomicI64::new(100),
            origin: Mutex::new(Origin::Network),
            failing: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_courses(self, courses: Vec<Course>) -> Self {
        *self.courses.lock().unwrap() = courses;
        self
    }

    pub(crate) fn with_students(self, students: Vec<Student>) -> Self {
        *self.students.lock().unwrap() = students;
        self
    }

    pub(crate) fn set_courses(&self, courses: Vec<Course>) {
        *self.courses.lock().unwrap() = courses;
    }

    pub(crate) fn set_origin(&self, origin: Origin) {
        *self.origin.lock().unwrap() = origin;
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn server_students(&self) -> Vec<Student> {
        self.students.lock().unwrap().clone()
    }

    fn record(&self, call: String) -> Result<(), ApiError> {
        self.calls.lock().unwrap().push(call);
        if self.failing.load(Ordering::SeqCst) {
            Err(ApiError::ServerError("scripted failure".to_string()))
        } else {
            Ok(())
        }
    }

    fn fetched<T>(&self, data: T) -> Fetched<T> {
        Fetched::new(data, *self.origin.lock().unwrap())
    }

    fn assign_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteApi for MockRemote {
    async fn fetch_courses(&self) -> Result<Fetched<Vec<Course>>, ApiError> {
        self.record("GET /api/course".to_string())?;
        Ok(self.fetched(self.courses.lock().unwrap().clone()))
    }

    async fn create_course(&self, course: &Course, image: &ImageUpload) -> Result<Course, ApiError> {
        self.record("POST /api/course".to_string())?;
        let created = Course {
            id: Some(self.assign_id()),
            image_url: Some(image.file_name.clone()),
            ..course.clone()
        };
        self.courses.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn update_course(
        &self,
        id: i64,
        course: &Course,
        image: Option<&ImageUpload>,
    ) -> Result<Course, ApiError> {
        let encoding = if image.is_some() { "multipart" } else { "json" };
        self.record(format!("PUT /api/course/{} {}", id, encoding))?;
        let mut courses = self.courses.lock().unwrap();
        let existing = courses
            .iter_mut()
            .find(|c| c.id == Some(id))
            .ok_or_else(|| ApiError::NotFound(format!("course {}", id)))?;
        *existing = Course {
            id: Some(id),
            image_url: image
                .map(|i| i.file_name.clone())
                .or_else(|| existing.image_url.clone()),
            ..course.clone()
        };
        Ok(existing.clone())
    }

    async fn delete_course(&self, id: i64) -> Result<(), ApiError> {
        self.record(format!("DELETE /api/course/{}", id))?;
        self.courses.lock().unwrap().retain(|c| c.id != Some(id));
        self.students.lock().unwrap().retain(|s| s.course_id != id);
        Ok(())
    }

    async fn fetch_students(&self) -> Result<Fetched<Vec<Student>>, ApiError> {
        self.record("GET /api/student".to_string())?;
        Ok(self.fetched(self.students.lock().unwrap().clone()))
    }

    async fn fetch_student(&self, id: i64) -> Result<Fetched<Student>, ApiError> {
        self.record(format!("GET /api/student/{}", id))?;
        let student = self
            .students
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == Some(id))
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("student {}", id)))?;
        Ok(self.fetched(student))
    }

    async fn fetch_students_for_course(
        &self,
        course_id: i64,
    ) -> Result<Fetched<Vec<Student>>, ApiError> {
        self.record(format!("GET /api/student/course/{}", course_id))?;
        let students = self
            .students
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.course_id == course_id)
            .cloned()
            .collect();
        Ok(self.fetched(students))
    }

    async fn create_student(&self, student: &Student) -> Result<Student, ApiError> {
        self.record("POST /api/student".to_string())?;
        let created = Student {
            id: Some(self.assign_id()),
            ..student.clone()
        };
        self.students.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn update_student(&self, id: i64, student: &Student) -> Result<Student, ApiError> {
        self.record(format!("PUT /api/student/{}", id))?;
        let mut students = self.students.lock().unwrap();
        let existing = students
            .iter_mut()
            .find(|s| s.id == Some(id))
            .ok_or_else(|| ApiError::NotFound(format!("student {}", id)))?;
        *existing = Student {
            id: Some(id),
            ..student.clone()
        };
        Ok(existing.clone())
    }

    async fn delete_student(&self, id: i64) -> Result<(), ApiError> {
        self.record(format!("DELETE /api/student/{}", id))?;
        let mut students = self.students.lock().unwrap();
        let before = students.len();
        students.retain(|s| s.id != Some(id));
        if students.len() == before {
            return Err(ApiError::NotFound(format!("student {}", id)));
        }
        Ok(())
    }
}
