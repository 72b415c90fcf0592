//! Form validation for course and student input.
//!
//! Lengths are counted in characters. Every rule failure is reported
//! under the name of the field it belongs to.

use std::collections::BTreeMap;
use std::fmt;

use email_address::EmailAddress;

use crate::models::{Course, Student};

// Course rules
const COURSE_NAME_MIN_LENGTH: usize = 10;
const COURSE_NAME_MAX_LENGTH: usize = 63;
const COURSE_DESCRIPTION_MIN_LENGTH: usize = 10;
const COURSE_DESCRIPTION_MAX_LENGTH: usize = 500;
const SCHEDULE_MAX_LENGTH: usize = 100;
const PROFESSOR_NAME_MAX_LENGTH: usize = 255;

// Student rules
const STUDENT_NAME_MIN_LENGTH: usize = 2;
const STUDENT_NAME_MAX_LENGTH: usize = 255;
const PHONE_MIN_LENGTH: usize = 7;
const PHONE_MAX_LENGTH: usize = 15;

/// Field name to error message, for every field that failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(BTreeMap<&'static str, String>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.0.iter().map(|(field, msg)| (*field, msg.as_str()))
    }

    fn check(&mut self, field: &'static str, error: Option<String>) {
        if let Some(msg) = error {
            self.0.insert(field, msg);
        }
    }

    pub fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, msg)| format!("{}: {}", field, msg))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

pub fn validate_course(course: &Course) -> ValidationErrors {
    let mut errors = ValidationErrors::default();

    let name = char_len(&course.name);
    errors.check("name", if course.name.trim().is_empty() {
        Some("Course name is required".to_string())
    } else if name < COURSE_NAME_MIN_LENGTH {
        Some(format!("Course name must be at least {} characters", COURSE_NAME_MIN_LENGTH))
    } else if name > COURSE_NAME_MAX_LENGTH {
        Some(format!("Course name must not exceed {} characters", COURSE_NAME_MAX_LENGTH))
    } else {
        None
    });

    let description = char_len(&course.description);
    errors.check("description", if course.description.trim().is_empty() {
        Some("Course description is required".to_string())
    } else if description < COURSE_DESCRIPTION_MIN_LENGTH {
        Some(format!("Description must be at least {} characters", COURSE_DESCRIPTION_MIN_LENGTH))
    } else if description > COURSE_DESCRIPTION_MAX_LENGTH {
        Some(format!("Description must not exceed {} characters", COURSE_DESCRIPTION_MAX_LENGTH))
    } else {
        None
    });

    errors.check("schedule", if course.schedule.trim().is_empty() {
        Some("Schedule is required".to_string())
    } else if char_len(&course.schedule) > SCHEDULE_MAX_LENGTH {
        Some(format!("Schedule must not exceed {} characters", SCHEDULE_MAX_LENGTH))
    } else {
        None
    });

    errors.check("professor", if course.professor.trim().is_empty() {
        Some("Professor name is required".to_string())
    } else if char_len(&course.professor) > PROFESSOR_NAME_MAX_LENGTH {
        Some(format!("Professor name must not exceed {} characters", PROFESSOR_NAME_MAX_LENGTH))
    } else {
        None
    });

    errors
}

pub fn validate_student(student: &Student) -> ValidationErrors {
    let mut errors = ValidationErrors::default();

    let name = char_len(&student.name);
    errors.check("name", if student.name.trim().is_empty() {
        Some("Name is required".to_string())
    } else if !(STUDENT_NAME_MIN_LENGTH..=STUDENT_NAME_MAX_LENGTH).contains(&name) {
        Some(format!(
            "Name must be between {} and {} characters",
            STUDENT_NAME_MIN_LENGTH, STUDENT_NAME_MAX_LENGTH
        ))
    } else if !student.name.chars().all(|c| c.is_alphabetic() || c.is_whitespace()) {
        Some("Name can only contain letters and spaces".to_string())
    } else {
        None
    });

    errors.check("email", if student.email.trim().is_empty() {
        Some("Email is required".to_string())
    } else if !EmailAddress::is_valid(&student.email) {
        Some("Please enter a valid email address".to_string())
    } else {
        None
    });

    let phone = char_len(&student.phone);
    errors.check("phone", if student.phone.trim().is_empty() {
        Some("Phone is required".to_string())
    } else if !(PHONE_MIN_LENGTH..=PHONE_MAX_LENGTH).contains(&phone) {
        Some(format!(
            "Phone number must be between {} and {} digits",
            PHONE_MIN_LENGTH, PHONE_MAX_LENGTH
        ))
    } else if !student.phone.chars().all(|c| c.is_ascii_digit()) {
        Some("Phone number can only contain digits".to_string())
    } else {
        None
    });

    errors.check("courseId", if student.course_id <= 0 {
        Some("Course ID must be a valid number".to_string())
    } else {
        None
    });

    errors
}
