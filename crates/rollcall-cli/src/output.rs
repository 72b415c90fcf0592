//! Plain-text rendering of listings.

use rollcall_core::utils::{format_phone, truncate_string};
use rollcall_core::{Course, Origin, Repository, Student, StudentDetail};

const NAME_WIDTH: usize = 32;
const DESCRIPTION_WIDTH: usize = 40;
const EMAIL_WIDTH: usize = 28;

pub fn id_label(id: Option<i64>) -> String {
    id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string())
}

fn source_label(origin: Option<Origin>) -> &'static str {
    match origin {
        Some(Origin::Network) => "live from server",
        Some(Origin::Cache) => "server response cache",
        Some(Origin::Local) => "offline, local data",
        Some(Origin::Unknown) => "unknown source",
        None => "server unreachable, showing last saved data",
    }
}

pub fn print_footer(origin: Option<Origin>, age: &str) {
    println!();
    println!("Source: {} | Saved {}", source_label(origin), age);
}

pub fn print_courses(courses: &[Course], repo: &Repository) {
    if courses.is_empty() {
        println!("No courses");
        return;
    }

    println!(
        "{:>5}  {:<name$}  {:<desc$}  {:>8}",
        "ID",
        "NAME",
        "DESCRIPTION",
        "STUDENTS",
        name = NAME_WIDTH,
        desc = DESCRIPTION_WIDTH
    );
    for course in courses {
        let students = course
            .id
            .map(|id| repo.store().count_students_for_course(id))
            .unwrap_or(0);
        println!(
            "{:>5}  {:<name$}  {:<desc$}  {:>8}",
            id_label(course.id),
            truncate_string(&course.name, NAME_WIDTH),
            truncate_string(&course.description, DESCRIPTION_WIDTH),
            students,
            name = NAME_WIDTH,
            desc = DESCRIPTION_WIDTH
        );
    }
}

pub fn print_students(students: &[Student], repo: &Repository) {
    if students.is_empty() {
        println!("No students");
        return;
    }

    println!(
        "{:>5}  {:<name$}  {:<email$}  {:<15}  COURSE",
        "ID",
        "NAME",
        "EMAIL",
        "PHONE",
        name = NAME_WIDTH,
        email = EMAIL_WIDTH
    );
    for student in students {
        let course = repo
            .courses
            .course(student.course_id)
            .map(|c| c.name)
            .unwrap_or_else(|| student.course_id.to_string());
        println!(
            "{:>5}  {:<name$}  {:<email$}  {:<15}  {}",
            id_label(student.id),
            truncate_string(&student.name, NAME_WIDTH),
            truncate_string(&student.email, EMAIL_WIDTH),
            format_phone(&student.phone),
            course,
            name = NAME_WIDTH,
            email = EMAIL_WIDTH
        );
    }
}

pub fn print_student_detail(detail: &StudentDetail) {
    let student = &detail.student;
    println!("{}", student.name);
    println!("  ID:     {}", id_label(student.id));
    println!("  Email:  {}", student.email);
    println!("  Phone:  {}", format_phone(&student.phone));
    match &detail.course_name {
        Some(name) => println!("  Course: {} ({})", name, student.course_id),
        None => println!("  Course: {}", student.course_id),
    }
}
