//! Argument parsing and command dispatch.

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use rollcall_core::sync::ImageSource;
use rollcall_core::{Course, Repository, Student};

use crate::output;

pub const USAGE: &str = "\
Usage: rollcall [--offline] <command>

Commands:
  courses                                     List courses
  course-students <course_id>                 List the students of a course
  students                                    List all students
  student <id>                                Show one student
  add-course <name> <description> <schedule> <professor> <image_path>
  update-course <id> <name> <description> <schedule> <professor> [image_path]
  delete-course <id>
  add-student <name> <email> <phone> <course_id>
  update-student <id> <name> <email> <phone> <course_id>
  delete-student <id>
  sync                                        Download everything for offline use

Options:
  --offline   Do not contact the server
  -h, --help  Show this message";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Courses,
    CourseStudents(i64),
    Students,
    Student(i64),
    AddCourse { course: Course, image: PathBuf },
    UpdateCourse { id: i64, course: Course, image: Option<PathBuf> },
    DeleteCourse(i64),
    AddStudent(Student),
    UpdateStudent(Student),
    DeleteStudent(i64),
    Sync,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub offline: bool,
    pub command: Command,
}

fn parse_id(value: &str, what: &str) -> Result<i64> {
    value
        .parse()
        .with_context(|| format!("{} must be a number, got '{}'", what, value))
}

fn expect_args<'a>(name: &str, args: &'a [String], min: usize, max: usize) -> Result<&'a [String]> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            min.to_string()
        } else {
            format!("{}-{}", min, max)
        };
        bail!("'{}' takes {} argument(s), got {}", name, expected, args.len());
    }
    Ok(args)
}

/// Parse the command line (without the program name). `Ok(None)` means
/// help was requested.
pub fn parse_args(args: &[String]) -> Result<Option<Invocation>> {
    let mut offline = false;
    let mut rest: Vec<String> = Vec::new();
    for arg in args {
        match arg.as_str() {
            "--offline" => offline = true,
            "-h" | "--help" => return Ok(None),
            _ => rest.push(arg.clone()),
        }
    }

    let Some((name, params)) = rest.split_first() else {
        return Ok(None);
    };

    let command = match name.as_str() {
        "courses" => {
            expect_args(name, params, 0, 0)?;
            Command::Courses
        }
        "course-students" => {
            let p = expect_args(name, params, 1, 1)?;
            Command::CourseStudents(parse_id(&p[0], "course_id")?)
        }
        "students" => {
            expect_args(name, params, 0, 0)?;
            Command::Students
        }
        "student" => {
            let p = expect_args(name, params, 1, 1)?;
            Command::Student(parse_id(&p[0], "id")?)
        }
        "add-course" => {
            let p = expect_args(name, params, 5, 5)?;
            Command::AddCourse {
                course: Course::draft(&p[0], &p[1], &p[2], &p[3]),
                image: PathBuf::from(&p[4]),
            }
        }
        "update-course" => {
            let p = expect_args(name, params, 5, 6)?;
            let id = parse_id(&p[0], "id")?;
            Command::UpdateCourse {
                id,
                course: Course {
                    id: Some(id),
                    ..Course::draft(&p[1], &p[2], &p[3], &p[4])
                },
                image: p.get(5).map(PathBuf::from),
            }
        }
        "delete-course" => {
            let p = expect_args(name, params, 1, 1)?;
            Command::DeleteCourse(parse_id(&p[0], "id")?)
        }
        "add-student" => {
            let p = expect_args(name, params, 4, 4)?;
            Command::AddStudent(Student::draft(&p[0], &p[1], &p[2], parse_id(&p[3], "course_id")?))
        }
        "update-student" => {
            let p = expect_args(name, params, 5, 5)?;
            Command::UpdateStudent(Student {
                id: Some(parse_id(&p[0], "id")?),
                ..Student::draft(&p[1], &p[2], &p[3], parse_id(&p[4], "course_id")?)
            })
        }
        "delete-student" => {
            let p = expect_args(name, params, 1, 1)?;
            Command::DeleteStudent(parse_id(&p[0], "id")?)
        }
        "sync" => {
            expect_args(name, params, 0, 0)?;
            Command::Sync
        }
        other => return Err(anyhow!("Unknown command '{}'", other)),
    };

    Ok(Some(Invocation { offline, command }))
}

pub async fn execute(repo: &Repository, command: Command) -> Result<()> {
    match command {
        Command::Courses => {
            let synced = repo.courses.fetch_courses().await;
            output::print_courses(&synced.items, repo);
            output::print_footer(synced.origin, &repo.cache_ages().courses_age());
        }
        Command::CourseStudents(course_id) => {
            let synced = repo.students.fetch_students(Some(course_id)).await;
            match repo.courses.course(course_id) {
                Some(course) => println!("{}\n", course.name),
                None => println!("Course {} (not cached)\n", course_id),
            }
            output::print_students(&synced.items, repo);
            output::print_footer(synced.origin, &repo.cache_ages().students_age());
        }
        Command::Students => {
            let synced = repo.students.fetch_students(None).await;
            output::print_students(&synced.items, repo);
            output::print_footer(synced.origin, &repo.cache_ages().students_age());
        }
        Command::Student(id) => {
            let synced = repo.students.fetch_student(id).await;
            let detail = synced
                .items
                .ok_or_else(|| anyhow!("Student {} not found", id))?;
            output::print_student_detail(&detail);
            output::print_footer(synced.origin, &repo.cache_ages().students_age());
        }
        Command::AddCourse { course, image } => {
            let created = repo
                .courses
                .create_course(&course, &ImageSource::new(image))
                .await?;
            println!("Course added: {} (id {})", created.name, output::id_label(created.id));
        }
        Command::UpdateCourse { id, mut course, image } => {
            // Keep the current image reference when no new file is given
            if let Some(existing) = repo.courses.course(id) {
                course.image_url = existing.image_url;
            }
            let image = image.map(ImageSource::new);
            match repo.courses.update_course(&course, image.as_ref()).await? {
                Some(updated) => println!("Course updated: {}", updated.name),
                None => bail!("Course has no id"),
            }
        }
        Command::DeleteCourse(id) => {
            let students = repo.store().count_students_for_course(id);
            repo.delete_course(Some(id)).await?;
            if students > 0 {
                println!("Course {} deleted along with {} student(s)", id, students);
            } else {
                println!("Course {} deleted", id);
            }
        }
        Command::AddStudent(student) => {
            let created = repo.students.create_student(&student).await?;
            println!("Student added: {} (id {})", created.name, output::id_label(created.id));
        }
        Command::UpdateStudent(student) => match repo.students.update_student(&student).await? {
            Some(updated) => println!("Student updated: {}", updated.name),
            None => bail!("Student has no id"),
        },
        Command::DeleteStudent(id) => {
            repo.students.delete_student(Some(id)).await?;
            println!("Student {} deleted", id);
        }
        Command::Sync => {
            let summary = repo.prefetch_all().await?;
            println!(
                "Synced {} course(s) and {} student(s)",
                summary.courses, summary.students
            );
            if !summary.failed_courses.is_empty() {
                println!(
                    "Could not refresh students for course(s): {}",
                    summary
                        .failed_courses
                        .iter()
                        .map(|id| id.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            }
        }
    }
    Ok(())
}
