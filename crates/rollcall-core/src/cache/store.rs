use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::{Course, Entity, Student};
use crate::utils::age_display;

use super::StoreError;

const COURSES_TABLE: &str = "courses";
const STUDENTS_TABLE: &str = "students";

/// On-disk envelope for a table: the rows plus when they were written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct Table<T> {
    rows: BTreeMap<i64, T>,
    cached_at: Option<DateTime<Utc>>,
}

impl<T: Entity> Table<T> {
    fn empty() -> Self {
        Self {
            rows: BTreeMap::new(),
            cached_at: None,
        }
    }

    fn from_cached(name: &str, cached: CachedData<Vec<T>>) -> Self {
        let mut rows = BTreeMap::new();
        for row in cached.data {
            match row.id() {
                Some(id) => {
                    rows.insert(id, row);
                }
                None => warn!(table = name, "Dropping cached row without id"),
            }
        }
        Self {
            rows,
            cached_at: Some(cached.cached_at),
        }
    }

    /// Rows ordered by name, ties broken by id.
    fn sorted(&self) -> Vec<T> {
        let mut rows: Vec<T> = self.rows.values().cloned().collect();
        rows.sort_by(|a, b| a.name().cmp(b.name()).then(a.id().cmp(&b.id())));
        rows
    }

    fn sorted_where(&self, keep: impl Fn(&T) -> bool) -> Vec<T> {
        let mut rows = self.sorted();
        rows.retain(|row| keep(row));
        rows
    }

    /// Insert or replace by primary key. Rejects the whole batch if any row
    /// has no id.
    fn upsert(&mut self, kind: &'static str, items: &[T]) -> Result<(), StoreError> {
        let keyed = items
            .iter()
            .map(|item| item.id().map(|id| (id, item.clone())))
            .collect::<Option<Vec<_>>>()
            .ok_or(StoreError::MissingId(kind))?;
        self.rows.extend(keyed);
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct Tables {
    courses: Table<Course>,
    students: Table<Student>,
}

impl Tables {
    fn remove_course(&mut self, course_id: i64) {
        self.courses.rows.remove(&course_id);
        self.students.rows.retain(|_, s| s.course_id != course_id);
    }

    fn check_parents(&self, students: &[Student]) -> Result<(), StoreError> {
        for student in students {
            if !self.courses.rows.contains_key(&student.course_id) {
                return Err(StoreError::OrphanStudent {
                    student_id: student.id.unwrap_or_default(),
                    course_id: student.course_id,
                });
            }
        }
        Ok(())
    }

    fn upsert_students(&mut self, students: &[Student]) -> Result<(), StoreError> {
        // Id check first so a draft is reported as such rather than as an orphan
        if students.iter().any(|s| s.id.is_none()) {
            return Err(StoreError::MissingId("student"));
        }
        self.check_parents(students)?;
        self.students.upsert("student", students)
    }
}

/// Which tables a write touched and therefore must be persisted.
#[derive(Debug, Clone, Copy)]
enum Touched {
    Courses,
    Students,
    Both,
}

impl Touched {
    fn courses(self) -> bool {
        matches!(self, Touched::Courses | Touched::Both)
    }

    fn students(self) -> bool {
        matches!(self, Touched::Students | Touched::Both)
    }
}

/// Key-indexed course and student tables, optionally persisted to disk.
///
/// Every write is applied to a copy of the tables and only committed once
/// it has been validated and persisted, so a failed write leaves the
/// in-memory tables as they were. Each table file is replaced by renaming a
/// fully written temporary file over it. A write touching both tables can
/// still leave the two files out of step if the second rename fails;
/// `open` drops students whose course is missing.
pub struct LocalStore {
    dir: Option<PathBuf>,
    tables: Mutex<Tables>,
}

impl LocalStore {
    /// Open (or create) a store persisted under `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;

        let courses = Self::load_table::<Course>(&dir, COURSES_TABLE);
        let mut students = Self::load_table::<Student>(&dir, STUDENTS_TABLE);

        let before = students.rows.len();
        students
            .rows
            .retain(|_, s| courses.rows.contains_key(&s.course_id));
        if students.rows.len() != before {
            warn!(
                dropped = before - students.rows.len(),
                "Dropped cached students whose course is not cached"
            );
        }

        debug!(
            ?dir,
            courses = courses.rows.len(),
            students = students.rows.len(),
            "Local store opened"
        );

        Ok(Self {
            dir: Some(dir),
            tables: Mutex::new(Tables { courses, students }),
        })
    }

    /// A store that lives only for the current process.
    pub fn in_memory() -> Self {
        Self {
            dir: None,
            tables: Mutex::new(Tables {
                courses: Table::empty(),
                students: Table::empty(),
            }),
        }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    fn table_path(dir: &Path, name: &str) -> PathBuf {
        dir.join(format!("{}.json", name))
    }

    fn load_table<T: Entity + DeserializeOwned>(dir: &Path, name: &str) -> Table<T> {
        let path = Self::table_path(dir, name);
        if !path.exists() {
            return Table::empty();
        }

        let parsed = std::fs::read_to_string(&path)
            .map_err(StoreError::from)
            .and_then(|contents| {
                serde_json::from_str::<CachedData<Vec<T>>>(&contents).map_err(StoreError::from)
            });

        match parsed {
            Ok(cached) => Table::from_cached(name, cached),
            Err(e) => {
                warn!(table = name, error = %e, "Failed to load cached table, starting empty");
                Table::empty()
            }
        }
    }

    /// Write a table to `<name>.json.tmp` next to its file. `commit_staged`
    /// moves it into place.
    fn stage_table<T: Entity>(dir: &Path, name: &str, table: &Table<T>) -> Result<PathBuf, StoreError> {
        let cached = CachedData {
            data: table.sorted(),
            cached_at: table.cached_at.unwrap_or_else(Utc::now),
        };
        let contents = serde_json::to_string_pretty(&cached)?;
        let staged = dir.join(format!("{}.json.tmp", name));
        std::fs::write(&staged, contents)?;
        Ok(staged)
    }

    fn commit_staged(dir: &Path, staged: &[(&str, PathBuf)]) -> Result<(), StoreError> {
        for (name, path) in staged {
            std::fs::rename(path, Self::table_path(dir, name))?;
        }
        Ok(())
    }

    fn discard_staged(staged: &[(&str, PathBuf)]) {
        for (_, path) in staged {
            let _ = std::fs::remove_file(path);
        }
    }

    /// Persist the touched tables. Every table is staged before any file is
    /// replaced, and each replacement is a rename.
    fn persist(dir: &Path, touched: Touched, tables: &Tables) -> Result<(), StoreError> {
        let mut staged = Vec::new();
        let outcome = (|| {
            if touched.courses() {
                staged.push((COURSES_TABLE, Self::stage_table(dir, COURSES_TABLE, &tables.courses)?));
            }
            if touched.students() {
                staged.push((STUDENTS_TABLE, Self::stage_table(dir, STUDENTS_TABLE, &tables.students)?));
            }
            Self::commit_staged(dir, &staged)
        })();

        if outcome.is_err() {
            Self::discard_staged(&staged);
        }
        outcome
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read<R>(&self, op: impl FnOnce(&Tables) -> R) -> R {
        op(&self.lock())
    }

    fn write<R>(
        &self,
        touched: Touched,
        op: impl FnOnce(&mut Tables) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let mut guard = self.lock();
        let mut next = guard.clone();
        let result = op(&mut next)?;

        let now = Utc::now();
        if touched.courses() {
            next.courses.cached_at = Some(now);
        }
        if touched.students() {
            next.students.cached_at = Some(now);
        }

        if let Some(ref dir) = self.dir {
            Self::persist(dir, touched, &next)?;
        }

        *guard = next;
        Ok(result)
    }

    // ===== Courses =====

    /// All cached courses ordered by name.
    pub fn courses(&self) -> Vec<Course> {
        self.read(|t| t.courses.sorted())
    }

    pub fn course(&self, id: i64) -> Option<Course> {
        self.read(|t| t.courses.rows.get(&id).cloned())
    }

    pub fn upsert_courses(&self, courses: &[Course]) -> Result<(), StoreError> {
        self.write(Touched::Courses, |t| t.courses.upsert("course", courses))
    }

    /// Make the course table match `courses`. Courses missing from the new
    /// set are removed along with their students; students of courses that
    /// survive are kept.
    pub fn replace_courses(&self, courses: &[Course]) -> Result<(), StoreError> {
        self.write(Touched::Both, |t| {
            let mut incoming = Table::empty();
            incoming.upsert("course", courses)?;

            let stale: Vec<i64> = t
                .courses
                .rows
                .keys()
                .filter(|id| !incoming.rows.contains_key(id))
                .copied()
                .collect();
            for id in stale {
                t.remove_course(id);
            }
            t.courses.rows = incoming.rows;
            Ok(())
        })
    }

    /// Delete a course and every student enrolled in it. Unknown ids are a no-op.
    pub fn delete_course(&self, id: i64) -> Result<(), StoreError> {
        self.write(Touched::Both, |t| {
            t.remove_course(id);
            Ok(())
        })
    }

    /// Remove every course, and with them every student.
    pub fn clear_courses(&self) -> Result<(), StoreError> {
        self.write(Touched::Both, |t| {
            t.courses.rows.clear();
            t.students.rows.clear();
            Ok(())
        })
    }

    pub fn count_students_for_course(&self, course_id: i64) -> usize {
        self.read(|t| {
            t.students
                .rows
                .values()
                .filter(|s| s.course_id == course_id)
                .count()
        })
    }

    pub fn course_has_students(&self, course_id: i64) -> bool {
        self.count_students_for_course(course_id) > 0
    }

    // ===== Students =====

    /// All cached students ordered by name.
    pub fn students(&self) -> Vec<Student> {
        self.read(|t| t.students.sorted())
    }

    pub fn students_for_course(&self, course_id: i64) -> Vec<Student> {
        self.read(|t| t.students.sorted_where(|s| s.course_id == course_id))
    }

    pub fn student(&self, id: i64) -> Option<Student> {
        self.read(|t| t.students.rows.get(&id).cloned())
    }

    /// Insert or replace students by id. Fails without changing anything if
    /// a student has no id or references a course that is not cached.
    pub fn upsert_students(&self, students: &[Student]) -> Result<(), StoreError> {
        self.write(Touched::Students, |t| t.upsert_students(students))
    }

    /// Replace the whole student table.
    pub fn replace_students(&self, students: &[Student]) -> Result<(), StoreError> {
        self.write(Touched::Students, |t| {
            t.students.rows.clear();
            t.upsert_students(students)
        })
    }

    /// Replace the students of one course, leaving other courses untouched.
    pub fn replace_students_for_course(
        &self,
        course_id: i64,
        students: &[Student],
    ) -> Result<(), StoreError> {
        self.write(Touched::Students, |t| {
            t.students.rows.retain(|_, s| s.course_id != course_id);
            t.upsert_students(students)
        })
    }

    pub fn delete_student(&self, id: i64) -> Result<(), StoreError> {
        self.write(Touched::Students, |t| {
            t.students.rows.remove(&id);
            Ok(())
        })
    }

    pub fn delete_students_for_course(&self, course_id: i64) -> Result<(), StoreError> {
        self.write(Touched::Students, |t| {
            t.students.rows.retain(|_, s| s.course_id != course_id);
            Ok(())
        })
    }

    pub fn clear_students(&self) -> Result<(), StoreError> {
        self.write(Touched::Students, |t| {
            t.students.rows.clear();
            Ok(())
        })
    }

    // ===== Cache Age Information =====

    pub fn courses_synced_at(&self) -> Option<DateTime<Utc>> {
        self.read(|t| t.courses.cached_at)
    }

    pub fn students_synced_at(&self) -> Option<DateTime<Utc>> {
        self.read(|t| t.students.cached_at)
    }

    pub fn cache_ages(&self) -> CacheAges {
        let age = |at: Option<DateTime<Utc>>| at.map(|at| age_display((Utc::now() - at).num_minutes()));
        CacheAges {
            courses: age(self.courses_synced_at()),
            students: age(self.students_synced_at()),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheAges {
    pub courses: Option<String>,
    pub students: Option<String>,
}

impl CacheAges {
    pub fn courses_age(&self) -> String {
        self.courses.clone().unwrap_or_else(|| "never".to_string())
    }

    pub fn students_age(&self) -> String {
        self.students.clone().unwrap_or_else(|| "never".to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================
