//! Classes, subjects, teaching assignments and student enrolment.

use chrono::NaiveDate;
use serde::Serialize;

pub const DEFAULT_ACADEMIC_YEAR: &str = "2024-2025";

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct ClassGroup {
    pub id: i64,
    pub name: String,
    pub section: String,
    pub academic_year: String,
    pub class_teacher_id: Option<i64>,
}

impl ClassGroup {
    /// Display label, e.g. "Grade 5 - A".
    pub fn label(&self) -> String {
        format!("{} - {}", self.name, self.section)
    }
}

#[derive(Clone, Debug)]
pub struct NewClassGroup {
    pub name: String,
    pub section: String,
    pub academic_year: String,
    pub class_teacher_id: Option<i64>,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Subject {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub description: String,
}

#[derive(Clone, Debug)]
pub struct NewSubject {
    pub code: String,
    pub name: String,
    pub description: String,
}

/// A teacher teaching a subject to one class.
#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct ClassSubject {
    pub id: i64,
    pub class_id: i64,
    pub subject_id: i64,
    pub teacher_id: Option<i64>,
}

#[derive(Clone, Debug)]
pub struct NewClassSubject {
    pub class_id: i64,
    pub subject_id: i64,
    pub teacher_id: Option<i64>,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct StudentRecord {
    pub id: i64,
    pub account_id: i64,
    pub admission_number: String,
    pub class_id: Option<i64>,
    pub roll_number: i32,
    pub parent_id: Option<i64>,
    pub admission_date: NaiveDate,
}

#[derive(Clone, Debug)]
pub struct NewStudentRecord {
    pub account_id: i64,
    pub admission_number: String,
    pub class_id: Option<i64>,
    pub roll_number: i32,
    pub parent_id: Option<i64>,
    pub admission_date: NaiveDate,
}
