//! Assignments and student submissions.

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Assignment {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub class_subject_id: i64,
    pub due_date: DateTime<Utc>,
    pub total_marks: i32,
    pub attachment: Option<String>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct NewAssignment {
    pub title: String,
    pub description: String,
    pub class_subject_id: i64,
    pub due_date: DateTime<Utc>,
    pub total_marks: i32,
    pub attachment: Option<String>,
    pub created_by: i64,
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct Submission {
    pub id: i64,
    pub assignment_id: i64,
    pub student_id: i64,
    pub submission_file: String,
    pub submitted_at: DateTime<Utc>,
    pub marks_obtained: Option<i32>,
    pub feedback: String,
    pub graded_by: Option<i64>,
}

impl Submission {
    pub fn is_graded(&self) -> bool {
        self.marks_obtained.is_some()
    }
}

#[derive(Clone, Debug)]
pub struct NewSubmission {
    pub assignment_id: i64,
    pub student_id: i64,
    pub submission_file: String,
}

/// Marks and feedback recorded by the grading teacher.
#[derive(Clone, Debug)]
pub struct SubmissionGrade {
    pub marks_obtained: i32,
    pub feedback: String,
    pub graded_by: i64,
}
