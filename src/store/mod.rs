//! Data access: the `Store` repository interface and its PostgreSQL and in-memory implementations.
//!
//! Every write that breaks a unique key or a foreign key fails with
//! [`AppError::ConstraintViolation`]; both implementations name the same field for the same breach.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::error::{AppError, ConstraintViolation};
use crate::model::*;
use crate::service::NON_FIELD_ERRORS;
use async_trait::async_trait;
use chrono::NaiveDate;

#[derive(Clone, Debug, Default)]
pub struct StudentFilter {
    pub class_id: Option<i64>,
    pub parent_id: Option<i64>,
    pub limit: Option<usize>,
}

#[derive(Clone, Debug, Default)]
pub struct ClassSubjectFilter {
    pub class_id: Option<i64>,
    pub teacher_id: Option<i64>,
}

#[derive(Clone, Debug, Default)]
pub struct AssignmentFilter {
    /// Assignments whose class-subject belongs to this class.
    pub class_id: Option<i64>,
    pub created_by: Option<i64>,
}

#[derive(Clone, Debug, Default)]
pub struct SubmissionFilter {
    pub assignment_id: Option<i64>,
    pub student_id: Option<i64>,
}

#[derive(Clone, Debug, Default)]
pub struct MessageFilter {
    pub sender_id: Option<i64>,
    pub receiver_id: Option<i64>,
}

/// Result of one row in a multi-student attendance write.
#[derive(Clone, Debug, serde::Serialize)]
pub struct AttendanceOutcome {
    pub student_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<AttendanceRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AttendanceOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Repository over the school schema. Orderings: students by admission date desc, attendance by
/// date desc, grades by exam date desc, assignments/announcements/messages newest first.
#[async_trait]
pub trait Store: Send + Sync {
    async fn ping(&self) -> Result<(), AppError>;

    async fn create_account(&self, new: NewAccount) -> Result<Account, AppError>;
    async fn get_account(&self, id: i64) -> Result<Option<Account>, AppError>;
    async fn get_account_by_username(&self, username: &str) -> Result<Option<Account>, AppError>;
    /// Ordered by username.
    async fn list_accounts(&self, role: Option<Role>) -> Result<Vec<Account>, AppError>;
    async fn count_accounts(&self, role: Option<Role>) -> Result<u64, AppError>;
    async fn update_account(&self, account: &Account) -> Result<Option<Account>, AppError>;
    /// Cascades to the student record, sessions, messages and everything the account created.
    async fn delete_account(&self, id: i64) -> Result<bool, AppError>;

    async fn create_session(&self, session: Session) -> Result<Session, AppError>;
    async fn get_session(&self, token: &str) -> Result<Option<Session>, AppError>;
    async fn delete_session(&self, token: &str) -> Result<bool, AppError>;

    async fn create_class(&self, new: NewClassGroup) -> Result<ClassGroup, AppError>;
    async fn get_class(&self, id: i64) -> Result<Option<ClassGroup>, AppError>;
    /// Ordered by name, section.
    async fn list_classes(&self, academic_year: Option<&str>) -> Result<Vec<ClassGroup>, AppError>;
    async fn count_classes(&self) -> Result<u64, AppError>;
    async fn update_class(&self, class: &ClassGroup) -> Result<Option<ClassGroup>, AppError>;
    async fn delete_class(&self, id: i64) -> Result<bool, AppError>;

    async fn create_subject(&self, new: NewSubject) -> Result<Subject, AppError>;
    async fn get_subject(&self, id: i64) -> Result<Option<Subject>, AppError>;
    /// Ordered by code.
    async fn list_subjects(&self) -> Result<Vec<Subject>, AppError>;
    async fn count_subjects(&self) -> Result<u64, AppError>;
    async fn update_subject(&self, subject: &Subject) -> Result<Option<Subject>, AppError>;
    async fn delete_subject(&self, id: i64) -> Result<bool, AppError>;

    async fn create_class_subject(&self, new: NewClassSubject) -> Result<ClassSubject, AppError>;
    async fn get_class_subject(&self, id: i64) -> Result<Option<ClassSubject>, AppError>;
    async fn list_class_subjects(&self, filter: ClassSubjectFilter) -> Result<Vec<ClassSubject>, AppError>;
    async fn delete_class_subject(&self, id: i64) -> Result<bool, AppError>;

    async fn create_student(&self, new: NewStudentRecord) -> Result<StudentRecord, AppError>;
    async fn get_student(&self, id: i64) -> Result<Option<StudentRecord>, AppError>;
    async fn get_student_by_account(&self, account_id: i64) -> Result<Option<StudentRecord>, AppError>;
    async fn list_students(&self, filter: StudentFilter) -> Result<Vec<StudentRecord>, AppError>;
    async fn count_students(&self) -> Result<u64, AppError>;
    async fn update_student(&self, student: &StudentRecord) -> Result<Option<StudentRecord>, AppError>;
    async fn delete_student(&self, id: i64) -> Result<bool, AppError>;

    /// Insert or update keyed by (student, date); an update sets status and marker only.
    async fn upsert_attendance(&self, new: NewAttendance) -> Result<AttendanceRecord, AppError>;
    async fn list_attendance(&self, student_id: i64, limit: Option<usize>) -> Result<Vec<AttendanceRecord>, AppError>;
    async fn delete_attendance(&self, id: i64) -> Result<bool, AppError>;

    async fn create_grade(&self, new: NewGrade) -> Result<GradeRecord, AppError>;
    async fn list_grades(&self, student_id: i64, limit: Option<usize>) -> Result<Vec<GradeRecord>, AppError>;
    async fn delete_grade(&self, id: i64) -> Result<bool, AppError>;

    async fn create_assignment(&self, new: NewAssignment) -> Result<Assignment, AppError>;
    async fn get_assignment(&self, id: i64) -> Result<Option<Assignment>, AppError>;
    async fn list_assignments(&self, filter: AssignmentFilter) -> Result<Vec<Assignment>, AppError>;
    async fn delete_assignment(&self, id: i64) -> Result<bool, AppError>;

    /// Fails with a constraint violation when the (assignment, student) pair already exists.
    async fn create_submission(&self, new: NewSubmission) -> Result<Submission, AppError>;
    async fn get_submission(&self, id: i64) -> Result<Option<Submission>, AppError>;
    /// Ordered by submission time, newest first.
    async fn list_submissions(&self, filter: SubmissionFilter) -> Result<Vec<Submission>, AppError>;
    /// Ungraded submissions to assignments created by `creator_id`.
    async fn count_ungraded_submissions(&self, creator_id: i64) -> Result<u64, AppError>;
    async fn grade_submission(&self, id: i64, grade: SubmissionGrade) -> Result<Option<Submission>, AppError>;
    async fn delete_submission(&self, id: i64) -> Result<bool, AppError>;

    async fn create_announcement(&self, new: NewAnnouncement) -> Result<Announcement, AppError>;
    async fn list_announcements(
        &self,
        audience: Audience,
        active_only: bool,
        limit: Option<usize>,
    ) -> Result<Vec<Announcement>, AppError>;
    async fn delete_announcement(&self, id: i64) -> Result<bool, AppError>;

    async fn create_message(&self, new: NewMessage) -> Result<Message, AppError>;
    async fn list_messages(&self, filter: MessageFilter) -> Result<Vec<Message>, AppError>;
    async fn count_unread_messages(&self, receiver_id: i64) -> Result<u64, AppError>;
    async fn delete_message(&self, id: i64) -> Result<bool, AppError>;

    /// Upsert one record per entry; a failing row does not stop the others.
    async fn mark_attendance(
        &self,
        date: NaiveDate,
        entries: Vec<(i64, AttendanceStatus)>,
        marked_by: Option<i64>,
    ) -> Result<Vec<AttendanceOutcome>, AppError> {
        let mut out = Vec::with_capacity(entries.len());
        for (student_id, status) in entries {
            let new = NewAttendance {
                student_id,
                date,
                status,
                remarks: String::new(),
                marked_by,
            };
            match self.upsert_attendance(new).await {
                Ok(record) => out.push(AttendanceOutcome {
                    student_id,
                    record: Some(record),
                    error: None,
                }),
                Err(AppError::ConstraintViolation(v)) => {
                    tracing::warn!(student_id, error = %v.message, "attendance row rejected");
                    out.push(AttendanceOutcome {
                        student_id,
                        record: None,
                        error: Some(v.message),
                    })
                }
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }
}

/// Named unique constraints → (field, message). Shared by both implementations.
const UNIQUE_CONSTRAINTS: &[(&str, &str, &str)] = &[
    ("accounts_username_key", "username", "A user with that username already exists."),
    (
        "class_groups_name_section_year_key",
        NON_FIELD_ERRORS,
        "Class with this Name, Section and Academic year already exists.",
    ),
    ("subjects_code_key", "code", "Subject with this Code already exists."),
    (
        "class_subjects_class_subject_key",
        NON_FIELD_ERRORS,
        "Class subject with this Class and Subject already exists.",
    ),
    ("students_account_id_key", "account", "Student with this User already exists."),
    (
        "students_admission_number_key",
        "admission_number",
        "Student with this Admission number already exists.",
    ),
    (
        "students_class_roll_key",
        "roll_number",
        "Student with this Class enrolled and Roll number already exists.",
    ),
    (
        "attendance_student_date_key",
        NON_FIELD_ERRORS,
        "Attendance with this Student and Date already exists.",
    ),
    (
        "submissions_assignment_student_key",
        NON_FIELD_ERRORS,
        "Submission with this Assignment and Student already exists.",
    ),
    ("sessions_pkey", "token", "Session already exists."),
];

pub(crate) fn unique_violation(constraint: &str) -> ConstraintViolation {
    UNIQUE_CONSTRAINTS
        .iter()
        .find(|(name, _, _)| *name == constraint)
        .map(|(_, field, message)| ConstraintViolation::new(*field, *message))
        .unwrap_or_else(|| ConstraintViolation::new(NON_FIELD_ERRORS, format!("duplicate value violates {}", constraint)))
}

/// Foreign key on `column` (e.g. `student_id`) pointing at a missing row. Field is the column minus `_id`.
pub(crate) fn foreign_key_violation(column: &str) -> ConstraintViolation {
    let field = column.strip_suffix("_id").unwrap_or(column);
    ConstraintViolation::new(field, format!("Referenced {} does not exist.", field.replace('_', " ")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_unique_constraints_name_their_field() {
        let v = unique_violation("students_admission_number_key");
        assert_eq!(v.field, "admission_number");
        let v = unique_violation("submissions_assignment_student_key");
        assert_eq!(v.field, NON_FIELD_ERRORS);
        let v = unique_violation("something_else");
        assert!(v.message.contains("something_else"));
    }

    #[test]
    fn foreign_key_field_drops_id_suffix() {
        let v = foreign_key_violation("class_subject_id");
        assert_eq!(v.field, "class_subject");
        assert_eq!(v.message, "Referenced class subject does not exist.");
    }
}
