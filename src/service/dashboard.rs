//! Data behind the four role dashboards.

use super::summary::{grade_lines, summarize_class_subjects, summarize_student, summarize_students};
use super::summary::{ClassSubjectSummary, GradeLine, StudentSummary};
use crate::error::AppError;
use crate::model::*;
use crate::store::*;
use serde::Serialize;
use std::collections::HashSet;

const RECENT_STUDENTS: usize = 5;
const RECENT_ANNOUNCEMENTS: usize = 5;
const RECENT_ATTENDANCE: usize = 10;
const RECENT_GRADES: usize = 5;
const PENDING_ASSIGNMENTS: usize = 5;

#[derive(Debug, Serialize)]
pub struct AdminDashboard {
    pub total_students: u64,
    pub total_teachers: u64,
    pub total_classes: u64,
    pub total_subjects: u64,
    pub recent_students: Vec<StudentSummary>,
    pub announcements: Vec<Announcement>,
}

pub async fn admin_dashboard(store: &dyn Store) -> Result<AdminDashboard, AppError> {
    let recent = store
        .list_students(StudentFilter {
            limit: Some(RECENT_STUDENTS),
            ..Default::default()
        })
        .await?;
    Ok(AdminDashboard {
        total_students: store.count_students().await?,
        total_teachers: store.count_accounts(Some(Role::Teacher)).await?,
        total_classes: store.count_classes().await?,
        total_subjects: store.count_subjects().await?,
        recent_students: summarize_students(store, &recent).await?,
        announcements: store
            .list_announcements(Audience::Everyone, true, Some(RECENT_ANNOUNCEMENTS))
            .await?,
    })
}

#[derive(Debug, Serialize)]
pub struct TeacherDashboard {
    pub assigned_subjects: Vec<ClassSubjectSummary>,
    /// Ungraded submissions to assignments this teacher created.
    pub pending_submissions: u64,
    pub unread_messages: u64,
    pub announcements: Vec<Announcement>,
}

pub async fn teacher_dashboard(store: &dyn Store, teacher: &Account) -> Result<TeacherDashboard, AppError> {
    let assigned = store
        .list_class_subjects(ClassSubjectFilter {
            teacher_id: Some(teacher.id),
            ..Default::default()
        })
        .await?;
    Ok(TeacherDashboard {
        assigned_subjects: summarize_class_subjects(store, &assigned).await?,
        pending_submissions: store.count_ungraded_submissions(teacher.id).await?,
        unread_messages: store.count_unread_messages(teacher.id).await?,
        announcements: store
            .list_announcements(
                Audience::Role {
                    role: Role::Teacher,
                    class_id: None,
                },
                true,
                Some(RECENT_ANNOUNCEMENTS),
            )
            .await?,
    })
}

#[derive(Debug, Serialize)]
pub struct StudentDashboard {
    pub student: StudentSummary,
    pub recent_attendance: Vec<AttendanceRecord>,
    pub recent_grades: Vec<GradeLine>,
    pub pending_assignments: Vec<Assignment>,
    pub announcements: Vec<Announcement>,
}

/// Assignments not yet submitted, earliest due first, at most `limit`.
pub fn pending_assignments(assignments: Vec<Assignment>, submitted: &HashSet<i64>, limit: usize) -> Vec<Assignment> {
    let mut pending: Vec<Assignment> = assignments
        .into_iter()
        .filter(|a| !submitted.contains(&a.id))
        .collect();
    pending.sort_by(|a, b| (a.due_date, a.id).cmp(&(b.due_date, b.id)));
    pending.truncate(limit);
    pending
}

/// Student record for a student account; absent record is a 404.
pub async fn student_record_for(store: &dyn Store, account: &Account) -> Result<StudentRecord, AppError> {
    store
        .get_student_by_account(account.id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("student record for {}", account.username)))
}

/// Assignments of the student's class; none when the student is not enrolled.
pub async fn class_assignments(store: &dyn Store, student: &StudentRecord) -> Result<Vec<Assignment>, AppError> {
    match student.class_id {
        Some(class_id) => {
            store
                .list_assignments(AssignmentFilter {
                    class_id: Some(class_id),
                    ..Default::default()
                })
                .await
        }
        None => Ok(Vec::new()),
    }
}

pub async fn student_dashboard(store: &dyn Store, account: &Account) -> Result<StudentDashboard, AppError> {
    let student = student_record_for(store, account).await?;
    let submitted: HashSet<i64> = store
        .list_submissions(SubmissionFilter {
            student_id: Some(student.id),
            ..Default::default()
        })
        .await?
        .into_iter()
        .map(|s| s.assignment_id)
        .collect();
    let assignments = class_assignments(store, &student).await?;
    let grades = store.list_grades(student.id, Some(RECENT_GRADES)).await?;
    Ok(StudentDashboard {
        recent_attendance: store.list_attendance(student.id, Some(RECENT_ATTENDANCE)).await?,
        recent_grades: grade_lines(store, &grades).await?,
        pending_assignments: pending_assignments(assignments, &submitted, PENDING_ASSIGNMENTS),
        announcements: store
            .list_announcements(
                Audience::Role {
                    role: Role::Student,
                    class_id: student.class_id,
                },
                true,
                Some(RECENT_ANNOUNCEMENTS),
            )
            .await?,
        student: summarize_student(store, &student).await?,
    })
}

#[derive(Debug, Serialize)]
pub struct ParentDashboard {
    pub children: Vec<StudentSummary>,
    pub announcements: Vec<Announcement>,
}

pub async fn parent_dashboard(store: &dyn Store, parent: &Account) -> Result<ParentDashboard, AppError> {
    let children = store
        .list_students(StudentFilter {
            parent_id: Some(parent.id),
            ..Default::default()
        })
        .await?;
    Ok(ParentDashboard {
        children: summarize_students(store, &children).await?,
        announcements: store
            .list_announcements(
                Audience::Role {
                    role: Role::Parent,
                    class_id: None,
                },
                true,
                Some(RECENT_ANNOUNCEMENTS),
            )
            .await?,
    })
}
