//! Denormalized rows for views: ids resolved to names.

use crate::error::AppError;
use crate::model::*;
use crate::store::Store;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Clone, Debug, Serialize)]
pub struct StudentSummary {
    pub id: i64,
    pub account_id: i64,
    pub username: String,
    pub name: String,
    pub admission_number: String,
    pub class_id: Option<i64>,
    /// `None` when the student is not enrolled in a class.
    pub class_label: Option<String>,
    pub roll_number: i32,
    pub parent_id: Option<i64>,
    pub admission_date: NaiveDate,
}

pub async fn summarize_student(store: &dyn Store, student: &StudentRecord) -> Result<StudentSummary, AppError> {
    let account = store
        .get_account(student.account_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("account {}", student.account_id)))?;
    let class_label = match student.class_id {
        Some(id) => store.get_class(id).await?.map(|c| c.label()),
        None => None,
    };
    Ok(StudentSummary {
        id: student.id,
        account_id: student.account_id,
        username: account.username.clone(),
        name: account.full_name(),
        admission_number: student.admission_number.clone(),
        class_id: student.class_id,
        class_label,
        roll_number: student.roll_number,
        parent_id: student.parent_id,
        admission_date: student.admission_date,
    })
}

pub async fn summarize_students(store: &dyn Store, students: &[StudentRecord]) -> Result<Vec<StudentSummary>, AppError> {
    let mut out = Vec::with_capacity(students.len());
    for s in students {
        out.push(summarize_student(store, s).await?);
    }
    Ok(out)
}

/// One grade with its subject name and derived values.
#[derive(Clone, Debug, Serialize)]
pub struct GradeLine {
    pub id: i64,
    pub subject: String,
    pub exam_type: String,
    pub marks_obtained: f64,
    pub total_marks: f64,
    pub percentage: f64,
    pub grade: LetterGrade,
    pub exam_date: NaiveDate,
    pub remarks: String,
}

/// Keeps the order of `grades`.
pub async fn grade_lines(store: &dyn Store, grades: &[GradeRecord]) -> Result<Vec<GradeLine>, AppError> {
    let mut subjects: HashMap<i64, String> = HashMap::new();
    let mut out = Vec::with_capacity(grades.len());
    for g in grades {
        if !subjects.contains_key(&g.subject_id) {
            let name = store
                .get_subject(g.subject_id)
                .await?
                .map(|s| s.name)
                .unwrap_or_default();
            subjects.insert(g.subject_id, name);
        }
        out.push(GradeLine {
            id: g.id,
            subject: subjects.get(&g.subject_id).cloned().unwrap_or_default(),
            exam_type: g.exam_type.clone(),
            marks_obtained: g.marks_obtained,
            total_marks: g.total_marks,
            percentage: g.percentage(),
            grade: g.grade_letter(),
            exam_date: g.exam_date,
            remarks: g.remarks.clone(),
        });
    }
    Ok(out)
}

#[derive(Clone, Debug, Serialize)]
pub struct ClassSubjectSummary {
    pub id: i64,
    pub class_id: i64,
    pub class_label: String,
    pub subject_id: i64,
    pub subject: String,
    pub teacher_id: Option<i64>,
}

pub async fn summarize_class_subjects(
    store: &dyn Store,
    rows: &[ClassSubject],
) -> Result<Vec<ClassSubjectSummary>, AppError> {
    let mut out = Vec::with_capacity(rows.len());
    for cs in rows {
        let class_label = store.get_class(cs.class_id).await?.map(|c| c.label()).unwrap_or_default();
        let subject = store
            .get_subject(cs.subject_id)
            .await?
            .map(|s| format!("{} - {}", s.code, s.name))
            .unwrap_or_default();
        out.push(ClassSubjectSummary {
            id: cs.id,
            class_id: cs.class_id,
            class_label,
            subject_id: cs.subject_id,
            subject,
            teacher_id: cs.teacher_id,
        });
    }
    Ok(out)
}

/// Message with both parties' display names.
#[derive(Clone, Debug, Serialize)]
pub struct MessageLine {
    #[serde(flatten)]
    pub message: Message,
    pub sender: String,
    pub receiver: String,
}

pub async fn message_lines(store: &dyn Store, messages: Vec<Message>) -> Result<Vec<MessageLine>, AppError> {
    let mut names: HashMap<i64, String> = HashMap::new();
    let mut out = Vec::with_capacity(messages.len());
    for m in messages {
        for id in [m.sender_id, m.receiver_id] {
            if !names.contains_key(&id) {
                let name = store.get_account(id).await?.map(|a| a.username).unwrap_or_default();
                names.insert(id, name);
            }
        }
        out.push(MessageLine {
            sender: names.get(&m.sender_id).cloned().unwrap_or_default(),
            receiver: names.get(&m.receiver_id).cloned().unwrap_or_default(),
            message: m,
        });
    }
    Ok(out)
}
