//! Student and class reports. Reads only.

use super::summary::{grade_lines, summarize_student, GradeLine, StudentSummary};
use crate::error::AppError;
use crate::model::*;
use crate::store::{StudentFilter, Store};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Serialize)]
pub struct StudentReport {
    pub student: StudentSummary,
    pub parent: Option<String>,
    /// Newest exam first.
    pub grades: Vec<GradeLine>,
}

pub async fn student_report(store: &dyn Store, student_id: i64) -> Result<StudentReport, AppError> {
    let record = store
        .get_student(student_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("student {}", student_id)))?;
    let parent = match record.parent_id {
        Some(id) => store.get_account(id).await?.map(|p| p.full_name()),
        None => None,
    };
    let grades = store.list_grades(record.id, None).await?;
    Ok(StudentReport {
        student: summarize_student(store, &record).await?,
        parent,
        grades: grade_lines(store, &grades).await?,
    })
}

impl StudentReport {
    /// Fixed-layout plain text document.
    pub fn render_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for StudentReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Student Report: {}", self.student.name)?;
        writeln!(f, "{}", "=".repeat(72))?;
        let info = [
            ("Admission Number:", self.student.admission_number.clone()),
            ("Class:", self.student.class_label.clone().unwrap_or_else(|| "N/A".into())),
            ("Roll Number:", self.student.roll_number.to_string()),
            ("Parent:", self.parent.clone().unwrap_or_else(|| "N/A".into())),
        ];
        for (label, value) in info {
            writeln!(f, "{:<20}{}", label, value)?;
        }
        writeln!(f)?;
        writeln!(f, "Academic Performance")?;
        writeln!(f, "{}", "-".repeat(72))?;
        if self.grades.is_empty() {
            return writeln!(f, "No grades recorded.");
        }
        writeln!(
            f,
            "{:<18}{:<14}{:>9}{:>9}{:>12}{:>8}",
            "Subject", "Exam Type", "Marks", "Total", "Percentage", "Grade"
        )?;
        for g in &self.grades {
            writeln!(
                f,
                "{:<18}{:<14}{:>9.2}{:>9.2}{:>11.2}%{:>8}",
                truncate(&g.subject, 17),
                truncate(&g.exam_type, 13),
                g.marks_obtained,
                g.total_marks,
                g.percentage,
                g.grade.as_str()
            )?;
        }
        Ok(())
    }
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClassReportRow {
    pub roll_number: i32,
    pub name: String,
    pub admission_number: String,
    pub attendance_percentage: f64,
    pub average_grade: f64,
}

#[derive(Debug, Serialize)]
pub struct ClassReport {
    pub class_label: String,
    /// Ordered by roll number.
    pub rows: Vec<ClassReportRow>,
}

/// Present days over recorded days, as a percentage; 0 with no records.
pub fn attendance_percentage(records: &[AttendanceRecord]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    let present = records.iter().filter(|r| r.status == AttendanceStatus::Present).count();
    present as f64 / records.len() as f64 * 100.0
}

/// Mean of the grades' percentages; 0 with no grades.
pub fn average_percentage(grades: &[GradeRecord]) -> f64 {
    if grades.is_empty() {
        return 0.0;
    }
    grades.iter().map(GradeRecord::percentage).sum::<f64>() / grades.len() as f64
}

pub async fn class_report(store: &dyn Store, class_id: i64) -> Result<ClassReport, AppError> {
    let class = store
        .get_class(class_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("class {}", class_id)))?;
    let students = store
        .list_students(StudentFilter {
            class_id: Some(class.id),
            ..Default::default()
        })
        .await?;
    let mut rows = Vec::with_capacity(students.len());
    for s in &students {
        let name = store.get_account(s.account_id).await?.map(|a| a.full_name()).unwrap_or_default();
        let attendance = store.list_attendance(s.id, None).await?;
        let grades = store.list_grades(s.id, None).await?;
        rows.push(ClassReportRow {
            roll_number: s.roll_number,
            name,
            admission_number: s.admission_number.clone(),
            attendance_percentage: attendance_percentage(&attendance),
            average_grade: average_percentage(&grades),
        });
    }
    rows.sort_by_key(|r| r.roll_number);
    Ok(ClassReport {
        class_label: class.label(),
        rows,
    })
}

impl ClassReport {
    pub fn to_csv(&self) -> Result<String, AppError> {
        let mut w = csv::Writer::from_writer(Vec::new());
        let to_err = |e: csv::Error| AppError::Internal(format!("csv: {}", e));
        w.write_record(["Roll No", "Name", "Admission No", "Attendance %", "Average Grade"])
            .map_err(to_err)?;
        for r in &self.rows {
            w.write_record([
                r.roll_number.to_string(),
                r.name.clone(),
                r.admission_number.clone(),
                format!("{:.2}%", r.attendance_percentage),
                format!("{:.2}%", r.average_grade),
            ])
            .map_err(to_err)?;
        }
        let bytes = w
            .into_inner()
            .map_err(|e| AppError::Internal(format!("csv: {}", e)))?;
        String::from_utf8(bytes).map_err(|e| AppError::Internal(e.to_string()))
    }
}
