//! Class attendance marking.

use crate::error::AppError;
use crate::extractors::{CurrentUser, FormData};
use crate::model::{AttendanceStatus, ClassGroup};
use crate::response::{Flash, Redirect, View};
use crate::service::forms::AttendanceInput;
use crate::service::summary::{summarize_students, StudentSummary};
use crate::service::FieldErrors;
use crate::state::AppState;
use crate::store::{AttendanceOutcome, StudentFilter};
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::HashSet;

const STATUS_PREFIX: &str = "status_";

async fn roster(state: &AppState, class_id: i64) -> Result<(ClassGroup, Vec<StudentSummary>), AppError> {
    let class = state
        .store
        .get_class(class_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("class {}", class_id)))?;
    let students = state
        .store
        .list_students(StudentFilter {
            class_id: Some(class_id),
            ..Default::default()
        })
        .await?;
    let mut students = summarize_students(state.store.as_ref(), &students).await?;
    students.sort_by_key(|s| s.roll_number);
    Ok((class, students))
}

fn attendance_view(
    class: &ClassGroup,
    students: &[StudentSummary],
    form: Value,
    outcomes: &[AttendanceOutcome],
) -> View {
    View::new(
        "mark_attendance.html",
        json!({
            "class": class,
            "class_label": class.label(),
            "students": students,
            "statuses": AttendanceStatus::ALL,
            "form": form,
            "outcomes": outcomes,
        }),
    )
}

/// GET /attendance/mark/:class_id/
pub async fn form(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(class_id): Path<i64>,
) -> Result<View, AppError> {
    let (class, students) = roster(&state, class_id).await?;
    let today = Utc::now().date_naive();
    Ok(attendance_view(&class, &students, json!({ "date": today.to_string() }), &[]).with_flash(user.flash))
}

/// POST /attendance/mark/:class_id/: `date` plus one `status_<student id>` per student to record.
/// Blank statuses and ids outside the class are skipped.
pub async fn mark(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(class_id): Path<i64>,
    form: FormData,
) -> Result<Response, AppError> {
    let (class, students) = roster(&state, class_id).await?;
    let input: AttendanceInput = form.parse()?;
    let date = match input.validate() {
        Ok(d) => d,
        Err(errors) => {
            return Ok(attendance_view(&class, &students, form.echo(), &[])
                .with_errors(errors)
                .into_response())
        }
    };

    let enrolled: HashSet<i64> = students.iter().map(|s| s.id).collect();
    let mut entries = Vec::new();
    let mut rejected = Vec::new();
    for (key, value) in form.with_prefix(STATUS_PREFIX) {
        let Ok(student_id) = key.parse::<i64>() else { continue };
        if !enrolled.contains(&student_id) || value.is_empty() {
            continue;
        }
        match value.parse::<AttendanceStatus>() {
            Ok(status) => entries.push((student_id, status)),
            Err(e) => rejected.push(AttendanceOutcome {
                student_id,
                record: None,
                error: Some(e.to_string()),
            }),
        }
    }

    let mut outcomes = state.store.mark_attendance(date, entries, Some(user.account.id)).await?;
    let written = outcomes.len() - outcomes.iter().filter(|o| !o.is_ok()).count();
    outcomes.extend(rejected);
    tracing::info!(class_id, %date, written, by = %user.account.username, "attendance marked");

    if outcomes.iter().any(|o| !o.is_ok()) {
        let mut errors = FieldErrors::new();
        for o in outcomes.iter().filter(|o| !o.is_ok()) {
            errors.add(
                format!("{}{}", STATUS_PREFIX, o.student_id),
                o.error.clone().unwrap_or_default(),
            );
        }
        return Ok(attendance_view(&class, &students, form.echo(), &outcomes)
            .with_errors(errors)
            .into_response());
    }
    Ok(Redirect::to(user.account.role.dashboard_path())
        .with_flash(Flash::AttendanceMarked)
        .into_response())
}
