use crate::error::AppError;
use crate::extractors::CurrentUser;
use crate::response::View;
use crate::service::summary::{grade_lines, summarize_student};
use crate::state::AppState;
use axum::extract::{Path, State};
use serde_json::json;

const CHILD_ATTENDANCE: usize = 20;

/// GET /child/:student_id/. A student who is not the caller's child is reported as missing.
pub async fn child(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(student_id): Path<i64>,
) -> Result<View, AppError> {
    let store = state.store.as_ref();
    let student = store
        .get_student(student_id)
        .await?
        .filter(|s| s.parent_id == Some(user.account.id))
        .ok_or_else(|| AppError::NotFound(format!("student {}", student_id)))?;
    let attendance = store.list_attendance(student.id, Some(CHILD_ATTENDANCE)).await?;
    let grades = store.list_grades(student.id, None).await?;
    Ok(View::new(
        "child_details.html",
        json!({
            "student": summarize_student(store, &student).await?,
            "attendance": attendance,
            "grades": grade_lines(store, &grades).await?,
        }),
    )
    .with_flash(user.flash))
}
