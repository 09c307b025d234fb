use crate::error::AppError;
use crate::extractors::CurrentUser;
use crate::service::report;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};

/// GET /reports/student/:student_id/
pub async fn student(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(student_id): Path<i64>,
) -> Result<Response, AppError> {
    let report = report::student_report(state.store.as_ref(), student_id).await?;
    tracing::info!(student_id, by = %user.account.username, "student report generated");
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("inline; filename=\"student_report_{}.txt\"", student_id),
            ),
        ],
        report.render_text(),
    )
        .into_response())
}

/// GET /reports/class/:class_id/
pub async fn class(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(class_id): Path<i64>,
) -> Result<Response, AppError> {
    let report = report::class_report(state.store.as_ref(), class_id).await?;
    let body = report.to_csv()?;
    tracing::info!(class_id, rows = report.rows.len(), by = %user.account.username, "class report generated");
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"class_report_{}.csv\"", class_id),
            ),
        ],
        body,
    )
        .into_response())
}
