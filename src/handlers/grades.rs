use super::form_errors;
use crate::error::AppError;
use crate::extractors::{CurrentUser, FormData};
use crate::response::{Flash, Redirect, View};
use crate::service::forms::{GradeInput, References};
use crate::service::summary::summarize_students;
use crate::service::FieldErrors;
use crate::state::AppState;
use crate::store::StudentFilter;
use axum::{
    extract::State,
    response::{IntoResponse, Response},
};
use serde_json::{json, Value};

async fn grade_form(state: &AppState, form: Value, errors: Option<FieldErrors>) -> Result<View, AppError> {
    let store = state.store.as_ref();
    let students = store.list_students(StudentFilter::default()).await?;
    let students = summarize_students(store, &students).await?;
    let subjects = store.list_subjects().await?;
    let view = View::new(
        "upload_grade.html",
        json!({ "form": form, "students": students, "subjects": subjects }),
    );
    Ok(match errors {
        Some(e) => view.with_errors(e),
        None => view,
    })
}

/// GET /grades/upload/
pub async fn form(State(state): State<AppState>, user: CurrentUser) -> Result<View, AppError> {
    Ok(grade_form(&state, json!({}), None).await?.with_flash(user.flash))
}

/// POST /grades/upload/
pub async fn upload(State(state): State<AppState>, user: CurrentUser, form: FormData) -> Result<Response, AppError> {
    let input: GradeInput = form.parse()?;
    let new = match input.validate(user.account.id) {
        Ok(g) => g,
        Err(errors) => return Ok(grade_form(&state, form.echo(), Some(errors)).await?.into_response()),
    };
    let mut refs = References::new(state.store.as_ref());
    refs.resolve_student("student", new.student_id).await?;
    refs.resolve_subject("subject", new.subject_id).await?;
    if let Err(errors) = refs.finish() {
        return Ok(grade_form(&state, form.echo(), Some(errors)).await?.into_response());
    }
    let grade = match state.store.create_grade(new).await {
        Ok(g) => g,
        Err(e) => {
            let errors = form_errors(e)?;
            return Ok(grade_form(&state, form.echo(), Some(errors)).await?.into_response());
        }
    };
    tracing::info!(
        grade_id = grade.id,
        student_id = grade.student_id,
        by = %user.account.username,
        "grade uploaded"
    );
    Ok(Redirect::to("/teacher-dashboard/")
        .with_flash(Flash::GradeUploaded)
        .into_response())
}
