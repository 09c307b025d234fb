use super::form_errors;
use crate::blob::ASSIGNMENT_ATTACHMENTS;
use crate::error::AppError;
use crate::extractors::{CurrentUser, FormData};
use crate::model::Role;
use crate::response::{Flash, Redirect, View};
use crate::service::dashboard::{class_assignments, student_record_for};
use crate::service::forms::{AssignmentInput, References};
use crate::service::summary::summarize_class_subjects;
use crate::service::FieldErrors;
use crate::state::AppState;
use crate::store::{AssignmentFilter, ClassSubjectFilter};
use axum::{
    extract::State,
    response::{IntoResponse, Response},
};
use serde_json::{json, Value};

/// GET /assignments/: students see their class's assignments, teachers their own, everyone else all.
pub async fn list(State(state): State<AppState>, user: CurrentUser) -> Result<View, AppError> {
    let store = state.store.as_ref();
    let assignments = match user.account.role {
        Role::Student => {
            let student = student_record_for(store, &user.account).await?;
            class_assignments(store, &student).await?
        }
        Role::Teacher => {
            store
                .list_assignments(AssignmentFilter {
                    created_by: Some(user.account.id),
                    ..Default::default()
                })
                .await?
        }
        Role::Admin | Role::Parent => store.list_assignments(AssignmentFilter::default()).await?,
    };
    Ok(View::new("assignment_list.html", json!({ "assignments": assignments })).with_flash(user.flash))
}

async fn assignment_form(state: &AppState, form: Value, errors: Option<FieldErrors>) -> Result<View, AppError> {
    let store = state.store.as_ref();
    let rows = store.list_class_subjects(ClassSubjectFilter::default()).await?;
    let class_subjects = summarize_class_subjects(store, &rows).await?;
    let view = View::new(
        "assignment_form.html",
        json!({ "form": form, "class_subjects": class_subjects }),
    );
    Ok(match errors {
        Some(e) => view.with_errors(e),
        None => view,
    })
}

/// GET /assignments/create/
pub async fn create_form(State(state): State<AppState>, user: CurrentUser) -> Result<View, AppError> {
    Ok(assignment_form(&state, json!({}), None).await?.with_flash(user.flash))
}

/// POST /assignments/create/: multipart with an optional `attachment` file.
pub async fn create(State(state): State<AppState>, user: CurrentUser, form: FormData) -> Result<Response, AppError> {
    let input: AssignmentInput = form.parse()?;
    let mut new = match input.validate(user.account.id) {
        Ok(a) => a,
        Err(errors) => return Ok(assignment_form(&state, form.echo(), Some(errors)).await?.into_response()),
    };
    let mut refs = References::new(state.store.as_ref());
    refs.resolve_class_subject("class_subject", new.class_subject_id).await?;
    if let Err(errors) = refs.finish() {
        return Ok(assignment_form(&state, form.echo(), Some(errors)).await?.into_response());
    }

    if let Some(file) = form.file("attachment") {
        new.attachment = Some(state.blobs.put(ASSIGNMENT_ATTACHMENTS, &file.filename, &file.bytes).await?);
    }
    let attachment = new.attachment.clone();
    let assignment = match state.store.create_assignment(new).await {
        Ok(a) => a,
        Err(e) => {
            if let Some(path) = attachment {
                if let Err(io) = state.blobs.delete(&path).await {
                    tracing::warn!(path = %path, error = %io, "could not remove upload");
                }
            }
            let errors = form_errors(e)?;
            return Ok(assignment_form(&state, form.echo(), Some(errors)).await?.into_response());
        }
    };
    tracing::info!(
        assignment_id = assignment.id,
        class_subject_id = assignment.class_subject_id,
        by = %user.account.username,
        "assignment created"
    );
    Ok(Redirect::to("/teacher-dashboard/")
        .with_flash(Flash::AssignmentCreated)
        .into_response())
}
