//! Student list and admin student enrollment (account + profile + student record in one form).

use super::form_errors;
use crate::auth::hash_password;
use crate::blob::PROFILE_PICTURES;
use crate::error::AppError;
use crate::extractors::{CurrentUser, FormData};
use crate::model::Role;
use crate::response::{Flash, Redirect, View};
use crate::service::forms::{AccountInput, ProfileInput, References, StudentInput};
use crate::service::summary::summarize_students;
use crate::service::FieldErrors;
use crate::state::AppState;
use crate::store::StudentFilter;
use axum::{
    extract::State,
    response::{IntoResponse, Response},
};
use serde_json::{json, Value};

/// GET /students/
pub async fn list(State(state): State<AppState>, user: CurrentUser) -> Result<View, AppError> {
    let store = state.store.as_ref();
    let students = store.list_students(StudentFilter::default()).await?;
    let students = summarize_students(store, &students).await?;
    Ok(View::new("student_list.html", json!({ "students": students })).with_flash(user.flash))
}

async fn student_form(state: &AppState, form: Value, errors: Option<FieldErrors>) -> Result<View, AppError> {
    let classes = state.store.list_classes(None).await?;
    let parents = state.store.list_accounts(Some(Role::Parent)).await?;
    let view = View::new(
        "student_form.html",
        json!({ "form": form, "classes": classes, "parents": parents }),
    );
    Ok(match errors {
        Some(e) => view.with_errors(e),
        None => view,
    })
}

/// GET /students/create/
pub async fn create_form(State(state): State<AppState>, user: CurrentUser) -> Result<View, AppError> {
    Ok(student_form(&state, json!({}), None).await?.with_flash(user.flash))
}

/// POST /students/create/: multipart; `profile_picture` is an optional file field.
pub async fn create(State(state): State<AppState>, user: CurrentUser, form: FormData) -> Result<Response, AppError> {
    let store = state.store.as_ref();
    let account_input: AccountInput = form.parse()?;
    let profile_input: ProfileInput = form.parse()?;
    let student_input: StudentInput = form.parse()?;
    let picture = form.file("profile_picture");

    let account = account_input.validate();
    let profile = profile_input.validate(picture);
    let student = student_input.validate();
    let (account, profile, student) = match (account, profile, student) {
        (Ok(a), Ok(p), Ok(s)) => (a, p, s),
        (a, p, s) => {
            let mut errors = FieldErrors::new();
            for e in [a.err(), p.err(), s.err()].into_iter().flatten() {
                errors.merge(e);
            }
            return Ok(student_form(&state, form.echo(), Some(errors)).await?.into_response());
        }
    };

    let mut refs = References::new(store);
    refs.resolve_class("class_enrolled", student.class_id).await?;
    refs.resolve_account("parent", student.parent_id, &[Role::Parent]).await?;
    if let Err(errors) = refs.finish() {
        return Ok(student_form(&state, form.echo(), Some(errors)).await?.into_response());
    }

    let picture_path = match picture {
        Some(p) => Some(state.blobs.put(PROFILE_PICTURES, &p.filename, &p.bytes).await?),
        None => None,
    };
    let password_hash = hash_password(&account.password)?;
    let new_account = account.into_new_account(password_hash, Role::Student, profile, picture_path.clone());

    let created = match store.create_account(new_account).await {
        Ok(a) => a,
        Err(e) => {
            discard_picture(&state, picture_path.as_deref()).await;
            let errors = form_errors(e)?;
            return Ok(student_form(&state, form.echo(), Some(errors)).await?.into_response());
        }
    };
    let record = match store.create_student(student.into_new(created.id)).await {
        Ok(r) => r,
        Err(e) => {
            // No partial enrollment: the account goes with the rejected record.
            store.delete_account(created.id).await?;
            discard_picture(&state, picture_path.as_deref()).await;
            let errors = form_errors(e)?;
            return Ok(student_form(&state, form.echo(), Some(errors)).await?.into_response());
        }
    };

    tracing::info!(
        by = %user.account.username,
        username = %created.username,
        admission_number = %record.admission_number,
        "student created"
    );
    Ok(Redirect::to("/students/").with_flash(Flash::StudentCreated).into_response())
}

async fn discard_picture(state: &AppState, path: Option<&str>) {
    if let Some(p) = path {
        if let Err(e) = state.blobs.delete(p).await {
            tracing::warn!(path = %p, error = %e, "could not remove upload");
        }
    }
}
