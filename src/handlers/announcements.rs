use super::form_errors;
use crate::error::AppError;
use crate::extractors::{CurrentUser, FormData};
use crate::model::Role;
use crate::response::{Flash, Redirect, View};
use crate::service::forms::{AnnouncementInput, References};
use crate::service::FieldErrors;
use crate::state::AppState;
use axum::{
    extract::State,
    response::{IntoResponse, Response},
};
use serde_json::{json, Value};

async fn announcement_form(state: &AppState, form: Value, errors: Option<FieldErrors>) -> Result<View, AppError> {
    let classes = state.store.list_classes(None).await?;
    let roles: Vec<Value> = Role::ALL
        .iter()
        .map(|r| json!({ "value": r.as_str(), "label": r.label() }))
        .collect();
    let view = View::new(
        "announcement_form.html",
        json!({ "form": form, "classes": classes, "roles": roles }),
    );
    Ok(match errors {
        Some(e) => view.with_errors(e),
        None => view,
    })
}

/// GET /announcements/create/
pub async fn create_form(State(state): State<AppState>, user: CurrentUser) -> Result<View, AppError> {
    Ok(announcement_form(&state, json!({ "is_active": "on" }), None)
        .await?
        .with_flash(user.flash))
}

/// POST /announcements/create/
pub async fn create(State(state): State<AppState>, user: CurrentUser, form: FormData) -> Result<Response, AppError> {
    let input: AnnouncementInput = form.parse()?;
    let new = match input.validate(user.account.id) {
        Ok(a) => a,
        Err(errors) => return Ok(announcement_form(&state, form.echo(), Some(errors)).await?.into_response()),
    };
    let mut refs = References::new(state.store.as_ref());
    refs.resolve_class("target_class", new.target_class_id).await?;
    if let Err(errors) = refs.finish() {
        return Ok(announcement_form(&state, form.echo(), Some(errors)).await?.into_response());
    }
    let announcement = match state.store.create_announcement(new).await {
        Ok(a) => a,
        Err(e) => {
            let errors = form_errors(e)?;
            return Ok(announcement_form(&state, form.echo(), Some(errors)).await?.into_response());
        }
    };
    tracing::info!(
        announcement_id = announcement.id,
        target_role = ?announcement.target_role,
        by = %user.account.username,
        "announcement created"
    );
    Ok(Redirect::to("/dashboard/")
        .with_flash(Flash::AnnouncementCreated)
        .into_response())
}
