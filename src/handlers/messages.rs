use super::form_errors;
use crate::error::AppError;
use crate::extractors::{CurrentUser, FormData};
use crate::response::{Flash, Redirect, View};
use crate::service::forms::{MessageInput, References};
use crate::service::summary::message_lines;
use crate::service::FieldErrors;
use crate::state::AppState;
use crate::store::MessageFilter;
use axum::{
    extract::State,
    response::{IntoResponse, Response},
};
use serde_json::{json, Value};

async fn message_form(state: &AppState, form: Value, errors: Option<FieldErrors>) -> Result<View, AppError> {
    let recipients: Vec<Value> = state
        .store
        .list_accounts(None)
        .await?
        .into_iter()
        .map(|a| json!({ "id": a.id, "username": a.username, "name": a.full_name(), "role": a.role }))
        .collect();
    let view = View::new("send_message.html", json!({ "form": form, "recipients": recipients }));
    Ok(match errors {
        Some(e) => view.with_errors(e),
        None => view,
    })
}

/// GET /messages/send/
pub async fn send_form(State(state): State<AppState>, user: CurrentUser) -> Result<View, AppError> {
    Ok(message_form(&state, json!({}), None).await?.with_flash(user.flash))
}

/// POST /messages/send/
pub async fn send(State(state): State<AppState>, user: CurrentUser, form: FormData) -> Result<Response, AppError> {
    let input: MessageInput = form.parse()?;
    let new = match input.validate(user.account.id) {
        Ok(m) => m,
        Err(errors) => return Ok(message_form(&state, form.echo(), Some(errors)).await?.into_response()),
    };
    let mut refs = References::new(state.store.as_ref());
    refs.resolve_account("receiver", Some(new.receiver_id), &[]).await?;
    if let Err(errors) = refs.finish() {
        return Ok(message_form(&state, form.echo(), Some(errors)).await?.into_response());
    }
    let message = match state.store.create_message(new).await {
        Ok(m) => m,
        Err(e) => {
            let errors = form_errors(e)?;
            return Ok(message_form(&state, form.echo(), Some(errors)).await?.into_response());
        }
    };
    tracing::info!(
        message_id = message.id,
        receiver_id = message.receiver_id,
        by = %user.account.username,
        "message sent"
    );
    Ok(Redirect::to("/dashboard/").with_flash(Flash::MessageSent).into_response())
}

/// GET /messages/inbox/: received and sent, newest first. Reading does not mark messages read.
pub async fn inbox(State(state): State<AppState>, user: CurrentUser) -> Result<View, AppError> {
    let store = state.store.as_ref();
    let received = store
        .list_messages(MessageFilter {
            receiver_id: Some(user.account.id),
            ..Default::default()
        })
        .await?;
    let sent = store
        .list_messages(MessageFilter {
            sender_id: Some(user.account.id),
            ..Default::default()
        })
        .await?;
    Ok(View::new(
        "inbox.html",
        json!({
            "received_messages": message_lines(store, received).await?,
            "sent_messages": message_lines(store, sent).await?,
        }),
    )
    .with_flash(user.flash))
}
