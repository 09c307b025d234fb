//! Login and logout.

use crate::auth;
use crate::error::AppError;
use crate::extractors::{pending_flash, CurrentUser, FormData};
use crate::response::{Flash, Redirect, View};
use crate::state::AppState;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::json;

/// GET /: login page.
pub async fn login_page(headers: HeaderMap) -> View {
    View::new("login.html", json!({ "form": {} })).with_flash(pending_flash(&headers))
}

/// POST /: check credentials, start a session and go to the dashboard router.
pub async fn login(State(state): State<AppState>, form: FormData) -> Result<Response, AppError> {
    let username = form.get("username");
    match auth::authenticate(state.store.as_ref(), username, form.get("password")).await {
        Ok(account) => {
            let session = auth::start_session(state.store.as_ref(), account.id).await?;
            tracing::info!(user = %account.username, role = %account.role, "logged in");
            Ok(Redirect::to("/dashboard/").start_session(&session.token).into_response())
        }
        Err(AppError::AuthenticationFailure) => Ok(View::new("login.html", json!({ "form": form.echo() }))
            .with_message(Flash::InvalidCredentials)
            .with_status(StatusCode::UNAUTHORIZED)
            .into_response()),
        Err(e) => Err(e),
    }
}

/// GET /logout/
pub async fn logout(State(state): State<AppState>, user: CurrentUser) -> Result<Redirect, AppError> {
    state.store.delete_session(&user.session_token).await?;
    tracing::info!(user = %user.account.username, "logged out");
    Ok(Redirect::to("/").with_flash(Flash::LoggedOut).clear_session())
}
