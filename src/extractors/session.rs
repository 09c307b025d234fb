//! Session cookie → signed-in account, and the per-route role check.

use crate::access::Operation;
use crate::auth;
use crate::error::AppError;
use crate::model::Account;
use crate::response::{Flash, FLASH_COOKIE, SESSION_COOKIE};
use crate::state::AppState;
use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};

/// Value of cookie `name` from the `Cookie` headers; blank counts as absent.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.trim())
        .filter(|v| !v.is_empty())
}

/// Message left by the previous redirect, if any.
pub fn pending_flash(headers: &HeaderMap) -> Option<Flash> {
    cookie_value(headers, FLASH_COOKIE).and_then(Flash::from_code)
}

/// The authenticated caller, placed in request extensions by [`require_operation`].
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub account: Account,
    pub session_token: String,
    pub flash: Option<Flash>,
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(AppError::Unauthenticated)
    }
}

/// Route middleware: resolve the session and check `op` before the handler (and its body extractors) run.
pub async fn require_operation(op: Operation, state: AppState, mut req: Request, next: Next) -> Result<Response, AppError> {
    let token = cookie_value(req.headers(), SESSION_COOKIE)
        .map(str::to_string)
        .ok_or(AppError::Unauthenticated)?;
    let account = match auth::session_account(state.store.as_ref(), &token).await {
        Ok(Some(account)) => account,
        Ok(None) => return Err(AppError::Unauthenticated),
        Err(AppError::InvalidRole(role)) => {
            tracing::warn!(role = %role, "session account has an invalid role");
            state.store.delete_session(&token).await?;
            return Err(AppError::InvalidRole(role));
        }
        Err(e) => return Err(e),
    };
    if !op.allows(account.role) {
        tracing::warn!(user = %account.username, role = %account.role, operation = ?op, "access denied");
        return Err(AppError::AuthorizationFailure);
    }
    let flash = pending_flash(req.headers());
    req.extensions_mut().insert(CurrentUser {
        account,
        session_token: token,
        flash,
    });
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn finds_cookie_among_several() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; sessionid=abc123 ; flash=message_sent"));
        assert_eq!(cookie_value(&headers, "sessionid"), Some("abc123"));
        assert_eq!(pending_flash(&headers), Some(Flash::MessageSent));
        assert_eq!(cookie_value(&headers, "missing"), None);
    }

    #[test]
    fn blank_and_unknown_values_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("sessionid="));
        headers.append(header::COOKIE, HeaderValue::from_static("flash=bogus"));
        assert_eq!(cookie_value(&headers, "sessionid"), None);
        assert_eq!(pending_flash(&headers), None);
    }
}
