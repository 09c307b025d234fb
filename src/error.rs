//! Typed errors and HTTP mapping.

use crate::response::{error_body, Flash, Redirect};
use crate::service::FieldErrors;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid {name}: {message}")]
    Invalid { name: &'static str, message: String },
    #[error("{0} must be set together with {1}")]
    Incomplete(&'static str, &'static str),
}

/// Uniqueness or referential breach detected by the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConstraintViolation {
    /// Form field the breach belongs to, or [`crate::service::NON_FIELD_ERRORS`].
    pub field: String,
    pub message: String,
}

impl ConstraintViolation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        ConstraintViolation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn into_field_errors(self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        errors.add(self.field, self.message);
        errors
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("authentication required")]
    Unauthenticated,
    #[error("invalid username or password")]
    AuthenticationFailure,
    #[error("access denied")]
    AuthorizationFailure,
    #[error("invalid user role: {0}")]
    InvalidRole(String),
    #[error("validation failed")]
    Validation(FieldErrors),
    #[error("constraint violation on {}: {}", .0.field, .0.message)]
    ConstraintViolation(ConstraintViolation),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("storage: {0}")]
    Storage(#[from] std::io::Error),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl From<FieldErrors> for AppError {
    fn from(errors: FieldErrors) -> Self {
        AppError::Validation(errors)
    }
}

impl From<ConstraintViolation> for AppError {
    fn from(v: ConstraintViolation) -> Self {
        AppError::ConstraintViolation(v)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, details) = match &self {
            AppError::Unauthenticated => return Redirect::to("/").into_response(),
            AppError::AuthorizationFailure => {
                return Redirect::to("/dashboard/")
                    .with_flash(Flash::AccessDenied)
                    .into_response()
            }
            AppError::InvalidRole(_) => {
                return Redirect::to("/")
                    .with_flash(Flash::InvalidRole)
                    .clear_session()
                    .into_response()
            }
            AppError::AuthenticationFailure => (StatusCode::UNAUTHORIZED, "authentication_failure", None),
            AppError::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                serde_json::to_value(errors).ok(),
            ),
            AppError::ConstraintViolation(v) => (
                StatusCode::CONFLICT,
                "constraint_violation",
                serde_json::to_value(v.clone().into_field_errors()).ok(),
            ),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", None),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request", None),
            AppError::Db(e) => {
                if let sqlx::Error::RowNotFound = e {
                    (StatusCode::NOT_FOUND, "not_found", None)
                } else {
                    (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
                }
            }
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error", None),
            AppError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error", None),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None),
        };
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(error_body(code, message, details))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;

    #[test]
    fn authorization_failure_redirects_to_dashboard_router() {
        let resp = AppError::AuthorizationFailure.into_response();
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers().get(header::LOCATION).unwrap(), "/dashboard/");
        let cookie = resp.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with("flash=access_denied"));
    }

    #[test]
    fn invalid_role_logs_out_and_redirects_to_login() {
        let resp = AppError::InvalidRole("janitor".into()).into_response();
        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers().get(header::LOCATION).unwrap(), "/");
        let cookies: Vec<_> = resp
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert!(cookies.iter().any(|c| c.starts_with("sessionid=;")));
        assert!(cookies.iter().any(|c| c.starts_with("flash=invalid_role")));
    }

    #[test]
    fn constraint_violation_is_a_conflict() {
        let resp = AppError::from(ConstraintViolation::new("code", "taken")).into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn unauthenticated_goes_to_login() {
        let resp = AppError::Unauthenticated.into_response();
        assert_eq!(resp.headers().get(header::LOCATION).unwrap(), "/");
    }
}
