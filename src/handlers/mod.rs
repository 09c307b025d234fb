//! HTTP handlers. Role checks run in route middleware before any of these; handlers only
//! check ownership where a role alone is not enough.

pub mod announcements;
pub mod assignments;
pub mod attendance;
pub mod auth;
pub mod dashboard;
pub mod grades;
pub mod manage;
pub mod messages;
pub mod parent;
pub mod reports;
pub mod students;
pub mod submissions;

use crate::error::AppError;
use crate::service::FieldErrors;

/// Split a write failure into errors to show on the form and errors to propagate.
pub(crate) fn form_errors(err: AppError) -> Result<FieldErrors, AppError> {
    match err {
        AppError::ConstraintViolation(v) => Ok(v.into_field_errors()),
        AppError::Validation(errors) => Ok(errors),
        other => Err(other),
    }
}
