//! Service layer: form validation, dashboard data and reports.

pub mod dashboard;
pub mod forms;
pub mod report;
pub mod summary;
mod validation;

pub use validation::{
    checkbox, parse_date, parse_datetime, FieldErrors, FieldValidator, INVALID_CHOICE, NON_FIELD_ERRORS, REQUIRED,
};
