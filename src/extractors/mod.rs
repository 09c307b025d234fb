//! Request extractors: the signed-in account and form bodies.

pub mod form;
pub mod session;

pub use form::FormData;
pub use session::{cookie_value, pending_flash, require_operation, CurrentUser};
