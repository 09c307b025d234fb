//! Router assembly.

mod common;
mod manage;
mod school;

pub use common::common_routes;
pub use manage::manage_routes;
pub use school::school_routes;

use crate::state::AppState;
use axum::{extract::DefaultBodyLimit, Router};
use tower_http::limit::RequestBodyLimitLayer;

/// Full application: common, page and management routes, with the upload size cap.
pub fn app(state: AppState) -> Router {
    let limit = state.settings.max_upload_bytes;
    Router::new()
        .merge(common_routes(state.clone()))
        .merge(school_routes(state.clone()))
        .merge(manage_routes(state))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(limit))
}
