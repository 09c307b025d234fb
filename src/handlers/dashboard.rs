//! Dashboard router and the four role dashboards.

use crate::error::AppError;
use crate::extractors::CurrentUser;
use crate::response::{Redirect, View};
use crate::service::dashboard;
use crate::state::AppState;
use axum::extract::State;

/// GET /dashboard/: send the caller to their role's dashboard. A pending flash stays for the next page.
pub async fn router(user: CurrentUser) -> Redirect {
    Redirect::to(user.account.role.dashboard_path())
}

pub async fn admin(State(state): State<AppState>, user: CurrentUser) -> Result<View, AppError> {
    let data = dashboard::admin_dashboard(state.store.as_ref()).await?;
    Ok(View::new("admin_dashboard.html", data).with_flash(user.flash))
}

pub async fn teacher(State(state): State<AppState>, user: CurrentUser) -> Result<View, AppError> {
    let data = dashboard::teacher_dashboard(state.store.as_ref(), &user.account).await?;
    Ok(View::new("teacher_dashboard.html", data).with_flash(user.flash))
}

pub async fn student(State(state): State<AppState>, user: CurrentUser) -> Result<View, AppError> {
    let data = dashboard::student_dashboard(state.store.as_ref(), &user.account).await?;
    Ok(View::new("student_dashboard.html", data).with_flash(user.flash))
}

pub async fn parent(State(state): State<AppState>, user: CurrentUser) -> Result<View, AppError> {
    let data = dashboard::parent_dashboard(state.store.as_ref(), &user.account).await?;
    Ok(View::new("parent_dashboard.html", data).with_flash(user.flash))
}
