//! Admin management API under /manage.

use super::school::guarded;
use crate::access::Operation::Manage;
use crate::handlers::manage::{
    create_account, create_class, create_class_subject, create_subject, delete, list_accounts, list_classes,
    list_class_subjects, list_subjects,
};
use crate::state::AppState;
use axum::{
    routing::{delete as delete_route, get},
    Router,
};

pub fn manage_routes(state: AppState) -> Router {
    let s = &state;
    Router::new()
        .route("/manage/classes/", guarded(Manage, s, get(list_classes).post(create_class)))
        .route("/manage/subjects/", guarded(Manage, s, get(list_subjects).post(create_subject)))
        .route(
            "/manage/class-subjects/",
            guarded(Manage, s, get(list_class_subjects).post(create_class_subject)),
        )
        .route("/manage/accounts/", guarded(Manage, s, get(list_accounts).post(create_account)))
        .route("/manage/:kind/:id/", guarded(Manage, s, delete_route(delete)))
        .with_state(state)
}
