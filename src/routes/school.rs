//! Session-protected page routes. Each path carries its operation; the check wraps every
//! method on the path, so a caller without the role is turned away whatever the method.

use crate::access::Operation;
use crate::extractors::require_operation;
use crate::handlers::{
    announcements, assignments, attendance, auth, dashboard, grades, messages, parent, reports, students,
    submissions,
};
use crate::state::AppState;
use axum::{
    extract::Request,
    middleware::{self, Next},
    routing::{get, MethodRouter},
    Router,
};

/// Wrap all methods of `route`, including the 405 fallback, in the session and role check for `op`.
pub(crate) fn guarded(op: Operation, state: &AppState, route: MethodRouter<AppState>) -> MethodRouter<AppState> {
    let state = state.clone();
    route.layer(middleware::from_fn(move |req: Request, next: Next| {
        require_operation(op, state.clone(), req, next)
    }))
}

pub fn school_routes(state: AppState) -> Router {
    use Operation::*;
    let s = &state;
    Router::new()
        .route("/", get(auth::login_page).post(auth::login))
        .route("/logout/", guarded(Logout, s, get(auth::logout)))
        .route("/dashboard/", guarded(Dashboard, s, get(dashboard::router)))
        .route("/admin-dashboard/", guarded(AdminDashboard, s, get(dashboard::admin)))
        .route("/teacher-dashboard/", guarded(TeacherDashboard, s, get(dashboard::teacher)))
        .route("/student-dashboard/", guarded(StudentDashboard, s, get(dashboard::student)))
        .route("/parent-dashboard/", guarded(ParentDashboard, s, get(dashboard::parent)))
        .route("/students/", guarded(ListStudents, s, get(students::list)))
        .route(
            "/students/create/",
            guarded(CreateStudent, s, get(students::create_form).post(students::create)),
        )
        .route(
            "/attendance/mark/:class_id/",
            guarded(MarkAttendance, s, get(attendance::form).post(attendance::mark)),
        )
        .route(
            "/grades/upload/",
            guarded(UploadGrade, s, get(grades::form).post(grades::upload)),
        )
        .route("/assignments/", guarded(ListAssignments, s, get(assignments::list)))
        .route(
            "/assignments/create/",
            guarded(CreateAssignment, s, get(assignments::create_form).post(assignments::create)),
        )
        .route(
            "/assignments/:id/submit/",
            guarded(SubmitAssignment, s, get(submissions::submit_form).post(submissions::submit)),
        )
        .route(
            "/assignments/:id/submissions/",
            guarded(GradeSubmission, s, get(submissions::list)),
        )
        .route(
            "/submissions/:id/grade/",
            guarded(GradeSubmission, s, get(submissions::grade_form).post(submissions::grade)),
        )
        .route(
            "/announcements/create/",
            guarded(CreateAnnouncement, s, get(announcements::create_form).post(announcements::create)),
        )
        .route(
            "/messages/send/",
            guarded(SendMessage, s, get(messages::send_form).post(messages::send)),
        )
        .route("/messages/inbox/", guarded(Inbox, s, get(messages::inbox)))
        .route("/child/:student_id/", guarded(ViewChild, s, get(parent::child)))
        .route(
            "/reports/student/:student_id/",
            guarded(StudentReport, s, get(reports::student)),
        )
        .route("/reports/class/:class_id/", guarded(ClassReport, s, get(reports::class)))
        .with_state(state)
}
