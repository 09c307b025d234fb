//! Response shapes: prepared views for the external renderer, redirects with flash messages,
//! and the JSON envelope used by the management API.

use crate::service::FieldErrors;
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

pub const SESSION_COOKIE: &str = "sessionid";
pub const FLASH_COOKIE: &str = "flash";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    Success,
    Error,
}

/// One-shot user-visible message carried across a redirect in the `flash` cookie.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flash {
    AccessDenied,
    InvalidRole,
    InvalidCredentials,
    LoggedOut,
    StudentCreated,
    AttendanceMarked,
    GradeUploaded,
    AssignmentCreated,
    AssignmentSubmitted,
    SubmissionGraded,
    AnnouncementCreated,
    MessageSent,
}

impl Flash {
    const ALL: [Flash; 12] = [
        Flash::AccessDenied,
        Flash::InvalidRole,
        Flash::InvalidCredentials,
        Flash::LoggedOut,
        Flash::StudentCreated,
        Flash::AttendanceMarked,
        Flash::GradeUploaded,
        Flash::AssignmentCreated,
        Flash::AssignmentSubmitted,
        Flash::SubmissionGraded,
        Flash::AnnouncementCreated,
        Flash::MessageSent,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Flash::AccessDenied => "access_denied",
            Flash::InvalidRole => "invalid_role",
            Flash::InvalidCredentials => "invalid_credentials",
            Flash::LoggedOut => "logged_out",
            Flash::StudentCreated => "student_created",
            Flash::AttendanceMarked => "attendance_marked",
            Flash::GradeUploaded => "grade_uploaded",
            Flash::AssignmentCreated => "assignment_created",
            Flash::AssignmentSubmitted => "assignment_submitted",
            Flash::SubmissionGraded => "submission_graded",
            Flash::AnnouncementCreated => "announcement_created",
            Flash::MessageSent => "message_sent",
        }
    }

    pub fn from_code(code: &str) -> Option<Flash> {
        Flash::ALL.into_iter().find(|f| f.code() == code)
    }

    pub fn text(self) -> &'static str {
        match self {
            Flash::AccessDenied => "Access denied",
            Flash::InvalidRole => "Invalid user role",
            Flash::InvalidCredentials => "Invalid username or password",
            Flash::LoggedOut => "You have been logged out successfully",
            Flash::StudentCreated => "Student created successfully",
            Flash::AttendanceMarked => "Attendance marked successfully",
            Flash::GradeUploaded => "Grade uploaded successfully",
            Flash::AssignmentCreated => "Assignment created successfully",
            Flash::AssignmentSubmitted => "Assignment submitted successfully",
            Flash::SubmissionGraded => "Submission graded successfully",
            Flash::AnnouncementCreated => "Announcement created successfully",
            Flash::MessageSent => "Message sent successfully",
        }
    }

    pub fn level(self) -> FlashLevel {
        match self {
            Flash::AccessDenied | Flash::InvalidRole | Flash::InvalidCredentials => FlashLevel::Error,
            _ => FlashLevel::Success,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct FlashMessage {
    pub level: FlashLevel,
    pub text: &'static str,
}

impl From<Flash> for FlashMessage {
    fn from(f: Flash) -> Self {
        FlashMessage {
            level: f.level(),
            text: f.text(),
        }
    }
}

pub fn session_cookie(token: &str) -> String {
    format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, token)
}

fn expired_cookie(name: &str) -> String {
    format!("{}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax", name)
}

fn append_cookie(resp: &mut Response, cookie: &str) {
    if let Ok(v) = HeaderValue::from_str(cookie) {
        resp.headers_mut().append(header::SET_COOKIE, v);
    }
}

/// Template name plus prepared context, serialized for the external renderer.
#[derive(Debug)]
pub struct View {
    template: &'static str,
    context: Value,
    status: StatusCode,
    messages: Vec<FlashMessage>,
    errors: Option<FieldErrors>,
    consumed_flash: bool,
}

#[derive(Serialize)]
struct ViewBody<'a> {
    template: &'a str,
    context: &'a Value,
    messages: &'a [FlashMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<&'a FieldErrors>,
}

impl View {
    pub fn new<T: Serialize>(template: &'static str, context: T) -> Self {
        View {
            template,
            context: serde_json::to_value(context).unwrap_or(Value::Null),
            status: StatusCode::OK,
            messages: Vec::new(),
            errors: None,
            consumed_flash: false,
        }
    }

    /// Show the message carried over from the previous redirect and expire its cookie.
    pub fn with_flash(mut self, flash: Option<Flash>) -> Self {
        if let Some(f) = flash {
            self.messages.push(f.into());
            self.consumed_flash = true;
        }
        self
    }

    /// Message shown on this render only.
    pub fn with_message(mut self, flash: Flash) -> Self {
        self.messages.push(flash.into());
        self
    }

    /// Re-render of a rejected form.
    pub fn with_errors(mut self, errors: FieldErrors) -> Self {
        self.errors = Some(errors);
        self.status = StatusCode::UNPROCESSABLE_ENTITY;
        self
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}

impl IntoResponse for View {
    fn into_response(self) -> Response {
        let body = ViewBody {
            template: self.template,
            context: &self.context,
            messages: &self.messages,
            errors: self.errors.as_ref(),
        };
        let mut resp = (self.status, Json(body)).into_response();
        if self.consumed_flash {
            append_cookie(&mut resp, &expired_cookie(FLASH_COOKIE));
        }
        resp
    }
}

/// 303 See Other, optionally carrying a flash message and session cookie changes.
#[derive(Debug)]
pub struct Redirect {
    to: String,
    flash: Option<Flash>,
    cookies: Vec<String>,
}

impl Redirect {
    pub fn to(path: impl Into<String>) -> Self {
        Redirect {
            to: path.into(),
            flash: None,
            cookies: Vec::new(),
        }
    }

    pub fn with_flash(mut self, flash: Flash) -> Self {
        self.flash = Some(flash);
        self
    }

    pub fn start_session(mut self, token: &str) -> Self {
        self.cookies.push(session_cookie(token));
        self
    }

    pub fn clear_session(mut self) -> Self {
        self.cookies.push(expired_cookie(SESSION_COOKIE));
        self
    }
}

impl IntoResponse for Redirect {
    fn into_response(self) -> Response {
        let mut resp = StatusCode::SEE_OTHER.into_response();
        if let Ok(loc) = HeaderValue::from_str(&self.to) {
            resp.headers_mut().insert(header::LOCATION, loc);
        }
        for c in &self.cookies {
            append_cookie(&mut resp, c);
        }
        if let Some(f) = self.flash {
            append_cookie(&mut resp, &format!("{}={}; Path=/; SameSite=Lax", FLASH_COOKIE, f.code()));
        }
        resp
    }
}

#[derive(Serialize)]
pub struct SuccessOne<T> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

#[derive(Serialize)]
pub struct SuccessMany<T> {
    pub data: Vec<T>,
    pub meta: MetaCount,
}

#[derive(Serialize)]
pub struct MetaCount {
    pub count: u64,
}

pub fn success_one<T: Serialize>(data: T) -> (StatusCode, Json<SuccessOne<T>>) {
    (StatusCode::CREATED, Json(SuccessOne { data, meta: None }))
}

pub fn success_many<T: Serialize>(data: Vec<T>) -> (StatusCode, Json<SuccessMany<T>>) {
    let count = data.len() as u64;
    (
        StatusCode::OK,
        Json(SuccessMany {
            data,
            meta: MetaCount { count },
        }),
    )
}

pub fn error_body(code: &str, message: String, details: Option<serde_json::Value>) -> serde_json::Value {
    serde_json::json!({
        "error": {
            "code": code,
            "message": message,
            "details": details
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flash_codes_round_trip() {
        for f in Flash::ALL {
            assert_eq!(Flash::from_code(f.code()), Some(f));
        }
        assert_eq!(Flash::from_code("nope"), None);
    }

    #[test]
    fn view_with_consumed_flash_expires_cookie() {
        let resp = View::new("inbox.html", serde_json::json!({}))
            .with_flash(Some(Flash::MessageSent))
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        let cookie = resp.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with("flash=;"));
    }

    #[test]
    fn view_with_errors_is_unprocessable() {
        let mut errors = FieldErrors::new();
        errors.add("title", "This field is required.");
        let resp = View::new("assignment_form.html", serde_json::json!({})).with_errors(errors).into_response();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(resp.headers().get(header::SET_COOKIE).is_none());
    }
}
