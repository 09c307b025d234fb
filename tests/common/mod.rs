#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Method, Request, Response, StatusCode};
use axum::Router;
use chrono::NaiveDate;
use school_admin::auth::{hash_password, start_session};
use school_admin::config::Settings;
use school_admin::model::*;
pub use school_admin::Store;
use school_admin::{app, AppState, LocalBlobStore, MemoryStore};
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

pub const PASSWORD: &str = "pass-word-1";
const BOUNDARY: &str = "----school-admin-test-boundary";

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub media: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        let media = tempfile::tempdir().unwrap();
        let settings = Settings {
            media_root: media.path().to_path_buf(),
            ..Settings::default()
        };
        let state = AppState::new(
            Arc::new(MemoryStore::new()),
            Arc::new(LocalBlobStore::new(media.path())),
            settings,
        );
        TestApp {
            router: app(state.clone()),
            state,
            media,
        }
    }

    pub fn store(&self) -> &dyn Store {
        self.state.store.as_ref()
    }

    pub async fn account(&self, username: &str, role: Role) -> Account {
        self.store()
            .create_account(NewAccount {
                username: username.into(),
                password_hash: hash_password(PASSWORD).unwrap(),
                email: format!("{}@school.test", username),
                first_name: username.to_uppercase(),
                last_name: "Test".into(),
                role,
                phone: String::new(),
                address: String::new(),
                profile_picture: None,
                date_of_birth: None,
            })
            .await
            .unwrap()
    }

    /// Session cookie header value for `account`.
    pub async fn cookie(&self, account: &Account) -> String {
        let session = start_session(self.store(), account.id).await.unwrap();
        format!("sessionid={}", session.token)
    }

    pub async fn class(&self, name: &str) -> ClassGroup {
        self.store()
            .create_class(NewClassGroup {
                name: name.into(),
                section: "A".into(),
                academic_year: "2024-2025".into(),
                class_teacher_id: None,
            })
            .await
            .unwrap()
    }

    pub async fn subject(&self, code: &str) -> Subject {
        self.store()
            .create_subject(NewSubject {
                code: code.into(),
                name: format!("{} subject", code),
                description: String::new(),
            })
            .await
            .unwrap()
    }

    /// A student account plus its record in `class_id` with `roll`.
    pub async fn student(&self, username: &str, class_id: Option<i64>, roll: i32, parent_id: Option<i64>) -> (Account, StudentRecord) {
        let account = self.account(username, Role::Student).await;
        let record = self
            .store()
            .create_student(NewStudentRecord {
                account_id: account.id,
                admission_number: format!("ADM-{}", username),
                class_id,
                roll_number: roll,
                parent_id,
                admission_date: NaiveDate::from_ymd_opt(2024, 9, 1).unwrap(),
            })
            .await
            .unwrap();
        (account, record)
    }

    pub async fn send(&self, req: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(req).await.unwrap()
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        self.send(request(Method::GET, uri, cookie).body(Body::empty()).unwrap()).await
    }

    pub async fn post_form(&self, uri: &str, cookie: Option<&str>, fields: &[(&str, &str)]) -> Response<Body> {
        let req = request(Method::POST, uri, cookie)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(urlencode(fields)))
            .unwrap();
        self.send(req).await
    }

    pub async fn post_multipart(
        &self,
        uri: &str,
        cookie: Option<&str>,
        fields: &[(&str, &str)],
        files: &[FilePart<'_>],
    ) -> Response<Body> {
        let req = request(Method::POST, uri, cookie)
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", BOUNDARY))
            .body(Body::from(multipart_body(fields, files)))
            .unwrap();
        self.send(req).await
    }

    pub async fn post_json(&self, uri: &str, cookie: Option<&str>, body: Value) -> Response<Body> {
        let req = request(Method::POST, uri, cookie)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(req).await
    }

    pub async fn delete(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        self.send(request(Method::DELETE, uri, cookie).body(Body::empty()).unwrap()).await
    }

    /// Files stored under one media prefix.
    pub fn media_files(&self, prefix: &str) -> usize {
        std::fs::read_dir(self.media.path().join(prefix))
            .map(|d| d.count())
            .unwrap_or(0)
    }
}

pub struct FilePart<'a> {
    pub field: &'a str,
    pub filename: &'a str,
    pub content_type: &'a str,
    pub bytes: &'a [u8],
}

fn request(method: Method, uri: &str, cookie: Option<&str>) -> axum::http::request::Builder {
    let mut b = Request::builder().method(method).uri(uri);
    if let Some(c) = cookie {
        b = b.header(header::COOKIE, c);
    }
    b
}

fn urlencode(fields: &[(&str, &str)]) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{}={}", encode(k), encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn encode(s: &str) -> String {
    s.bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => (b as char).to_string(),
            _ => format!("%{:02X}", b),
        })
        .collect()
}

fn multipart_body(fields: &[(&str, &str)], files: &[FilePart<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    for f in files {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, f.field, f.filename, f.content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(f.bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub async fn body_json(resp: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(resp: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn location(resp: &Response<Body>) -> &str {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

pub fn set_cookies(resp: &Response<Body>) -> Vec<String> {
    resp.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok().map(str::to_string))
        .collect()
}

/// Assert a 303 to `to` carrying flash `code`.
pub fn assert_redirect_with_flash(resp: &Response<Body>, to: &str, code: &str) {
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(resp), to);
    let flash = format!("flash={};", code);
    assert!(
        set_cookies(resp).iter().any(|c| c.starts_with(&flash)),
        "expected flash {} in {:?}",
        code,
        set_cookies(resp)
    );
}
