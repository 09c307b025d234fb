mod common;

use axum::http::StatusCode;
use common::*;
use school_admin::model::Role;

#[tokio::test]
async fn login_dashboard_logout() {
    let app = TestApp::new();
    app.account("principal", Role::Admin).await;

    let resp = app.get("/", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["template"], "login.html");

    let resp = app
        .post_form("/", None, &[("username", "principal"), ("password", "wrong-password")])
        .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(resp).await;
    assert_eq!(body["messages"][0]["text"], "Invalid username or password");
    assert_eq!(body["context"]["form"]["username"], "principal");
    assert!(body["context"]["form"].get("password").is_none());

    let resp = app
        .post_form("/", None, &[("username", "principal"), ("password", PASSWORD)])
        .await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/dashboard/");
    let session = set_cookies(&resp)
        .into_iter()
        .find(|c| c.starts_with("sessionid="))
        .expect("session cookie");
    let cookie = session.split(';').next().unwrap().to_string();

    let resp = app.get("/dashboard/", Some(&cookie)).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/admin-dashboard/");

    let resp = app.get("/admin-dashboard/", Some(&cookie)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["template"], "admin_dashboard.html");
    assert_eq!(body["context"]["total_students"], 0);

    let resp = app.get("/logout/", Some(&cookie)).await;
    assert_redirect_with_flash(&resp, "/", "logged_out");
    assert!(set_cookies(&resp).iter().any(|c| c.starts_with("sessionid=;")));

    let resp = app.get("/dashboard/", Some(&cookie)).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/");
}

#[tokio::test]
async fn anonymous_requests_go_to_login() {
    let app = TestApp::new();
    for uri in ["/dashboard/", "/students/", "/messages/inbox/", "/manage/classes/"] {
        let resp = app.get(uri, None).await;
        assert_eq!(resp.status(), StatusCode::SEE_OTHER, "{}", uri);
        assert_eq!(location(&resp), "/", "{}", uri);
    }
    let resp = app.get("/students/", Some("sessionid=not-a-session")).await;
    assert_eq!(location(&resp), "/");
}

#[tokio::test]
async fn wrong_role_is_denied_whatever_the_method() {
    let app = TestApp::new();
    let (student, _) = app.student("pupil", None, 1, None).await;
    let cookie = app.cookie(&student).await;

    let resp = app.get("/students/", Some(&cookie)).await;
    assert_redirect_with_flash(&resp, "/dashboard/", "access_denied");

    let resp = app
        .post_form("/students/create/", Some(&cookie), &[("username", "intruder")])
        .await;
    assert_redirect_with_flash(&resp, "/dashboard/", "access_denied");
    assert_eq!(app.store().count_accounts(None).await.unwrap(), 1);

    let resp = app.delete("/students/", Some(&cookie)).await;
    assert_redirect_with_flash(&resp, "/dashboard/", "access_denied");

    let resp = app.delete("/manage/classes/1/", Some(&cookie)).await;
    assert_redirect_with_flash(&resp, "/dashboard/", "access_denied");

    let resp = app.get("/admin-dashboard/", Some(&cookie)).await;
    assert_redirect_with_flash(&resp, "/dashboard/", "access_denied");
}

#[tokio::test]
async fn flash_is_shown_once_on_next_page() {
    let app = TestApp::new();
    let teacher = app.account("teach", Role::Teacher).await;
    let cookie = app.cookie(&teacher).await;
    let with_flash = format!("{}; flash=access_denied", cookie);

    let resp = app.get("/teacher-dashboard/", Some(&with_flash)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(set_cookies(&resp).iter().any(|c| c.starts_with("flash=;")));
    let body = body_json(resp).await;
    assert_eq!(body["messages"][0]["text"], "Access denied");
    assert_eq!(body["messages"][0]["level"], "error");
}

#[tokio::test]
async fn common_routes_need_no_session() {
    let app = TestApp::new();
    let resp = app.get("/health", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let resp = app.get("/ready", None).await;
    assert_eq!(body_json(resp).await["status"], "ok");
    let resp = app.get("/version", None).await;
    assert_eq!(body_json(resp).await["name"], "school-admin");
}
