mod common;

use axum::http::StatusCode;
use common::*;
use school_admin::model::{Account, ClassGroup, NewClassSubject, Role};
use school_admin::store::SubmissionFilter;

struct Setup {
    app: TestApp,
    teacher: Account,
    student: Account,
    class: ClassGroup,
    class_subject_id: i64,
}

async fn setup() -> Setup {
    let app = TestApp::new();
    let teacher = app.account("teach", Role::Teacher).await;
    let class = app.class("Grade 7").await;
    let subject = app.subject("MATH").await;
    let link = app
        .store()
        .create_class_subject(NewClassSubject {
            class_id: class.id,
            subject_id: subject.id,
            teacher_id: Some(teacher.id),
        })
        .await
        .unwrap();
    let (student, _) = app.student("pupil", Some(class.id), 1, None).await;
    Setup {
        app,
        teacher,
        student,
        class,
        class_subject_id: link.id,
    }
}

async fn create_assignment(s: &Setup, cookie: &str, title: &str) -> i64 {
    let cs = s.class_subject_id.to_string();
    let resp = s
        .app
        .post_multipart(
            "/assignments/create/",
            Some(cookie),
            &[
                ("title", title),
                ("description", "Chapter 3 exercises"),
                ("class_subject", &cs),
                ("due_date", "2024-11-01T17:00"),
                ("total_marks", "20"),
            ],
            &[],
        )
        .await;
    assert_redirect_with_flash(&resp, "/teacher-dashboard/", "assignment_created");
    let listed = s
        .app
        .store()
        .list_assignments(Default::default())
        .await
        .unwrap();
    listed.iter().find(|a| a.title == title).unwrap().id
}

fn homework() -> FilePart<'static> {
    FilePart {
        field: "submission_file",
        filename: "answers.pdf",
        content_type: "application/pdf",
        bytes: b"%PDF-1.4 answers",
    }
}

#[tokio::test]
async fn teacher_creates_and_student_sees_assignment() {
    let s = setup().await;
    let teacher_cookie = s.app.cookie(&s.teacher).await;
    let id = create_assignment(&s, &teacher_cookie, "Fractions").await;

    let student_cookie = s.app.cookie(&s.student).await;
    let resp = s.app.get("/assignments/", Some(&student_cookie)).await;
    let body = body_json(resp).await;
    assert_eq!(body["context"]["assignments"][0]["id"], id);

    let resp = s.app.get("/student-dashboard/", Some(&student_cookie)).await;
    let body = body_json(resp).await;
    assert_eq!(body["context"]["pending_assignments"][0]["title"], "Fractions");

    // A student in another class does not see it.
    let other = s.app.class("Grade 8").await;
    let (outsider, _) = s.app.student("other", Some(other.id), 1, None).await;
    let resp = s.app.get("/assignments/", Some(&s.app.cookie(&outsider).await)).await;
    assert!(body_json(resp).await["context"]["assignments"].as_array().unwrap().is_empty());
    assert_ne!(other.id, s.class.id);
}

#[tokio::test]
async fn bad_class_subject_is_a_field_error() {
    let s = setup().await;
    let cookie = s.app.cookie(&s.teacher).await;
    let resp = s
        .app
        .post_multipart(
            "/assignments/create/",
            Some(&cookie),
            &[
                ("title", "Ghost"),
                ("description", "x"),
                ("class_subject", "4040"),
                ("due_date", "2024-11-01T17:00"),
                ("total_marks", "10"),
            ],
            &[],
        )
        .await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body_json(resp).await["errors"]["class_subject"].is_array());
}

#[tokio::test]
async fn second_submission_is_rejected() {
    let s = setup().await;
    let teacher_cookie = s.app.cookie(&s.teacher).await;
    let id = create_assignment(&s, &teacher_cookie, "Essay").await;
    let cookie = s.app.cookie(&s.student).await;
    let uri = format!("/assignments/{}/submit/", id);

    let resp = s.app.post_multipart(&uri, Some(&cookie), &[("note", "")], &[]).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body_json(resp).await["errors"]["submission_file"].is_array());

    let resp = s.app.post_multipart(&uri, Some(&cookie), &[], &[homework()]).await;
    assert_redirect_with_flash(&resp, "/student-dashboard/", "assignment_submitted");

    let resp = s.app.post_multipart(&uri, Some(&cookie), &[], &[homework()]).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body_json(resp).await["errors"]["__all__"].is_array());

    let subs = s
        .app
        .store()
        .list_submissions(SubmissionFilter {
            assignment_id: Some(id),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(subs.len(), 1);
    assert_eq!(s.app.media_files("submissions"), 1);

    let resp = s.app.get("/assignments/4040/submit/", Some(&cookie)).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn only_the_creator_grades() {
    let s = setup().await;
    let teacher_cookie = s.app.cookie(&s.teacher).await;
    let id = create_assignment(&s, &teacher_cookie, "Lab report").await;
    let student_cookie = s.app.cookie(&s.student).await;
    s.app
        .post_multipart(&format!("/assignments/{}/submit/", id), Some(&student_cookie), &[], &[homework()])
        .await;

    let resp = s.app.get("/teacher-dashboard/", Some(&teacher_cookie)).await;
    assert_eq!(body_json(resp).await["context"]["pending_submissions"], 1);

    let resp = s.app.get(&format!("/assignments/{}/submissions/", id), Some(&teacher_cookie)).await;
    let body = body_json(resp).await;
    let submission_id = body["context"]["submissions"][0]["submission"]["id"].as_i64().unwrap();
    assert_eq!(body["context"]["submissions"][0]["graded"], false);
    let grade_uri = format!("/submissions/{}/grade/", submission_id);

    let other = s.app.account("other-teacher", Role::Teacher).await;
    let other_cookie = s.app.cookie(&other).await;
    let resp = s
        .app
        .post_form(&grade_uri, Some(&other_cookie), &[("marks_obtained", "15"), ("feedback", "ok")])
        .await;
    assert_redirect_with_flash(&resp, "/dashboard/", "access_denied");

    let resp = s
        .app
        .post_form(&grade_uri, Some(&teacher_cookie), &[("marks_obtained", "25"), ("feedback", "")])
        .await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body_json(resp).await["errors"]["marks_obtained"].is_array());

    let resp = s
        .app
        .post_form(&grade_uri, Some(&teacher_cookie), &[("marks_obtained", "18"), ("feedback", "Well done")])
        .await;
    assert_redirect_with_flash(&resp, "/teacher-dashboard/", "submission_graded");

    let graded = s.app.store().get_submission(submission_id).await.unwrap().unwrap();
    assert_eq!(graded.marks_obtained, Some(18));
    assert_eq!(graded.graded_by, Some(s.teacher.id));
    let resp = s.app.get("/teacher-dashboard/", Some(&teacher_cookie)).await;
    assert_eq!(body_json(resp).await["context"]["pending_submissions"], 0);
}
