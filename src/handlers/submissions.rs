//! Assignment submission by students and grading by the assignment's creator.

use super::form_errors;
use crate::blob::SUBMISSION_FILES;
use crate::error::AppError;
use crate::extractors::{CurrentUser, FormData};
use crate::model::{Account, Assignment, NewSubmission, Submission};
use crate::response::{Flash, Redirect, View};
use crate::service::dashboard::student_record_for;
use crate::service::forms::{GradeSubmissionInput, SubmissionInput};
use crate::service::summary::summarize_student;
use crate::service::FieldErrors;
use crate::state::AppState;
use crate::store::{Store, SubmissionFilter};
use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use serde_json::{json, Value};

async fn load_assignment(store: &dyn Store, id: i64) -> Result<Assignment, AppError> {
    store
        .get_assignment(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("assignment {}", id)))
}

/// Only the teacher who created the assignment may see or grade its submissions.
fn ensure_creator(assignment: &Assignment, account: &Account) -> Result<(), AppError> {
    if assignment.created_by == account.id {
        Ok(())
    } else {
        tracing::warn!(
            user = %account.username,
            assignment_id = assignment.id,
            "submission access denied: not the assignment's creator"
        );
        Err(AppError::AuthorizationFailure)
    }
}

fn submission_view(assignment: &Assignment, errors: Option<FieldErrors>) -> View {
    let view = View::new("submission_form.html", json!({ "assignment": assignment, "form": {} }));
    match errors {
        Some(e) => view.with_errors(e),
        None => view,
    }
}

/// GET /assignments/:id/submit/
pub async fn submit_form(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(assignment_id): Path<i64>,
) -> Result<View, AppError> {
    let assignment = load_assignment(state.store.as_ref(), assignment_id).await?;
    Ok(submission_view(&assignment, None).with_flash(user.flash))
}

/// POST /assignments/:id/submit/: multipart with a required `submission_file`.
pub async fn submit(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(assignment_id): Path<i64>,
    form: FormData,
) -> Result<Response, AppError> {
    let store = state.store.as_ref();
    let assignment = load_assignment(store, assignment_id).await?;
    let student = student_record_for(store, &user.account).await?;
    let input = SubmissionInput {
        submission_file: form.file("submission_file"),
    };
    let file = match input.validate() {
        Ok(f) => f,
        Err(errors) => return Ok(submission_view(&assignment, Some(errors)).into_response()),
    };

    let path = state.blobs.put(SUBMISSION_FILES, &file.filename, &file.bytes).await?;
    let new = NewSubmission {
        assignment_id: assignment.id,
        student_id: student.id,
        submission_file: path.clone(),
    };
    let submission = match store.create_submission(new).await {
        Ok(s) => s,
        Err(e) => {
            if let Err(io) = state.blobs.delete(&path).await {
                tracing::warn!(path = %path, error = %io, "could not remove upload");
            }
            let errors = form_errors(e)?;
            return Ok(submission_view(&assignment, Some(errors)).into_response());
        }
    };
    tracing::info!(
        submission_id = submission.id,
        assignment_id = assignment.id,
        student_id = student.id,
        "assignment submitted"
    );
    Ok(Redirect::to("/student-dashboard/")
        .with_flash(Flash::AssignmentSubmitted)
        .into_response())
}

/// GET /assignments/:id/submissions/
pub async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(assignment_id): Path<i64>,
) -> Result<View, AppError> {
    let store = state.store.as_ref();
    let assignment = load_assignment(store, assignment_id).await?;
    ensure_creator(&assignment, &user.account)?;
    let submissions = store
        .list_submissions(SubmissionFilter {
            assignment_id: Some(assignment.id),
            ..Default::default()
        })
        .await?;
    let mut rows = Vec::with_capacity(submissions.len());
    for s in &submissions {
        rows.push(submission_row(store, s).await?);
    }
    Ok(View::new(
        "submission_list.html",
        json!({ "assignment": assignment, "submissions": rows }),
    )
    .with_flash(user.flash))
}

async fn submission_row(store: &dyn Store, submission: &Submission) -> Result<Value, AppError> {
    let student = match store.get_student(submission.student_id).await? {
        Some(s) => Some(summarize_student(store, &s).await?),
        None => None,
    };
    Ok(json!({
        "submission": submission,
        "student": student,
        "graded": submission.is_graded(),
    }))
}

async fn load_for_grading(
    store: &dyn Store,
    submission_id: i64,
    account: &Account,
) -> Result<(Submission, Assignment), AppError> {
    let submission = store
        .get_submission(submission_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("submission {}", submission_id)))?;
    let assignment = load_assignment(store, submission.assignment_id).await?;
    ensure_creator(&assignment, account)?;
    Ok((submission, assignment))
}

fn grading_view(row: Value, assignment: &Assignment, form: Value, errors: Option<FieldErrors>) -> View {
    let view = View::new(
        "grade_submission.html",
        json!({ "assignment": assignment, "submission": row, "form": form }),
    );
    match errors {
        Some(e) => view.with_errors(e),
        None => view,
    }
}

/// GET /submissions/:id/grade/
pub async fn grade_form(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(submission_id): Path<i64>,
) -> Result<View, AppError> {
    let store = state.store.as_ref();
    let (submission, assignment) = load_for_grading(store, submission_id, &user.account).await?;
    let row = submission_row(store, &submission).await?;
    let form = json!({
        "marks_obtained": submission.marks_obtained,
        "feedback": submission.feedback,
    });
    Ok(grading_view(row, &assignment, form, None).with_flash(user.flash))
}

/// POST /submissions/:id/grade/: marks between 0 and the assignment's total.
pub async fn grade(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(submission_id): Path<i64>,
    form: FormData,
) -> Result<Response, AppError> {
    let store = state.store.as_ref();
    let (submission, assignment) = load_for_grading(store, submission_id, &user.account).await?;
    let input: GradeSubmissionInput = form.parse()?;
    let grade = match input.validate(assignment.total_marks, user.account.id) {
        Ok(g) => g,
        Err(errors) => {
            let row = submission_row(store, &submission).await?;
            return Ok(grading_view(row, &assignment, form.echo(), Some(errors)).into_response());
        }
    };
    let graded = store
        .grade_submission(submission.id, grade)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("submission {}", submission.id)))?;
    tracing::info!(
        submission_id = graded.id,
        marks = ?graded.marks_obtained,
        by = %user.account.username,
        "submission graded"
    );
    Ok(Redirect::to("/teacher-dashboard/")
        .with_flash(Flash::SubmissionGraded)
        .into_response())
}
