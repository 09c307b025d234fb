//! Admin management JSON API: classes, subjects, class-subject links and staff/parent accounts.

use crate::auth::hash_password;
use crate::error::AppError;
use crate::extractors::{CurrentUser, FormData};
use crate::model::Role;
use crate::response::{success_many, success_one};
use crate::service::forms::{ClassInput, ClassSubjectInput, References, StaffAccountInput, SubjectInput};
use crate::state::AppState;
use crate::store::{AssignmentFilter, ClassSubjectFilter, Store, SubmissionFilter};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::Value;

/// Resources addressable under /manage/:kind/.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resource {
    Classes,
    Subjects,
    ClassSubjects,
    Accounts,
}

impl Resource {
    pub fn from_path(segment: &str) -> Option<Self> {
        match segment {
            "classes" => Some(Resource::Classes),
            "subjects" => Some(Resource::Subjects),
            "class-subjects" => Some(Resource::ClassSubjects),
            "accounts" => Some(Resource::Accounts),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ClassQuery {
    pub academic_year: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClassSubjectQuery {
    pub class_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AccountQuery {
    pub role: Option<String>,
}

pub async fn list_classes(
    State(state): State<AppState>,
    Query(q): Query<ClassQuery>,
) -> Result<impl IntoResponse, AppError> {
    let year = q.academic_year.as_deref().filter(|y| !y.is_empty());
    Ok(success_many(state.store.list_classes(year).await?))
}

pub async fn create_class(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let input: ClassInput = FormData::from_json(body)?.parse()?;
    let new = input.validate()?;
    let mut refs = References::new(state.store.as_ref());
    refs.resolve_account("class_teacher", new.class_teacher_id, &[Role::Teacher]).await?;
    refs.finish()?;
    let class = state.store.create_class(new).await?;
    tracing::info!(class_id = class.id, label = %class.label(), by = %user.account.username, "class created");
    Ok(success_one(class))
}

pub async fn list_subjects(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    Ok(success_many(state.store.list_subjects().await?))
}

pub async fn create_subject(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let input: SubjectInput = FormData::from_json(body)?.parse()?;
    let subject = state.store.create_subject(input.validate()?).await?;
    tracing::info!(subject_id = subject.id, code = %subject.code, by = %user.account.username, "subject created");
    Ok(success_one(subject))
}

pub async fn list_class_subjects(
    State(state): State<AppState>,
    Query(q): Query<ClassSubjectQuery>,
) -> Result<impl IntoResponse, AppError> {
    let rows = state
        .store
        .list_class_subjects(ClassSubjectFilter {
            class_id: q.class_id,
            ..Default::default()
        })
        .await?;
    Ok(success_many(rows))
}

pub async fn create_class_subject(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let input: ClassSubjectInput = FormData::from_json(body)?.parse()?;
    let new = input.validate()?;
    let mut refs = References::new(state.store.as_ref());
    refs.resolve_class("class_group", Some(new.class_id)).await?;
    refs.resolve_subject("subject", new.subject_id).await?;
    refs.resolve_account("teacher", new.teacher_id, &[Role::Teacher]).await?;
    refs.finish()?;
    let link = state.store.create_class_subject(new).await?;
    tracing::info!(class_subject_id = link.id, by = %user.account.username, "class subject created");
    Ok(success_one(link))
}

pub async fn list_accounts(
    State(state): State<AppState>,
    Query(q): Query<AccountQuery>,
) -> Result<impl IntoResponse, AppError> {
    let role = match q.role.as_deref().filter(|r| !r.is_empty()) {
        Some(r) => Some(r.parse::<Role>().map_err(|e| AppError::BadRequest(e.to_string()))?),
        None => None,
    };
    Ok(success_many(state.store.list_accounts(role).await?))
}

pub async fn create_account(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let input: StaffAccountInput = FormData::from_json(body)?.parse()?;
    let (account, role, profile) = input.validate()?;
    let hash = hash_password(&account.password)?;
    let created = state
        .store
        .create_account(account.into_new_account(hash, role, profile, None))
        .await?;
    tracing::info!(
        account_id = created.id,
        username = %created.username,
        role = %created.role,
        by = %user.account.username,
        "account created"
    );
    Ok(success_one(created))
}

/// DELETE /manage/:kind/:id/
/// Stored files whose rows go away with this one through cascading deletes.
async fn cascaded_files(store: &dyn Store, resource: Resource, id: i64) -> Result<Vec<String>, AppError> {
    let mut files = Vec::new();
    let mut student = None;
    let assignments = match resource {
        Resource::Classes => {
            store
                .list_assignments(AssignmentFilter {
                    class_id: Some(id),
                    ..Default::default()
                })
                .await?
        }
        Resource::Subjects | Resource::ClassSubjects => {
            let links: Vec<i64> = store
                .list_class_subjects(ClassSubjectFilter::default())
                .await?
                .into_iter()
                .filter(|cs| match resource {
                    Resource::Subjects => cs.subject_id == id,
                    _ => cs.id == id,
                })
                .map(|cs| cs.id)
                .collect();
            store
                .list_assignments(AssignmentFilter::default())
                .await?
                .into_iter()
                .filter(|a| links.contains(&a.class_subject_id))
                .collect()
        }
        Resource::Accounts => {
            if let Some(account) = store.get_account(id).await? {
                files.extend(account.profile_picture);
            }
            student = store.get_student_by_account(id).await?;
            store
                .list_assignments(AssignmentFilter {
                    created_by: Some(id),
                    ..Default::default()
                })
                .await?
        }
    };
    for a in &assignments {
        files.extend(a.attachment.clone());
        let submissions = store
            .list_submissions(SubmissionFilter {
                assignment_id: Some(a.id),
                ..Default::default()
            })
            .await?;
        files.extend(submissions.into_iter().map(|s| s.submission_file));
    }
    if let Some(student) = student {
        let submissions = store
            .list_submissions(SubmissionFilter {
                student_id: Some(student.id),
                ..Default::default()
            })
            .await?;
        files.extend(submissions.into_iter().map(|s| s.submission_file));
    }
    files.sort();
    files.dedup();
    Ok(files)
}

pub async fn delete(
    State(state): State<AppState>,
    user: CurrentUser,
    Path((kind, id)): Path<(String, i64)>,
) -> Result<Response, AppError> {
    let resource = Resource::from_path(&kind).ok_or_else(|| AppError::NotFound(kind.clone()))?;
    if resource == Resource::Accounts && id == user.account.id {
        return Err(AppError::BadRequest("cannot delete the signed-in account".into()));
    }
    let store = state.store.as_ref();
    let files = cascaded_files(store, resource, id).await?;
    let deleted = match resource {
        Resource::Classes => store.delete_class(id).await?,
        Resource::Subjects => store.delete_subject(id).await?,
        Resource::ClassSubjects => store.delete_class_subject(id).await?,
        Resource::Accounts => store.delete_account(id).await?,
    };
    if !deleted {
        return Err(AppError::NotFound(format!("{} {}", kind, id)));
    }
    for path in &files {
        if let Err(e) = state.blobs.delete(path).await {
            tracing::warn!(path = %path, error = %e, "could not remove stored file");
        }
    }
    tracing::info!(kind = %kind, id, files = files.len(), by = %user.account.username, "deleted");
    Ok(StatusCode::NO_CONTENT.into_response())
}
