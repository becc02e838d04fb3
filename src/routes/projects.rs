use axum::{
    extract::{multipart::Field, rejection::JsonRejection, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

use super::reviews::ReviewResponse;
use super::to_iso;
use crate::error::{AppError, AppResult};
use crate::models::{Project, ProjectWithReview};
use crate::projects::{DocumentUpload, ProjectFields};
use crate::state::AppState;
use crate::validation::parse_uuid;
use crate::validator::FILE_FIELD;

#[derive(Debug, Serialize)]
pub struct ProjectResponse {
    pub id: Uuid,
    pub title: String,
    pub status: String,
    pub file_locator: String,
    pub evaluator_id: Option<Uuid>,
    pub company_id: Uuid,
    pub submitted_at: String,
    pub reviewed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub review: Option<ReviewResponse>,
}

impl ProjectResponse {
    fn from_project(project: Project, review: Option<ReviewResponse>) -> Self {
        Self {
            id: project.id,
            title: project.title,
            status: project.status,
            file_locator: project.file_locator,
            evaluator_id: project.evaluator_id,
            company_id: project.company_id,
            submitted_at: to_iso(project.submitted_at),
            reviewed: review.is_some(),
            review,
        }
    }
}

impl From<ProjectWithReview> for ProjectResponse {
    fn from(found: ProjectWithReview) -> Self {
        Self::from_project(found.project, found.review.map(ReviewResponse::from))
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: Option<String>,
}

fn multipart_error(err: impl std::fmt::Display) -> AppError {
    error!(error = %err, "invalid multipart data");
    AppError::validation(FILE_FIELD, format!("invalid multipart data: {err}"))
}

fn is_document_field(name: Option<&str>) -> bool {
    matches!(name, Some("file" | "arquivo"))
}

async fn read_upload(field: Field<'_>) -> AppResult<DocumentUpload> {
    let filename = field.file_name().map(|n| n.to_string()).unwrap_or_default();
    let bytes = field.bytes().await.map_err(multipart_error)?;
    Ok(DocumentUpload {
        filename,
        bytes: bytes.to_vec(),
    })
}

/// Accepts the document under either `file` or the legacy `arquivo` field.
pub async fn submit_project(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<ProjectResponse>)> {
    let mut upload: Option<DocumentUpload> = None;
    let mut fields = ProjectFields::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(|n| n.to_string());
        match name.as_deref() {
            document if is_document_field(document) => {
                upload = Some(read_upload(field).await?);
            }
            Some(key @ ("title" | "status" | "company_id" | "evaluator_id")) => {
                let value = Some(field.text().await.map_err(multipart_error)?);
                match key {
                    "title" => fields.title = value,
                    "status" => fields.status = value,
                    "company_id" => fields.company_id = value,
                    _ => fields.evaluator_id = value,
                }
            }
            _ => {}
        }
    }

    let project = state.projects.submit(upload, fields).await?;
    Ok((
        StatusCode::CREATED,
        Json(ProjectResponse::from_project(project, None)),
    ))
}

pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ProjectResponse>> {
    let project_id = parse_uuid("id", &id)?;
    let found = state.projects.get(project_id).await?;
    Ok(Json(found.into()))
}

pub async fn update_project_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<StatusUpdate>, JsonRejection>,
) -> AppResult<Json<ProjectResponse>> {
    let project_id = parse_uuid("id", &id)?;
    let Json(update) = payload.map_err(|err| AppError::validation("body", err.body_text()))?;
    let status = update
        .status
        .ok_or_else(|| AppError::validation("status", "is required"))?;

    let project = state.projects.update_status(project_id, &status).await?;
    Ok(Json(ProjectResponse::from_project(project, None)))
}

/// Multipart body with a single document under `file` or `arquivo`; other
/// fields are ignored.
pub async fn replace_project_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> AppResult<Json<ProjectResponse>> {
    let project_id = parse_uuid("id", &id)?;

    let mut upload: Option<DocumentUpload> = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if is_document_field(field.name()) {
            upload = Some(read_upload(field).await?);
        }
    }

    let found = state.projects.replace_document(project_id, upload).await?;
    Ok(Json(found.into()))
}
