use std::sync::Arc;

use tokio::task;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis;
use crate::error::{AppError, AppResult};
use crate::models::{NewProject, Project, ProjectStatus, ProjectWithReview};
use crate::repository::Repository;
use crate::storage::DocumentStore;
use crate::validation::FieldErrors;
use crate::validator::{DocumentValidator, ValidatedDocument, FILE_FIELD};

pub const TITLE_MIN_CHARS: usize = 5;

#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Raw form values as received; nothing here has been checked yet.
#[derive(Debug, Clone, Default)]
pub struct ProjectFields {
    pub title: Option<String>,
    pub status: Option<String>,
    pub company_id: Option<String>,
    pub evaluator_id: Option<String>,
}

struct ProjectDraft {
    title: String,
    status: ProjectStatus,
    company_id: Uuid,
    evaluator_id: Option<Uuid>,
}

fn status_message() -> String {
    format!("must be one of: {}", ProjectStatus::ALLOWED.join(", "))
}

fn validate_fields(fields: &ProjectFields, upload: Option<&DocumentUpload>) -> AppResult<ProjectDraft> {
    let mut errors = FieldErrors::new();

    if upload.is_none() {
        errors.push(FILE_FIELD, "is required");
    }

    let title = errors.require("title", fields.title.as_deref(), "is required");
    if let Some(title) = title {
        errors.min_chars("title", title, TITLE_MIN_CHARS);
    }

    let status = match fields.status.as_deref().map(str::trim) {
        None | Some("") => Some(ProjectStatus::InReview),
        Some(raw) => {
            let parsed = ProjectStatus::parse(raw);
            if parsed.is_none() {
                errors.push("status", status_message());
            }
            parsed
        }
    };

    let company_id = errors
        .require("company_id", fields.company_id.as_deref(), "is required")
        .and_then(|raw| errors.uuid("company_id", raw));

    let evaluator_id = match fields.evaluator_id.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => errors.uuid("evaluator_id", raw),
    };

    let draft = match (title, status, company_id) {
        (Some(title), Some(status), Some(company_id)) => Some(ProjectDraft {
            title: title.trim().to_string(),
            status,
            company_id,
            evaluator_id,
        }),
        _ => None,
    };

    // Every missing piece above already recorded a field error.
    errors
        .finish(draft)?
        .ok_or_else(|| AppError::internal("incomplete project draft"))
}

#[derive(Clone)]
pub struct ProjectService {
    repository: Arc<dyn Repository>,
    documents: DocumentStore,
    validator: DocumentValidator,
}

impl ProjectService {
    pub fn new(
        repository: Arc<dyn Repository>,
        documents: DocumentStore,
        validator: DocumentValidator,
    ) -> Self {
        Self {
            repository,
            documents,
            validator,
        }
    }

    /// Validates the form and document, stores the document, then records the
    /// project. A stored object whose row never lands is removed again.
    pub async fn submit(
        &self,
        upload: Option<DocumentUpload>,
        fields: ProjectFields,
    ) -> AppResult<Project> {
        let draft = validate_fields(&fields, upload.as_ref())?;
        let upload = upload.ok_or_else(|| AppError::validation(FILE_FIELD, "is required"))?;

        let (upload, validated) = self.validate_document(upload).await?;

        let stored = self
            .documents
            .store(&upload.bytes, &upload.filename, validated.format)
            .await?;

        let new_project = NewProject {
            id: Uuid::new_v4(),
            title: draft.title,
            status: draft.status.as_str().to_string(),
            file_locator: stored.locator.clone(),
            document_checksum: analysis::checksum(&upload.bytes),
            evaluator_id: draft.evaluator_id,
            company_id: draft.company_id,
        };

        match self.repository.insert_project(new_project).await {
            Ok(project) => {
                info!(
                    project_id = %project.id,
                    format = %validated.format,
                    characters = validated.characters,
                    "project submitted"
                );
                Ok(project)
            }
            Err(err) => {
                if let Err(cleanup) = self.documents.delete(&stored.locator).await {
                    warn!(
                        key = %stored.key,
                        error = %cleanup,
                        "failed to remove stored document after insert failure"
                    );
                }
                Err(err)
            }
        }
    }

    /// Swaps the project's document for a newly validated one. The previous
    /// object is removed only after the row points at the new one; an
    /// existing review is left as it is.
    pub async fn replace_document(
        &self,
        project_id: Uuid,
        upload: Option<DocumentUpload>,
    ) -> AppResult<ProjectWithReview> {
        let upload = upload.ok_or_else(|| AppError::validation(FILE_FIELD, "is required"))?;

        let current = self
            .repository
            .find_project(project_id)
            .await?
            .ok_or_else(|| AppError::not_found("project"))?;

        let (upload, validated) = self.validate_document(upload).await?;
        let stored = self
            .documents
            .store(&upload.bytes, &upload.filename, validated.format)
            .await?;

        let updated = self
            .repository
            .replace_document(
                project_id,
                stored.locator.clone(),
                analysis::checksum(&upload.bytes),
            )
            .await;

        let project = match updated {
            Ok(Some(project)) => project,
            outcome => {
                if let Err(cleanup) = self.documents.delete(&stored.locator).await {
                    warn!(
                        key = %stored.key,
                        error = %cleanup,
                        "failed to remove replacement document after update failure"
                    );
                }
                return match outcome {
                    Err(err) => Err(err),
                    _ => Err(AppError::not_found("project")),
                };
            }
        };

        if let Err(err) = self.documents.delete(&current.project.file_locator).await {
            warn!(
                %project_id,
                locator = %current.project.file_locator,
                error = %err,
                "failed to remove previous document"
            );
        }

        info!(
            %project_id,
            format = %validated.format,
            characters = validated.characters,
            "project document replaced"
        );
        Ok(ProjectWithReview {
            project,
            review: current.review,
        })
    }

    pub async fn get(&self, project_id: Uuid) -> AppResult<ProjectWithReview> {
        self.repository
            .find_project(project_id)
            .await?
            .ok_or_else(|| AppError::not_found("project"))
    }

    pub async fn update_status(&self, project_id: Uuid, raw_status: &str) -> AppResult<Project> {
        let status = ProjectStatus::parse(raw_status)
            .ok_or_else(|| AppError::validation("status", status_message()))?;

        let project = self
            .repository
            .update_project_status(project_id, status)
            .await?
            .ok_or_else(|| AppError::not_found("project"))?;

        info!(%project_id, %status, "project status updated");
        Ok(project)
    }

    async fn validate_document(
        &self,
        upload: DocumentUpload,
    ) -> AppResult<(DocumentUpload, ValidatedDocument)> {
        let validator = self.validator.clone();
        let (upload, outcome) = task::spawn_blocking(move || {
            let outcome = validator.validate(&upload.bytes, &upload.filename);
            (upload, outcome)
        })
        .await?;
        Ok((upload, outcome?))
    }
}
