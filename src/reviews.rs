//! Review lifecycle: a project moves from unreviewed to reviewed only through
//! [`ReviewService::create`] and back only when its review is deleted.

use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::ReviewOrchestrator;
use crate::error::{AppError, AppResult};
use crate::models::{NewReview, Review, ReviewChangeset};
use crate::repository::{Repository, ALREADY_REVIEWED};
use crate::validation::{parse_uuid, FieldErrors};

pub const FEEDBACK_MIN_CHARS: usize = 10;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateReviewInput {
    pub project_id: Option<String>,
    pub reviewed_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateReviewInput {
    pub feedback: Option<String>,
    pub reviewed_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Confirmation {
    pub message: String,
}

fn assemble_review(
    project_id: Uuid,
    feedback: String,
    reviewed_at: Option<NaiveDateTime>,
) -> AppResult<NewReview> {
    let mut errors = FieldErrors::new();
    errors.min_chars("feedback", &feedback, FEEDBACK_MIN_CHARS);

    errors.finish(NewReview {
        id: Uuid::new_v4(),
        project_id,
        reviewed_at: reviewed_at.unwrap_or_else(|| Utc::now().naive_utc()),
        feedback: feedback.trim().to_string(),
    })
}

fn validate_changes(input: UpdateReviewInput) -> AppResult<ReviewChangeset> {
    let mut errors = FieldErrors::new();

    if let Some(feedback) = &input.feedback {
        errors.min_chars("feedback", feedback, FEEDBACK_MIN_CHARS);
    }

    let changes = ReviewChangeset {
        feedback: input.feedback.map(|feedback| feedback.trim().to_string()),
        reviewed_at: input.reviewed_at,
    };
    if changes.is_empty() {
        errors.push("review", "provide feedback or reviewed_at to update");
    }

    errors.finish(changes)
}

#[derive(Clone)]
pub struct ReviewService {
    repository: Arc<dyn Repository>,
    orchestrator: ReviewOrchestrator,
}

impl ReviewService {
    pub fn new(repository: Arc<dyn Repository>, orchestrator: ReviewOrchestrator) -> Self {
        Self {
            repository,
            orchestrator,
        }
    }

    /// All-or-nothing: the review row is written last, after analysis and
    /// validation have succeeded.
    pub async fn create(&self, input: CreateReviewInput) -> AppResult<Review> {
        let raw_id = input
            .project_id
            .as_deref()
            .ok_or_else(|| AppError::validation("project_id", "is required"))?;
        let project_id = parse_uuid("project_id", raw_id)?;

        let found = self
            .repository
            .find_project(project_id)
            .await?
            .ok_or_else(|| AppError::not_found("project"))?;

        // Early exit only; the unique index settles concurrent creates.
        if found.is_reviewed() {
            warn!(%project_id, "review requested for a project that already has one");
            return Err(AppError::conflict("project", ALREADY_REVIEWED));
        }

        let text = self.orchestrator.document_text(&found.project).await?;
        info!(%project_id, "starting project analysis");
        let feedback = self.orchestrator.analyze(&text).await?;

        let review = assemble_review(project_id, feedback, input.reviewed_at)?;
        let created = self.repository.insert_review(review).await?;

        info!(%project_id, review_id = %created.id, "review created");
        Ok(created)
    }

    pub async fn get(&self, review_id: Uuid) -> AppResult<Review> {
        self.repository
            .find_review(review_id)
            .await?
            .ok_or_else(|| AppError::not_found("review"))
    }

    pub async fn update(&self, review_id: Uuid, input: UpdateReviewInput) -> AppResult<Review> {
        self.get(review_id).await?;
        let changes = validate_changes(input)?;

        let updated = self
            .repository
            .update_review(review_id, changes)
            .await?
            .ok_or_else(|| AppError::not_found("review"))?;

        info!(%review_id, "review updated");
        Ok(updated)
    }

    pub async fn delete(&self, review_id: Uuid) -> AppResult<Confirmation> {
        self.get(review_id).await?;

        if !self.repository.delete_review(review_id).await? {
            return Err(AppError::not_found("review"));
        }

        info!(%review_id, "review deleted");
        Ok(Confirmation {
            message: "review deleted".to_string(),
        })
    }
}
