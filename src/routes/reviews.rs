use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use super::to_iso;
use crate::error::{AppError, AppResult};
use crate::models::Review;
use crate::reviews::{Confirmation, CreateReviewInput, UpdateReviewInput};
use crate::state::AppState;
use crate::validation::parse_uuid;

#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub id: Uuid,
    pub project_id: Uuid,
    pub reviewed_at: String,
    pub feedback: String,
}

impl From<Review> for ReviewResponse {
    fn from(review: Review) -> Self {
        Self {
            id: review.id,
            project_id: review.project_id,
            reviewed_at: to_iso(review.reviewed_at),
            feedback: review.feedback,
        }
    }
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|err| AppError::validation("body", err.body_text()))
}

pub async fn create_review(
    State(state): State<AppState>,
    payload: Result<Json<CreateReviewInput>, JsonRejection>,
) -> AppResult<(StatusCode, Json<ReviewResponse>)> {
    let input = body(payload)?;
    let review = state.reviews.create(input).await?;
    Ok((StatusCode::CREATED, Json(review.into())))
}

pub async fn get_review(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ReviewResponse>> {
    let review_id = parse_uuid("id", &id)?;
    let review = state.reviews.get(review_id).await?;
    Ok(Json(review.into()))
}

pub async fn update_review(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateReviewInput>, JsonRejection>,
) -> AppResult<Json<ReviewResponse>> {
    let review_id = parse_uuid("id", &id)?;
    let input = body(payload)?;
    let review = state.reviews.update(review_id, input).await?;
    Ok(Json(review.into()))
}

pub async fn delete_review(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Confirmation>> {
    let review_id = parse_uuid("id", &id)?;
    let confirmation = state.reviews.delete(review_id).await?;
    Ok(Json(confirmation))
}
