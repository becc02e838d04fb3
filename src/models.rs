use std::fmt;

use chrono::NaiveDateTime;
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectStatus {
    InReview,
    Approved,
    Rejected,
}

impl ProjectStatus {
    pub const ALLOWED: &'static [&'static str] = &["in_review", "approved", "rejected"];

    pub fn as_str(self) -> &'static str {
        match self {
            ProjectStatus::InReview => "in_review",
            ProjectStatus::Approved => "approved",
            ProjectStatus::Rejected => "rejected",
        }
    }

    /// Accepts the canonical labels plus the Portuguese ones older clients still send.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "in_review" | "in review" | "em avaliação" | "em avaliacao" => {
                Some(ProjectStatus::InReview)
            }
            "approved" | "aprovado" => Some(ProjectStatus::Approved),
            "rejected" | "reprovado" => Some(ProjectStatus::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = projects)]
pub struct Project {
    pub id: Uuid,
    pub title: String,
    pub status: String,
    pub file_locator: String,
    pub document_checksum: String,
    pub evaluator_id: Option<Uuid>,
    pub company_id: Uuid,
    pub submitted_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = projects)]
pub struct NewProject {
    pub id: Uuid,
    pub title: String,
    pub status: String,
    pub file_locator: String,
    pub document_checksum: String,
    pub evaluator_id: Option<Uuid>,
    pub company_id: Uuid,
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Associations)]
#[diesel(table_name = reviews)]
#[diesel(belongs_to(Project))]
pub struct Review {
    pub id: Uuid,
    pub project_id: Uuid,
    pub reviewed_at: NaiveDateTime,
    pub feedback: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = reviews)]
pub struct NewReview {
    pub id: Uuid,
    pub project_id: Uuid,
    pub reviewed_at: NaiveDateTime,
    pub feedback: String,
}

#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = reviews)]
pub struct ReviewChangeset {
    pub feedback: Option<String>,
    pub reviewed_at: Option<NaiveDateTime>,
}

impl ReviewChangeset {
    pub fn is_empty(&self) -> bool {
        self.feedback.is_none() && self.reviewed_at.is_none()
    }
}

/// A project with its review already loaded; no further I/O is needed to
/// answer "has this project been reviewed".
#[derive(Debug, Clone)]
pub struct ProjectWithReview {
    pub project: Project,
    pub review: Option<Review>,
}

impl ProjectWithReview {
    pub fn is_reviewed(&self) -> bool {
        self.review.is_some()
    }
}
