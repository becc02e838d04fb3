//! Persistence boundary for projects and reviews.
//!
//! Every read returns fully loaded plain structs; a project is always fetched
//! together with its review so callers never trigger hidden queries.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tokio::task;
use uuid::Uuid;

use crate::db::PgPool;
use crate::error::{AppError, AppResult};
use crate::models::{
    NewProject, NewReview, Project, ProjectStatus, ProjectWithReview, Review, ReviewChangeset,
};
use crate::schema::{projects, reviews};

pub const ALREADY_REVIEWED: &str = "project already reviewed";

#[async_trait]
pub trait Repository: Send + Sync + 'static {
    async fn find_project(&self, id: Uuid) -> AppResult<Option<ProjectWithReview>>;

    async fn insert_project(&self, project: NewProject) -> AppResult<Project>;

    async fn update_project_status(
        &self,
        id: Uuid,
        status: ProjectStatus,
    ) -> AppResult<Option<Project>>;

    /// Points the project at a new stored document. Returns `None` when the
    /// project does not exist.
    async fn replace_document(
        &self,
        id: Uuid,
        file_locator: String,
        document_checksum: String,
    ) -> AppResult<Option<Project>>;

    async fn find_review(&self, id: Uuid) -> AppResult<Option<Review>>;

    /// Fails with `Conflict` when the project already owns a review; the
    /// unique index on `reviews.project_id` is the authority for this.
    async fn insert_review(&self, review: NewReview) -> AppResult<Review>;

    async fn update_review(&self, id: Uuid, changes: ReviewChangeset)
        -> AppResult<Option<Review>>;

    async fn delete_review(&self, id: Uuid) -> AppResult<bool>;

    async fn list_file_locators(&self) -> AppResult<Vec<String>>;
}

#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn run<T, F>(&self, query: F) -> AppResult<T>
    where
        F: FnOnce(&mut PgConnection) -> AppResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|err| AppError::internal(format!("database pool error: {err}")))?;
            query(&mut conn)
        })
        .await?
    }
}

#[async_trait]
impl Repository for PgRepository {
    async fn find_project(&self, id: Uuid) -> AppResult<Option<ProjectWithReview>> {
        self.run(move |conn| {
            let project = projects::table
                .find(id)
                .select(Project::as_select())
                .first(conn)
                .optional()?;

            let Some(project) = project else {
                return Ok(None);
            };

            let review = Review::belonging_to(&project)
                .select(Review::as_select())
                .first(conn)
                .optional()?;

            Ok(Some(ProjectWithReview { project, review }))
        })
        .await
    }

    async fn insert_project(&self, project: NewProject) -> AppResult<Project> {
        self.run(move |conn| {
            let inserted = diesel::insert_into(projects::table)
                .values(&project)
                .returning(Project::as_returning())
                .get_result(conn)?;
            Ok(inserted)
        })
        .await
    }

    async fn update_project_status(
        &self,
        id: Uuid,
        status: ProjectStatus,
    ) -> AppResult<Option<Project>> {
        self.run(move |conn| {
            let updated = diesel::update(projects::table.find(id))
                .set(projects::status.eq(status.as_str()))
                .returning(Project::as_returning())
                .get_result(conn)
                .optional()?;
            Ok(updated)
        })
        .await
    }

    async fn replace_document(
        &self,
        id: Uuid,
        file_locator: String,
        document_checksum: String,
    ) -> AppResult<Option<Project>> {
        self.run(move |conn| {
            let updated = diesel::update(projects::table.find(id))
                .set((
                    projects::file_locator.eq(file_locator),
                    projects::document_checksum.eq(document_checksum),
                ))
                .returning(Project::as_returning())
                .get_result(conn)
                .optional()?;
            Ok(updated)
        })
        .await
    }

    async fn find_review(&self, id: Uuid) -> AppResult<Option<Review>> {
        self.run(move |conn| {
            let review = reviews::table
                .find(id)
                .select(Review::as_select())
                .first(conn)
                .optional()?;
            Ok(review)
        })
        .await
    }

    async fn insert_review(&self, review: NewReview) -> AppResult<Review> {
        self.run(move |conn| {
            let result = diesel::insert_into(reviews::table)
                .values(&review)
                .returning(Review::as_returning())
                .get_result(conn);

            match result {
                Ok(inserted) => Ok(inserted),
                Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
                    Err(AppError::conflict("project", ALREADY_REVIEWED))
                }
                Err(DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _)) => {
                    Err(AppError::not_found("project"))
                }
                Err(err) => Err(err.into()),
            }
        })
        .await
    }

    async fn update_review(
        &self,
        id: Uuid,
        changes: ReviewChangeset,
    ) -> AppResult<Option<Review>> {
        self.run(move |conn| {
            let updated = diesel::update(reviews::table.find(id))
                .set(&changes)
                .returning(Review::as_returning())
                .get_result(conn)
                .optional()?;
            Ok(updated)
        })
        .await
    }

    async fn delete_review(&self, id: Uuid) -> AppResult<bool> {
        self.run(move |conn| {
            let removed = diesel::delete(reviews::table.find(id)).execute(conn)?;
            Ok(removed > 0)
        })
        .await
    }

    async fn list_file_locators(&self) -> AppResult<Vec<String>> {
        self.run(|conn| {
            let locators = projects::table
                .select(projects::file_locator)
                .load::<String>(conn)?;
            Ok(locators)
        })
        .await
    }
}
