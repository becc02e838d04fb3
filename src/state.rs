use std::sync::Arc;

use crate::{
    analysis::{AnalysisProvider, RetryPolicy, ReviewOrchestrator},
    auth::jwt::JwtService,
    config::AppConfig,
    projects::ProjectService,
    repository::Repository,
    reviews::ReviewService,
    storage::DocumentStore,
    validator::DocumentValidator,
};

/// Process-wide services, built once before serving and shared by handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub jwt: JwtService,
    pub projects: ProjectService,
    pub reviews: ReviewService,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        repository: Arc<dyn Repository>,
        documents: DocumentStore,
        provider: Arc<dyn AnalysisProvider>,
    ) -> Self {
        let jwt = JwtService::from_config(&config);
        let validator = DocumentValidator::new(config.max_document_characters);
        let retry = RetryPolicy::from_config(&config.analysis);

        let projects = ProjectService::new(repository.clone(), documents.clone(), validator);
        let orchestrator =
            ReviewOrchestrator::new(repository.clone(), documents, provider, retry);
        let reviews = ReviewService::new(repository, orchestrator);

        Self {
            config: Arc::new(config),
            jwt,
            projects,
            reviews,
        }
    }
}
