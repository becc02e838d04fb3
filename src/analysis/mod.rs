//! AI-assisted project analysis.
//!
//! The orchestrator re-reads a project's stored document, re-extracts its text
//! independently of the upload-time validation, and asks the analysis provider
//! for qualitative feedback under a bounded retry policy.

pub mod openai;
pub mod retry;

use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::task;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::extraction::DocumentFormat;
use crate::models::Project;
use crate::repository::Repository;
use crate::storage::{self, DocumentStore};
use crate::validator::{self, FILE_FIELD};

pub use openai::OpenAiProvider;
pub use retry::RetryPolicy;

pub const ANALYSIS_SERVICE: &str = "analysis-provider";

pub const SYSTEM_INSTRUCTION: &str =
    "Você é um avaliador especializado em projetos de inovação tecnológica. \
     Responda em português com uma análise qualitativa estruturada por tópico.";

pub const EVALUATION_CHECKLIST: &[&str] = &[
    "Viabilidade técnica",
    "Potencial de inovação",
    "Impacto no mercado",
    "Sustentabilidade do projeto",
    "Escalabilidade",
    "Riscos técnicos e de execução",
    "Enquadramento na Lei do Bem (Lei nº 11.196/2005)",
    "Classificação da atividade: pesquisa básica, pesquisa aplicada ou desenvolvimento experimental (Manual de Frascati)",
    "Elemento tecnologicamente novo ou inovador e barreira ou risco tecnológico superado",
];

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("analysis provider request failed: {0}")]
    Api(String),

    #[error("analysis provider returned an invalid response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Api(_))
    }
}

#[async_trait]
pub trait AnalysisProvider: Send + Sync + 'static {
    async fn complete(&self, system: &str, user: &str) -> Result<String, ProviderError>;
}

pub fn build_prompt(project_text: &str) -> String {
    let checklist = EVALUATION_CHECKLIST
        .iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!("Texto do projeto para análise:\n\n{project_text}\n\nPontos a serem analisados:\n{checklist}")
}

pub fn checksum(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[derive(Clone)]
pub struct ReviewOrchestrator {
    repository: Arc<dyn Repository>,
    documents: DocumentStore,
    provider: Arc<dyn AnalysisProvider>,
    retry: RetryPolicy,
}

impl ReviewOrchestrator {
    pub fn new(
        repository: Arc<dyn Repository>,
        documents: DocumentStore,
        provider: Arc<dyn AnalysisProvider>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            repository,
            documents,
            provider,
            retry,
        }
    }

    pub async fn obtain_project_text(&self, project_id: Uuid) -> AppResult<String> {
        let found = self
            .repository
            .find_project(project_id)
            .await?
            .ok_or_else(|| {
                warn!(%project_id, "project not found for analysis");
                AppError::not_found("project")
            })?;

        self.document_text(&found.project).await
    }

    /// Fetches the stored document and extracts its text from scratch.
    pub async fn document_text(&self, project: &Project) -> AppResult<String> {
        let bytes = self.documents.fetch(&project.file_locator).await?;

        let current = checksum(&bytes);
        if current != project.document_checksum {
            warn!(
                project_id = %project.id,
                stored = %project.document_checksum,
                current = %current,
                "stored document changed since upload"
            );
        }

        let format = storage::locator_filename(&project.file_locator)
            .as_deref()
            .and_then(DocumentFormat::from_filename)
            .ok_or_else(|| {
                AppError::validation(FILE_FIELD, "unsupported file type for analysis")
            })?;

        task::spawn_blocking(move || validator::extract_text(&bytes, format)).await?
    }

    pub async fn analyze(&self, project_text: &str) -> AppResult<String> {
        let prompt = build_prompt(project_text);
        let provider = &self.provider;
        let prompt = prompt.as_str();

        match self
            .retry
            .run(move |_| provider.complete(SYSTEM_INSTRUCTION, prompt))
            .await
        {
            Ok(feedback) => {
                info!(characters = feedback.chars().count(), "analysis completed");
                Ok(feedback)
            }
            Err(err @ ProviderError::Api(_)) => {
                error!(
                    service = ANALYSIS_SERVICE,
                    attempts = self.retry.max_attempts,
                    error = %err,
                    "analysis provider unavailable after retries"
                );
                Err(AppError::external(ANALYSIS_SERVICE))
            }
            Err(err) => {
                error!(service = ANALYSIS_SERVICE, error = %err, "unexpected analysis response");
                Err(AppError::internal(err))
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod scripted {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::{AnalysisProvider, ProviderError};

    pub enum Script {
        Answer(&'static str),
        Unavailable,
        Malformed,
    }

    pub struct ScriptedProvider {
        script: Script,
        calls: AtomicU32,
        pub last_prompt: Mutex<Option<String>>,
    }

    impl ScriptedProvider {
        pub fn new(script: Script) -> Self {
            Self {
                script,
                calls: AtomicU32::new(0),
                last_prompt: Mutex::new(None),
            }
        }

        pub fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AnalysisProvider for ScriptedProvider {
        async fn complete(&self, _system: &str, user: &str) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_prompt.lock().unwrap() = Some(user.to_string());
            match self.script {
                Script::Answer(feedback) => Ok(feedback.to_string()),
                Script::Unavailable => Err(ProviderError::Api("HTTP 503".into())),
                Script::Malformed => Err(ProviderError::InvalidResponse("no choices".into())),
            }
        }
    }
}
