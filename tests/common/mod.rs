use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request};
use axum::Router;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::PgConnection;
use http_body_util::BodyExt;
use once_cell::sync::Lazy;
use review_backend::analysis::{AnalysisProvider, ProviderError};
use review_backend::auth::jwt::JwtService;
use review_backend::auth::Role;
use review_backend::config::{AnalysisConfig, AppConfig};
use review_backend::db::{self, PgPool};
use review_backend::extraction::samples;
use review_backend::repository::PgRepository;
use review_backend::routes;
use review_backend::state::AppState;
use review_backend::storage::{DocumentStore, ObjectStorage, StorageError};
use serde::Serialize;
use tokio::sync::Mutex;
use tower::util::ServiceExt;
use uuid::Uuid;

pub const PUBLIC_BASE_URL: &str = "https://fake-storage.test/projects-bucket";

pub const FEEDBACK: &str =
    "Viabilidade técnica adequada; o projeto apresenta elemento tecnologicamente novo.";

static DB_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

#[derive(Default)]
pub struct FakeStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn upload_file(
        &self,
        path: &Path,
        key: &str,
        _content_type: &str,
    ) -> Result<(), StorageError> {
        let bytes = tokio::fs::read(path).await?;
        self.objects.lock().await.insert(key.to_string(), bytes);
        Ok(())
    }

    async fn download_file(&self, key: &str, dest: &Path) -> Result<(), StorageError> {
        let bytes = self
            .objects
            .lock()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        tokio::fs::write(dest, bytes).await?;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        self.objects.lock().await.remove(key);
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        Ok(self
            .objects
            .lock()
            .await
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}

impl FakeStorage {
    #[allow(dead_code)]
    pub async fn object_count(&self) -> usize {
        self.objects.lock().await.len()
    }
}

/// Provider double: answers with a fixed feedback or fails as an outage.
pub struct FakeProvider {
    answer: Option<String>,
    calls: AtomicU32,
}

impl FakeProvider {
    pub fn answering(feedback: &str) -> Self {
        Self {
            answer: Some(feedback.to_string()),
            calls: AtomicU32::new(0),
        }
    }

    #[allow(dead_code)]
    pub fn unavailable() -> Self {
        Self {
            answer: None,
            calls: AtomicU32::new(0),
        }
    }

    #[allow(dead_code)]
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalysisProvider for FakeProvider {
    async fn complete(&self, _system: &str, _user: &str) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer
            .clone()
            .ok_or_else(|| ProviderError::Api("HTTP 503 Service Unavailable".to_string()))
    }
}

pub struct TestApp {
    router: Router,
    pool: PgPool,
    jwt: JwtService,
    storage: Arc<FakeStorage>,
    provider: Arc<FakeProvider>,
}

fn test_config(database_url: String) -> AppConfig {
    AppConfig {
        database_url,
        database_max_pool_size: db::DEFAULT_MAX_POOL_SIZE,
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        jwt_secret: "test-secret".to_string(),
        jwt_issuer: "test-issuer".to_string(),
        jwt_audience: "test-audience".to_string(),
        jwt_expiry_minutes: 60,
        cors_allowed_origin: None,
        aws_endpoint_url: None,
        aws_access_key_id: None,
        aws_secret_access_key: None,
        aws_region: "us-east-1".to_string(),
        s3_bucket: "projects-bucket".to_string(),
        storage_public_base_url: PUBLIC_BASE_URL.to_string(),
        analysis: AnalysisConfig {
            api_key: "test-key".to_string(),
            base_url: "http://127.0.0.1:9".to_string(),
            model: "test-model".to_string(),
            max_tokens: 256,
            timeout_secs: 1,
            max_attempts: 3,
            backoff_secs: 0,
        },
        max_document_characters: review_backend::config::DEFAULT_MAX_DOCUMENT_CHARACTERS,
        upload_max_bytes: 5 * 1024 * 1024,
    }
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        Self::with_provider(FakeProvider::answering(FEEDBACK)).await
    }

    pub async fn with_provider(provider: FakeProvider) -> Result<Self> {
        let database_url = env::var("TEST_DATABASE_URL")
            .context("TEST_DATABASE_URL must be set for integration tests")?;
        let config = test_config(database_url);

        let pool = db::init_pool_with_size(&config.database_url, config.database_max_pool_size)?;
        prepare_database(&pool).await?;

        let storage = Arc::new(FakeStorage::default());
        let provider = Arc::new(provider);
        let documents = DocumentStore::new(storage.clone(), PUBLIC_BASE_URL);
        let jwt = JwtService::from_config(&config);

        let state = AppState::new(
            config,
            Arc::new(PgRepository::new(pool.clone())),
            documents,
            provider.clone(),
        );
        let router = routes::create_router(state);

        Ok(Self {
            router,
            pool,
            jwt,
            storage,
            provider,
        })
    }

    pub async fn cleanup(&self) -> Result<()> {
        self.with_conn(|conn| truncate_all(conn)).await
    }

    #[allow(dead_code)]
    pub fn storage(&self) -> Arc<FakeStorage> {
        self.storage.clone()
    }

    /// Direct access to the persistence layer, bypassing the HTTP handlers.
    #[allow(dead_code)]
    pub fn repository(&self) -> PgRepository {
        PgRepository::new(self.pool.clone())
    }

    #[allow(dead_code)]
    pub fn provider(&self) -> Arc<FakeProvider> {
        self.provider.clone()
    }

    pub fn token(&self, role: Role) -> Result<String> {
        self.jwt.generate_token(Uuid::new_v4(), role)
    }

    #[allow(dead_code)]
    pub async fn review_count(&self) -> Result<i64> {
        self.with_conn(|conn| {
            use review_backend::schema::reviews::dsl::reviews;
            reviews
                .count()
                .get_result::<i64>(conn)
                .context("failed to count reviews")
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn project_count(&self) -> Result<i64> {
        self.with_conn(|conn| {
            use review_backend::schema::projects::dsl::projects;
            projects
                .count()
                .get_result::<i64>(conn)
                .context("failed to count projects")
        })
        .await
    }

    #[allow(dead_code)]
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::POST, path, payload, token).await
    }

    #[allow(dead_code)]
    pub async fn patch_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::PATCH, path, payload, token).await
    }

    async fn send_json<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        self.send(builder.body(Body::from(body))?).await
    }

    #[allow(dead_code)]
    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        self.send_empty(Method::GET, path, token).await
    }

    #[allow(dead_code)]
    pub async fn delete(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        self.send_empty(Method::DELETE, path, token).await
    }

    async fn send_empty(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        self.send(builder.body(Body::empty())?).await
    }

    /// Posts a multipart project submission. `fields` are plain text parts;
    /// the document goes under the `file` part when present.
    pub async fn submit_project(
        &self,
        document: Option<(&str, &[u8])>,
        fields: &[(&str, &str)],
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_multipart(Method::POST, "/api/projects", document, fields, token)
            .await
    }

    #[allow(dead_code)]
    pub async fn replace_document(
        &self,
        project_id: Uuid,
        document: Option<(&str, &[u8])>,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let path = format!("/api/projects/{project_id}/document");
        self.send_multipart(Method::PATCH, &path, document, &[], token)
            .await
    }

    async fn send_multipart(
        &self,
        method: Method,
        path: &str,
        document: Option<(&str, &[u8])>,
        fields: &[(&str, &str)],
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let boundary = format!("boundary-{}", Uuid::new_v4());
        let mut body = Vec::new();

        for (name, value) in fields {
            body.extend(format!("--{boundary}\r\n").as_bytes());
            body.extend(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            );
            body.extend(value.as_bytes());
            body.extend(b"\r\n");
        }

        if let Some((filename, data)) = document {
            body.extend(format!("--{boundary}\r\n").as_bytes());
            body.extend(
                format!(
                    "Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n"
                )
                .as_bytes(),
            );
            body.extend(b"Content-Type: application/octet-stream\r\n\r\n");
            body.extend(data);
            body.extend(b"\r\n");
        }

        body.extend(format!("--{boundary}--\r\n").as_bytes());

        let mut builder = Request::builder().method(method).uri(path).header(
            "content-type",
            format!("multipart/form-data; boundary={boundary}"),
        );
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        self.send(builder.body(Body::from(body))?).await
    }

    /// Submits a harmless PDF and returns the new project's id.
    #[allow(dead_code)]
    pub async fn create_project(&self, token: &str) -> Result<Uuid> {
        let pdf = pdf_with_lines(&["Sistema de irrigacao inteligente para pequenos produtores"]);
        let company = Uuid::new_v4().to_string();
        let response = self
            .submit_project(
                Some(("proposta.pdf", pdf.as_slice())),
                &[("title", "Irrigação inteligente"), ("company_id", company.as_str())],
                Some(token),
            )
            .await?;
        let status = response.status();
        let body = body_to_json(response.into_body()).await?;
        anyhow::ensure!(status.is_success(), "submission failed with {status}: {body}");
        body["id"]
            .as_str()
            .and_then(|id| Uuid::parse_str(id).ok())
            .ok_or_else(|| anyhow!("response without project id: {body}"))
    }

    async fn send(&self, request: Request<Body>) -> Result<hyper::Response<Body>> {
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut PgConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|err| anyhow!("failed to get database connection: {err}"))?;
            f(&mut conn)
        })
        .await
        .context("connection task panicked")?
    }
}

pub async fn acquire_db_lock() -> tokio::sync::MutexGuard<'static, ()> {
    DB_LOCK.lock().await
}

pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body
        .collect()
        .await
        .map_err(|err| anyhow!("failed to read response body: {err}"))?;
    Ok(collected.to_bytes().to_vec())
}

pub async fn body_to_json(body: Body) -> Result<serde_json::Value> {
    let bytes = body_to_vec(body).await?;
    serde_json::from_slice(&bytes).context("response body is not JSON")
}

pub fn pdf_with_lines(lines: &[&str]) -> Vec<u8> {
    samples::pdf_document(lines).expect("build sample pdf")
}

#[allow(dead_code)]
pub fn docx_with_paragraphs(paragraphs: &[&str]) -> Vec<u8> {
    samples::docx_document(paragraphs).expect("build sample docx")
}

async fn prepare_database(pool: &PgPool) -> Result<()> {
    let pool = pool.clone();
    tokio::task::spawn_blocking(move || -> Result<()> {
        db::run_migrations(&pool)?;
        let mut conn = pool
            .get()
            .map_err(|err| anyhow!("failed to acquire connection: {err}"))?;
        truncate_all(&mut conn)
    })
    .await
    .context("migration task panicked")?
}

fn truncate_all(conn: &mut PgConnection) -> Result<()> {
    conn.batch_execute("TRUNCATE TABLE reviews, projects RESTART IDENTITY CASCADE;")
        .context("failed to truncate tables")?;
    Ok(())
}
