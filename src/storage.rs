use std::collections::HashSet;
use std::io;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, error};
use uuid::Uuid;

use crate::error::AppError;
use crate::extraction::DocumentFormat;

pub const STORAGE_SERVICE: &str = "object-storage";

const KEY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("storage provider error: {0}")]
    Provider(String),

    #[error("local file error: {0}")]
    Io(#[from] io::Error),
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Io(err) => AppError::internal(format!("temporary file error: {err}")),
            other => {
                error!(service = STORAGE_SERVICE, error = %other, "object storage failure");
                AppError::external(STORAGE_SERVICE)
            }
        }
    }
}

#[async_trait]
pub trait ObjectStorage: Send + Sync + 'static {
    async fn upload_file(&self, path: &Path, key: &str, content_type: &str)
        -> Result<(), StorageError>;

    async fn download_file(&self, key: &str, dest: &Path) -> Result<(), StorageError>;

    async fn delete_object(&self, key: &str) -> Result<(), StorageError>;

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError>;
}

pub struct S3Storage {
    client: S3Client,
    bucket: String,
}

impl S3Storage {
    pub fn new(client: S3Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

fn classify<E>(key: &str, err: E) -> StorageError
where
    E: ProvideErrorMetadata + std::error::Error,
{
    let detail = format!("{key}: {}", DisplayErrorContext(&err));
    match err.code() {
        Some("NoSuchKey" | "NoSuchBucket" | "NotFound") => StorageError::NotFound(detail),
        Some("AccessDenied" | "Forbidden" | "InvalidAccessKeyId" | "SignatureDoesNotMatch") => {
            StorageError::PermissionDenied(detail)
        }
        _ => StorageError::Provider(detail),
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn upload_file(
        &self,
        path: &Path,
        key: &str,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let body = ByteStream::from_path(path)
            .await
            .map_err(|err| StorageError::Provider(format!("{key}: read upload body: {err}")))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(body)
            .send()
            .await
            .map_err(|err| classify(key, err))?;

        Ok(())
    }

    async fn download_file(&self, key: &str, dest: &Path) -> Result<(), StorageError> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| classify(key, err))?;

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|err| StorageError::Provider(format!("{key}: read object stream: {err}")))?
            .into_bytes();

        tokio::fs::write(dest, &bytes).await?;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| classify(key, err))?;
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        let mut keys = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|err| classify(prefix, err))?;
            keys.extend(
                page.contents()
                    .iter()
                    .filter_map(|object| object.key().map(str::to_string)),
            );
        }

        Ok(keys)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDocument {
    pub key: String,
    pub locator: String,
}

/// Stores accepted documents and resolves their public locators back to bytes.
///
/// Both directions stage the payload in a scoped temporary file, removed when
/// the handle drops on every exit path. Provider failures are not retried.
#[derive(Clone)]
pub struct DocumentStore {
    backend: Arc<dyn ObjectStorage>,
    public_base_url: String,
}

impl DocumentStore {
    pub fn new(backend: Arc<dyn ObjectStorage>, public_base_url: impl Into<String>) -> Self {
        let public_base_url = public_base_url.into().trim_end_matches('/').to_string();
        Self {
            backend,
            public_base_url,
        }
    }

    pub fn backend(&self) -> &Arc<dyn ObjectStorage> {
        &self.backend
    }

    pub async fn store(
        &self,
        bytes: &[u8],
        name: &str,
        format: DocumentFormat,
    ) -> Result<StoredDocument, StorageError> {
        let key = object_key(Uuid::new_v4(), name, format);
        let content_type = mime_guess::from_path(&key).first_or_octet_stream();

        let staged = NamedTempFile::new()?;
        tokio::fs::write(staged.path(), bytes).await?;
        self.backend
            .upload_file(staged.path(), &key, content_type.essence_str())
            .await?;
        debug!(%key, size = bytes.len(), "stored document");

        let locator = self.locator_for(&key);
        Ok(StoredDocument { key, locator })
    }

    pub async fn fetch(&self, locator: &str) -> Result<Vec<u8>, StorageError> {
        let key = self
            .key_for(locator)
            .ok_or_else(|| StorageError::NotFound(format!("unrecognised locator {locator}")))?;

        let staged = NamedTempFile::new()?;
        self.backend.download_file(&key, staged.path()).await?;
        let bytes = tokio::fs::read(staged.path()).await?;
        Ok(bytes)
    }

    pub async fn delete(&self, locator: &str) -> Result<(), StorageError> {
        let key = self
            .key_for(locator)
            .ok_or_else(|| StorageError::NotFound(format!("unrecognised locator {locator}")))?;
        self.backend.delete_object(&key).await
    }

    pub fn locator_for(&self, key: &str) -> String {
        format!(
            "{}/{}",
            self.public_base_url,
            utf8_percent_encode(key, KEY_ENCODE_SET)
        )
    }

    pub fn key_for(&self, locator: &str) -> Option<String> {
        let encoded = locator
            .strip_prefix(&self.public_base_url)?
            .strip_prefix('/')?;
        let key = percent_decode_str(encoded).decode_utf8().ok()?;
        (!key.is_empty()).then(|| key.into_owned())
    }
}

pub const PROJECT_PREFIX: &str = "projects/";

pub const MAX_STEM_CHARS: usize = 100;

/// `projects/<id>/<stem>.<ext>`, where the suffix always names the validated
/// format so the stored object resolves back to it.
pub fn object_key(id: Uuid, filename: &str, format: DocumentFormat) -> String {
    format!(
        "{PROJECT_PREFIX}{id}/{}.{}",
        filename_stem(filename),
        format.extension()
    )
}

/// Final path segment without its document extension, cut to
/// `MAX_STEM_CHARS` and with anything outside a conservative character set
/// replaced by `_`.
pub fn filename_stem(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    let base = match base.rsplit_once('.') {
        Some((stem, extension)) if DocumentFormat::from_extension(extension).is_some() => stem,
        _ => base,
    };

    let cleaned: String = base
        .chars()
        .take(MAX_STEM_CHARS)
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() {
        "document".to_string()
    } else {
        cleaned
    }
}

/// Stored keys that no project row references, in listing order.
pub fn orphaned_keys(stored: Vec<String>, referenced: &HashSet<String>) -> Vec<String> {
    stored
        .into_iter()
        .filter(|key| !referenced.contains(key))
        .collect()
}

/// Filename suffix of a locator, used to re-derive the document format.
pub fn locator_filename(locator: &str) -> Option<String> {
    let path = locator.split(['?', '#']).next()?;
    let last = path.rsplit('/').next()?;
    let decoded = percent_decode_str(last).decode_utf8().ok()?;
    (!decoded.is_empty()).then(|| decoded.into_owned())
}
