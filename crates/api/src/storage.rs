//! Object storage for uploaded and imported images.
//!
//! [`AssetStore`] is the seam handlers talk to; [`S3AssetStore`] is the
//! production implementation over any S3-compatible service (MinIO in
//! development, path-style addressing).

use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use colorbook_core::assets::{
    build_asset_key, content_type_for_path, extension_for_content_type, public_url,
    MAX_UPLOAD_BYTES,
};
use serde::Serialize;

use crate::config::StorageConfig;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to download source image: {0}")]
    Download(#[from] reqwest::Error),

    #[error("unsupported content type '{0}'; expected png, jpeg or webp")]
    UnsupportedType(String),

    #[error("asset is {0} bytes, larger than the upload limit")]
    TooLarge(usize),

    #[error("object storage write failed: {0}")]
    Upload(String),
}

/// Where an asset ended up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredAsset {
    pub key: String,
    pub url: String,
    pub content_type: String,
    pub size: usize,
}

/// Write-only view of the object store.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Store `bytes` under `key` and return the public URL.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str)
        -> Result<String, StorageError>;
}

/// Store an image under a fresh key in `folder`.
///
/// `folder` must already be validated.
pub async fn store_image(
    store: &dyn AssetStore,
    folder: &str,
    bytes: Vec<u8>,
    content_type: &str,
) -> Result<StoredAsset, StorageError> {
    let extension = extension_for_content_type(content_type)
        .ok_or_else(|| StorageError::UnsupportedType(content_type.to_string()))?;
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(StorageError::TooLarge(bytes.len()));
    }

    let key = build_asset_key(folder, &uuid::Uuid::new_v4(), extension, chrono::Utc::now());
    let size = bytes.len();
    let url = store.put(&key, bytes, content_type).await?;

    tracing::info!(key = %key, size, "Asset stored");

    Ok(StoredAsset {
        key,
        url,
        content_type: content_type.to_string(),
        size,
    })
}

/// Download a provider-hosted image and keep a copy in our own bucket.
///
/// Generated images live on the provider's CDN only for a limited time.
/// The content type comes from the response header, falling back to the
/// URL's file extension. The body is read chunk by chunk and abandoned as
/// soon as it passes the upload limit, whether or not a length was sent.
pub async fn import_from_url(
    store: &dyn AssetStore,
    client: &reqwest::Client,
    url: &str,
    folder: &str,
) -> Result<StoredAsset, StorageError> {
    let mut response = client.get(url).send().await?.error_for_status()?;

    let header_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .filter(|ct| extension_for_content_type(ct).is_some())
        .map(str::to_string);
    let content_type = match header_type.or_else(|| content_type_for_path(url).map(str::to_string))
    {
        Some(ct) => ct,
        None => return Err(StorageError::UnsupportedType("unknown".into())),
    };

    if let Some(len) = response.content_length() {
        if len > MAX_UPLOAD_BYTES as u64 {
            return Err(StorageError::TooLarge(len as usize));
        }
    }

    let mut bytes = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        let size = bytes.len() + chunk.len();
        if size > MAX_UPLOAD_BYTES {
            return Err(StorageError::TooLarge(size));
        }
        bytes.extend_from_slice(&chunk);
    }

    store_image(store, folder, bytes, &content_type).await
}

// ---------------------------------------------------------------------------
// S3 implementation
// ---------------------------------------------------------------------------

pub struct S3AssetStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    public_base_url: String,
}

impl S3AssetStore {
    pub fn new(config: &StorageConfig) -> Self {
        let credentials = Credentials::new(
            config.access_key.clone(),
            config.secret_key.clone(),
            None,
            None,
            "colorbook-env",
        );
        let s3_config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .endpoint_url(config.endpoint.clone())
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: aws_sdk_s3::Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
            public_base_url: config.public_base_url.clone(),
        }
    }

    /// Create the bucket if it does not exist yet.
    pub async fn ensure_bucket(&self) -> Result<(), StorageError> {
        if self
            .client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .is_ok()
        {
            return Ok(());
        }

        self.client
            .create_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| StorageError::Upload(DisplayErrorContext(&e).to_string()))?;
        tracing::info!(bucket = %self.bucket, "Created storage bucket");
        Ok(())
    }
}

#[async_trait]
impl AssetStore for S3AssetStore {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| StorageError::Upload(DisplayErrorContext(&e).to_string()))?;
        Ok(public_url(&self.public_base_url, key))
    }
}
