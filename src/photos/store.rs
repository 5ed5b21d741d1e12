//! Photo storage backends
//!
//! A stored photo yields the string that goes into the contribution log:
//! a server-relative `/uploads/...` path for the filesystem backend, a
//! public object URL for S3. Keys follow the `{unix-millis}-{name}` scheme
//! so repeated uploads of the same file never collide.

use std::path::PathBuf;

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use chrono::Utc;
use tracing::{debug, info};

use crate::photos::sanitize_file_name;
use crate::types::{JarError, Result};

/// A place uploaded photos can be written to
#[async_trait]
pub trait PhotoStore: Send + Sync + 'static {
    /// Store a photo and return the URL or path it is retrievable at
    async fn store(&self, file_name: &str, content_type: &str, data: Vec<u8>) -> Result<String>;
}

fn storage_key(file_name: &str) -> String {
    format!(
        "{}-{}",
        Utc::now().timestamp_millis(),
        sanitize_file_name(file_name)
    )
}

/// Local-disk backend; files land in one flat directory and are served
/// back under `/uploads/`
pub struct FilesystemStore {
    dir: PathBuf,
}

impl FilesystemStore {
    /// Create the backend, making sure the upload directory exists
    pub async fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| JarError::Storage(format!("cannot create upload dir: {}", e)))?;
        info!("Photo uploads stored under {}", dir.display());
        Ok(Self { dir })
    }

    /// Directory the backend writes into
    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }
}

#[async_trait]
impl PhotoStore for FilesystemStore {
    async fn store(&self, file_name: &str, _content_type: &str, data: Vec<u8>) -> Result<String> {
        let name = storage_key(file_name);
        let path = self.dir.join(&name);

        tokio::fs::write(&path, data)
            .await
            .map_err(|e| JarError::Storage(format!("failed to write {}: {}", path.display(), e)))?;

        debug!(path = %path.display(), "Photo written to disk");
        Ok(format!("/uploads/{}", name))
    }
}

/// S3 (or S3-compatible) backend
pub struct S3Store {
    client: aws_sdk_s3::Client,
    bucket: String,
    public_url: String,
}

/// Connection settings for [`S3Store::new`]
pub struct S3Config {
    pub bucket: String,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub public_url: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

impl S3Store {
    pub async fn new(cfg: S3Config) -> Result<Self> {
        use aws_config::BehaviorVersion;
        use aws_credential_types::Credentials;
        use aws_sdk_s3::config::{Builder as S3ConfigBuilder, Region};

        let region = cfg.region.clone().unwrap_or_else(|| "us-east-1".to_string());

        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.clone()));

        // Explicit credentials from the environment win; otherwise the
        // standard AWS provider chain applies.
        if let (Some(access), Some(secret)) = (&cfg.access_key, &cfg.secret_key) {
            loader = loader.credentials_provider(Credentials::new(
                access.clone(),
                secret.clone(),
                None,
                None,
                "static",
            ));
        }

        let sdk_config = loader.load().await;

        let mut builder = S3ConfigBuilder::from(&sdk_config);
        if let Some(endpoint) = &cfg.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }
        let client = aws_sdk_s3::Client::from_conf(builder.build());

        let public_url = match (&cfg.public_url, &cfg.endpoint) {
            (Some(prefix), _) => prefix.trim_end_matches('/').to_string(),
            (None, Some(endpoint)) => {
                format!("{}/{}", endpoint.trim_end_matches('/'), cfg.bucket)
            }
            (None, None) => format!("https://{}.s3.{}.amazonaws.com", cfg.bucket, region),
        };

        info!(bucket = %cfg.bucket, "S3 photo storage configured");

        Ok(Self {
            client,
            bucket: cfg.bucket,
            public_url,
        })
    }
}

#[async_trait]
impl PhotoStore for S3Store {
    async fn store(&self, file_name: &str, content_type: &str, data: Vec<u8>) -> Result<String> {
        let key = format!("uploads/{}", storage_key(file_name));

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .acl(ObjectCannedAcl::PublicRead)
            .send()
            .await
            .map_err(|e| JarError::Storage(format!("S3 put_object failed: {}", e)))?;

        debug!(key = %key, "Photo uploaded to S3");
        Ok(format!("{}/{}", self.public_url, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_key_scheme() {
        let key = storage_key("my photo.png");
        let (millis, name) = key.split_once('-').unwrap();
        assert!(millis.parse::<i64>().is_ok());
        assert_eq!(name, "my_photo.png");
    }

    #[tokio::test]
    async fn test_filesystem_store_roundtrip() {
        let dir = std::env::temp_dir().join(format!("cookiejar-test-{}", std::process::id()));
        let store = FilesystemStore::new(&dir).await.unwrap();

        let url = store
            .store("cookie.jpg", "image/jpeg", b"jpegbytes".to_vec())
            .await
            .unwrap();
        assert!(url.starts_with("/uploads/"));

        let name = url.strip_prefix("/uploads/").unwrap();
        let on_disk = tokio::fs::read(dir.join(name)).await.unwrap();
        assert_eq!(on_disk, b"jpegbytes");

        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
