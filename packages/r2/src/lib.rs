#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Cloudflare R2 object store access for the bulk image uploader.
//!
//! Exposes the operations the uploader needs through the [`ObjectStore`]
//! trait: a bucket access check (`HeadBucket`), a metadata-only existence
//! probe (`HeadObject`) and a single-shot put (`PutObject`). [`R2Client`]
//! implements the trait against R2's S3-compatible API.
//!
//! # Environment Variables
//!
//! | Variable | Required | Description |
//! |---|---|---|
//! | `R2_ENDPOINT` | One of these | Full endpoint URL (e.g. `https://xxx.r2.cloudflarestorage.com`) |
//! | `CLOUDFLARE_ACCOUNT_ID` | One of these | Cloudflare account ID (builds the R2 endpoint) |
//! | `R2_ACCESS_KEY_ID` | Yes | S3-compatible access key for R2 |
//! | `R2_SECRET_ACCESS_KEY` | Yes | S3-compatible secret key for R2 |
//! | `R2_BUCKET_NAME` | Yes | Target bucket |

use aws_config::Region;
use aws_sdk_s3::config::{Credentials, StalledStreamProtectionConfig};

/// Errors that can occur during R2 operations.
#[derive(Debug, thiserror::Error)]
pub enum R2Error {
    /// Missing required environment variable.
    #[error("Missing environment variable: {name}")]
    MissingEnv {
        /// Name of the missing environment variable.
        name: String,
    },

    /// The bucket is missing or the credentials cannot reach it.
    #[error("Cannot access bucket {bucket}: {source}")]
    Bucket {
        /// Bucket name.
        bucket: String,
        /// Underlying SDK error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// S3 `HeadObject` failed for a reason other than `NotFound`.
    #[error("Failed to head s3://{bucket}/{key}: {source}")]
    Head {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
        /// Underlying SDK error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// S3 `PutObject` failed.
    #[error("Failed to upload s3://{bucket}/{key}: {source}")]
    Upload {
        /// Bucket name.
        bucket: String,
        /// Object key.
        key: String,
        /// Underlying SDK error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// The remote operations the uploader consumes.
///
/// Implementations are shared read-only across every concurrent task in a
/// group, so they must be `Send + Sync`.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Verifies that the target bucket exists and is reachable with the
    /// configured credentials.
    ///
    /// # Errors
    ///
    /// Returns [`R2Error::Bucket`] if the bucket cannot be accessed.
    async fn check_bucket(&self) -> Result<(), R2Error>;

    /// Returns whether an object exists at `key`.
    ///
    /// A `NotFound` response is `Ok(false)`, not an error.
    ///
    /// # Errors
    ///
    /// Returns [`R2Error::Head`] if the probe fails for any other reason.
    async fn exists(&self, key: &str) -> Result<bool, R2Error>;

    /// Puts `body` at `key` with the given content type.
    ///
    /// # Errors
    ///
    /// Returns [`R2Error::Upload`] if the put fails.
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), R2Error>;
}

/// Connection settings for an R2 bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct R2Settings {
    /// S3-compatible endpoint URL.
    pub endpoint: String,
    /// Access key ID.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_access_key: String,
    /// Target bucket name.
    pub bucket: String,
}

impl R2Settings {
    /// Reads settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`R2Error::MissingEnv`] if any required variable is unset.
    pub fn from_env() -> Result<Self, R2Error> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads settings through `lookup`, which maps a variable name to its
    /// value.
    ///
    /// `R2_ENDPOINT` wins over `CLOUDFLARE_ACCOUNT_ID` when both are set.
    ///
    /// # Errors
    ///
    /// Returns [`R2Error::MissingEnv`] if any required variable is missing
    /// or empty.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, R2Error> {
        let require = |name: &str| {
            lookup(name)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| R2Error::MissingEnv {
                    name: name.to_string(),
                })
        };

        let endpoint = match require("R2_ENDPOINT") {
            Ok(endpoint) => endpoint,
            Err(_) => {
                let account_id = require("CLOUDFLARE_ACCOUNT_ID").map_err(|_| {
                    R2Error::MissingEnv {
                        name: "R2_ENDPOINT or CLOUDFLARE_ACCOUNT_ID".to_string(),
                    }
                })?;
                format!("https://{account_id}.r2.cloudflarestorage.com")
            }
        };

        Ok(Self {
            endpoint,
            access_key_id: require("R2_ACCESS_KEY_ID")?,
            secret_access_key: require("R2_SECRET_ACCESS_KEY")?,
            bucket: require("R2_BUCKET_NAME")?,
        })
    }
}

/// [`ObjectStore`] backed by a Cloudflare R2 bucket.
pub struct R2Client {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl R2Client {
    /// Creates a new R2 client from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`R2Error::MissingEnv`] if any required variable is unset.
    pub fn from_env() -> Result<Self, R2Error> {
        Ok(Self::new(R2Settings::from_env()?))
    }

    /// Creates a client for the given settings.
    #[must_use]
    pub fn new(settings: R2Settings) -> Self {
        let creds = Credentials::new(
            &settings.access_key_id,
            &settings.secret_access_key,
            None,
            None,
            "r2-env",
        );

        let config = aws_sdk_s3::Config::builder()
            .endpoint_url(&settings.endpoint)
            .region(Region::new("auto"))
            .credentials_provider(creds)
            .force_path_style(true)
            .stalled_stream_protection(StalledStreamProtectionConfig::disabled())
            .build();

        Self {
            client: aws_sdk_s3::Client::from_conf(config),
            bucket: settings.bucket,
        }
    }

    /// Bucket this client writes to.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait::async_trait]
impl ObjectStore for R2Client {
    async fn check_bucket(&self) -> Result<(), R2Error> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| R2Error::Bucket {
                bucket: self.bucket.clone(),
                source: Box::new(e),
            })?;

        log::info!("Connected to bucket: {}", self.bucket);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, R2Error> {
        let result = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(err) => {
                let service_err = err.as_service_error();
                if service_err
                    .is_some_and(aws_sdk_s3::operation::head_object::HeadObjectError::is_not_found)
                {
                    return Ok(false);
                }
                Err(R2Error::Head {
                    bucket: self.bucket.clone(),
                    key: key.to_string(),
                    source: Box::new(err),
                })
            }
        }
    }

    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), R2Error> {
        let size = body.len();
        log::debug!("Pushing {size} bytes -> s3://{}/{key}", self.bucket);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(aws_sdk_s3::primitives::ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| R2Error::Upload {
                bucket: self.bucket.clone(),
                key: key.to_string(),
                source: Box::new(e),
            })?;

        Ok(())
    }
}
