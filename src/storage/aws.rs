//! AWS S3 object store.
//!
//! Videos are written with `PutObject` straight from the staged file and
//! read back by clients through SigV4 presigned `GetObject` URLs.
//!
//! Credentials are resolved via the standard AWS credential chain
//! (env vars, `~/.aws/credentials`, IAM role, etc.) unless explicit keys
//! are configured.

use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::{ByteStream, Length};
use aws_sdk_s3::Client;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, info};

use super::backend::{ObjectBody, ObjectStore};
use crate::config::AwsStorageConfig;

/// Object store that talks to S3 (or an S3-compatible endpoint).
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    /// Build the SDK client from configuration.
    pub async fn new(cfg: &AwsStorageConfig) -> anyhow::Result<Self> {
        let mut config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(cfg.region.clone()));

        if !cfg.endpoint_url.is_empty() {
            config_loader = config_loader.endpoint_url(&cfg.endpoint_url);
        }

        if !cfg.access_key_id.is_empty() && !cfg.secret_access_key.is_empty() {
            let creds = aws_sdk_s3::config::Credentials::new(
                &cfg.access_key_id,
                &cfg.secret_access_key,
                None, // session_token
                None, // expiry
                "tubely-config",
            );
            config_loader = config_loader.credentials_provider(creds);
        }

        let sdk_config = config_loader.load().await;

        let mut s3_config_builder =
            aws_sdk_s3::config::Builder::from(&sdk_config).force_path_style(cfg.use_path_style);

        if cfg.operation_timeout_secs > 0 {
            s3_config_builder = s3_config_builder.timeout_config(
                TimeoutConfig::builder()
                    .operation_timeout(Duration::from_secs(cfg.operation_timeout_secs))
                    .build(),
            );
        }

        info!(
            region = %cfg.region,
            endpoint = %cfg.endpoint_url,
            path_style = cfg.use_path_style,
            "S3 object store initialized"
        );

        Ok(Self::from_client(Client::from_conf(s3_config_builder.build())))
    }

    /// Wrap an already configured client.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// Map an AWS SDK error to an anyhow error with context.
    fn map_sdk_error(context: &str, err: impl std::fmt::Display) -> anyhow::Error {
        anyhow::anyhow!("AWS S3 {context}: {err}")
    }
}

impl ObjectStore for S3ObjectStore {
    fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: ObjectBody,
        content_type: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        let bucket = bucket.to_string();
        let key = key.to_string();
        let content_type = content_type.to_string();
        Box::pin(async move {
            let len = body.len();
            let stream = match body {
                ObjectBody::Bytes(data) => ByteStream::from(data),
                ObjectBody::File { file, len } => ByteStream::read_from()
                    .file(file)
                    .length(Length::Exact(len))
                    .build()
                    .await
                    .map_err(|e| Self::map_sdk_error("read staged file", e))?,
            };

            debug!(bucket = %bucket, key = %key, size = len, "AWS put_object");

            self.client
                .put_object()
                .bucket(&bucket)
                .key(&key)
                .content_type(&content_type)
                .content_length(len as i64)
                .body(stream)
                .send()
                .await
                .map_err(|e| Self::map_sdk_error("put_object", e))?;

            Ok(())
        })
    }

    fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + '_>> {
        let bucket = bucket.to_string();
        let key = key.to_string();
        Box::pin(async move {
            let presigning_config = PresigningConfig::expires_in(ttl)
                .map_err(|e| Self::map_sdk_error("presigning config", e))?;

            let request = self
                .client
                .get_object()
                .bucket(&bucket)
                .key(&key)
                .presigned(presigning_config)
                .await
                .map_err(|e| Self::map_sdk_error("presign get_object", e))?;

            Ok(request.uri().to_string())
        })
    }
}
