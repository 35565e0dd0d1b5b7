//! Configuration loading and types for Tubely.
//!
//! Configuration is read from a YAML file and deserialized into the
//! [`Config`] struct.  A handful of deployment secrets may be overridden
//! from the environment, after which the whole value is validated once and
//! shared read-only for the lifetime of the process.

use garde::Validate;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    #[garde(dive)]
    pub server: ServerConfig,

    /// Bearer token verification settings.
    #[serde(default)]
    #[garde(dive)]
    pub auth: AuthConfig,

    /// Video metadata store settings.
    #[serde(default)]
    #[garde(dive)]
    pub metadata: MetadataConfig,

    /// Remote object store settings (video files).
    #[serde(default)]
    #[garde(dive)]
    pub storage: StorageConfig,

    /// Upload limits and staging.
    #[serde(default)]
    #[garde(dive)]
    pub uploads: UploadsConfig,

    /// Thumbnail storage strategy.
    #[serde(default)]
    #[garde(dive)]
    pub thumbnails: ThumbnailsConfig,

    /// External media probing.
    #[serde(default)]
    #[garde(dive)]
    pub media: MediaConfig,

    /// Logging settings.
    #[serde(default)]
    #[garde(dive)]
    pub logging: LoggingConfig,

    /// Observability settings (metrics endpoint).
    #[serde(default)]
    #[garde(skip)]
    pub observability: ObservabilityConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            metadata: MetadataConfig::default(),
            storage: StorageConfig::default(),
            uploads: UploadsConfig::default(),
            thumbnails: ThumbnailsConfig::default(),
            media: MediaConfig::default(),
            logging: LoggingConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ServerConfig {
    /// Bind host address.
    #[serde(default = "default_host")]
    #[garde(length(min = 1))]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    #[garde(range(min = 1))]
    pub port: u16,

    /// Graceful shutdown timeout in seconds.
    #[serde(default = "default_shutdown_timeout")]
    #[garde(skip)]
    pub shutdown_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    #[garde(length(min = 1))]
    pub level: String,

    /// Log format: text or json.
    #[serde(default = "default_log_format")]
    #[garde(pattern(r"^(text|json)$"))]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Observability settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    /// Enable Prometheus metrics collection and the `/metrics` endpoint.
    #[serde(default = "default_true")]
    pub metrics: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self { metrics: true }
    }
}

/// Bearer token settings.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AuthConfig {
    /// HMAC secret used to verify HS256 access tokens.
    #[serde(default)]
    #[garde(length(min = 16))]
    pub jwt_secret: String,

    /// Expected `iss` claim.
    #[serde(default = "default_token_issuer")]
    #[garde(length(min = 1))]
    pub issuer: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            issuer: default_token_issuer(),
        }
    }
}

/// Metadata store configuration.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MetadataConfig {
    /// Backend type: `sqlite` or `memory`.
    #[serde(default = "default_metadata_engine")]
    #[garde(pattern(r"^(sqlite|memory)$"))]
    pub engine: String,

    /// SQLite-specific configuration.
    #[serde(default)]
    #[garde(dive)]
    pub sqlite: SqliteConfig,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            engine: default_metadata_engine(),
            sqlite: SqliteConfig::default(),
        }
    }
}

/// SQLite-specific metadata configuration.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SqliteConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_metadata_path")]
    #[garde(length(min = 1))]
    pub path: String,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: default_metadata_path(),
        }
    }
}

/// Remote object store configuration.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct StorageConfig {
    /// Backend type: `aws` or `memory`.
    #[serde(default = "default_storage_backend")]
    #[garde(pattern(r"^(aws|memory)$"))]
    pub backend: String,

    /// Bucket that receives uploaded videos.
    #[serde(default = "default_video_bucket")]
    #[garde(length(min = 1), pattern(r"^[^,]+$"))]
    pub bucket: String,

    /// Lifetime of presigned playback URLs, in seconds.
    #[serde(default = "default_signed_url_ttl")]
    #[garde(range(min = 1, max = 604800))]
    pub signed_url_ttl_secs: u64,

    /// AWS S3 client configuration.
    #[serde(default)]
    #[garde(dive)]
    pub aws: AwsStorageConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            bucket: default_video_bucket(),
            signed_url_ttl_secs: default_signed_url_ttl(),
            aws: AwsStorageConfig::default(),
        }
    }
}

/// AWS S3 client configuration.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AwsStorageConfig {
    /// AWS region.
    #[serde(default = "default_region")]
    #[garde(length(min = 1))]
    pub region: String,
    /// Custom S3-compatible endpoint (e.g. MinIO, LocalStack).
    #[serde(default)]
    #[garde(skip)]
    pub endpoint_url: String,
    /// Force path-style URL addressing.
    #[serde(default)]
    #[garde(skip)]
    pub use_path_style: bool,
    /// Explicit AWS access key (falls back to env/credential chain).
    #[serde(default)]
    #[garde(skip)]
    pub access_key_id: String,
    /// Explicit AWS secret key (falls back to env/credential chain).
    #[serde(default)]
    #[garde(skip)]
    pub secret_access_key: String,
    /// Per-operation timeout in seconds (0 = SDK default, no timeout).
    #[serde(default)]
    #[garde(skip)]
    pub operation_timeout_secs: u64,
}

impl Default for AwsStorageConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            endpoint_url: String::new(),
            use_path_style: false,
            access_key_id: String::new(),
            secret_access_key: String::new(),
            operation_timeout_secs: 0,
        }
    }
}

/// Upload limits and staging.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UploadsConfig {
    /// Maximum request body for a video upload (default 1 GiB).
    #[serde(default = "default_max_video_bytes")]
    #[garde(range(min = 1))]
    pub max_video_bytes: usize,

    /// Maximum request body for a thumbnail upload (default 10 MiB).
    #[serde(default = "default_max_thumbnail_bytes")]
    #[garde(range(min = 1))]
    pub max_thumbnail_bytes: usize,

    /// Directory for staged video files. Defaults to the system temp dir.
    #[serde(default)]
    #[garde(skip)]
    pub staging_dir: Option<PathBuf>,
}

impl UploadsConfig {
    /// Resolve the staging directory.
    pub fn staging_dir(&self) -> PathBuf {
        self.staging_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            max_video_bytes: default_max_video_bytes(),
            max_thumbnail_bytes: default_max_thumbnail_bytes(),
            staging_dir: None,
        }
    }
}

/// Thumbnail storage configuration.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ThumbnailsConfig {
    /// Strategy: `local_disk`, `remote_object`, or `inline_data`.
    #[serde(default = "default_thumbnail_strategy")]
    #[garde(pattern(r"^(local_disk|remote_object|inline_data)$"))]
    pub strategy: String,

    /// File naming for `local_disk`: `random` or `video_id`.
    #[serde(default = "default_thumbnail_naming")]
    #[garde(pattern(r"^(random|video_id)$"))]
    pub naming: String,

    /// Directory served at `/assets` for `local_disk`.
    #[serde(default = "default_assets_root")]
    #[garde(length(min = 1))]
    pub assets_root: String,

    /// Public URL prefix prepended to stored thumbnail names.
    #[serde(default = "default_assets_base_url")]
    #[garde(length(min = 1))]
    pub public_base_url: String,

    /// Bucket for `remote_object` thumbnails.
    #[serde(default = "default_video_bucket")]
    #[garde(length(min = 1))]
    pub bucket: String,

    /// Largest payload accepted by `inline_data` (default 512 KiB).
    #[serde(default = "default_max_inline_bytes")]
    #[garde(range(min = 1))]
    pub max_inline_bytes: usize,
}

impl Default for ThumbnailsConfig {
    fn default() -> Self {
        Self {
            strategy: default_thumbnail_strategy(),
            naming: default_thumbnail_naming(),
            assets_root: default_assets_root(),
            public_base_url: default_assets_base_url(),
            bucket: default_video_bucket(),
            max_inline_bytes: default_max_inline_bytes(),
        }
    }
}

/// Media probing configuration.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct MediaConfig {
    /// Probe uploaded videos and file them under an aspect-ratio prefix.
    #[serde(default = "default_true")]
    #[garde(skip)]
    pub classify_aspect_ratio: bool,

    /// Probe executable (looked up on `PATH` unless absolute).
    #[serde(default = "default_ffprobe")]
    #[garde(length(min = 1))]
    pub ffprobe_path: String,

    /// Upper bound on a single probe run, in seconds.
    #[serde(default = "default_probe_timeout")]
    #[garde(range(min = 1))]
    pub probe_timeout_secs: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            classify_aspect_ratio: true,
            ffprobe_path: default_ffprobe(),
            probe_timeout_secs: default_probe_timeout(),
        }
    }
}

// -- Defaults ----------------------------------------------------------------

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8091
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_token_issuer() -> String {
    "tubely-access".to_string()
}

fn default_metadata_engine() -> String {
    "sqlite".to_string()
}

fn default_metadata_path() -> String {
    "./data/tubely.db".to_string()
}

fn default_storage_backend() -> String {
    "aws".to_string()
}

fn default_video_bucket() -> String {
    "tubely-videos".to_string()
}

fn default_signed_url_ttl() -> u64 {
    3600
}

fn default_max_video_bytes() -> usize {
    1 << 30 // 1 GiB
}

fn default_max_thumbnail_bytes() -> usize {
    10 << 20 // 10 MiB
}

fn default_thumbnail_strategy() -> String {
    "local_disk".to_string()
}

fn default_thumbnail_naming() -> String {
    "random".to_string()
}

fn default_assets_root() -> String {
    "./assets".to_string()
}

fn default_assets_base_url() -> String {
    format!("http://localhost:{}/assets", default_port())
}

fn default_max_inline_bytes() -> usize {
    512 << 10 // 512 KiB
}

fn default_ffprobe() -> String {
    "ffprobe".to_string()
}

fn default_probe_timeout() -> u64 {
    30
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

// -- Loader ------------------------------------------------------------------

/// Load, override from the environment, and validate the configuration at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    let mut config: Config = serde_yaml::from_str(&contents)?;
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    config
        .validate()
        .map_err(|report| anyhow::anyhow!("invalid configuration: {report}"))?;
    Ok(config)
}

/// Apply deployment overrides. `lookup` is injected so tests need not touch
/// the process environment.
fn apply_env_overrides(
    config: &mut Config,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<()> {
    if let Some(secret) = lookup("JWT_SECRET") {
        config.auth.jwt_secret = secret;
    }
    if let Some(bucket) = lookup("S3_BUCKET") {
        config.storage.bucket = bucket;
    }
    if let Some(region) = lookup("S3_REGION") {
        config.storage.aws.region = region;
    }
    if let Some(root) = lookup("ASSETS_ROOT") {
        config.thumbnails.assets_root = root;
    }
    if let Some(port) = lookup("PORT") {
        config.server.port = port
            .parse()
            .map_err(|e| anyhow::anyhow!("PORT must be a port number: {e}"))?;
    }
    Ok(())
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_sections() {
        let config: Config = serde_yaml::from_str("auth:\n  jwt_secret: a-very-long-test-secret\n").unwrap();
        assert_eq!(config.server.port, 8091);
        assert_eq!(config.uploads.max_video_bytes, 1 << 30);
        assert_eq!(config.uploads.max_thumbnail_bytes, 10 << 20);
        assert_eq!(config.storage.signed_url_ttl_secs, 3600);
        assert_eq!(config.thumbnails.strategy, "local_disk");
        assert_eq!(config.auth.issuer, "tubely-access");
        assert!(config.media.classify_aspect_ratio);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_short_secret_fails_validation() {
        let config: Config = serde_yaml::from_str("auth:\n  jwt_secret: short\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_strategy_fails_validation() {
        let yaml = "auth:\n  jwt_secret: a-very-long-test-secret\nthumbnails:\n  strategy: ftp\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bucket_with_separator_fails_validation() {
        let yaml = "auth:\n  jwt_secret: a-very-long-test-secret\nstorage:\n  bucket: a,b\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        apply_env_overrides(&mut config, |name| match name {
            "JWT_SECRET" => Some("from-the-environment".to_string()),
            "S3_BUCKET" => Some("prod-videos".to_string()),
            "PORT" => Some("9000".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.auth.jwt_secret, "from-the-environment");
        assert_eq!(config.storage.bucket, "prod-videos");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.storage.aws.region, "us-east-1");
    }

    #[test]
    fn test_invalid_port_override() {
        let mut config = Config::default();
        let result = apply_env_overrides(&mut config, |name| {
            (name == "PORT").then(|| "eighty".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tubely.yaml");
        std::fs::write(
            &path,
            "auth:\n  jwt_secret: a-very-long-test-secret\nmetadata:\n  engine: memory\nstorage:\n  backend: memory\n",
        )
        .unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.metadata.engine, "memory");
        assert_eq!(config.storage.backend, "memory");
    }
}
