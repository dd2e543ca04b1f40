//! Service configuration from environment variables

use std::env;
use std::path::PathBuf;

/// Object storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// S3 bucket receiving photo variants
    pub bucket: String,
    /// Key prefix ahead of the session-scoped path
    pub prefix: String,
    /// Base URL variants are served from (CDN or bucket endpoint)
    pub public_base_url: String,
}

impl StorageConfig {
    pub fn from_env() -> Result<Self, String> {
        let bucket = env::var("S3_BUCKET").map_err(|_| "S3_BUCKET not set".to_string())?;
        let prefix = env::var("S3_PREFIX").unwrap_or_else(|_| "photos".to_string());
        let public_base_url = env::var("S3_PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("https://{bucket}.s3.amazonaws.com"));

        Ok(Self {
            bucket,
            prefix,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        })
    }
}

/// Upload and transcoding limits
#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Maximum number of files accepted per multipart request
    pub max_files_per_request: usize,
    /// Request body cap in bytes, covering all files in a batch
    pub max_request_bytes: usize,
    /// Directory raw uploads are spooled into before decoding
    pub spool_dir: PathBuf,
    /// Emit the optional webp variant
    pub webp_enabled: bool,
    /// TTF used for watermark overlays, if provided by the deployment
    pub watermark_font_path: Option<PathBuf>,
}

impl UploadConfig {
    pub fn from_env() -> Self {
        let max_files_per_request = env::var("UPLOAD_MAX_FILES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(20);

        let max_request_bytes = env::var("UPLOAD_MAX_REQUEST_BYTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(250 * 1024 * 1024);

        let spool_dir = env::var("UPLOAD_SPOOL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| env::temp_dir());

        let webp_enabled = env::var("WEBP_VARIANTS_ENABLED")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let watermark_font_path = env::var("WATERMARK_FONT_PATH").ok().map(PathBuf::from);

        Self {
            max_files_per_request,
            max_request_bytes,
            spool_dir,
            webp_enabled,
            watermark_font_path,
        }
    }
}

/// Top-level service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address the HTTP listener binds to
    pub bind_addr: String,
    /// PEM-encoded RSA public key for verifying bearer tokens, or a path to one
    pub jwt_public_key: String,
    pub storage: StorageConfig,
    pub upload: UploadConfig,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, String> {
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3002".to_string());

        let jwt_public_key =
            env::var("JWT_PUBLIC_KEY").map_err(|_| "JWT_PUBLIC_KEY not set".to_string())?;

        // Accept either inline PEM or a file path, like the auth tooling does
        let jwt_public_key = if jwt_public_key.starts_with("-----BEGIN") {
            jwt_public_key
        } else {
            std::fs::read_to_string(&jwt_public_key)
                .map_err(|e| format!("Failed to read public key file: {e}"))?
                .trim()
                .to_string()
        };

        Ok(Self {
            bind_addr,
            jwt_public_key,
            storage: StorageConfig::from_env()?,
            upload: UploadConfig::from_env(),
        })
    }
}
