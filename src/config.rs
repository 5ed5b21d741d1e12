//! Configuration for cookiejar
//!
//! CLI arguments and environment variable handling using clap.
//! The six upstream deployment variants collapse into one binary: geocoding,
//! photo storage, photo normalization and the contribution-log policy are
//! all switched here rather than forked in code.

use clap::{Parser, ValueEnum};
use std::net::SocketAddr;

/// How contribution log entries are recorded.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogPolicy {
    /// Every accepted submission inserts a new log document.
    Append,
    /// Log documents are keyed by (city, state, country, cookieType);
    /// repeated submissions increment the existing document and refresh
    /// its timestamp.
    Aggregate,
}

/// Where uploaded photos are kept.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoBackend {
    /// Photo uploads disabled; a submitted file is rejected.
    None,
    /// Local directory, served back under /uploads/.
    Local,
    /// S3 (or an S3-compatible store via --s3-endpoint).
    S3,
}

/// cookiejar - cookie tally REST service
#[derive(Parser, Debug, Clone)]
#[command(name = "cookiejar")]
#[command(about = "Counts cookie contributions: running total, per-type breakdown, geotagged log")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:3000")]
    pub listen: SocketAddr,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "cookiejar")]
    pub mongodb_db: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Contribution-log policy
    #[arg(long, env = "LOG_POLICY", value_enum, default_value = "append")]
    pub log_policy: LogPolicy,

    /// Resolve submitted locations to coordinates before accepting them
    #[arg(long, env = "GEOCODING_ENABLED", default_value = "false")]
    pub geocoding_enabled: bool,

    /// Geocoding provider search endpoint (Nominatim-compatible)
    #[arg(
        long,
        env = "GEOCODER_URL",
        default_value = "https://nominatim.openstreetmap.org/search"
    )]
    pub geocoder_url: String,

    /// API key passed to the geocoding provider, if it requires one
    #[arg(long, env = "GEOCODER_API_KEY")]
    pub geocoder_api_key: Option<String>,

    /// Geocoding request timeout in milliseconds
    #[arg(long, env = "GEOCODER_TIMEOUT_MS", default_value = "5000")]
    pub geocoder_timeout_ms: u64,

    /// Photo storage backend
    #[arg(long, env = "PHOTO_STORAGE", value_enum, default_value = "none")]
    pub photo_storage: PhotoBackend,

    /// Directory for the local photo backend
    #[arg(long, env = "UPLOAD_DIR", default_value = "./uploads")]
    pub upload_dir: String,

    /// S3 bucket name (required for the s3 backend)
    #[arg(long, env = "S3_BUCKET")]
    pub s3_bucket: Option<String>,

    /// S3 region
    #[arg(long, env = "S3_REGION")]
    pub s3_region: Option<String>,

    /// Endpoint override for S3-compatible object stores
    #[arg(long, env = "S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// Public URL prefix for stored photos (defaults to the AWS virtual-host URL)
    #[arg(long, env = "S3_PUBLIC_URL")]
    pub s3_public_url: Option<String>,

    /// Explicit S3 access key (falls back to the AWS provider chain)
    #[arg(long, env = "S3_ACCESS_KEY")]
    pub s3_access_key: Option<String>,

    /// Explicit S3 secret key (falls back to the AWS provider chain)
    #[arg(long, env = "S3_SECRET_KEY")]
    pub s3_secret_key: Option<String>,

    /// Resize uploads to max 800px wide and re-encode as JPEG before storing
    #[arg(long, env = "NORMALIZE_PHOTOS", default_value = "false")]
    pub normalize_photos: bool,

    /// Maximum accepted upload size in bytes
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value = "5242880")]
    pub max_upload_bytes: usize,
}

impl Args {
    /// Validate cross-field constraints
    pub fn validate(&self) -> Result<(), String> {
        if self.photo_storage == PhotoBackend::S3 && self.s3_bucket.is_none() {
            return Err("S3_BUCKET is required when PHOTO_STORAGE=s3".to_string());
        }

        if self.normalize_photos && self.photo_storage == PhotoBackend::None {
            return Err("NORMALIZE_PHOTOS requires a photo storage backend".to_string());
        }

        if self.geocoding_enabled && self.geocoder_url.trim().is_empty() {
            return Err("GEOCODER_URL must be set when GEOCODING_ENABLED=true".to_string());
        }

        if self.max_upload_bytes == 0 {
            return Err("MAX_UPLOAD_BYTES must be greater than zero".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args::parse_from(["cookiejar"])
    }

    #[test]
    fn test_defaults_are_valid() {
        let args = base_args();
        assert!(args.validate().is_ok());
        assert_eq!(args.listen.port(), 3000);
        assert_eq!(args.log_policy, LogPolicy::Append);
        assert_eq!(args.photo_storage, PhotoBackend::None);
        assert_eq!(args.max_upload_bytes, 5 * 1024 * 1024);
    }

    #[test]
    fn test_s3_requires_bucket() {
        let mut args = base_args();
        args.photo_storage = PhotoBackend::S3;
        assert!(args.validate().is_err());

        args.s3_bucket = Some("cookiejar-uploads".to_string());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_normalize_requires_storage() {
        let mut args = base_args();
        args.normalize_photos = true;
        assert!(args.validate().is_err());

        args.photo_storage = PhotoBackend::Local;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_policy_flags_parse() {
        let args = Args::parse_from([
            "cookiejar",
            "--log-policy",
            "aggregate",
            "--photo-storage",
            "local",
        ]);
        assert_eq!(args.log_policy, LogPolicy::Aggregate);
        assert_eq!(args.photo_storage, PhotoBackend::Local);
    }
}
