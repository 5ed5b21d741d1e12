//! Error types shared across the service

use thiserror::Error;

/// Errors produced anywhere in the service.
///
/// The route layer maps these onto HTTP status codes: `Validation`,
/// `UnresolvableLocation` and `PayloadTooLarge` are client errors, the rest
/// are server-side failures reported with a generic body and logged in full.
#[derive(Debug, Error)]
pub enum JarError {
    /// Client submitted missing or invalid fields, or a disallowed file.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The geocoding provider returned no results for the submitted location.
    #[error("unable to resolve location")]
    UnresolvableLocation,

    /// Request body exceeded the configured upload cap.
    #[error("upload exceeds size limit")]
    PayloadTooLarge,

    /// MongoDB connection or query failure.
    #[error("database error: {0}")]
    Database(String),

    /// Geocoding provider unreachable or answered with garbage.
    #[error("geocoding error: {0}")]
    Geocode(String),

    /// Photo storage backend failure (disk or S3).
    #[error("storage error: {0}")]
    Storage(String),

    /// Photo could not be decoded or re-encoded.
    #[error("image error: {0}")]
    Image(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl JarError {
    /// Whether the caller is at fault (4xx) rather than the service (5xx).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            JarError::Validation(_) | JarError::UnresolvableLocation | JarError::PayloadTooLarge
        )
    }
}

pub type Result<T> = std::result::Result<T, JarError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_classification() {
        assert!(JarError::Validation("x".into()).is_client_error());
        assert!(JarError::UnresolvableLocation.is_client_error());
        assert!(JarError::PayloadTooLarge.is_client_error());
        assert!(!JarError::Database("x".into()).is_client_error());
        assert!(!JarError::Geocode("x".into()).is_client_error());
    }

    #[test]
    fn test_unresolvable_location_message() {
        let err = JarError::UnresolvableLocation;
        assert_eq!(err.to_string(), "unable to resolve location");
    }
}
