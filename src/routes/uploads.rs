//! Serving locally stored photos
//!
//! Only wired in when the filesystem photo backend is active; the S3
//! backend serves photos straight from the bucket URL.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use std::sync::Arc;
use tracing::debug;

use crate::server::AppState;

/// Handle GET /uploads/{file}
pub async fn handle_upload_fetch(state: Arc<AppState>, file: &str) -> Response<Full<Bytes>> {
    let Some(dir) = &state.upload_dir else {
        return not_found();
    };

    let Some(name) = safe_upload_name(file) else {
        return not_found();
    };

    match tokio::fs::read(dir.join(name)).await {
        Ok(data) => Response::builder()
            .status(StatusCode::OK)
            .header("Content-Type", content_type_for(name))
            .header("Access-Control-Allow-Origin", "*")
            .body(Full::new(Bytes::from(data)))
            .unwrap(),
        Err(e) => {
            debug!(file = %name, error = %e, "Upload not found");
            not_found()
        }
    }
}

/// Reject anything that could escape the upload directory
fn safe_upload_name(file: &str) -> Option<&str> {
    if file.is_empty() || file.contains('/') || file.contains('\\') || file.contains("..") {
        None
    } else {
        Some(file)
    }
}

fn content_type_for(name: &str) -> &'static str {
    match name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()) {
        Some(ext) if ext == "jpg" || ext == "jpeg" => "image/jpeg",
        Some(ext) if ext == "png" => "image/png",
        Some(ext) if ext == "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}

fn not_found() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(r#"{"error":"not found","code":"NOT_FOUND"}"#)))
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_upload_name() {
        assert_eq!(safe_upload_name("1700000000000-pic.jpg"), Some("1700000000000-pic.jpg"));
        assert_eq!(safe_upload_name("../secrets"), None);
        assert_eq!(safe_upload_name("a/b.jpg"), None);
        assert_eq!(safe_upload_name("a\\b.jpg"), None);
        assert_eq!(safe_upload_name(""), None);
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("a.jpg"), "image/jpeg");
        assert_eq!(content_type_for("a.JPEG"), "image/jpeg");
        assert_eq!(content_type_for("a.png"), "image/png");
        assert_eq!(content_type_for("a.gif"), "image/gif");
        assert_eq!(content_type_for("a.bin"), "application/octet-stream");
        assert_eq!(content_type_for("noext"), "application/octet-stream");
    }
}
