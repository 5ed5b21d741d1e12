//! The two tally routes
//!
//! - `GET /get-cookies` - current total, per-type counts, location log
//! - `POST /add-cookies` - submit a contribution, answers with the same
//!   envelope the read path serves
//!
//! The write route accepts `multipart/form-data` (required when a photo is
//! attached), `application/x-www-form-urlencoded`, or a flat JSON object.
//! The transport-level upload cap is enforced here, before validation.

use std::collections::HashMap;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{header, Request, Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, warn};

use crate::photos::UploadedPhoto;
use crate::server::AppState;
use crate::tally::NewContribution;
use crate::types::{JarError, Result};

/// Slack on top of the photo cap for the non-file fields and multipart
/// framing when checking the whole request body.
const FORM_OVERHEAD_BYTES: usize = 16 * 1024;

/// Handle GET /get-cookies
pub async fn handle_get_cookies(state: Arc<AppState>) -> Response<Full<Bytes>> {
    match state.tally.get_stats().await {
        Ok(envelope) => json_response(StatusCode::OK, &envelope),
        Err(e) => error_to_response(&e),
    }
}

/// Handle POST /add-cookies
pub async fn handle_add_cookies(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<Full<Bytes>> {
    let cap = state.args.max_upload_bytes;

    // Reject declared-oversize bodies before reading them.
    let declared_len = req
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if matches!(declared_len, Some(len) if len > cap + FORM_OVERHEAD_BYTES) {
        return error_to_response(&JarError::PayloadTooLarge);
    }

    let content_type = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    let body = match req.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(error = %e, "Failed to read request body");
            return error_response(
                StatusCode::BAD_REQUEST,
                "failed to read request body",
                "BAD_BODY",
            );
        }
    };

    if body.len() > cap + FORM_OVERHEAD_BYTES {
        return error_to_response(&JarError::PayloadTooLarge);
    }

    let (fields, photo) = match parse_body(&content_type, body, cap).await {
        Ok(parsed) => parsed,
        Err(e) => return error_to_response(&e),
    };

    let request = match NewContribution::from_form(&fields, photo) {
        Ok(r) => r,
        Err(e) => return error_to_response(&e),
    };

    match state.tally.add_contribution(request).await {
        Ok(envelope) => json_response(StatusCode::OK, &envelope),
        Err(e) => error_to_response(&e),
    }
}

/// Decode the request body into form fields plus an optional photo
async fn parse_body(
    content_type: &str,
    body: Bytes,
    photo_cap: usize,
) -> Result<(HashMap<String, String>, Option<UploadedPhoto>)> {
    if content_type.starts_with("multipart/form-data") {
        let boundary = multer::parse_boundary(content_type)
            .map_err(|e| JarError::Validation(format!("malformed multipart boundary: {}", e)))?;
        parse_multipart(body, boundary, photo_cap).await
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        Ok((parse_urlencoded(&body)?, None))
    } else if content_type.starts_with("application/json") {
        Ok((parse_json(&body)?, None))
    } else {
        Err(JarError::Validation(format!(
            "unsupported content type '{}'",
            content_type
        )))
    }
}

async fn parse_multipart(
    body: Bytes,
    boundary: String,
    photo_cap: usize,
) -> Result<(HashMap<String, String>, Option<UploadedPhoto>)> {
    let stream = futures_util::stream::once(async move { Ok::<Bytes, std::io::Error>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    let mut fields = HashMap::new();
    let mut photo = None;

    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| JarError::Validation(format!("malformed multipart body: {}", e)))?;
        let Some(field) = field else { break };

        let name = field.name().unwrap_or_default().to_string();

        if name == "photo" {
            let file_name = field.file_name().unwrap_or("photo").to_string();
            let content_type = field
                .content_type()
                .map(|m| m.to_string())
                .unwrap_or_else(|| "application/octet-stream".to_string());
            let data = field
                .bytes()
                .await
                .map_err(|e| JarError::Validation(format!("malformed multipart body: {}", e)))?;

            // Browsers submit an empty part when no file was chosen.
            if data.is_empty() {
                continue;
            }
            if data.len() > photo_cap {
                return Err(JarError::PayloadTooLarge);
            }

            photo = Some(UploadedPhoto {
                file_name,
                content_type,
                data: data.to_vec(),
            });
        } else {
            let value = field
                .text()
                .await
                .map_err(|e| JarError::Validation(format!("malformed multipart body: {}", e)))?;
            fields.insert(name, value);
        }
    }

    Ok((fields, photo))
}

fn parse_urlencoded(body: &[u8]) -> Result<HashMap<String, String>> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(body)
        .map_err(|e| JarError::Validation(format!("malformed form body: {}", e)))?;
    Ok(pairs.into_iter().collect())
}

fn parse_json(body: &[u8]) -> Result<HashMap<String, String>> {
    let map: HashMap<String, serde_json::Value> = serde_json::from_slice(body)
        .map_err(|e| JarError::Validation(format!("malformed JSON body: {}", e)))?;

    Ok(map
        .into_iter()
        .map(|(k, v)| {
            let v = match v {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            (k, v)
        })
        .collect())
}

/// API error response body
#[derive(Debug, Serialize)]
struct ApiError {
    error: String,
    code: &'static str,
}

fn status_for(err: &JarError) -> (StatusCode, &'static str) {
    match err {
        JarError::Validation(_) => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
        JarError::UnresolvableLocation => (StatusCode::BAD_REQUEST, "UNRESOLVABLE_LOCATION"),
        JarError::PayloadTooLarge => (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE"),
        JarError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
        JarError::Geocode(_) => (StatusCode::BAD_GATEWAY, "GEOCODER_ERROR"),
        JarError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
        JarError::Image(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IMAGE_ERROR"),
        JarError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
    }
}

/// Map a service error onto an HTTP response.
///
/// Client errors carry their message through; server-side failures answer
/// with a generic body and keep the detail in the log.
pub fn error_to_response(err: &JarError) -> Response<Full<Bytes>> {
    let (status, code) = status_for(err);

    if err.is_client_error() {
        warn!(error = %err, code, "Rejected request");
        error_response(status, &err.to_string(), code)
    } else {
        error!(error = %err, code, "Request failed");
        error_response(status, "internal error", code)
    }
}

/// Create JSON response
pub fn json_response<T: Serialize>(status: StatusCode, data: &T) -> Response<Full<Bytes>> {
    let body = serde_json::to_string(data)
        .unwrap_or_else(|_| r#"{"error":"Serialization failed"}"#.to_string());

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

/// Create error response
pub fn error_response(
    status: StatusCode,
    message: &str,
    code: &'static str,
) -> Response<Full<Bytes>> {
    let error = ApiError {
        error: message.to_string(),
        code,
    };
    let body = serde_json::to_string(&error)
        .unwrap_or_else(|_| r#"{"error":"Serialization failed"}"#.to_string());

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn multipart_body(boundary: &str, with_photo: bool) -> Bytes {
        let mut body = String::new();
        for (name, value) in [
            ("cookies", "3"),
            ("city", "Austin"),
            ("state", "TX"),
            ("country", "USA"),
            ("cookieType", "chocolate chip"),
        ] {
            body.push_str(&format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            ));
        }
        if with_photo {
            body.push_str(&format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"photo\"; \
                 filename=\"cookie.jpg\"\r\nContent-Type: image/jpeg\r\n\r\nfakejpegdata\r\n"
            ));
        }
        body.push_str(&format!("--{boundary}--\r\n"));
        Bytes::from(body)
    }

    #[tokio::test]
    async fn test_parse_multipart_fields_and_photo() {
        let (fields, photo) = parse_multipart(multipart_body("XBOUND", true), "XBOUND".into(), 1024)
            .await
            .unwrap();
        assert_eq!(fields.get("cookies").unwrap(), "3");
        assert_eq!(fields.get("cookieType").unwrap(), "chocolate chip");

        let photo = photo.unwrap();
        assert_eq!(photo.file_name, "cookie.jpg");
        assert_eq!(photo.content_type, "image/jpeg");
        assert_eq!(photo.data, b"fakejpegdata");
    }

    #[tokio::test]
    async fn test_parse_multipart_without_photo() {
        let (fields, photo) =
            parse_multipart(multipart_body("XBOUND", false), "XBOUND".into(), 1024)
                .await
                .unwrap();
        assert_eq!(fields.len(), 5);
        assert!(photo.is_none());
    }

    #[tokio::test]
    async fn test_oversized_photo_is_payload_too_large() {
        let result = parse_multipart(multipart_body("XBOUND", true), "XBOUND".into(), 4).await;
        assert!(matches!(result, Err(JarError::PayloadTooLarge)));
    }

    #[test]
    fn test_parse_urlencoded() {
        let fields = parse_urlencoded(b"cookies=3&city=Austin&cookieType=chocolate+chip").unwrap();
        assert_eq!(fields.get("cookies").unwrap(), "3");
        assert_eq!(fields.get("cookieType").unwrap(), "chocolate chip");
    }

    #[test]
    fn test_parse_json_keeps_numbers() {
        let fields = parse_json(br#"{"cookies": 3, "city": "Austin"}"#).unwrap();
        assert_eq!(fields.get("cookies").unwrap(), "3");
        assert_eq!(fields.get("city").unwrap(), "Austin");
    }

    #[tokio::test]
    async fn test_unsupported_content_type_rejected() {
        let result = parse_body("text/plain", Bytes::from_static(b"hi"), 1024).await;
        assert!(matches!(result, Err(JarError::Validation(_))));
    }

    #[test]
    fn test_error_statuses() {
        assert_eq!(
            status_for(&JarError::Validation("x".into())).0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&JarError::UnresolvableLocation).0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&JarError::PayloadTooLarge).0,
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            status_for(&JarError::Database("x".into())).0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_for(&JarError::Geocode("x".into())).0,
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_client_error_message_passes_through() {
        let resp = error_to_response(&JarError::UnresolvableLocation);
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = error_to_response(&JarError::Database("secret detail".into()));
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
