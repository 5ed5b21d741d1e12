//! HTTP server implementation
//!
//! hyper http1 with TokioIo; one spawned task per connection and a flat
//! `match` over (method, path) for dispatch. CORS is permissive on every
//! route, with a catch-all OPTIONS preflight arm.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::Args;
use crate::routes;
use crate::tally::TallyService;
use crate::types::JarError;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub tally: TallyService,
    /// Set when the local photo backend is active; enables /uploads/ serving
    pub upload_dir: Option<PathBuf>,
    /// Process start, for the uptime figure in health responses
    pub started: Instant,
}

impl AppState {
    pub fn new(args: Args, tally: TallyService, upload_dir: Option<PathBuf>) -> Self {
        Self {
            args,
            tally,
            upload_dir,
            started: Instant::now(),
        }
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<(), JarError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!("cookiejar listening on {}", state.args.listen);

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!("[{}] {} {}", addr, method, path);

    let response = match (method, path.as_str()) {
        // The tally surface
        (Method::GET, "/get-cookies") => routes::handle_get_cookies(Arc::clone(&state)).await,
        (Method::POST, "/add-cookies") => {
            routes::handle_add_cookies(req, Arc::clone(&state)).await
        }

        // Locally stored photos (filesystem backend only)
        (Method::GET, p) if p.starts_with("/uploads/") => {
            let file = p.strip_prefix("/uploads/").unwrap_or("");
            routes::handle_upload_fetch(Arc::clone(&state), file).await
        }

        // Liveness probe
        (Method::GET, "/health") | (Method::GET, "/healthz") => {
            routes::health_check(Arc::clone(&state)).await
        }

        // Readiness probe - gates on MongoDB connectivity
        (Method::GET, "/ready") | (Method::GET, "/readyz") => {
            routes::readiness_check(Arc::clone(&state)).await
        }

        // Version info for deployment verification
        (Method::GET, "/version") => routes::version_info(),

        // CORS preflight
        (Method::OPTIONS, _) => preflight_response(),

        (_, p) => not_found_response(p),
    };

    Ok(response)
}

fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type")
        .body(Full::new(Bytes::new()))
        .unwrap()
}

fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": format!("no route for {}", path),
        "code": "NOT_FOUND",
    });

    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preflight_is_permissive() {
        let resp = preflight_response();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            resp.headers().get("Access-Control-Allow-Origin").unwrap(),
            "*"
        );
    }

    #[test]
    fn test_not_found_names_the_path() {
        let resp = not_found_response("/nope");
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
