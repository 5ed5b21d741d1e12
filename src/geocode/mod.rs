//! Geocoding client
//!
//! Resolves a free-text "{city}, {state}, {country}" query to coordinates
//! through a Nominatim-compatible search endpoint. One attempt per request,
//! bounded by a configured timeout; an empty result set is a normal outcome
//! (the caller rejects the submission), anything else wrong with the
//! provider is a server-side failure.

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::types::{JarError, Result};

/// Client for a Nominatim-compatible geocoding provider
pub struct GeocodeClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

/// One search hit from the provider
///
/// Nominatim serves `lat`/`lon` as strings; some compatible providers use
/// plain numbers. Both are accepted.
#[derive(Debug, Deserialize)]
struct GeocodeHit {
    lat: Coord,
    lon: Coord,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Coord {
    Text(String),
    Num(f64),
}

impl Coord {
    fn as_f64(&self) -> Option<f64> {
        match self {
            Coord::Text(s) => s.parse().ok(),
            Coord::Num(n) => Some(*n),
        }
    }
}

impl GeocodeHit {
    fn coords(&self) -> Option<(f64, f64)> {
        Some((self.lat.as_f64()?, self.lon.as_f64()?))
    }
}

/// Extract coordinates from the first hit, if any
fn first_coords(hits: &[GeocodeHit]) -> Result<Option<(f64, f64)>> {
    match hits.first() {
        None => Ok(None),
        Some(hit) => hit
            .coords()
            .map(Some)
            .ok_or_else(|| JarError::Geocode("malformed coordinates in provider response".into())),
    }
}

impl GeocodeClient {
    pub fn new(base_url: String, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            // Nominatim's usage policy requires an identifying user agent.
            .user_agent(concat!("cookiejar/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| JarError::Geocode(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    /// Resolve a free-text location to (latitude, longitude)
    ///
    /// Returns `Ok(None)` when the provider has no match for the query.
    pub async fn resolve(&self, query: &str) -> Result<Option<(f64, f64)>> {
        let mut params = vec![
            ("q", query.to_string()),
            ("format", "json".to_string()),
            ("limit", "1".to_string()),
        ];
        if let Some(key) = &self.api_key {
            params.push(("key", key.clone()));
        }

        let response = self
            .http
            .get(&self.base_url)
            .query(&params)
            .send()
            .await
            .map_err(|e| JarError::Geocode(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(JarError::Geocode(format!(
                "provider returned {}",
                response.status()
            )));
        }

        let hits: Vec<GeocodeHit> = response
            .json()
            .await
            .map_err(|e| JarError::Geocode(format!("unparseable provider response: {}", e)))?;

        debug!(query = %query, hits = hits.len(), "Geocoder answered");

        first_coords(&hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Vec<GeocodeHit> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_string_coordinates() {
        let hits = parse(r#"[{"lat": "30.2672", "lon": "-97.7431"}]"#);
        let coords = first_coords(&hits).unwrap().unwrap();
        assert!((coords.0 - 30.2672).abs() < 1e-9);
        assert!((coords.1 + 97.7431).abs() < 1e-9);
    }

    #[test]
    fn test_numeric_coordinates() {
        let hits = parse(r#"[{"lat": 48.8566, "lon": 2.3522}]"#);
        let coords = first_coords(&hits).unwrap().unwrap();
        assert!((coords.0 - 48.8566).abs() < 1e-9);
    }

    #[test]
    fn test_empty_result_set_is_none() {
        let hits = parse("[]");
        assert!(first_coords(&hits).unwrap().is_none());
    }

    #[test]
    fn test_first_hit_wins() {
        let hits = parse(r#"[{"lat": "1.0", "lon": "2.0"}, {"lat": "3.0", "lon": "4.0"}]"#);
        assert_eq!(first_coords(&hits).unwrap(), Some((1.0, 2.0)));
    }

    #[test]
    fn test_malformed_coordinates_are_an_error() {
        let hits = parse(r#"[{"lat": "not-a-number", "lon": "2.0"}]"#);
        assert!(matches!(first_coords(&hits), Err(JarError::Geocode(_))));
    }
}
