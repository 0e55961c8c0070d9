// geolog/src/geocode.rs
//
// Reverse geocoding of a geocenter into a locality name.
//
// Optional and never on the critical path: a failure is logged by the caller
// and the locality stays empty. Called once per traveler, never per location.
//
// The Google Geocoding free tier is throttled at 5 qps, so the client
// serializes calls behind an async mutex and sleeps out the remainder of a
// fixed interval before each request. Every request carries a timeout.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::config::GeocodingSection;
use crate::error::GeocodeError;

#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    async fn reverse_geocode(&self, lat: f64, lon: f64) -> Result<String, GeocodeError>;
}

// ── Google Geocoding API ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    status:        String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    results:       Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    formatted_address: String,
    #[serde(default)]
    types:             Vec<String>,
}

/// Pick the first result typed as a locality or first-level admin area.
/// `ZERO_RESULTS` and responses with no such result map to an empty string.
pub fn locality_from_response(body: &str) -> Result<String, GeocodeError> {
    let resp: GeocodeResponse = serde_json::from_str(body)?;
    match resp.status.as_str() {
        "" | "OK" | "ZERO_RESULTS" => {}
        other => {
            let msg = resp.error_message.map(|m| format!("{}: {}", other, m)).unwrap_or_else(|| other.to_string());
            return Err(GeocodeError::Api(msg));
        }
    }
    Ok(resp
        .results
        .into_iter()
        .find(|r| r.types.iter().any(|t| t == "locality" || t == "administrative_area_level_1"))
        .map(|r| r.formatted_address)
        .unwrap_or_default())
}

pub struct GoogleGeocoder {
    http:         reqwest::Client,
    endpoint:     String,
    api_key:      String,
    min_interval: Duration,
    last_call:    Mutex<Option<Instant>>,
}

impl GoogleGeocoder {
    pub fn new(cfg: &GeocodingSection, api_key: impl Into<String>) -> Result<Self, GeocodeError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()?;
        Ok(Self {
            http,
            endpoint:     cfg.endpoint.clone(),
            api_key:      api_key.into(),
            min_interval: Duration::from_millis(cfg.min_interval_ms),
            last_call:    Mutex::new(None),
        })
    }
}

#[async_trait]
impl ReverseGeocoder for GoogleGeocoder {
    async fn reverse_geocode(&self, lat: f64, lon: f64) -> Result<String, GeocodeError> {
        // Held for the whole request so calls never overlap.
        let mut last = self.last_call.lock().await;
        if let Some(prev) = *last {
            tokio::time::sleep_until(prev + self.min_interval).await;
        }
        *last = Some(Instant::now());

        let latlng = format!("{:.6},{:.6}", lat, lon);
        debug!("reverse geocoding {}", latlng);
        let resp = self
            .http
            .get(&self.endpoint)
            .query(&[("latlng", latlng.as_str()), ("key", self.api_key.as_str())])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(GeocodeError::Status(status.as_u16()));
        }
        let body = resp.text().await?;
        locality_from_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_locality_result() {
        let body = r#"{
            "status": "OK",
            "results": [
                {"formatted_address": "1 Market St, San Francisco, CA", "types": ["street_address"]},
                {"formatted_address": "San Francisco, CA, USA", "types": ["locality", "political"]},
                {"formatted_address": "California, USA", "types": ["administrative_area_level_1"]}
            ]
        }"#;
        assert_eq!(locality_from_response(body).unwrap(), "San Francisco, CA, USA");
    }

    #[test]
    fn falls_back_to_admin_area() {
        let body = r#"{"status":"OK","results":[
            {"formatted_address":"Pacific Ocean","types":["natural_feature"]},
            {"formatted_address":"Hawaii, USA","types":["administrative_area_level_1","political"]}
        ]}"#;
        assert_eq!(locality_from_response(body).unwrap(), "Hawaii, USA");
    }

    #[test]
    fn zero_results_is_empty_not_error() {
        let body = r#"{"status":"ZERO_RESULTS","results":[]}"#;
        assert_eq!(locality_from_response(body).unwrap(), "");
    }

    #[test]
    fn quota_and_denial_are_errors() {
        let body = r#"{"status":"OVER_QUERY_LIMIT","error_message":"quota","results":[]}"#;
        match locality_from_response(body) {
            Err(GeocodeError::Api(msg)) => assert_eq!(msg, "OVER_QUERY_LIMIT: quota"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            locality_from_response(r#"{"status":"REQUEST_DENIED"}"#),
            Err(GeocodeError::Api(_))
        ));
    }

    #[test]
    fn malformed_body_is_decode_error() {
        assert!(matches!(locality_from_response("<html>"), Err(GeocodeError::Decode(_))));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_reported_not_panicked() {
        let cfg = GeocodingSection {
            api_key:         None,
            endpoint:        "http://127.0.0.1:9/geocode/json".into(),
            min_interval_ms: 0,
            timeout_ms:      500,
        };
        let geocoder = GoogleGeocoder::new(&cfg, "k").unwrap();
        assert!(geocoder.reverse_geocode(1.0, 2.0).await.is_err());
    }

    #[tokio::test]
    async fn consecutive_calls_are_spaced_by_the_minimum_interval() {
        let cfg = GeocodingSection {
            api_key:         None,
            endpoint:        "http://127.0.0.1:9/geocode/json".into(),
            min_interval_ms: 300,
            timeout_ms:      500,
        };
        let geocoder = GoogleGeocoder::new(&cfg, "k").unwrap();
        let start = Instant::now();
        let _ = geocoder.reverse_geocode(1.0, 2.0).await;
        let _ = geocoder.reverse_geocode(3.0, 4.0).await;
        assert!(start.elapsed() >= Duration::from_millis(300), "elapsed {:?}", start.elapsed());
    }
}
