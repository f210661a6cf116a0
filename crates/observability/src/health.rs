//! Health-Check-Endpunkt fuer Kamerafunk
//!
//! Endpoint: `GET /health`
//! Response: JSON mit Status, Version, Uptime sowie Raum- und Listener-Anzahl

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Status des Health-Checks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    /// Server faehrt herunter, neue Streams sollten woanders hin
    Draining,
}

/// Antwort des Health-Check-Endpunkts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub rooms: u64,
    pub listeners: u64,
}

/// Geteilter Zustand fuer den Health-Check-Handler
///
/// Raum- und Listener-Anzahl werden bei jedem Stream-Beitritt und -Ende
/// sowie nach jedem Aufraeum-Durchlauf aktualisiert; der Handler liest nur
/// Atomics.
#[derive(Clone)]
pub struct HealthState {
    start_time: Arc<Instant>,
    raeume: Arc<AtomicU64>,
    listener: Arc<AtomicU64>,
    draining: Arc<AtomicBool>,
}

impl HealthState {
    pub fn neu() -> Self {
        Self {
            start_time: Arc::new(Instant::now()),
            raeume: Arc::new(AtomicU64::new(0)),
            listener: Arc::new(AtomicU64::new(0)),
            draining: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn relay_stand_setzen(&self, raeume: usize, listener: usize) {
        self.raeume.store(raeume as u64, Ordering::Relaxed);
        self.listener.store(listener as u64, Ordering::Relaxed);
    }

    /// Markiert den Server als herunterfahrend
    pub fn herunterfahren(&self) {
        self.draining.store(true, Ordering::Relaxed);
    }

    pub fn antwort(&self) -> HealthResponse {
        let status = if self.draining.load(Ordering::Relaxed) {
            HealthStatus::Draining
        } else {
            HealthStatus::Healthy
        };
        HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.uptime_seconds(),
            rooms: self.raeume.load(Ordering::Relaxed),
            listeners: self.listener.load(Ordering::Relaxed),
        }
    }
}

impl Default for HealthState {
    fn default() -> Self {
        Self::neu()
    }
}

/// Axum-Router fuer den `/health`-Endpunkt
pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(state)
}

/// `GET /health` – gibt den Serverstatus zurueck
pub async fn health_handler(State(state): State<HealthState>) -> impl IntoResponse {
    let response = state.antwort();
    let http_status = match response.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Draining => StatusCode::SERVICE_UNAVAILABLE,
    };
    (http_status, Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[test]
    fn health_state_frisch() {
        let state = HealthState::neu();
        assert!(state.uptime_seconds() < 5);
        let antwort = state.antwort();
        assert_eq!(antwort.status, HealthStatus::Healthy);
        assert_eq!(antwort.rooms, 0);
        assert_eq!(antwort.listeners, 0);
    }

    #[test]
    fn relay_stand_uebernommen() {
        let state = HealthState::neu();
        state.relay_stand_setzen(4, 9);
        let antwort = state.antwort();
        assert_eq!(antwort.rooms, 4);
        assert_eq!(antwort.listeners, 9);
    }

    #[test]
    fn health_response_serialisierung() {
        let response = HealthResponse {
            status: HealthStatus::Healthy,
            version: "0.1.0".to_string(),
            uptime_seconds: 3600,
            rooms: 2,
            listeners: 3,
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"status\":\"healthy\""));
        assert!(json.contains("\"version\":\"0.1.0\""));
        assert!(json.contains("\"uptime_seconds\":3600"));
        assert!(json.contains("\"rooms\":2"));
        assert!(json.contains("\"listeners\":3"));
    }

    #[tokio::test]
    async fn endpunkt_ok() {
        let antwort = health_router(HealthState::neu())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(antwort.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn endpunkt_beim_herunterfahren_503() {
        let state = HealthState::neu();
        state.herunterfahren();
        let antwort = health_router(state)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(antwort.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = axum::body::to_bytes(antwort.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "draining");
    }
}
