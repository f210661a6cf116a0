//! Querschnitt fuer die REST-Schicht: CORS und einheitliche Fehlerantworten

use axum::{
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

/// Fehlerantwort fuer die REST-API
///
/// Format: `{"error": {"code": <status>, "message": <text>}}`
pub fn fehler_antwort(status: StatusCode, nachricht: &str) -> Response {
    (
        status,
        Json(json!({
            "error": {
                "code": status.as_u16(),
                "message": nachricht
            }
        })),
    )
        .into_response()
}

/// CORS konfigurieren: entweder spezifische Origins oder Any
///
/// Ungueltige Origins werden mit einer Warnung uebersprungen.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(wert) => Some(wert),
            Err(_) => {
                tracing::warn!(origin = %o, "Ungueltiger CORS-Origin ignoriert");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
}
