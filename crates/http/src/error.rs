//! Fehlertypen fuer die HTTP-Schnittstelle

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kamerafunk_core::FehlerKlasse;
use kamerafunk_signaling::SignalingError;
use thiserror::Error;

use crate::rest::middleware::fehler_antwort;

/// Fehler einer HTTP-Anfrage
#[derive(Debug, Error)]
pub enum HttpFehler {
    #[error(transparent)]
    Signaling(#[from] SignalingError),

    #[error("Server faehrt herunter")]
    Herunterfahren,
}

pub type HttpResult<T> = Result<T, HttpFehler>;

impl HttpFehler {
    pub fn klasse(&self) -> FehlerKlasse {
        match self {
            Self::Signaling(e) => e.klasse(),
            Self::Herunterfahren => FehlerKlasse::Transport,
        }
    }

    /// HTTP-Statuscode fuer REST-Fehler
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Herunterfahren => StatusCode::SERVICE_UNAVAILABLE,
            Self::Signaling(_) => match self.klasse() {
                FehlerKlasse::Validierung | FehlerKlasse::Payload => StatusCode::BAD_REQUEST,
                FehlerKlasse::NichtGefunden => StatusCode::NOT_FOUND,
                FehlerKlasse::Transport | FehlerKlasse::Intern => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

impl IntoResponse for HttpFehler {
    fn into_response(self) -> Response {
        let status = self.http_status();
        if status.is_server_error() {
            tracing::error!(fehler = %self, "Anfrage fehlgeschlagen");
        } else {
            tracing::debug!(fehler = %self, status = status.as_u16(), "Anfrage abgelehnt");
        }
        fehler_antwort(status, &self.to_string())
    }
}
