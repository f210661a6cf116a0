//! Fehlertypen fuer die Client-Sitzungen

use kamerafunk_core::{FehlerKlasse, KamerafunkError};
use kamerafunk_crypto::CryptoError;
use thiserror::Error;

/// Fehler einer Sitzung oder ihrer Relay-Anbindung
///
/// Kein Fehler beendet eine Sitzung; sie bleibt immer wiederholbar.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Relay nicht erreichbar oder Stream abgerissen
    #[error("Relay-Transport fehlgeschlagen: {0}")]
    Transport(String),

    /// Relay hat die Anfrage mit einem Fehlerstatus beantwortet
    #[error("Relay hat abgelehnt ({status}): {meldung}")]
    Abgelehnt { status: u16, meldung: String },

    /// Unerwartete Signal-Art oder kaputter Payload
    #[error("Ungueltiger Payload: {0}")]
    Payload(String),

    /// Resend ohne vorher zugewiesene Receiver-ID
    #[error("Keine Receiver-ID bekannt")]
    KeineReceiverId,

    #[error(transparent)]
    Krypto(#[from] CryptoError),
}

pub type SessionResult<T> = Result<T, SessionError>;

impl SessionError {
    pub fn klasse(&self) -> FehlerKlasse {
        match self {
            Self::Transport(_) => FehlerKlasse::Transport,
            Self::Abgelehnt { status: 404, .. } => FehlerKlasse::NichtGefunden,
            Self::Abgelehnt { status, .. } if *status < 500 => FehlerKlasse::Validierung,
            Self::Abgelehnt { .. } => FehlerKlasse::Transport,
            Self::Payload(_) => FehlerKlasse::Payload,
            Self::KeineReceiverId => FehlerKlasse::NichtGefunden,
            Self::Krypto(e) => e.klasse(),
        }
    }
}

impl From<reqwest::Error> for SessionError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => Self::Abgelehnt {
                status: status.as_u16(),
                meldung: e.to_string(),
            },
            None => Self::Transport(e.to_string()),
        }
    }
}

impl From<KamerafunkError> for SessionError {
    fn from(e: KamerafunkError) -> Self {
        match e {
            KamerafunkError::Payload(msg) | KamerafunkError::Validierung(msg) => Self::Payload(msg),
        }
    }
}
