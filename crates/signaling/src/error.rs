//! Fehlertypen fuer den Signaling-Relay

use kamerafunk_core::{FehlerKlasse, KamerafunkError};
use thiserror::Error;

/// Fehlertyp fuer den Signaling-Relay
#[derive(Debug, Error)]
pub enum SignalingError {
    /// Kennung, Rolle oder Nutzlast fehlt oder ist ungueltig
    #[error("Ungueltige Anfrage: {0}")]
    Validierung(String),

    /// Listener nicht im Raum registriert
    #[error("Nicht gefunden: {0}")]
    NichtGefunden(String),

    /// Zustellung an einen Listener fehlgeschlagen (Client getrennt)
    #[error("Transportfehler: {0}")]
    Transport(String),

    /// Interner Fehler
    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl SignalingError {
    /// Erstellt einen Validierungsfehler
    pub fn validierung(msg: impl Into<String>) -> Self {
        Self::Validierung(msg.into())
    }

    pub fn klasse(&self) -> FehlerKlasse {
        match self {
            Self::Validierung(_) => FehlerKlasse::Validierung,
            Self::NichtGefunden(_) => FehlerKlasse::NichtGefunden,
            Self::Transport(_) => FehlerKlasse::Transport,
            Self::Intern(_) => FehlerKlasse::Intern,
        }
    }
}

impl From<KamerafunkError> for SignalingError {
    fn from(e: KamerafunkError) -> Self {
        match e {
            KamerafunkError::Validierung(msg) => Self::Validierung(msg),
            KamerafunkError::Payload(msg) => Self::Intern(msg),
        }
    }
}

/// Result-Typ fuer den Signaling-Relay
pub type SignalingResult<T> = Result<T, SignalingError>;
