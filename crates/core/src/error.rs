//! Fehlertypen fuer Kamerafunk
//!
//! Zentraler Fehler-Enum mit der Klassifizierung, die alle Crates teilen.
//! Untermodule definieren eigene Fehler und ordnen sie ueber `klasse()` ein.

use thiserror::Error;

/// Globaler Result-Alias fuer Kamerafunk
pub type Result<T> = std::result::Result<T, KamerafunkError>;

/// Fehlerklassen des Systems
///
/// Keine Klasse ist prozess-fatal: ein Fehler betrifft immer nur einen
/// Raum, einen Listener oder einen Verbindungsversuch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FehlerKlasse {
    /// Fehlende/ungueltige Kennung, Rolle oder Nutzlast (4xx, keine Mutation)
    Validierung,
    /// Ziel existiert nicht (z.B. Resend fuer unbekannte Listener-ID)
    NichtGefunden,
    /// Schreiben an einen Listener oder den Relay fehlgeschlagen
    Transport,
    /// Entschluesselung oder Signal-Art auf Client-Seite fehlerhaft
    Payload,
    /// Alles andere
    Intern,
}

/// Gemeinsame Fehler der Kern-Typen (Parsen von Kennungen und Signalen)
#[derive(Debug, Error)]
pub enum KamerafunkError {
    #[error("Ungueltige Eingabe: {0}")]
    Validierung(String),

    #[error("Ungueltiger Payload: {0}")]
    Payload(String),
}

impl KamerafunkError {
    pub fn klasse(&self) -> FehlerKlasse {
        match self {
            Self::Validierung(_) => FehlerKlasse::Validierung,
            Self::Payload(_) => FehlerKlasse::Payload,
        }
    }
}
