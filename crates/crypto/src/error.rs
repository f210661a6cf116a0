//! Fehlertypen fuer das Kryptografie-Subsystem

use kamerafunk_core::FehlerKlasse;
use thiserror::Error;

/// Fehler im Kryptografie-Subsystem
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Verschluesselung fehlgeschlagen: {0}")]
    Verschluesselung(String),

    #[error("Entschluesselung fehlgeschlagen: {0}")]
    Entschluesselung(String),

    #[error("Ungueltige Schluessel-Laenge: erwartet {erwartet}, erhalten {erhalten}")]
    UngueltigeSchluesselLaenge { erwartet: usize, erhalten: usize },

    #[error("Ungueltige Daten: {0}")]
    UngueltigeDaten(String),

    #[error("Key Derivation fehlgeschlagen: {0}")]
    KeyDerivation(String),

    #[error("Hex-Dekodierung fehlgeschlagen: {0}")]
    Hex(#[from] hex::FromHexError),
}

impl CryptoError {
    /// Jeder Krypto-Fehler betrifft nur den einen Payload
    pub fn klasse(&self) -> FehlerKlasse {
        match self {
            Self::Verschluesselung(_) | Self::KeyDerivation(_) => FehlerKlasse::Intern,
            _ => FehlerKlasse::Payload,
        }
    }
}

pub type CryptoResult<T> = Result<T, CryptoError>;
