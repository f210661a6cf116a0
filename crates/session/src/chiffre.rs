//! Ver- und Entschluesselung der Signal-Payloads

use kamerafunk_crypto::Schluesselpaar;

use crate::error::SessionResult;

/// Faehigkeit, Signal-Payloads fuer den Relay zu ver- und entschluesseln
pub trait SignalChiffre: Send {
    fn verschluesseln(&self, klartext: &str) -> SessionResult<String>;

    fn entschluesseln(&self, blob: &str) -> SessionResult<String>;
}

impl SignalChiffre for Schluesselpaar {
    fn verschluesseln(&self, klartext: &str) -> SessionResult<String> {
        Ok(Schluesselpaar::verschluesseln(self, klartext)?)
    }

    fn entschluesseln(&self, blob: &str) -> SessionResult<String> {
        Ok(Schluesselpaar::entschluesseln(self, blob)?)
    }
}
