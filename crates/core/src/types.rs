//! Gemeinsame Identifikationstypen fuer Kamerafunk
//!
//! Alle IDs verwenden das Newtype-Pattern um Verwechslungen zwischen
//! Raum-Kennungen und Listener-IDs zur Compilezeit auszuschliessen.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::KamerafunkError;

/// Standard-Obergrenze fuer die Laenge einer Raum-Kennung
pub const MAX_KENNUNG_LAENGE: usize = 256;

/// Kennung eines Raums (hex-kodierter oeffentlicher Schluessel des Senders)
///
/// Der Relay behandelt die Kennung als undurchsichtigen Routing-Schluessel.
/// Gross-/Kleinschreibung ist signifikant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RaumId(String);

impl RaumId {
    /// Validiert eine Kennung aus einer nicht vertrauenswuerdigen Quelle
    ///
    /// Erlaubt sind 1..=`max_laenge` druckbare ASCII-Zeichen ohne Leerraum.
    pub fn parse(kennung: &str, max_laenge: usize) -> Result<Self, KamerafunkError> {
        if kennung.is_empty() {
            return Err(KamerafunkError::Validierung("Kennung fehlt".into()));
        }
        if kennung.len() > max_laenge {
            return Err(KamerafunkError::Validierung(format!(
                "Kennung zu lang: {} > {max_laenge} Zeichen",
                kennung.len()
            )));
        }
        if !kennung.bytes().all(|b| b.is_ascii_graphic()) {
            return Err(KamerafunkError::Validierung(
                "Kennung enthaelt nicht druckbare Zeichen".into(),
            ));
        }
        Ok(Self(kennung.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RaumId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Vom Server vergebene Listener-ID
///
/// Monoton steigend pro Registry, beginnend bei 1. Unabhaengig von
/// Transport-Details wie dem Quell-Port der Verbindung.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ListenerId(pub u64);

impl ListenerId {
    /// Gibt den inneren Zahlenwert zurueck
    pub fn inner(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ListenerId {
    type Err = KamerafunkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(Self)
            .map_err(|_| KamerafunkError::Validierung(format!("Ungueltige Listener-ID: '{s}'")))
    }
}

/// Rolle eines Listeners im Raum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rolle {
    Sender,
    Receiver,
}

impl Rolle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sender => "sender",
            Self::Receiver => "receiver",
        }
    }
}

impl std::fmt::Display for Rolle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rolle {
    type Err = KamerafunkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sender" => Ok(Self::Sender),
            "receiver" => Ok(Self::Receiver),
            andere => Err(KamerafunkError::Validierung(format!(
                "Unbekannte Rolle: '{andere}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raum_id_gueltig() {
        let id = RaumId::parse("a1B2c3", MAX_KENNUNG_LAENGE).unwrap();
        assert_eq!(id.as_str(), "a1B2c3");
        assert_eq!(id.to_string(), "a1B2c3");
    }

    #[test]
    fn raum_id_leer_abgelehnt() {
        let fehler = RaumId::parse("", MAX_KENNUNG_LAENGE).unwrap_err();
        assert!(matches!(fehler, KamerafunkError::Validierung(_)));
    }

    #[test]
    fn raum_id_zu_lang_abgelehnt() {
        let lang = "a".repeat(17);
        assert!(RaumId::parse(&lang, 16).is_err());
        assert!(RaumId::parse(&lang[..16], 16).is_ok());
    }

    #[test]
    fn raum_id_mit_leerzeichen_abgelehnt() {
        assert!(RaumId::parse("ab cd", MAX_KENNUNG_LAENGE).is_err());
        assert!(RaumId::parse("ab\ncd", MAX_KENNUNG_LAENGE).is_err());
        assert!(RaumId::parse("abcö", MAX_KENNUNG_LAENGE).is_err());
    }

    #[test]
    fn raum_id_unterscheidet_gross_klein() {
        let a = RaumId::parse("abc", MAX_KENNUNG_LAENGE).unwrap();
        let b = RaumId::parse("ABC", MAX_KENNUNG_LAENGE).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn rolle_parsen() {
        assert_eq!("sender".parse::<Rolle>().unwrap(), Rolle::Sender);
        assert_eq!("receiver".parse::<Rolle>().unwrap(), Rolle::Receiver);
        assert!("Sender".parse::<Rolle>().is_err());
        assert!("viewer".parse::<Rolle>().is_err());
    }

    #[test]
    fn listener_id_parsen() {
        assert_eq!("42".parse::<ListenerId>().unwrap(), ListenerId(42));
        assert!("abc".parse::<ListenerId>().is_err());
        assert!("".parse::<ListenerId>().is_err());
    }

    #[test]
    fn rolle_ist_serde_kompatibel() {
        let json = serde_json::to_string(&Rolle::Receiver).unwrap();
        assert_eq!(json, "\"receiver\"");
        let rolle: Rolle = serde_json::from_str("\"sender\"").unwrap();
        assert_eq!(rolle, Rolle::Sender);
    }
}
