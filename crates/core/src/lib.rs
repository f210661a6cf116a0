//! kamerafunk-core – Gemeinsame Typen, Signal-Nachrichten und Fehlerklassen
//!
//! Dieses Crate stellt die fundamentalen Bausteine bereit, die vom Relay
//! (Server) und von den Sitzungen (Client) gemeinsam genutzt werden.

pub mod error;
pub mod signal;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{FehlerKlasse, KamerafunkError, Result};
pub use signal::{SignalArt, SignalNachricht};
pub use types::{ListenerId, RaumId, Rolle, MAX_KENNUNG_LAENGE};
