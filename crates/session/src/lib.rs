//! kamerafunk-session – Client-seitige Peer-Sitzungen
//!
//! Sender und Receiver sind reine Zustandsautomaten ([`SenderSitzung`],
//! [`EmpfaengerSitzung`]): sie nehmen [`Ereignis`]se entgegen und liefern
//! [`Aktion`]en. Der [`treiber`] fuehrt diese gegen einen [`RelayTransport`]
//! und eine [`PeerFabrik`] aus.
//!
//! ## Module
//! - `types` - Ereignisse, Aktionen, Status, Timer
//! - `sender` / `empfaenger` - die beiden Automaten
//! - `chiffre` - Verschluesselung der Signal-Payloads
//! - `relay` - Relay-Anbindung (HTTP + SSE)
//! - `sse` - inkrementeller SSE-Parser
//! - `treiber` - async Ereignisschleife mit Reconnect

pub mod chiffre;
pub mod empfaenger;
pub mod error;
pub mod relay;
pub mod sender;
pub mod sse;
pub mod treiber;
pub mod types;

pub use chiffre::SignalChiffre;
pub use empfaenger::EmpfaengerSitzung;
pub use error::{SessionError, SessionResult};
pub use relay::{HttpRelay, RelayTransport, SignalStream};
pub use sender::SenderSitzung;
pub use sse::{SseEreignis, SseParser};
pub use treiber::{ausfuehren, Anzeige, PeerFabrik, PeerMelder, Steuerung, TreiberKonfig};
pub use types::{
    Aktion, Ereignis, SitzungsStatus, Sitzung, VerbindungsId, Zeitgeber, ZeitgeberArt,
};
