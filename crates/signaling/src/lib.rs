//! kamerafunk-signaling – Signaling-Relay
//!
//! Dieser Crate implementiert den zustandsbehafteten Kern des Relays: pro
//! Kennung einen Raum mit registrierten Listenern (Push-Streams) und dem
//! zuletzt gesendeten, verschluesselten Offer. Der Relay versteht den
//! Inhalt der Nachrichten nie.
//!
//! ## Architektur
//!
//! ```text
//! HTTP/SSE-Schicht (kamerafunk-http)
//!     |
//!     v
//! RelayService  (Validierung, Boundary-Operationen)
//!     |
//!     v
//! RoomRegistry  (Kennung -> Arc<Room>, atomares get-or-insert, Aufraeumen)
//!     |
//!     v
//! Room          (Listener-Liste + Offer-Cache hinter einem Mutex)
//!     |
//!     +-- Listener (Rolle, ID, Send-Queue)  <-- Abonnement (Stream + Guard)
//! ```

pub mod error;
pub mod listener;
pub mod registry;
pub mod room;
pub mod service;

// Bequeme Re-Exporte
pub use error::{SignalingError, SignalingResult};
pub use listener::{Abonnement, Listener, ListenerSender, Zustellung};
pub use registry::{RegistryStatistik, RoomRegistry};
pub use room::Room;
pub use service::{RelayKonfig, RelayService};
