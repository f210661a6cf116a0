//! kamerafunk-http – HTTP/SSE-Schnittstelle des Signaling-Relays
//!
//! Bildet die fuenf Relay-Operationen auf HTTP ab:
//!
//! | Methode | Pfad                                   | Operation         |
//! |---------|----------------------------------------|-------------------|
//! | GET     | `/connections/:kennung/events/:rolle`  | Stream oeffnen    |
//! | POST    | `/connections/:kennung/offer`          | Offer einreichen  |
//! | DELETE  | `/connections/:kennung/offer`          | Offer loeschen    |
//! | POST    | `/connections/:kennung/answer`         | Answer einreichen |
//! | POST    | `/connections/:kennung/resend`         | Offer erneut      |
//!
//! Bodies sind `application/x-www-form-urlencoded` (`daten`, `receiver_id`).

pub mod error;
pub mod rest;

pub use error::{HttpFehler, HttpResult};
pub use rest::server::app_bauen;
pub use rest::{HttpState, RestServer, RestServerKonfig};
