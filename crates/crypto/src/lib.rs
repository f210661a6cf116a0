//! # kamerafunk-crypto
//!
//! Schluesselpaar und Signal-Verschluesselung fuer Kamerafunk.
//!
//! Offer und Answer verlassen den Client nur verschluesselt. Der Relay
//! routet nach dem oeffentlichen Schluessel und kann den Inhalt nicht lesen.
//!
//! ## Module
//! - `schluessel` - X25519-Schluesselpaar, Link-Helfer, Ver-/Entschluesselung
//! - `error` - Fehlertypen

pub mod error;
pub mod schluessel;

// Bequeme Re-Exports
pub use error::{CryptoError, CryptoResult};
pub use schluessel::{Schluesselpaar, NONCE_LAENGE};
