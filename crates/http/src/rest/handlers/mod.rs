//! REST-Handler Module

pub mod answer;
pub mod offer;
pub mod stream;

use serde::Deserialize;

/// Formular-Body mit einem Offer- oder Answer-Blob
#[derive(Debug, Default, Deserialize)]
pub struct NutzlastForm {
    pub daten: Option<String>,
}
