//! Structured Logging Setup via tracing-subscriber
//!
//! Konfigurierbar per Umgebungsvariable (hat Vorrang vor der Config-Datei):
//! - `KF_LOG_LEVEL`: Log-Level bzw. EnvFilter-Direktive, Standard: info
//! - `KF_LOG_FORMAT`: Format (text/json), Standard: text

use tracing_subscriber::{fmt, EnvFilter};

/// Umgebungsvariable fuer den Log-Level
pub const ENV_LOG_LEVEL: &str = "KF_LOG_LEVEL";
/// Umgebungsvariable fuer das Log-Format
pub const ENV_LOG_FORMAT: &str = "KF_LOG_FORMAT";

/// Initialisiert das Logging-System.
///
/// Liest `KF_LOG_LEVEL` und `KF_LOG_FORMAT` aus der Umgebung und faellt
/// auf die uebergebenen Werte aus der Konfiguration zurueck.
/// Ein bereits installierter globaler Subscriber ist ein Fehler.
pub fn logging_initialisieren(level: &str, format: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_env(ENV_LOG_LEVEL)
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let format = format_waehlen(std::env::var(ENV_LOG_FORMAT).ok(), format);

    let ergebnis = match format {
        "json" => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_current_span(true)
            .try_init(),
        _ => fmt().with_env_filter(filter).with_target(true).try_init(),
    };
    ergebnis.map_err(|e| anyhow::anyhow!("Logging-Initialisierung fehlgeschlagen: {e}"))
}

/// Waehlt das Log-Format: Umgebung vor Konfiguration, unbekannt -> text
fn format_waehlen<'a>(aus_env: Option<String>, aus_konfig: &'a str) -> &'a str {
    match aus_env.as_deref() {
        Some("json") => "json",
        Some(_) => "text",
        None if log_format_gueltig(aus_konfig) => aus_konfig,
        None => "text",
    }
}

/// Validiert ob ein Log-Level-String gueltig ist.
pub fn log_level_gueltig(level: &str) -> bool {
    matches!(level, "trace" | "debug" | "info" | "warn" | "error")
}

/// Validiert ob ein Log-Format-String gueltig ist.
pub fn log_format_gueltig(format: &str) -> bool {
    matches!(format, "text" | "json")
}
