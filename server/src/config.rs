//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Relay ohne Konfigurationsdatei
//! lauffaehig ist.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Context};
use kamerafunk_core::MAX_KENNUNG_LAENGE;
use kamerafunk_observability::logging::{log_format_gueltig, log_level_gueltig};
use kamerafunk_signaling::RelayKonfig;
use serde::{Deserialize, Serialize};

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Relay-Parameter (Keepalive, Queues, Aufraeumen)
    pub relay: RelayEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Observability-Einstellungen (Metriken, Health)
    pub observability: ObservabilityEinstellungen,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename (nur fuer Logs)
    pub name: String,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "Kamerafunk Relay".into(),
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse fuer alle Listener
    pub bind_adresse: String,
    /// Port der Relay-HTTP-Schnittstelle
    pub http_port: u16,
    /// CORS-Origins (leer = alle erlaubt)
    pub cors_origins: Vec<String>,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            http_port: 3000,
            cors_origins: vec![],
        }
    }
}

/// Relay-Parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayEinstellungen {
    /// Abstand der Keepalive-Kommentare in Sekunden
    pub keepalive_sekunden: u64,
    /// Groesse der Send-Queue pro Listener
    pub send_queue_groesse: usize,
    /// Wie lange ein leerer Raum bestehen bleibt (Sekunden)
    pub raum_gnadenfrist_sekunden: u64,
    /// Intervall des Aufraeum-Tasks (Sekunden)
    pub aufraeum_intervall_sekunden: u64,
    /// Maximale Laenge einer Raum-Kennung
    pub max_kennung_laenge: usize,
}

impl Default for RelayEinstellungen {
    fn default() -> Self {
        Self {
            keepalive_sekunden: 60,
            send_queue_groesse: 64,
            raum_gnadenfrist_sekunden: 300,
            aufraeum_intervall_sekunden: 30,
            max_kennung_laenge: MAX_KENNUNG_LAENGE,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Observability-Einstellungen (Metriken + Health-Check)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityEinstellungen {
    /// Aktiviert den Observability-Server
    pub aktiviert: bool,
    /// Port fuer Metriken und Health (Standard: 9300)
    pub port: u16,
}

impl Default for ObservabilityEinstellungen {
    fn default() -> Self {
        Self {
            aktiviert: true,
            port: 9300,
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        let config = match std::fs::read_to_string(pfad) {
            Ok(inhalt) => Self::aus_toml(&inhalt)
                .with_context(|| format!("Konfigurationsfehler in '{pfad}'"))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Self::default()
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Konfigurationsdatei '{pfad}' nicht lesbar"))
            }
        };
        config.validieren()?;
        Ok(config)
    }

    /// Parst eine Konfiguration aus einem TOML-String
    pub fn aus_toml(inhalt: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(inhalt)?)
    }

    /// Prueft Werte, die serde allein nicht abfangen kann
    pub fn validieren(&self) -> anyhow::Result<()> {
        if !log_level_gueltig(&self.logging.level) {
            bail!("Ungueltiger Log-Level: '{}'", self.logging.level);
        }
        if !log_format_gueltig(&self.logging.format) {
            bail!("Ungueltiges Log-Format: '{}'", self.logging.format);
        }
        let relay = &self.relay;
        if relay.keepalive_sekunden == 0 || relay.aufraeum_intervall_sekunden == 0 {
            bail!("Keepalive und Aufraeum-Intervall muessen groesser als 0 sein");
        }
        if relay.send_queue_groesse == 0 {
            bail!("send_queue_groesse muss groesser als 0 sein");
        }
        if relay.max_kennung_laenge == 0 {
            bail!("max_kennung_laenge muss groesser als 0 sein");
        }
        self.http_bind_adresse()?;
        self.observability_bind_adresse()?;
        Ok(())
    }

    /// Baut die Laufzeit-Konfiguration des Relays
    pub fn relay_konfig(&self) -> RelayKonfig {
        RelayKonfig {
            keepalive: Duration::from_secs(self.relay.keepalive_sekunden),
            send_queue_groesse: self.relay.send_queue_groesse,
            raum_gnadenfrist: Duration::from_secs(self.relay.raum_gnadenfrist_sekunden),
            aufraeum_intervall: Duration::from_secs(self.relay.aufraeum_intervall_sekunden),
            max_kennung_laenge: self.relay.max_kennung_laenge,
        }
    }

    /// Gibt die Bind-Adresse fuer die Relay-HTTP-Schnittstelle zurueck
    pub fn http_bind_adresse(&self) -> anyhow::Result<SocketAddr> {
        self.adresse(self.netzwerk.http_port)
    }

    /// Gibt die Bind-Adresse fuer den Observability-Server zurueck
    pub fn observability_bind_adresse(&self) -> anyhow::Result<SocketAddr> {
        self.adresse(self.observability.port)
    }

    fn adresse(&self, port: u16) -> anyhow::Result<SocketAddr> {
        format!("{}:{port}", self.netzwerk.bind_adresse)
            .parse()
            .with_context(|| format!("Ungueltige Bind-Adresse '{}'", self.netzwerk.bind_adresse))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_config_ist_valide() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.netzwerk.http_port, 3000);
        assert_eq!(cfg.relay.keepalive_sekunden, 60);
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.observability.aktiviert);
        cfg.validieren().unwrap();
    }

    #[test]
    fn bind_adressen() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.http_bind_adresse().unwrap().to_string(), "0.0.0.0:3000");
        assert_eq!(
            cfg.observability_bind_adresse().unwrap().to_string(),
            "0.0.0.0:9300"
        );
    }

    #[test]
    fn config_aus_toml_string() {
        let cfg = ServerConfig::aus_toml(
            r#"
            [netzwerk]
            http_port = 8080
            cors_origins = ["https://kamera.example"]

            [relay]
            keepalive_sekunden = 15
        "#,
        )
        .unwrap();
        assert_eq!(cfg.netzwerk.http_port, 8080);
        assert_eq!(cfg.netzwerk.cors_origins, vec!["https://kamera.example"]);
        // Nicht angegebene Felder behalten Standardwerte
        assert_eq!(cfg.netzwerk.bind_adresse, "0.0.0.0");
        assert_eq!(cfg.relay.send_queue_groesse, 64);

        let relay = cfg.relay_konfig();
        assert_eq!(relay.keepalive, Duration::from_secs(15));
        assert_eq!(relay.raum_gnadenfrist, Duration::from_secs(300));
    }

    #[test]
    fn ungueltige_werte_werden_abgelehnt() {
        let mut cfg = ServerConfig::default();
        cfg.logging.level = "laut".into();
        assert!(cfg.validieren().is_err());

        let mut cfg = ServerConfig::default();
        cfg.relay.keepalive_sekunden = 0;
        assert!(cfg.validieren().is_err());

        let mut cfg = ServerConfig::default();
        cfg.netzwerk.bind_adresse = "kein host".into();
        assert!(cfg.validieren().is_err());

        assert!(ServerConfig::aus_toml("[netzwerk]\nhttp_port = \"x\"").is_err());
    }

    #[test]
    fn fehlende_datei_liefert_standardwerte() {
        let cfg = ServerConfig::laden("/nicht/vorhanden/kamerafunk.toml").unwrap();
        assert_eq!(cfg.netzwerk.http_port, 3000);
    }
}
