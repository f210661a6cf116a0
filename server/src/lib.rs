//! kamerafunk-server – Bibliotheks-Root
//!
//! Verdrahtet Registry, HTTP-Schnittstelle, Aufraeum-Task und
//! Observability zu einem lauffaehigen Relay.

pub mod config;

use anyhow::{Context, Result};
use config::ServerConfig;
use kamerafunk_http::{HttpState, RestServer, RestServerKonfig};
use kamerafunk_observability::{observability_server_starten, HealthState, KamerafunkMetrics};
use kamerafunk_signaling::{RegistryStatistik, RelayService, RoomRegistry};
use tokio::sync::watch;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet alle Subsysteme und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Metriken, Health-State und Registry anlegen
    /// 2. Aufraeum-Task starten
    /// 3. Relay-HTTP-Server und Observability-Server starten
    /// 4. Auf Ctrl-C warten, dann Streams beenden und Server herunterfahren
    pub async fn starten(self) -> Result<()> {
        let http_addr = self.config.http_bind_adresse()?;
        let relay_konfig = self.config.relay_konfig();

        tracing::info!(
            server_name = %self.config.server.name,
            http = %http_addr,
            keepalive = ?relay_konfig.keepalive,
            "Server startet"
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let metriken = KamerafunkMetrics::neu().context("Metriken konnten nicht registriert werden")?;
        let health = HealthState::neu();
        let registry = RoomRegistry::neu();

        // Entfernte Raeume tauchen erst nach dem Aufraeum-Durchlauf in Gauges und Health auf
        let aufraeumer = registry.aufraeumen_starten(
            relay_konfig.aufraeum_intervall,
            relay_konfig.raum_gnadenfrist,
            shutdown_rx.clone(),
            stand_melden(metriken.clone(), health.clone()),
        );

        let relay = RelayService::neu(registry, relay_konfig);
        let http_state = HttpState::neu(relay, metriken.clone(), health.clone(), shutdown_rx.clone());
        let rest = RestServer::neu(RestServerKonfig {
            bind_addr: http_addr,
            cors_origins: self.config.netzwerk.cors_origins.clone(),
        });
        let mut rest_task = tokio::spawn(rest.starten(http_state));

        let observability_task = if self.config.observability.aktiviert {
            let addr = self.config.observability_bind_adresse()?;
            Some(tokio::spawn(observability_server_starten(
                addr,
                metriken,
                health.clone(),
                shutdown_rx.clone(),
            )))
        } else {
            tracing::info!("Observability-Server deaktiviert");
            None
        };

        tracing::info!("Relay laeuft. Warte auf Shutdown-Signal (Ctrl-C)...");
        tokio::select! {
            ergebnis = tokio::signal::ctrl_c() => {
                ergebnis.context("Ctrl-C-Handler konnte nicht installiert werden")?;
                tracing::info!("Shutdown-Signal empfangen, Relay wird beendet");
            }
            ergebnis = &mut rest_task => {
                // Vorzeitiges Ende ist immer ein Fehler (z.B. Port belegt)
                health.herunterfahren();
                let _ = shutdown_tx.send(true);
                ergebnis.context("Relay-HTTP-Task abgebrochen")??;
                anyhow::bail!("Relay-HTTP-Server unerwartet beendet");
            }
        }

        health.herunterfahren();
        let _ = shutdown_tx.send(true);

        rest_task.await.context("Relay-HTTP-Task abgebrochen")??;
        if let Some(task) = observability_task {
            task.await.context("Observability-Task abgebrochen")??;
        }
        let _ = aufraeumer.await;

        tracing::info!("Relay beendet");
        Ok(())
    }
}

/// Callback fuer den Aufraeum-Task: Statistik in Metriken und Health spiegeln
fn stand_melden(
    metriken: KamerafunkMetrics,
    health: HealthState,
) -> impl Fn(&RegistryStatistik, usize) + Send + 'static {
    move |statistik, entfernt| {
        metriken.relay_stand_setzen(statistik.raeume, statistik.sender, statistik.receiver);
        metriken.rooms_evicted_total.inc_by(entfernt as u64);
        health.relay_stand_setzen(statistik.raeume, statistik.listener);
    }
}
