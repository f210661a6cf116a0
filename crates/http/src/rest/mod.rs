//! REST/SSE-Interface des Relays

pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;

use axum::extract::FromRef;
use kamerafunk_observability::{HealthState, KamerafunkMetrics};
use kamerafunk_signaling::RelayService;
use tokio::sync::watch;

/// Axum-State fuer den REST-Server
#[derive(Clone)]
pub struct HttpState {
    pub relay: RelayService,
    pub metriken: KamerafunkMetrics,
    pub health: HealthState,
    /// Wechselt auf `true` beim Herunterfahren; beendet offene Streams
    pub shutdown_rx: watch::Receiver<bool>,
}

impl HttpState {
    pub fn neu(
        relay: RelayService,
        metriken: KamerafunkMetrics,
        health: HealthState,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            relay,
            metriken,
            health,
            shutdown_rx,
        }
    }

    pub fn faehrt_herunter(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    /// Spiegelt die aktuelle Registry-Statistik in Gauges und Health
    pub fn stand_melden(&self) {
        let statistik = self.relay.registry().statistik();
        self.metriken
            .relay_stand_setzen(statistik.raeume, statistik.sender, statistik.receiver);
        self.health
            .relay_stand_setzen(statistik.raeume, statistik.listener);
    }
}

impl FromRef<HttpState> for HealthState {
    fn from_ref(state: &HttpState) -> Self {
        state.health.clone()
    }
}

impl FromRef<HttpState> for KamerafunkMetrics {
    fn from_ref(state: &HttpState) -> Self {
        state.metriken.clone()
    }
}

pub use server::{RestServer, RestServerKonfig};
