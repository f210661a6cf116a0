//! Axum HTTP-Server fuer den Relay

use std::net::SocketAddr;

use anyhow::Result;
use axum::middleware;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::rest::middleware::cors_layer;
use crate::rest::{routes::relay_router, HttpState};
use kamerafunk_observability::timing_middleware;

/// REST-Server-Konfiguration
#[derive(Debug, Clone)]
pub struct RestServerKonfig {
    pub bind_addr: SocketAddr,
    /// Erlaubte CORS-Origins. Leer = alle Origins erlaubt.
    pub cors_origins: Vec<String>,
}

impl Default for RestServerKonfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            cors_origins: vec![],
        }
    }
}

/// Baut die vollstaendige Axum-App mit allen Layern
pub fn app_bauen(state: HttpState, cors_origins: &[String]) -> Router {
    relay_router()
        // Timing als innersten Layer (sieht das Routen-Muster)
        .layer(middleware::from_fn_with_state(
            state.metriken.clone(),
            timing_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

/// Axum HTTP-Server fuer den Relay
pub struct RestServer {
    konfig: RestServerKonfig,
}

impl RestServer {
    pub fn neu(konfig: RestServerKonfig) -> Self {
        Self { konfig }
    }

    /// Startet den REST-Server und laeuft bis zum Shutdown-Signal im State
    ///
    /// Offene SSE-Streams enden ueber denselben Kanal, danach wartet der
    /// Server auf laufende Anfragen.
    pub async fn starten(self, state: HttpState) -> Result<()> {
        let mut shutdown_rx = state.shutdown_rx.clone();
        let app = app_bauen(state, &self.konfig.cors_origins);

        let listener = tokio::net::TcpListener::bind(self.konfig.bind_addr).await?;
        tracing::info!(addr = %self.konfig.bind_addr, "Relay-HTTP-Server gestartet");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                while !*shutdown_rx.borrow_and_update() {
                    if shutdown_rx.changed().await.is_err() {
                        break;
                    }
                }
                tracing::info!("Relay-HTTP-Server faehrt herunter");
            })
            .await?;
        Ok(())
    }
}
