//! Prometheus-kompatible Metriken fuer Kamerafunk
//!
//! Registrierte Metriken:
//! - `kamerafunk_rooms_active` – Gauge: Raeume in der Registry
//! - `kamerafunk_listeners_connected{rolle}` – Gauge: Offene Streams pro Rolle
//! - `kamerafunk_signals_total{art}` – Counter: An Listener ausgelieferte Signale
//! - `kamerafunk_rooms_evicted_total` – Counter: Vom Aufraeum-Task entfernte Raeume
//! - `kamerafunk_http_requests_total` – Counter: HTTP-Anfragen (method, path, status)
//! - `kamerafunk_http_request_duration_seconds` – Histogram: HTTP-Antwortzeit

use anyhow::Result;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use std::sync::Arc;

/// Alle Kamerafunk-Prometheus-Metriken
#[derive(Clone)]
pub struct KamerafunkMetrics {
    pub registry: Arc<Registry>,

    // Relay-Metriken
    pub rooms_active: IntGauge,
    pub listeners_connected: IntGaugeVec,
    pub signals_total: IntCounterVec,
    pub rooms_evicted_total: IntCounter,

    // HTTP-Metriken
    pub http_requests_total: IntCounterVec,
    pub http_request_duration_seconds: HistogramVec,
}

impl KamerafunkMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        // --- Relay-Metriken ---
        let rooms_active = IntGauge::with_opts(Opts::new(
            "kamerafunk_rooms_active",
            "Anzahl Raeume in der Registry",
        ))?;
        registry.register(Box::new(rooms_active.clone()))?;

        let listeners_connected = IntGaugeVec::new(
            Opts::new(
                "kamerafunk_listeners_connected",
                "Anzahl offener Push-Streams pro Rolle",
            ),
            &["rolle"],
        )?;
        registry.register(Box::new(listeners_connected.clone()))?;

        let signals_total = IntCounterVec::new(
            Opts::new(
                "kamerafunk_signals_total",
                "An Listener ausgelieferte Signal-Nachrichten",
            ),
            &["art"],
        )?;
        registry.register(Box::new(signals_total.clone()))?;

        let rooms_evicted_total = IntCounter::with_opts(Opts::new(
            "kamerafunk_rooms_evicted_total",
            "Vom Aufraeum-Task entfernte leere Raeume",
        ))?;
        registry.register(Box::new(rooms_evicted_total.clone()))?;

        // --- HTTP-Metriken ---
        let http_requests_total = IntCounterVec::new(
            Opts::new("kamerafunk_http_requests_total", "Gesamtanzahl HTTP-Anfragen"),
            &["method", "path", "status"],
        )?;
        registry.register(Box::new(http_requests_total.clone()))?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "kamerafunk_http_request_duration_seconds",
                "HTTP-Antwortzeit in Sekunden",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
            &["method", "path"],
        )?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            rooms_active,
            listeners_connected,
            signals_total,
            rooms_evicted_total,
            http_requests_total,
            http_request_duration_seconds,
        })
    }

    /// Uebernimmt eine Momentaufnahme der Registry in die Gauges
    pub fn relay_stand_setzen(&self, raeume: usize, sender: usize, receiver: usize) {
        self.rooms_active.set(raeume as i64);
        self.listeners_connected
            .with_label_values(&["sender"])
            .set(sender as i64);
        self.listeners_connected
            .with_label_values(&["receiver"])
            .set(receiver as i64);
    }

    /// Zaehlt ein ausgeliefertes Signal
    pub fn signal_zaehlen(&self, art: &str) {
        self.signals_total.with_label_values(&[art]).inc();
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: KamerafunkMetrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(State(metriken): State<KamerafunkMetrics>) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
