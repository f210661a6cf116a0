//! SSE-Handler: Push-Stream eines Listeners
//!
//! Frame-Folge auf dem Draht:
//! 1. sofort ein leerer Kommentar (`:`), damit Proxies die Header flushen
//! 2. pro Signal ein benanntes Event (`event: offer` / `data: ...`)
//! 3. alle `keepalive` Sekunden ein Kommentar-Frame
//!
//! Der Stream endet beim Herunterfahren oder wenn der Client trennt. In
//! beiden Faellen wird das Abonnement gedroppt und der Listener verlaesst
//! den Raum.

use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::{stream, Stream, StreamExt};
use kamerafunk_core::SignalNachricht;
use kamerafunk_signaling::Abonnement;
use tokio::sync::watch;

use crate::error::{HttpFehler, HttpResult};
use crate::rest::HttpState;

/// `GET /connections/:kennung/events/:rolle`
pub async fn events(
    State(state): State<HttpState>,
    Path((kennung, rolle)): Path<(String, String)>,
) -> HttpResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    if state.faehrt_herunter() {
        return Err(HttpFehler::Herunterfahren);
    }

    let abo = state.relay.stream_oeffnen(&kennung, &rolle)?;
    tracing::debug!(
        raum = %abo.raum_id(),
        listener = %abo.listener_id(),
        rolle = %abo.rolle(),
        "SSE-Stream geoeffnet"
    );
    state.stand_melden();
    let abo = GemeldetesAbonnement {
        abo: Some(abo),
        state: state.clone(),
    };

    let metriken = state.metriken.clone();
    let signale = abo.map(move |nachricht| {
        metriken.signal_zaehlen(nachricht.art.as_str());
        Ok::<_, Infallible>(
            Event::default()
                .event(nachricht.art.as_str())
                .data(nachricht.daten),
        )
    });

    let stream = stream::once(async { Ok::<_, Infallible>(Event::default().comment("")) })
        .chain(signale)
        .take_until(herunterfahren(state.shutdown_rx.clone()));

    let keepalive = state.relay.konfig().keepalive;
    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(keepalive)))
}

/// Abonnement, das beim Schliessen den Relay-Stand neu meldet
struct GemeldetesAbonnement {
    abo: Option<Abonnement>,
    state: HttpState,
}

impl Stream for GemeldetesAbonnement {
    type Item = SignalNachricht;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.abo.as_mut() {
            Some(abo) => abo.poll_next_unpin(cx),
            None => Poll::Ready(None),
        }
    }
}

impl Drop for GemeldetesAbonnement {
    fn drop(&mut self) {
        // Erst den Listener austragen, dann zaehlen
        drop(self.abo.take());
        self.state.stand_melden();
    }
}

/// Wird fertig sobald der Shutdown-Kanal `true` meldet
///
/// Ist der Sender verschwunden, kommt kein Shutdown mehr und die Future
/// bleibt fuer immer ausstehend.
async fn herunterfahren(mut shutdown_rx: watch::Receiver<bool>) {
    loop {
        if *shutdown_rx.borrow_and_update() {
            return;
        }
        if shutdown_rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
