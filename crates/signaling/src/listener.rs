//! Listener – Ein offener Push-Stream in einem Raum
//!
//! Ein Listener besteht aus Rolle, vom Server vergebener ID und dem
//! Sende-Ende einer begrenzten Queue. Das Lese-Ende gehoert dem
//! `Abonnement`, das die HTTP-Schicht als Stream ausliefert.
//!
//! ## Lebenszyklus
//! - `Room::beitreten` erzeugt Queue, Listener und Abonnement
//! - Die HTTP-Schicht besitzt das Abonnement fuer die Dauer der Verbindung
//! - Drop des Abonnements (Client weg, Timeout, Shutdown) entfernt den
//!   Listener genau einmal aus dem Raum

use futures_util::Stream;
use kamerafunk_core::{ListenerId, RaumId, Rolle, SignalNachricht};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

use crate::room::Room;

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Standardgroesse der Send-Queue pro Listener
pub const SEND_QUEUE_GROESSE: usize = 64;

/// Untergrenze, damit Beitritts-Nachrichten immer Platz haben
const SEND_QUEUE_MINIMUM: usize = 4;

// ---------------------------------------------------------------------------
// ListenerSender
// ---------------------------------------------------------------------------

/// Ergebnis einer Zustellung an einen Listener
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zustellung {
    /// Nachricht eingereiht
    Zugestellt,
    /// Queue voll, Nachricht verworfen; der Raum trennt den Listener
    Verworfen,
    /// Queue geschlossen, der Client ist weg
    Geschlossen,
}

/// Handle auf die Send-Queue eines Listeners
#[derive(Clone, Debug)]
pub struct ListenerSender {
    pub listener_id: ListenerId,
    tx: mpsc::Sender<SignalNachricht>,
}

impl ListenerSender {
    /// Sendet eine Nachricht nicht-blockierend an den Listener
    pub fn senden(&self, nachricht: SignalNachricht) -> Zustellung {
        match self.tx.try_send(nachricht) {
            Ok(()) => Zustellung::Zugestellt,
            Err(mpsc::error::TrySendError::Full(n)) => {
                tracing::warn!(
                    listener = %self.listener_id,
                    art = %n.art,
                    "Send-Queue voll – Nachricht verworfen, Listener wird getrennt"
                );
                Zustellung::Verworfen
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(listener = %self.listener_id, "Send-Queue geschlossen (Client getrennt)");
                Zustellung::Geschlossen
            }
        }
    }
}

/// Ein im Raum registrierter Listener
#[derive(Clone, Debug)]
pub struct Listener {
    pub id: ListenerId,
    pub rolle: Rolle,
    pub sender: ListenerSender,
}

/// Erzeugt Listener und Lese-Ende der Queue
pub(crate) fn listener_kanal(
    id: ListenerId,
    rolle: Rolle,
    queue_groesse: usize,
) -> (Listener, mpsc::Receiver<SignalNachricht>) {
    let (tx, rx) = mpsc::channel(queue_groesse.max(SEND_QUEUE_MINIMUM));
    let listener = Listener {
        id,
        rolle,
        sender: ListenerSender { listener_id: id, tx },
    };
    (listener, rx)
}

// ---------------------------------------------------------------------------
// Abonnement
// ---------------------------------------------------------------------------

/// Entfernt den Listener beim Drop aus seinem Raum
struct ListenerGuard {
    room: Arc<Room>,
    id: ListenerId,
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.room.verlassen(self.id);
    }
}

/// Lese-Seite eines Listeners, als `Stream` von Signal-Nachrichten
///
/// Solange das Abonnement lebt, ist der Listener im Raum registriert.
pub struct Abonnement {
    id: ListenerId,
    rolle: Rolle,
    rx: mpsc::Receiver<SignalNachricht>,
    guard: ListenerGuard,
}

impl Abonnement {
    pub(crate) fn neu(
        room: Arc<Room>,
        id: ListenerId,
        rolle: Rolle,
        rx: mpsc::Receiver<SignalNachricht>,
    ) -> Self {
        Self {
            id,
            rolle,
            rx,
            guard: ListenerGuard { room, id },
        }
    }

    pub fn listener_id(&self) -> ListenerId {
        self.id
    }

    pub fn rolle(&self) -> Rolle {
        self.rolle
    }

    pub fn raum_id(&self) -> &RaumId {
        self.guard.room.id()
    }

    /// Empfaengt die naechste Nachricht
    pub async fn empfangen(&mut self) -> Option<SignalNachricht> {
        self.rx.recv().await
    }

    /// Nicht-blockierender Empfang (fuer Tests und Diagnose)
    pub fn try_empfangen(&mut self) -> Option<SignalNachricht> {
        self.rx.try_recv().ok()
    }
}

impl Stream for Abonnement {
    type Item = SignalNachricht;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl std::fmt::Debug for Abonnement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Abonnement")
            .field("id", &self.id)
            .field("rolle", &self.rolle)
            .field("raum", self.guard.room.id())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
