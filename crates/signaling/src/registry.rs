//! RoomRegistry – Prozessweite Zuordnung Kennung -> Raum
//!
//! Raeume werden beim ersten Zugriff atomar angelegt (kein Race zwischen
//! zwei gleichzeitigen ersten Zugriffen). Leere Raeume bleiben eine
//! Gnadenfrist lang bestehen und werden dann vom Aufraeum-Task entfernt.

use dashmap::DashMap;
use kamerafunk_core::{ListenerId, RaumId};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use crate::room::Room;

// ---------------------------------------------------------------------------
// Statistik
// ---------------------------------------------------------------------------

/// Momentaufnahme der Registry (fuer Health-Check und Metriken)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStatistik {
    pub raeume: usize,
    pub listener: usize,
    pub sender: usize,
    pub receiver: usize,
    /// Seit dem Start entfernte Raeume
    pub entfernt_gesamt: u64,
}

// ---------------------------------------------------------------------------
// RoomRegistry
// ---------------------------------------------------------------------------

/// Verwaltet alle Raeume des Prozesses
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct RoomRegistry {
    inner: Arc<RoomRegistryInner>,
}

struct RoomRegistryInner {
    raeume: DashMap<RaumId, Arc<Room>>,
    /// Naechste zu vergebende Listener-ID
    naechste_id: AtomicU64,
    entfernt_gesamt: AtomicU64,
}

impl RoomRegistry {
    pub fn neu() -> Self {
        Self {
            inner: Arc::new(RoomRegistryInner {
                raeume: DashMap::new(),
                naechste_id: AtomicU64::new(1),
                entfernt_gesamt: AtomicU64::new(0),
            }),
        }
    }

    /// Gibt den Raum zur Kennung zurueck und legt ihn bei Bedarf an
    pub fn hole_oder_erzeuge(&self, id: &RaumId) -> Arc<Room> {
        if let Some(room) = self.inner.raeume.get(id) {
            return Arc::clone(room.value());
        }
        let room = self
            .inner
            .raeume
            .entry(id.clone())
            .or_insert_with(|| {
                tracing::debug!(raum = %id, "Raum angelegt");
                Arc::new(Room::neu(id.clone()))
            });
        Arc::clone(room.value())
    }

    /// Sucht einen Raum ohne ihn anzulegen
    pub fn finden(&self, id: &RaumId) -> Option<Arc<Room>> {
        self.inner.raeume.get(id).map(|r| Arc::clone(r.value()))
    }

    /// Vergibt die naechste Listener-ID (monoton, prozessweit eindeutig)
    pub fn naechste_listener_id(&self) -> ListenerId {
        ListenerId(self.inner.naechste_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raum_anzahl(&self) -> usize {
        self.inner.raeume.len()
    }

    pub fn statistik(&self) -> RegistryStatistik {
        let mut statistik = RegistryStatistik {
            raeume: self.inner.raeume.len(),
            entfernt_gesamt: self.inner.entfernt_gesamt.load(Ordering::Relaxed),
            ..Default::default()
        };
        for eintrag in self.inner.raeume.iter() {
            let room = eintrag.value();
            let sender = room.sender_anzahl();
            let receiver = room.receiver_anzahl();
            statistik.sender += sender;
            statistik.receiver += receiver;
            statistik.listener += sender + receiver;
        }
        statistik
    }

    /// Entfernt Raeume die laenger als `gnadenfrist` leer sind
    ///
    /// Ein Raum auf den noch jemand ausserhalb der Registry eine Referenz
    /// haelt (laufende Anfrage, Abonnement) wird nie entfernt.
    pub fn aufraeumen(&self, gnadenfrist: Duration) -> usize {
        let mut entfernt = 0;
        self.inner.raeume.retain(|id, room| {
            let behalten = Arc::strong_count(room) > 1 || !room.ist_verwaist(gnadenfrist);
            if !behalten {
                tracing::debug!(raum = %id, "Verwaisten Raum entfernt");
                entfernt += 1;
            }
            behalten
        });
        if entfernt > 0 {
            self.inner
                .entfernt_gesamt
                .fetch_add(entfernt as u64, Ordering::Relaxed);
            tracing::info!(
                entfernt,
                verbleibend = self.inner.raeume.len(),
                "Verwaiste Raeume aufgeraeumt"
            );
        }
        entfernt
    }

    /// Startet den periodischen Aufraeum-Task
    ///
    /// `nach_durchlauf` wird nach jedem Durchlauf mit der aktuellen Statistik
    /// und der Anzahl entfernter Raeume aufgerufen (z.B. fuer Gauges).
    /// Der Task endet, sobald `shutdown_rx` auf `true` wechselt.
    pub fn aufraeumen_starten<F>(
        &self,
        intervall: Duration,
        gnadenfrist: Duration,
        mut shutdown_rx: watch::Receiver<bool>,
        nach_durchlauf: F,
    ) -> tokio::task::JoinHandle<()>
    where
        F: Fn(&RegistryStatistik, usize) + Send + 'static,
    {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(intervall);
            ticker.tick().await; // Ersten Tick ueberspringen

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let entfernt = registry.aufraeumen(gnadenfrist);
                        nach_durchlauf(&registry.statistik(), entfernt);
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::debug!("Aufraeum-Task beendet");
                            break;
                        }
                    }
                }
            }
        })
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
