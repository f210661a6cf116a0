//! RelayService – Die fuenf Boundary-Operationen des Relays
//!
//! Jede Operation validiert ihre Eingaben vollstaendig, bevor ein Raum
//! nachgeschlagen oder angelegt wird. Ungueltige Anfragen veraendern also
//! nie den Zustand.

use kamerafunk_core::{ListenerId, RaumId, Rolle, MAX_KENNUNG_LAENGE};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{SignalingError, SignalingResult};
use crate::listener::{Abonnement, SEND_QUEUE_GROESSE};
use crate::registry::RoomRegistry;

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Laufzeit-Parameter des Relays
#[derive(Debug, Clone)]
pub struct RelayKonfig {
    /// Intervall der Keepalive-Kommentare auf offenen Streams
    pub keepalive: Duration,
    /// Groesse der Send-Queue pro Listener
    pub send_queue_groesse: usize,
    /// Wie lange ein leerer Raum bestehen bleibt
    pub raum_gnadenfrist: Duration,
    /// Intervall des Aufraeum-Tasks
    pub aufraeum_intervall: Duration,
    /// Maximale Laenge einer Raum-Kennung
    pub max_kennung_laenge: usize,
}

impl Default for RelayKonfig {
    fn default() -> Self {
        Self {
            keepalive: Duration::from_secs(60),
            send_queue_groesse: SEND_QUEUE_GROESSE,
            raum_gnadenfrist: Duration::from_secs(300),
            aufraeum_intervall: Duration::from_secs(30),
            max_kennung_laenge: MAX_KENNUNG_LAENGE,
        }
    }
}

// ---------------------------------------------------------------------------
// RelayService
// ---------------------------------------------------------------------------

/// Einstiegspunkt fuer die Transportschicht
///
/// Clone teilt Registry und Konfiguration.
#[derive(Clone)]
pub struct RelayService {
    registry: RoomRegistry,
    konfig: Arc<RelayKonfig>,
}

impl RelayService {
    pub fn neu(registry: RoomRegistry, konfig: RelayKonfig) -> Self {
        Self {
            registry,
            konfig: Arc::new(konfig),
        }
    }

    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    pub fn konfig(&self) -> &RelayKonfig {
        &self.konfig
    }

    /// Oeffnet einen Push-Stream fuer `rolle` im Raum `kennung`
    ///
    /// Der Listener bleibt registriert, bis das Abonnement gedroppt wird.
    pub fn stream_oeffnen(&self, kennung: &str, rolle: &str) -> SignalingResult<Abonnement> {
        let raum_id = self.kennung_pruefen(kennung)?;
        let rolle: Rolle = rolle.parse()?;

        let room = self.registry.hole_oder_erzeuge(&raum_id);
        let id = self.registry.naechste_listener_id();
        Ok(room.beitreten(id, rolle, self.konfig.send_queue_groesse))
    }

    /// Setzt das Offer des Raums und sendet es an alle Receiver
    pub fn offer_einreichen(&self, kennung: &str, daten: Option<&str>) -> SignalingResult<usize> {
        let raum_id = self.kennung_pruefen(kennung)?;
        let blob = nutzlast_pruefen(daten)?;

        let room = self.registry.hole_oder_erzeuge(&raum_id);
        Ok(room.offer_setzen(blob))
    }

    /// Leitet ein Answer an alle Sender des Raums weiter
    pub fn answer_einreichen(&self, kennung: &str, daten: Option<&str>) -> SignalingResult<usize> {
        let raum_id = self.kennung_pruefen(kennung)?;
        let blob = nutzlast_pruefen(daten)?;

        let room = self.registry.hole_oder_erzeuge(&raum_id);
        Ok(room.answer_weiterleiten(blob))
    }

    /// Verwirft das gecachte Offer (kein Broadcast)
    pub fn offer_loeschen(&self, kennung: &str) -> SignalingResult<()> {
        let raum_id = self.kennung_pruefen(kennung)?;
        if let Some(room) = self.registry.finden(&raum_id) {
            room.offer_loeschen();
        }
        Ok(())
    }

    /// Fordert das gecachte Offer erneut fuer einen Receiver an
    ///
    /// Eine unbekannte Receiver-ID ist kein harter Fehler: sie wird geloggt
    /// und mit `Ok(false)` quittiert, ebenso wie ein fehlendes Offer.
    pub fn offer_erneut_anfordern(
        &self,
        kennung: &str,
        receiver_id: Option<&str>,
    ) -> SignalingResult<bool> {
        let raum_id = self.kennung_pruefen(kennung)?;
        let receiver_id: ListenerId = receiver_id
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| SignalingError::validierung("receiver_id fehlt"))?
            .parse()?;

        let Some(room) = self.registry.finden(&raum_id) else {
            tracing::warn!(raum = %raum_id, listener = %receiver_id, "Resend fuer unbekannten Raum");
            return Ok(false);
        };

        match room.offer_erneut_senden(receiver_id) {
            Err(SignalingError::NichtGefunden(grund)) => {
                tracing::warn!(raum = %raum_id, listener = %receiver_id, %grund, "Resend fuer unbekannten Receiver");
                Ok(false)
            }
            andere => andere,
        }
    }

    fn kennung_pruefen(&self, kennung: &str) -> SignalingResult<RaumId> {
        Ok(RaumId::parse(kennung, self.konfig.max_kennung_laenge)?)
    }
}

/// Offer/Answer-Blobs muessen vorhanden und nicht leer sein
///
/// Ein Wagenruecklauf ist im SSE-Feld `data` nicht darstellbar und wird
/// deshalb abgelehnt.
fn nutzlast_pruefen(daten: Option<&str>) -> SignalingResult<String> {
    match daten {
        Some(blob) if blob.contains('\r') => Err(SignalingError::validierung(
            "Nutzlast enthaelt Wagenruecklauf",
        )),
        Some(blob) if !blob.is_empty() => Ok(blob.to_string()),
        _ => Err(SignalingError::validierung("Nutzlast fehlt")),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
