//! Room – Signaling-Zustand pro Kennung
//!
//! Ein Raum haelt die registrierten Listener in Beitrittsreihenfolge und
//! hoechstens ein gecachtes, verschluesseltes Offer.
//!
//! ## Invariante
//! `cached_offer` ist nur gesetzt, solange mindestens ein Sender-Listener
//! registriert ist. Verlaesst der letzte Sender den Raum, wird das Offer
//! verworfen.
//!
//! ## Nebenlaeufigkeit
//! Listener-Liste und Offer liegen hinter einem einzigen Mutex. Zustellungen
//! werden unter dem Lock nur in die begrenzten Listener-Queues eingereiht
//! (`try_send`, kein I/O); das eigentliche Schreiben auf den Socket passiert
//! im Stream-Task der HTTP-Schicht. Dadurch entspricht die Reihenfolge pro
//! Listener immer der Reihenfolge der Zustandsaenderungen.
//!
//! Ein Listener dessen Queue voll oder geschlossen ist, wird entfernt. Sein
//! Stream endet nach dem Leeren der Queue, der Client baut ihn neu auf und
//! bekommt beim Beitritt ID und Offer erneut.

use kamerafunk_core::{ListenerId, RaumId, Rolle, SignalNachricht};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::{SignalingError, SignalingResult};
use crate::listener::{listener_kanal, Abonnement, Listener, Zustellung};

/// Signaling-Zustand eines Raums
pub struct Room {
    id: RaumId,
    inner: Mutex<RoomInner>,
}

struct RoomInner {
    /// Registrierte Listener in Beitrittsreihenfolge
    listeners: Vec<Listener>,
    /// Zuletzt gesetztes Offer (undurchsichtiger Blob)
    cached_offer: Option<String>,
    /// Zeitpunkt seit dem der Raum keine Listener mehr hat
    leer_seit: Option<Instant>,
}

impl Room {
    /// Erstellt einen neuen, leeren Raum
    pub fn neu(id: RaumId) -> Self {
        Self {
            id,
            inner: Mutex::new(RoomInner {
                listeners: Vec::new(),
                cached_offer: None,
                leer_seit: Some(Instant::now()),
            }),
        }
    }

    pub fn id(&self) -> &RaumId {
        &self.id
    }

    /// Registriert einen neuen Listener und gibt sein Abonnement zurueck
    ///
    /// Ein Receiver erhaelt zuerst seine ID, danach das gecachte Offer.
    /// Anschliessend bekommen alle Sender ein `connected` und alle Listener
    /// die aktuelle Receiver-Anzahl.
    pub fn beitreten(
        self: &Arc<Self>,
        id: ListenerId,
        rolle: Rolle,
        queue_groesse: usize,
    ) -> Abonnement {
        let (listener, rx) = listener_kanal(id, rolle, queue_groesse);

        {
            let mut inner = self.inner.lock();
            inner.listeners.push(listener);
            inner.leer_seit = None;

            if rolle == Rolle::Receiver {
                inner.senden_an(&self.id, id, SignalNachricht::receiver_id(id));
                if let Some(offer) = inner.cached_offer.clone() {
                    inner.senden_an(&self.id, id, SignalNachricht::offer(offer));
                }
            }

            inner.rundsenden(&self.id, &SignalNachricht::connected(rolle));
            inner.anzahl_melden(&self.id);

            tracing::info!(
                raum = %self.id,
                listener = %id,
                rolle = %rolle,
                listener_gesamt = inner.listeners.len(),
                "Listener beigetreten"
            );
        }

        Abonnement::neu(Arc::clone(self), id, rolle, rx)
    }

    /// Entfernt einen Listener (idempotent)
    ///
    /// Gibt `false` zurueck wenn der Listener nicht (mehr) registriert war.
    pub fn verlassen(&self, id: ListenerId) -> bool {
        let mut inner = self.inner.lock();
        let Some(rolle) = inner.entfernen(&self.id, id) else {
            return false;
        };
        inner.anzahl_melden(&self.id);

        tracing::info!(
            raum = %self.id,
            listener = %id,
            rolle = %rolle,
            listener_gesamt = inner.listeners.len(),
            "Listener hat den Raum verlassen"
        );
        true
    }

    /// Setzt das Offer und sendet es an alle Receiver
    ///
    /// Ueberschreibt ein vorhandenes Offer ohne Versionspruefung. Ist kein
    /// Sender registriert, wird das Offer nur weitergeleitet, nicht gecacht.
    /// Gibt die Anzahl der erfolgreichen Zustellungen zurueck.
    pub fn offer_setzen(&self, blob: String) -> usize {
        let mut inner = self.inner.lock();
        if inner.sender_anzahl() > 0 {
            inner.cached_offer = Some(blob.clone());
        } else {
            tracing::debug!(raum = %self.id, "Offer ohne registrierten Sender – nicht gecacht");
        }
        let gesendet = inner.rundsenden(&self.id, &SignalNachricht::offer(blob));
        tracing::debug!(raum = %self.id, gesendet, "Offer gesetzt");
        gesendet
    }

    /// Verwirft das gecachte Offer ohne Broadcast
    pub fn offer_loeschen(&self) {
        let mut inner = self.inner.lock();
        if inner.cached_offer.take().is_some() {
            tracing::debug!(raum = %self.id, "Offer geloescht");
        }
    }

    /// Leitet ein Answer an alle Sender weiter (wird nie gecacht)
    pub fn answer_weiterleiten(&self, blob: String) -> usize {
        let mut inner = self.inner.lock();
        let gesendet = inner.rundsenden(&self.id, &SignalNachricht::answer(blob));
        tracing::debug!(raum = %self.id, gesendet, "Answer weitergeleitet");
        gesendet
    }

    /// Sendet das gecachte Offer erneut an genau einen Receiver
    ///
    /// - `Err(NichtGefunden)`: kein Receiver mit dieser ID im Raum
    /// - `Ok(false)`: Receiver gefunden, aber kein Offer gecacht
    /// - `Ok(true)`: Offer eingereiht
    pub fn offer_erneut_senden(&self, id: ListenerId) -> SignalingResult<bool> {
        let mut inner = self.inner.lock();
        let ist_receiver = inner
            .listeners
            .iter()
            .any(|l| l.id == id && l.rolle == Rolle::Receiver);
        if !ist_receiver {
            return Err(SignalingError::NichtGefunden(format!(
                "Receiver {id} in Raum {}",
                self.id
            )));
        }
        let Some(offer) = inner.cached_offer.clone() else {
            tracing::debug!(raum = %self.id, listener = %id, "Resend angefordert, aber kein Offer gecacht");
            return Ok(false);
        };
        let zustellung = inner.senden_an(&self.id, id, SignalNachricht::offer(offer));
        Ok(zustellung == Some(Zustellung::Zugestellt))
    }

    /// Gibt eine Kopie des gecachten Offers zurueck
    pub fn cached_offer(&self) -> Option<String> {
        self.inner.lock().cached_offer.clone()
    }

    pub fn listener_anzahl(&self) -> usize {
        self.inner.lock().listeners.len()
    }

    pub fn sender_anzahl(&self) -> usize {
        self.inner.lock().sender_anzahl()
    }

    pub fn receiver_anzahl(&self) -> usize {
        self.inner.lock().receiver_anzahl()
    }

    /// IDs und Rollen aller Listener in Beitrittsreihenfolge
    pub fn listener(&self) -> Vec<(ListenerId, Rolle)> {
        self.inner
            .lock()
            .listeners
            .iter()
            .map(|l| (l.id, l.rolle))
            .collect()
    }

    /// Prueft ob der Raum seit mindestens `gnadenfrist` leer ist
    pub fn ist_verwaist(&self, gnadenfrist: Duration) -> bool {
        let inner = self.inner.lock();
        inner.listeners.is_empty()
            && inner
                .leer_seit
                .is_some_and(|seit| seit.elapsed() >= gnadenfrist)
    }
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Room")
            .field("id", &self.id)
            .field("listener", &inner.listeners.len())
            .field("hat_offer", &inner.cached_offer.is_some())
            .finish()
    }
}

impl RoomInner {
    fn sender_anzahl(&self) -> usize {
        self.listeners
            .iter()
            .filter(|l| l.rolle == Rolle::Sender)
            .count()
    }

    fn receiver_anzahl(&self) -> usize {
        self.listeners
            .iter()
            .filter(|l| l.rolle == Rolle::Receiver)
            .count()
    }

    /// Stellt eine Nachricht gezielt einem Listener zu
    fn senden_an(
        &mut self,
        raum: &RaumId,
        id: ListenerId,
        nachricht: SignalNachricht,
    ) -> Option<Zustellung> {
        let zustellung = self
            .listeners
            .iter()
            .find(|l| l.id == id)
            .map(|l| l.sender.senden(nachricht))?;
        if zustellung != Zustellung::Zugestellt {
            self.tote_entfernen(raum, vec![id]);
        }
        Some(zustellung)
    }

    /// Sendet an alle Listener deren Rolle zur Signal-Art passt
    fn rundsenden(&mut self, raum: &RaumId, nachricht: &SignalNachricht) -> usize {
        let mut gesendet = 0;
        let mut tote = Vec::new();
        for listener in &self.listeners {
            if !nachricht.ist_fuer(listener.rolle) {
                continue;
            }
            match listener.sender.senden(nachricht.clone()) {
                Zustellung::Zugestellt => gesendet += 1,
                Zustellung::Verworfen | Zustellung::Geschlossen => tote.push(listener.id),
            }
        }
        if !tote.is_empty() {
            self.tote_entfernen(raum, tote);
        }
        gesendet
    }

    /// Meldet allen Listenern die aktuelle Receiver-Anzahl
    fn anzahl_melden(&mut self, raum: &RaumId) {
        let anzahl = self.receiver_anzahl();
        self.rundsenden(raum, &SignalNachricht::receiver_count(anzahl));
    }

    /// Entfernt Listener deren Queue voll oder geschlossen ist, wie bei `verlassen`
    fn tote_entfernen(&mut self, raum: &RaumId, tote: Vec<ListenerId>) {
        let mut entfernt = false;
        for id in tote {
            if self.entfernen(raum, id).is_some() {
                tracing::debug!(raum = %raum, listener = %id, "Getrennten Listener entfernt");
                entfernt = true;
            }
        }
        if entfernt {
            self.anzahl_melden(raum);
        }
    }

    /// Entfernt einen Listener und haelt die Offer-Invariante ein
    fn entfernen(&mut self, raum: &RaumId, id: ListenerId) -> Option<Rolle> {
        let index = self.listeners.iter().position(|l| l.id == id)?;
        let listener = self.listeners.remove(index);

        if listener.rolle == Rolle::Sender
            && self.sender_anzahl() == 0
            && self.cached_offer.take().is_some()
        {
            tracing::debug!(raum = %raum, "Letzter Sender weg – Offer verworfen");
        }
        if self.listeners.is_empty() {
            self.leer_seit = Some(Instant::now());
        }
        Some(listener.rolle)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use kamerafunk_core::SignalArt;

    fn raum() -> Arc<Room> {
        Arc::new(Room::neu(RaumId::parse("abc", 256).unwrap()))
    }

    fn alle(abo: &mut Abonnement) -> Vec<SignalNachricht> {
        std::iter::from_fn(|| abo.try_empfangen()).collect()
    }

    fn arten(nachrichten: &[SignalNachricht]) -> Vec<SignalArt> {
        nachrichten.iter().map(|n| n.art).collect()
    }

    #[tokio::test]
    async fn receiver_bekommt_id_und_offer_in_reihenfolge() {
        let room = raum();
        let _sender = room.beitreten(ListenerId(1), Rolle::Sender, 16);
        room.offer_setzen("O1".into());

        let mut receiver = room.beitreten(ListenerId(2), Rolle::Receiver, 16);
        let empfangen = alle(&mut receiver);
        assert_eq!(
            arten(&empfangen),
            vec![SignalArt::ReceiverId, SignalArt::Offer, SignalArt::ReceiverCount]
        );
        assert_eq!(empfangen[0].daten, "2");
        assert_eq!(empfangen[1].daten, "O1");
        assert_eq!(empfangen[2].daten, "1");
    }

    #[tokio::test]
    async fn sender_bekommt_connected_wenn_receiver_beitritt() {
        let room = raum();
        let mut sender = room.beitreten(ListenerId(1), Rolle::Sender, 16);
        alle(&mut sender);

        let _receiver = room.beitreten(ListenerId(2), Rolle::Receiver, 16);
        let empfangen = alle(&mut sender);
        assert_eq!(
            arten(&empfangen),
            vec![SignalArt::Connected, SignalArt::ReceiverCount]
        );
        assert_eq!(empfangen[0].daten, "receiver");
    }

    #[tokio::test]
    async fn receiver_bekommt_kein_connected() {
        let room = raum();
        let mut r1 = room.beitreten(ListenerId(1), Rolle::Receiver, 16);
        alle(&mut r1);
        let _r2 = room.beitreten(ListenerId(2), Rolle::Receiver, 16);
        assert_eq!(arten(&alle(&mut r1)), vec![SignalArt::ReceiverCount]);
    }

    #[tokio::test]
    async fn letzter_sender_weg_loescht_offer() {
        let room = raum();
        let s1 = room.beitreten(ListenerId(1), Rolle::Sender, 16);
        let s2 = room.beitreten(ListenerId(2), Rolle::Sender, 16);
        room.offer_setzen("O1".into());

        drop(s1);
        assert_eq!(room.cached_offer().as_deref(), Some("O1"));
        drop(s2);
        assert_eq!(room.cached_offer(), None);
    }

    #[tokio::test]
    async fn offer_ohne_sender_wird_nicht_gecacht() {
        let room = raum();
        let mut receiver = room.beitreten(ListenerId(1), Rolle::Receiver, 16);
        alle(&mut receiver);

        assert_eq!(room.offer_setzen("O1".into()), 1);
        assert_eq!(room.cached_offer(), None);
        assert_eq!(arten(&alle(&mut receiver)), vec![SignalArt::Offer]);
    }

    #[tokio::test]
    async fn verlassen_ist_idempotent() {
        let room = raum();
        let abo = room.beitreten(ListenerId(1), Rolle::Receiver, 16);
        assert!(room.verlassen(ListenerId(1)));
        assert!(!room.verlassen(ListenerId(1)));
        // Guard-Drop nach explizitem Verlassen ist ein No-Op
        drop(abo);
        assert_eq!(room.listener_anzahl(), 0);
    }

    #[tokio::test]
    async fn answer_geht_nur_an_sender() {
        let room = raum();
        let mut sender = room.beitreten(ListenerId(1), Rolle::Sender, 16);
        let mut receiver = room.beitreten(ListenerId(2), Rolle::Receiver, 16);
        alle(&mut sender);
        alle(&mut receiver);

        assert_eq!(room.answer_weiterleiten("A1".into()), 1);
        assert_eq!(
            alle(&mut sender),
            vec![SignalNachricht::answer("A1")]
        );
        assert!(alle(&mut receiver).is_empty());
    }

    #[tokio::test]
    async fn offer_loeschen_sendet_nichts() {
        let room = raum();
        let _sender = room.beitreten(ListenerId(1), Rolle::Sender, 16);
        let mut receiver = room.beitreten(ListenerId(2), Rolle::Receiver, 16);
        room.offer_setzen("O1".into());
        alle(&mut receiver);

        room.offer_loeschen();
        assert_eq!(room.cached_offer(), None);
        assert!(alle(&mut receiver).is_empty());
    }

    #[tokio::test]
    async fn offer_erneut_senden_gezielt() {
        let room = raum();
        let _sender = room.beitreten(ListenerId(1), Rolle::Sender, 16);
        let mut r1 = room.beitreten(ListenerId(2), Rolle::Receiver, 16);
        let mut r2 = room.beitreten(ListenerId(3), Rolle::Receiver, 16);
        room.offer_setzen("O1".into());
        alle(&mut r1);
        alle(&mut r2);

        assert!(room.offer_erneut_senden(ListenerId(2)).unwrap());
        assert_eq!(alle(&mut r1), vec![SignalNachricht::offer("O1")]);
        assert!(alle(&mut r2).is_empty());
    }

    #[tokio::test]
    async fn offer_erneut_senden_unbekannt_aendert_nichts() {
        let room = raum();
        let _sender = room.beitreten(ListenerId(1), Rolle::Sender, 16);
        room.offer_setzen("O1".into());

        let fehler = room.offer_erneut_senden(ListenerId(99)).unwrap_err();
        assert!(matches!(fehler, SignalingError::NichtGefunden(_)));
        // Sender-ID ist kein Receiver
        assert!(room.offer_erneut_senden(ListenerId(1)).is_err());
        assert_eq!(room.cached_offer().as_deref(), Some("O1"));
        assert_eq!(room.listener_anzahl(), 1);
    }

    #[tokio::test]
    async fn offer_erneut_senden_ohne_offer() {
        let room = raum();
        let _r = room.beitreten(ListenerId(1), Rolle::Receiver, 16);
        assert!(!room.offer_erneut_senden(ListenerId(1)).unwrap());
    }

    #[tokio::test]
    async fn receiver_count_nach_verlassen() {
        let room = raum();
        let mut sender = room.beitreten(ListenerId(1), Rolle::Sender, 64);
        let receivers: Vec<_> = (2..=4)
            .map(|i| room.beitreten(ListenerId(i), Rolle::Receiver, 16))
            .collect();
        let mut receivers = receivers.into_iter();
        drop(receivers.next());

        let letzte_anzahl = alle(&mut sender)
            .into_iter()
            .filter(|n| n.art == SignalArt::ReceiverCount)
            .last()
            .unwrap();
        assert_eq!(letzte_anzahl.daten, "2");
    }

    #[tokio::test]
    async fn geschlossene_queue_wird_wie_verlassen_behandelt() {
        let room = raum();
        let (listener, rx) = listener_kanal(ListenerId(1), Rolle::Sender, 8);
        room.inner.lock().listeners.push(listener);
        room.offer_setzen("O1".into());
        assert_eq!(room.cached_offer().as_deref(), Some("O1"));

        // Client weg, ohne dass ein Guard aufgeraeumt hat
        drop(rx);
        assert_eq!(room.answer_weiterleiten("A1".into()), 0);
        assert_eq!(room.sender_anzahl(), 0);
        assert_eq!(room.cached_offer(), None);
    }

    #[tokio::test]
    async fn volle_queue_trennt_receiver() {
        let room = raum();
        let _sender = room.beitreten(ListenerId(1), Rolle::Sender, 64);
        // Queue-Minimum 4: ID und drei Receiver-Anzahlen fuellen sie
        let mut langsam = room.beitreten(ListenerId(2), Rolle::Receiver, 4);
        let _andere: Vec<_> = (3..=4)
            .map(|i| room.beitreten(ListenerId(i), Rolle::Receiver, 64))
            .collect();
        assert_eq!(room.receiver_anzahl(), 3);

        room.offer_setzen("O1".into());
        assert!(!room.listener().contains(&(ListenerId(2), Rolle::Receiver)));
        assert_eq!(room.receiver_anzahl(), 2);

        // Stream endet nach dem Leeren, statt ohne Offer haengen zu bleiben
        let empfangen: Vec<_> = std::iter::from_fn(|| langsam.try_empfangen()).collect();
        assert_eq!(empfangen[0].art, SignalArt::ReceiverId);
        assert_eq!(langsam.empfangen().await, None);

        // Neuer Beitritt liefert das gecachte Offer
        let mut neu = room.beitreten(ListenerId(8), Rolle::Receiver, 4);
        assert_eq!(
            arten(&alle(&mut neu)),
            vec![SignalArt::ReceiverId, SignalArt::Offer, SignalArt::ReceiverCount]
        );
    }

    #[tokio::test]
    async fn verwaist_erst_nach_gnadenfrist() {
        tokio::time::pause();
        let room = raum();
        let abo = room.beitreten(ListenerId(1), Rolle::Receiver, 16);
        assert!(!room.ist_verwaist(Duration::ZERO));
        drop(abo);

        assert!(!room.ist_verwaist(Duration::from_secs(60)));
        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(room.ist_verwaist(Duration::from_secs(60)));
    }
}
