//! Sitzungs-Automat des Senders
//!
//! Der Sender erzeugt die lokale Verbindung als Initiator, reicht jedes
//! lokal erzeugte Signal verschluesselt als Offer ein und gibt Answers an
//! die lokale Verbindung weiter.
//!
//! ```text
//! Leerlauf -> WartetAufVerbindung -> HatOffer -> WartetAufAnswer -> Verbunden
//!                  ^                                                 |
//!                  +------------- Abbruch / Fehler ------------------+
//! ```

use kamerafunk_core::{Rolle, SignalArt, SignalNachricht};

use crate::chiffre::SignalChiffre;
use crate::error::SessionError;
use crate::types::{Aktion, Ereignis, SitzungsStatus, Sitzung, VerbindungsId};

/// Zustand der aktuellen lokalen Verbindung
#[derive(Debug, Clone, Copy)]
struct AktuelleVerbindung {
    id: VerbindungsId,
    /// Answer bereits uebergeben; eine zweite kann sie nicht annehmen
    hat_answer: bool,
}

/// Sans-IO Automat fuer die Sender-Rolle
pub struct SenderSitzung<C> {
    chiffre: C,
    status: SitzungsStatus,
    /// Nutzer hat Senden aktiviert
    aktiv: bool,
    verbindung: Option<AktuelleVerbindung>,
    naechste_verbindung: u64,
    /// Zuletzt eingereichtes Offer (verschluesselt), fuer erneutes Senden
    offer: Option<String>,
}

impl<C: SignalChiffre> SenderSitzung<C> {
    pub fn neu(chiffre: C) -> Self {
        Self {
            chiffre,
            status: SitzungsStatus::Leerlauf,
            aktiv: false,
            verbindung: None,
            naechste_verbindung: 1,
            offer: None,
        }
    }

    /// True wenn `id` die aktuelle lokale Verbindung ist
    pub fn ist_aktuell(&self, id: VerbindungsId) -> bool {
        self.verbindung.map_or(false, |v| v.id == id)
    }

    pub fn offer(&self) -> Option<&str> {
        self.offer.as_deref()
    }

    fn status_setzen(&mut self, status: SitzungsStatus, aktionen: &mut Vec<Aktion>) {
        if self.status != status {
            self.status = status;
            aktionen.push(Aktion::Status(status));
        }
    }

    /// Zerstoert die aktuelle Verbindung (falls vorhanden) und erzeugt eine neue
    fn verbindung_neu_erzeugen(&mut self, aktionen: &mut Vec<Aktion>) {
        if let Some(alt) = self.verbindung.take() {
            aktionen.push(Aktion::VerbindungZerstoeren(alt.id));
        }
        // Das Offer gehoert zur alten Verbindung und darf nicht erneut ausgeliefert werden
        if self.offer.take().is_some() {
            aktionen.push(Aktion::OfferLoeschen);
        }
        let id = VerbindungsId(self.naechste_verbindung);
        self.naechste_verbindung += 1;
        self.verbindung = Some(AktuelleVerbindung {
            id,
            hat_answer: false,
        });
        aktionen.push(Aktion::VerbindungErzeugen {
            verbindung: id,
            initiator: true,
        });
        self.status_setzen(SitzungsStatus::WartetAufVerbindung, aktionen);
    }

    fn starten(&mut self) -> Vec<Aktion> {
        let mut aktionen = Vec::new();
        if self.aktiv {
            return aktionen;
        }
        self.aktiv = true;
        tracing::info!("Senden aktiviert");
        self.verbindung_neu_erzeugen(&mut aktionen);
        aktionen
    }

    fn stoppen(&mut self) -> Vec<Aktion> {
        let mut aktionen = Vec::new();
        if !self.aktiv {
            return aktionen;
        }
        self.aktiv = false;
        self.offer = None;
        aktionen.push(Aktion::OfferLoeschen);
        if let Some(alt) = self.verbindung.take() {
            aktionen.push(Aktion::VerbindungZerstoeren(alt.id));
        }
        self.status_setzen(SitzungsStatus::Leerlauf, &mut aktionen);
        tracing::info!("Senden deaktiviert");
        aktionen
    }

    fn lokales_signal(&mut self, verbindung: VerbindungsId, daten: &str) -> Vec<Aktion> {
        let mut aktionen = Vec::new();
        if !self.aktiv || !self.ist_aktuell(verbindung) {
            tracing::debug!(%verbindung, "Lokales Signal ignoriert");
            return aktionen;
        }
        match self.chiffre.verschluesseln(daten) {
            Ok(blob) => {
                self.offer = Some(blob.clone());
                aktionen.push(Aktion::OfferEinreichen(blob));
                // Ein neues Offer setzt den Status immer zurueck
                self.status = SitzungsStatus::HatOffer;
                aktionen.push(Aktion::Status(SitzungsStatus::HatOffer));
            }
            Err(e) => aktionen.push(Aktion::fehler(&e)),
        }
        aktionen
    }

    fn offer_erneut_einreichen(&mut self, aktionen: &mut Vec<Aktion>) {
        let offer_aktuell = matches!(
            self.status,
            SitzungsStatus::HatOffer | SitzungsStatus::WartetAufAnswer | SitzungsStatus::Verbunden
        );
        if !self.aktiv || !offer_aktuell {
            return;
        }
        if let Some(blob) = &self.offer {
            aktionen.push(Aktion::OfferEinreichen(blob.clone()));
            if self.status == SitzungsStatus::HatOffer {
                self.status_setzen(SitzungsStatus::WartetAufAnswer, aktionen);
            }
        }
    }

    fn answer_empfangen(&mut self, blob: &str) -> Vec<Aktion> {
        let mut aktionen = Vec::new();
        if !self.aktiv {
            return aktionen;
        }
        let daten = match self.chiffre.entschluesseln(blob) {
            Ok(daten) => daten,
            Err(e) => {
                tracing::warn!(fehler = %e, "Answer nicht entschluesselbar");
                aktionen.push(Aktion::fehler(&e));
                return aktionen;
            }
        };

        if self.offer.is_none() {
            // Die aktuelle Verbindung hat noch kein Offer erzeugt
            tracing::debug!("Answer ohne eigenes Offer ignoriert");
            return aktionen;
        }

        if let Some(v) = self.verbindung.as_mut().filter(|v| !v.hat_answer) {
            v.hat_answer = true;
            aktionen.push(Aktion::SignalWeitergeben {
                verbindung: v.id,
                daten,
            });
            return aktionen;
        }

        tracing::info!("Answer fuer verbrauchte Verbindung, baue neu auf");
        self.verbindung_neu_erzeugen(&mut aktionen);
        aktionen
    }

    fn relay_nachricht(&mut self, nachricht: SignalNachricht) -> Vec<Aktion> {
        let mut aktionen = Vec::new();
        match nachricht.art {
            SignalArt::Answer => return self.answer_empfangen(&nachricht.daten),
            SignalArt::Connected => {
                if nachricht.daten == Rolle::Receiver.as_str() {
                    tracing::debug!("Receiver beigetreten");
                    self.offer_erneut_einreichen(&mut aktionen);
                }
            }
            SignalArt::ReceiverCount => match nachricht.daten.parse::<usize>() {
                Ok(anzahl) => aktionen.push(Aktion::Zuschauer(anzahl)),
                Err(_) => aktionen.push(Aktion::fehler(&SessionError::Payload(format!(
                    "receiver-count nicht numerisch: '{}'",
                    nachricht.daten
                )))),
            },
            andere => aktionen.push(Aktion::fehler(&SessionError::Payload(format!(
                "Unerwartete Signal-Art fuer Sender: {andere}"
            )))),
        }
        aktionen
    }

    fn verbindung_verloren(&mut self, verbindung: VerbindungsId) -> Vec<Aktion> {
        let mut aktionen = Vec::new();
        if self.aktiv && self.ist_aktuell(verbindung) {
            self.verbindung_neu_erzeugen(&mut aktionen);
        }
        aktionen
    }
}

impl<C: SignalChiffre> Sitzung for SenderSitzung<C> {
    fn rolle(&self) -> Rolle {
        Rolle::Sender
    }

    fn status(&self) -> SitzungsStatus {
        self.status
    }

    fn ereignis(&mut self, ereignis: Ereignis) -> Vec<Aktion> {
        match ereignis {
            Ereignis::Starten => self.starten(),
            Ereignis::Stoppen => self.stoppen(),
            Ereignis::RelayVerbunden => {
                // Der Raum hat das Offer evtl. beim Abriss des alten Streams verworfen
                let mut aktionen = Vec::new();
                self.offer_erneut_einreichen(&mut aktionen);
                aktionen
            }
            Ereignis::RelayGetrennt => Vec::new(),
            Ereignis::Relay(nachricht) => self.relay_nachricht(nachricht),
            Ereignis::LokalesSignal { verbindung, daten } => {
                self.lokales_signal(verbindung, &daten)
            }
            Ereignis::VerbindungHergestellt(verbindung) => {
                let mut aktionen = Vec::new();
                if self.aktiv && self.ist_aktuell(verbindung) {
                    self.status_setzen(SitzungsStatus::Verbunden, &mut aktionen);
                }
                aktionen
            }
            Ereignis::VerbindungGeschlossen(verbindung) => self.verbindung_verloren(verbindung),
            Ereignis::VerbindungFehler { verbindung, grund } => {
                if self.ist_aktuell(verbindung) {
                    tracing::warn!(%verbindung, %grund, "Lokale Verbindung fehlgeschlagen");
                }
                self.verbindung_verloren(verbindung)
            }
            Ereignis::Zeitablauf(_) => Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
