//! Sitzungs-Automat des Receivers
//!
//! ```text
//! Leerlauf -> WartetAufOffer -> Antwortet -> Verbunden
//!                  ^               |            |
//!                  |           (10s Timeout)  (Abbruch)
//!                  |               v            v
//!                  +------- Resend anfordern <- Countdown (10 x 1s)
//! ```
//!
//! Jedes Offer wird an eine frisch erzeugte lokale Verbindung gegeben. Bleibt
//! der Aufbau haengen oder bricht die Verbindung ab, fordert der Receiver das
//! gecachte Offer mit seiner Receiver-ID erneut an.

use kamerafunk_core::{FehlerKlasse, ListenerId, Rolle, SignalArt, SignalNachricht};

use crate::chiffre::SignalChiffre;
use crate::error::SessionError;
use crate::types::{
    Aktion, Ereignis, SitzungsStatus, Sitzung, VerbindungsId, Zeitgeber, ZeitgeberArt,
    COUNTDOWN_SCHRITTE, COUNTDOWN_TAKT, VERBINDUNGS_TIMEOUT,
};

/// Sans-IO Automat fuer die Receiver-Rolle
pub struct EmpfaengerSitzung<C> {
    chiffre: C,
    status: SitzungsStatus,
    aktiv: bool,
    /// Vom Relay vergebene ID, noetig fuer Resend-Anfragen
    receiver_id: Option<ListenerId>,
    verbindung: Option<VerbindungsId>,
    naechste_verbindung: u64,
    /// Offer-Blob der aktuellen Verbindung
    beantwortetes_offer: Option<String>,
}

impl<C: SignalChiffre> EmpfaengerSitzung<C> {
    pub fn neu(chiffre: C) -> Self {
        Self {
            chiffre,
            status: SitzungsStatus::Leerlauf,
            aktiv: false,
            receiver_id: None,
            verbindung: None,
            naechste_verbindung: 1,
            beantwortetes_offer: None,
        }
    }

    /// True wenn `id` die aktuelle lokale Verbindung ist
    pub fn ist_aktuell(&self, id: VerbindungsId) -> bool {
        self.verbindung == Some(id)
    }

    pub fn receiver_id(&self) -> Option<ListenerId> {
        self.receiver_id
    }

    fn status_setzen(&mut self, status: SitzungsStatus, aktionen: &mut Vec<Aktion>) {
        if self.status != status {
            self.status = status;
            aktionen.push(Aktion::Status(status));
        }
    }

    fn verbindung_zerstoeren(&mut self, aktionen: &mut Vec<Aktion>) {
        if let Some(alt) = self.verbindung.take() {
            aktionen.push(Aktion::VerbindungZerstoeren(alt));
        }
        self.beantwortetes_offer = None;
    }

    /// Verwirft die aktuelle Verbindung und fordert das Offer erneut an
    fn erneut_anfordern(&mut self, aktionen: &mut Vec<Aktion>) {
        self.verbindung_zerstoeren(aktionen);
        self.status_setzen(SitzungsStatus::WartetAufOffer, aktionen);
        match self.receiver_id {
            Some(id) => {
                tracing::info!(receiver_id = %id, "Fordere Offer erneut an");
                aktionen.push(Aktion::OfferErneutAnfordern(id));
            }
            None => {
                tracing::warn!("Resend nicht moeglich: keine Receiver-ID");
                aktionen.push(Aktion::fehler(&SessionError::KeineReceiverId));
            }
        }
    }

    fn starten(&mut self) -> Vec<Aktion> {
        let mut aktionen = Vec::new();
        if !self.aktiv {
            self.aktiv = true;
            self.status_setzen(SitzungsStatus::WartetAufOffer, &mut aktionen);
        }
        aktionen
    }

    fn stoppen(&mut self) -> Vec<Aktion> {
        let mut aktionen = Vec::new();
        if self.aktiv {
            self.aktiv = false;
            self.verbindung_zerstoeren(&mut aktionen);
            self.status_setzen(SitzungsStatus::Leerlauf, &mut aktionen);
        }
        aktionen
    }

    fn offer_empfangen(&mut self, blob: String) -> Vec<Aktion> {
        let mut aktionen = Vec::new();
        if !self.aktiv {
            tracing::debug!("Offer ignoriert, Empfang nicht aktiv");
            return aktionen;
        }
        // Jeder Beitritt eines Receivers und jeder Relay-Reconnect liefert
        // dasselbe Offer erneut; die laufende Verbindung bleibt bestehen
        let verbindung_laeuft = matches!(
            self.status,
            SitzungsStatus::Antwortet | SitzungsStatus::Verbunden
        );
        if verbindung_laeuft && self.beantwortetes_offer.as_deref() == Some(blob.as_str())
        {
            tracing::debug!("Offer bereits beantwortet");
            return aktionen;
        }

        let daten = match self.chiffre.entschluesseln(&blob) {
            Ok(daten) => daten,
            Err(e) => {
                tracing::warn!(fehler = %e, "Offer nicht entschluesselbar");
                aktionen.push(Aktion::fehler(&e));
                return aktionen;
            }
        };

        self.verbindung_zerstoeren(&mut aktionen);
        let id = VerbindungsId(self.naechste_verbindung);
        self.naechste_verbindung += 1;
        self.verbindung = Some(id);
        self.beantwortetes_offer = Some(blob);

        aktionen.push(Aktion::VerbindungErzeugen {
            verbindung: id,
            initiator: false,
        });
        aktionen.push(Aktion::SignalWeitergeben {
            verbindung: id,
            daten,
        });
        self.status_setzen(SitzungsStatus::Antwortet, &mut aktionen);
        aktionen
    }

    fn lokales_signal(&mut self, verbindung: VerbindungsId, daten: &str) -> Vec<Aktion> {
        let mut aktionen = Vec::new();
        if !self.aktiv || !self.ist_aktuell(verbindung) {
            return aktionen;
        }
        match self.chiffre.verschluesseln(daten) {
            Ok(blob) => {
                aktionen.push(Aktion::AnswerEinreichen(blob));
                aktionen.push(Aktion::TimerStarten {
                    zeitgeber: Zeitgeber {
                        verbindung,
                        art: ZeitgeberArt::Verbindungsaufbau,
                    },
                    dauer: VERBINDUNGS_TIMEOUT,
                });
            }
            Err(e) => aktionen.push(Aktion::fehler(&e)),
        }
        aktionen
    }

    /// Startet den Countdown nach einem Verbindungsabbruch
    fn verbindung_verloren(&mut self, verbindung: VerbindungsId) -> Vec<Aktion> {
        let mut aktionen = Vec::new();
        if !self.aktiv
            || !self.ist_aktuell(verbindung)
            || matches!(self.status, SitzungsStatus::Countdown { .. })
        {
            return aktionen;
        }
        tracing::info!(%verbindung, "Verbindung verloren, starte Countdown");
        self.status_setzen(
            SitzungsStatus::Countdown {
                verbleibend: COUNTDOWN_SCHRITTE,
            },
            &mut aktionen,
        );
        aktionen.push(Aktion::TimerStarten {
            zeitgeber: Zeitgeber {
                verbindung,
                art: ZeitgeberArt::Countdown {
                    verbleibend: COUNTDOWN_SCHRITTE - 1,
                },
            },
            dauer: COUNTDOWN_TAKT,
        });
        aktionen
    }

    fn zeitablauf(&mut self, zeitgeber: Zeitgeber) -> Vec<Aktion> {
        let mut aktionen = Vec::new();
        if !self.aktiv || !self.ist_aktuell(zeitgeber.verbindung) {
            return aktionen;
        }
        match zeitgeber.art {
            ZeitgeberArt::Verbindungsaufbau => {
                if self.status == SitzungsStatus::Antwortet {
                    tracing::info!(verbindung = %zeitgeber.verbindung, "Verbindungsaufbau abgelaufen");
                    self.erneut_anfordern(&mut aktionen);
                }
            }
            ZeitgeberArt::Countdown { verbleibend } => {
                if !matches!(self.status, SitzungsStatus::Countdown { .. }) {
                    return aktionen;
                }
                if verbleibend == 0 {
                    self.erneut_anfordern(&mut aktionen);
                } else {
                    self.status_setzen(SitzungsStatus::Countdown { verbleibend }, &mut aktionen);
                    aktionen.push(Aktion::TimerStarten {
                        zeitgeber: Zeitgeber {
                            verbindung: zeitgeber.verbindung,
                            art: ZeitgeberArt::Countdown {
                                verbleibend: verbleibend - 1,
                            },
                        },
                        dauer: COUNTDOWN_TAKT,
                    });
                }
            }
        }
        aktionen
    }

    fn relay_nachricht(&mut self, nachricht: SignalNachricht) -> Vec<Aktion> {
        match nachricht.art {
            SignalArt::ReceiverId => match nachricht.daten.parse::<ListenerId>() {
                Ok(id) => {
                    tracing::debug!(receiver_id = %id, "Receiver-ID erhalten");
                    self.receiver_id = Some(id);
                    Vec::new()
                }
                Err(e) => vec![Aktion::fehler(&e.into())],
            },
            SignalArt::Offer => self.offer_empfangen(nachricht.daten),
            SignalArt::ReceiverCount => match nachricht.daten.parse::<usize>() {
                Ok(anzahl) => vec![Aktion::Zuschauer(anzahl)],
                Err(_) => vec![Aktion::fehler(&SessionError::Payload(format!(
                    "receiver-count nicht numerisch: '{}'",
                    nachricht.daten
                )))],
            },
            andere => vec![Aktion::fehler(&SessionError::Payload(format!(
                "Unerwartete Signal-Art fuer Receiver: {andere}"
            )))],
        }
    }
}

impl<C: SignalChiffre> Sitzung for EmpfaengerSitzung<C> {
    fn rolle(&self) -> Rolle {
        Rolle::Receiver
    }

    fn status(&self) -> SitzungsStatus {
        self.status
    }

    fn ereignis(&mut self, ereignis: Ereignis) -> Vec<Aktion> {
        match ereignis {
            Ereignis::Starten => self.starten(),
            Ereignis::Stoppen => self.stoppen(),
            // Nach Reconnect liefert der Relay eine neue ID und ggf. das Offer
            Ereignis::RelayVerbunden | Ereignis::RelayGetrennt => Vec::new(),
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
                if !self.aktiv || !self.ist_aktuell(verbindung) {
                    return Vec::new();
                }
                let mut aktionen = vec![Aktion::Fehler {
                    klasse: FehlerKlasse::Transport,
                    meldung: grund,
                }];
                aktionen.extend(self.verbindung_verloren(verbindung));
                aktionen
            }
            Ereignis::Zeitablauf(zeitgeber) => self.zeitablauf(zeitgeber),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
