//! Async-Treiber fuer einen Sitzungs-Automaten
//!
//! Verbindet den Automaten mit der Aussenwelt: Relay-Stream, lokale
//! Peer-Verbindungen, Timer und Nutzer-Steuerung laufen in einer
//! `select!`-Schleife zusammen. Der Relay-Stream wird bei Abriss mit
//! exponentiellem Backoff neu aufgebaut.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::FuturesUnordered;
use futures_util::StreamExt;
use kamerafunk_core::{FehlerKlasse, SignalNachricht};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use crate::error::SessionResult;
use crate::relay::{RelayTransport, SignalStream};
use crate::types::{Aktion, Ereignis, SitzungsStatus, Sitzung, VerbindungsId, Zeitgeber};

// ---------------------------------------------------------------------------
// Schnittstellen
// ---------------------------------------------------------------------------

/// Meldekanal einer lokalen Peer-Verbindung an den Treiber
///
/// Ist an die Verbindung gebunden, fuer die er erzeugt wurde.
#[derive(Debug, Clone)]
pub struct PeerMelder {
    verbindung: VerbindungsId,
    tx: mpsc::UnboundedSender<Ereignis>,
}

impl PeerMelder {
    pub fn verbindung(&self) -> VerbindungsId {
        self.verbindung
    }

    /// Lokale Verbindung hat Signaling-Daten erzeugt
    pub fn signal(&self, daten: impl Into<String>) {
        self.melden(Ereignis::LokalesSignal {
            verbindung: self.verbindung,
            daten: daten.into(),
        });
    }

    pub fn hergestellt(&self) {
        self.melden(Ereignis::VerbindungHergestellt(self.verbindung));
    }

    pub fn geschlossen(&self) {
        self.melden(Ereignis::VerbindungGeschlossen(self.verbindung));
    }

    pub fn fehler(&self, grund: impl Into<String>) {
        self.melden(Ereignis::VerbindungFehler {
            verbindung: self.verbindung,
            grund: grund.into(),
        });
    }

    fn melden(&self, ereignis: Ereignis) {
        // Treiber beendet: Ereignis wird verworfen
        let _ = self.tx.send(ereignis);
    }
}

/// Fabrik fuer lokale WebRTC-Verbindungen
pub trait PeerFabrik: Send {
    /// Erzeugt eine Verbindung; Ereignisse kommen ueber `melder` zurueck
    fn erzeugen(&mut self, verbindung: VerbindungsId, initiator: bool, melder: PeerMelder);

    /// Gibt entschluesselte Signaling-Daten an die Verbindung
    fn signal(&mut self, verbindung: VerbindungsId, daten: String);

    fn zerstoeren(&mut self, verbindung: VerbindungsId);
}

/// Steuerbefehle des Nutzers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Steuerung {
    Starten,
    Stoppen,
    /// Sitzung stoppen und Treiber beenden
    Beenden,
}

/// Fuer die Oberflaeche sichtbarer Zustand
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Anzeige {
    pub status: SitzungsStatus,
    pub relay_verbunden: bool,
    pub zuschauer: usize,
    pub letzter_fehler: Option<String>,
}

/// Backoff-Parameter fuer den Relay-Reconnect
#[derive(Debug, Clone)]
pub struct TreiberKonfig {
    pub backoff_start: Duration,
    pub backoff_max: Duration,
}

impl Default for TreiberKonfig {
    fn default() -> Self {
        Self {
            backoff_start: Duration::from_secs(1),
            backoff_max: Duration::from_secs(30),
        }
    }
}

// ---------------------------------------------------------------------------
// Treiber
// ---------------------------------------------------------------------------

type TimerFuture = Pin<Box<dyn Future<Output = Zeitgeber> + Send>>;

struct Treiber<S, R, P> {
    sitzung: S,
    relay: Arc<R>,
    peers: P,
    timers: FuturesUnordered<TimerFuture>,
    peer_tx: mpsc::UnboundedSender<Ereignis>,
    anzeige: watch::Sender<Anzeige>,
}

impl<S: Sitzung, R: RelayTransport, P: PeerFabrik> Treiber<S, R, P> {
    async fn verarbeiten(&mut self, ereignis: Ereignis) {
        let aktionen = self.sitzung.ereignis(ereignis);
        for aktion in aktionen {
            self.ausfuehren(aktion).await;
        }
    }

    async fn ausfuehren(&mut self, aktion: Aktion) {
        match aktion {
            Aktion::VerbindungErzeugen {
                verbindung,
                initiator,
            } => {
                tracing::debug!(%verbindung, initiator, "Erzeuge lokale Verbindung");
                let melder = PeerMelder {
                    verbindung,
                    tx: self.peer_tx.clone(),
                };
                self.peers.erzeugen(verbindung, initiator, melder);
            }
            Aktion::VerbindungZerstoeren(verbindung) => self.peers.zerstoeren(verbindung),
            Aktion::SignalWeitergeben { verbindung, daten } => {
                self.peers.signal(verbindung, daten)
            }
            Aktion::OfferEinreichen(blob) => {
                let ergebnis = self.relay.offer_einreichen(&blob).await;
                self.relay_ergebnis("offer", ergebnis);
            }
            Aktion::AnswerEinreichen(blob) => {
                let ergebnis = self.relay.answer_einreichen(&blob).await;
                self.relay_ergebnis("answer", ergebnis);
            }
            Aktion::OfferLoeschen => {
                let ergebnis = self.relay.offer_loeschen().await;
                self.relay_ergebnis("offer_loeschen", ergebnis);
            }
            Aktion::OfferErneutAnfordern(receiver_id) => {
                let ergebnis = self.relay.offer_erneut_anfordern(receiver_id).await;
                self.relay_ergebnis("resend", ergebnis);
            }
            Aktion::TimerStarten { zeitgeber, dauer } => {
                self.timers.push(Box::pin(async move {
                    tokio::time::sleep(dauer).await;
                    zeitgeber
                }));
            }
            Aktion::Status(status) => {
                tracing::info!(status = status.as_str(), "Sitzungsstatus");
                self.anzeige.send_modify(|a| a.status = status);
            }
            Aktion::Zuschauer(anzahl) => self.anzeige.send_modify(|a| a.zuschauer = anzahl),
            Aktion::Fehler { klasse, meldung } => self.fehler_anzeigen(klasse, meldung),
        }
    }

    fn relay_ergebnis(&mut self, operation: &str, ergebnis: SessionResult<()>) {
        if let Err(e) = ergebnis {
            tracing::warn!(operation, fehler = %e, "Relay-Aufruf fehlgeschlagen");
            self.fehler_anzeigen(e.klasse(), e.to_string());
        }
    }

    fn fehler_anzeigen(&mut self, klasse: FehlerKlasse, meldung: String) {
        tracing::warn!(?klasse, %meldung, "Sitzungsfehler");
        self.anzeige
            .send_modify(|a| a.letzter_fehler = Some(meldung));
    }

    fn relay_status(&self, verbunden: bool) {
        self.anzeige.send_modify(|a| a.relay_verbunden = verbunden);
    }
}

/// Naechste Nachricht des Relay-Streams; ohne Stream nie bereit
async fn naechste_nachricht(
    stream: &mut Option<SignalStream>,
) -> Option<SessionResult<SignalNachricht>> {
    match stream {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}

/// Treibt `sitzung` bis `Steuerung::Beenden` oder bis der Steuerkanal schliesst
pub async fn ausfuehren<S, R, P>(
    sitzung: S,
    relay: Arc<R>,
    peers: P,
    mut steuerung: mpsc::Receiver<Steuerung>,
    anzeige: watch::Sender<Anzeige>,
    konfig: TreiberKonfig,
) -> SessionResult<()>
where
    S: Sitzung,
    R: RelayTransport,
    P: PeerFabrik,
{
    let rolle = sitzung.rolle();
    let (peer_tx, mut peer_rx) = mpsc::unbounded_channel();
    let mut treiber = Treiber {
        sitzung,
        relay,
        peers,
        timers: FuturesUnordered::new(),
        peer_tx,
        anzeige,
    };

    let mut stream: Option<SignalStream> = None;
    let mut backoff = konfig.backoff_start;
    let reconnect = tokio::time::sleep(Duration::ZERO);
    tokio::pin!(reconnect);

    tracing::info!(%rolle, "Sitzungs-Treiber gestartet");

    loop {
        let verbunden = stream.is_some();
        let timer_aktiv = !treiber.timers.is_empty();

        tokio::select! {
            // Nutzer-Befehle vor allem anderen
            biased;

            befehl = steuerung.recv() => match befehl {
                Some(Steuerung::Starten) => treiber.verarbeiten(Ereignis::Starten).await,
                Some(Steuerung::Stoppen) => treiber.verarbeiten(Ereignis::Stoppen).await,
                Some(Steuerung::Beenden) | None => {
                    treiber.verarbeiten(Ereignis::Stoppen).await;
                    break;
                }
            },

            () = &mut reconnect, if !verbunden => {
                match treiber.relay.stream_oeffnen(rolle).await {
                    Ok(neu) => {
                        stream = Some(neu);
                        backoff = konfig.backoff_start;
                        treiber.relay_status(true);
                        treiber.verarbeiten(Ereignis::RelayVerbunden).await;
                    }
                    Err(e) => {
                        tracing::warn!(fehler = %e, wartezeit = ?backoff, "Relay nicht erreichbar");
                        reconnect.as_mut().reset(Instant::now() + backoff);
                        backoff = (backoff * 2).min(konfig.backoff_max);
                    }
                }
            },

            nachricht = naechste_nachricht(&mut stream), if verbunden => match nachricht {
                Some(Ok(nachricht)) => {
                    tracing::debug!(art = %nachricht.art, "Signal vom Relay");
                    treiber.verarbeiten(Ereignis::Relay(nachricht)).await;
                }
                Some(Err(e)) if e.klasse() == FehlerKlasse::Payload => {
                    treiber.fehler_anzeigen(e.klasse(), e.to_string());
                }
                ende => {
                    if let Some(Err(e)) = ende {
                        tracing::warn!(fehler = %e, "Relay-Stream abgerissen");
                    } else {
                        tracing::info!("Relay-Stream beendet");
                    }
                    stream = None;
                    treiber.relay_status(false);
                    treiber.verarbeiten(Ereignis::RelayGetrennt).await;
                    reconnect.as_mut().reset(Instant::now() + backoff);
                    backoff = (backoff * 2).min(konfig.backoff_max);
                }
            },

            Some(ereignis) = peer_rx.recv() => treiber.verarbeiten(ereignis).await,

            Some(zeitgeber) = treiber.timers.next(), if timer_aktiv => {
                treiber.verarbeiten(Ereignis::Zeitablauf(zeitgeber)).await;
            }
        }
    }

    tracing::info!(%rolle, "Sitzungs-Treiber beendet");
    Ok(())
}
