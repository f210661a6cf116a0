//! Szenarien fuer den Sitzungs-Treiber mit Attrappen fuer Relay und Peers

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kamerafunk_core::{ListenerId, Rolle, SignalNachricht};
use kamerafunk_crypto::Schluesselpaar;
use kamerafunk_session::{
    ausfuehren, Anzeige, EmpfaengerSitzung, PeerFabrik, PeerMelder, RelayTransport,
    SenderSitzung, SessionError, SessionResult, SignalStream, SitzungsStatus, Steuerung,
    TreiberKonfig, VerbindungsId,
};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

// ---------------------------------------------------------------------------
// Attrappen
// ---------------------------------------------------------------------------

type StreamSender = mpsc::UnboundedSender<SessionResult<SignalNachricht>>;

#[derive(Default)]
struct RelayAttrappe {
    /// Vorbereitete Streams; leer = Relay nicht erreichbar
    streams: Mutex<VecDeque<mpsc::UnboundedReceiver<SessionResult<SignalNachricht>>>>,
    oeffnungen: Mutex<Vec<(Rolle, Instant)>>,
    aufrufe: Mutex<Vec<String>>,
}

impl RelayAttrappe {
    fn stream_bereitstellen(&self) -> StreamSender {
        let (tx, rx) = mpsc::unbounded_channel();
        self.streams.lock().push_back(rx);
        tx
    }

    fn aufrufe(&self) -> Vec<String> {
        self.aufrufe.lock().clone()
    }
}

#[async_trait]
impl RelayTransport for RelayAttrappe {
    async fn stream_oeffnen(&self, rolle: Rolle) -> SessionResult<SignalStream> {
        self.oeffnungen.lock().push((rolle, Instant::now()));
        let rx = self
            .streams
            .lock()
            .pop_front()
            .ok_or_else(|| SessionError::Transport("connection refused".into()))?;
        let stream = futures_util::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|n| (n, rx))
        });
        Ok(Box::pin(stream))
    }

    async fn offer_einreichen(&self, blob: &str) -> SessionResult<()> {
        self.aufrufe.lock().push(format!("offer:{blob}"));
        Ok(())
    }

    async fn answer_einreichen(&self, blob: &str) -> SessionResult<()> {
        self.aufrufe.lock().push(format!("answer:{blob}"));
        Ok(())
    }

    async fn offer_loeschen(&self) -> SessionResult<()> {
        self.aufrufe.lock().push("offer_loeschen".into());
        Ok(())
    }

    async fn offer_erneut_anfordern(&self, receiver_id: ListenerId) -> SessionResult<()> {
        self.aufrufe.lock().push(format!("resend:{receiver_id}"));
        Ok(())
    }
}

#[derive(Clone, Default)]
struct PeerAttrappe {
    melder: Arc<Mutex<HashMap<VerbindungsId, PeerMelder>>>,
    protokoll: Arc<Mutex<Vec<String>>>,
}

impl PeerAttrappe {
    fn melder(&self, verbindung: u64) -> PeerMelder {
        self.melder.lock()[&VerbindungsId(verbindung)].clone()
    }

    fn protokoll(&self) -> Vec<String> {
        self.protokoll.lock().clone()
    }
}

impl PeerFabrik for PeerAttrappe {
    fn erzeugen(&mut self, verbindung: VerbindungsId, initiator: bool, melder: PeerMelder) {
        self.protokoll
            .lock()
            .push(format!("erzeugen:{verbindung}:{initiator}"));
        self.melder.lock().insert(verbindung, melder);
    }

    fn signal(&mut self, verbindung: VerbindungsId, daten: String) {
        self.protokoll.lock().push(format!("signal:{verbindung}:{daten}"));
    }

    fn zerstoeren(&mut self, verbindung: VerbindungsId) {
        self.protokoll.lock().push(format!("zerstoeren:{verbindung}"));
    }
}

/// Wartet (in virtueller Zeit) bis `bedingung` erfuellt ist
async fn warten_bis(beschreibung: &str, mut bedingung: impl FnMut() -> bool) {
    for _ in 0..5000 {
        if bedingung() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("Bedingung nicht erreicht: {beschreibung}");
}

struct Lauf {
    steuerung: mpsc::Sender<Steuerung>,
    anzeige: watch::Receiver<Anzeige>,
    handle: tokio::task::JoinHandle<SessionResult<()>>,
}

fn starten<S>(sitzung: S, relay: Arc<RelayAttrappe>, peers: PeerAttrappe) -> Lauf
where
    S: kamerafunk_session::Sitzung + 'static,
{
    let (steuerung, steuer_rx) = mpsc::channel(8);
    let (anzeige_tx, anzeige) = watch::channel(Anzeige::default());
    let handle = tokio::spawn(ausfuehren(
        sitzung,
        relay,
        peers,
        steuer_rx,
        anzeige_tx,
        TreiberKonfig::default(),
    ));
    Lauf {
        steuerung,
        anzeige,
        handle,
    }
}

// ---------------------------------------------------------------------------
// Szenarien
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn sender_reicht_verschluesseltes_offer_ein() {
    let paar = Schluesselpaar::generieren();
    let relay = Arc::new(RelayAttrappe::default());
    let relay_stream = relay.stream_bereitstellen();
    let peers = PeerAttrappe::default();
    let lauf = starten(SenderSitzung::neu(paar.clone()), relay.clone(), peers.clone());

    warten_bis("Relay verbunden", || lauf.anzeige.borrow().relay_verbunden).await;
    assert_eq!(relay.oeffnungen.lock()[0].0, Rolle::Sender);

    lauf.steuerung.send(Steuerung::Starten).await.unwrap();
    warten_bis("Verbindung erzeugt", || !peers.protokoll().is_empty()).await;
    assert_eq!(peers.protokoll()[0], "erzeugen:v1:true");

    peers.melder(1).signal("sdp-offer");
    warten_bis("Offer eingereicht", || !relay.aufrufe().is_empty()).await;
    let aufruf = relay.aufrufe()[0].clone();
    let blob = aufruf.strip_prefix("offer:").unwrap();
    assert_eq!(paar.entschluesseln(blob).unwrap(), "sdp-offer");
    assert_eq!(lauf.anzeige.borrow().status, SitzungsStatus::HatOffer);

    // Answer vom Relay landet entschluesselt bei der Verbindung
    let answer = paar.verschluesseln("sdp-answer").unwrap();
    relay_stream
        .send(Ok(SignalNachricht::answer(answer)))
        .unwrap();
    relay_stream
        .send(Ok(SignalNachricht::receiver_count(1)))
        .unwrap();
    warten_bis("Answer weitergegeben", || {
        peers.protokoll().contains(&"signal:v1:sdp-answer".to_string())
    })
    .await;
    warten_bis("Zuschauer angezeigt", || lauf.anzeige.borrow().zuschauer == 1).await;

    peers.melder(1).hergestellt();
    warten_bis("Verbunden", || {
        lauf.anzeige.borrow().status == SitzungsStatus::Verbunden
    })
    .await;

    lauf.steuerung.send(Steuerung::Beenden).await.unwrap();
    lauf.handle.await.unwrap().unwrap();
    assert_eq!(relay.aufrufe().last().unwrap(), "offer_loeschen");
    assert_eq!(peers.protokoll().last().unwrap(), "zerstoeren:v1");
}

#[tokio::test(start_paused = true)]
async fn reconnect_mit_exponentiellem_backoff() {
    let relay = Arc::new(RelayAttrappe::default());
    let peers = PeerAttrappe::default();
    let lauf = starten(
        SenderSitzung::neu(Schluesselpaar::generieren()),
        relay.clone(),
        peers,
    );

    warten_bis("vier Versuche", || relay.oeffnungen.lock().len() >= 4).await;
    let zeiten: Vec<Instant> = relay.oeffnungen.lock().iter().map(|(_, t)| *t).collect();
    let abstaende: Vec<Duration> = zeiten.windows(2).map(|w| w[1] - w[0]).collect();
    assert_eq!(
        abstaende,
        vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4)
        ]
    );
    assert!(!lauf.anzeige.borrow().relay_verbunden);

    // Erfolg setzt den Backoff zurueck
    let relay_stream = relay.stream_bereitstellen();
    warten_bis("verbunden", || lauf.anzeige.borrow().relay_verbunden).await;
    drop(relay_stream);
    warten_bis("getrennt", || !lauf.anzeige.borrow().relay_verbunden).await;
    let getrennt = Instant::now();

    warten_bis("naechster Versuch", || relay.oeffnungen.lock().len() >= 6).await;
    let letzter = relay.oeffnungen.lock()[5].1;
    assert!(letzter - getrennt <= Duration::from_millis(1010));

    drop(lauf.steuerung);
    lauf.handle.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn sender_reicht_offer_nach_reconnect_erneut_ein() {
    let paar = Schluesselpaar::generieren();
    let relay = Arc::new(RelayAttrappe::default());
    let erster = relay.stream_bereitstellen();
    let peers = PeerAttrappe::default();
    let lauf = starten(SenderSitzung::neu(paar), relay.clone(), peers.clone());

    lauf.steuerung.send(Steuerung::Starten).await.unwrap();
    warten_bis("Verbindung erzeugt", || !peers.protokoll().is_empty()).await;
    peers.melder(1).signal("sdp-offer");
    warten_bis("Offer eingereicht", || relay.aufrufe().len() == 1).await;

    let _zweiter = relay.stream_bereitstellen();
    erster
        .send(Err(SessionError::Transport("reset".into())))
        .unwrap();
    warten_bis("Offer erneut eingereicht", || relay.aufrufe().len() == 2).await;
    assert_eq!(relay.aufrufe()[0], relay.aufrufe()[1]);
}

#[tokio::test(start_paused = true)]
async fn receiver_fordert_nach_timeout_resend_an() {
    let paar = Schluesselpaar::generieren();
    let relay = Arc::new(RelayAttrappe::default());
    let relay_stream = relay.stream_bereitstellen();
    let peers = PeerAttrappe::default();
    let lauf = starten(
        EmpfaengerSitzung::neu(paar.clone()),
        relay.clone(),
        peers.clone(),
    );
    lauf.steuerung.send(Steuerung::Starten).await.unwrap();

    relay_stream
        .send(Ok(SignalNachricht::receiver_id(ListenerId(5))))
        .unwrap();
    relay_stream
        .send(Ok(SignalNachricht::offer(paar.verschluesseln("sdp-offer").unwrap())))
        .unwrap();
    warten_bis("Offer weitergegeben", || peers.protokoll().len() == 2).await;
    assert_eq!(
        peers.protokoll(),
        vec!["erzeugen:v1:false", "signal:v1:sdp-offer"]
    );

    peers.melder(1).signal("sdp-answer");
    warten_bis("Answer eingereicht", || relay.aufrufe().len() == 1).await;
    let eingereicht = Instant::now();
    let blob = relay.aufrufe()[0].strip_prefix("answer:").unwrap().to_string();
    assert_eq!(paar.entschluesseln(&blob).unwrap(), "sdp-answer");

    // Kein Verbindungsaufbau innerhalb von 10 s
    warten_bis("Resend angefordert", || relay.aufrufe().len() == 2).await;
    assert_eq!(relay.aufrufe()[1], "resend:5");
    assert!(Instant::now() - eingereicht >= Duration::from_millis(9_900));
    assert!(peers.protokoll().contains(&"zerstoeren:v1".to_string()));
    assert_eq!(lauf.anzeige.borrow().status, SitzungsStatus::WartetAufOffer);
}

#[tokio::test(start_paused = true)]
async fn kaputter_payload_trennt_den_stream_nicht() {
    let relay = Arc::new(RelayAttrappe::default());
    let relay_stream = relay.stream_bereitstellen();
    let lauf = starten(
        EmpfaengerSitzung::neu(Schluesselpaar::generieren()),
        relay.clone(),
        PeerAttrappe::default(),
    );
    warten_bis("verbunden", || lauf.anzeige.borrow().relay_verbunden).await;

    relay_stream
        .send(Err(SessionError::Payload("Unbekannte Signal-Art".into())))
        .unwrap();
    warten_bis("Fehler angezeigt", || {
        lauf.anzeige.borrow().letzter_fehler.is_some()
    })
    .await;
    assert!(lauf.anzeige.borrow().relay_verbunden);

    relay_stream
        .send(Ok(SignalNachricht::receiver_count(4)))
        .unwrap();
    warten_bis("Zuschauer angezeigt", || lauf.anzeige.borrow().zuschauer == 4).await;
    assert_eq!(relay.oeffnungen.lock().len(), 1);
}
