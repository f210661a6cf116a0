//! Ereignisse, Aktionen und Zustaende der Sitzungs-Automaten
//!
//! Die Automaten fuehren selbst kein I/O aus: sie bekommen ein [`Ereignis`]
//! und antworten mit einer Liste von [`Aktion`]en, die der Treiber ausfuehrt.

use std::time::Duration;

use kamerafunk_core::{FehlerKlasse, ListenerId, Rolle, SignalNachricht};

use crate::error::SessionError;

/// Timeout fuer den Verbindungsaufbau nach einem lokalen Signal
pub const VERBINDUNGS_TIMEOUT: Duration = Duration::from_secs(10);

/// Schritte des Countdowns nach Verbindungsabbruch
pub const COUNTDOWN_SCHRITTE: u32 = 10;

/// Dauer eines Countdown-Schritts
pub const COUNTDOWN_TAKT: Duration = Duration::from_secs(1);

/// Kennung einer lokalen Peer-Verbindung (Generationszaehler)
///
/// Jede neu erzeugte Verbindung bekommt eine hoehere ID. Ereignisse und
/// Timer mit einer veralteten ID werden ignoriert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VerbindungsId(pub u64);

impl std::fmt::Display for VerbindungsId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Art eines Timers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZeitgeberArt {
    /// Verbindung muss bis zum Ablauf `Verbunden` erreicht haben
    Verbindungsaufbau,
    /// Ein Countdown-Schritt; `verbleibend` ist der Stand nach dem Ablauf
    Countdown { verbleibend: u32 },
}

/// Ein Timer, gebunden an die Verbindung fuer die er gestartet wurde
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Zeitgeber {
    pub verbindung: VerbindungsId,
    pub art: ZeitgeberArt,
}

/// Sichtbarer Zustand einer Sitzung
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SitzungsStatus {
    #[default]
    Leerlauf,
    /// Sender: lokale Verbindung erzeugt, noch kein Offer
    WartetAufVerbindung,
    /// Sender: Offer liegt vor und ist eingereicht
    HatOffer,
    /// Sender: Offer an einen beigetretenen Receiver erneut gesendet
    WartetAufAnswer,
    /// Receiver: gestartet, wartet auf ein Offer
    WartetAufOffer,
    /// Receiver: Answer eingereicht, Verbindungsaufbau laeuft
    Antwortet,
    /// Receiver: Verbindung verloren, neuer Versuch in `verbleibend` Sekunden
    Countdown { verbleibend: u32 },
    Verbunden,
}

impl SitzungsStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Leerlauf => "leerlauf",
            Self::WartetAufVerbindung => "wartet_auf_verbindung",
            Self::HatOffer => "hat_offer",
            Self::WartetAufAnswer => "wartet_auf_answer",
            Self::WartetAufOffer => "wartet_auf_offer",
            Self::Antwortet => "antwortet",
            Self::Countdown { .. } => "countdown",
            Self::Verbunden => "verbunden",
        }
    }
}

/// Eingabe eines Sitzungs-Automaten
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ereignis {
    /// Nutzer aktiviert Senden bzw. Empfangen
    Starten,
    /// Nutzer deaktiviert die Sitzung
    Stoppen,
    /// Push-Stream zum Relay steht (auch nach Reconnect)
    RelayVerbunden,
    /// Push-Stream zum Relay ist abgerissen
    RelayGetrennt,
    /// Nachricht vom Relay
    Relay(SignalNachricht),
    /// Lokale Verbindung hat Signaling-Daten erzeugt (Klartext)
    LokalesSignal {
        verbindung: VerbindungsId,
        daten: String,
    },
    VerbindungHergestellt(VerbindungsId),
    VerbindungGeschlossen(VerbindungsId),
    VerbindungFehler {
        verbindung: VerbindungsId,
        grund: String,
    },
    Zeitablauf(Zeitgeber),
}

/// Ausgabe eines Sitzungs-Automaten
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Aktion {
    VerbindungErzeugen {
        verbindung: VerbindungsId,
        initiator: bool,
    },
    VerbindungZerstoeren(VerbindungsId),
    /// Entschluesseltes Signal an die lokale Verbindung geben
    SignalWeitergeben {
        verbindung: VerbindungsId,
        daten: String,
    },
    /// Verschluesseltes Offer beim Relay einreichen
    OfferEinreichen(String),
    /// Verschluesseltes Answer beim Relay einreichen
    AnswerEinreichen(String),
    OfferLoeschen,
    OfferErneutAnfordern(ListenerId),
    TimerStarten {
        zeitgeber: Zeitgeber,
        dauer: Duration,
    },
    Status(SitzungsStatus),
    /// Anzahl der Receiver im Raum
    Zuschauer(usize),
    /// Nicht-fataler Fehler fuer Anzeige und Log
    Fehler {
        klasse: FehlerKlasse,
        meldung: String,
    },
}

impl Aktion {
    pub fn fehler(e: &SessionError) -> Self {
        Self::Fehler {
            klasse: e.klasse(),
            meldung: e.to_string(),
        }
    }
}

/// Gemeinsame Schnittstelle von Sender- und Receiver-Sitzung
pub trait Sitzung: Send {
    fn rolle(&self) -> Rolle;

    fn status(&self) -> SitzungsStatus;

    /// Verarbeitet ein Ereignis und liefert die auszufuehrenden Aktionen
    fn ereignis(&mut self, ereignis: Ereignis) -> Vec<Aktion>;
}
