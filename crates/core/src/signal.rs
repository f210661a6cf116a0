//! Signal-Nachrichten zwischen Relay und Sitzungen
//!
//! Jede Nachricht besteht aus einer benannten Art und einem undurchsichtigen
//! Payload-String. Der Relay parst oder entschluesselt den Payload nie.
//!
//! ## Adressierung
//! | Art              | Empfaenger        |
//! |------------------|-------------------|
//! | `receiver-id`    | nur der neue Receiver (gezielt) |
//! | `connected`      | Sender            |
//! | `offer`          | Receiver          |
//! | `answer`         | Sender            |
//! | `receiver-count` | alle Rollen       |

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::KamerafunkError;
use crate::types::{ListenerId, Rolle};

/// Art einer Signal-Nachricht (SSE-Eventname auf dem Draht)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalArt {
    /// Bestaetigung der vergebenen Listener-ID an einen Receiver
    ReceiverId,
    /// Ein Listener ist dem Raum beigetreten (an Sender)
    Connected,
    /// Verschluesseltes Offer des Senders (an Receiver)
    Offer,
    /// Verschluesseltes Answer eines Receivers (an Sender)
    Answer,
    /// Aktuelle Anzahl der Receiver (an alle)
    ReceiverCount,
}

impl SignalArt {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReceiverId => "receiver-id",
            Self::Connected => "connected",
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::ReceiverCount => "receiver-count",
        }
    }

    /// Rolle an die diese Art bei einem Broadcast geht (`None` = alle)
    pub fn ziel(&self) -> Option<Rolle> {
        match self {
            Self::ReceiverId | Self::Offer => Some(Rolle::Receiver),
            Self::Connected | Self::Answer => Some(Rolle::Sender),
            Self::ReceiverCount => None,
        }
    }
}

impl std::fmt::Display for SignalArt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalArt {
    type Err = KamerafunkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "receiver-id" => Ok(Self::ReceiverId),
            "connected" => Ok(Self::Connected),
            "offer" => Ok(Self::Offer),
            "answer" => Ok(Self::Answer),
            "receiver-count" => Ok(Self::ReceiverCount),
            andere => Err(KamerafunkError::Payload(format!(
                "Unbekannte Signal-Art: '{andere}'"
            ))),
        }
    }
}

/// Eine Signal-Nachricht: Art + undurchsichtiger Payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalNachricht {
    pub art: SignalArt,
    pub daten: String,
}

impl SignalNachricht {
    pub fn neu(art: SignalArt, daten: impl Into<String>) -> Self {
        Self {
            art,
            daten: daten.into(),
        }
    }

    pub fn receiver_id(id: ListenerId) -> Self {
        Self::neu(SignalArt::ReceiverId, id.to_string())
    }

    /// `connected` traegt die Rolle des gerade beigetretenen Listeners
    pub fn connected(beigetreten: Rolle) -> Self {
        Self::neu(SignalArt::Connected, beigetreten.as_str())
    }

    pub fn offer(blob: impl Into<String>) -> Self {
        Self::neu(SignalArt::Offer, blob)
    }

    pub fn answer(blob: impl Into<String>) -> Self {
        Self::neu(SignalArt::Answer, blob)
    }

    pub fn receiver_count(anzahl: usize) -> Self {
        Self::neu(SignalArt::ReceiverCount, anzahl.to_string())
    }

    /// Prueft ob die Nachricht an einen Listener mit `rolle` zugestellt wird
    pub fn ist_fuer(&self, rolle: Rolle) -> bool {
        self.art.ziel().map_or(true, |ziel| ziel == rolle)
    }
}
