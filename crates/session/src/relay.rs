//! Anbindung einer Sitzung an den Signaling-Relay
//!
//! [`RelayTransport`] abstrahiert die fuenf Relay-Operationen fuer einen
//! festen Raum. [`HttpRelay`] spricht das HTTP/SSE-Protokoll des Servers.

use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use kamerafunk_core::{ListenerId, RaumId, Rolle, SignalArt, SignalNachricht};

use crate::error::{SessionError, SessionResult};
use crate::sse::{SseEreignis, SseParser};

/// Push-Stream der Signal-Nachrichten eines Raums
///
/// `Err` mit Klasse `Payload` betrifft nur ein einzelnes Event; jeder andere
/// Fehler und das Stream-Ende bedeuten Verbindungsverlust.
pub type SignalStream = Pin<Box<dyn Stream<Item = SessionResult<SignalNachricht>> + Send>>;

/// Relay-Operationen fuer einen Raum
#[async_trait]
pub trait RelayTransport: Send + Sync {
    async fn stream_oeffnen(&self, rolle: Rolle) -> SessionResult<SignalStream>;

    async fn offer_einreichen(&self, blob: &str) -> SessionResult<()>;

    async fn answer_einreichen(&self, blob: &str) -> SessionResult<()>;

    async fn offer_loeschen(&self) -> SessionResult<()>;

    async fn offer_erneut_anfordern(&self, receiver_id: ListenerId) -> SessionResult<()>;
}

/// Timeout fuer den Verbindungsaufbau zum Relay
const VERBINDUNGS_TIMEOUT: Duration = Duration::from_secs(10);

/// Relay-Client ueber HTTP (Formular-POSTs) und SSE
#[derive(Debug, Clone)]
pub struct HttpRelay {
    client: reqwest::Client,
    basis_url: String,
    kennung: RaumId,
}

impl HttpRelay {
    /// Erstellt einen Client fuer den Raum `kennung` unter `basis_url`
    pub fn neu(basis_url: impl Into<String>, kennung: RaumId) -> SessionResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(VERBINDUNGS_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            basis_url: basis_url.into().trim_end_matches('/').to_string(),
            kennung,
        })
    }

    fn url(&self, pfad: &str) -> String {
        format!("{}/connections/{}/{pfad}", self.basis_url, self.kennung)
    }

    async fn formular_senden(&self, pfad: &str, felder: &[(&str, &str)]) -> SessionResult<()> {
        self.client
            .post(self.url(pfad))
            .form(felder)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Wandelt ein SSE-Event in eine Signal-Nachricht
fn nachricht_aus_sse(ereignis: SseEreignis) -> SessionResult<SignalNachricht> {
    let art: SignalArt = ereignis.art.parse()?;
    Ok(SignalNachricht::neu(art, ereignis.daten))
}

#[async_trait]
impl RelayTransport for HttpRelay {
    async fn stream_oeffnen(&self, rolle: Rolle) -> SessionResult<SignalStream> {
        let antwort = self
            .client
            .get(self.url(&format!("events/{rolle}")))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?
            .error_for_status()?;
        tracing::info!(kennung = %self.kennung, %rolle, "Relay-Stream geoeffnet");

        let bytes = antwort.bytes_stream();
        let stream = futures_util::stream::unfold(
            (bytes, SseParser::neu(), VecDeque::new()),
            |(mut bytes, mut parser, mut fertig)| async move {
                loop {
                    if let Some(nachricht) = fertig.pop_front() {
                        return Some((nachricht, (bytes, parser, fertig)));
                    }
                    match bytes.next().await {
                        Some(Ok(chunk)) => fertig.extend(
                            parser
                                .einspeisen(&chunk)
                                .into_iter()
                                .map(nachricht_aus_sse),
                        ),
                        Some(Err(e)) => {
                            return Some((Err(SessionError::from(e)), (bytes, parser, fertig)))
                        }
                        None => return None,
                    }
                }
            },
        );
        Ok(Box::pin(stream))
    }

    async fn offer_einreichen(&self, blob: &str) -> SessionResult<()> {
        self.formular_senden("offer", &[("daten", blob)]).await
    }

    async fn answer_einreichen(&self, blob: &str) -> SessionResult<()> {
        self.formular_senden("answer", &[("daten", blob)]).await
    }

    async fn offer_loeschen(&self) -> SessionResult<()> {
        self.client
            .delete(self.url("offer"))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn offer_erneut_anfordern(&self, receiver_id: ListenerId) -> SessionResult<()> {
        let id = receiver_id.to_string();
        self.formular_senden("resend", &[("receiver_id", id.as_str())])
            .await
    }
}
