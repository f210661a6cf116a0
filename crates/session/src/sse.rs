//! Inkrementeller Parser fuer Server-Sent Events
//!
//! Nimmt beliebig zerteilte Byte-Chunks entgegen und liefert vollstaendige
//! Events. Unterstuetzt `event:`, mehrzeiliges `data:`, Kommentare (`:`)
//! sowie LF und CRLF als Zeilenende. `id:` und `retry:` werden ignoriert.

/// Ein vollstaendig empfangenes Event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEreignis {
    /// Eventname, `message` wenn nicht angegeben
    pub art: String,
    pub daten: String,
}

/// Zustand zwischen zwei Chunks
#[derive(Debug, Default)]
pub struct SseParser {
    /// Unvollstaendige Zeile (Bytes, damit UTF-8 ueber Chunk-Grenzen heil bleibt)
    puffer: Vec<u8>,
    art: Option<String>,
    daten: Option<String>,
}

impl SseParser {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Verarbeitet einen Chunk und gibt alle darin abgeschlossenen Events zurueck
    pub fn einspeisen(&mut self, chunk: &[u8]) -> Vec<SseEreignis> {
        self.puffer.extend_from_slice(chunk);
        let mut fertig = Vec::new();

        while let Some(pos) = self.puffer.iter().position(|&b| b == b'\n') {
            let mut zeile: Vec<u8> = self.puffer.drain(..=pos).collect();
            zeile.pop();
            if zeile.last() == Some(&b'\r') {
                zeile.pop();
            }
            let zeile = String::from_utf8_lossy(&zeile);
            if let Some(ereignis) = self.zeile_verarbeiten(&zeile) {
                fertig.push(ereignis);
            }
        }
        fertig
    }

    fn zeile_verarbeiten(&mut self, zeile: &str) -> Option<SseEreignis> {
        if zeile.is_empty() {
            return self.abschliessen();
        }
        if zeile.starts_with(':') {
            return None;
        }

        let (feld, wert) = match zeile.split_once(':') {
            Some((feld, wert)) => (feld, wert.strip_prefix(' ').unwrap_or(wert)),
            None => (zeile, ""),
        };
        match feld {
            "event" => self.art = Some(wert.to_string()),
            "data" => match &mut self.daten {
                Some(daten) => {
                    daten.push('\n');
                    daten.push_str(wert);
                }
                None => self.daten = Some(wert.to_string()),
            },
            _ => {}
        }
        None
    }

    /// Leerzeile: Event ausliefern, sofern Daten vorhanden sind
    fn abschliessen(&mut self) -> Option<SseEreignis> {
        let art = self.art.take();
        let daten = self.daten.take()?;
        Some(SseEreignis {
            art: art.unwrap_or_else(|| "message".to_string()),
            daten,
        })
    }
}
