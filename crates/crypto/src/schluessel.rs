//! X25519-Schluesselpaar eines Senders und Signal-Verschluesselung
//!
//! Der oeffentliche Schluessel (hex) ist die Raum-Kennung beim Relay. Der
//! geheime Schluessel wird ueber das Fragment eines teilbaren Links an
//! Receiver weitergegeben; der Relay sieht ihn nie.
//!
//! ## Verschluesselung
//! Box an sich selbst: beide Seiten kennen dasselbe Schluesselpaar.
//! ```text
//! dh  = X25519(geheim, oeffentlich)
//! key = HKDF-SHA256(dh, info = "kamerafunk-signal-v1")
//! out = hex(nonce[24]) || hex(XChaCha20-Poly1305(key, nonce, klartext))
//! ```

use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    XChaCha20Poly1305, XNonce,
};
use hkdf::Hkdf;
use kamerafunk_core::{RaumId, MAX_KENNUNG_LAENGE};
use sha2::Sha256;
use x25519_dalek::{PublicKey, StaticSecret};

use crate::error::{CryptoError, CryptoResult};

/// Laenge der XChaCha20-Nonce in Bytes
pub const NONCE_LAENGE: usize = 24;

/// Laenge eines X25519-Schluessels in Bytes
const SCHLUESSEL_LAENGE: usize = 32;

/// HKDF-Info fuer den Signal-Schluessel
const HKDF_INFO: &[u8] = b"kamerafunk-signal-v1";

/// X25519-Schluesselpaar (geheimer + oeffentlicher Schluessel)
#[derive(Clone)]
pub struct Schluesselpaar {
    geheim: StaticSecret,
    oeffentlich: PublicKey,
}

impl Schluesselpaar {
    /// Generiert ein neues, zufaelliges Schluesselpaar
    pub fn generieren() -> Self {
        let geheim = StaticSecret::random_from_rng(OsRng);
        Self::aus_geheimnis(geheim)
    }

    /// Rekonstruiert das Paar aus dem hex-kodierten geheimen Schluessel
    pub fn aus_geheimnis_hex(geheimnis_hex: &str) -> CryptoResult<Self> {
        let bytes = hex::decode(geheimnis_hex.trim())?;
        let bytes: [u8; SCHLUESSEL_LAENGE] = bytes.try_into().map_err(|b: Vec<u8>| {
            CryptoError::UngueltigeSchluesselLaenge {
                erwartet: SCHLUESSEL_LAENGE,
                erhalten: b.len(),
            }
        })?;
        Ok(Self::aus_geheimnis(StaticSecret::from(bytes)))
    }

    /// Rekonstruiert das Paar aus dem Fragment eines teilbaren Links
    pub fn aus_link(link: &str) -> CryptoResult<Self> {
        let (_, fragment) = link
            .rsplit_once('#')
            .ok_or_else(|| CryptoError::UngueltigeDaten("Link ohne Fragment".into()))?;
        Self::aus_geheimnis_hex(fragment)
    }

    fn aus_geheimnis(geheim: StaticSecret) -> Self {
        let oeffentlich = PublicKey::from(&geheim);
        Self {
            geheim,
            oeffentlich,
        }
    }

    /// Geheimer Schluessel als hex (fuer Persistenz durch den Aufrufer)
    pub fn geheimnis_hex(&self) -> String {
        hex::encode(self.geheim.to_bytes())
    }

    /// Oeffentlicher Schluessel als hex
    pub fn oeffentlich_hex(&self) -> String {
        hex::encode(self.oeffentlich.as_bytes())
    }

    /// Raum-Kennung beim Relay (= oeffentlicher Schluessel)
    pub fn raum_id(&self) -> CryptoResult<RaumId> {
        RaumId::parse(&self.oeffentlich_hex(), MAX_KENNUNG_LAENGE)
            .map_err(|e| CryptoError::UngueltigeDaten(e.to_string()))
    }

    /// Link fuer Receiver: `basis#<geheimnis-hex>`
    pub fn teilbarer_link(&self, basis: &str) -> String {
        let basis = basis.split('#').next().unwrap_or(basis);
        format!("{basis}#{}", self.geheimnis_hex())
    }

    /// Verschluesselt einen Signal-Payload
    pub fn verschluesseln(&self, klartext: &str) -> CryptoResult<String> {
        let cipher = self.cipher()?;
        let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
        let chiffrat = cipher
            .encrypt(&nonce, klartext.as_bytes())
            .map_err(|e| CryptoError::Verschluesselung(e.to_string()))?;

        let mut ausgabe = hex::encode(nonce);
        ausgabe.push_str(&hex::encode(chiffrat));
        Ok(ausgabe)
    }

    /// Entschluesselt einen mit `verschluesseln` erzeugten Payload
    pub fn entschluesseln(&self, daten: &str) -> CryptoResult<String> {
        let nonce_hex_laenge = NONCE_LAENGE * 2;
        if daten.len() <= nonce_hex_laenge || !daten.is_ascii() {
            return Err(CryptoError::UngueltigeDaten(format!(
                "Payload zu kurz ({} Zeichen)",
                daten.len()
            )));
        }
        let (nonce_hex, chiffrat_hex) = daten.split_at(nonce_hex_laenge);
        let nonce_bytes = hex::decode(nonce_hex)?;
        let chiffrat = hex::decode(chiffrat_hex)?;

        let klartext = self
            .cipher()?
            .decrypt(XNonce::from_slice(&nonce_bytes), chiffrat.as_slice())
            .map_err(|_| CryptoError::Entschluesselung("Authentifizierung fehlgeschlagen".into()))?;

        String::from_utf8(klartext)
            .map_err(|_| CryptoError::Entschluesselung("Klartext ist kein UTF-8".into()))
    }

    /// Leitet den symmetrischen Schluessel aus dem DH-Ergebnis ab
    fn cipher(&self) -> CryptoResult<XChaCha20Poly1305> {
        let dh = self.geheim.diffie_hellman(&self.oeffentlich);
        let hk = Hkdf::<Sha256>::new(None, dh.as_bytes());
        let mut schluessel = [0u8; 32];
        hk.expand(HKDF_INFO, &mut schluessel)
            .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
        Ok(XChaCha20Poly1305::new((&schluessel).into()))
    }
}

impl std::fmt::Debug for Schluesselpaar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Schluesselpaar {{ oeffentlich: {}, geheim: [X25519 StaticSecret] }}",
            self.oeffentlich_hex()
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verschluesseln_und_entschluesseln() {
        let paar = Schluesselpaar::generieren();
        let chiffrat = paar.verschluesseln("{\"type\":\"offer\"}").unwrap();
        assert_ne!(chiffrat, "{\"type\":\"offer\"}");
        assert_eq!(paar.entschluesseln(&chiffrat).unwrap(), "{\"type\":\"offer\"}");
    }

    #[test]
    fn ausgabe_ist_hex_mit_nonce_praefix() {
        let paar = Schluesselpaar::generieren();
        let chiffrat = paar.verschluesseln("abc").unwrap();
        assert!(chiffrat.bytes().all(|b| b.is_ascii_hexdigit()));
        // Nonce (24) + Klartext (3) + Tag (16)
        assert_eq!(chiffrat.len(), (24 + 3 + 16) * 2);
    }

    #[test]
    fn nonce_ist_zufaellig() {
        let paar = Schluesselpaar::generieren();
        assert_ne!(
            paar.verschluesseln("x").unwrap(),
            paar.verschluesseln("x").unwrap()
        );
    }

    #[test]
    fn rekonstruktion_aus_geheimnis() {
        let paar = Schluesselpaar::generieren();
        let kopie = Schluesselpaar::aus_geheimnis_hex(&paar.geheimnis_hex()).unwrap();
        assert_eq!(paar.oeffentlich_hex(), kopie.oeffentlich_hex());

        let chiffrat = paar.verschluesseln("hallo").unwrap();
        assert_eq!(kopie.entschluesseln(&chiffrat).unwrap(), "hallo");
    }

    #[test]
    fn fremder_schluessel_scheitert() {
        let a = Schluesselpaar::generieren();
        let b = Schluesselpaar::generieren();
        let chiffrat = a.verschluesseln("geheim").unwrap();
        assert!(matches!(
            b.entschluesseln(&chiffrat),
            Err(CryptoError::Entschluesselung(_))
        ));
    }

    #[test]
    fn manipulierter_payload_scheitert() {
        let paar = Schluesselpaar::generieren();
        let mut chiffrat = paar.verschluesseln("geheim").unwrap();
        let letztes = chiffrat.pop().unwrap();
        chiffrat.push(if letztes == '0' { '1' } else { '0' });
        assert!(paar.entschluesseln(&chiffrat).is_err());
    }

    #[test]
    fn kaputte_eingaben_sind_payload_fehler() {
        let paar = Schluesselpaar::generieren();
        let lang = "zz".repeat(40);
        for eingabe in ["", "abc", lang.as_str()] {
            let fehler = paar.entschluesseln(eingabe).unwrap_err();
            assert_eq!(fehler.klasse(), kamerafunk_core::FehlerKlasse::Payload);
        }
    }

    #[test]
    fn geheimnis_mit_falscher_laenge() {
        assert!(matches!(
            Schluesselpaar::aus_geheimnis_hex("abcd"),
            Err(CryptoError::UngueltigeSchluesselLaenge {
                erwartet: 32,
                erhalten: 2
            })
        ));
        assert!(Schluesselpaar::aus_geheimnis_hex("xyz").is_err());
    }

    #[test]
    fn link_hin_und_zurueck() {
        let paar = Schluesselpaar::generieren();
        let link = paar.teilbarer_link("https://kamera.example/watch");
        assert!(link.starts_with("https://kamera.example/watch#"));

        let kopie = Schluesselpaar::aus_link(&link).unwrap();
        assert_eq!(kopie.raum_id().unwrap(), paar.raum_id().unwrap());
    }

    #[test]
    fn link_ersetzt_vorhandenes_fragment() {
        let paar = Schluesselpaar::generieren();
        let link = paar.teilbarer_link("https://kamera.example/#alt");
        assert_eq!(link.matches('#').count(), 1);
        assert!(Schluesselpaar::aus_link("https://kamera.example/").is_err());
    }

    #[test]
    fn raum_id_ist_oeffentlicher_schluessel() {
        let paar = Schluesselpaar::generieren();
        let id = paar.raum_id().unwrap();
        assert_eq!(id.as_str(), paar.oeffentlich_hex());
        assert_eq!(id.as_str().len(), 64);
    }
}
