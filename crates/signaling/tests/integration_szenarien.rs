//! Integration-Tests fuer den Relay (Raeume, Offer-Cache, Adressierung)

use futures_util::StreamExt;
use kamerafunk_core::{SignalArt, SignalNachricht};
use kamerafunk_signaling::{Abonnement, RelayKonfig, RelayService, RoomRegistry};
use std::time::Duration;

fn service() -> RelayService {
    RelayService::neu(RoomRegistry::neu(), RelayKonfig::default())
}

fn alle(abo: &mut Abonnement) -> Vec<SignalNachricht> {
    std::iter::from_fn(|| abo.try_empfangen()).collect()
}

fn nur(nachrichten: Vec<SignalNachricht>, art: SignalArt) -> Vec<SignalNachricht> {
    nachrichten.into_iter().filter(|n| n.art == art).collect()
}

#[tokio::test]
async fn receiver_bekommt_id_dann_offer_und_sender_connected() {
    let service = service();

    let mut sender = service.stream_oeffnen("abc", "sender").unwrap();
    assert_eq!(sender.listener_id().inner(), 1);
    service.offer_einreichen("abc", Some("O1")).unwrap();
    alle(&mut sender);

    let mut receiver = service.stream_oeffnen("abc", "receiver").unwrap();
    assert_eq!(receiver.listener_id().inner(), 2);

    let erste = receiver.next().await.unwrap();
    assert_eq!(erste, SignalNachricht::neu(SignalArt::ReceiverId, "2"));
    let zweite = receiver.next().await.unwrap();
    assert_eq!(zweite, SignalNachricht::offer("O1"));

    let beim_sender = alle(&mut sender);
    assert_eq!(
        nur(beim_sender, SignalArt::Connected),
        vec![SignalNachricht::connected(kamerafunk_core::Rolle::Receiver)]
    );
}

#[tokio::test]
async fn letzter_sender_getrennt_kein_offer_fuer_neue_receiver() {
    let service = service();

    let sender = service.stream_oeffnen("abc", "sender").unwrap();
    service.offer_einreichen("abc", Some("O1")).unwrap();
    drop(sender);

    let room = service
        .registry()
        .finden(&kamerafunk_core::RaumId::parse("abc", 256).unwrap())
        .unwrap();
    assert_eq!(room.cached_offer(), None);

    let mut receiver = service.stream_oeffnen("abc", "receiver").unwrap();
    assert!(nur(alle(&mut receiver), SignalArt::Offer).is_empty());

    // Erst ein neu eingereichtes Offer erreicht den Receiver
    let _neuer_sender = service.stream_oeffnen("abc", "sender").unwrap();
    service.offer_einreichen("abc", Some("O2")).unwrap();
    assert_eq!(
        nur(alle(&mut receiver), SignalArt::Offer),
        vec![SignalNachricht::offer("O2")]
    );
}

#[tokio::test]
async fn answer_wird_nicht_nachgeliefert() {
    let service = service();

    let sender = service.stream_oeffnen("abc", "sender").unwrap();
    let _receiver = service.stream_oeffnen("abc", "receiver").unwrap();

    drop(sender);
    service.answer_einreichen("abc", Some("A1")).unwrap();

    let mut neuer_sender = service.stream_oeffnen("abc", "sender").unwrap();
    assert!(nur(alle(&mut neuer_sender), SignalArt::Answer).is_empty());
}

#[tokio::test]
async fn raeume_sind_isoliert() {
    let service = service();

    let _s1 = service.stream_oeffnen("abc", "sender").unwrap();
    let mut r1 = service.stream_oeffnen("abc", "receiver").unwrap();
    let mut r2 = service.stream_oeffnen("xyz", "receiver").unwrap();
    alle(&mut r1);
    alle(&mut r2);

    service.offer_einreichen("abc", Some("O1")).unwrap();
    assert_eq!(alle(&mut r1), vec![SignalNachricht::offer("O1")]);
    assert!(alle(&mut r2).is_empty());
}

#[tokio::test]
async fn receiver_count_geht_an_alle() {
    let service = service();

    let mut sender = service.stream_oeffnen("abc", "sender").unwrap();
    let mut r1 = service.stream_oeffnen("abc", "receiver").unwrap();
    let r2 = service.stream_oeffnen("abc", "receiver").unwrap();
    drop(r2);

    let letzte = |n: Vec<SignalNachricht>| nur(n, SignalArt::ReceiverCount).pop().unwrap().daten;
    assert_eq!(letzte(alle(&mut sender)), "1");
    assert_eq!(letzte(alle(&mut r1)), "1");
}

#[tokio::test]
async fn offer_loeschen_ohne_broadcast() {
    let service = service();

    let _sender = service.stream_oeffnen("abc", "sender").unwrap();
    let mut receiver = service.stream_oeffnen("abc", "receiver").unwrap();
    service.offer_einreichen("abc", Some("O1")).unwrap();
    alle(&mut receiver);

    service.offer_loeschen("abc").unwrap();
    assert!(alle(&mut receiver).is_empty());

    let mut spaeter = service.stream_oeffnen("abc", "receiver").unwrap();
    assert!(nur(alle(&mut spaeter), SignalArt::Offer).is_empty());
}

#[tokio::test]
async fn gleichzeitige_beitritte_vergeben_eindeutige_ids() {
    let service = service();

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let service = service.clone();
            tokio::spawn(async move {
                let rolle = if i % 2 == 0 { "sender" } else { "receiver" };
                service.stream_oeffnen("abc", rolle).unwrap()
            })
        })
        .collect();

    let mut ids = Vec::new();
    let mut abos = Vec::new();
    for h in handles {
        let abo = h.await.unwrap();
        ids.push(abo.listener_id());
        abos.push(abo);
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 16);
    assert_eq!(service.registry().statistik().listener, 16);

    drop(abos);
    assert_eq!(service.registry().statistik().listener, 0);
}

#[tokio::test]
async fn leerer_raum_wird_nach_gnadenfrist_entfernt() {
    tokio::time::pause();
    let service = service();
    let gnadenfrist = service.konfig().raum_gnadenfrist;

    let abo = service.stream_oeffnen("abc", "receiver").unwrap();
    drop(abo);
    assert_eq!(service.registry().aufraeumen(gnadenfrist), 0);

    tokio::time::advance(gnadenfrist + Duration::from_secs(1)).await;
    assert_eq!(service.registry().aufraeumen(gnadenfrist), 1);
    assert_eq!(service.registry().raum_anzahl(), 0);
}
