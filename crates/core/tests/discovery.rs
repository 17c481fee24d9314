//! Integration test: WS-Discovery responder over loopback UDP.
//!
//! The responder binds an ephemeral loopback port and announces to a plain
//! receiver socket instead of the multicast group, so these tests need no
//! multicast routing.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::time::Duration;

use onvif_bridge::discovery::{DiscoveryAnnouncement, Responder};
use onvif_bridge::{BridgeConfig, BridgeError, DiscoveryConfig};

const TIMEOUT: Duration = Duration::from_secs(2);

fn receiver() -> UdpSocket {
    let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
    socket.set_read_timeout(Some(TIMEOUT)).unwrap();
    socket
}

fn local_v4(socket: &UdpSocket) -> SocketAddrV4 {
    match socket.local_addr().unwrap() {
        SocketAddr::V4(addr) => addr,
        SocketAddr::V6(_) => unreachable!("bound to IPv4"),
    }
}

fn config(announce_to: &UdpSocket, port: u16) -> DiscoveryConfig {
    DiscoveryConfig {
        bind_addr: SocketAddrV4::new(Ipv4Addr::LOCALHOST, port),
        announce_addr: local_v4(announce_to),
        interface: Ipv4Addr::LOCALHOST,
        poll_interval: Duration::from_millis(50),
        error_backoff: Duration::from_millis(50),
    }
}

fn announcement() -> DiscoveryAnnouncement {
    let config = BridgeConfig {
        camera_name: "Test Cam".to_string(),
        hardware_id: "3f1e7f38-1111-4a2b-9c3d-000000000001".to_string(),
        server_ip: "127.0.0.1".to_string(),
        ..BridgeConfig::default()
    };
    DiscoveryAnnouncement::from_config(&config)
}

fn recv(socket: &UdpSocket) -> Option<String> {
    let mut buf = vec![0u8; 65535];
    match socket.recv_from(&mut buf) {
        Ok((len, _)) => Some(String::from_utf8_lossy(&buf[..len]).into_owned()),
        Err(_) => None,
    }
}

fn probe(message_id: &str, types: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <s:Envelope xmlns:s=\"http://www.w3.org/2003/05/soap-envelope\" \
         xmlns:a=\"http://schemas.xmlsoap.org/ws/2004/08/addressing\" \
         xmlns:d=\"http://schemas.xmlsoap.org/ws/2005/04/discovery\" \
         xmlns:dn=\"http://www.onvif.org/ver10/network/wsdl\">\
         <s:Header><a:MessageID>{message_id}</a:MessageID>\
         <a:To>urn:schemas-xmlsoap-org:ws:2005:04:discovery</a:To>\
         <a:Action>http://schemas.xmlsoap.org/ws/2005/04/discovery/Probe</a:Action></s:Header>\
         <s:Body><d:Probe>{types}</d:Probe></s:Body></s:Envelope>"
    )
}

#[test]
fn start_stop_sends_one_hello_then_one_bye() {
    let announce = receiver();
    let mut responder = Responder::new(config(&announce, 0), announcement());
    responder.start().expect("responder start");
    responder.stop();

    let hello = recv(&announce).expect("Hello");
    assert!(hello.contains("/discovery/Hello</wsa:Action>"), "got: {hello}");
    assert!(hello.contains("urn:uuid:3f1e7f38-1111-4a2b-9c3d-000000000001"));
    assert!(hello.contains("onvif://www.onvif.org/name/Test_Cam"));
    assert!(hello.contains("MessageNumber=\"1\""));

    let bye = recv(&announce).expect("Bye");
    assert!(bye.contains("/discovery/Bye</wsa:Action>"), "got: {bye}");
    assert!(bye.contains("MessageNumber=\"2\""));

    announce
        .set_read_timeout(Some(Duration::from_millis(200)))
        .unwrap();
    assert!(recv(&announce).is_none(), "nothing after Bye");
    assert!(!responder.is_running());
}

#[test]
fn restart_rebinds_same_port() {
    let announce = receiver();
    let mut responder = Responder::new(config(&announce, 0), announcement());
    responder.start().unwrap();
    let port = responder.local_addr().unwrap().port();
    responder.stop();

    // A plain bind without SO_REUSEADDR fails if the socket leaked.
    let plain = UdpSocket::bind((Ipv4Addr::LOCALHOST, port)).expect("port released by stop");
    drop(plain);

    let mut again = Responder::new(config(&announce, port), announcement());
    again.start().expect("second start on released port");
    assert_eq!(again.local_addr().unwrap().port(), port);
    again.stop();
}

#[test]
fn second_start_is_rejected() {
    let announce = receiver();
    let mut responder = Responder::new(config(&announce, 0), announcement());
    responder.start().unwrap();
    assert!(matches!(responder.start(), Err(BridgeError::AlreadyRunning)));
    responder.stop();
    responder.stop();
}

#[test]
fn typed_probe_gets_probe_match_relating_to_it() {
    let announce = receiver();
    let mut responder = Responder::new(config(&announce, 0), announcement());
    responder.start().unwrap();
    let target = responder.local_addr().unwrap();

    let client = receiver();
    let id = "urn:uuid:aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee";
    client
        .send_to(probe(id, "<d:Types>dn:NetworkVideoTransmitter</d:Types>").as_bytes(), target)
        .unwrap();

    let reply = recv(&client).expect("ProbeMatch");
    assert!(reply.contains("/discovery/ProbeMatches</wsa:Action>"), "got: {reply}");
    assert!(reply.contains(&format!("<wsa:RelatesTo>{id}</wsa:RelatesTo>")));
    assert!(reply.contains("http://127.0.0.1:8080/onvif/device_service"));

    responder.stop();
}

#[test]
fn generic_probe_also_gets_probe_match() {
    let announce = receiver();
    let mut responder = Responder::new(config(&announce, 0), announcement());
    responder.start().unwrap();
    let target = responder.local_addr().unwrap();

    let client = receiver();
    client
        .send_to(probe("urn:uuid:1", "").as_bytes(), target)
        .unwrap();
    let reply = recv(&client).expect("ProbeMatch");
    assert!(reply.contains("ProbeMatch"));

    client.set_read_timeout(Some(Duration::from_millis(300))).unwrap();
    assert!(recv(&client).is_none(), "exactly one reply per probe");

    responder.stop();
}

#[test]
fn non_probe_datagrams_are_ignored() {
    let announce = receiver();
    let mut responder = Responder::new(config(&announce, 0), announcement());
    responder.start().unwrap();
    let target = responder.local_addr().unwrap();

    let client = receiver();
    client.set_read_timeout(Some(Duration::from_millis(300))).unwrap();
    client.send_to(b"<Resolve/>", target).unwrap();
    client.send_to(&[0xff, 0xfe, 0x00, 0x50], target).unwrap();
    assert!(recv(&client).is_none());

    // Still answering after garbage.
    client.set_read_timeout(Some(TIMEOUT)).unwrap();
    client.send_to(probe("urn:uuid:2", "").as_bytes(), target).unwrap();
    assert!(recv(&client).is_some());

    responder.stop();
}

#[test]
fn replies_follow_arrival_order() {
    let announce = receiver();
    let mut responder = Responder::new(config(&announce, 0), announcement());
    responder.start().unwrap();
    let target = responder.local_addr().unwrap();

    let client = receiver();
    for n in 0..5 {
        client
            .send_to(probe(&format!("urn:uuid:probe-{n}"), "").as_bytes(), target)
            .unwrap();
    }
    for n in 0..5 {
        let reply = recv(&client).expect("ProbeMatch");
        assert!(reply.contains(&format!("<wsa:RelatesTo>urn:uuid:probe-{n}</wsa:RelatesTo>")));
    }

    responder.stop();
}

#[test]
fn unbindable_address_is_a_bind_error() {
    let announce = receiver();
    let mut cfg = config(&announce, 0);
    // TEST-NET-1, never a local address.
    cfg.bind_addr = SocketAddrV4::new(Ipv4Addr::new(192, 0, 2, 1), 0);
    let mut responder = Responder::new(cfg, announcement());

    match responder.start() {
        Err(BridgeError::Bind { addr, .. }) => {
            assert_eq!(addr, SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(192, 0, 2, 1), 0)))
        }
        other => panic!("unexpected: {other:?}"),
    }
    assert!(!responder.is_running());

    announce
        .set_read_timeout(Some(Duration::from_millis(200)))
        .unwrap();
    assert!(recv(&announce).is_none(), "no Hello without a socket");
}
