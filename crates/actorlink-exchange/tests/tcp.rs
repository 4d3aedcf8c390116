//! Full session over a real TCP connection to an in-process peer.

use std::net::TcpListener;

use actorlink_core::config::ExchangeConfig;
use actorlink_core::error::ExchangeError;
use actorlink_core::types::{Action, BehaviorName};
use actorlink_exchange::framing::{read_message, write_message};
use actorlink_exchange::prelude::*;
use actorlink_exchange::protocol::{
    InboundMessage, InboundPayload, OutboundMessage, PROTOCOL_VERSION, STATUS_CLOSING,
};
use actorlink_test_utils::{ScriptedPeer, ball_spec, record};

const MAX: usize = 1024 * 1024;

#[test]
fn session_over_tcp() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let config = ExchangeConfig {
        port: listener.local_addr().unwrap().port(),
        timeout_ms: 5_000,
        name: "tcp-sim".into(),
        ..ExchangeConfig::default()
    };

    let peer = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();

        let greeting: OutboundMessage = read_message(&mut stream, MAX).unwrap().unwrap();
        let local = greeting.payload.unwrap().initialization.unwrap();
        assert_eq!(local.name, "tcp-sim");
        let hello = InboundPayload {
            initialization: Some(ScriptedPeer::remote_info(PROTOCOL_VERSION)),
            ..InboundPayload::default()
        };
        write_message(&mut stream, &InboundMessage::ok(hello), MAX).unwrap();

        let _poll: OutboundMessage = read_message(&mut stream, MAX).unwrap().unwrap();
        write_message(&mut stream, &InboundMessage::ok(InboundPayload::default()), MAX).unwrap();

        let step: OutboundMessage = read_message(&mut stream, MAX).unwrap().unwrap();
        let step = step.payload.unwrap();
        let ball = BehaviorName::from("Ball");
        let actions: Vec<Action> = step.batches[&ball]
            .iter()
            .map(|r| Action::Continuous(vec![r.actor_id.0 as f32, 0.0]))
            .collect();
        let reply = InboundPayload {
            actions: [(ball.clone(), actions)].into(),
            acknowledged: vec![ball],
            ..InboundPayload::default()
        };
        write_message(&mut stream, &InboundMessage::ok(reply), MAX).unwrap();

        let closing: OutboundMessage = read_message(&mut stream, MAX).unwrap().unwrap();
        assert_eq!(closing.status, STATUS_CLOSING);
        assert_eq!(step.announcements, vec![ball_spec()]);
    });

    let transport = TcpTransport::connect(&config).unwrap();
    let mut session = Session::from_config(transport, &config);
    session.register_behavior(ball_spec());
    session.open().unwrap();

    for actor in [4, 2, 9] {
        session.submit_observation("Ball", record(&ball_spec(), actor));
    }
    session.step().unwrap();
    session.close();
    peer.join().unwrap();

    assert_eq!(
        session.read_action("Ball", 9),
        Some(&Action::Continuous(vec![9.0, 0.0]))
    );
    assert_eq!(session.announcement_state("Ball"), Some(AnnouncementState::Announced));
}

#[test]
fn peer_hangup_mid_session_closes() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let config = ExchangeConfig {
        port: listener.local_addr().unwrap().port(),
        timeout_ms: 5_000,
        ..ExchangeConfig::default()
    };

    let peer = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let _: OutboundMessage = read_message(&mut stream, MAX).unwrap().unwrap();
        let hello = InboundPayload {
            initialization: Some(ScriptedPeer::remote_info(PROTOCOL_VERSION)),
            ..InboundPayload::default()
        };
        write_message(&mut stream, &InboundMessage::ok(hello), MAX).unwrap();
        let _: OutboundMessage = read_message(&mut stream, MAX).unwrap().unwrap();
        write_message(&mut stream, &InboundMessage::ok(InboundPayload::default()), MAX).unwrap();
    });

    let transport = TcpTransport::connect(&config).unwrap();
    let mut session = Session::from_config(transport, &config);
    session.open().unwrap();
    peer.join().unwrap();

    session.submit_observation("Ball", record(&ball_spec(), 0));
    assert!(session.step().is_err());
    assert_eq!(session.state(), SessionState::Closed);
}

#[test]
fn unreachable_peer_fails_the_handshake() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let config = ExchangeConfig {
        port,
        timeout_ms: 1_000,
        ..ExchangeConfig::default()
    };

    let mut session = Session::from_config(TcpTransport::new(&config), &config)
        .with_env_lookup(|key| (key == "HTTPS_PROXY").then(|| "http://proxy:3128".to_string()));
    let err = session.open().unwrap_err();

    match err {
        ExchangeError::Initialization { message } => {
            assert!(message.contains("peer not reachable"), "{message}");
            assert!(message.contains(&config.address()), "{message}");
            assert!(message.contains("HTTPS_PROXY=http://proxy:3128"), "{message}");
        }
        other => panic!("expected initialization failure, got {other:?}"),
    }
    assert_eq!(session.state(), SessionState::Closed);
}
