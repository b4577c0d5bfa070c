//! Server acceptance, live-session registry and connector roundtrips

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::time::Duration;

use futures::StreamExt;
use smpp_session::service::connector::connect_with_config;
use smpp_session::session::SessionEvent;
use smpp_session::transport::tls::{TlsClientConfig, TlsServerConfig};
use smpp_session::{
    connect, ConnectOptions, Fields, Registry, Server, ServerEvent, ServerOptions, Session,
};
use tokio::sync::mpsc;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

fn local_options() -> ServerOptions {
    ServerOptions {
        host: "127.0.0.1".into(),
        ..ServerOptions::default()
    }
}

/// Answers every enquire_link on accepted sessions
fn echo_server(options: ServerOptions, registry: Registry) -> Server {
    Server::with_listener(options, registry, |session: &Session| {
        session
            .on("enquire_link", |session, pdu| {
                session.respond(pdu, Fields::new()).unwrap();
            })
            .unwrap();
    })
    .unwrap()
}

async fn eventually<F: Fn() -> bool>(condition: F) {
    timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn test_plaintext_roundtrip_and_registry_removal() {
    let registry = Registry::smpp();
    let server = echo_server(local_options(), registry.clone());
    let mut server_events = server.subscribe();
    let addr = server.listen(Some("0")).await.unwrap();

    match timeout(WAIT, server_events.next()).await.unwrap() {
        Some(ServerEvent::Listening(listening)) => assert_eq!(listening, addr),
        other => panic!("expected Listening, got {other:?}"),
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let client = connect(
        ConnectOptions::new("127.0.0.1", Some(addr.port())),
        registry,
        Some(Box::new(move |session: &Session| {
            let _ = tx.send(session.is_secure());
        })),
    )
    .await
    .unwrap();
    assert_eq!(rx.try_recv(), Ok(false));

    let response = timeout(WAIT, client.command_request("enquire_link", Fields::new()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(response.command, "enquire_link_resp");
    assert_eq!(response.sequence_number, 1);

    match timeout(WAIT, server_events.next()).await.unwrap() {
        Some(ServerEvent::Session(session)) => assert!(!session.is_secure()),
        other => panic!("expected Session, got {other:?}"),
    }
    assert_eq!(server.session_count(), 1);

    client.close(None);
    timeout(WAIT, client.wait_closed()).await.unwrap();
    eventually(|| server.session_count() == 0).await;
    server.shutdown();
}

#[tokio::test]
async fn test_tls_roundtrip_on_secure_server() {
    let dir = tempfile::tempdir().unwrap();
    let tls = TlsServerConfig::generate_self_signed(
        dir.path().join("cert.pem"),
        dir.path().join("key.pem"),
    )
    .unwrap();

    let registry = Registry::smpp();
    let server = echo_server(local_options().with_tls(tls), registry.clone());
    assert!(server.is_tls());
    assert_eq!(server.default_port(), 3550);
    assert_eq!(server.resolve_listen_addr(None), "127.0.0.1:3550");

    let addr = server.listen(Some("0")).await.unwrap();
    let options = ConnectOptions::new("127.0.0.1", Some(addr.port()))
        .with_tls(TlsClientConfig::new("localhost").insecure());
    assert_eq!(options.port, addr.port());

    let client = connect(options, registry, None).await.unwrap();
    assert!(client.is_secure());

    let response = timeout(WAIT, client.command_request("enquire_link", Fields::new()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(response.command, "enquire_link_resp");

    eventually(|| server.sessions().iter().all(Session::is_secure) && server.session_count() == 1)
        .await;
    server.shutdown();
    timeout(WAIT, client.wait_closed()).await.unwrap();
}

#[tokio::test]
async fn test_connect_emits_connect_event_before_handler_runs() {
    let registry = Registry::smpp();
    let server = echo_server(local_options(), registry.clone());
    let addr = server.listen(Some("0")).await.unwrap();

    let session = Session::outbound(
        ConnectOptions::new("127.0.0.1", Some(addr.port())),
        registry,
        &Default::default(),
    );
    let mut events = session.subscribe();
    session.connect().await.unwrap();

    let first = timeout(WAIT, events.next()).await.unwrap().unwrap();
    assert!(matches!(first, SessionEvent::Connect));
    server.shutdown();
}

#[tokio::test]
async fn test_shutdown_closes_live_sessions() {
    let registry = Registry::smpp();
    let server = echo_server(local_options(), registry.clone());
    let addr = server.listen(Some("0")).await.unwrap();

    let first = connect(ConnectOptions::new("127.0.0.1", Some(addr.port())), registry.clone(), None)
        .await
        .unwrap();
    let second = connect(ConnectOptions::new("127.0.0.1", Some(addr.port())), registry, None)
        .await
        .unwrap();
    eventually(|| server.session_count() == 2).await;

    server.shutdown();
    timeout(WAIT, first.wait_closed()).await.unwrap();
    timeout(WAIT, second.wait_closed()).await.unwrap();
    eventually(|| server.session_count() == 0).await;
}

#[tokio::test]
async fn test_connection_limit_drops_extra_clients() {
    let registry = Registry::smpp();
    let options = ServerOptions {
        max_connections: 1,
        ..local_options()
    };
    let server = echo_server(options, registry.clone());
    let addr = server.listen(Some("0")).await.unwrap();

    let _kept = connect(ConnectOptions::new("127.0.0.1", Some(addr.port())), registry.clone(), None)
        .await
        .unwrap();
    eventually(|| server.session_count() == 1).await;

    let dropped = connect_with_config(
        ConnectOptions::new("127.0.0.1", Some(addr.port())),
        registry,
        &Default::default(),
        None,
    )
    .await
    .unwrap();
    timeout(WAIT, dropped.wait_closed()).await.unwrap();
    assert_eq!(server.session_count(), 1);
    server.shutdown();
}

#[tokio::test]
async fn test_connection_limit_counts_tls_handshakes_in_progress() {
    let dir = tempfile::tempdir().unwrap();
    let tls = TlsServerConfig::generate_self_signed(
        dir.path().join("cert.pem"),
        dir.path().join("key.pem"),
    )
    .unwrap();
    let registry = Registry::smpp();
    let options = ServerOptions {
        max_connections: 1,
        ..local_options().with_tls(tls)
    };
    let server = echo_server(options, registry.clone());
    let addr = server.listen(Some("0")).await.unwrap();
    let client_options = || {
        ConnectOptions::new("127.0.0.1", Some(addr.port()))
            .with_tls(TlsClientConfig::new("localhost").insecure())
    };

    // Plain TCP that never sends a ClientHello holds the only slot
    let stalled = tokio::net::TcpStream::connect(addr).await.unwrap();
    eventually(|| server.reserved_slots() == 1).await;

    let refused = timeout(WAIT, connect(client_options(), registry.clone(), None))
        .await
        .unwrap();
    assert!(refused.is_err());
    assert_eq!(server.session_count(), 0);

    // A failed handshake gives its slot back
    drop(stalled);
    eventually(|| server.reserved_slots() == 0).await;

    let client = timeout(WAIT, connect(client_options(), registry, None))
        .await
        .unwrap()
        .unwrap();
    eventually(|| server.session_count() == 1).await;
    assert_eq!(server.reserved_slots(), 1);

    server.shutdown();
    timeout(WAIT, client.wait_closed()).await.unwrap();
    eventually(|| server.reserved_slots() == 0).await;
}
