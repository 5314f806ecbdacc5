//! Read deadlines and ping liveness over a real socket.

#![allow(clippy::panic)]

mod common;

use std::time::Duration;

use ccus_gateway::config::SessionSettings;
use common::{Client, eventually, spawn_server_with};

fn settings() -> SessionSettings {
    SessionSettings {
        tick_interval: Duration::from_millis(50),
        ping_interval: None,
        client_timeout: None,
        ..SessionSettings::default()
    }
}

#[tokio::test]
async fn silent_client_hits_read_deadline() {
    let server = spawn_server_with(SessionSettings {
        read_timeout: Some(Duration::from_millis(300)),
        ..settings()
    })
    .await;

    let mut client = Client::ready(server.addr, "room").await;
    assert_eq!(server.state.connections.active(), 1);

    assert!(client.closed_by_server().await);
    assert!(eventually(|| server.state.connections.active() == 0).await);
}

#[tokio::test]
async fn pushes_do_not_extend_read_deadline() {
    let server = spawn_server_with(SessionSettings {
        read_timeout: Some(Duration::from_millis(500)),
        ..settings()
    })
    .await;

    let mut client = Client::ready(server.addr, "room").await;
    client.send("+doc=0").await;
    client.sync().await;

    let registry = server.state.registry.clone();
    let publisher = tokio::spawn(async move {
        for counter in 1.. {
            if registry.publish("doc", 0, counter).await.is_err() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    });

    // Pushes keep arriving, yet the client itself never speaks again.
    assert!(client.closed_by_server().await);
    assert!(eventually(|| server.state.connections.active() == 0).await);
    publisher.abort();
}

#[tokio::test]
async fn client_ignoring_pings_is_dropped() {
    let server = spawn_server_with(SessionSettings {
        ping_interval: Some(Duration::from_millis(100)),
        client_timeout: Some(Duration::from_millis(300)),
        ..settings()
    })
    .await;

    // Not reading means the client never answers with a pong.
    let _client = Client::ready(server.addr, "room").await;
    assert!(eventually(|| server.state.connections.active() == 0).await);
}

#[tokio::test]
async fn client_answering_pings_stays_connected() {
    let server = spawn_server_with(SessionSettings {
        ping_interval: Some(Duration::from_millis(100)),
        client_timeout: Some(Duration::from_millis(300)),
        ..settings()
    })
    .await;

    let mut client = Client::ready(server.addr, "room").await;
    for _ in 0..10 {
        // Reading lets the client library reply to pings.
        assert_eq!(client.recv_within(Duration::from_millis(100)).await, None);
    }

    assert!(client.sync().await.is_empty());
    assert_eq!(server.state.connections.active(), 1);
    client.close().await;
}
