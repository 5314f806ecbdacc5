//! Shared helpers: an in-process server and a small client wrapper.

#![allow(dead_code, clippy::panic)]

use std::net::SocketAddr;
use std::time::Duration;

use ccus_gateway::app_state::AppState;
use ccus_gateway::config::SessionSettings;
use ccus_gateway::domain::Registry;
use ccus_gateway::server;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

pub const WS_PATH: &str = "/ccus";

/// How long to wait for a frame that is expected to arrive.
pub const EXPECT_WITHIN: Duration = Duration::from_secs(3);

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
}

pub async fn spawn_server(tick_interval: Duration) -> TestServer {
    spawn_server_with(SessionSettings {
        tick_interval,
        ..SessionSettings::default()
    })
    .await
}

pub async fn spawn_server_with(settings: SessionSettings) -> TestServer {
    let registry = Registry::new().spawn(64);
    let state = AppState::new(registry, settings);

    let Ok(listener) = TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind failed");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("no local addr");
    };
    tokio::spawn(server::serve(listener, state.clone(), WS_PATH));
    TestServer { addr, state }
}

pub struct Client {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl Client {
    pub async fn connect(addr: SocketAddr) -> Self {
        let Ok((ws, _)) = connect_async(format!("ws://{addr}{WS_PATH}")).await else {
            panic!("connect failed");
        };
        Self { ws }
    }

    /// Connects and completes the handshake for `chid`.
    pub async fn ready(addr: SocketAddr, chid: &str) -> Self {
        let mut client = Self::connect(addr).await;
        client.send(&format!("ccus={chid}")).await;
        client.sync().await;
        client
    }

    pub async fn send(&mut self, text: &str) {
        let Ok(()) = self.ws.send(Message::text(text.to_owned())).await else {
            panic!("send failed");
        };
    }

    /// Next text frame, or `None` if nothing arrives within `wait`.
    pub async fn recv_within(&mut self, wait: Duration) -> Option<String> {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            let next = tokio::time::timeout_at(deadline, self.ws.next()).await.ok()??;
            match next {
                Ok(Message::Text(text)) => return Some(text.as_str().to_owned()),
                Ok(Message::Close(_)) | Err(_) => return None,
                Ok(_) => {}
            }
        }
    }

    pub async fn recv(&mut self) -> String {
        let Some(text) = self.recv_within(EXPECT_WITHIN).await else {
            panic!("expected a frame");
        };
        text
    }

    /// Round trip through the session: a malformed publish is always
    /// answered, so every earlier message has been processed once the
    /// error comes back. Any frame other than the error is returned.
    pub async fn sync(&mut self) -> Vec<String> {
        self.send("#").await;
        let mut before = Vec::new();
        loop {
            let frame = self.recv().await;
            if frame == "Err:invalid message" {
                return before;
            }
            before.push(frame);
        }
    }

    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }

    /// Returns `true` once the server has closed the socket.
    pub async fn closed_by_server(&mut self) -> bool {
        let deadline = tokio::time::Instant::now() + EXPECT_WITHIN;
        loop {
            match tokio::time::timeout_at(deadline, self.ws.next()).await {
                Err(_) => return false,
                Ok(None | Some(Err(_) | Ok(Message::Close(_)))) => return true,
                Ok(Some(Ok(_))) => {}
            }
        }
    }
}

/// Polls `check` until it holds or the wait expires.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + EXPECT_WITHIN;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
