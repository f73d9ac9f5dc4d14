use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use atrium_core::{
    application::{config::RuntimeConfig, startup, state::SharedState},
    domain::models::ScheduleItem,
    scheduler::NotificationSink,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tempfile::TempDir;
use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Reminder sink that counts firings, so sweep tests can observe exactly how
/// many notifications were emitted.
#[derive(Debug, Default)]
pub(crate) struct CountingSink {
    fired: AtomicUsize,
}

impl CountingSink {
    pub(crate) fn count(&self) -> usize {
        self.fired.load(Ordering::SeqCst)
    }
}

impl NotificationSink for CountingSink {
    fn notify(&self, _item: &ScheduleItem) {
        self.fired.fetch_add(1, Ordering::SeqCst);
    }
}

pub(crate) struct ServerHandle {
    pub(crate) addr: SocketAddr,
    pub(crate) state: SharedState,
    pub(crate) sink: Arc<CountingSink>,
    shutdown: Option<oneshot::Sender<()>>,
    join: JoinHandle<()>,
    _temp_dir: TempDir,
}

impl ServerHandle {
    pub(crate) fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub(crate) fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{path}", self.addr)
    }

    pub(crate) async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        let _ = self.join.await;
    }
}

pub(crate) async fn spawn_server() -> ServerHandle {
    spawn_server_with(|_| {}).await
}

pub(crate) async fn spawn_server_with(
    configure: impl FnOnce(&mut RuntimeConfig),
) -> ServerHandle {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("listener should bind");
    let addr = listener
        .local_addr()
        .expect("listener should expose local addr");

    let temp_dir = tempfile::tempdir().expect("temp dir should be created");
    let db_path = temp_dir.path().join("atrium.db");

    let mut config = RuntimeConfig::for_test(IpAddr::V4(Ipv4Addr::LOCALHOST), addr.port(), db_path);
    configure(&mut config);

    let sink = Arc::new(CountingSink::default());
    let state = SharedState::with_sink(config, sink.clone())
        .await
        .expect("state should build");

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let server_state = state.clone();
    let join = tokio::spawn(async move {
        let _ = startup::run_with_state(listener, server_state, async {
            let _ = shutdown_rx.await;
        })
        .await;
    });

    ServerHandle {
        addr,
        state,
        sink,
        shutdown: Some(shutdown_tx),
        join,
        _temp_dir: temp_dir,
    }
}

/// Sign up a fresh principal and return `(principal_id, token)`.
pub(crate) async fn signup(
    client: &reqwest::Client,
    server: &ServerHandle,
    username: &str,
) -> (String, String) {
    let response = client
        .post(server.url("/auth/signup/"))
        .json(&serde_json::json!({
            "username": username,
            "email": format!("{username}@example.com"),
        }))
        .send()
        .await
        .expect("signup should send");
    assert_eq!(response.status().as_u16(), 201, "signup should succeed");

    let body = response.json::<Value>().await.expect("signup body should parse");
    let principal_id = body["principal"]["id"]
        .as_str()
        .expect("principal id expected")
        .to_owned();
    let token = body["token"].as_str().expect("token expected").to_owned();
    (principal_id, token)
}

pub(crate) async fn connect_ws(url: &str) -> WsStream {
    let (socket, _) = connect_async(url).await.expect("websocket should connect");
    socket
}

pub(crate) async fn send_json(ws: &mut WsStream, value: Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .expect("frame should send");
}

pub(crate) async fn recv_json(ws: &mut WsStream) -> Value {
    while let Some(next) = ws.next().await {
        let message = next.expect("websocket stream should remain valid");
        match message {
            Message::Text(text) => {
                return serde_json::from_str(text.as_ref()).expect("json payload expected");
            }
            Message::Binary(bytes) => {
                return serde_json::from_slice(bytes.as_ref()).expect("json payload expected");
            }
            Message::Ping(payload) => {
                ws.send(Message::Pong(payload))
                    .await
                    .expect("pong should send");
            }
            Message::Pong(_) => {}
            Message::Close(frame) => panic!("websocket closed before payload: {frame:?}"),
            Message::Frame(_) => {}
        }
    }

    panic!("websocket ended unexpectedly");
}

/// Drain until the peer closes, returning the close code if one was sent.
pub(crate) async fn recv_close_code(ws: &mut WsStream) -> Option<u16> {
    while let Some(next) = ws.next().await {
        match next {
            Ok(Message::Close(Some(frame))) => return Some(frame.code.into()),
            Ok(Message::Close(None)) => return None,
            Ok(_) => {}
            Err(_) => return None,
        }
    }
    None
}
