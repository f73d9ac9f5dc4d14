use std::process::Stdio;

use axum::{
    extract::{
        Path, RawQuery, State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    process::Command,
};
use tracing::{debug, warn};

use crate::{
    application::state::SharedState,
    domain::models::{Actor, ResourceStatus},
    protocol::{
        CLOSE_TERMINAL_NOT_FOUND, CLOSE_TERMINAL_NOT_RUNNING, CLOSE_TERMINAL_UNAUTHENTICATED,
        TerminalInbound, TerminalOutbound,
    },
};

const SHELL: &str = "/bin/bash";
const OUTPUT_CHUNK: usize = 4096;

/// Interactive shell session inside a running workspace. Unlike the chat
/// hub, this channel requires an authenticated owner up front.
pub async fn terminal_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
    Path(workspace_id): Path<String>,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    let actor = super::ws::resolve_query_actor(&state, query.as_deref()).await;
    ws.on_upgrade(move |socket| handle_terminal_socket(socket, state, workspace_id, actor))
}

async fn handle_terminal_socket(
    socket: WebSocket,
    state: SharedState,
    workspace_id: String,
    actor: Actor,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let Actor::Principal(principal) = actor else {
        close_with(&mut ws_tx, CLOSE_TERMINAL_UNAUTHENTICATED, "unauthenticated").await;
        return;
    };

    let workspace = match state
        .store()
        .find_workspace_resource(&workspace_id, &principal.id)
        .await
    {
        Ok(Some(workspace)) => workspace,
        Ok(None) => {
            close_with(&mut ws_tx, CLOSE_TERMINAL_NOT_FOUND, "workspace_not_found").await;
            return;
        }
        Err(error) => {
            warn!("workspace lookup failed workspace={workspace_id}: {error}");
            close_with(&mut ws_tx, CLOSE_TERMINAL_NOT_FOUND, "workspace_lookup_failed").await;
            return;
        }
    };

    if workspace.status != ResourceStatus::Running {
        send_frame(
            &mut ws_tx,
            &TerminalOutbound::Error {
                message: "Workspace is not running. Start it first.".to_owned(),
            },
        )
        .await;
        close_with(&mut ws_tx, CLOSE_TERMINAL_NOT_RUNNING, "workspace_not_running").await;
        return;
    }

    let mut child = match Command::new(SHELL)
        .arg("--login")
        .env("TERM", "xterm-256color")
        .env("WORKSPACE_ID", &workspace_id)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
    {
        Ok(child) => child,
        Err(error) => {
            warn!("shell spawn failed workspace={workspace_id}: {error}");
            send_frame(
                &mut ws_tx,
                &TerminalOutbound::Error {
                    message: "Could not start shell session.".to_owned(),
                },
            )
            .await;
            return;
        }
    };

    let mut stdin = child.stdin.take();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let (frame_tx, mut frame_rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    if let Some(stdout) = stdout {
        spawn_output_pump(stdout, frame_tx.clone());
    }
    if let Some(stderr) = stderr {
        spawn_output_pump(stderr, frame_tx.clone());
    }
    drop(frame_tx);

    let writer = tokio::spawn(async move {
        while let Some(frame) = frame_rx.recv().await {
            if ws_tx.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
        // All pumps finished: the shell exited.
        if let Ok(frame) = serde_json::to_string(&TerminalOutbound::Output {
            data: "\r\n[Shell session ended]\r\n".to_owned(),
        }) {
            let _ = ws_tx.send(Message::Text(frame.into())).await;
        }
        let _ = ws_tx.send(Message::Close(None)).await;
    });

    while let Some(next) = ws_rx.next().await {
        let message = match next {
            Ok(message) => message,
            Err(error) => {
                debug!("terminal receive failed workspace={workspace_id}: {error}");
                break;
            }
        };

        let text = match message {
            Message::Text(text) => text.to_string(),
            Message::Close(_) => break,
            _ => continue,
        };

        let Ok(inbound) = serde_json::from_str::<TerminalInbound>(&text) else {
            continue;
        };

        match inbound {
            TerminalInbound::Input { data } => {
                if data.is_empty() {
                    continue;
                }
                if let Some(stdin) = stdin.as_mut()
                    && stdin.write_all(data.as_bytes()).await.is_err()
                {
                    break;
                }
            }
            // Accepted for protocol compatibility; pipes have no window size.
            TerminalInbound::Resize { .. } => {}
        }
    }

    drop(stdin);
    if let Err(error) = child.kill().await {
        debug!("shell kill failed workspace={workspace_id}: {error}");
    }
    writer.abort();
    debug!("terminal session closed workspace={workspace_id}");
}

fn spawn_output_pump(
    mut reader: impl AsyncReadExt + Unpin + Send + 'static,
    frames: tokio::sync::mpsc::UnboundedSender<String>,
) {
    tokio::spawn(async move {
        let mut buffer = [0_u8; OUTPUT_CHUNK];
        loop {
            match reader.read(&mut buffer).await {
                Ok(0) | Err(_) => break,
                Ok(read) => {
                    let data = String::from_utf8_lossy(&buffer[..read]).into_owned();
                    let Ok(frame) = serde_json::to_string(&TerminalOutbound::Output { data }) else {
                        continue;
                    };
                    if frames.send(frame).is_err() {
                        break;
                    }
                }
            }
        }
    });
}

async fn send_frame(ws_tx: &mut SplitSink<WebSocket, Message>, frame: &TerminalOutbound) {
    if let Ok(text) = serde_json::to_string(frame) {
        let _ = ws_tx.send(Message::Text(text.into())).await;
    }
}

async fn close_with(ws_tx: &mut SplitSink<WebSocket, Message>, code: u16, reason: &str) {
    let frame = CloseFrame {
        code,
        reason: reason.to_owned().into(),
    };
    let _ = ws_tx.send(Message::Close(Some(frame))).await;
}
