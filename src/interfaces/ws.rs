use axum::{
    Json,
    extract::{
        Path, RawQuery, State,
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::{
    application::{
        groups::{chat_group, docs_group},
        state::SharedState,
    },
    domain::{
        error::DomainError,
        models::{Actor, ChatMessage, ChatRoom},
    },
    protocol::{
        ApiError, CLOSE_INTERNAL_ERROR, ChatBroadcast, ChatInbound, ChatMessagePayload,
        DocBroadcast, DocInbound,
    },
    security::auth,
};

// ---------------------------------------------------------------------------
// Room management (plain HTTP)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateRoomBody {
    pub name: String,
}

pub async fn create_room_handler(
    State(state): State<SharedState>,
    Json(body): Json<CreateRoomBody>,
) -> Result<impl IntoResponse, ApiError> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(DomainError::BadRequest("room name must not be empty".to_owned()).into());
    }

    let room = ChatRoom {
        id: format!("room-{}", uuid::Uuid::new_v4()),
        name: name.to_owned(),
        created_at: Utc::now(),
    };
    state.store().insert_chat_room(&room).await?;

    Ok((StatusCode::CREATED, Json(room)))
}

pub async fn list_rooms_handler(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, ApiError> {
    let rooms = state.store().list_chat_rooms().await?;
    Ok(Json(rooms))
}

pub async fn delete_room_handler(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if state.store().remove_chat_room(&room_id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(DomainError::NotFound(format!("chat room not found: {room_id}")).into())
    }
}

pub async fn list_messages_handler(
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if state.store().get_chat_room(&room_id).await?.is_none() {
        return Err(DomainError::NotFound(format!("chat room not found: {room_id}")).into());
    }

    let messages = state.store().list_chat_messages(&room_id, None).await?;
    Ok(Json(messages))
}

// ---------------------------------------------------------------------------
// Websocket handshake
// ---------------------------------------------------------------------------

/// Chat room socket. Token resolution failure still accepts the connection as
/// Anonymous; authorization is per-operation, not per-connection.
pub async fn chat_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
    Path(room_id): Path<String>,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    let actor = resolve_query_actor(&state, query.as_deref()).await;
    ws.on_upgrade(move |socket| handle_chat_socket(socket, state, room_id, actor))
}

pub async fn docs_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
    Path(doc_id): Path<String>,
    RawQuery(query): RawQuery,
) -> impl IntoResponse {
    let actor = resolve_query_actor(&state, query.as_deref()).await;
    ws.on_upgrade(move |socket| handle_docs_socket(socket, state, doc_id, actor))
}

pub(crate) async fn resolve_query_actor(state: &SharedState, query: Option<&str>) -> Actor {
    let token = query.and_then(auth::query_token);
    state.resolve_actor(token.as_deref()).await
}

// ---------------------------------------------------------------------------
// Chat protocol
// ---------------------------------------------------------------------------

async fn handle_chat_socket(socket: WebSocket, state: SharedState, room_id: String, actor: Actor) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    // A missing room is a policy close, not a silent drop, so clients can
    // distinguish it from a network failure.
    match state.store().get_chat_room(&room_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            close_with(&mut ws_tx, CLOSE_INTERNAL_ERROR, "room_not_found").await;
            return;
        }
        Err(error) => {
            warn!("chat room lookup failed room={room_id}: {error}");
            close_with(&mut ws_tx, CLOSE_INTERNAL_ERROR, "room_lookup_failed").await;
            return;
        }
    }

    let group = chat_group(&room_id);
    let conn_id = format!("conn-{}", uuid::Uuid::new_v4());
    let mut group_rx = state.groups().join(&group, &conn_id).await;

    let forward = tokio::spawn(async move {
        while let Some(frame) = group_rx.recv().await {
            if ws_tx.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
        ws_tx
    });

    while let Some(next) = ws_rx.next().await {
        let message = match next {
            Ok(message) => message,
            Err(error) => {
                debug!("chat receive failed conn={conn_id}: {error}");
                break;
            }
        };

        let Some(text) = message_text(message) else {
            continue;
        };

        // Frames without usable text are dropped without a reply.
        let Ok(inbound) = serde_json::from_str::<ChatInbound>(&text) else {
            continue;
        };
        let Some(body) = inbound.text.map(|text| text.trim().to_owned()) else {
            continue;
        };
        if body.is_empty() {
            continue;
        }

        let record = ChatMessage {
            id: format!("msg-{}", uuid::Uuid::new_v4()),
            room_id: room_id.clone(),
            sender_id: actor.principal_id().map(str::to_owned),
            text: body,
            metadata: json!({}),
            created_at: Utc::now(),
        };

        // Persistence precedes broadcast; failure suppresses the frame and
        // abandons the connection.
        if let Err(error) = state.store().insert_chat_message(&record).await {
            warn!("chat persistence failed room={room_id}: {error}");
            state.groups().leave(&group, &conn_id).await;
            if let Ok(mut ws_tx) = forward.await {
                close_with(&mut ws_tx, CLOSE_INTERNAL_ERROR, "persistence_failed").await;
            }
            return;
        }

        let broadcast = ChatBroadcast::new(ChatMessagePayload {
            id: record.id.clone(),
            text: record.text.clone(),
            sender: actor.display_name().to_owned(),
            created_at: record.created_at,
        });
        match serde_json::to_string(&broadcast) {
            Ok(frame) => state.groups().send(&group, &frame).await,
            Err(error) => warn!("chat broadcast serialization failed: {error}"),
        }
    }

    state.groups().leave(&group, &conn_id).await;
    forward.abort();
    debug!("chat connection closed room={room_id} conn={conn_id}");
}

// ---------------------------------------------------------------------------
// Document co-edit protocol
// ---------------------------------------------------------------------------

/// Doc rooms are ephemeral: frames are relayed, never persisted. A
/// collaborator interested in durability joins the group like any client.
async fn handle_docs_socket(socket: WebSocket, state: SharedState, doc_id: String, actor: Actor) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    let group = docs_group(&doc_id);
    let conn_id = format!("conn-{}", uuid::Uuid::new_v4());
    let mut group_rx = state.groups().join(&group, &conn_id).await;

    let forward = tokio::spawn(async move {
        while let Some(frame) = group_rx.recv().await {
            if ws_tx.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(next) = ws_rx.next().await {
        let message = match next {
            Ok(message) => message,
            Err(error) => {
                debug!("docs receive failed conn={conn_id}: {error}");
                break;
            }
        };

        let Some(text) = message_text(message) else {
            continue;
        };
        let Ok(inbound) = serde_json::from_str::<DocInbound>(&text) else {
            continue;
        };
        let Some(content) = inbound.content else {
            continue;
        };

        let broadcast = DocBroadcast::new(content, actor.display_name().to_owned());
        match serde_json::to_string(&broadcast) {
            Ok(frame) => state.groups().send(&group, &frame).await,
            Err(error) => warn!("doc broadcast serialization failed: {error}"),
        }
    }

    state.groups().leave(&group, &conn_id).await;
    forward.abort();
    debug!("docs connection closed doc={doc_id} conn={conn_id}");
}

// ---------------------------------------------------------------------------
// Shared socket helpers
// ---------------------------------------------------------------------------

fn message_text(message: Message) -> Option<String> {
    match message {
        Message::Text(text) => Some(text.to_string()),
        Message::Binary(bytes) => String::from_utf8(bytes.to_vec()).ok(),
        Message::Ping(_) | Message::Pong(_) | Message::Close(_) => None,
    }
}

async fn close_with(ws_tx: &mut SplitSink<WebSocket, Message>, code: u16, reason: &str) {
    let frame = CloseFrame {
        code,
        reason: reason.to_owned().into(),
    };
    let _ = ws_tx.send(Message::Close(Some(frame))).await;
}
