//! The per-table WebSocket channel (§4.8, §6): one connection per observer,
//! joined to the table's broadcast group on connect and projected to that
//! connection's authenticated user on every subsequent broadcast.

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::domain::{Command, Seat};
use crate::fanout::{self, ServerMessage};

use super::http::{AddBotRequest, AppState, JoinRequest, RemoveBotRequest};
use super::response::{WS_CLOSE_AUTH_ERROR, WS_CLOSE_UNKNOWN_TABLE};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// Incoming client frame: `{action, data}` (§4.8). `data` is left as raw
/// JSON until `action` tells us which request shape to decode it as.
#[derive(Debug, Deserialize)]
struct ClientMessage {
    action: String,
    #[serde(default)]
    data: serde_json::Value,
}

pub async fn ws_upgrade(
    State(state): State<AppState>,
    Path(table_id): Path<Uuid>,
    Query(query): Query<WsQuery>,
    headers: axum::http::HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let token = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
        .or(query.token);

    ws.on_upgrade(move |socket| async move {
        match authenticate_connection(&state, token, table_id).await {
            Ok(user) => handle_socket(socket, state, table_id, user).await,
            Err((code, reason)) => close_immediately(socket, code, reason).await,
        }
    })
}

async fn authenticate_connection(
    state: &AppState,
    token: Option<String>,
    table_id: Uuid,
) -> Result<AuthenticatedUser, (u16, &'static str)> {
    let token = token.ok_or((WS_CLOSE_AUTH_ERROR, "missing bearer token"))?;
    let user = state.verifier.verify(&token).await.map_err(|_| (WS_CLOSE_AUTH_ERROR, "invalid bearer token"))?;
    state.manager.get_table(table_id, None).await.map_err(|_| (WS_CLOSE_UNKNOWN_TABLE, "unknown table"))?;
    Ok(user)
}

async fn close_immediately(mut socket: WebSocket, code: u16, reason: &'static str) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame { code, reason: reason.into() })))
        .await;
}

async fn handle_socket(socket: WebSocket, state: AppState, table_id: Uuid, user: AuthenticatedUser) {
    let (mut sink, mut stream) = socket.split();
    let mut group_rx = state.manager.bus().subscribe(table_id).await;
    let (direct_tx, mut direct_rx) = mpsc::unbounded_channel::<ServerMessage<'static>>();

    let viewer = user.user_id.clone();
    let writer = tokio::spawn(async move {
        loop {
            tokio::select! {
                broadcast = group_rx.recv() => {
                    let Ok(message) = broadcast else { break };
                    let view = fanout::project_for_viewer(&message, Some(&viewer));
                    if send_json(&mut sink, &view).await.is_err() {
                        break;
                    }
                }
                direct = direct_rx.recv() => {
                    let Some(view) = direct else { break };
                    if send_json(&mut sink, &view).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    while let Some(Ok(message)) = stream.next().await {
        let Message::Text(text) = message else { continue };
        let parsed: Result<ClientMessage, _> = serde_json::from_str(&text);
        let outcome = match parsed {
            Ok(client_message) => dispatch(&state, table_id, &user.user_id, client_message).await,
            Err(e) => Err(crate::error::AppError::parse("client_message", e.to_string())),
        };
        if let Err(err) = outcome {
            let frame = ServerMessage::Error { data: (&err).into() };
            if direct_tx.send(owned_error_message(frame)).is_err() {
                break;
            }
        }
    }

    writer.abort();
}

/// `ServerMessage` borrows from the domain types of a `BusMessage`/error it
/// projects; error frames carry no such borrow, so they can be rebuilt as
/// `'static` to cross into the `mpsc` channel untied from this iteration's
/// borrow.
fn owned_error_message(message: ServerMessage<'_>) -> ServerMessage<'static> {
    match message {
        ServerMessage::Error { data } => ServerMessage::Error { data },
        _ => unreachable!("owned_error_message is only ever called with an Error frame"),
    }
}

async fn send_json(sink: &mut futures::stream::SplitSink<WebSocket, Message>, value: &impl serde::Serialize) -> Result<(), axum::Error> {
    let text = serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string());
    sink.send(Message::Text(text)).await
}

async fn dispatch(state: &AppState, table_id: Uuid, user_id: &str, message: ClientMessage) -> crate::error::Result<()> {
    match message.action.as_str() {
        "join" => {
            let body: JoinRequest = parse_data(message.data)?;
            state.manager.join_table(table_id, user_id, &body.screen_name, body.seat).await?;
        }
        "leave" => {
            state.manager.leave_table(table_id, user_id).await?;
        }
        "add-bot" => {
            let body: AddBotRequest = parse_data(message.data)?;
            state.manager.add_bot_player(table_id, &body.bot_kind, user_id, body.seat).await?;
        }
        "remove-bot" => {
            let body: RemoveBotRequest = parse_data(message.data)?;
            state.manager.remove_bot_player(table_id, body.seat, user_id).await?;
        }
        "start-game" => {
            state.manager.start_game(table_id, user_id).await?;
        }
        "take-turn" => {
            let command: Command = parse_data(message.data)?;
            state.manager.take_regular_turn(table_id, user_id, command).await?;
        }
        "take-automatic-turn" => {
            state.manager.take_automatic_turn(table_id, user_id).await?;
        }
        "cancel-game" => {
            state.manager.cancel_game(table_id, user_id).await?;
        }
        "abort-game" => {
            let to_blame: Option<Seat> = parse_data(message.data)?;
            state.manager.abort_game(table_id, user_id, to_blame).await?;
        }
        other => {
            return Err(crate::error::AppError::parse("unknown_action", format!("no such action '{other}'")));
        }
    }
    Ok(())
}

fn parse_data<T: serde::de::DeserializeOwned>(data: serde_json::Value) -> crate::error::Result<T> {
    serde_json::from_value(data).map_err(|e| crate::error::AppError::parse("client_message_data", e.to_string()))
}
