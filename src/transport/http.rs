//! REST handlers for table control (§6). Every handler is a thin adapter:
//! extract path/query/body, resolve the caller's identity through the
//! configured [`crate::auth::TokenVerifier`], call one
//! [`crate::table::TableManager`] method, and let [`ApiError`] do the
//! status-code mapping.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::TokenVerifier;
use crate::domain::{Command, GameConfig, GameStateView, Seat, TableConfig};
use crate::error::AppError;
use crate::repository::TableFilter;
use crate::table::{TableManager, TableStatus, TableView};

use super::response::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<TableManager>,
    pub verifier: Arc<dyn TokenVerifier>,
}

/// Pulls the bearer token out of `Authorization: Bearer <token>`, falling
/// back to a `?token=` query parameter (the same two places the WebSocket
/// upgrade accepts one, §6), and resolves it to an [`AuthenticatedUser`].
async fn authenticate(state: &AppState, headers: &HeaderMap, query_token: Option<&str>) -> Result<String, AppError> {
    let token = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .or(query_token)
        .ok_or_else(|| AppError::Auth("missing Authorization header".to_string()))?;
    Ok(state.verifier.verify(token).await?.user_id)
}

/// Same as [`authenticate`], but a missing/absent token is fine — used by
/// read-only endpoints that only need identity to decide whether to
/// include a seat-private projection.
async fn authenticate_optional(state: &AppState, headers: &HeaderMap) -> Option<String> {
    let token = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))?;
    state.verifier.verify(token).await.ok().map(|u| u.user_id)
}

#[derive(Debug, Deserialize)]
pub struct ListTablesQuery {
    pub status: Option<String>,
    pub game_name: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

fn parse_status(raw: &str) -> Result<TableStatus, AppError> {
    match raw {
        "not_started" => Ok(TableStatus::NotStarted),
        "in_progress" => Ok(TableStatus::InProgress),
        "finished" => Ok(TableStatus::Finished),
        "aborted" => Ok(TableStatus::Aborted),
        "cancelled" => Ok(TableStatus::Cancelled),
        other => Err(AppError::parse("table_status", format!("unknown table status '{other}'"))),
    }
}

pub async fn list_tables(
    State(state): State<AppState>,
    Query(query): Query<ListTablesQuery>,
) -> Result<Json<Vec<TableView>>, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(|csv| csv.split(',').map(parse_status).collect::<Result<Vec<_>, _>>())
        .transpose()?;
    let filter = TableFilter { status, game_name: query.game_name, limit: query.limit, offset: query.offset };
    Ok(Json(state.manager.find_tables(filter).await?))
}

#[derive(Debug, Deserialize)]
pub struct CreateTableRequest {
    pub game_name: String,
    pub game_config: Option<GameConfig>,
    pub table_config: Option<TableConfig>,
}

#[derive(Debug, Serialize)]
pub struct CreateTableResponse {
    pub table_id: Uuid,
}

pub async fn create_table(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CreateTableRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let owner_id = authenticate(&state, &headers, None).await?;
    let table_id = state
        .manager
        .add_table(&owner_id, &body.game_name, body.game_config, body.table_config)
        .await?;
    let mut response_headers = HeaderMap::new();
    response_headers.insert(axum::http::header::LOCATION, format!("/tables/{table_id}").parse().unwrap());
    Ok((StatusCode::CREATED, response_headers, Json(CreateTableResponse { table_id })))
}

pub async fn get_table(
    State(state): State<AppState>,
    Path(table_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<TableView>, ApiError> {
    let viewer = authenticate_optional(&state, &headers).await;
    Ok(Json(state.manager.get_table(table_id, viewer.as_deref()).await?))
}

pub async fn delete_table(
    State(state): State<AppState>,
    Path(table_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let caller = authenticate(&state, &headers, None).await?;
    let table = state.manager.get_table(table_id, None).await?;
    if table.owner_id != caller {
        return Err(AppError::rules("not_owner", "only the table's owner may delete it").into());
    }
    if table.status == TableStatus::InProgress {
        state.manager.cancel_game(table_id, &caller).await?;
    } else {
        state.manager.remove_table(table_id).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct JoinRequest {
    pub screen_name: String,
    pub seat: Option<Seat>,
}

pub async fn join_table(
    State(state): State<AppState>,
    Path(table_id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<JoinRequest>,
) -> Result<Json<TableView>, ApiError> {
    let user_id = authenticate(&state, &headers, None).await?;
    Ok(Json(state.manager.join_table(table_id, &user_id, &body.screen_name, body.seat).await?))
}

pub async fn leave_table(
    State(state): State<AppState>,
    Path(table_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<TableView>, ApiError> {
    let user_id = authenticate(&state, &headers, None).await?;
    Ok(Json(state.manager.leave_table(table_id, &user_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct AddBotRequest {
    pub bot_kind: String,
    pub seat: Option<Seat>,
}

pub async fn add_bot(
    State(state): State<AppState>,
    Path(table_id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<AddBotRequest>,
) -> Result<Json<TableView>, ApiError> {
    let initiated_by = authenticate(&state, &headers, None).await?;
    Ok(Json(state.manager.add_bot_player(table_id, &body.bot_kind, &initiated_by, body.seat).await?))
}

#[derive(Debug, Deserialize)]
pub struct RemoveBotRequest {
    pub seat: Seat,
}

pub async fn remove_bot(
    State(state): State<AppState>,
    Path(table_id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<RemoveBotRequest>,
) -> Result<Json<TableView>, ApiError> {
    let initiated_by = authenticate(&state, &headers, None).await?;
    Ok(Json(state.manager.remove_bot_player(table_id, body.seat, &initiated_by).await?))
}

pub async fn start_game(
    State(state): State<AppState>,
    Path(table_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<TableView>, ApiError> {
    let initiated_by = authenticate(&state, &headers, None).await?;
    Ok(Json(state.manager.start_game(table_id, &initiated_by).await?))
}

pub async fn take_turn(
    State(state): State<AppState>,
    Path(table_id): Path<Uuid>,
    headers: HeaderMap,
    Json(command): Json<Command>,
) -> Result<Json<TableView>, ApiError> {
    let user_id = authenticate(&state, &headers, None).await?;
    Ok(Json(state.manager.take_regular_turn(table_id, &user_id, command).await?))
}

pub async fn take_automatic_turn(
    State(state): State<AppState>,
    Path(table_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<TableView>, ApiError> {
    let initiated_by = authenticate(&state, &headers, None).await?;
    Ok(Json(state.manager.take_automatic_turn(table_id, &initiated_by).await?))
}

pub async fn cancel_game(
    State(state): State<AppState>,
    Path(table_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<TableView>, ApiError> {
    let initiated_by = authenticate(&state, &headers, None).await?;
    Ok(Json(state.manager.cancel_game(table_id, &initiated_by).await?))
}

#[derive(Debug, Deserialize)]
pub struct AbortRequest {
    pub to_blame: Option<Seat>,
}

pub async fn abort_game(
    State(state): State<AppState>,
    Path(table_id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<AbortRequest>,
) -> Result<Json<TableView>, ApiError> {
    let initiated_by = authenticate(&state, &headers, None).await?;
    Ok(Json(state.manager.abort_game(table_id, &initiated_by, body.to_blame).await?))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub event: u64,
}

pub async fn history(
    State(state): State<AppState>,
    Path(table_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
    headers: HeaderMap,
) -> Result<Json<GameStateView>, ApiError> {
    let viewer = authenticate_optional(&state, &headers).await;
    let table = state.manager.get_table(table_id, None).await?;
    let viewer_seat = viewer.and_then(|uid| table.players.iter().find(|p| p.user_id.as_deref() == Some(&uid)).map(|p| p.seat));
    let state_at_event = state.manager.get_game_state_snapshot_at(table_id, query.event).await?;
    Ok(Json(state_at_event.to_view(viewer_seat)))
}
