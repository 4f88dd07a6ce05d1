//! Per-connection consumer: projects a `BusMessage` to the shape its
//! specific authenticated user is allowed to see, and wraps thrown errors
//! in the same envelope without killing the connection.

use serde::Serialize;

use crate::bus::BusMessage;
use crate::error::AppError;

/// The wire envelope every server-to-client WS message uses (§6).
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage<'a> {
    GameAction { data: GameActionView<'a> },
    TableAction { data: TableActionView },
    Info { data: String },
    Error { data: ErrorFrame },
}

#[derive(Debug, Serialize)]
pub struct GameActionView<'a> {
    pub events: &'a [crate::domain::Event],
    pub game_state: Option<&'a crate::domain::GameStateView>,
    pub table_status: crate::table::TableStatus,
}

#[derive(Debug, Serialize)]
pub struct TableActionView {
    pub table_status: crate::table::TableStatus,
}

/// A minimal, non-leaking error payload: the reason code and message, never
/// the `#[source]` chain (which may carry infra-internal details).
#[derive(Debug, Serialize)]
pub struct ErrorFrame {
    pub code: &'static str,
    pub reason: String,
    pub message: String,
}

impl From<&AppError> for ErrorFrame {
    fn from(err: &AppError) -> Self {
        match err {
            AppError::Parse { reason, message } => ErrorFrame { code: "parse_error", reason: reason.clone(), message: message.clone() },
            AppError::Rules { reason, message } => ErrorFrame { code: "rules_error", reason: reason.clone(), message: message.clone() },
            AppError::Internal { reason, .. } => ErrorFrame {
                code: "internal_error",
                reason: reason.clone(),
                message: "an internal error occurred".to_string(),
            },
            AppError::NotFound(what) => ErrorFrame { code: "not_found", reason: "not_found".to_string(), message: what.clone() },
            AppError::Infra(_) => ErrorFrame {
                code: "infra_error",
                reason: "infra_error".to_string(),
                message: "a storage or cache error occurred".to_string(),
            },
            AppError::Auth(message) => ErrorFrame { code: "auth_error", reason: "auth_error".to_string(), message: message.clone() },
            AppError::WithContext { source, .. } => ErrorFrame::from(source.as_ref()),
        }
    }
}

/// Projects `message` for `viewer_user_id`'s connection: their own private
/// state if the table manager included one for them, else the public
/// projection, matching "private_game_states[userId] if present else
/// public_game_state" (§4.8).
pub fn project_for_viewer<'a>(message: &'a BusMessage, viewer_user_id: Option<&str>) -> ServerMessage<'a> {
    match message {
        BusMessage::GameAction { events, public_game_state, private_game_states, table_status } => {
            let private = viewer_user_id.and_then(|uid| private_game_states.get(uid));
            let game_state = private.or(public_game_state.as_ref());
            ServerMessage::GameAction {
                data: GameActionView { events, game_state, table_status: *table_status },
            }
        }
        BusMessage::TableAction { table_status } => ServerMessage::TableAction {
            data: TableActionView { table_status: *table_status },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn error_frame_never_exposes_infra_internals() {
        let err = AppError::infra(std::io::Error::other("disk full, path=/secret/db.sqlite"));
        let frame = ErrorFrame::from(&err);
        assert_eq!(frame.code, "infra_error");
        assert!(!frame.message.contains("secret"));
    }

    #[test]
    fn context_wrapped_errors_still_project() {
        let err = AppError::rules("not_your_turn", "x").with_context(crate::error::ErrorContext {
            table_id: None,
            user_id: Some("u1".into()),
            operation: Some("take_regular_turn".into()),
        });
        let frame = ErrorFrame::from(&err);
        assert_eq!(frame.code, "rules_error");
        assert_eq!(frame.reason, "not_your_turn");
    }

    #[test]
    fn viewer_without_a_private_state_falls_back_to_public() {
        let message = BusMessage::GameAction {
            events: vec![],
            public_game_state: None,
            private_game_states: BTreeMap::new(),
            table_status: crate::table::TableStatus::InProgress,
        };
        let view = project_for_viewer(&message, Some("u1"));
        assert!(matches!(view, ServerMessage::GameAction { .. }));
    }
}
