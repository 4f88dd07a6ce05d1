//! Application error taxonomy.
//!
//! One `thiserror` enum covering every concern, `#[from]` conversions at the
//! infra boundary so call sites use `?`, and a `context` wrapper for
//! attaching `table_id`/`user_id`/`operation` as errors propagate up through
//! the table manager.

use std::fmt;

use uuid::Uuid;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, AppError>;

/// Top-level error taxonomy, mapped to HTTP status / WS close codes at the
/// transport boundary (see `transport::response`).
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Malformed client data: unknown card, unparseable command, invalid config.
    #[error("parse error: {reason}: {message}")]
    Parse { reason: String, message: String },

    /// Legal game/table rule violation (not your turn, card not allowed, ...).
    #[error("rules error: {reason}: {message}")]
    Rules { reason: String, message: String },

    /// Impossible state reached (event number mismatch, card not in hand).
    #[error("internal engine error: {reason}: {message}")]
    Internal { reason: String, message: String },

    /// Unknown table/event.
    #[error("not found: {0}")]
    NotFound(String),

    /// Store/cache failure.
    #[error("infra error: {0}")]
    Infra(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Missing/invalid auth token.
    #[error("auth error: {0}")]
    Auth(String),

    /// An error annotated with operation context, preserving its cause.
    #[error("{context}: {source}")]
    WithContext {
        context: ErrorContext,
        #[source]
        source: Box<AppError>,
    },
}

/// Context attached to an error as it propagates through the table manager.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    pub table_id: Option<Uuid>,
    pub user_id: Option<String>,
    pub operation: Option<String>,
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "operation")?;
        if let Some(op) = &self.operation {
            write!(f, " {op}")?;
        }
        if let Some(id) = &self.table_id {
            write!(f, " on table {id}")?;
        }
        if let Some(uid) = &self.user_id {
            write!(f, " by {uid}")?;
        }
        Ok(())
    }
}

impl AppError {
    pub fn parse(reason: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Parse {
            reason: reason.into(),
            message: message.into(),
        }
    }

    pub fn rules(reason: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Rules {
            reason: reason.into(),
            message: message.into(),
        }
    }

    pub fn internal(reason: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Internal {
            reason: reason.into(),
            message: message.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::NotFound(what.into())
    }

    pub fn infra(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        AppError::Infra(Box::new(err))
    }

    /// Attach context, preserving this error as the source.
    pub fn with_context(self, context: ErrorContext) -> Self {
        AppError::WithContext {
            context,
            source: Box::new(self),
        }
    }

    /// Whether this error is worth retrying (transient infra failure or a
    /// sequence conflict raised as an internal error during append).
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Infra(_) => true,
            AppError::Internal { reason, .. } => reason == "sequence_conflict",
            AppError::WithContext { source, .. } => source.is_retryable(),
            _ => false,
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::infra(err)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::infra(err)
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::parse("uuid", err.to_string())
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::infra(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_wraps_without_losing_source() {
        let base = AppError::rules("not_your_turn", "seat 2 acted out of turn");
        let wrapped = base.with_context(ErrorContext {
            table_id: Some(Uuid::nil()),
            user_id: Some("human-1".into()),
            operation: Some("take_regular_turn".into()),
        });
        let rendered = format!("{wrapped}");
        assert!(rendered.contains("take_regular_turn"));
    }

    #[test]
    fn infra_errors_are_retryable() {
        let err = AppError::internal("sequence_conflict", "expected 4, got 5");
        assert!(err.is_retryable());
        let err = AppError::rules("not_your_turn", "x");
        assert!(!err.is_retryable());
    }
}
