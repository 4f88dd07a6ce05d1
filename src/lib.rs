//! Authoritative server-side core for the Five Hundred card-game service.
//!
//! The crate is organized bottom-up: card primitives, domain types, the
//! deterministic rules engine, the table aggregate that wraps it, the
//! application-layer table manager, persistence/cache/lock backends, fan-out
//! to connected observers, and the HTTP/WebSocket transport that drives it
//! all.

pub mod auth;
pub mod background;
pub mod bot;
pub mod bus;
pub mod cache;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod fanout;
pub mod locks;
pub mod registry;
pub mod repository;
pub mod table;
pub mod transport;
pub mod utils;

pub use error::{AppError, Result};
