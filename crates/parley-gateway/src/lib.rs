//! HTTP and WebSocket gateway for Parley.
//!
//! Serves the single-page chat UI, a small REST API for sessions, settings,
//! uploads and export, and a WebSocket that streams model responses.

/// REST handlers and views.
pub mod api;
/// Chat WebSocket.
pub mod chat;
/// Optional API-key authentication.
pub mod middleware;
/// Router assembly.
pub mod server;

pub use chat::OutboundFrame;
pub use middleware::AuthConfig;
pub use server::{spawn_session_sweeper, GatewayOptions, GatewayServer, DEFAULT_MAX_UPLOAD_BYTES};
