//! Agent Dispatch Library
//!
//! This library exposes modules for testing and external use.
//! The main binary is in `src/main.rs`.

pub mod api;
pub mod channel;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod messages;
/// Application state management
///
/// Handles the agent registry and the wiring between dispatch, the live
/// connection table, and the observer event channel.
pub mod state;
pub mod websocket;
