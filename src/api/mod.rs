//! API module
//!
//! Contains HTTP request handlers for the agent control surface

pub mod agents;
