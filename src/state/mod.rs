//! Application state management
//!
//! Owns the agent registry and wires it to the dispatcher, the live
//! connection table, and the observer event channel. One `AppState` is
//! constructed at startup and cloned into every handler.

pub mod registry;

pub use registry::{Agent, AgentId, AgentRegistry, AgentStatus, ConnectionId};

use crate::channel::ConnectionMap;
use crate::dispatch::Dispatcher;
use crate::messages::ObserverEvent;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Shared application state handed to HTTP and WebSocket handlers.
#[derive(Clone)]
pub struct AppState {
    /// Directory of attached agents
    pub registry: Arc<AgentRegistry>,
    /// Outbound senders of the live agent sockets
    pub connections: Arc<ConnectionMap>,
    /// Task dispatch over the live connections
    pub dispatcher: Arc<Dispatcher>,
    /// Broadcast channel feeding observer dashboards
    pub events: broadcast::Sender<ObserverEvent>,
}

impl AppState {
    /// Build the state graph: a registry, the connection table serving as
    /// the dispatch channel, and an observer event channel of the given
    /// capacity. Lagging observers drop events rather than backpressure
    /// the agents.
    pub fn new(event_capacity: usize) -> Self {
        let registry = Arc::new(AgentRegistry::new());
        let connections = Arc::new(ConnectionMap::new());
        let dispatcher = Arc::new(Dispatcher::new(registry.clone(), connections.clone()));
        let (events, _) = broadcast::channel(event_capacity);
        Self {
            registry,
            connections,
            dispatcher,
            events,
        }
    }
}
