//! Core WebSocket infrastructure.
//!
//! This module provides a sans-IO connection manager that keeps one logical connection
//! alive, decodes inbound frames and fans them out to subscribers. It can be specialized
//! for any message type through the [`MessageParser`] trait.
//!
//! # Architecture
//!
//! - [`ConnectionManager`]: Connection state machine with reconnection and fan-out
//! - [`ReconnectPolicy`]: Attempt counter and exponential backoff
//! - [`ListenerRegistry`]: Ordered subscribers with per-listener failure isolation
//! - [`Transport`] and [`Scheduler`]: Seams for the network and the clock
//! - [`runtime`]: tokio and `tokio-tungstenite` implementations of those seams
//!
//! # Example
//!
//! ```ignore
//! // Drive the manager from your own event loop
//! let mut manager = ConnectionManager::new(
//!     "/notifications",
//!     &Platform::current(),
//!     &Config::default(),
//!     NotificationParser,
//!     transport,
//!     scheduler,
//! );
//! manager.add_message_listener(Listener::infallible(|message| println!("{message:?}")));
//!
//! while let Some((id, event)) = events.recv().await {
//!     manager.handle_event(id, event);
//! }
//! ```

pub mod address;
pub mod config;
pub mod connection;
pub mod error;
pub mod listeners;
pub mod reconnect;
#[cfg(feature = "ws")]
pub mod runtime;
pub mod traits;

pub use address::{BaseUrl, Platform, ResolveAddress};
pub use config::{Config, ReconnectConfig};
pub use connection::{ConnectionManager, ConnectionState};
#[expect(
    clippy::module_name_repetitions,
    reason = "WsError includes module name for clarity when used outside this module"
)]
pub use error::WsError;
pub use listeners::{Listener, ListenerError, ListenerRegistry, ListenerResult};
pub use reconnect::{ReconnectPolicy, ScheduledAttempt};
pub use traits::*;
