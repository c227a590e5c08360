//! Core traits for the sans-IO WebSocket infrastructure.
//!
//! The [`ConnectionManager`](super::ConnectionManager) never touches a socket or a clock
//! directly. It talks to three seams instead:
//!
//! - [`MessageParser`]: turns one inbound text frame into a typed message
//! - [`Transport`] / [`TransportHandle`]: opens and closes connections; the driver feeds
//!   the resulting [`TransportEvent`]s back into the manager
//! - [`Scheduler`]: arms and cancels the reconnect timer; the driver reports firings back
//!
//! The tokio implementations live in [`runtime`](super::runtime) (feature `ws`). Tests
//! substitute fakes that emit events synchronously and advance virtual time.

use std::fmt;
use std::time::Duration;

use serde::de::DeserializeOwned;

/// Message parser trait for converting raw text frames to messages.
///
/// # Example
///
/// ```ignore
/// use docstream::error::{Error, Kind};
///
/// pub struct SimpleParser;
///
/// impl MessageParser<MyMessage> for SimpleParser {
///     fn parse(&self, text: &str) -> docstream::Result<MyMessage> {
///         serde_json::from_str(text).map_err(|e| Error::with_source(Kind::Internal, e))
///     }
/// }
/// ```
pub trait MessageParser<M: DeserializeOwned>: Send + Sync + 'static {
    /// Parse one inbound frame.
    ///
    /// Failures are reported to the caller, which logs and drops the frame. They never
    /// reach subscribers and are never treated as transport errors.
    fn parse(&self, text: &str) -> crate::Result<M>;
}

/// Identifies one transport handle for the lifetime of a connection manager.
///
/// Every connection attempt gets a fresh id, which is how events from a superseded
/// handle are recognised and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub(crate) const fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifies one scheduled reconnect timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    pub(crate) const fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

/// Lifecycle of a single transport handle, as the transport itself reports it.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    /// Handshake in progress
    Connecting,
    /// Fully open; frames may arrive
    Open,
    /// Close requested but not yet complete
    Closing,
    /// Closed, either cleanly or by failure
    Closed,
}

/// Something that happened on a transport handle.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The handshake completed
    Opened,
    /// A text frame arrived
    MessageReceived(String),
    /// The transport reported an error; a [`TransportEvent::Closed`] follows
    Errored(String),
    /// The connection ended, by the server or by network failure
    Closed {
        /// WebSocket close code (1005 when the peer sent none, 1006 on abnormal closure)
        code: u16,
        reason: String,
    },
}

/// A live connection owned by the connection manager.
pub trait TransportHandle {
    /// Current state of this handle.
    fn ready_state(&self) -> ReadyState;

    /// Begin closing the connection.
    ///
    /// Implementations must not report a [`TransportEvent::Closed`] for a close the
    /// manager asked for; the manager has already forgotten the handle by then.
    fn close(&mut self);
}

/// Opens transport handles.
pub trait Transport {
    type Handle: TransportHandle;

    /// Start connecting to `address`.
    ///
    /// Completion is observed only through events tagged with `id`. An `Err` means no
    /// handle could be created at all.
    fn open(&mut self, id: ConnectionId, address: &str) -> crate::Result<Self::Handle>;
}

/// Arms and cancels one-shot timers.
///
/// Firing is reported back to the manager through
/// [`ConnectionManager::fire_timer`](super::ConnectionManager::fire_timer).
pub trait Scheduler {
    fn schedule(&mut self, id: TimerId, delay: Duration);

    /// Cancel a timer. Cancelling an unknown or already fired timer is a no-op.
    fn cancel(&mut self, id: TimerId);
}
