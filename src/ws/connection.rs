#![expect(
    clippy::module_name_repetitions,
    reason = "Connection types expose their domain in the name for clarity"
)]

use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;

use super::address::ResolveAddress;
use super::config::Config;
use super::listeners::{Listener, ListenerRegistry};
use super::reconnect::ReconnectPolicy;
use super::traits::{
    ConnectionId, MessageParser, ReadyState, Scheduler, TimerId, Transport, TransportEvent,
    TransportHandle,
};

/// Connection state tracking.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Never connected
    Idle,
    /// Waiting for a transport handle to open
    Connecting,
    /// Successfully connected
    Open {
        /// When the connection was established
        since: Instant,
    },
    /// Not connected and not retrying, after a close or an explicit disconnect
    Closed,
    /// Waiting for the backoff delay before reconnecting
    ReconnectScheduled {
        /// Current reconnection attempt number
        attempt: u32,
        /// Delay before the attempt starts
        delay: Duration,
    },
    /// Reconnection attempts are exhausted; only an explicit `connect` leaves this state
    Failed,
}

impl ConnectionState {
    /// Check if the connection is currently active.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Open { .. })
    }
}

struct ActiveHandle<H> {
    id: ConnectionId,
    handle: H,
}

/// Owns the one logical connection to an endpoint.
///
/// The manager is a sans-IO state machine. It opens handles through a [`Transport`],
/// arms reconnect timers through a [`Scheduler`], and reacts to whatever its driver feeds
/// it through [`handle_event`](Self::handle_event) and [`fire_timer`](Self::fire_timer):
///
/// - inbound frames are decoded with the [`MessageParser`] and fanned out to the
///   [`ListenerRegistry`]; frames that fail to decode are logged and dropped
/// - an unexpected close schedules a reconnect with exponential backoff until
///   `max_attempts` is reached, after which the manager stays [`ConnectionState::Failed`]
/// - events tagged with a superseded [`ConnectionId`] and firings of cancelled timers
///   are ignored
///
/// [`disconnect`](Self::disconnect) closes the handle, cancels the pending timer and
/// removes every listener.
///
/// # Type Parameters
///
/// - `M`: Message type produced by the parser
/// - `P`: Parser type that implements [`MessageParser<M>`]
/// - `T`: Transport that opens handles
/// - `S`: Scheduler for reconnect timers
pub struct ConnectionManager<M, P, T, S>
where
    M: DeserializeOwned + Debug,
    P: MessageParser<M>,
    T: Transport,
    S: Scheduler,
{
    address: String,
    parser: P,
    transport: T,
    scheduler: S,
    listeners: Arc<ListenerRegistry<M>>,
    reconnect: ReconnectPolicy,
    handle: Option<ActiveHandle<T::Handle>>,
    pending_timer: Option<TimerId>,
    next_connection_id: u64,
    next_timer_id: u64,
    state: ConnectionState,
    _message: PhantomData<fn() -> M>,
}

impl<M, P, T, S> ConnectionManager<M, P, T, S>
where
    M: DeserializeOwned + Debug,
    P: MessageParser<M>,
    T: Transport,
    S: Scheduler,
{
    /// Create a manager for `endpoint` and immediately start connecting.
    pub fn new<R>(
        endpoint: &str,
        resolver: &R,
        config: &Config,
        parser: P,
        transport: T,
        scheduler: S,
    ) -> Self
    where
        R: ResolveAddress + ?Sized,
    {
        let mut manager = Self {
            address: resolver.resolve(endpoint),
            parser,
            transport,
            scheduler,
            listeners: Arc::new(ListenerRegistry::new()),
            reconnect: ReconnectPolicy::new(config.reconnect.clone()),
            handle: None,
            pending_timer: None,
            next_connection_id: 0,
            next_timer_id: 0,
            state: ConnectionState::Idle,
            _message: PhantomData,
        };
        manager.open();
        manager
    }

    /// Connect again after a [`disconnect`](Self::disconnect) or after reconnection gave up.
    ///
    /// Resets the attempt counter, cancels any pending reconnect and discards the current
    /// handle, if any, before opening a new one. Listeners removed by `disconnect` are not
    /// restored.
    pub fn connect(&mut self) {
        self.reconnect.reset();
        self.cancel_pending_timer();
        self.open();
    }

    /// Tear everything down. Safe to call in any state, any number of times.
    pub fn disconnect(&mut self) {
        if let Some(mut active) = self.handle.take() {
            tracing::debug!(connection = %active.id, "closing WebSocket connection");
            active.handle.close();
        }

        self.cancel_pending_timer();
        self.listeners.clear();

        if self.state != ConnectionState::Closed {
            tracing::info!(address = %self.address, "WebSocket disconnected");
        }
        self.state = ConnectionState::Closed;
    }

    /// True iff a handle exists and the transport reports it fully open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|active| active.handle.ready_state() == ReadyState::Open)
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Consecutive reconnection attempts since the last successful open.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.reconnect.attempts()
    }

    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    #[must_use]
    pub fn current_connection(&self) -> Option<ConnectionId> {
        self.handle.as_ref().map(|active| active.id)
    }

    #[must_use]
    pub fn pending_timer(&self) -> Option<TimerId> {
        self.pending_timer
    }

    /// Shared handle to the subscriber set, for callers that register from elsewhere.
    #[must_use]
    pub fn listeners(&self) -> &Arc<ListenerRegistry<M>> {
        &self.listeners
    }

    pub fn add_message_listener(&self, listener: Listener<M>) {
        self.listeners.add(listener);
    }

    pub fn remove_message_listener(&self, listener: &Listener<M>) {
        self.listeners.remove(listener);
    }

    /// React to an event from the transport handle identified by `id`.
    pub fn handle_event(&mut self, id: ConnectionId, event: TransportEvent) {
        if self.current_connection() != Some(id) {
            tracing::trace!(connection = %id, ?event, "ignoring event from stale connection");
            return;
        }

        match event {
            TransportEvent::Opened => {
                tracing::info!(connection = %id, "WebSocket connection established");
                self.reconnect.reset();
                self.state = ConnectionState::Open {
                    since: Instant::now(),
                };
            }
            TransportEvent::MessageReceived(text) => {
                tracing::trace!(connection = %id, %text, "received WebSocket text message");

                match self.parser.parse(&text) {
                    Ok(message) => {
                        tracing::trace!(?message, "parsed WebSocket message");
                        self.listeners.dispatch(&message);
                    }
                    Err(e) => {
                        tracing::error!(
                            connection = %id,
                            %text,
                            error = %e,
                            "failed to parse WebSocket message"
                        );
                    }
                }
            }
            TransportEvent::Errored(error) => {
                // The close event that follows drives reconnection
                tracing::error!(connection = %id, %error, "WebSocket error");
            }
            TransportEvent::Closed { code, reason } => {
                tracing::info!(connection = %id, code, %reason, "WebSocket connection closed");
                self.handle = None;
                self.state = ConnectionState::Closed;
                self.schedule_reconnect();
            }
        }
    }

    /// React to the scheduler firing `timer`.
    pub fn fire_timer(&mut self, timer: TimerId) {
        if self.pending_timer != Some(timer) {
            tracing::trace!(timer = timer.value(), "ignoring stale reconnect timer");
            return;
        }

        self.pending_timer = None;
        self.open();
    }

    fn open(&mut self) {
        if let Some(mut previous) = self.handle.take() {
            tracing::debug!(connection = %previous.id, "discarding superseded WebSocket connection");
            previous.handle.close();
        }

        self.next_connection_id = self.next_connection_id.wrapping_add(1);
        let id = ConnectionId::new(self.next_connection_id);
        self.state = ConnectionState::Connecting;

        tracing::debug!(connection = %id, address = %self.address, "opening WebSocket connection");

        match self.transport.open(id, &self.address) {
            Ok(handle) => {
                self.handle = Some(ActiveHandle { id, handle });
            }
            Err(e) => {
                tracing::error!(
                    address = %self.address,
                    error = %e,
                    "failed to create WebSocket connection"
                );
                self.state = ConnectionState::Closed;
                self.schedule_reconnect();
            }
        }
    }

    fn schedule_reconnect(&mut self) {
        let Some(scheduled) = self.reconnect.next_attempt() else {
            tracing::error!(
                attempts = self.reconnect.attempts(),
                "maximum reconnection attempts reached"
            );
            self.state = ConnectionState::Failed;
            return;
        };

        // Only one timer may be pending at a time
        self.cancel_pending_timer();

        self.next_timer_id = self.next_timer_id.wrapping_add(1);
        let timer = TimerId::new(self.next_timer_id);
        self.scheduler.schedule(timer, scheduled.delay);
        self.pending_timer = Some(timer);
        self.state = ConnectionState::ReconnectScheduled {
            attempt: scheduled.attempt,
            delay: scheduled.delay,
        };

        tracing::info!(
            attempt = scheduled.attempt,
            delay_ms = u64::try_from(scheduled.delay.as_millis()).unwrap_or(u64::MAX),
            "attempting to reconnect"
        );
    }

    fn cancel_pending_timer(&mut self) {
        if let Some(timer) = self.pending_timer.take() {
            self.scheduler.cancel(timer);
        }
    }
}
