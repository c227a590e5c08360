//! Tokio-backed implementations of the connection seams, and the task that drives a
//! [`ConnectionManager`] with them.
//!
//! One task owns the manager. Commands from the public client, events from transport
//! handles and timer firings all arrive on channels and are handled one at a time, so
//! the manager never sees two reactions overlap.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt as _, StreamExt as _};
use serde::de::DeserializeOwned;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest as _;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use super::address::ResolveAddress;
use super::config::Config;
use super::connection::{ConnectionManager, ConnectionState};
use super::error::WsError;
use super::listeners::ListenerRegistry;
use super::traits::{
    ConnectionId, MessageParser, ReadyState, Scheduler, TimerId, Transport, TransportEvent,
    TransportHandle,
};
use crate::Result;

/// Close code reported when the peer's close frame carried no status
const NO_STATUS_RECEIVED: u16 = 1005;
/// Close code reported when the connection dropped without a close frame
const ABNORMAL_CLOSURE: u16 = 1006;

type EventSender = mpsc::UnboundedSender<(ConnectionId, TransportEvent)>;

/// Opens WebSocket connections with `tokio-tungstenite`, one background task per handle.
#[derive(Debug)]
pub struct TungsteniteTransport {
    events: EventSender,
    runtime: Handle,
    latest: watch::Sender<Option<watch::Receiver<ReadyState>>>,
}

impl TungsteniteTransport {
    /// Events of every handle this transport opens are delivered to `events`.
    ///
    /// Fails when called outside of a tokio runtime.
    pub fn new(events: EventSender) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| {
            tracing::debug!(error = %e, "no tokio runtime for WebSocket transport");
            WsError::NoRuntime
        })?;

        Ok(Self {
            events,
            runtime,
            latest: watch::channel(None).0,
        })
    }

    /// Follow the ready state of whichever handle this transport opened last.
    #[must_use]
    pub fn ready_state_watch(&self) -> ReadyStateWatch {
        ReadyStateWatch(self.latest.subscribe())
    }
}

/// Live ready state of the most recently opened handle, readable from any task.
///
/// Reports [`ReadyState::Closed`] until the first handle is opened.
#[derive(Debug, Clone)]
pub struct ReadyStateWatch(watch::Receiver<Option<watch::Receiver<ReadyState>>>);

impl ReadyStateWatch {
    #[must_use]
    pub fn current(&self) -> ReadyState {
        self.0
            .borrow()
            .as_ref()
            .map_or(ReadyState::Closed, |state| *state.borrow())
    }
}

/// Turn `address` into a handshake request, rejecting anything that is not a `ws` or `wss` URL.
fn client_request(address: &str) -> Result<Request> {
    let invalid = |reason: String| WsError::InvalidAddress {
        address: address.to_owned(),
        reason,
    };

    let request = address
        .into_client_request()
        .map_err(|e| invalid(e.to_string()))?;

    match request.uri().scheme_str() {
        Some("ws" | "wss") => Ok(request),
        Some(scheme) => Err(invalid(format!("unsupported scheme `{scheme}`")).into()),
        None => Err(invalid("missing scheme".to_owned()).into()),
    }
}

impl Transport for TungsteniteTransport {
    type Handle = TungsteniteHandle;

    fn open(&mut self, id: ConnectionId, address: &str) -> Result<TungsteniteHandle> {
        let request = client_request(address)?;

        let (state_tx, state_rx) = watch::channel(ReadyState::Connecting);
        let (close_tx, close_rx) = oneshot::channel();
        self.latest.send_replace(Some(state_rx.clone()));

        let task = self.runtime.spawn(run_connection(
            id,
            request,
            self.events.clone(),
            state_tx,
            close_rx,
        ));

        Ok(TungsteniteHandle {
            state: state_rx,
            close: Some(close_tx),
            task,
        })
    }
}

/// A connection opened by [`TungsteniteTransport`].
///
/// Dropping the handle closes the connection the same way [`TransportHandle::close`] does.
#[derive(Debug)]
pub struct TungsteniteHandle {
    state: watch::Receiver<ReadyState>,
    close: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl TransportHandle for TungsteniteHandle {
    fn ready_state(&self) -> ReadyState {
        if self.close.is_none() && !self.task.is_finished() {
            return ReadyState::Closing;
        }
        *self.state.borrow()
    }

    fn close(&mut self) {
        if let Some(close) = self.close.take() {
            _ = close.send(());
        }
    }
}

fn emit(events: &EventSender, id: ConnectionId, event: TransportEvent) {
    // The driver only stops listening once it has shut down
    _ = events.send((id, event));
}

async fn run_connection(
    id: ConnectionId,
    request: Request,
    events: EventSender,
    state: watch::Sender<ReadyState>,
    mut close: oneshot::Receiver<()>,
) {
    let connected = tokio::select! {
        biased;

        _ = &mut close => {
            tracing::debug!(connection = %id, "connection abandoned before handshake completed");
            _ = state.send(ReadyState::Closed);
            return;
        }
        result = connect_async(request) => result,
    };

    let ws_stream = match connected {
        Ok((ws_stream, _)) => ws_stream,
        Err(e) => {
            _ = state.send(ReadyState::Closed);
            emit(&events, id, TransportEvent::Errored(e.to_string()));
            emit(
                &events,
                id,
                TransportEvent::Closed {
                    code: ABNORMAL_CLOSURE,
                    reason: String::new(),
                },
            );
            return;
        }
    };

    _ = state.send(ReadyState::Open);
    emit(&events, id, TransportEvent::Opened);

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            biased;

            _ = &mut close => {
                _ = state.send(ReadyState::Closing);
                let frame = CloseFrame {
                    code: CloseCode::Normal,
                    reason: "client disconnect".into(),
                };
                if let Err(e) = write.send(Message::Close(Some(frame))).await {
                    tracing::debug!(connection = %id, error = %e, "failed to send close frame");
                }
                _ = state.send(ReadyState::Closed);
                return;
            }

            message = read.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    emit(&events, id, TransportEvent::MessageReceived(text.as_str().to_owned()));
                }
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = frame.map_or_else(
                        || (NO_STATUS_RECEIVED, String::new()),
                        |frame| (u16::from(frame.code), frame.reason.as_str().to_owned()),
                    );
                    _ = state.send(ReadyState::Closed);
                    emit(&events, id, TransportEvent::Closed { code, reason });
                    return;
                }
                Some(Ok(_)) => {
                    // Binary frames and control frames carry nothing for us
                }
                Some(Err(e)) => {
                    _ = state.send(ReadyState::Closed);
                    emit(&events, id, TransportEvent::Errored(e.to_string()));
                    emit(
                        &events,
                        id,
                        TransportEvent::Closed {
                            code: ABNORMAL_CLOSURE,
                            reason: String::new(),
                        },
                    );
                    return;
                }
                None => {
                    _ = state.send(ReadyState::Closed);
                    emit(
                        &events,
                        id,
                        TransportEvent::Closed {
                            code: ABNORMAL_CLOSURE,
                            reason: String::new(),
                        },
                    );
                    return;
                }
            }
        }
    }
}

/// Runs each timer as a sleeping tokio task; cancelling aborts the task.
#[derive(Debug)]
pub struct TokioScheduler {
    fired: mpsc::UnboundedSender<TimerId>,
    timers: HashMap<TimerId, JoinHandle<()>>,
    runtime: Handle,
}

impl TokioScheduler {
    /// Firings are delivered to `fired`.
    ///
    /// Fails when called outside of a tokio runtime.
    pub fn new(fired: mpsc::UnboundedSender<TimerId>) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|e| {
            tracing::debug!(error = %e, "no tokio runtime for reconnect timers");
            WsError::NoRuntime
        })?;

        Ok(Self {
            fired,
            timers: HashMap::new(),
            runtime,
        })
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.timers
            .values()
            .filter(|task| !task.is_finished())
            .count()
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&mut self, id: TimerId, delay: Duration) {
        self.timers.retain(|_, task| !task.is_finished());

        let fired = self.fired.clone();
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            _ = fired.send(id);
        });

        if let Some(previous) = self.timers.insert(id, task) {
            previous.abort();
        }
    }

    fn cancel(&mut self, id: TimerId) {
        if let Some(task) = self.timers.remove(&id) {
            task.abort();
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for (_, task) in self.timers.drain() {
            task.abort();
        }
    }
}

pub(crate) type TokioConnectionManager<M, P> =
    ConnectionManager<M, P, TungsteniteTransport, TokioScheduler>;

/// Requests the owning task serves on behalf of the public client.
#[derive(Debug)]
pub(crate) enum Command {
    Connect,
    /// Acknowledged once the manager has been torn down
    Disconnect(oneshot::Sender<()>),
}

/// What a caller keeps after [`start`] hands the manager to its task.
#[derive(Debug)]
pub(crate) struct Running<M> {
    pub commands: mpsc::UnboundedSender<Command>,
    pub state: watch::Receiver<ConnectionState>,
    pub ready: ReadyStateWatch,
    pub listeners: Arc<ListenerRegistry<M>>,
    pub address: String,
}

/// Build a connection manager for `endpoint` and spawn the task that owns it.
///
/// The task stops, after disconnecting, once every command sender is dropped.
pub(crate) fn start<M, P, R>(
    endpoint: &str,
    resolver: &R,
    config: &Config,
    parser: P,
) -> Result<Running<M>>
where
    M: DeserializeOwned + Debug + Send + 'static,
    P: MessageParser<M>,
    R: ResolveAddress + ?Sized,
{
    let runtime = Handle::try_current().map_err(|e| {
        tracing::debug!(error = %e, "no tokio runtime for WebSocket client");
        WsError::NoRuntime
    })?;

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (timers_tx, timers_rx) = mpsc::unbounded_channel();
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();

    let transport = TungsteniteTransport::new(events_tx)?;
    let scheduler = TokioScheduler::new(timers_tx)?;
    let ready = transport.ready_state_watch();
    let manager = ConnectionManager::new(endpoint, resolver, config, parser, transport, scheduler);

    let (state_tx, state_rx) = watch::channel(manager.state());
    let listeners = Arc::clone(manager.listeners());
    let address = manager.address().to_owned();

    let driver = Driver {
        manager,
        commands: commands_rx,
        events: events_rx,
        timers: timers_rx,
        state: state_tx,
    };
    runtime.spawn(driver.run());

    Ok(Running {
        commands: commands_tx,
        state: state_rx,
        ready,
        listeners,
        address,
    })
}

struct Driver<M, P>
where
    M: DeserializeOwned + Debug,
    P: MessageParser<M>,
{
    manager: TokioConnectionManager<M, P>,
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedReceiver<(ConnectionId, TransportEvent)>,
    timers: mpsc::UnboundedReceiver<TimerId>,
    state: watch::Sender<ConnectionState>,
}

impl<M, P> Driver<M, P>
where
    M: DeserializeOwned + Debug,
    P: MessageParser<M>,
{
    async fn run(mut self) {
        loop {
            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(Command::Connect) => self.manager.connect(),
                    Some(Command::Disconnect(done)) => {
                        self.manager.disconnect();
                        self.publish();
                        _ = done.send(());
                        continue;
                    }
                    None => {
                        tracing::debug!(address = %self.manager.address(), "client dropped, shutting down");
                        self.manager.disconnect();
                        self.publish();
                        break;
                    }
                },
                Some((id, event)) = self.events.recv() => self.manager.handle_event(id, event),
                Some(timer) = self.timers.recv() => self.manager.fire_timer(timer),
            }

            self.publish();
        }
    }

    fn publish(&self) {
        let current = self.manager.state();
        self.state.send_if_modified(|published| {
            if *published == current {
                false
            } else {
                *published = current;
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use tracing::Level;

    use super::*;
    use crate::notifications::{NotificationMessage, NotificationParser};
    use crate::test_support::with_logs;

    #[test]
    fn transport_requires_a_runtime() {
        let (events, _rx) = mpsc::unbounded_channel();

        let err = TungsteniteTransport::new(events).expect_err("no runtime is running");

        assert_eq!(err.kind(), crate::error::Kind::WebSocket);
    }

    #[tokio::test(start_paused = true)]
    async fn scheduler_fires_after_delay() {
        let (fired_tx, mut fired_rx) = mpsc::unbounded_channel();
        let mut scheduler = TokioScheduler::new(fired_tx).expect("inside a runtime");

        scheduler.schedule(TimerId::new(1), Duration::from_secs(2));
        assert_eq!(scheduler.pending(), 1);

        let fired = fired_rx.recv().await;

        assert_eq!(fired, Some(TimerId::new(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_timer_never_fires() {
        let (fired_tx, mut fired_rx) = mpsc::unbounded_channel();
        let mut scheduler = TokioScheduler::new(fired_tx).expect("inside a runtime");

        scheduler.schedule(TimerId::new(1), Duration::from_secs(2));
        scheduler.schedule(TimerId::new(2), Duration::from_secs(4));
        scheduler.cancel(TimerId::new(1));

        let fired = fired_rx.recv().await;

        assert_eq!(fired, Some(TimerId::new(2)));
        assert!(fired_rx.try_recv().is_err(), "cancelled timer fired");
    }

    #[tokio::test]
    async fn unreachable_address_reports_abnormal_close() {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let mut transport = TungsteniteTransport::new(events_tx).expect("inside a runtime");

        // Nothing listens on port 1, so the handshake fails after the handle exists
        let handle = transport
            .open(ConnectionId::new(7), "ws://127.0.0.1:1/notifications")
            .expect("well-formed address");

        let (id, first) = events_rx.recv().await.expect("errored event");
        assert_eq!(id, ConnectionId::new(7));
        assert!(matches!(first, TransportEvent::Errored(_)), "got {first:?}");

        let (_, second) = events_rx.recv().await.expect("closed event");
        assert_eq!(
            second,
            TransportEvent::Closed {
                code: ABNORMAL_CLOSURE,
                reason: String::new(),
            }
        );
        assert_eq!(handle.ready_state(), ReadyState::Closed);
    }

    #[tokio::test]
    async fn malformed_address_is_rejected_before_connecting() {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let mut transport = TungsteniteTransport::new(events_tx).expect("inside a runtime");

        for address in ["not a websocket url", "http://127.0.0.1:9001/notifications"] {
            let err = transport
                .open(ConnectionId::new(1), address)
                .expect_err("address should be rejected");

            assert_eq!(err.kind(), crate::error::Kind::WebSocket);
            assert!(
                matches!(
                    err.downcast_ref::<WsError>(),
                    Some(WsError::InvalidAddress { address: rejected, .. }) if rejected == address
                ),
                "unexpected error for {address}: {err}"
            );
        }

        assert!(events_rx.try_recv().is_err(), "no connection should be attempted");
        assert_eq!(transport.ready_state_watch().current(), ReadyState::Closed);
    }

    #[tokio::test]
    async fn malformed_address_schedules_a_retry() {
        let (events_tx, _events_rx) = mpsc::unbounded_channel();
        let (fired_tx, _fired_rx) = mpsc::unbounded_channel();
        let transport = TungsteniteTransport::new(events_tx).expect("inside a runtime");
        let scheduler = TokioScheduler::new(fired_tx).expect("inside a runtime");
        let resolver = |_: &str| "not a websocket url".to_owned();

        let (manager, logs): (TokioConnectionManager<NotificationMessage, NotificationParser>, _) =
            with_logs(|| {
                ConnectionManager::new(
                    "/notifications",
                    &resolver,
                    &Config::default(),
                    NotificationParser,
                    transport,
                    scheduler,
                )
            });

        assert_eq!(
            logs.count(Level::ERROR, "failed to create WebSocket connection"),
            1
        );
        assert_eq!(logs.count(Level::ERROR, "WebSocket error"), 0);
        assert_eq!(
            manager.state(),
            ConnectionState::ReconnectScheduled {
                attempt: 1,
                delay: Duration::from_secs(2),
            }
        );
        assert!(manager.pending_timer().is_some(), "retry should be armed");
        assert_eq!(manager.current_connection(), None);
        assert!(!manager.is_connected());
    }

    #[tokio::test]
    async fn ready_state_follows_socket_before_close_is_handled() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let address = format!("ws://{}", listener.local_addr().expect("local address"));

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let mut ws = tokio_tungstenite::accept_async(stream)
                .await
                .expect("handshake");
            ws.close(None).await.expect("close");
        });

        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let mut transport = TungsteniteTransport::new(events_tx).expect("inside a runtime");
        let ready = transport.ready_state_watch();
        assert_eq!(ready.current(), ReadyState::Closed);

        let _handle = transport
            .open(ConnectionId::new(1), &address)
            .expect("well-formed address");

        let (_, opened) = events_rx.recv().await.expect("opened event");
        assert_eq!(opened, TransportEvent::Opened);
        assert_eq!(ready.current(), ReadyState::Open);

        // The close event is read here but never handed to a manager
        let (_, closed) = events_rx.recv().await.expect("closed event");
        assert!(matches!(closed, TransportEvent::Closed { .. }), "got {closed:?}");
        assert_eq!(ready.current(), ReadyState::Closed);

        server.await.expect("server task");
    }
}
