use std::sync::Arc;

use tokio::sync::{oneshot, watch};

use super::parser::NotificationParser;
use super::types::NotificationMessage;
use crate::Result;
use crate::ws::address::{Platform, ResolveAddress};
use crate::ws::config::Config;
use crate::ws::connection::ConnectionState;
use crate::ws::error::WsError;
use crate::ws::listeners::{Listener, ListenerRegistry};
use crate::ws::runtime::{self, Command, ReadyStateWatch};
use crate::ws::traits::ReadyState;

/// Real-time document notification client.
///
/// Construction resolves the endpoint, opens the connection and returns immediately;
/// whether the connection is up is observed through [`is_connected`](Self::is_connected),
/// [`state_receiver`](Self::state_receiver) or simply through listeners being called.
/// Listeners can be registered at any time, including before the connection opens.
///
/// The client is cheap to clone. All clones share one connection, which is torn down
/// when the last clone is dropped.
///
/// # Examples
///
/// ```rust, no_run
/// use std::time::Duration;
///
/// use docstream::notifications::{Client, NotificationMessage};
/// use docstream::ws::{Config, Listener, Platform};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let client = Client::new("/notifications", &Platform::current(), &Config::default())?;
///
///     client.add_message_listener(Listener::infallible(|message: &NotificationMessage| {
///         println!("{} edited {}", message.user_name, message.document_title);
///     }));
///
///     tokio::time::sleep(Duration::from_secs(60)).await;
///     client.disconnect().await?;
///
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    /// Endpoint path the client was created for
    endpoint: String,
    /// Full address the endpoint resolved to
    address: String,
    /// Requests to the task that owns the connection
    commands: tokio::sync::mpsc::UnboundedSender<Command>,
    /// Connection state as of the last event the owning task handled
    state: watch::Receiver<ConnectionState>,
    /// Live ready state of the socket the owning task opened last
    ready: ReadyStateWatch,
    /// Subscribers, shared with the owning task
    listeners: Arc<ListenerRegistry<NotificationMessage>>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("endpoint", &self.inner.endpoint)
            .field("address", &self.inner.address)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a client for `endpoint` and start connecting.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new<R>(endpoint: &str, resolver: &R, config: &Config) -> Result<Self>
    where
        R: ResolveAddress + ?Sized,
    {
        let running = runtime::start(endpoint, resolver, config, NotificationParser)?;

        tracing::debug!(endpoint, address = %running.address, "notification client started");

        Ok(Self {
            inner: Arc::new(ClientInner {
                endpoint: endpoint.to_owned(),
                address: running.address,
                commands: running.commands,
                state: running.state,
                ready: running.ready,
                listeners: running.listeners,
            }),
        })
    }

    /// Create a client that resolves `endpoint` for the platform it was compiled for.
    pub fn for_platform(endpoint: &str, config: &Config) -> Result<Self> {
        Self::new(endpoint, &Platform::current(), config)
    }

    /// Register `listener`; it is called for every notification from now on.
    ///
    /// Registering the same listener twice makes it receive every notification twice.
    pub fn add_message_listener(&self, listener: Listener<NotificationMessage>) {
        self.inner.listeners.add(listener);
    }

    /// Unregister every registration of `listener`. Unknown listeners are ignored.
    pub fn remove_message_listener(&self, listener: &Listener<NotificationMessage>) {
        self.inner.listeners.remove(listener);
    }

    /// Reconnect after [`disconnect`](Self::disconnect) or after reconnection gave up.
    ///
    /// The reconnection attempt counter starts over. Listeners removed by `disconnect`
    /// are not restored.
    pub fn connect(&self) -> Result<()> {
        self.inner
            .commands
            .send(Command::Connect)
            .map_err(|_closed| WsError::ConnectionClosed)?;
        Ok(())
    }

    /// Close the connection, cancel any pending reconnect and remove every listener.
    ///
    /// Returns once the connection has been torn down; no listener is called after that.
    pub async fn disconnect(&self) -> Result<()> {
        self.inner.listeners.clear();

        let (done_tx, done_rx) = oneshot::channel();
        self.inner
            .commands
            .send(Command::Disconnect(done_tx))
            .map_err(|_closed| WsError::ConnectionClosed)?;
        done_rx
            .await
            .map_err(|_closed| WsError::ConnectionClosed)?;

        Ok(())
    }

    /// Whether the connection is open.
    ///
    /// Turns false as soon as the socket closes, even before the owning task has reacted
    /// to the close and published a new [`state`](Self::state).
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state().is_connected() && self.inner.ready.current() == ReadyState::Open
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Subscribe to connection state changes.
    ///
    /// ```rust, no_run
    /// # async fn wait(client: docstream::notifications::Client) -> anyhow::Result<()> {
    /// let mut state = client.state_receiver();
    /// state.wait_for(|state| state.is_connected()).await?;
    /// # Ok(())
    /// # }
    /// ```
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.clone()
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    #[must_use]
    pub fn address(&self) -> &str {
        &self.inner.address
    }

    /// Number of registered listeners, counting duplicates.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Kind;

    #[test]
    fn requires_a_runtime() {
        let err = Client::new(
            "/notifications",
            &Platform::Ios,
            &Config::default(),
        )
        .expect_err("no runtime is running");

        assert_eq!(err.kind(), Kind::WebSocket);
    }

    #[tokio::test]
    async fn resolves_endpoint_for_platform() {
        let client = Client::new("/notifications", &Platform::Android, &Config::default())
            .expect("inside a runtime");

        assert_eq!(client.endpoint(), "/notifications");
        assert_eq!(client.address(), "ws://10.0.2.2:8080/notifications");
        assert!(!client.is_connected(), "nothing listens on the emulator host");

        client.disconnect().await.expect("task is alive");
    }

    #[tokio::test]
    async fn disconnect_clears_listeners() {
        let client = Client::new("/notifications", &Platform::Ios, &Config::default())
            .expect("inside a runtime");
        client.add_message_listener(Listener::infallible(|_: &NotificationMessage| {}));
        assert_eq!(client.listener_count(), 1);

        client.disconnect().await.expect("task is alive");

        assert_eq!(client.listener_count(), 0);
        assert_eq!(client.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn is_connected_turns_false_when_socket_closes() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let base = format!("ws://{}", listener.local_addr().expect("local address"));
        let (close_tx, close_rx) = oneshot::channel::<()>();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let mut ws = tokio_tungstenite::accept_async(stream)
                .await
                .expect("handshake");
            _ = close_rx.await;
            ws.close(None).await.expect("close");
        });

        let client = Client::new(
            "/notifications",
            &crate::ws::BaseUrl::new(base),
            &Config::default(),
        )
        .expect("inside a runtime");

        client
            .state_receiver()
            .wait_for(|state| state.is_connected())
            .await
            .expect("task is alive");
        assert!(client.is_connected());

        close_tx.send(()).expect("server is waiting");
        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while client.inner.ready.current() == ReadyState::Open {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("socket should close");

        assert!(
            !client.is_connected(),
            "a closed socket is never reported as connected"
        );

        server.await.expect("server task");
        client.disconnect().await.expect("task is alive");
    }
}
