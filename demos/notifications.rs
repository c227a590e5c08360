//! Notification channel example: log every document change pushed by the server.
//!
//! Run against a local backend:
//! ```sh
//! RUST_LOG=info cargo run --example notifications
//! ```
//!
//! Point it at another server, and stop after a number of notifications:
//! ```sh
//! WS_BASE_URL=ws://127.0.0.1:9001 MAX_MESSAGES=3 RUST_LOG=debug cargo run --example notifications
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::Utc;
use docstream::notifications::{Client, NotificationMessage};
use docstream::ws::{BaseUrl, Config, ConnectionState, Listener, Platform};
use tokio::sync::Notify;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::default();
    let client = match std::env::var("WS_BASE_URL") {
        Ok(base) => Client::new("/notifications", &BaseUrl::new(base), &config)?,
        Err(_) => Client::new("/notifications", &Platform::current(), &config)?,
    };
    info!(address = client.address(), "connecting");

    let max_messages: usize = std::env::var("MAX_MESSAGES")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(usize::MAX);
    let received = Arc::new(AtomicUsize::new(0));
    let done = Arc::new(Notify::new());

    let logger = {
        let received = Arc::clone(&received);
        let done = Arc::clone(&done);
        Listener::infallible(move |message: &NotificationMessage| {
            let when = message
                .relative_time(Utc::now())
                .unwrap_or_else(|_| message.timestamp.clone());
            info!(
                user = %message.user_name,
                document = %message.document_title,
                when = %when,
                "document changed"
            );

            if received.fetch_add(1, Ordering::SeqCst) + 1 >= max_messages {
                done.notify_one();
            }
        })
    };
    client.add_message_listener(logger);

    let mut state = client.state_receiver();
    tokio::select! {
        () = done.notified() => info!("received enough notifications"),
        result = state.wait_for(|state| *state == ConnectionState::Failed) => {
            if result.is_ok() {
                warn!("server unreachable, giving up");
            }
        }
    }

    client.disconnect().await?;
    info!(total = received.load(Ordering::SeqCst), "disconnected");

    Ok(())
}
