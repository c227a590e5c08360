#![expect(
    clippy::module_name_repetitions,
    reason = "Re-exported names intentionally match their modules for API clarity"
)]

//! Real-time document change notifications.
//!
//! The server pushes one JSON object per text frame whenever a user changes a document.
//! [`decode`] turns a frame into a [`NotificationMessage`]; with the `ws` feature,
//! [`Client`] keeps a connection open, reconnects with exponential backoff and hands each
//! notification to every registered listener.
//!
//! # Example
//!
//! ```rust, no_run
//! use docstream::notifications::Client;
//! use docstream::ws::{Config, Listener, Platform};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = Client::new("/notifications", &Platform::current(), &Config::default())?;
//!
//!     let logger = Listener::infallible(|message: &docstream::notifications::NotificationMessage| {
//!         println!("{} changed {}", message.user_name, message.document_title);
//!     });
//!     client.add_message_listener(logger.clone());
//!
//!     // ...
//!
//!     client.remove_message_listener(&logger);
//!     client.disconnect().await?;
//!
//!     Ok(())
//! }
//! ```

#[cfg(feature = "ws")]
pub mod client;
pub mod parser;
pub mod types;

#[cfg(feature = "ws")]
pub use client::Client;
pub use parser::{NotificationParser, decode};
pub use types::NotificationMessage;
