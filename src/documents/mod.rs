//! Document service REST client and types.
//!
//! **Feature flag:** `documents` (required to use this module)
//!
//! ## Available Endpoints
//!
//! | Endpoint | Method | Description |
//! |----------|--------|-------------|
//! | `/documents` | GET | List all documents |
//! | `/documents` | POST | Create a document, returns the updated list |
//!
//! # Example
//!
//! ```no_run
//! use docstream::documents::{Client, SortOrder, sort_documents};
//! use docstream::ws::Platform;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::for_platform(Platform::current())?;
//!
//! let mut documents = client.try_documents().await?;
//! sort_documents(&mut documents, SortOrder::CreatedAtDesc);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod types;

pub use client::Client;
pub use types::{Contributor, Document, NewDocument, SortOrder, sort_documents};
