//! Document service example: list documents newest first, then add one.
//!
//! Run with tracing enabled:
//! ```sh
//! RUST_LOG=info,hyper_util=off,hyper=off,reqwest=off cargo run --example documents --features documents
//! ```

use docstream::documents::{Client, NewDocument, SortOrder, sort_documents};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let client = Client::default();
    let cancel = CancellationToken::new();

    let mut documents = client.documents(&cancel).await;
    sort_documents(&mut documents, SortOrder::CreatedAtDesc);
    info!(order = %SortOrder::CreatedAtDesc, count = documents.len());
    for document in &documents {
        info!(
            id = %document.id,
            title = %document.title,
            version = %document.version,
            contributors = document.contributors.len(),
            attachments = document.attachments.len()
        );
    }

    let draft = NewDocument::new("Release notes", "1.0")?;
    if let Some(updated) = client.add_document(&draft, &cancel).await {
        info!(count = updated.len(), "document added");
    }

    Ok(())
}
