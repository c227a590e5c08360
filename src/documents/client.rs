use reqwest::{
    Client as ReqwestClient, Method,
    header::{HeaderMap, HeaderValue},
};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::types::{Document, NewDocument};
use crate::Result;
use crate::ws::address::Platform;

/// Client for the document service REST API.
///
/// Two flavours of every call are offered. The `try_` methods return a [`Result`] and
/// leave error handling to the caller. The plain methods are meant for UI code: they
/// take a [`CancellationToken`], log any failure and fall back to an empty result.
///
/// # Example
///
/// ```no_run
/// use docstream::documents::{Client, NewDocument};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Client::new("http://localhost:8080")?;
///
/// let documents = client.try_documents().await?;
///
/// let cancel = CancellationToken::new();
/// let draft = NewDocument::new("Quarterly report", "1.0")?;
/// if let Some(updated) = client.add_document(&draft, &cancel).await {
///     println!("{} documents", updated.len());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Client {
    host: Url,
    client: ReqwestClient,
}

impl Default for Client {
    fn default() -> Self {
        Client::for_platform(Platform::current())
            .expect("Client with default endpoint should succeed")
    }
}

impl Client {
    /// Creates a new client for the service at `host`.
    ///
    /// # Errors
    ///
    /// Returns an error if the host URL is invalid or the HTTP client fails to build.
    pub fn new(host: &str) -> Result<Client> {
        let mut headers = HeaderMap::new();

        headers.insert("User-Agent", HeaderValue::from_static("docstream"));
        headers.insert("Accept", HeaderValue::from_static("application/json"));
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = ReqwestClient::builder().default_headers(headers).build()?;

        Ok(Self {
            host: Url::parse(host)?,
            client,
        })
    }

    /// Creates a client for the development backend as seen from `platform`.
    pub fn for_platform(platform: Platform) -> Result<Client> {
        Self::new(platform.http_base_url())
    }

    /// Returns the host URL for the client.
    #[must_use]
    pub fn host(&self) -> &Url {
        &self.host
    }

    fn documents_url(&self) -> Result<Url> {
        Ok(self.host.join("documents")?)
    }

    /// List all documents.
    pub async fn try_documents(&self) -> Result<Vec<Document>> {
        let request = self
            .client
            .request(Method::GET, self.documents_url()?)
            .build()?;

        crate::request(&self.client, request).await
    }

    /// Create a document. The service answers with the updated document list.
    pub async fn try_add_document(&self, document: &NewDocument) -> Result<Vec<Document>> {
        document.validate()?;

        let request = self
            .client
            .request(Method::POST, self.documents_url()?)
            .json(document)
            .build()?;

        crate::request(&self.client, request).await
    }

    /// List all documents, or an empty list if the request fails or is cancelled.
    pub async fn documents(&self, cancel: &CancellationToken) -> Vec<Document> {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                tracing::info!("request was aborted");
                Vec::new()
            }
            result = self.try_documents() => result.unwrap_or_else(|e| {
                tracing::error!(error = %e, "error fetching documents");
                Vec::new()
            }),
        }
    }

    /// Create a document and return the updated list, or `None` if the request fails or
    /// is cancelled.
    pub async fn add_document(
        &self,
        document: &NewDocument,
        cancel: &CancellationToken,
    ) -> Option<Vec<Document>> {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                tracing::info!("request was aborted");
                None
            }
            result = self.try_add_document(document) => result
                .inspect_err(|e| tracing::error!(error = %e, "error adding document"))
                .ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_hosts() {
        let android = Client::for_platform(Platform::Android).expect("valid host");
        let ios = Client::for_platform(Platform::Ios).expect("valid host");

        assert_eq!(android.host().as_str(), "http://10.0.2.2:8080/");
        assert_eq!(
            ios.documents_url().expect("valid url").as_str(),
            "http://localhost:8080/documents"
        );
    }

    #[test]
    fn invalid_host_is_rejected() {
        Client::new("not a url").expect_err("host must be absolute");
    }
}
