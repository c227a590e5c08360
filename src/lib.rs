#![cfg_attr(doc, doc = include_str!("../README.md"))]

#[cfg(feature = "documents")]
pub mod documents;
pub mod error;
pub mod notifications;
pub(crate) mod serde_helpers;
#[cfg(test)]
pub(crate) mod test_support;
pub mod time;
pub mod ws;

#[cfg(feature = "documents")]
use reqwest::Request;
#[cfg(feature = "documents")]
use serde::de::DeserializeOwned;

use crate::error::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(feature = "documents")]
#[tracing::instrument(
    level = "debug",
    skip(client, request),
    fields(
        method = %request.method(),
        path = request.url().path(),
        status_code
    )
)]
async fn request<Response: DeserializeOwned>(
    client: &reqwest::Client,
    request: Request,
) -> Result<Response> {
    let method = request.method().clone();
    let path = request.url().path().to_owned();

    let response = client.execute(request).await?;
    let status_code = response.status();
    tracing::Span::current().record("status_code", status_code.as_u16());

    if !status_code.is_success() {
        let message = response.text().await.unwrap_or_default();

        tracing::warn!(
            status = %status_code,
            method = %method,
            path = %path,
            message = %message,
            "API request failed"
        );

        return Err(Error::status(status_code, method, path, message));
    }

    let json_value = response.json::<serde_json::Value>().await?;
    Ok(serde_helpers::deserialize_with_warnings(json_value)?)
}
