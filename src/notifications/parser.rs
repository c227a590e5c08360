use serde_json::Value;

use super::types::NotificationMessage;
use crate::Result;
use crate::serde_helpers::deserialize_with_warnings;
use crate::ws::MessageParser;
use crate::ws::error::WsError;

/// Decode one inbound text frame.
///
/// The frame must be a JSON object with the five string fields of
/// [`NotificationMessage`]. Extra fields are accepted and logged at `warn`; missing or
/// mistyped fields fail with [`WsError::MessageParse`] naming the offending field. This
/// function does not log failures itself.
pub fn decode(raw: &str) -> Result<NotificationMessage> {
    let value: Value = serde_json::from_str(raw).map_err(|source| WsError::MessageParse {
        path: String::new(),
        source,
    })?;

    let message = deserialize_with_warnings(value).map_err(|e| WsError::MessageParse {
        path: e.path,
        source: e.source,
    })?;

    Ok(message)
}

/// [`MessageParser`] for the notification channel, backed by [`decode`].
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default)]
pub struct NotificationParser;

impl MessageParser<NotificationMessage> for NotificationParser {
    fn parse(&self, text: &str) -> Result<NotificationMessage> {
        decode(text)
    }
}
