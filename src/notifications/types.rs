use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::error::Error;
use crate::time::format_relative_time;

/// A document change pushed by the notification server.
///
/// Every inbound text frame carries exactly one of these as a JSON object:
///
/// ```json
/// {
///   "Timestamp": "2023-01-01T00:00:00Z",
///   "UserID": "user1",
///   "UserName": "User One",
///   "DocumentID": "doc1",
///   "DocumentTitle": "Document One"
/// }
/// ```
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Builder)]
#[serde(rename_all = "PascalCase")]
#[builder(on(String, into))]
pub struct NotificationMessage {
    /// ISO-8601 time of the change, as sent by the server
    pub timestamp: String,
    /// ID of the user who made the change
    #[serde(rename = "UserID")]
    pub user_id: String,
    /// Display name of the user who made the change
    pub user_name: String,
    /// ID of the changed document
    #[serde(rename = "DocumentID")]
    pub document_id: String,
    /// Title of the changed document
    pub document_title: String,
}

impl NotificationMessage {
    /// Parse [`timestamp`](Self::timestamp) as an RFC 3339 date-time.
    pub fn parsed_timestamp(&self) -> Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .map(|timestamp| timestamp.with_timezone(&Utc))
            .map_err(|e| {
                Error::validation(format!(
                    "notification timestamp `{}` is not RFC 3339: {e}",
                    self.timestamp
                ))
            })
    }

    /// How long ago the change happened, e.g. "5 minutes ago".
    pub fn relative_time(&self, now: DateTime<Utc>) -> Result<String> {
        Ok(format_relative_time(self.parsed_timestamp()?, now))
    }
}
