//! Follower → leader status reports.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::{MessageKind, WireMessage};

/// A status or completion report sent by a follower.
///
/// Followers are not under the leader's control, so decoding is lenient:
/// `Data` may be missing or `null`, and a `Timestamp` that is absent or not
/// a recognizable date is dropped rather than rejecting the whole message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct FollowerMessage {
    /// [`MessageKind::Status`] or [`MessageKind::CommandComplete`].
    #[serde(rename = "Type")]
    pub kind: MessageKind,
    /// Free-form text supplied by the follower.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub data: String,
    /// When the follower produced the report, if it said.
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<DateTime<Utc>>,
}

impl FollowerMessage {
    /// A `STATUS` report stamped with the current time.
    #[must_use]
    pub fn status(data: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Status,
            data: data.into(),
            timestamp: Some(Utc::now()),
        }
    }

    /// A `COMMAND_COMPLETE` report stamped with the current time.
    #[must_use]
    pub fn command_complete(data: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::CommandComplete,
            data: data.into(),
            timestamp: Some(Utc::now()),
        }
    }
}

impl WireMessage for FollowerMessage {
    fn kind(&self) -> MessageKind {
        self.kind
    }

    fn accepts(kind: MessageKind) -> bool {
        matches!(kind, MessageKind::Status | MessageKind::CommandComplete)
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_timestamp<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<serde_json::Value>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let Some(text) = raw.as_str() else {
        return Ok(None);
    };

    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Ok(Some(parsed.with_timezone(&Utc)));
    }

    // Offset-less local timestamps are taken as UTC.
    Ok(NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc()))
}
