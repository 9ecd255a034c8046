use std::convert::TryFrom;
use std::fmt::{self, Display};

use chrono::{DateTime, Utc};
use mongodb::bson::Bson;
use serde::{Deserialize, Serialize};

use crate::client::ClientId;
use crate::sending::SendingId;

pub mod db;

/// Store-assigned, monotonically increasing message identifier.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl From<MessageId> for Bson {
    fn from(id: MessageId) -> Bson {
        Bson::Int64(id.0)
    }
}

/// The delivery record of one sending for one client. There is at most one
/// per (sending, client) pair.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Message {
    #[serde(rename = "_id")]
    pub id: MessageId,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    pub status: MessageStatus,
    pub sending_id: SendingId,
    pub client_id: ClientId,
}

/// Persisted as an integer; `NEW -> SENT` is the only transition.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum MessageStatus {
    New,
    Sent,
}

impl MessageStatus {
    pub const ALL: [MessageStatus; 2] = [MessageStatus::New, MessageStatus::Sent];

    pub fn as_str(self) -> &'static str {
        match self {
            MessageStatus::New => "NEW",
            MessageStatus::Sent => "SENT",
        }
    }
}

impl Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<MessageStatus> for i32 {
    fn from(status: MessageStatus) -> i32 {
        match status {
            MessageStatus::New => 1,
            MessageStatus::Sent => 2,
        }
    }
}

impl TryFrom<i32> for MessageStatus {
    type Error = InvalidMessageStatus;

    fn try_from(value: i32) -> Result<MessageStatus, InvalidMessageStatus> {
        match value {
            1 => Ok(MessageStatus::New),
            2 => Ok(MessageStatus::Sent),
            _ => Err(InvalidMessageStatus(value)),
        }
    }
}

impl From<MessageStatus> for Bson {
    fn from(status: MessageStatus) -> Bson {
        Bson::Int32(status.into())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct InvalidMessageStatus(pub i32);

impl Display for InvalidMessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown message status: {}", self.0)
    }
}
