use chrono::{DateTime, Utc};
use futures::{stream, StreamExt, TryStreamExt};

use crate::database::Database;
use crate::error::Error;
use crate::message::{Message, MessageStatus};

use super::{Filter, Sending, SendingId, MAX_TEXT_LENGTH};

/// Message counts of one sending, by status.
#[derive(Clone, Debug, PartialEq)]
pub struct SendingStatistics {
    pub sending: Sending,
    pub new: u64,
    pub sent: u64,
}

fn validate(text: &str, start_at: DateTime<Utc>, stop_at: DateTime<Utc>) -> Result<(), Error> {
    if text.trim().is_empty() {
        return Err(Error::SendingTextRequired);
    }

    let length = text.chars().count();
    if length > MAX_TEXT_LENGTH {
        return Err(Error::SendingTextTooLong {
            length,
            maximum: MAX_TEXT_LENGTH,
        });
    }

    if start_at >= stop_at {
        return Err(Error::SendingWindowInvalid { start_at, stop_at });
    }

    Ok(())
}

#[tracing::instrument(skip(db))]
pub async fn create_sending(
    db: &dyn Database,
    sending_id: Option<SendingId>,
    text: String,
    filter: Filter,
    start_at: DateTime<Utc>,
    stop_at: DateTime<Utc>,
) -> Result<Sending, Error> {
    validate(&text, start_at, stop_at)?;

    let sending = Sending {
        id: sending_id.unwrap_or_else(SendingId::new),
        text,
        filter,
        start_at,
        stop_at,
    };

    db.sendings().insert_sending(&sending).await?;

    Ok(sending)
}

#[tracing::instrument(skip(db))]
pub async fn expect_sending_by_id(
    db: &dyn Database,
    sending_id: SendingId,
) -> Result<Sending, Error> {
    let sending = db
        .sendings()
        .fetch_sending_by_id(sending_id)
        .await?
        .ok_or(Error::SendingDoesNotExist { sending_id })?;

    Ok(sending)
}

#[tracing::instrument(skip(db))]
pub async fn update_sending(
    db: &dyn Database,
    sending_id: SendingId,
    text: String,
    filter: Filter,
    start_at: DateTime<Utc>,
    stop_at: DateTime<Utc>,
) -> Result<Sending, Error> {
    validate(&text, start_at, stop_at)?;

    let sending = Sending {
        id: sending_id,
        text,
        filter,
        start_at,
        stop_at,
    };

    db.sendings().update_sending(sending).await
}

/// Deletes the sending along with all of its message records.
#[tracing::instrument(skip(db))]
pub async fn delete_sending(db: &dyn Database, sending_id: SendingId) -> Result<(), Error> {
    db.sendings().delete_sending(sending_id).await?;

    let deleted = db.messages().delete_messages_by_sending(sending_id).await?;
    tracing::debug!(deleted, "removed messages of deleted sending");

    Ok(())
}

#[tracing::instrument(skip(db))]
pub async fn get_sending_statistics(db: &dyn Database) -> Result<Vec<SendingStatistics>, Error> {
    let sendings = db.sendings().fetch_sendings().await?;

    stream::iter(sendings)
        .then(|sending| async move {
            let messages = db.messages();
            let new = messages
                .count_messages_by_sending_and_status(sending.id, MessageStatus::New)
                .await?;
            let sent = messages
                .count_messages_by_sending_and_status(sending.id, MessageStatus::Sent)
                .await?;

            Ok::<_, Error>(SendingStatistics { sending, new, sent })
        })
        .try_collect()
        .await
}

#[tracing::instrument(skip(db))]
pub async fn get_sending_messages(
    db: &dyn Database,
    sending: &Sending,
) -> Result<Vec<Message>, Error> {
    let messages = db.messages().fetch_messages_by_sending(sending.id).await?;

    Ok(messages)
}
