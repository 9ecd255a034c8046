use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::{self, Document};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use mongodb::{Collection, Database};

use crate::client::ClientId;
use crate::database::is_duplicate_key;
use crate::error::Error;
use crate::sending::SendingId;

use super::{Message, MessageId, MessageStatus};

pub const MESSAGES: &str = "messages";
pub const COUNTERS: &str = "counters";

pub async fn initialize(db: &Database) -> Result<(), Error> {
    db.run_command(
        bson::doc! {
            "createIndexes": MESSAGES,
            "indexes": [
                {
                    "key": { "sending_id": 1, "client_id": 1 },
                    "name": "by_sending_and_client",
                    "unique": true,
                },
                { "key": { "client_id": 1 }, "name": "by_client_id" },
            ]
        },
        None,
    )
    .await?;

    Ok(())
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Creates the record for (sending, client). Fails with
    /// `Error::MessageAlreadyExists` if one is already there.
    async fn insert_message(
        &self,
        sending_id: SendingId,
        client_id: ClientId,
        status: MessageStatus,
    ) -> Result<Message, Error>;

    async fn fetch_message_by_sending_and_client(
        &self,
        sending_id: SendingId,
        client_id: ClientId,
    ) -> Result<Option<Message>, Error>;

    async fn fetch_messages_by_sending(&self, sending_id: SendingId)
        -> Result<Vec<Message>, Error>;

    async fn count_messages_by_sending_and_status(
        &self,
        sending_id: SendingId,
        status: MessageStatus,
    ) -> Result<u64, Error>;

    async fn update_message(&self, message: Message) -> Result<Message, Error>;

    async fn delete_messages_by_sending(&self, sending_id: SendingId) -> Result<u64, Error>;

    async fn delete_messages_by_client(&self, client_id: ClientId) -> Result<u64, Error>;
}

#[derive(Debug, Clone)]
pub struct MongoMessageStore {
    messages: Collection<Message>,
    counters: Collection<Document>,
}

impl MongoMessageStore {
    pub fn new(db: &Database) -> MongoMessageStore {
        MongoMessageStore {
            messages: db.collection(MESSAGES),
            counters: db.collection(COUNTERS),
        }
    }

    async fn next_message_id(&self) -> Result<MessageId, Error> {
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();

        let counter = self
            .counters
            .find_one_and_update(
                bson::doc! { "_id": MESSAGES },
                bson::doc! { "$inc": { "seq": 1_i64 } },
                options,
            )
            .await?
            .ok_or_else(|| Error::ExistentialState("message counter was not upserted".into()))?;

        let seq = counter
            .get_i64("seq")
            .map_err(|err| Error::ExistentialState(format!("message counter: {}", err)))?;

        Ok(MessageId(seq))
    }
}

#[async_trait]
impl MessageStore for MongoMessageStore {
    #[tracing::instrument(skip(self))]
    async fn insert_message(
        &self,
        sending_id: SendingId,
        client_id: ClientId,
        status: MessageStatus,
    ) -> Result<Message, Error> {
        let message = Message {
            id: self.next_message_id().await?,
            created_at: Utc::now(),
            status,
            sending_id,
            client_id,
        };

        self.messages
            .insert_one(&message, None)
            .await
            .map_err(|err| {
                if is_duplicate_key(&err) {
                    Error::MessageAlreadyExists {
                        sending_id,
                        client_id,
                    }
                } else {
                    err.into()
                }
            })?;

        Ok(message)
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_message_by_sending_and_client(
        &self,
        sending_id: SendingId,
        client_id: ClientId,
    ) -> Result<Option<Message>, Error> {
        let message = self
            .messages
            .find_one(
                bson::doc! { "sending_id": sending_id, "client_id": client_id },
                None,
            )
            .await?;

        Ok(message)
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_messages_by_sending(
        &self,
        sending_id: SendingId,
    ) -> Result<Vec<Message>, Error> {
        let options = FindOptions::builder().sort(bson::doc! { "_id": 1 }).build();

        let messages: Vec<Message> = self
            .messages
            .find(bson::doc! { "sending_id": sending_id }, options)
            .await?
            .try_collect()
            .await?;

        Ok(messages)
    }

    #[tracing::instrument(skip(self))]
    async fn count_messages_by_sending_and_status(
        &self,
        sending_id: SendingId,
        status: MessageStatus,
    ) -> Result<u64, Error> {
        let count = self
            .messages
            .count_documents(
                bson::doc! { "sending_id": sending_id, "status": status },
                None,
            )
            .await?;

        Ok(count)
    }

    #[tracing::instrument(skip(self))]
    async fn update_message(&self, message: Message) -> Result<Message, Error> {
        let created_at = bson::DateTime::from_chrono(message.created_at);

        let result = self
            .messages
            .update_one(
                bson::doc! { "_id": message.id },
                bson::doc! { "$set": { "status": message.status, "created_at": created_at } },
                None,
            )
            .await?;

        if result.matched_count == 0 {
            return Err(Error::MessageDoesNotExist {
                message_id: message.id,
            });
        }

        Ok(message)
    }

    #[tracing::instrument(skip(self))]
    async fn delete_messages_by_sending(&self, sending_id: SendingId) -> Result<u64, Error> {
        let result = self
            .messages
            .delete_many(bson::doc! { "sending_id": sending_id }, None)
            .await?;

        Ok(result.deleted_count)
    }

    #[tracing::instrument(skip(self))]
    async fn delete_messages_by_client(&self, client_id: ClientId) -> Result<u64, Error> {
        let result = self
            .messages
            .delete_many(bson::doc! { "client_id": client_id }, None)
            .await?;

        Ok(result.deleted_count)
    }
}
