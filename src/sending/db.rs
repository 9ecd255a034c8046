use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::options::FindOptions;
use mongodb::{bson, Database};

use crate::database::{is_duplicate_key, MongoSendingStore};
use crate::error::Error;

use super::{Sending, SendingId};

pub const SENDINGS: &str = "sendings";

pub async fn initialize(db: &Database) -> Result<(), Error> {
    db.run_command(
        bson::doc! {
            "createIndexes": SENDINGS,
            "indexes": [
                { "key": { "stop_at": 1, "start_at": 1 }, "name": "by_window" },
            ]
        },
        None,
    )
    .await?;

    Ok(())
}

#[async_trait]
pub trait SendingStore: Send + Sync {
    async fn insert_sending(&self, sending: &Sending) -> Result<(), Error>;

    async fn fetch_sendings(&self) -> Result<Vec<Sending>, Error>;

    async fn fetch_sending_by_id(&self, sending_id: SendingId) -> Result<Option<Sending>, Error>;

    /// Sendings whose window contains `now`, soonest to stop first.
    async fn fetch_active_sendings(&self, now: DateTime<Utc>) -> Result<Vec<Sending>, Error>;

    async fn update_sending(&self, sending: Sending) -> Result<Sending, Error>;

    async fn delete_sending(&self, sending_id: SendingId) -> Result<(), Error>;
}

#[async_trait]
impl SendingStore for MongoSendingStore {
    #[tracing::instrument(skip(self))]
    async fn insert_sending(&self, sending: &Sending) -> Result<(), Error> {
        self.insert_one(sending, None).await.map_err(|err| {
            if is_duplicate_key(&err) {
                Error::SendingAlreadyExists {
                    sending_id: sending.id,
                }
            } else {
                err.into()
            }
        })?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_sendings(&self) -> Result<Vec<Sending>, Error> {
        let options = FindOptions::builder()
            .sort(bson::doc! { "start_at": 1 })
            .build();

        let sendings: Vec<Sending> = self
            .find(bson::doc! {}, options)
            .await?
            .try_collect()
            .await?;

        Ok(sendings)
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_sending_by_id(&self, sending_id: SendingId) -> Result<Option<Sending>, Error> {
        let sending = self
            .find_one(bson::doc! { "_id": sending_id }, None)
            .await?;

        Ok(sending)
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_active_sendings(&self, now: DateTime<Utc>) -> Result<Vec<Sending>, Error> {
        let now = bson::DateTime::from_chrono(now);
        let options = FindOptions::builder()
            .sort(bson::doc! { "stop_at": 1 })
            .build();

        let sendings: Vec<Sending> = self
            .find(
                bson::doc! { "start_at": { "$lte": now }, "stop_at": { "$gt": now } },
                options,
            )
            .await?
            .try_collect()
            .await?;

        Ok(sendings)
    }

    #[tracing::instrument(skip(self))]
    async fn update_sending(&self, sending: Sending) -> Result<Sending, Error> {
        let result = self
            .replace_one(bson::doc! { "_id": sending.id }, &sending, None)
            .await?;

        if result.matched_count == 0 {
            return Err(Error::SendingDoesNotExist {
                sending_id: sending.id,
            });
        }

        Ok(sending)
    }

    #[tracing::instrument(skip(self))]
    async fn delete_sending(&self, sending_id: SendingId) -> Result<(), Error> {
        let result = self
            .delete_one(bson::doc! { "_id": sending_id }, None)
            .await?;

        if result.deleted_count == 0 {
            return Err(Error::SendingDoesNotExist { sending_id });
        }

        Ok(())
    }
}
