use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::options::FindOptions;
use mongodb::{bson, Database};

use crate::database::{is_duplicate_key, MongoClientStore};
use crate::error::Error;
use crate::sending::Filter;

use super::{Client, ClientId};

pub const CLIENTS: &str = "clients";

pub async fn initialize(db: &Database) -> Result<(), Error> {
    db.run_command(
        bson::doc! {
            "createIndexes": CLIENTS,
            "indexes": [
                { "key": { "phone": 1 }, "name": "by_phone", "unique": true },
                { "key": { "tag": 1, "op_code": 1 }, "name": "by_tag_and_op_code" },
            ]
        },
        None,
    )
    .await?;

    Ok(())
}

#[async_trait]
pub trait ClientStore: Send + Sync {
    async fn insert_client(&self, client: &Client) -> Result<(), Error>;

    async fn fetch_clients(&self) -> Result<Vec<Client>, Error>;

    async fn fetch_client_by_id(&self, client_id: ClientId) -> Result<Option<Client>, Error>;

    async fn filter_clients(&self, filter: &Filter) -> Result<Vec<Client>, Error>;

    async fn update_client(&self, client: Client) -> Result<Client, Error>;

    async fn delete_client(&self, client_id: ClientId) -> Result<(), Error>;
}

#[async_trait]
impl ClientStore for MongoClientStore {
    #[tracing::instrument(skip(self))]
    async fn insert_client(&self, client: &Client) -> Result<(), Error> {
        self.insert_one(client, None).await.map_err(|err| {
            if is_duplicate_key(&err) {
                Error::ClientAlreadyExists {
                    client_id: client.id,
                    phone: client.phone,
                }
            } else {
                err.into()
            }
        })?;

        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_clients(&self) -> Result<Vec<Client>, Error> {
        let options = FindOptions::builder().sort(bson::doc! { "phone": 1 }).build();

        let clients: Vec<Client> = self
            .find(bson::doc! {}, options)
            .await?
            .try_collect()
            .await?;

        Ok(clients)
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_client_by_id(&self, client_id: ClientId) -> Result<Option<Client>, Error> {
        let client = self.find_one(bson::doc! { "_id": client_id }, None).await?;

        Ok(client)
    }

    #[tracing::instrument(skip(self))]
    async fn filter_clients(&self, filter: &Filter) -> Result<Vec<Client>, Error> {
        let clients: Vec<Client> = self
            .find(filter.to_query(), None)
            .await?
            .try_collect()
            .await?;

        Ok(clients)
    }

    #[tracing::instrument(skip(self))]
    async fn update_client(&self, client: Client) -> Result<Client, Error> {
        let result = self
            .replace_one(bson::doc! { "_id": client.id }, &client, None)
            .await
            .map_err(|err| {
                if is_duplicate_key(&err) {
                    Error::ClientAlreadyExists {
                        client_id: client.id,
                        phone: client.phone,
                    }
                } else {
                    err.into()
                }
            })?;

        if result.matched_count == 0 {
            return Err(Error::ClientDoesNotExist {
                client_id: client.id,
            });
        }

        Ok(client)
    }

    #[tracing::instrument(skip(self))]
    async fn delete_client(&self, client_id: ClientId) -> Result<(), Error> {
        let result = self
            .delete_one(bson::doc! { "_id": client_id }, None)
            .await?;

        if result.deleted_count == 0 {
            return Err(Error::ClientDoesNotExist { client_id });
        }

        Ok(())
    }
}
