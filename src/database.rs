use async_trait::async_trait;
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::{Collection, Database as MongoDb};

use crate::client::db::{self as client_db, ClientStore, CLIENTS};
use crate::client::Client;
use crate::error::Error;
use crate::message::db::{self as message_db, MessageStore, MongoMessageStore};
use crate::sending::db::{self as sending_db, SendingStore, SENDINGS};
use crate::sending::Sending;

pub type MongoClientStore = Collection<Client>;
pub type MongoSendingStore = Collection<Sending>;

const DUPLICATE_KEY: i32 = 11000;

/// Access to every store the service and the dispatcher need.
#[async_trait]
pub trait Database: Send + Sync {
    fn clients(&self) -> &dyn ClientStore;

    fn sendings(&self) -> &dyn SendingStore;

    fn messages(&self) -> &dyn MessageStore;

    async fn drop(&self) -> Result<(), Error>;
}

#[derive(Debug, Clone)]
pub struct MongoDatabase {
    clients: MongoClientStore,
    sendings: MongoSendingStore,
    messages: MongoMessageStore,
    db: MongoDb,
}

impl MongoDatabase {
    pub fn new(db: MongoDb) -> MongoDatabase {
        MongoDatabase {
            clients: db.collection(CLIENTS),
            sendings: db.collection(SENDINGS),
            messages: MongoMessageStore::new(&db),
            db,
        }
    }

    pub async fn initialize(db: MongoDb) -> Result<MongoDatabase, Error> {
        client_db::initialize(&db).await?;
        sending_db::initialize(&db).await?;
        message_db::initialize(&db).await?;

        Ok(MongoDatabase::new(db))
    }
}

#[async_trait]
impl Database for MongoDatabase {
    fn clients(&self) -> &dyn ClientStore {
        &self.clients
    }

    fn sendings(&self) -> &dyn SendingStore {
        &self.sendings
    }

    fn messages(&self) -> &dyn MessageStore {
        &self.messages
    }

    async fn drop(&self) -> Result<(), Error> {
        self.db.drop(None).await?;
        client_db::initialize(&self.db).await?;
        sending_db::initialize(&self.db).await?;
        message_db::initialize(&self.db).await?;
        Ok(())
    }
}

pub fn is_duplicate_key(error: &mongodb::error::Error) -> bool {
    match error.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => {
            write_error.code == DUPLICATE_KEY
        }
        _ => false,
    }
}
