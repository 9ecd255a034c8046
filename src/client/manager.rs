use crate::database::Database;
use crate::error::Error;
use crate::sending::Filter;

use super::{Client, ClientId};

#[tracing::instrument(skip(db))]
pub async fn create_client(
    db: &dyn Database,
    client_id: Option<ClientId>,
    phone: i64,
    op_code: i32,
    tag: String,
    tz: String,
) -> Result<Client, Error> {
    if phone == 0 {
        return Err(Error::ClientPhoneRequired);
    }

    let client = Client {
        id: client_id.unwrap_or_else(ClientId::new),
        phone,
        op_code,
        tag,
        tz,
    };

    db.clients().insert_client(&client).await?;

    Ok(client)
}

#[tracing::instrument(skip(db))]
pub async fn get_clients(db: &dyn Database) -> Result<Vec<Client>, Error> {
    let clients = db.clients().fetch_clients().await?;

    Ok(clients)
}

#[tracing::instrument(skip(db))]
pub async fn filter_clients(db: &dyn Database, filter: &Filter) -> Result<Vec<Client>, Error> {
    let clients = db.clients().filter_clients(filter).await?;

    Ok(clients)
}

#[tracing::instrument(skip(db))]
pub async fn get_client_by_id(
    db: &dyn Database,
    client_id: ClientId,
) -> Result<Option<Client>, Error> {
    let client = db.clients().fetch_client_by_id(client_id).await?;

    Ok(client)
}

#[tracing::instrument(skip(db))]
pub async fn update_client(
    db: &dyn Database,
    client_id: ClientId,
    phone: i64,
    op_code: i32,
    tag: String,
    tz: String,
) -> Result<Client, Error> {
    if phone == 0 {
        return Err(Error::ClientPhoneRequired);
    }

    let client = Client {
        id: client_id,
        phone,
        op_code,
        tag,
        tz,
    };

    db.clients().update_client(client).await
}

/// Deletes the client along with every message record addressed to it.
#[tracing::instrument(skip(db))]
pub async fn delete_client(db: &dyn Database, client_id: ClientId) -> Result<(), Error> {
    db.clients().delete_client(client_id).await?;

    let deleted = db.messages().delete_messages_by_client(client_id).await?;
    tracing::debug!(deleted, "removed messages of deleted client");

    Ok(())
}
