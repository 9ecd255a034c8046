use actix_web::web::{Data, Json, Path, Query};
use actix_web::{delete, get, post, put};
use serde::{Deserialize, Serialize};

use crate::database::Database;
use crate::error::Error;
use crate::sending::Filter;
use crate::utils::SuccessBody;

use super::{manager, Client, ClientId};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateClientBody {
    #[serde(default)]
    pub id: Option<ClientId>,
    pub phone: i64,
    #[serde(default)]
    pub op_code: i32,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub tz: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpdateClientBody {
    pub phone: i64,
    #[serde(default)]
    pub op_code: i32,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub tz: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientBody {
    pub id: ClientId,
    pub phone: i64,
    pub op_code: i32,
    pub tag: String,
    pub tz: String,
}

impl ClientBody {
    pub fn render(client: Client) -> ClientBody {
        ClientBody {
            id: client.id,
            phone: client.phone,
            op_code: client.op_code,
            tag: client.tag,
            tz: client.tz,
        }
    }
}

/// Comma separated lists, e.g. `?tags=vip1,vip2&codes=911,912`.
#[derive(Clone, Debug, Deserialize)]
pub struct FilterQuery {
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub codes: String,
}

impl FilterQuery {
    pub fn into_filter(self) -> Result<Filter, Error> {
        let tags = split_list(&self.tags).map(str::to_owned).collect();
        let codes = split_list(&self.codes)
            .map(|code| {
                code.parse().map_err(|_| Error::InvalidFilterCode {
                    value: code.to_owned(),
                })
            })
            .collect::<Result<_, _>>()?;

        Ok(Filter { tags, codes })
    }
}

fn split_list(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|item| !item.is_empty())
}

#[post("/api/client")]
#[tracing::instrument(skip(db))]
pub async fn create_client(
    db: Data<dyn Database>,
    body: Json<CreateClientBody>,
) -> Result<Json<ClientBody>, Error> {
    let body = body.into_inner();

    let client =
        manager::create_client(&**db, body.id, body.phone, body.op_code, body.tag, body.tz)
            .await?;

    tracing::info!(client_id = %client.id, "new client");

    Ok(Json(ClientBody::render(client)))
}

#[get("/api/client")]
#[tracing::instrument(skip(db))]
pub async fn get_clients(db: Data<dyn Database>) -> Result<Json<Vec<ClientBody>>, Error> {
    let clients = manager::get_clients(&**db).await?;

    let body = clients.into_iter().map(ClientBody::render).collect();

    Ok(Json(body))
}

#[get("/api/client/filter")]
#[tracing::instrument(skip(db))]
pub async fn filter_clients(
    db: Data<dyn Database>,
    query: Query<FilterQuery>,
) -> Result<Json<Vec<ClientBody>>, Error> {
    let filter = query.into_inner().into_filter()?;

    let clients = manager::filter_clients(&**db, &filter).await?;

    let body = clients.into_iter().map(ClientBody::render).collect();

    Ok(Json(body))
}

#[get("/api/client/{client_id}")]
#[tracing::instrument(skip(db))]
pub async fn get_client_by_id(
    db: Data<dyn Database>,
    params: Path<ClientId>,
) -> Result<Json<ClientBody>, Error> {
    let client_id = params.into_inner();

    let client = manager::get_client_by_id(&**db, client_id)
        .await?
        .ok_or(Error::ClientDoesNotExist { client_id })?;

    Ok(Json(ClientBody::render(client)))
}

#[put("/api/client/{client_id}")]
#[tracing::instrument(skip(db))]
pub async fn update_client(
    db: Data<dyn Database>,
    params: Path<ClientId>,
    body: Json<UpdateClientBody>,
) -> Result<Json<ClientBody>, Error> {
    let client_id = params.into_inner();
    let body = body.into_inner();

    let client = manager::update_client(
        &**db,
        client_id,
        body.phone,
        body.op_code,
        body.tag,
        body.tz,
    )
    .await?;

    tracing::info!(%client_id, "updated client");

    Ok(Json(ClientBody::render(client)))
}

#[delete("/api/client/{client_id}")]
#[tracing::instrument(skip(db))]
pub async fn delete_client(
    db: Data<dyn Database>,
    params: Path<ClientId>,
) -> Result<Json<SuccessBody>, Error> {
    let client_id = params.into_inner();

    manager::delete_client(&**db, client_id).await?;

    tracing::info!(%client_id, "deleted client");

    Ok(Json(SuccessBody {}))
}
