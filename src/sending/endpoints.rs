use actix_web::web::{Data, Json, Path};
use actix_web::{delete, get, post, put};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::client::ClientId;
use crate::database::Database;
use crate::dispatch::DispatcherHandle;
use crate::error::Error;
use crate::message::{Message, MessageId};
use crate::utils::SuccessBody;

use super::manager::{self, SendingStatistics};
use super::{Filter, Sending, SendingId};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateSendingBody {
    #[serde(default)]
    pub id: Option<SendingId>,
    pub text: String,
    #[serde(default)]
    pub filter: Filter,
    pub start_at: DateTime<Utc>,
    pub stop_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpdateSendingBody {
    pub text: String,
    #[serde(default)]
    pub filter: Filter,
    pub start_at: DateTime<Utc>,
    pub stop_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SendingBody {
    pub id: SendingId,
    pub text: String,
    pub filter: Filter,
    pub start_at: DateTime<Utc>,
    pub stop_at: DateTime<Utc>,
}

impl SendingBody {
    pub fn render(sending: Sending) -> SendingBody {
        SendingBody {
            id: sending.id,
            text: sending.text,
            filter: sending.filter,
            start_at: sending.start_at,
            stop_at: sending.stop_at,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessageCountsBody {
    #[serde(rename = "NEW")]
    pub new: u64,
    #[serde(rename = "SENT")]
    pub sent: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SendingStatisticsBody {
    #[serde(flatten)]
    pub sending: SendingBody,
    pub messages: MessageCountsBody,
}

impl SendingStatisticsBody {
    pub fn render(statistics: SendingStatistics) -> SendingStatisticsBody {
        SendingStatisticsBody {
            sending: SendingBody::render(statistics.sending),
            messages: MessageCountsBody {
                new: statistics.new,
                sent: statistics.sent,
            },
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessageBody {
    pub id: MessageId,
    pub created_at: DateTime<Utc>,
    pub status: String,
    pub client_id: ClientId,
}

impl MessageBody {
    pub fn render(message: Message) -> MessageBody {
        MessageBody {
            id: message.id,
            created_at: message.created_at,
            status: message.status.as_str().to_owned(),
            client_id: message.client_id,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SendingDetailsBody {
    #[serde(flatten)]
    pub sending: SendingBody,
    pub messages: Vec<MessageBody>,
}

#[post("/api/sending")]
#[tracing::instrument(skip(db, dispatcher))]
pub async fn create_sending(
    db: Data<dyn Database>,
    dispatcher: Data<DispatcherHandle>,
    body: Json<CreateSendingBody>,
) -> Result<Json<SendingBody>, Error> {
    let body = body.into_inner();

    let sending = manager::create_sending(
        &**db,
        body.id,
        body.text,
        body.filter,
        body.start_at,
        body.stop_at,
    )
    .await?;

    tracing::info!(sending_id = %sending.id, "new sending");

    // queued in the background so a full queue doesn't hold up the response;
    // the sweep catches the sending if this fails
    let queued = sending.clone();
    let dispatcher = dispatcher.get_ref().clone();
    actix_web::rt::spawn(async move {
        let sending_id = queued.id;
        if let Err(err) = dispatcher.submit(queued).await {
            warn!(%sending_id, error = %err, "failed to queue sending");
        }
    });

    Ok(Json(SendingBody::render(sending)))
}

#[get("/api/sending")]
#[tracing::instrument(skip(db))]
pub async fn get_sending_statistics(
    db: Data<dyn Database>,
) -> Result<Json<Vec<SendingStatisticsBody>>, Error> {
    let statistics = manager::get_sending_statistics(&**db).await?;

    let body = statistics
        .into_iter()
        .map(SendingStatisticsBody::render)
        .collect();

    Ok(Json(body))
}

#[get("/api/sending/{sending_id}")]
#[tracing::instrument(skip(db))]
pub async fn get_sending_details(
    db: Data<dyn Database>,
    params: Path<SendingId>,
) -> Result<Json<SendingDetailsBody>, Error> {
    let sending_id = params.into_inner();

    let sending = manager::expect_sending_by_id(&**db, sending_id).await?;
    let messages = manager::get_sending_messages(&**db, &sending).await?;

    Ok(Json(SendingDetailsBody {
        sending: SendingBody::render(sending),
        messages: messages.into_iter().map(MessageBody::render).collect(),
    }))
}

#[put("/api/sending/{sending_id}")]
#[tracing::instrument(skip(db))]
pub async fn update_sending(
    db: Data<dyn Database>,
    params: Path<SendingId>,
    body: Json<UpdateSendingBody>,
) -> Result<Json<SendingBody>, Error> {
    let sending_id = params.into_inner();
    let body = body.into_inner();

    let sending = manager::update_sending(
        &**db,
        sending_id,
        body.text,
        body.filter,
        body.start_at,
        body.stop_at,
    )
    .await?;

    tracing::info!(%sending_id, "updated sending");

    Ok(Json(SendingBody::render(sending)))
}

#[delete("/api/sending/{sending_id}")]
#[tracing::instrument(skip(db))]
pub async fn delete_sending(
    db: Data<dyn Database>,
    params: Path<SendingId>,
) -> Result<Json<SuccessBody>, Error> {
    let sending_id = params.into_inner();

    manager::delete_sending(&**db, sending_id).await?;

    tracing::info!(%sending_id, "deleted sending");

    Ok(Json(SuccessBody {}))
}
