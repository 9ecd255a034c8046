use std::fmt::{Debug, Display};
use std::io::Error as IoError;

use actix_web::error::{JsonPayloadError, PathError, QueryPayloadError};
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use chrono::{DateTime, Utc};
use derivative::Derivative;
use mongodb::bson::ser::Error as BsonError;
use mongodb::error::Error as DatabaseError;
use reqwest::Error as TransportError;
use serde::{Serialize, Serializer};

use crate::client::ClientId;
use crate::message::MessageId;
use crate::sending::SendingId;

#[derive(Debug, Serialize, Derivative)]
#[derivative(PartialEq)]
#[serde(untagged)]
pub enum Error {
    // 400
    #[serde(serialize_with = "display")]
    InvalidJson(#[derivative(PartialEq = "ignore")] JsonPayloadError),
    #[serde(serialize_with = "display")]
    InvalidPath(#[derivative(PartialEq = "ignore")] PathError),
    #[serde(serialize_with = "display")]
    InvalidQuery(#[derivative(PartialEq = "ignore")] QueryPayloadError),
    InvalidFilterCode {
        value: String,
    },
    ClientPhoneRequired,
    SendingTextRequired,
    SendingTextTooLong {
        length: usize,
        maximum: usize,
    },
    SendingWindowInvalid {
        start_at: DateTime<Utc>,
        stop_at: DateTime<Utc>,
    },

    // 404
    PathDoesNotExist,
    ClientDoesNotExist {
        client_id: ClientId,
    },
    SendingDoesNotExist {
        sending_id: SendingId,
    },
    MessageDoesNotExist {
        message_id: MessageId,
    },

    // 409
    ConcurrentModificationDetected,
    ClientAlreadyExists {
        client_id: ClientId,
        phone: i64,
    },
    SendingAlreadyExists {
        sending_id: SendingId,
    },
    MessageAlreadyExists {
        sending_id: SendingId,
        client_id: ClientId,
    },

    // 500
    ExistentialState(String),
    InvalidConfig(String),
    #[serde(serialize_with = "display")]
    FailedDatabaseCall(#[derivative(PartialEq = "ignore")] DatabaseError),
    #[serde(serialize_with = "display")]
    FailedToSerializeToBson(#[derivative(PartialEq = "ignore")] BsonError),
    #[serde(serialize_with = "display")]
    IoError(#[derivative(PartialEq = "ignore")] IoError),

    // 502
    #[serde(serialize_with = "display")]
    FailedTransportCall(#[derivative(PartialEq = "ignore")] TransportError),
    TransportRejected {
        message_id: MessageId,
        status: u16,
    },

    // 503
    DispatcherStopped,

    // 504
    TransportTimedOut {
        message_id: MessageId,
    },
}

impl Error {
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::InvalidJson(_) => "E4001000",
            Error::InvalidPath(_) => "E4001001",
            Error::InvalidQuery(_) => "E4001002",
            Error::InvalidFilterCode { .. } => "E4001003",
            Error::ClientPhoneRequired => "E4001004",
            Error::SendingTextRequired => "E4001005",
            Error::SendingTextTooLong { .. } => "E4001006",
            Error::SendingWindowInvalid { .. } => "E4001007",
            Error::PathDoesNotExist => "E4041000",
            Error::ClientDoesNotExist { .. } => "E4041001",
            Error::SendingDoesNotExist { .. } => "E4041002",
            Error::MessageDoesNotExist { .. } => "E4041003",
            Error::ConcurrentModificationDetected => "E4091000",
            Error::ClientAlreadyExists { .. } => "E4091001",
            Error::SendingAlreadyExists { .. } => "E4091002",
            Error::MessageAlreadyExists { .. } => "E4091003",
            Error::ExistentialState(_) => "E5001000",
            Error::InvalidConfig(_) => "E5001001",
            Error::FailedDatabaseCall(_) => "E5001002",
            Error::FailedToSerializeToBson(_) => "E5001003",
            Error::IoError(_) => "E5001004",
            Error::FailedTransportCall(_) => "E5021000",
            Error::TransportRejected { .. } => "E5021001",
            Error::DispatcherStopped => "E5031000",
            Error::TransportTimedOut { .. } => "E5041000",
        }
    }

    pub fn error_message(&self) -> &'static str {
        match self {
            Error::InvalidJson(_) => "The given json could not be parsed",
            Error::InvalidPath(_) => "The given path could not be parsed",
            Error::InvalidQuery(_) => "The given query could not be parsed",
            Error::InvalidFilterCode { .. } => "The given operator code is not an integer",
            Error::ClientPhoneRequired => "The client phone is a required field",
            Error::SendingTextRequired => "The sending text is a required field",
            Error::SendingTextTooLong { .. } => "The sending text is too long",
            Error::SendingWindowInvalid { .. } => "The sending must start before it stops",
            Error::PathDoesNotExist => "The requested path does not exist",
            Error::ClientDoesNotExist { .. } => "The requested client does not exist",
            Error::SendingDoesNotExist { .. } => "The requested sending does not exist",
            Error::MessageDoesNotExist { .. } => "The requested message does not exist",
            Error::ConcurrentModificationDetected => {
                "The server detected a concurrent modification"
            }
            Error::ClientAlreadyExists { .. } => {
                "A client with the given id or phone already exists"
            }
            Error::SendingAlreadyExists { .. } => "A sending with the given id already exists",
            Error::MessageAlreadyExists { .. } => {
                "A message for the given sending and client already exists"
            }
            Error::ExistentialState(_) => "The server detected an invalid state",
            Error::InvalidConfig(_) => "The server configuration is invalid",
            Error::FailedDatabaseCall(_) => {
                "An error occurred when communicating with the database"
            }
            Error::FailedToSerializeToBson(_) => {
                "An error occurred when serializing an object to bson"
            }
            Error::IoError(_) => "An error occurred during an I/O operation",
            Error::FailedTransportCall(_) => {
                "An error occurred when communicating with the delivery transport"
            }
            Error::TransportRejected { .. } => "The delivery transport rejected the message",
            Error::DispatcherStopped => "The dispatcher is no longer accepting sendings",
            Error::TransportTimedOut { .. } => "The delivery transport did not respond in time",
        }
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidJson(_) => StatusCode::BAD_REQUEST,
            Error::InvalidPath(_) => StatusCode::BAD_REQUEST,
            Error::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            Error::InvalidFilterCode { .. } => StatusCode::BAD_REQUEST,
            Error::ClientPhoneRequired => StatusCode::BAD_REQUEST,
            Error::SendingTextRequired => StatusCode::BAD_REQUEST,
            Error::SendingTextTooLong { .. } => StatusCode::BAD_REQUEST,
            Error::SendingWindowInvalid { .. } => StatusCode::BAD_REQUEST,
            Error::PathDoesNotExist => StatusCode::NOT_FOUND,
            Error::ClientDoesNotExist { .. } => StatusCode::NOT_FOUND,
            Error::SendingDoesNotExist { .. } => StatusCode::NOT_FOUND,
            Error::MessageDoesNotExist { .. } => StatusCode::NOT_FOUND,
            Error::ConcurrentModificationDetected => StatusCode::CONFLICT,
            Error::ClientAlreadyExists { .. } => StatusCode::CONFLICT,
            Error::SendingAlreadyExists { .. } => StatusCode::CONFLICT,
            Error::MessageAlreadyExists { .. } => StatusCode::CONFLICT,
            Error::ExistentialState(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::InvalidConfig(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::FailedDatabaseCall(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::FailedToSerializeToBson(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::IoError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::FailedTransportCall(_) => StatusCode::BAD_GATEWAY,
            Error::TransportRejected { .. } => StatusCode::BAD_GATEWAY,
            Error::DispatcherStopped => StatusCode::SERVICE_UNAVAILABLE,
            Error::TransportTimedOut { .. } => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    fn error_response(&self) -> HttpResponse {
        #[derive(Serialize)]
        struct Dummy<'a> {
            error_code: &'static str,
            error_message: &'static str,
            error_meta: &'a Error,
        }

        HttpResponse::build(self.status_code()).json(&Dummy {
            error_code: self.error_code(),
            error_message: self.error_message(),
            error_meta: self,
        })
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        Debug::fmt(self, f)
    }
}

impl From<DatabaseError> for Error {
    fn from(error: DatabaseError) -> Error {
        Error::FailedDatabaseCall(error)
    }
}

impl From<BsonError> for Error {
    fn from(error: BsonError) -> Error {
        Error::FailedToSerializeToBson(error)
    }
}

impl From<IoError> for Error {
    fn from(error: IoError) -> Error {
        Error::IoError(error)
    }
}

impl From<TransportError> for Error {
    fn from(error: TransportError) -> Error {
        Error::FailedTransportCall(error)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::InvalidJson(err) => Some(err),
            Error::InvalidPath(err) => Some(err),
            Error::InvalidQuery(err) => Some(err),
            Error::FailedDatabaseCall(err) => Some(err),
            Error::FailedToSerializeToBson(err) => Some(err),
            Error::IoError(err) => Some(err),
            Error::FailedTransportCall(err) => Some(err),
            _ => None,
        }
    }
}

fn display<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Display,
    S: Serializer,
{
    serializer.collect_str(value)
}
