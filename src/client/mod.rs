use serde::{Deserialize, Serialize};

use crate::typedid::{TypedId, TypedIdMarker};

pub mod db;
pub mod endpoints;
pub mod manager;
pub use endpoints::*;

pub type ClientId = TypedId<Client>;

/// A recipient that sendings can be dispatched to.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Client {
    #[serde(rename = "_id")]
    pub id: ClientId,
    pub phone: i64,
    pub op_code: i32,
    pub tag: String,
    pub tz: String,
}

impl TypedIdMarker for Client {
    fn tag() -> &'static str {
        "CLT"
    }
}
