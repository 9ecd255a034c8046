use chrono::{DateTime, Utc};
use mongodb::bson::{self, Document};
use serde::{Deserialize, Serialize};

use crate::client::Client;
use crate::typedid::{TypedId, TypedIdMarker};

pub mod db;
pub mod endpoints;
pub mod manager;
pub use endpoints::*;

pub type SendingId = TypedId<Sending>;

pub const MAX_TEXT_LENGTH: usize = 160;

/// A campaign: one text delivered to every client matching the filter while
/// the window `[start_at, stop_at)` is open.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Sending {
    #[serde(rename = "_id")]
    pub id: SendingId,
    pub text: String,
    pub filter: Filter,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub start_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub stop_at: DateTime<Utc>,
}

impl Sending {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.start_at <= now && now < self.stop_at
    }
}

impl TypedIdMarker for Sending {
    fn tag() -> &'static str {
        "SND"
    }
}

/// Selects clients whose tag is one of `tags` and whose operator code is one
/// of `codes`. An empty list matches nothing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Filter {
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub codes: Vec<i32>,
}

impl Filter {
    pub fn matches(&self, client: &Client) -> bool {
        self.tags.contains(&client.tag) && self.codes.contains(&client.op_code)
    }

    pub fn to_query(&self) -> Document {
        bson::doc! {
            "tag": { "$in": self.tags.clone() },
            "op_code": { "$in": self.codes.clone() },
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::client::ClientId;

    fn client(tag: &str, op_code: i32) -> Client {
        Client {
            id: ClientId::new(),
            phone: 79000000000,
            op_code,
            tag: tag.to_string(),
            tz: "UTC".to_string(),
        }
    }

    fn vip_filter() -> Filter {
        Filter {
            tags: vec!["vip1".to_string(), "vip2".to_string()],
            codes: vec![911, 912],
        }
    }

    #[test]
    fn filter_requires_both_tag_and_code() {
        let filter = vip_filter();

        assert!(filter.matches(&client("vip1", 911)));
        assert!(filter.matches(&client("vip2", 912)));
        assert!(!filter.matches(&client("vip1", 913)));
        assert!(!filter.matches(&client("other", 911)));
    }

    #[test]
    fn empty_filter_field_matches_nothing() {
        let filter = Filter {
            tags: vec!["vip1".to_string()],
            codes: vec![],
        };

        assert!(!filter.matches(&client("vip1", 911)));
    }

    #[test]
    fn filter_query_uses_in_operators() {
        let query = vip_filter().to_query();

        assert_eq!(
            query,
            bson::doc! {
                "tag": { "$in": ["vip1", "vip2"] },
                "op_code": { "$in": [911, 912] },
            }
        );
    }

    #[test]
    fn window_is_half_open() {
        let now = Utc::now();
        let sending = Sending {
            id: SendingId::new(),
            text: "hello".to_string(),
            filter: vip_filter(),
            start_at: now,
            stop_at: now + Duration::hours(1),
        };

        assert!(sending.is_active_at(now));
        assert!(sending.is_active_at(now + Duration::minutes(59)));
        assert!(!sending.is_active_at(now - Duration::seconds(1)));
        assert!(!sending.is_active_at(now + Duration::hours(1)));
    }
}
