use chrono::{Duration, Utc};

use crate::client::manager as client_manager;
use crate::database::Database;
use crate::error::Error;
use crate::sending::manager as sending_manager;
use crate::sending::{Filter, Sending};

/// Resets the database to a handful of clients and one open sending that
/// targets some of them. Returns the sending so it can be dispatched right
/// away.
pub async fn seed(db: &dyn Database) -> Result<Sending, Error> {
    db.drop().await?;

    let clients = [
        (79000000001, 911, "vip1", "Europe/Moscow"),
        (79000000002, 912, "vip2", "Europe/Moscow"),
        (79000000003, 913, "vip1", "Asia/Yekaterinburg"),
        (79000000004, 911, "other", "Europe/Kaliningrad"),
    ];

    for &(phone, op_code, tag, tz) in &clients {
        client_manager::create_client(db, None, phone, op_code, tag.into(), tz.into()).await?;
    }

    let now = Utc::now();
    let sending = sending_manager::create_sending(
        db,
        None,
        "Spring sale: 20% off for our best customers".into(),
        Filter {
            tags: vec!["vip1".into(), "vip2".into()],
            codes: vec![911, 912],
        },
        now,
        now + Duration::days(1),
    )
    .await?;

    tracing::info!(clients = clients.len(), sending_id = %sending.id, "seeded database");

    Ok(sending)
}
