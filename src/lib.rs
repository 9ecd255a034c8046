use std::sync::Arc;

use actix_web::web::{self, Data, JsonConfig, PathConfig, QueryConfig};
use actix_web::{get, App, HttpServer, ResponseError};
use mongodb::Client as MongoClient;
use tracing::{error, info};
use tracing_actix_web::TracingLogger;

pub mod client;
pub mod config;
pub mod database;
pub mod dispatch;
pub mod error;
pub mod message;
pub mod seed;
pub mod sending;
pub mod typedid;
pub mod utils;

pub use config::{Config, TransportKind};
pub use error::Error;

use crate::database::{Database, MongoDatabase};
use crate::dispatch::{Dispatcher, HttpTransport, SimulatedTransport, Transport};

#[get("/ping")]
async fn ping() -> &'static str {
    "pong"
}

fn build_transport(config: &Config) -> Result<Arc<dyn Transport>, Error> {
    let transport: Arc<dyn Transport> = match config.transport {
        TransportKind::Http => Arc::new(HttpTransport::new(
            &config.sender_address,
            config.sender_token.clone(),
        )?),
        TransportKind::Simulated => Arc::new(SimulatedTransport::new()),
    };

    Ok(transport)
}

/// Connects to the database, starts the dispatcher and serves the http api
/// until the server is stopped.
pub async fn run(config: Config) -> Result<(), Error> {
    config.validate()?;

    info!("connecting to db: {}", config.database_uri);
    let db = MongoClient::with_uri_str(&config.database_uri)
        .await?
        .database(&config.database_name);
    let db = MongoDatabase::initialize(db).await?;
    let db: Arc<dyn Database> = Arc::new(db);

    let seeded = if config.seed {
        Some(seed::seed(&*db).await?)
    } else {
        None
    };

    let transport = build_transport(&config)?;
    let (dispatcher, handle) =
        Dispatcher::new(Arc::clone(&db), transport, config.dispatcher_config());
    let worker = dispatcher.spawn();

    if let Some(sending) = seeded {
        handle.submit(sending).await?;
    }

    let app_db = Data::from(Arc::clone(&db));
    let app_handle = Data::new(handle.clone());

    info!("listening on {}", config.run_address);
    let served = HttpServer::new(move || {
        App::new()
            .app_data(JsonConfig::default().error_handler(|err, _req| {
                // format json errors with custom format
                Error::InvalidJson(err).into()
            }))
            .app_data(PathConfig::default().error_handler(|err, _req| {
                // format path errors with custom format
                Error::InvalidPath(err).into()
            }))
            .app_data(QueryConfig::default().error_handler(|err, _req| {
                // format query errors with custom format
                Error::InvalidQuery(err).into()
            }))
            .app_data(app_db.clone())
            .app_data(app_handle.clone())
            .wrap(TracingLogger::default())
            .service(ping)
            .service(client::endpoints::create_client)
            .service(client::endpoints::get_clients)
            .service(client::endpoints::filter_clients)
            .service(client::endpoints::get_client_by_id)
            .service(client::endpoints::update_client)
            .service(client::endpoints::delete_client)
            .service(sending::endpoints::create_sending)
            .service(sending::endpoints::get_sending_statistics)
            .service(sending::endpoints::get_sending_details)
            .service(sending::endpoints::update_sending)
            .service(sending::endpoints::delete_sending)
            .default_service(web::to(|| async { Error::PathDoesNotExist.error_response() }))
    })
    .bind(&config.run_address)?
    .run()
    .await;

    handle.shutdown();
    if let Err(err) = worker.await {
        error!(error = %err, "dispatcher task failed");
    }

    served?;

    Ok(())
}
