use clap::Parser;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;

use noty::{Config, Error};

#[actix_web::main]
async fn main() -> Result<(), Error> {
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_max_level(if config.debug {
            Level::DEBUG
        } else {
            Level::INFO
        })
        .with_span_events(FmtSpan::NEW)
        .compact()
        .init();

    noty::run(config).await
}
