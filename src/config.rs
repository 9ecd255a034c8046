use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::dispatch::DispatcherConfig;
use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransportKind {
    /// Deliver through the external sender API.
    Http,
    /// Pretend to deliver; for local development.
    Simulated,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "noty", about = "Notification campaign dispatch service")]
pub struct Config {
    /// Address the http server listens on
    #[arg(long, env = "RUN_ADDRESS", default_value = "127.0.0.1:8080")]
    pub run_address: String,

    #[arg(long, env = "DATABASE_URI", default_value = "mongodb://localhost:27017")]
    pub database_uri: String,

    #[arg(long, env = "DATABASE_NAME", default_value = "noty")]
    pub database_name: String,

    /// Base url of the external sender API
    #[arg(long, env = "SENDER_ADDRESS", default_value = "https://probe.fbrq.cloud/v1")]
    pub sender_address: String,

    /// Bearer token for the external sender API
    #[arg(long, env = "SENDER_TOKEN", default_value = "")]
    pub sender_token: String,

    #[arg(long, env = "TRANSPORT", value_enum, default_value_t = TransportKind::Simulated)]
    pub transport: TransportKind,

    /// Seconds between sweeps over active sendings
    #[arg(long, env = "SWEEP_INTERVAL", default_value_t = 60)]
    pub sweep_interval: u64,

    #[arg(long, env = "QUEUE_CAPACITY", default_value_t = 100)]
    pub queue_capacity: usize,

    /// Seconds a single delivery attempt may take
    #[arg(long, env = "SEND_TIMEOUT", default_value_t = 10)]
    pub send_timeout: u64,

    /// Deliveries in flight per sending
    #[arg(long, env = "SEND_CONCURRENCY", default_value_t = 1)]
    pub send_concurrency: usize,

    /// Log at debug level
    #[arg(long, default_value_t = false)]
    pub debug: bool,

    /// Drop the database and fill it with development data
    #[arg(long, default_value_t = false)]
    pub seed: bool,
}

impl Config {
    pub fn validate(&self) -> Result<(), Error> {
        if self.run_address.trim().is_empty() {
            return Err(Error::InvalidConfig("run address is empty".into()));
        }
        if self.database_uri.trim().is_empty() {
            return Err(Error::InvalidConfig("database uri is empty".into()));
        }
        if self.database_name.trim().is_empty() {
            return Err(Error::InvalidConfig("database name is empty".into()));
        }
        if self.sweep_interval == 0 {
            return Err(Error::InvalidConfig("sweep interval must be positive".into()));
        }
        if self.queue_capacity == 0 {
            return Err(Error::InvalidConfig("queue capacity must be positive".into()));
        }
        if self.send_timeout == 0 {
            return Err(Error::InvalidConfig("send timeout must be positive".into()));
        }
        if self.send_concurrency == 0 {
            return Err(Error::InvalidConfig("send concurrency must be positive".into()));
        }

        if self.transport == TransportKind::Http {
            if self.sender_address.trim().is_empty() {
                return Err(Error::InvalidConfig("sender address is empty".into()));
            }
            if self.sender_token.is_empty() {
                return Err(Error::InvalidConfig(
                    "sender token is required for the http transport".into(),
                ));
            }
        }

        Ok(())
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            queue_capacity: self.queue_capacity,
            sweep_interval: Duration::from_secs(self.sweep_interval),
            send_timeout: Duration::from_secs(self.send_timeout),
            send_concurrency: self.send_concurrency,
        }
    }
}
