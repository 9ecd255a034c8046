use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::{stream, StreamExt};
use tracing::{debug, error, info, warn};

use crate::client::Client;
use crate::database::Database;
use crate::error::Error;
use crate::message::{Message, MessageStatus};
use crate::sending::Sending;

use super::transport::{OutgoingMessage, Transport};

/// What happened to one client while processing a sending.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Delivered and recorded as sent.
    Sent,
    /// Already sent by an earlier run.
    Skipped,
    /// Nothing was delivered; the record stays `NEW` for the next run.
    Failed,
    /// Delivered but the record could not be marked as sent.
    Unrecorded,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub clients: usize,
    pub sent: usize,
    pub skipped: usize,
    pub failed: usize,
    pub unrecorded: usize,
}

impl DispatchReport {
    fn record(&mut self, outcome: Outcome) {
        self.clients += 1;
        match outcome {
            Outcome::Sent => self.sent += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Failed => self.failed += 1,
            Outcome::Unrecorded => self.unrecorded += 1,
        }
    }
}

/// Turns one sending into delivery attempts whose outcome is recorded in the
/// message store, so that a client is never sent the same sending twice once
/// it is recorded as sent.
#[derive(Clone)]
pub struct Engine {
    db: Arc<dyn Database>,
    transport: Arc<dyn Transport>,
    send_timeout: Duration,
    concurrency: usize,
}

impl Engine {
    pub fn new(
        db: Arc<dyn Database>,
        transport: Arc<dyn Transport>,
        send_timeout: Duration,
        concurrency: usize,
    ) -> Engine {
        Engine {
            db,
            transport,
            send_timeout,
            concurrency: concurrency.max(1),
        }
    }

    pub async fn process_sending(&self, sending: &Sending) -> Result<DispatchReport, Error> {
        self.process_sending_at(sending, Utc::now()).await
    }

    /// Only fails if the clients of the sending could not be resolved.
    #[tracing::instrument(skip(self, sending), fields(sending_id = %sending.id))]
    pub async fn process_sending_at(
        &self,
        sending: &Sending,
        now: DateTime<Utc>,
    ) -> Result<DispatchReport, Error> {
        if !sending.is_active_at(now) {
            debug!("sending is outside of its window");
            return Ok(DispatchReport::default());
        }

        let clients = self
            .db
            .clients()
            .filter_clients(&sending.filter)
            .await
            .map_err(|err| {
                error!(error = %err, "failed to filter clients");
                err
            })?;

        let dispatches: Vec<_> = clients
            .iter()
            .map(|client| self.dispatch_to_client(sending, client))
            .collect();

        let report = stream::iter(dispatches)
            .buffered(self.concurrency)
            .fold(DispatchReport::default(), |mut report, outcome| async move {
                report.record(outcome);
                report
            })
            .await;

        info!(
            clients = report.clients,
            sent = report.sent,
            skipped = report.skipped,
            failed = report.failed,
            unrecorded = report.unrecorded,
            "processed sending"
        );

        Ok(report)
    }

    #[tracing::instrument(skip(self, sending, client), fields(client_id = %client.id))]
    async fn dispatch_to_client(&self, sending: &Sending, client: &Client) -> Outcome {
        let message = match self.ensure_message(sending, client).await {
            Ok(message) => message,
            Err(err) => {
                warn!(error = %err, "failed to get message");
                return Outcome::Failed;
            }
        };

        if message.status != MessageStatus::New {
            return Outcome::Skipped;
        }

        let outgoing = OutgoingMessage {
            id: message.id,
            phone: client.phone,
            text: sending.text.clone(),
        };

        if let Err(err) = self.send(&outgoing).await {
            warn!(message_id = %message.id, error = %err, "failed to send message");
            return Outcome::Failed;
        }

        let message = Message {
            status: MessageStatus::Sent,
            created_at: Utc::now(),
            ..message
        };

        // The message is already out; if this fails the record stays NEW and
        // the next run sends it again.
        match self.db.messages().update_message(message).await {
            Ok(message) => {
                debug!(message_id = %message.id, "message sent");
                Outcome::Sent
            }
            Err(err) => {
                error!(error = %err, "failed to update sent message");
                Outcome::Unrecorded
            }
        }
    }

    /// Finds the record for (sending, client) or creates it as `NEW`. Losing
    /// a creation race to another run yields the winner's record.
    async fn ensure_message(&self, sending: &Sending, client: &Client) -> Result<Message, Error> {
        let messages = self.db.messages();

        if let Some(message) = messages
            .fetch_message_by_sending_and_client(sending.id, client.id)
            .await?
        {
            return Ok(message);
        }

        match messages
            .insert_message(sending.id, client.id, MessageStatus::New)
            .await
        {
            Ok(message) => Ok(message),
            Err(Error::MessageAlreadyExists { .. }) => messages
                .fetch_message_by_sending_and_client(sending.id, client.id)
                .await?
                .ok_or(Error::ConcurrentModificationDetected),
            Err(err) => Err(err),
        }
    }

    async fn send(&self, message: &OutgoingMessage) -> Result<(), Error> {
        tokio::time::timeout(self.send_timeout, self.transport.send(message))
            .await
            .map_err(|_| Error::TransportTimedOut {
                message_id: message.id,
            })?
    }
}
