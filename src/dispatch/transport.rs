use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::Serialize;

use crate::error::Error;
use crate::message::MessageId;

/// What the transport needs to deliver one message to one client.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OutgoingMessage {
    pub id: MessageId,
    pub phone: i64,
    pub text: String,
}

/// Performs a single delivery attempt. Implementations don't retry; a failed
/// attempt is retried by the dispatcher the next time the sending is processed.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, message: &OutgoingMessage) -> Result<(), Error>;
}

/// Posts each message as json to `{address}/send/{message_id}`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
    token: String,
}

impl HttpTransport {
    pub fn new(address: &str, token: String) -> Result<HttpTransport, Error> {
        let client = reqwest::Client::builder().build()?;

        Ok(HttpTransport {
            client,
            endpoint: format!("{}/send", address.trim_end_matches('/')),
            token,
        })
    }

    pub fn url_for(&self, message_id: MessageId) -> String {
        format!("{}/{}", self.endpoint, message_id)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[tracing::instrument(skip(self))]
    async fn send(&self, message: &OutgoingMessage) -> Result<(), Error> {
        let response = self
            .client
            .post(self.url_for(message.id))
            .bearer_auth(&self.token)
            .json(message)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::TransportRejected {
                message_id: message.id,
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        tracing::debug!(%body, "transport accepted message");

        Ok(())
    }
}

/// Stand-in for a real gateway: fails about one attempt in three and
/// otherwise takes up to a second.
#[derive(Debug, Clone, Default)]
pub struct SimulatedTransport;

impl SimulatedTransport {
    pub fn new() -> SimulatedTransport {
        SimulatedTransport
    }
}

#[async_trait]
impl Transport for SimulatedTransport {
    #[tracing::instrument(skip(self))]
    async fn send(&self, message: &OutgoingMessage) -> Result<(), Error> {
        let roll: u64 = rand::thread_rng().gen_range(0..3);
        if roll == 2 {
            return Err(Error::TransportRejected {
                message_id: message.id,
                status: 503,
            });
        }

        tokio::time::sleep(Duration::from_millis(roll * 500)).await;
        tracing::info!("simulated delivery");

        Ok(())
    }
}

#[cfg(test)]
pub mod test {
    use async_trait::async_trait;

    use crate::error::Error;

    use super::{OutgoingMessage, Transport};

    pub struct MockTransport {
        pub on_send: Box<dyn Fn(&OutgoingMessage) -> Result<(), Error> + Send + Sync>,
    }

    impl MockTransport {
        pub fn new() -> MockTransport {
            MockTransport {
                on_send: Box::new(|_| unimplemented!("send")),
            }
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&self, message: &OutgoingMessage) -> Result<(), Error> {
            (self.on_send)(message)
        }
    }
}
