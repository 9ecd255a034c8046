use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::database::Database;
use crate::error::Error;
use crate::sending::Sending;

pub mod engine;
pub mod transport;

pub use engine::{DispatchReport, Engine};
pub use transport::{HttpTransport, OutgoingMessage, SimulatedTransport, Transport};

#[derive(Clone, Debug)]
pub struct DispatcherConfig {
    pub queue_capacity: usize,
    pub sweep_interval: Duration,
    pub send_timeout: Duration,
    pub send_concurrency: usize,
}

impl Default for DispatcherConfig {
    fn default() -> DispatcherConfig {
        DispatcherConfig {
            queue_capacity: 100,
            sweep_interval: Duration::from_secs(60),
            send_timeout: Duration::from_secs(10),
            send_concurrency: 1,
        }
    }
}

/// Cloneable way into a running [`Dispatcher`].
#[derive(Clone, Debug)]
pub struct DispatcherHandle {
    queue: mpsc::Sender<Sending>,
    shutdown: CancellationToken,
}

impl DispatcherHandle {
    /// Queues the sending for immediate processing. Waits while the queue is
    /// full.
    pub async fn submit(&self, sending: Sending) -> Result<(), Error> {
        self.queue
            .send(sending)
            .await
            .map_err(|_| Error::DispatcherStopped)
    }

    /// Stops the dispatcher once its current sending is done.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

/// Background worker that processes newly created sendings as they are
/// submitted and periodically re-processes every active sending, which picks
/// up failed deliveries and sendings whose window has since opened.
pub struct Dispatcher {
    db: Arc<dyn Database>,
    engine: Engine,
    queue: mpsc::Receiver<Sending>,
    shutdown: CancellationToken,
    sweep_interval: Duration,
}

impl Dispatcher {
    pub fn new(
        db: Arc<dyn Database>,
        transport: Arc<dyn Transport>,
        config: DispatcherConfig,
    ) -> (Dispatcher, DispatcherHandle) {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let shutdown = CancellationToken::new();

        let engine = Engine::new(
            Arc::clone(&db),
            transport,
            config.send_timeout,
            config.send_concurrency,
        );

        let dispatcher = Dispatcher {
            db,
            engine,
            queue: receiver,
            shutdown: shutdown.clone(),
            sweep_interval: config.sweep_interval,
        };

        let handle = DispatcherHandle {
            queue: sender,
            shutdown,
        };

        (dispatcher, handle)
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Runs until shut down or until every handle is dropped.
    pub async fn run(mut self) {
        info!(sweep_interval = ?self.sweep_interval, "dispatcher started");

        let mut sweep = interval_at(Instant::now() + self.sweep_interval, self.sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => break,
                sending = self.queue.recv() => match sending {
                    Some(sending) => self.process(&sending).await,
                    None => break,
                },
                _ = sweep.tick() => self.sweep().await,
            }
        }

        info!("dispatcher stopped");
    }

    async fn process(&self, sending: &Sending) {
        if let Err(err) = self.engine.process_sending(sending).await {
            error!(sending_id = %sending.id, error = %err, "failed to process sending");
        }
    }

    #[tracing::instrument(skip(self))]
    async fn sweep(&self) {
        let sendings = match self.db.sendings().fetch_active_sendings(Utc::now()).await {
            Ok(sendings) => sendings,
            Err(err) => {
                error!(error = %err, "failed to fetch active sendings");
                return;
            }
        };

        debug!(count = sendings.len(), "sweeping active sendings");

        for sending in &sendings {
            if self.shutdown.is_cancelled() {
                break;
            }

            self.process(sending).await;
        }
    }
}

/// A handle whose submissions land in the returned receiver instead of a
/// running dispatcher.
#[cfg(test)]
pub(crate) fn channel(capacity: usize) -> (DispatcherHandle, mpsc::Receiver<Sending>) {
    let (sender, receiver) = mpsc::channel(capacity);
    let handle = DispatcherHandle {
        queue: sender,
        shutdown: CancellationToken::new(),
    };

    (handle, receiver)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use chrono::Duration as ChronoDuration;

    use super::transport::test::MockTransport;
    use super::*;
    use crate::client::{Client, ClientId};
    use crate::database::test::{MemoryState, MockDatabase};
    use crate::message::MessageStatus;
    use crate::sending::{Filter, SendingId};

    fn open_sending(stop_in: ChronoDuration) -> Sending {
        let now = Utc::now();
        Sending {
            id: SendingId::new(),
            text: "Spring sale".into(),
            filter: Filter {
                tags: vec!["vip1".into()],
                codes: vec![911],
            },
            start_at: now - ChronoDuration::hours(1),
            stop_at: now + stop_in,
        }
    }

    fn seeded_state() -> (Arc<Mutex<MemoryState>>, Sending) {
        let sending = open_sending(ChronoDuration::hours(1));
        let state = MemoryState {
            clients: vec![Client {
                id: ClientId::new(),
                phone: 79000000001,
                op_code: 911,
                tag: "vip1".into(),
                tz: "UTC".into(),
            }],
            sendings: vec![sending.clone()],
            ..MemoryState::default()
        };

        (Arc::new(Mutex::new(state)), sending)
    }

    fn succeeding_transport() -> Arc<dyn Transport> {
        let mut transport = MockTransport::new();
        transport.on_send = Box::new(|_| Ok(()));
        Arc::new(transport)
    }

    fn statuses(state: &Arc<Mutex<MemoryState>>) -> Vec<MessageStatus> {
        state
            .lock()
            .unwrap()
            .messages
            .iter()
            .map(|m| m.status)
            .collect()
    }

    #[tokio::test]
    async fn submitted_sending_is_processed() {
        let (state, sending) = seeded_state();
        let (dispatcher, handle) = Dispatcher::new(
            Arc::new(MockDatabase::with_state(Arc::clone(&state))),
            succeeding_transport(),
            DispatcherConfig::default(),
        );
        let worker = dispatcher.spawn();

        handle.submit(sending).await.unwrap();
        drop(handle);
        worker.await.unwrap();

        assert_eq!(statuses(&state), vec![MessageStatus::Sent]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn dispatcher_runs_on_multi_thread_runtime() {
        let (state, sending) = seeded_state();
        let (dispatcher, handle) = Dispatcher::new(
            Arc::new(MockDatabase::with_state(Arc::clone(&state))),
            succeeding_transport(),
            DispatcherConfig {
                send_concurrency: 4,
                ..DispatcherConfig::default()
            },
        );
        let worker = dispatcher.spawn();

        handle.submit(sending).await.unwrap();
        drop(handle);
        worker.await.unwrap();

        assert_eq!(statuses(&state), vec![MessageStatus::Sent]);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_processes_active_sendings() {
        let (state, _) = seeded_state();
        let (dispatcher, handle) = Dispatcher::new(
            Arc::new(MockDatabase::with_state(Arc::clone(&state))),
            succeeding_transport(),
            DispatcherConfig::default(),
        );
        let worker = dispatcher.spawn();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(statuses(&state).is_empty());

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(statuses(&state), vec![MessageStatus::Sent]);

        handle.shutdown();
        worker.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn keeps_running_after_a_failed_sending() {
        let (state, sending) = seeded_state();
        let mut db = MockDatabase::with_state(Arc::clone(&state));

        let filters = Arc::new(AtomicUsize::new(0));
        let filters_clone = Arc::clone(&filters);
        let s = Arc::clone(&state);
        db.clients.on_filter_clients = Box::new(move |filter| {
            if filters_clone.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(Error::ExistentialState("clients unavailable".into()));
            }
            let state = s.lock().unwrap();
            Ok(state
                .clients
                .iter()
                .filter(|c| filter.matches(c))
                .cloned()
                .collect())
        });

        let (dispatcher, handle) =
            Dispatcher::new(Arc::new(db), succeeding_transport(), DispatcherConfig::default());
        let worker = dispatcher.spawn();

        handle.submit(sending.clone()).await.unwrap();
        handle.submit(sending).await.unwrap();
        drop(handle);
        worker.await.unwrap();

        assert_eq!(filters.load(Ordering::SeqCst), 2);
        assert_eq!(statuses(&state), vec![MessageStatus::Sent]);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_retries_failed_deliveries() {
        let (state, sending) = seeded_state();

        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_clone = Arc::clone(&attempts);
        let mut transport = MockTransport::new();
        transport.on_send = Box::new(move |message| {
            if attempts_clone.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(Error::TransportRejected {
                    message_id: message.id,
                    status: 503,
                });
            }
            Ok(())
        });

        let (dispatcher, handle) = Dispatcher::new(
            Arc::new(MockDatabase::with_state(Arc::clone(&state))),
            Arc::new(transport),
            DispatcherConfig::default(),
        );
        let worker = dispatcher.spawn();

        handle.submit(sending).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(statuses(&state), vec![MessageStatus::New]);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(statuses(&state), vec![MessageStatus::Sent]);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);

        handle.shutdown();
        worker.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_takes_priority_over_queued_sendings() {
        let (state, sending) = seeded_state();
        let mut transport = MockTransport::new();
        transport.on_send = Box::new(|_| panic!("message should not be sent"));
        let (dispatcher, handle) = Dispatcher::new(
            Arc::new(MockDatabase::with_state(Arc::clone(&state))),
            Arc::new(transport),
            DispatcherConfig::default(),
        );

        handle.submit(sending).await.unwrap();
        handle.shutdown();
        dispatcher.spawn().await.unwrap();

        assert!(statuses(&state).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_stops_between_sendings_after_shutdown() {
        let (state, first) = seeded_state();
        let second = open_sending(ChronoDuration::hours(2));
        state.lock().unwrap().sendings.push(second.clone());

        // shuts the dispatcher down from inside the first delivery
        let running: Arc<Mutex<Option<DispatcherHandle>>> = Arc::new(Mutex::new(None));
        let running_clone = Arc::clone(&running);
        let mut transport = MockTransport::new();
        transport.on_send = Box::new(move |_| {
            if let Some(handle) = running_clone.lock().unwrap().as_ref() {
                handle.shutdown();
            }
            Ok(())
        });

        let (dispatcher, handle) = Dispatcher::new(
            Arc::new(MockDatabase::with_state(Arc::clone(&state))),
            Arc::new(transport),
            DispatcherConfig::default(),
        );
        *running.lock().unwrap() = Some(handle.clone());
        let worker = dispatcher.spawn();

        tokio::time::sleep(Duration::from_secs(61)).await;
        worker.await.unwrap();

        let state = state.lock().unwrap();
        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.messages[0].sending_id, first.id);
        assert_eq!(state.messages[0].status, MessageStatus::Sent);
        assert!(state.find_message(second.id, state.clients[0].id).is_none());
    }

    #[tokio::test]
    async fn submit_fails_after_shutdown() {
        let (state, sending) = seeded_state();
        let (dispatcher, handle) = Dispatcher::new(
            Arc::new(MockDatabase::with_state(Arc::clone(&state))),
            succeeding_transport(),
            DispatcherConfig::default(),
        );
        let worker = dispatcher.spawn();

        handle.shutdown();
        worker.await.unwrap();

        assert_eq!(
            handle.submit(sending).await.unwrap_err(),
            Error::DispatcherStopped
        );
        assert!(statuses(&state).is_empty());
    }
}
