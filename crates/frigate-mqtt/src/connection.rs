//! Managed broker connection.
//!
//! Wraps a rumqttc `AsyncClient` and owns its `EventLoop` in a background
//! task. The task reconnects after errors, re-issues every recorded
//! subscription on each CONNACK and forwards incoming publishes, in
//! delivery order, to an `mpsc` channel consumed by the router.
//!
//! Control operations (`start`, `stop`, `subscribe_many`) are serialized
//! through a mutex around the session slot; the event loop itself is only
//! ever touched by its task. That task is also the only sender of SUBSCRIBE
//! requests: `subscribe_many` records filters and wakes it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS, SubscribeFilter};
use tokio::sync::{Mutex, Notify, mpsc, watch};
use tokio::task::JoinHandle;

use crate::channel::Channel;
use crate::config::MqttConfig;
use crate::credentials::Credentials;
use crate::error::{MqttError, MqttResult};
use crate::message::InboundMessage;

/// Capacity of the rumqttc request channel (publish/subscribe/disconnect).
const REQUEST_CAPACITY: usize = 64;

/// Observable state of the managed connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Never started.
    Idle,
    /// Started, first CONNACK not yet received.
    Connecting,
    Connected,
    /// Last attempt failed; the event loop will retry.
    Disconnected(String),
    Stopped,
}

struct Session {
    client: AsyncClient,
    shutdown: watch::Sender<bool>,
    flush: Arc<Notify>,
    task: JoinHandle<()>,
}

/// A filter to keep subscribed across reconnects.
#[derive(Debug, Clone, PartialEq)]
struct RecordedFilter {
    filter: String,
    qos: QoS,
    /// Sent on the current link.
    issued: bool,
}

type RecordedFilters = Arc<Mutex<Vec<RecordedFilter>>>;

/// Upsert `filters`. New filters, and known ones whose QoS changed, become
/// pending.
fn record(recorded: &mut Vec<RecordedFilter>, filters: &[&str], qos: QoS) {
    for filter in filters {
        match recorded.iter_mut().find(|r| r.filter == *filter) {
            Some(entry) if entry.qos == qos => {}
            Some(entry) => {
                entry.qos = qos;
                entry.issued = false;
            }
            None => recorded.push(RecordedFilter {
                filter: filter.to_string(),
                qos,
                issued: false,
            }),
        }
    }
}

/// Mark filters as issued and return them. `all` re-issues everything,
/// as needed after a fresh CONNACK.
fn take_pending(recorded: &mut [RecordedFilter], all: bool) -> Vec<(String, QoS)> {
    recorded
        .iter_mut()
        .filter(|r| all || !r.issued)
        .map(|r| {
            r.issued = true;
            (r.filter.clone(), r.qos)
        })
        .collect()
}

/// Owns the managed connection for the lifetime of the process.
pub struct ConnectionManager {
    config: MqttConfig,
    credentials: Credentials,
    inbound: mpsc::Sender<InboundMessage>,
    state: Arc<watch::Sender<ConnectionState>>,
    subscriptions: RecordedFilters,
    session: Mutex<Option<Session>>,
}

impl ConnectionManager {
    /// Create a stopped manager.
    ///
    /// Returns `(manager, inbound)`. Every message the broker delivers is
    /// sent on `inbound`; the stream ends once the manager is dropped.
    pub fn new(
        config: MqttConfig,
        credentials: Credentials,
    ) -> (Self, mpsc::Receiver<InboundMessage>) {
        let (inbound, rx) = mpsc::channel(config.inbound_capacity.max(1));
        let (state, _) = watch::channel(ConnectionState::Idle);

        (
            Self {
                config,
                credentials,
                inbound,
                state: Arc::new(state),
                subscriptions: Arc::new(Mutex::new(Vec::new())),
                session: Mutex::new(None),
            },
            rx,
        )
    }

    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        matches!(*self.state.borrow(), ConnectionState::Connected)
    }

    /// Watch state transitions.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Filters re-issued on every reconnect.
    pub async fn recorded_subscriptions(&self) -> Vec<String> {
        self.subscriptions
            .lock()
            .await
            .iter()
            .map(|r| r.filter.clone())
            .collect()
    }

    /// Build rumqttc options from the config and credentials.
    pub fn mqtt_options(&self) -> MqttResult<MqttOptions> {
        self.config.validate()?;

        let mut options = MqttOptions::new(
            &self.config.client_id,
            &self.config.broker_host,
            self.config.broker_port,
        );
        options.set_keep_alive(self.config.keepalive());

        if self.credentials.is_empty() {
            tracing::warn!("no MQTT credentials resolved, connecting without authentication");
        } else {
            options.set_credentials(
                self.credentials.username.clone(),
                self.credentials.secret_lossy(),
            );
        }

        Ok(options)
    }

    /// Start the managed connection.
    ///
    /// Spawns the event loop task and waits up to `connect_timeout` for the
    /// first attempt. An `Err` means that attempt failed; the task keeps
    /// retrying in the background either way. Calling `start` while already
    /// running does nothing.
    pub async fn start(&self) -> MqttResult<()> {
        let mut slot = self.session.lock().await;
        if slot.is_some() {
            tracing::debug!("start requested but connection already running");
            return Ok(());
        }

        let options = self.mqtt_options()?;
        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let flush = Arc::new(Notify::new());

        self.state.send_replace(ConnectionState::Connecting);
        let mut state_rx = self.state.subscribe();

        let driver = EventLoopDriver {
            client: client.clone(),
            inbound: self.inbound.clone(),
            state: self.state.clone(),
            subscriptions: self.subscriptions.clone(),
            shutdown: shutdown_rx,
            flush: flush.clone(),
            reconnect_delay: self.config.reconnect_delay(),
        };
        let task = tokio::spawn(driver.run(eventloop));

        *slot = Some(Session {
            client,
            shutdown: shutdown_tx,
            flush,
            task,
        });
        drop(slot);

        tracing::info!(
            host = %self.config.broker_host,
            port = self.config.broker_port,
            client_id = %self.config.client_id,
            "managed MQTT connection started"
        );

        let timeout = self.config.connect_timeout();
        let first = tokio::time::timeout(timeout, async {
            state_rx
                .wait_for(|s| !matches!(s, ConnectionState::Connecting))
                .await
                .map(|s| (*s).clone())
        })
        .await;

        match first {
            Ok(Ok(ConnectionState::Connected)) => Ok(()),
            Ok(Ok(ConnectionState::Disconnected(reason))) => Err(MqttError::Connection(reason)),
            Ok(Ok(other)) => Err(MqttError::Connection(format!(
                "connection ended before connecting ({other:?})"
            ))),
            Ok(Err(_)) => Err(MqttError::Connection("state channel closed".into())),
            Err(_) => Err(MqttError::Connection(format!(
                "no CONNACK within {}s",
                timeout.as_secs()
            ))),
        }
    }

    /// Stop the managed connection.
    ///
    /// Sends DISCONNECT when connected, then waits up to `shutdown_timeout`
    /// for the event loop task before aborting it. Safe to call before
    /// `start` and any number of times.
    pub async fn stop(&self) {
        let session = self.session.lock().await.take();
        let Some(session) = session else {
            tracing::debug!("stop requested but connection not running");
            self.state.send_replace(ConnectionState::Stopped);
            return;
        };

        if self.is_connected() {
            if let Err(e) = session.client.try_disconnect() {
                tracing::warn!(error = %e, "failed to queue MQTT disconnect");
            }
        }
        // The task may already be gone.
        let _ = session.shutdown.send(true);

        let mut task = session.task;
        match tokio::time::timeout(self.config.shutdown_timeout(), &mut task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "MQTT event loop task ended abnormally"),
            Err(_) => {
                tracing::warn!("MQTT event loop did not stop in time, aborting");
                task.abort();
            }
        }

        self.state.send_replace(ConnectionState::Stopped);
        tracing::info!("MQTT client stopped");
    }
}

#[async_trait]
impl Channel for ConnectionManager {
    /// Record `filters` and hand them to the event loop.
    ///
    /// The event loop issues pending filters right away when connected and
    /// every recorded filter on each CONNACK, so a filter is sent at most
    /// once per link. `Ok` means recorded, not acknowledged by the broker.
    async fn subscribe_many(&self, filters: &[&str], qos: QoS) -> MqttResult<()> {
        if filters.is_empty() {
            return Ok(());
        }
        if filters.iter().any(|f| f.is_empty()) {
            return Err(MqttError::Subscribe("empty topic filter".into()));
        }

        let slot = self.session.lock().await;
        let Some(session) = slot.as_ref() else {
            return Err(MqttError::NotRunning);
        };

        record(&mut *self.subscriptions.lock().await, filters, qos);
        if !self.is_connected() {
            tracing::debug!(?filters, "not connected yet, subscribing on connect");
        }
        session.flush.notify_one();
        Ok(())
    }
}

/// Background task owning the rumqttc event loop.
struct EventLoopDriver {
    client: AsyncClient,
    inbound: mpsc::Sender<InboundMessage>,
    state: Arc<watch::Sender<ConnectionState>>,
    subscriptions: RecordedFilters,
    shutdown: watch::Receiver<bool>,
    flush: Arc<Notify>,
    reconnect_delay: Duration,
}

impl EventLoopDriver {
    async fn run(mut self, mut eventloop: EventLoop) {
        let mut connected = false;

        loop {
            // Once connected, keep polling so the DISCONNECT gets flushed.
            if !connected && self.shutdown_requested() {
                break;
            }

            tokio::select! {
                _ = self.shutdown.changed(), if !connected => {
                    break;
                }
                () = self.flush.notified() => {
                    // Pending filters stay pending until the next CONNACK.
                    if connected {
                        self.issue(false).await;
                    }
                }
                polled = eventloop.poll() => match polled {
                    Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                        connected = true;
                        self.state.send_replace(ConnectionState::Connected);
                        tracing::info!(session_present = ack.session_present, "connected to MQTT broker");
                        self.issue(true).await;
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let msg = InboundMessage::from_publish(&publish);
                        if self.inbound.send(msg).await.is_err() {
                            tracing::debug!(topic = %publish.topic, "inbound receiver dropped, discarding message");
                        }
                    }
                    Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                        tracing::debug!("DISCONNECT sent");
                        break;
                    }
                    Ok(_) => {} // SubAck, PingResp, etc.
                    Err(e) => {
                        connected = false;
                        self.state.send_replace(ConnectionState::Disconnected(e.to_string()));
                        if self.shutdown_requested() {
                            break;
                        }
                        tracing::error!(
                            error = %e,
                            retry_in_secs = self.reconnect_delay.as_secs(),
                            "MQTT event loop error, reconnecting"
                        );
                        tokio::select! {
                            () = tokio::time::sleep(self.reconnect_delay) => {}
                            _ = self.shutdown.changed() => break,
                        }
                    }
                }
            }
        }

        tracing::debug!("MQTT event loop task finished");
    }

    fn shutdown_requested(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Send pending filters, or all of them after a (re)connect.
    async fn issue(&self, all: bool) {
        let mut recorded = self.subscriptions.lock().await;
        let filters = take_pending(&mut recorded, all);
        if filters.is_empty() {
            return;
        }

        let count = filters.len();
        let request = filters
            .into_iter()
            .map(|(filter, qos)| SubscribeFilter::new(filter, qos));
        // try_ variant: awaiting here could deadlock against our own poll loop.
        match self.client.try_subscribe_many(request) {
            Ok(()) => tracing::info!(count, reconnect = all, "subscriptions issued"),
            Err(e) => {
                // Left pending for the next CONNACK.
                for entry in recorded.iter_mut() {
                    entry.issued = false;
                }
                tracing::error!(error = %e, "failed to issue subscriptions");
            }
        }
    }
}
