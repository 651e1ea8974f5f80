// libs/realtime-channel-cell/src/services/client.rs
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, timeout, MissedTickBehavior};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        client::IntoClientRequest,
        http::{header::AUTHORIZATION, HeaderValue},
        Message,
    },
};
use tracing::{debug, error, info, instrument, warn};

use crate::error::ChannelError;
use crate::models::{
    decode_inbound, encode_outbound, ChannelConfig, ConnectionStatus, EventKind, InboundEvent,
    InboundFrame, OutboundEvent,
};
use crate::services::channel::RealtimeChannel;
use crate::services::stream::{EventStream, SubscriberSet};

/// Session-scoped WebSocket client for the coordination server.
///
/// A single supervisor task owns the socket. It reconnects with exponential
/// backoff and fails every in-flight acknowledgment when the socket drops.
/// Clones share the same connection.
#[derive(Clone)]
pub struct RealtimeChannelClient {
    config: ChannelConfig,
    inner: Arc<ChannelInner>,
}

struct ChannelInner {
    status_tx: watch::Sender<ConnectionStatus>,
    subscribers: RwLock<SubscriberSet>,
    pending_acks: Mutex<HashMap<u64, oneshot::Sender<Value>>>,
    outbound: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    next_ack_id: AtomicU64,
    started: AtomicBool,
    shutdown_tx: broadcast::Sender<()>,
}

enum SessionEnd {
    Shutdown,
    Dropped(String),
}

impl RealtimeChannelClient {
    pub fn new(config: ChannelConfig) -> Self {
        let (status_tx, _) = watch::channel(ConnectionStatus::Disconnected);
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            inner: Arc::new(ChannelInner {
                status_tx,
                subscribers: RwLock::new(SubscriberSet::default()),
                pending_acks: Mutex::new(HashMap::new()),
                outbound: Mutex::new(None),
                next_ack_id: AtomicU64::new(1),
                started: AtomicBool::new(false),
                shutdown_tx,
            }),
        }
    }

    /// Starts the connection supervisor on first call and waits until the
    /// socket is up. Later calls reuse the live connection.
    ///
    /// On timeout the status becomes `Offline`; the supervisor keeps retrying
    /// in the background.
    #[instrument(skip(self), fields(url = %self.config.url))]
    pub async fn connect(&self) -> Result<(), ChannelError> {
        if self.config.url.is_empty() {
            return Err(ChannelError::NotConfigured);
        }

        if !self.inner.started.swap(true, Ordering::SeqCst) {
            let inner = Arc::clone(&self.inner);
            let config = self.config.clone();
            tokio::spawn(async move { run_supervisor(inner, config).await });
        }

        self.wait_until_connected().await
    }

    async fn wait_until_connected(&self) -> Result<(), ChannelError> {
        let mut status_rx = self.inner.status_tx.subscribe();
        let waited = timeout(self.config.connect_timeout, async {
            status_rx.wait_for(|s| s.is_connected()).await.map(|_| ())
        })
        .await;

        match waited {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(ChannelError::Disconnected),
            Err(_) => {
                self.inner.status_tx.send_if_modified(|status| {
                    if status.is_connected() {
                        false
                    } else {
                        *status = ConnectionStatus::Offline;
                        true
                    }
                });
                warn!("Realtime server unreachable, portal is offline");
                Err(ChannelError::ConnectTimeout {
                    timeout_seconds: self.config.connect_timeout.as_secs(),
                })
            }
        }
    }

    /// Registers `handler` for every inbound event of `kind`. The handler runs
    /// on its own task, one event at a time, in arrival order.
    pub async fn on<F>(&self, kind: EventKind, mut handler: F) -> JoinHandle<()>
    where
        F: FnMut(InboundEvent) + Send + 'static,
    {
        let mut events = self.register(&[kind]).await;
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                handler(event);
            }
        })
    }

    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.status_tx.subscribe()
    }

    pub fn shutdown(&self) {
        let _ = self.inner.shutdown_tx.send(());
    }

    async fn register(&self, kinds: &[EventKind]) -> EventStream {
        self.inner.subscribers.write().await.register(kinds)
    }

    async fn emit_with_ack(&self, event: OutboundEvent) -> Result<Value, ChannelError> {
        let sender = self
            .inner
            .outbound
            .lock()
            .await
            .clone()
            .ok_or(ChannelError::Disconnected)?;

        let ack_id = self.inner.next_ack_id.fetch_add(1, Ordering::SeqCst);
        let frame = encode_outbound(ack_id, &event)?;

        let (ack_tx, ack_rx) = oneshot::channel();
        self.inner.pending_acks.lock().await.insert(ack_id, ack_tx);

        if sender.send(Message::Text(frame)).is_err() {
            self.inner.pending_acks.lock().await.remove(&ack_id);
            return Err(ChannelError::Disconnected);
        }
        debug!("Emitted {} (ack {})", event.name(), ack_id);

        match timeout(self.config.ack_timeout, ack_rx).await {
            Ok(Ok(payload)) => Ok(payload),
            Ok(Err(_)) => Err(ChannelError::Disconnected),
            Err(_) => {
                self.inner.pending_acks.lock().await.remove(&ack_id);
                warn!("No acknowledgment for {} (ack {})", event.name(), ack_id);
                Err(ChannelError::AckTimeout {
                    timeout_seconds: self.config.ack_timeout.as_secs(),
                })
            }
        }
    }
}

#[async_trait]
impl RealtimeChannel for RealtimeChannelClient {
    async fn emit(&self, event: OutboundEvent) -> Result<Value, ChannelError> {
        self.emit_with_ack(event).await
    }

    async fn subscribe_many(&self, kinds: &[EventKind]) -> EventStream {
        self.register(kinds).await
    }

    fn status(&self) -> ConnectionStatus {
        *self.inner.status_tx.borrow()
    }
}

impl ChannelInner {
    /// `Offline` is sticky until a connection actually succeeds.
    fn set_status(&self, next: ConnectionStatus) {
        self.status_tx.send_if_modified(|status| {
            if *status == next || (*status == ConnectionStatus::Offline && !next.is_connected()) {
                return false;
            }
            *status = next;
            true
        });
    }

    async fn handle_text(&self, text: &str) {
        match decode_inbound(text) {
            Ok(InboundFrame::Ack { ack_id, payload }) => {
                let Some(waiter) = self.pending_acks.lock().await.remove(&ack_id) else {
                    debug!("Dropping late acknowledgment {}", ack_id);
                    return;
                };
                let barrier = self.subscribers.read().await.barrier();
                if barrier.is_clear() {
                    let _ = waiter.send(payload);
                } else {
                    debug!("Holding acknowledgment {} until earlier events are handled", ack_id);
                    tokio::spawn(async move {
                        barrier.wait().await;
                        let _ = waiter.send(payload);
                    });
                }
            }
            Ok(InboundFrame::Event(event)) => self.dispatch(event).await,
            Ok(InboundFrame::Unknown(frame_type)) => {
                debug!("Ignoring unsupported realtime event: {}", frame_type);
            }
            Err(e) => warn!("Malformed realtime frame: {}", e),
        }
    }

    async fn dispatch(&self, event: InboundEvent) {
        self.subscribers.write().await.deliver(event);
    }

    async fn fail_pending_acks(&self) {
        let mut pending = self.pending_acks.lock().await;
        if !pending.is_empty() {
            warn!("Failing {} in-flight acknowledgments after disconnect", pending.len());
        }
        pending.clear();
    }
}

async fn run_supervisor(inner: Arc<ChannelInner>, config: ChannelConfig) {
    let mut attempt = 0u32;
    let mut shutdown_rx = inner.shutdown_tx.subscribe();

    loop {
        inner.set_status(if attempt == 0 {
            ConnectionStatus::Connecting
        } else {
            ConnectionStatus::Reconnecting { attempt }
        });

        match connect_and_listen(&inner, &config, &mut shutdown_rx).await {
            Ok(SessionEnd::Shutdown) => {
                info!("Realtime channel shut down");
                break;
            }
            Ok(SessionEnd::Dropped(reason)) => {
                warn!("Realtime connection dropped: {}", reason);
                attempt = 1;
            }
            Err(e) => {
                error!("Realtime connection error: {}", e);
                attempt = attempt.saturating_add(1);
            }
        }

        *inner.outbound.lock().await = None;
        inner.fail_pending_acks().await;
        inner.set_status(ConnectionStatus::Reconnecting { attempt });

        let delay = config.backoff_delay(attempt);
        info!("Reconnecting in {:?} (attempt {})", delay, attempt);

        tokio::select! {
            _ = sleep(delay) => {}
            _ = shutdown_rx.recv() => {
                info!("Shutdown received during reconnect wait");
                break;
            }
        }
    }

    *inner.outbound.lock().await = None;
    inner.fail_pending_acks().await;
    inner.status_tx.send_replace(ConnectionStatus::Disconnected);
}

async fn connect_and_listen(
    inner: &ChannelInner,
    config: &ChannelConfig,
    shutdown_rx: &mut broadcast::Receiver<()>,
) -> Result<SessionEnd, ChannelError> {
    let mut request = config.url.as_str().into_client_request()?;
    if let Some(token) = &config.access_token {
        let value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| ChannelError::Transport(e.to_string()))?;
        request.headers_mut().insert(AUTHORIZATION, value);
    }

    let (ws_stream, _) = timeout(config.connect_timeout, connect_async(request))
        .await
        .map_err(|_| ChannelError::ConnectTimeout {
            timeout_seconds: config.connect_timeout.as_secs(),
        })??;

    let (mut write, mut read) = ws_stream.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();
    *inner.outbound.lock().await = Some(out_tx);
    inner.status_tx.send_replace(ConnectionStatus::Connected);
    info!("Connected to realtime server");

    let mut ping = interval(config.ping_interval);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ping.tick().await;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                let _ = write.close().await;
                return Ok(SessionEnd::Shutdown);
            }

            Some(frame) = out_rx.recv() => {
                if let Err(e) = write.send(frame).await {
                    return Ok(SessionEnd::Dropped(format!("send failed: {}", e)));
                }
            }

            _ = ping.tick() => {
                if let Err(e) = write.send(Message::Ping(Vec::new())).await {
                    return Ok(SessionEnd::Dropped(format!("ping failed: {}", e)));
                }
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => inner.handle_text(&text).await,
                    Some(Ok(Message::Close(_))) => {
                        return Ok(SessionEnd::Dropped("closed by server".to_string()));
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Ok(SessionEnd::Dropped(e.to_string())),
                    None => return Ok(SessionEnd::Dropped("stream ended".to_string())),
                }
            }
        }
    }
}
