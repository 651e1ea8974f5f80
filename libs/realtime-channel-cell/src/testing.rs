// libs/realtime-channel-cell/src/testing.rs
//! In-process stand-in for the coordination server, used by the tests of the
//! cells that sit on top of the realtime channel.

use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::{json, Value};
use tokio::sync::watch;

use crate::error::ChannelError;
use crate::models::{ConnectionStatus, EventKind, InboundEvent, OutboundEvent};
use crate::services::channel::RealtimeChannel;
use crate::services::stream::{EventStream, SubscriberSet};

type Responder =
    Arc<dyn Fn(&OutboundEvent) -> BoxFuture<'static, Result<Value, ChannelError>> + Send + Sync>;

/// Records every emitted event and answers it with a scripted acknowledgment.
/// Like the real client, an acknowledgment is only returned once the events
/// pushed before it have been handled.
pub struct ScriptedChannel {
    emitted: StdMutex<Vec<OutboundEvent>>,
    responder: StdMutex<Responder>,
    subscribers: StdMutex<SubscriberSet>,
    status: watch::Sender<ConnectionStatus>,
}

impl Default for ScriptedChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedChannel {
    /// Acknowledges everything with `{"success": true}`.
    pub fn new() -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Connected);
        Self {
            emitted: StdMutex::new(Vec::new()),
            responder: StdMutex::new(Arc::new(|_| Box::pin(async { Ok(json!({"success": true})) }))),
            subscribers: StdMutex::new(SubscriberSet::default()),
            status,
        }
    }

    pub fn respond_with<F>(&self, responder: F)
    where
        F: Fn(&OutboundEvent) -> BoxFuture<'static, Result<Value, ChannelError>> + Send + Sync + 'static,
    {
        *self.responder.lock().expect("responder lock") = Arc::new(responder);
    }

    pub fn ack_with(&self, payload: Value) {
        self.respond_with(move |_| {
            let payload = payload.clone();
            Box::pin(async move { Ok(payload) })
        });
    }

    pub fn fail_with(&self, error: ChannelError) {
        self.respond_with(move |_| {
            let error = error.clone();
            Box::pin(async move { Err(error) })
        });
    }

    /// Delivers an inbound event to current subscribers of its kind.
    pub fn push(&self, event: InboundEvent) {
        self.subscribers.lock().expect("subscribers lock").deliver(event);
    }

    pub fn set_status(&self, status: ConnectionStatus) {
        self.status.send_replace(status);
    }

    pub fn emitted(&self) -> Vec<OutboundEvent> {
        self.emitted.lock().expect("emitted lock").clone()
    }

    pub fn emitted_named(&self, name: &str) -> Vec<OutboundEvent> {
        self.emitted().into_iter().filter(|e| e.name() == name).collect()
    }
}

#[async_trait]
impl RealtimeChannel for ScriptedChannel {
    async fn emit(&self, event: OutboundEvent) -> Result<Value, ChannelError> {
        self.emitted.lock().expect("emitted lock").push(event.clone());
        if !self.status.borrow().is_connected() {
            return Err(ChannelError::Disconnected);
        }
        let responder = Arc::clone(&*self.responder.lock().expect("responder lock"));
        let ack = responder(&event).await;
        let barrier = self.subscribers.lock().expect("subscribers lock").barrier();
        barrier.wait().await;
        ack
    }

    async fn subscribe_many(&self, kinds: &[EventKind]) -> EventStream {
        self.subscribers.lock().expect("subscribers lock").register(kinds)
    }

    fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }
}
