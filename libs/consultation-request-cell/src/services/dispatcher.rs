// libs/consultation-request-cell/src/services/dispatcher.rs
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use realtime_channel_cell::{EventKind, InboundEvent, RealtimeChannel};

use crate::models::{OfferState, OfferUpdate};
use crate::services::center::NotificationCenter;

/// Routes offer-related realtime events into the notification center.
pub struct RequestEventDispatcher {
    center: Arc<NotificationCenter>,
    doctor_id: String,
}

impl RequestEventDispatcher {
    pub fn new(center: Arc<NotificationCenter>, doctor_id: impl Into<String>) -> Self {
        Self { center, doctor_id: doctor_id.into() }
    }

    pub async fn handle(&self, event: InboundEvent) {
        match event {
            InboundEvent::ConsultationRequest(payload) => {
                let request_id = payload.request_id.clone();
                if let Err(e) = self.center.ingest_payload(payload).await {
                    warn!("Dropping consultation request {}: {}", request_id, e);
                }
            }
            InboundEvent::ConsultationRequestCancelled(reference) => {
                self.center
                    .ingest(OfferUpdate::Cancelled { request_id: reference.request_id })
                    .await;
            }
            InboundEvent::ConsultationAccepted(outcome) => match outcome.doctor_id.as_deref() {
                Some(winner) if winner == self.doctor_id => {
                    debug!("Own accept of {} echoed back", outcome.request_id);
                }
                Some(winner) => {
                    info!("Request {} taken by doctor {}", outcome.request_id, winner);
                    self.center.resolve(&outcome.request_id, OfferState::Lost).await;
                }
                None => {
                    // Our own response may still be in flight; its ack decides.
                    if self.center.offer_state(&outcome.request_id).await != Some(OfferState::Resolving) {
                        self.center.resolve(&outcome.request_id, OfferState::Lost).await;
                    }
                }
            },
            InboundEvent::ConsultationRejected(outcome) => {
                debug!("Request {} rejected by {:?}", outcome.request_id, outcome.doctor_id);
            }
            other => debug!("Request dispatcher ignoring {:?}", other.kind()),
        }
    }

    /// Subscribes to every offer event kind on one stream and handles events
    /// one at a time, in the order the server sent them.
    pub async fn spawn(self, channel: Arc<dyn RealtimeChannel>) -> JoinHandle<()> {
        let mut events = channel
            .subscribe_many(&[
                EventKind::ConsultationRequest,
                EventKind::ConsultationRequestCancelled,
                EventKind::ConsultationAccepted,
                EventKind::ConsultationRejected,
            ])
            .await;

        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                self.handle(event).await;
            }
            info!("Request event dispatcher stopped");
        })
    }
}
