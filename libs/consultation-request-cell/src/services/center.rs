// libs/consultation-request-cell/src/services/center.rs
use chrono::{DateTime, Duration, Utc};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use realtime_channel_cell::ConsultationRequestPayload;
use shared_config::AppConfig;
use shared_models::toast::Toast;

use crate::error::OfferError;
use crate::models::{
    ConsultationRequest, Notification, NotificationSignal, OfferState, OfferUpdate, Settlement,
    StoreChange,
};
use crate::services::store::RequestNotificationStore;

const SIGNAL_CAPACITY: usize = 64;

/// The one notification store of a portal session, shared between the
/// realtime dispatcher, the expiry ticker, the resolution service and the HTTP
/// handlers. Every change is announced on a broadcast channel.
pub struct NotificationCenter {
    store: RwLock<RequestNotificationStore>,
    signals: broadcast::Sender<NotificationSignal>,
}

impl NotificationCenter {
    pub fn new(offer_window: Duration) -> Self {
        let (signals, _) = broadcast::channel(SIGNAL_CAPACITY);
        Self {
            store: RwLock::new(RequestNotificationStore::new(offer_window)),
            signals,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(Duration::seconds(config.offer_window_secs))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotificationSignal> {
        self.signals.subscribe()
    }

    fn announce(&self, signal: NotificationSignal) {
        // No receivers is normal before the UI attaches.
        let _ = self.signals.send(signal);
    }

    fn announce_removed(&self, removed: &Notification) {
        self.announce(NotificationSignal::Removed {
            notification_id: removed.id,
            request_id: removed.request_id().map(str::to_string),
            state: removed.offer_state,
        });
    }

    pub async fn ingest_payload(&self, payload: ConsultationRequestPayload) -> Result<StoreChange, OfferError> {
        let window = self.store.read().await.offer_window();
        let request = ConsultationRequest::from_payload(payload, window)?;
        Ok(self.ingest(OfferUpdate::Offer(request)).await)
    }

    pub async fn ingest(&self, update: OfferUpdate) -> StoreChange {
        self.ingest_at(update, Utc::now()).await
    }

    pub async fn ingest_at(&self, update: OfferUpdate, now: DateTime<Utc>) -> StoreChange {
        let change = self.store.write().await.add_or_update(update, now);
        match &change {
            StoreChange::Inserted(id) => {
                let request_id = self
                    .store
                    .read()
                    .await
                    .get(*id)
                    .and_then(|n| n.request_id().map(str::to_string));
                info!("Consultation request {:?} added", request_id);
                self.announce(NotificationSignal::Inserted { notification_id: *id, request_id });
            }
            StoreChange::Removed(removed) => {
                info!("Consultation request {:?} cancelled upstream", removed.request_id());
                self.announce_removed(removed);
            }
            StoreChange::Updated(id) => debug!("Notification {} refreshed by redelivery", id),
            StoreChange::Ignored { request_id, state } => {
                debug!("Ignored update for request {} ({:?})", request_id, state)
            }
        }
        change
    }

    pub async fn push(&self, notification: Notification) -> Uuid {
        let request_id = notification.request_id().map(str::to_string);
        let id = self.store.write().await.push(notification);
        self.announce(NotificationSignal::Inserted { notification_id: id, request_id });
        id
    }

    pub async fn tick(&self) -> Vec<Notification> {
        self.tick_at(Utc::now()).await
    }

    pub async fn tick_at(&self, now: DateTime<Utc>) -> Vec<Notification> {
        let expired = self.store.write().await.tick(now);
        for notification in &expired {
            if let Some(request_id) = notification.request_id() {
                info!("Consultation request {} expired", request_id);
                self.announce(NotificationSignal::Expired {
                    notification_id: notification.id,
                    request_id: request_id.to_string(),
                });
            }
        }
        expired
    }

    pub async fn resolve(&self, request_id: &str, state: OfferState) -> Option<Notification> {
        let removed = self.store.write().await.resolve(request_id, state, Utc::now());
        if let Some(removed) = &removed {
            self.announce_removed(removed);
        }
        removed
    }

    /// Evicts anything already expired, then claims the offer for a response.
    pub async fn begin_resolution(&self, request_id: &str) -> Result<ConsultationRequest, OfferError> {
        let now = Utc::now();
        self.tick_at(now).await;
        self.store.write().await.begin_resolution(request_id, now)
    }

    pub async fn abort_resolution(&self, request_id: &str) -> Option<OfferState> {
        self.store.write().await.abort_resolution(request_id)
    }

    pub async fn complete_resolution(&self, request_id: &str, state: OfferState) -> Settlement {
        let settlement = self
            .store
            .write()
            .await
            .complete_resolution(request_id, state, Utc::now());
        if let Settlement::Applied(removed) = &settlement {
            self.announce_removed(removed);
        }
        settlement
    }

    pub async fn mark_read(&self, id: Uuid) -> bool {
        self.store.write().await.mark_read(id)
    }

    pub async fn mark_all_read(&self) -> usize {
        self.store.write().await.mark_all_read()
    }

    pub async fn dismiss(&self, id: Uuid) -> Option<Notification> {
        let removed = self.store.write().await.dismiss(id, Utc::now());
        if let Some(removed) = &removed {
            self.announce_removed(removed);
        }
        removed
    }

    pub async fn clear_read(&self) -> usize {
        self.store.write().await.clear_read()
    }

    /// Panel view with countdowns computed for `now`; nothing is evicted.
    pub async fn snapshot(&self) -> Vec<Notification> {
        let now = Utc::now();
        self.store
            .read()
            .await
            .list_by_priority()
            .into_iter()
            .map(|mut n| {
                if let Some(request) = &n.request {
                    n.remaining_seconds = Some(request.remaining_seconds_at(now));
                }
                n
            })
            .collect()
    }

    pub async fn most_recent_unread(&self) -> Option<Notification> {
        self.store.read().await.most_recent_unread().cloned()
    }

    pub async fn unread_count(&self) -> usize {
        self.store.read().await.unread_count()
    }

    pub async fn offer_state(&self, request_id: &str) -> Option<OfferState> {
        self.store.read().await.offer_state(request_id)
    }

    pub async fn contains_request(&self, request_id: &str) -> bool {
        self.store.read().await.find_by_request(request_id).is_some()
    }
}

/// Informational toast for offers that disappear without the doctor acting.
pub fn toast_for(signal: &NotificationSignal) -> Option<Toast> {
    match signal {
        NotificationSignal::Expired { .. } => Some(Toast::info("A consultation request has expired.")),
        NotificationSignal::Removed { state: Some(OfferState::Cancelled), .. } => {
            Some(Toast::info("The patient cancelled their consultation request."))
        }
        NotificationSignal::Removed { state: Some(OfferState::Lost), .. } => {
            Some(Toast::info("This consultation request is no longer available."))
        }
        _ => None,
    }
}
