// libs/consultation-request-cell/src/services/store.rs
use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::error::OfferError;
use crate::models::{
    ConsultationRequest, Notification, OfferState, OfferUpdate, Settlement, StoreChange,
};

/// Remembers how an offer ended so redeliveries and late acknowledgments
/// cannot bring it back. Kept for one offer window past expiry.
#[derive(Debug, Clone, Copy)]
struct Tombstone {
    state: OfferState,
    forget_after: DateTime<Utc>,
}

/// In-memory notification list for the signed-in doctor.
///
/// Entries are keyed by notification id and kept in insertion order. At most
/// one entry exists per `requestId`. Every operation takes `now` explicitly so
/// expiry is a pure function of time.
#[derive(Debug)]
pub struct RequestNotificationStore {
    entries: HashMap<Uuid, Notification>,
    order: Vec<Uuid>,
    by_request: HashMap<String, Uuid>,
    tombstones: HashMap<String, Tombstone>,
    offer_window: Duration,
}

impl Default for RequestNotificationStore {
    fn default() -> Self {
        Self::new(Duration::seconds(crate::models::DEFAULT_OFFER_WINDOW_SECS))
    }
}

impl RequestNotificationStore {
    pub fn new(offer_window: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
            by_request: HashMap::new(),
            tombstones: HashMap::new(),
            offer_window,
        }
    }

    pub fn offer_window(&self) -> Duration {
        self.offer_window
    }

    /// Inserts a new offer, refreshes a redelivered one in place, or removes
    /// the offer a cancellation refers to.
    pub fn add_or_update(&mut self, update: OfferUpdate, now: DateTime<Utc>) -> StoreChange {
        match update {
            OfferUpdate::Offer(request) => self.upsert_offer(request, now),
            OfferUpdate::Cancelled { request_id } => {
                match self.resolve(&request_id, OfferState::Cancelled, now) {
                    Some(removed) => StoreChange::Removed(removed),
                    None => {
                        let state = self.terminal_state(&request_id);
                        StoreChange::Ignored { request_id, state }
                    }
                }
            }
        }
    }

    fn upsert_offer(&mut self, request: ConsultationRequest, now: DateTime<Utc>) -> StoreChange {
        if let Some(state) = self.terminal_state(&request.request_id) {
            debug!("Ignoring redelivery of resolved request {}", request.request_id);
            return StoreChange::Ignored { request_id: request.request_id, state: Some(state) };
        }

        if let Some(id) = self.by_request.get(&request.request_id).copied() {
            if let Some(entry) = self.entries.get_mut(&id) {
                entry.refresh_offer(request, now);
                return StoreChange::Updated(id);
            }
        }

        if request.is_expired_at(now) {
            debug!("Dropping request {} delivered after expiry", request.request_id);
            let forget_after = request.expires_at.max(now) + self.offer_window;
            self.tombstone(&request.request_id, OfferState::Expired, forget_after);
            return StoreChange::Ignored {
                request_id: request.request_id,
                state: Some(OfferState::Expired),
            };
        }

        let notification = Notification::for_offer(request, now);
        let id = notification.id;
        if let Some(request_id) = notification.request_id() {
            self.by_request.insert(request_id.to_string(), id);
        }
        self.insert_entry(notification);
        StoreChange::Inserted(id)
    }

    /// Adds a non-offer notification.
    pub fn push(&mut self, notification: Notification) -> Uuid {
        let id = notification.id;
        if let Some(request_id) = notification.request_id() {
            self.by_request.insert(request_id.to_string(), id);
        }
        self.insert_entry(notification);
        id
    }

    fn insert_entry(&mut self, notification: Notification) {
        self.order.push(notification.id);
        self.entries.insert(notification.id, notification);
    }

    /// Recomputes countdowns and evicts every offer whose `expiresAt` has
    /// passed, including offers with a response in flight. Returns the evicted
    /// notifications in insertion order.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<Notification> {
        let mut expired = Vec::new();
        for id in &self.order {
            let Some(entry) = self.entries.get_mut(id) else { continue };
            let Some(request) = entry.request.as_ref() else { continue };
            if request.is_expired_at(now) {
                expired.push(request.request_id.clone());
            } else {
                entry.remaining_seconds = Some(request.remaining_seconds_at(now));
            }
        }

        let evicted = expired
            .iter()
            .filter_map(|request_id| self.resolve(request_id, OfferState::Expired, now))
            .collect();

        self.tombstones.retain(|_, t| t.forget_after > now);
        evicted
    }

    pub fn mark_read(&mut self, id: Uuid) -> bool {
        match self.entries.get_mut(&id) {
            Some(entry) => {
                entry.read = true;
                true
            }
            None => false,
        }
    }

    pub fn mark_all_read(&mut self) -> usize {
        let mut changed = 0;
        for entry in self.entries.values_mut().filter(|e| !e.read) {
            entry.read = true;
            changed += 1;
        }
        changed
    }

    /// Removes one entry. A dismissed offer stays dismissed even if the server
    /// redelivers it.
    pub fn dismiss(&mut self, id: Uuid, now: DateTime<Utc>) -> Option<Notification> {
        let request_id = self.entries.get(&id)?.request_id().map(str::to_string);
        match request_id {
            Some(request_id) => self.resolve(&request_id, OfferState::Dismissed, now),
            None => self.remove_entry(id),
        }
    }

    /// Drops read entries that are not live offers.
    pub fn clear_read(&mut self) -> usize {
        let stale: Vec<Uuid> = self
            .order
            .iter()
            .filter(|id| self.entries.get(id).is_some_and(|e| e.read && !e.is_offer()))
            .copied()
            .collect();
        for id in &stale {
            self.remove_entry(*id);
        }
        stale.len()
    }

    /// Removes the offer for `request_id` with terminal `state`. Returns the
    /// removed notification the first time only.
    pub fn resolve(&mut self, request_id: &str, state: OfferState, now: DateTime<Utc>) -> Option<Notification> {
        let Some(id) = self.by_request.get(request_id).copied() else {
            // Out-of-order cancellation: keep the offer from appearing later.
            if state == OfferState::Cancelled && !self.tombstones.contains_key(request_id) {
                self.tombstone(request_id, state, now + self.offer_window);
            }
            return None;
        };

        let mut removed = self.remove_entry(id)?;
        let forget_after = removed
            .request
            .as_ref()
            .map(|r| r.expires_at.max(now))
            .unwrap_or(now)
            + self.offer_window;
        self.tombstone(request_id, state, forget_after);
        removed.offer_state = Some(state);
        removed.remaining_seconds = Some(0);
        Some(removed)
    }

    /// Moves a visible offer into `Resolving`. Fails fast when the offer is
    /// already past its expiry, evicting it.
    pub fn begin_resolution(
        &mut self,
        request_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ConsultationRequest, OfferError> {
        let Some(id) = self.by_request.get(request_id).copied() else {
            return Err(match self.terminal_state(request_id) {
                Some(state) => state.as_offer_error(),
                None => OfferError::NotFound,
            });
        };

        let entry = self.entries.get_mut(&id).ok_or(OfferError::NotFound)?;
        let request = entry.request.clone().ok_or(OfferError::NotFound)?;

        if request.is_expired_at(now) {
            self.resolve(request_id, OfferState::Expired, now);
            return Err(OfferError::Expired);
        }

        match entry.offer_state {
            Some(OfferState::Resolving) => Err(OfferError::ResolutionInFlight),
            _ => {
                entry.offer_state = Some(OfferState::Resolving);
                entry.read = true;
                Ok(request)
            }
        }
    }

    /// Returns a `Resolving` offer to `Visible` after a retryable failure.
    /// Reports the terminal state if another path resolved it meanwhile.
    pub fn abort_resolution(&mut self, request_id: &str) -> Option<OfferState> {
        match self.by_request.get(request_id).and_then(|id| self.entries.get_mut(id)) {
            Some(entry) => {
                if entry.offer_state == Some(OfferState::Resolving) {
                    entry.offer_state = Some(OfferState::Visible);
                }
                None
            }
            None => self.terminal_state(request_id),
        }
    }

    /// Applies the server's verdict unless expiry or cancellation got there
    /// first.
    pub fn complete_resolution(&mut self, request_id: &str, state: OfferState, now: DateTime<Utc>) -> Settlement {
        match self.resolve(request_id, state, now) {
            Some(removed) => Settlement::Applied(removed),
            None => Settlement::Superseded(self.terminal_state(request_id).unwrap_or(OfferState::Cancelled)),
        }
    }

    fn remove_entry(&mut self, id: Uuid) -> Option<Notification> {
        let removed = self.entries.remove(&id)?;
        self.order.retain(|existing| *existing != id);
        if let Some(request_id) = removed.request_id() {
            self.by_request.remove(request_id);
        }
        Some(removed)
    }

    fn tombstone(&mut self, request_id: &str, state: OfferState, forget_after: DateTime<Utc>) {
        self.tombstones
            .insert(request_id.to_string(), Tombstone { state, forget_after });
    }

    pub fn terminal_state(&self, request_id: &str) -> Option<OfferState> {
        self.tombstones.get(request_id).map(|t| t.state)
    }

    pub fn offer_state(&self, request_id: &str) -> Option<OfferState> {
        self.by_request
            .get(request_id)
            .and_then(|id| self.entries.get(id))
            .and_then(|e| e.offer_state)
            .or_else(|| self.terminal_state(request_id))
    }

    pub fn get(&self, id: Uuid) -> Option<&Notification> {
        self.entries.get(&id)
    }

    pub fn find_by_request(&self, request_id: &str) -> Option<&Notification> {
        self.by_request.get(request_id).and_then(|id| self.entries.get(id))
    }

    /// Insertion order.
    pub fn list(&self) -> Vec<Notification> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id))
            .cloned()
            .collect()
    }

    /// Unread first, newest first within each group.
    pub fn list_by_priority(&self) -> Vec<Notification> {
        let mut items: Vec<(usize, Notification)> = self.list().into_iter().enumerate().collect();
        items.sort_by(|(ia, a), (ib, b)| a.read.cmp(&b.read).then(ib.cmp(ia)));
        items.into_iter().map(|(_, n)| n).collect()
    }

    pub fn most_recent_unread(&self) -> Option<&Notification> {
        self.order
            .iter()
            .rev()
            .filter_map(|id| self.entries.get(id))
            .find(|e| !e.read)
    }

    pub fn unread_count(&self) -> usize {
        self.entries.values().filter(|e| !e.read).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
