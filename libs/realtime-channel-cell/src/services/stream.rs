// libs/realtime-channel-cell/src/services/stream.rs
//! Fan-out of inbound events to subscribers, with delivery tracking.
//!
//! Every inbound event gets a sequence number. A subscriber counts an event as
//! handled once it asks for the next one (or drops its stream), which lets an
//! acknowledgment wait until every event that arrived before it was handled.

use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::models::{EventKind, InboundEvent};

/// Ordered stream of the inbound events a subscriber asked for.
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<(u64, InboundEvent)>,
    handled: watch::Sender<u64>,
    last: u64,
}

impl EventStream {
    /// Marks the previous event handled, then waits for the next one.
    pub async fn recv(&mut self) -> Option<InboundEvent> {
        self.mark_handled();
        let (seq, event) = self.rx.recv().await?;
        self.last = seq;
        Some(event)
    }

    fn mark_handled(&self) {
        let last = self.last;
        self.handled.send_if_modified(|handled| {
            if *handled < last {
                *handled = last;
                true
            } else {
                false
            }
        });
    }
}

struct Subscriber {
    kinds: Vec<EventKind>,
    tx: mpsc::UnboundedSender<(u64, InboundEvent)>,
    delivered: u64,
    handled: watch::Receiver<u64>,
}

#[derive(Default)]
pub(crate) struct SubscriberSet {
    next_seq: u64,
    entries: Vec<Subscriber>,
}

impl SubscriberSet {
    pub(crate) fn register(&mut self, kinds: &[EventKind]) -> EventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        let (handled_tx, handled_rx) = watch::channel(0);
        self.entries.push(Subscriber { kinds: kinds.to_vec(), tx, delivered: 0, handled: handled_rx });
        debug!("Registered subscriber for {:?}", kinds);
        EventStream { rx, handled: handled_tx, last: 0 }
    }

    pub(crate) fn deliver(&mut self, event: InboundEvent) {
        self.next_seq += 1;
        let seq = self.next_seq;
        let kind = event.kind();
        self.entries.retain_mut(|subscriber| {
            if !subscriber.kinds.contains(&kind) {
                return !subscriber.tx.is_closed();
            }
            if subscriber.tx.send((seq, event.clone())).is_err() {
                return false;
            }
            subscriber.delivered = seq;
            true
        });
    }

    /// Snapshot of what is delivered but not yet handled.
    pub(crate) fn barrier(&self) -> DeliveryBarrier {
        let outstanding = self
            .entries
            .iter()
            .filter(|s| !s.tx.is_closed() && *s.handled.borrow() < s.delivered)
            .map(|s| (s.delivered, s.handled.clone()))
            .collect();
        DeliveryBarrier { outstanding }
    }
}

pub(crate) struct DeliveryBarrier {
    outstanding: Vec<(u64, watch::Receiver<u64>)>,
}

impl DeliveryBarrier {
    pub(crate) fn is_clear(&self) -> bool {
        self.outstanding.is_empty()
    }

    /// Resolves once every snapshotted subscriber handled its events or went away.
    pub(crate) async fn wait(self) {
        for (delivered, mut handled) in self.outstanding {
            let _ = handled.wait_for(|h| *h >= delivered).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ParticipantPresencePayload, RequestReference};

    fn cancelled(id: &str) -> InboundEvent {
        InboundEvent::ConsultationRequestCancelled(RequestReference { request_id: id.to_string() })
    }

    #[tokio::test]
    async fn test_barrier_clears_once_subscriber_asks_for_next_event() {
        let mut set = SubscriberSet::default();
        let mut stream = set.register(&[EventKind::ConsultationRequestCancelled]);
        set.deliver(cancelled("req-1"));

        assert!(!set.barrier().is_clear());
        assert!(stream.recv().await.is_some());
        assert!(!set.barrier().is_clear());

        let barrier = set.barrier();
        let waiter = tokio::spawn(barrier.wait());
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        drop(stream);
        waiter.await.unwrap();
        assert!(set.barrier().is_clear());
    }

    #[tokio::test]
    async fn test_one_stream_keeps_order_across_kinds() {
        let mut set = SubscriberSet::default();
        let mut stream = set.register(&[EventKind::ParticipantJoined, EventKind::ConsultationRequestCancelled]);
        set.deliver(cancelled("req-1"));
        set.deliver(InboundEvent::ParticipantJoined(ParticipantPresencePayload {
            consultation_id: "c-1".to_string(),
            user_id: "p-1".to_string(),
            role: None,
        }));
        set.deliver(cancelled("req-2"));

        let kinds: Vec<EventKind> = [
            stream.recv().await.unwrap().kind(),
            stream.recv().await.unwrap().kind(),
            stream.recv().await.unwrap().kind(),
        ]
        .to_vec();
        assert_eq!(
            kinds,
            vec![
                EventKind::ConsultationRequestCancelled,
                EventKind::ParticipantJoined,
                EventKind::ConsultationRequestCancelled
            ]
        );
    }
}
