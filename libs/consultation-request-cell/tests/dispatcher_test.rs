use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};

use consultation_request_cell::*;
use realtime_channel_cell::testing::ScriptedChannel;
use realtime_channel_cell::{
    ConsultationRequestPayload, InboundEvent, PatientSummary, RealtimeChannel, RequestOutcomePayload,
    RequestReference,
};

const DOCTOR_ID: &str = "doctor-1";

fn request_event(request_id: &str) -> InboundEvent {
    InboundEvent::ConsultationRequest(ConsultationRequestPayload {
        request_id: request_id.to_string(),
        patient: PatientSummary { id: Some("patient-1".to_string()), name: "Ada Obi".to_string(), avatar: None },
        reason: Some("Rash".to_string()),
        symptoms: None,
        created_at: Utc::now(),
        expires_at: None,
    })
}

fn accepted_by(request_id: &str, doctor_id: Option<&str>) -> InboundEvent {
    InboundEvent::ConsultationAccepted(RequestOutcomePayload {
        request_id: request_id.to_string(),
        doctor_id: doctor_id.map(str::to_string),
        appointment_id: None,
    })
}

async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return;
        }
        tokio::time::sleep(StdDuration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

fn dispatcher() -> (Arc<NotificationCenter>, RequestEventDispatcher) {
    let center = Arc::new(NotificationCenter::new(Duration::seconds(60)));
    let dispatcher = RequestEventDispatcher::new(Arc::clone(&center), DOCTOR_ID);
    (center, dispatcher)
}

#[tokio::test]
async fn test_request_event_lands_in_store_with_default_window() {
    let (center, dispatcher) = dispatcher();
    dispatcher.handle(request_event("req-1")).await;

    let snapshot = center.snapshot().await;
    assert_eq!(snapshot.len(), 1);
    let request = snapshot[0].request.as_ref().unwrap();
    assert_eq!(request.expires_at - request.created_at, Duration::seconds(60));
    assert_eq!(snapshot[0].offer_state, Some(OfferState::Visible));
}

#[tokio::test]
async fn test_cancelled_event_removes_offer() {
    let (center, dispatcher) = dispatcher();
    dispatcher.handle(request_event("req-1")).await;
    dispatcher
        .handle(InboundEvent::ConsultationRequestCancelled(RequestReference { request_id: "req-1".to_string() }))
        .await;

    assert!(!center.contains_request("req-1").await);
    assert_eq!(center.offer_state("req-1").await, Some(OfferState::Cancelled));
}

#[tokio::test]
async fn test_accepted_by_other_doctor_removes_offer() {
    let (center, dispatcher) = dispatcher();
    dispatcher.handle(request_event("req-1")).await;
    dispatcher.handle(request_event("req-2")).await;

    dispatcher.handle(accepted_by("req-1", Some("doctor-2"))).await;
    dispatcher.handle(accepted_by("req-2", Some(DOCTOR_ID))).await;

    assert_eq!(center.offer_state("req-1").await, Some(OfferState::Lost));
    assert!(center.contains_request("req-2").await);
}

#[tokio::test]
async fn test_anonymous_accept_waits_for_in_flight_response() {
    let (center, dispatcher) = dispatcher();
    dispatcher.handle(request_event("req-1")).await;
    center.begin_resolution("req-1").await.unwrap();

    dispatcher.handle(accepted_by("req-1", None)).await;
    assert_eq!(center.offer_state("req-1").await, Some(OfferState::Resolving));
}

#[tokio::test]
async fn test_spawned_dispatcher_follows_channel_events() {
    let (center, dispatcher) = dispatcher();
    let channel = Arc::new(ScriptedChannel::new());
    let handle = dispatcher.spawn(channel.clone() as Arc<dyn RealtimeChannel>).await;

    channel.push(request_event("req-1"));
    channel.push(request_event("req-2"));
    eventually(|| {
        let center = Arc::clone(&center);
        async move { center.unread_count().await == 2 }
    })
    .await;

    channel.push(InboundEvent::ConsultationRequestCancelled(RequestReference { request_id: "req-1".to_string() }));
    eventually(|| {
        let center = Arc::clone(&center);
        async move { !center.contains_request("req-1").await }
    })
    .await;
    assert!(center.contains_request("req-2").await);

    handle.abort();
}

#[tokio::test]
async fn test_ticker_expires_offers_without_channel_activity() {
    let center = Arc::new(NotificationCenter::new(Duration::seconds(60)));
    let created_at = Utc::now() - Duration::seconds(59) - Duration::milliseconds(900);
    center
        .ingest_at(
            OfferUpdate::Offer(ConsultationRequest {
                request_id: "req-1".to_string(),
                patient_name: "Ada Obi".to_string(),
                patient_avatar: None,
                patient_id: None,
                reason: None,
                symptoms: None,
                created_at,
                expires_at: created_at + Duration::seconds(60),
            }),
            created_at,
        )
        .await;
    let mut signals = center.subscribe();

    let ticker = spawn_expiry_ticker(Arc::clone(&center), StdDuration::from_millis(50));
    let signal = tokio::time::timeout(StdDuration::from_secs(2), signals.recv())
        .await
        .unwrap()
        .unwrap();

    assert!(matches!(signal, NotificationSignal::Expired { ref request_id, .. } if request_id == "req-1"));
    ticker.abort();
}
