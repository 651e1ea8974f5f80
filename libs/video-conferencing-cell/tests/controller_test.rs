use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use tokio::time::timeout;
use tokio_test::assert_ok;

use video_conferencing_cell::testing::{local_participant, remote_participant, FakeProvider};
use video_conferencing_cell::*;

fn room() -> RoomDescriptor {
    RoomDescriptor { room_url: "https://media.example.com/room-1".to_string(), token: Some("tok".to_string()) }
}

fn controller() -> (Arc<FakeProvider>, MediaSessionController) {
    let provider = Arc::new(FakeProvider::new());
    let controller = MediaSessionController::new(provider.clone());
    (provider, controller)
}

async fn wait_for_state(controller: &MediaSessionController, check: impl FnMut(&MediaState) -> bool) -> MediaState {
    let mut rx = controller.watch();
    let state = timeout(Duration::from_secs(2), rx.wait_for(check))
        .await
        .expect("state change within timeout")
        .expect("controller alive")
        .clone();
    state
}

#[tokio::test]
async fn test_join_connects_and_reports_local_devices() {
    let (provider, controller) = controller();

    assert_ok!(controller.join(&room()).await);

    let state = controller.state();
    assert_eq!(state.phase, MediaPhase::Connected);
    assert!(state.is_connected && !state.is_connecting);
    assert_eq!(state.local_participant_id.as_deref(), Some("local-1"));
    assert!(state.is_mic_on && state.is_camera_on && !state.is_screen_sharing);
    assert_eq!(provider.created_count(), 1);
}

#[tokio::test]
async fn test_missing_room_is_rejected() {
    let (provider, controller) = controller();
    let empty = RoomDescriptor { room_url: " ".to_string(), token: None };

    assert_matches!(controller.join(&empty).await, Err(MediaError::MissingRoom));
    assert_eq!(provider.created_count(), 0);
    assert_eq!(controller.state().phase, MediaPhase::Idle);
}

#[tokio::test]
async fn test_join_while_connected_is_noop() {
    let (provider, controller) = controller();

    assert_ok!(controller.join(&room()).await);
    assert_ok!(controller.join(&room()).await);

    assert_eq!(provider.created_count(), 1);
    assert_eq!(provider.last_call().unwrap().join_count(), 1);
}

#[tokio::test]
async fn test_join_while_connecting_is_noop() {
    let (provider, controller) = controller();
    let controller = Arc::new(controller);
    let gate = provider.hold_joins();

    let first = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.join(&room()).await }
    });
    wait_for_state(&controller, |s| s.is_connecting).await;

    assert_ok!(controller.join(&room()).await);
    assert_eq!(provider.created_count(), 1);

    gate.notify_one();
    first.await.unwrap().unwrap();
    assert_eq!(provider.last_call().unwrap().join_count(), 1);
    assert!(controller.state().is_connected);
}

#[tokio::test]
async fn test_join_failure_surfaces_error_and_allows_manual_retry() {
    let (provider, controller) = controller();
    provider.fail_joins_with("room full");
    let mut signals = controller.signals();

    let result = controller.join(&room()).await;

    assert_matches!(result, Err(MediaError::JoinFailed { ref message }) if message == "room full");
    let state = controller.state();
    assert_eq!(state.phase, MediaPhase::Idle);
    assert_matches!(state.error, Some(MediaError::JoinFailed { .. }));
    assert_matches!(signals.recv().await, Ok(MediaSignal::Failed(MediaError::JoinFailed { .. })));

    provider.succeed_joins();
    assert_ok!(controller.join(&room()).await);
    assert!(controller.state().is_connected);
    assert_eq!(provider.created_count(), 1);
    assert_eq!(provider.last_call().unwrap().join_count(), 2);
}

#[tokio::test]
async fn test_toggle_waits_for_provider_report() {
    let (provider, controller) = controller();
    assert_ok!(controller.join(&room()).await);
    let call = provider.last_call().unwrap();

    assert_ok!(controller.toggle_mic().await);

    assert!(call.commands().contains(&MediaCommand::SetLocalAudio { enabled: false }));
    assert!(controller.state().is_mic_on);

    let mut muted = local_participant();
    muted.audio = false;
    call.emit(ProviderEvent::ParticipantUpdated { participant: muted });

    let state = wait_for_state(&controller, |s| !s.is_mic_on).await;
    assert!(state.is_camera_on);
}

#[tokio::test]
async fn test_screen_share_toggle_follows_reported_state() {
    let (provider, controller) = controller();
    assert_ok!(controller.join(&room()).await);
    let call = provider.last_call().unwrap();

    assert_ok!(controller.toggle_screen_share().await);
    let mut sharing = local_participant();
    sharing.screen = true;
    call.emit(ProviderEvent::ParticipantUpdated { participant: sharing });
    wait_for_state(&controller, |s| s.is_screen_sharing).await;

    assert_ok!(controller.toggle_screen_share().await);
    assert_eq!(
        &call.commands()[1..],
        &[MediaCommand::StartScreenShare, MediaCommand::StopScreenShare]
    );
}

#[tokio::test]
async fn test_toggles_require_connection() {
    let (_, controller) = controller();
    assert_matches!(controller.toggle_mic().await, Err(MediaError::NotConnected));
    assert_matches!(controller.toggle_camera().await, Err(MediaError::NotConnected));
}

#[tokio::test]
async fn test_remote_participant_tracking() {
    let (provider, controller) = controller();
    assert_ok!(controller.join(&room()).await);
    let mut signals = controller.signals();
    let call = provider.last_call().unwrap();

    call.emit(ProviderEvent::ParticipantJoined { participant: remote_participant("p-2") });
    assert_matches!(
        signals.recv().await,
        Ok(MediaSignal::RemoteJoined { ref session_id, .. }) if session_id == "p-2"
    );
    let state = wait_for_state(&controller, |s| s.remote_participant_id.is_some()).await;
    assert_eq!(state.remote_participant_id.as_deref(), Some("p-2"));

    call.emit(ProviderEvent::ParticipantLeft { session_id: "p-2".to_string() });
    assert_matches!(signals.recv().await, Ok(MediaSignal::RemoteLeft { .. }));
    wait_for_state(&controller, |s| s.remote_participant_id.is_none()).await;
}

#[tokio::test]
async fn test_remote_left_only_when_last_remote_goes() {
    let (provider, controller) = controller();
    assert_ok!(controller.join(&room()).await);
    let mut signals = controller.signals();
    let call = provider.last_call().unwrap();

    call.emit(ProviderEvent::Joined { local: local_participant() });
    call.emit(ProviderEvent::ParticipantJoined { participant: remote_participant("p-2") });
    call.emit(ProviderEvent::ParticipantJoined { participant: remote_participant("p-3") });
    assert_matches!(signals.recv().await, Ok(MediaSignal::RemoteJoined { .. }));
    assert_matches!(signals.recv().await, Ok(MediaSignal::RemoteJoined { .. }));

    call.emit(ProviderEvent::ParticipantLeft { session_id: "p-2".to_string() });
    call.emit(ProviderEvent::ParticipantLeft { session_id: "local-1".to_string() });
    call.emit(ProviderEvent::ParticipantLeft { session_id: "p-3".to_string() });

    assert_matches!(
        signals.recv().await,
        Ok(MediaSignal::RemoteLeft { ref session_id }) if session_id == "p-3"
    );
    assert!(signals.try_recv().is_err());
}

#[tokio::test]
async fn test_leave_destroys_call_once_and_blocks_rejoin() {
    let (provider, controller) = controller();
    assert_ok!(controller.join(&room()).await);
    let call = provider.last_call().unwrap();

    controller.leave().await;
    controller.leave().await;
    assert_ok!(controller.join(&room()).await);

    assert_eq!(call.destroy_count(), 1);
    assert_eq!(provider.created_count(), 1);
    assert_eq!(controller.state().phase, MediaPhase::Idle);
    assert_eq!(call.commands().last(), Some(&MediaCommand::Destroy));
}

#[tokio::test]
async fn test_meeting_ended_by_other_party() {
    let (provider, controller) = controller();
    assert_ok!(controller.join(&room()).await);
    let mut signals = controller.signals();
    let call = provider.last_call().unwrap();

    call.emit(ProviderEvent::MeetingEnded);

    assert_matches!(signals.recv().await, Ok(MediaSignal::MeetingEndedByOther));
    let state = wait_for_state(&controller, |s| s.phase == MediaPhase::Ended).await;
    assert!(state.ended_by_other);
    assert!(!state.is_connected);

    // Leave after a remote end must not destroy the call a second time.
    controller.leave().await;
    assert_ok!(controller.join(&room()).await);
    timeout(Duration::from_secs(1), async {
        while call.destroy_count() == 0 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();
    assert_eq!(call.destroy_count(), 1);
    assert_eq!(controller.state().phase, MediaPhase::Ended);
    assert_eq!(provider.created_count(), 1);
}

#[tokio::test]
async fn test_provider_error_kept_until_cleared() {
    let (provider, controller) = controller();
    assert_ok!(controller.join(&room()).await);
    let call = provider.last_call().unwrap();

    call.emit(ProviderEvent::Error { message: "camera unplugged".to_string() });
    let state = wait_for_state(&controller, |s| s.error.is_some()).await;
    assert!(state.is_connected);

    controller.clear_error().await;
    assert!(controller.state().error.is_none());
}
