use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;

use video_conferencing_cell::testing::local_participant;
use video_conferencing_cell::*;

fn room() -> RoomDescriptor {
    RoomDescriptor { room_url: "https://media.example.com/room-1".to_string(), token: None }
}

fn bridge(join_timeout: Duration) -> MediaBridge {
    MediaBridge::new(MediaBridgeConfig { join_timeout, command_buffer: 16 })
}

#[tokio::test]
async fn test_join_without_attached_client_fails() {
    let bridge = bridge(Duration::from_secs(5));
    let controller = MediaSessionController::new(Arc::new(bridge.clone()));

    assert!(!bridge.is_attached());
    assert_matches!(controller.join(&room()).await, Err(MediaError::ClientDetached));
    assert_eq!(controller.state().phase, MediaPhase::Idle);
}

#[tokio::test]
async fn test_join_settles_on_client_confirmation() {
    let bridge = bridge(Duration::from_secs(5));
    let controller = Arc::new(MediaSessionController::new(Arc::new(bridge.clone())));
    let mut commands = bridge.commands();

    let join = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.join(&room()).await }
    });

    let command = commands.recv().await.unwrap();
    assert_eq!(
        command,
        MediaCommand::Join { room_url: "https://media.example.com/room-1".to_string(), token: None }
    );
    bridge.deliver(ProviderEvent::Joined { local: local_participant() }).await;

    join.await.unwrap().unwrap();
    assert!(controller.state().is_connected);

    controller.toggle_camera().await.unwrap();
    assert_eq!(commands.recv().await.unwrap(), MediaCommand::SetLocalVideo { enabled: false });

    controller.leave().await;
    assert_eq!(commands.recv().await.unwrap(), MediaCommand::Leave);
    assert_eq!(commands.recv().await.unwrap(), MediaCommand::Destroy);
}

#[tokio::test]
async fn test_client_reported_join_failure() {
    let bridge = bridge(Duration::from_secs(5));
    let controller = Arc::new(MediaSessionController::new(Arc::new(bridge.clone())));
    let mut commands = bridge.commands();

    let join = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.join(&room()).await }
    });
    commands.recv().await.unwrap();
    bridge.deliver(ProviderEvent::JoinFailed { message: "camera denied".to_string() }).await;

    assert_matches!(join.await.unwrap(), Err(MediaError::JoinFailed { ref message }) if message == "camera denied");
    assert!(controller.state().error.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_join_times_out_without_confirmation() {
    let bridge = bridge(Duration::from_secs(30));
    let controller = MediaSessionController::new(Arc::new(bridge.clone()));
    let _commands = bridge.commands();

    let result = controller.join(&room()).await;

    assert_matches!(result, Err(MediaError::JoinTimeout { timeout_seconds: 30 }));
    assert!(result.unwrap_err().is_join_failure());
}

#[tokio::test]
async fn test_remote_end_reaches_controller() {
    let bridge = bridge(Duration::from_secs(5));
    let controller = Arc::new(MediaSessionController::new(Arc::new(bridge.clone())));
    let mut commands = bridge.commands();
    let mut signals = controller.signals();

    let join = tokio::spawn({
        let controller = Arc::clone(&controller);
        async move { controller.join(&room()).await }
    });
    commands.recv().await.unwrap();
    bridge.deliver(ProviderEvent::Joined { local: local_participant() }).await;
    join.await.unwrap().unwrap();

    bridge.deliver(ProviderEvent::MeetingEnded).await;

    loop {
        match signals.recv().await.unwrap() {
            MediaSignal::MeetingEndedByOther => break,
            _ => continue,
        }
    }
    assert_eq!(commands.recv().await.unwrap(), MediaCommand::Destroy);
}
