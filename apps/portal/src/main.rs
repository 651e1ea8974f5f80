use std::sync::Arc;
use std::time::Duration;

use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{error, info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use access_guard_cell::{AccessGuardService, GuardCellState, RestOnboardingStatusSource};
use consultation_request_cell::{
    spawn_expiry_ticker, NotificationCenter, RequestCellState, RequestEventDispatcher,
};
use consultation_session_cell::{
    ConsultationSessionOrchestrator, RestAppointmentResource, RestConsultationResource, SessionCellState,
};
use realtime_channel_cell::{ChannelConfig, RealtimeChannel, RealtimeChannelClient};
use shared_config::AppConfig;
use shared_utils::jwt::validate_token;
use video_conferencing_cell::{MediaBridge, MediaBridgeConfig, MediaCellState};

use crate::router::{create_router, PortalCells};

#[tokio::main]
async fn main() {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting telehealth provider portal");

    let config = Arc::new(AppConfig::from_env());
    if !config.is_configured() {
        warn!("Portal is not fully configured, some features are disabled");
    }

    // One realtime connection for the whole session
    let client = RealtimeChannelClient::new(ChannelConfig::from_app_config(&config));
    let mut status = client.watch_status();
    let _status_log = tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let current = *status.borrow_and_update();
            if current.is_offline() {
                warn!("Realtime channel offline: {:?}", current);
            } else {
                info!("Realtime channel connected");
            }
        }
    });
    if config.is_realtime_configured() {
        if let Err(e) = client.connect().await {
            warn!("Realtime channel unavailable, showing offline: {}", e);
        }
    } else {
        warn!("REALTIME_URL not set, realtime features are offline");
    }
    let channel: Arc<dyn RealtimeChannel> = Arc::new(client.clone());

    let doctor_id = match validate_token(&config.access_token, &config.jwt_secret) {
        Ok(user) => user.id,
        Err(e) => {
            warn!("Could not identify the signed-in doctor: {}", e);
            String::new()
        }
    };

    // Consultation requests
    let center = Arc::new(NotificationCenter::from_config(&config));
    let _dispatcher = RequestEventDispatcher::new(Arc::clone(&center), doctor_id)
        .spawn(Arc::clone(&channel))
        .await;
    let _ticker = spawn_expiry_ticker(Arc::clone(&center), Duration::from_millis(config.offer_tick_ms));
    let requests = Arc::new(RequestCellState::new(config.clone(), center, Arc::clone(&channel)));

    // Access guard
    let guard = Arc::new(AccessGuardService::new(Arc::new(RestOnboardingStatusSource::new(&config))));
    let guard_state = Arc::new(GuardCellState { config: config.clone(), guard: Arc::clone(&guard) });

    // Media, carried by the browser through the bridge
    let bridge = MediaBridge::new(MediaBridgeConfig::from_app_config(&config));
    let media = Arc::new(MediaCellState::bridged(config.clone(), bridge));

    // Consultation sessions
    let orchestrator = Arc::new(ConsultationSessionOrchestrator::new(
        Arc::new(RestConsultationResource::new(&config)),
        Arc::new(RestAppointmentResource::new(&config)),
        guard,
        Arc::clone(&media.controller),
        Arc::clone(&channel),
    ));
    let _listeners = Arc::clone(&orchestrator).spawn_listeners().await;
    let sessions = Arc::new(SessionCellState { config: config.clone(), orchestrator });

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(PortalCells { requests, guard: guard_state, media, sessions })
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    let listener = match TcpListener::bind(&config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Could not bind {}: {}", config.bind_addr, e);
            return;
        }
    };
    info!("Listening on {}", config.bind_addr);

    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
    }
    client.shutdown();
}
