// libs/consultation-request-cell/src/services/resolution.rs
use std::sync::Arc;

use tracing::{info, instrument, warn};

use realtime_channel_cell::{OutboundEvent, RealtimeChannel, RespondToRequestPayload};

use crate::error::OfferError;
use crate::models::{OfferState, RespondAck, RespondOutcome, Settlement};
use crate::services::center::NotificationCenter;

/// Accept/reject exchange with the coordination server.
///
/// The server acknowledgment decides the outcome. Whatever path resolves an
/// offer first (response, expiry, cancellation) wins; later results for the
/// same request are discarded.
pub struct OfferResolutionService {
    center: Arc<NotificationCenter>,
    channel: Arc<dyn RealtimeChannel>,
}

impl OfferResolutionService {
    pub fn new(center: Arc<NotificationCenter>, channel: Arc<dyn RealtimeChannel>) -> Self {
        Self { center, channel }
    }

    #[instrument(skip(self))]
    pub async fn respond(&self, request_id: &str, accept: bool) -> Result<RespondOutcome, OfferError> {
        self.center.begin_resolution(request_id).await?;

        let sent = self
            .channel
            .emit(OutboundEvent::RespondToRequest(RespondToRequestPayload {
                request_id: request_id.to_string(),
                accept,
            }))
            .await;

        let ack = match sent.map_err(OfferError::from).and_then(RespondAck::parse) {
            Ok(ack) => ack,
            Err(err) => {
                // The offer goes back to Visible so the doctor can retry.
                return match self.center.abort_resolution(request_id).await {
                    Some(state) => {
                        warn!("Request {} resolved as {:?} while awaiting the server", request_id, state);
                        Err(state.as_offer_error())
                    }
                    None => {
                        warn!("Failed to respond to request {}: {}", request_id, err);
                        Err(err)
                    }
                };
            }
        };

        if accept {
            self.settle_accept(request_id, ack).await
        } else {
            self.settle_decline(request_id, ack).await
        }
    }

    async fn settle_accept(&self, request_id: &str, ack: RespondAck) -> Result<RespondOutcome, OfferError> {
        if !ack.success {
            let (state, error) = if ack.reports_expired() {
                (OfferState::Expired, OfferError::Expired)
            } else {
                (OfferState::Lost, OfferError::LostRace)
            };
            info!("Server refused accept of {}: {:?}", request_id, ack.error);
            return match self.center.complete_resolution(request_id, state).await {
                Settlement::Applied(_) => Err(error),
                Settlement::Superseded(earlier) => Err(earlier.as_offer_error()),
            };
        }

        let Some(appointment_id) = ack.appointment_id.filter(|id| !id.is_empty()) else {
            self.center.abort_resolution(request_id).await;
            return Err(OfferError::MalformedAck("accepted without appointmentId".to_string()));
        };

        match self.center.complete_resolution(request_id, OfferState::Won).await {
            Settlement::Applied(_) => {
                info!("Won request {} (appointment {})", request_id, appointment_id);
                Ok(RespondOutcome::Accepted { request_id: request_id.to_string(), appointment_id })
            }
            Settlement::Superseded(earlier) => {
                warn!(
                    "Discarding appointment {} for request {} already resolved as {:?}",
                    appointment_id, request_id, earlier
                );
                Err(earlier.as_offer_error())
            }
        }
    }

    /// A decline always removes the offer locally, whatever the server said.
    async fn settle_decline(&self, request_id: &str, ack: RespondAck) -> Result<RespondOutcome, OfferError> {
        if !ack.success {
            warn!("Server did not confirm decline of {}: {:?}", request_id, ack.error);
        }
        if let Settlement::Superseded(earlier) = self.center.complete_resolution(request_id, OfferState::Declined).await {
            info!("Decline of {} arrived after it was resolved as {:?}", request_id, earlier);
        }
        Ok(RespondOutcome::Declined { request_id: request_id.to_string() })
    }
}
