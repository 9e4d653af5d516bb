use std::time::Duration;

use beacon_storage::models::StoredLocation;

use crate::{BeaconService, CallerContext, Error, Result, Role};

#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct HeartbeatRequest {
	pub lat: f64,
	pub lng: f64,
}

#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct HeartbeatResponse {
	pub expires_in_seconds: u64,
}

impl BeaconService {
	/// Publishes the caller's presence and location for one TTL window. A
	/// provider can only announce itself, so the stored id is always the
	/// caller's own.
	pub async fn heartbeat(
		&self,
		caller: &CallerContext,
		request: HeartbeatRequest,
	) -> Result<HeartbeatResponse> {
		if caller.role != Role::Provider {
			return Err(Error::Forbidden {
				message: "Only providers can publish presence.".to_string(),
			});
		}

		let point = crate::validate_point(request.lat, request.lng)?;
		let ttl_seconds = self.cfg.presence.ttl_seconds;
		let location = StoredLocation { provider_id: caller.caller_id, point };

		self.collaborators.presence.publish(location, Duration::from_secs(ttl_seconds)).await?;

		tracing::debug!(provider_id = %caller.caller_id, ttl_seconds, "Presence refreshed.");

		Ok(HeartbeatResponse { expires_in_seconds: ttl_seconds })
	}
}
