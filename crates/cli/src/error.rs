//! HTTP error mapping for hub errors.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub hub::Error);

impl ApiError {
	pub fn status_code(&self) -> StatusCode {
		match &self.0 {
			hub::Error::NotFound(_) | hub::Error::ChallengeUnavailable(_) => StatusCode::NOT_FOUND,
			hub::Error::NotReady { .. } | hub::Error::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
			hub::Error::MaxRetriesExceeded { .. } => StatusCode::CONFLICT,
			hub::Error::InvalidArgument(_) => StatusCode::BAD_REQUEST,
			hub::Error::Transport(_) | hub::Error::TransportClosed(_) => StatusCode::BAD_GATEWAY,
			hub::Error::Persistence { .. } | hub::Error::Encode(_) | hub::Error::Io(_) | hub::Error::Json(_) => {
				StatusCode::INTERNAL_SERVER_ERROR
			}
		}
	}

	pub fn code(&self) -> &'static str {
		match &self.0 {
			hub::Error::NotFound(_) => "not_found",
			hub::Error::ChallengeUnavailable(_) => "challenge_unavailable",
			hub::Error::NotReady { .. } => "not_ready",
			hub::Error::ShuttingDown => "shutting_down",
			hub::Error::MaxRetriesExceeded { .. } => "max_retries_exceeded",
			hub::Error::InvalidArgument(_) => "invalid_argument",
			hub::Error::Transport(_) | hub::Error::TransportClosed(_) => "transport_error",
			_ => "internal",
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let status = self.status_code();
		if status.is_server_error() {
			error!(target = "hub.api", error = %self.0, "request failed");
		}
		let body = json!({
			"error": {
				"code": self.code(),
				"message": self.0.to_string(),
			}
		});
		(status, Json(body)).into_response()
	}
}

#[cfg(test)]
mod tests {
	use hub::protocol::{CloseReason, SessionState};

	use super::*;

	#[test]
	fn status_codes() {
		let cases = [
			(hub::Error::NotFound("ops".into()), StatusCode::NOT_FOUND),
			(hub::Error::ChallengeUnavailable("ops".into()), StatusCode::NOT_FOUND),
			(
				hub::Error::NotReady {
					id: "ops".into(),
					state: SessionState::Connecting,
				},
				StatusCode::SERVICE_UNAVAILABLE,
			),
			(
				hub::Error::MaxRetriesExceeded {
					id: "ops".into(),
					attempts: 5,
				},
				StatusCode::CONFLICT,
			),
			(hub::Error::ShuttingDown, StatusCode::SERVICE_UNAVAILABLE),
			(hub::Error::TransportClosed(CloseReason::ConnectionLost), StatusCode::BAD_GATEWAY),
			(hub::Error::persistence("ops", "disk full"), StatusCode::INTERNAL_SERVER_ERROR),
		];
		for (err, status) in cases {
			assert_eq!(ApiError(err).status_code(), status);
		}
	}
}
