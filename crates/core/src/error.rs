//! Error types for the session hub.

use hub_protocol::{CloseReason, SessionState};
use thiserror::Error;

/// Result type alias for hub operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the registry, supervisors, and their collaborators.
#[derive(Debug, Error)]
pub enum Error {
	/// No registry entry exists for the session id.
	#[error("Session not found: {0}")]
	NotFound(String),

	/// The operation needs a live transport handle that does not exist right now.
	#[error("Session '{id}' is not ready (state: {state})")]
	NotReady { id: String, state: SessionState },

	/// No login challenge is currently pending for the session.
	#[error("No challenge available for session '{0}'")]
	ChallengeUnavailable(String),

	/// The transport connection closed underneath an operation.
	#[error("Transport closed: {0}")]
	TransportClosed(CloseReason),

	/// The transport rejected or failed an operation.
	#[error("Transport error: {0}")]
	Transport(String),

	/// A credential store operation failed.
	#[error("Persistence failed for session '{id}': {message}")]
	Persistence { id: String, message: String },

	/// The session ran out of automatic restarts and needs a reset.
	#[error("Session '{id}' exceeded {attempts} restart attempts")]
	MaxRetriesExceeded { id: String, attempts: u32 },

	/// The registry has been shut down and accepts no new sessions.
	#[error("Session registry is shutting down")]
	ShuttingDown,

	/// Invalid argument provided by a caller.
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),

	/// Rendering a challenge image failed.
	#[error("Failed to encode challenge: {0}")]
	Encode(String),

	/// I/O error.
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	/// JSON serialization/deserialization error.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

impl Error {
	pub fn persistence(id: impl Into<String>, err: impl std::fmt::Display) -> Self {
		Error::Persistence {
			id: id.into(),
			message: err.to_string(),
		}
	}

	pub fn is_not_found(&self) -> bool {
		matches!(self, Error::NotFound(_))
	}

	pub fn is_not_ready(&self) -> bool {
		matches!(self, Error::NotReady { .. })
	}
}

impl From<qrcode::types::QrError> for Error {
	fn from(err: qrcode::types::QrError) -> Self {
		Error::Encode(err.to_string())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn not_ready_message_names_state() {
		let err = Error::NotReady {
			id: "ops".to_string(),
			state: SessionState::AwaitingChallenge,
		};
		assert_eq!(err.to_string(), "Session 'ops' is not ready (state: awaiting_challenge)");
		assert!(err.is_not_ready());
		assert!(!err.is_not_found());
	}
}
