//! Events a transport connection reports back to its supervisor.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::credential::Credential;
use crate::session::DeviceInfo;

/// Why a transport connection closed.
///
/// The supervisor only cares whether a closure is retriable. Everything is,
/// except the reasons where the remote end revoked or rejected the credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CloseReason {
	/// The account logged this device out; credentials are revoked.
	LoggedOut,
	/// Another connection for the same account took over.
	Replaced,
	/// The remote end rejected the stored credentials.
	BadSession,
	/// Stream error that asks the client to reconnect.
	StreamError,
	/// Connection dropped without a protocol-level reason.
	ConnectionLost,
	/// Keepalive or handshake timed out.
	TimedOut,
	/// Any other status the bridge reported.
	Other {
		#[serde(default, skip_serializing_if = "Option::is_none")]
		code: Option<u16>,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		message: Option<String>,
	},
}

impl CloseReason {
	/// Maps a numeric disconnect status to a close reason.
	pub fn from_status_code(code: u16) -> Self {
		match code {
			401 => CloseReason::LoggedOut,
			440 => CloseReason::Replaced,
			500 => CloseReason::BadSession,
			515 => CloseReason::StreamError,
			428 => CloseReason::ConnectionLost,
			408 => CloseReason::TimedOut,
			other => CloseReason::Other {
				code: Some(other),
				message: None,
			},
		}
	}

	/// Returns true when an automatic restart may recover the connection.
	pub fn is_retriable(&self) -> bool {
		!matches!(self, CloseReason::LoggedOut | CloseReason::BadSession)
	}
}

impl fmt::Display for CloseReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			CloseReason::LoggedOut => f.write_str("logged out"),
			CloseReason::Replaced => f.write_str("replaced by another connection"),
			CloseReason::BadSession => f.write_str("bad session"),
			CloseReason::StreamError => f.write_str("stream error"),
			CloseReason::ConnectionLost => f.write_str("connection lost"),
			CloseReason::TimedOut => f.write_str("timed out"),
			CloseReason::Other { code, message } => match (code, message) {
				(Some(code), Some(message)) => write!(f, "closed with status {code}: {message}"),
				(Some(code), None) => write!(f, "closed with status {code}"),
				(None, Some(message)) => write!(f, "closed: {message}"),
				(None, None) => f.write_str("closed"),
			},
		}
	}
}

/// Event emitted by an open transport connection, in arrival order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransportEvent {
	/// A login challenge for the operator to present out-of-band.
	Challenge { value: String },
	/// New credential material, e.g. after pairing or a key rotation.
	CredentialsUpdated { credential: Credential },
	/// The connection is open and authenticated.
	Open {
		#[serde(default, skip_serializing_if = "Option::is_none")]
		device: Option<DeviceInfo>,
	},
	/// The connection closed.
	Closed { reason: CloseReason },
	/// Inbound messages, passed through untouched.
	MessagesArrived { messages: Vec<Value> },
}

impl TransportEvent {
	pub fn name(&self) -> &'static str {
		match self {
			TransportEvent::Challenge { .. } => "challenge",
			TransportEvent::CredentialsUpdated { .. } => "credentials_updated",
			TransportEvent::Open { .. } => "open",
			TransportEvent::Closed { .. } => "closed",
			TransportEvent::MessagesArrived { .. } => "messages_arrived",
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn status_codes_map_to_reasons() {
		assert_eq!(CloseReason::from_status_code(401), CloseReason::LoggedOut);
		assert_eq!(CloseReason::from_status_code(515), CloseReason::StreamError);
		assert_eq!(
			CloseReason::from_status_code(499),
			CloseReason::Other {
				code: Some(499),
				message: None
			}
		);
	}

	#[test]
	fn only_revoked_credentials_are_final() {
		assert!(CloseReason::StreamError.is_retriable());
		assert!(CloseReason::ConnectionLost.is_retriable());
		assert!(CloseReason::TimedOut.is_retriable());
		assert!(CloseReason::Replaced.is_retriable());
		assert!(CloseReason::from_status_code(503).is_retriable());
		assert!(CloseReason::Other { code: None, message: None }.is_retriable());
		assert!(!CloseReason::LoggedOut.is_retriable());
		assert!(!CloseReason::BadSession.is_retriable());
	}

	#[test]
	fn closed_event_wire_shape() {
		let json = r#"{"type":"closed","reason":{"kind":"logged_out"}}"#;
		let event: TransportEvent = serde_json::from_str(json).unwrap();
		assert_eq!(
			event,
			TransportEvent::Closed {
				reason: CloseReason::LoggedOut
			}
		);
	}

	#[test]
	fn open_event_without_device() {
		let event: TransportEvent = serde_json::from_str(r#"{"type":"open"}"#).unwrap();
		assert_eq!(event, TransportEvent::Open { device: None });
		assert_eq!(event.name(), "open");
	}
}
