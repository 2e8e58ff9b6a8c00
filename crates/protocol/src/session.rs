//! Session lifecycle states and the summaries exposed to callers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::events::TerminationCause;

/// Lifecycle state of a session supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
	/// Created, supervisor not yet running.
	#[default]
	Pending,
	/// Loading credentials and opening the transport.
	Connecting,
	/// Transport issued a login challenge that an operator must present.
	AwaitingChallenge,
	/// Transport is open and authenticated.
	Connected,
	/// Transport closed; a restart decision is being made.
	Closed,
	/// Waiting out the backoff delay before reconnecting.
	Restarting,
	/// No further automatic restarts; requires an explicit reset.
	Terminated,
}

impl SessionState {
	pub fn as_str(self) -> &'static str {
		match self {
			SessionState::Pending => "pending",
			SessionState::Connecting => "connecting",
			SessionState::AwaitingChallenge => "awaiting_challenge",
			SessionState::Connected => "connected",
			SessionState::Closed => "closed",
			SessionState::Restarting => "restarting",
			SessionState::Terminated => "terminated",
		}
	}

	pub fn is_terminated(self) -> bool {
		self == SessionState::Terminated
	}
}

impl fmt::Display for SessionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Device identity reported by the transport once a connection opens.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
	/// Account-level identifier assigned by the remote endpoint.
	pub id: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub platform: Option<String>,
}

/// Caller-facing summary of one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
	pub id: String,
	pub state: SessionState,
	pub has_challenge: bool,
	pub retry_count: u32,
	/// Milliseconds since the Unix epoch of the last scheduled restart.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub last_restart_at: Option<u64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub device: Option<DeviceInfo>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub last_error: Option<String>,
	/// Set once the session stops restarting on its own.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub termination: Option<TerminationCause>,
}

/// Reference to the current login challenge of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeRef {
	pub session: String,
	/// Raw challenge string as issued by the transport.
	pub challenge: String,
	/// Relative URL where a rendered image of the challenge can be fetched.
	pub image_url: String,
}
