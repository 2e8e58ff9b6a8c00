//! In-memory session metadata owned by a supervisor.

use std::time::{SystemTime, UNIX_EPOCH};

use hub_protocol::{DeviceInfo, SessionState, SessionSummary, TerminationCause};

/// Snapshot of one session as seen by callers.
///
/// Only the owning supervisor mutates the live copy; everyone else gets a clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
	pub id: String,
	pub state: SessionState,
	/// Pending login challenge; only set while awaiting one.
	pub challenge: Option<String>,
	pub retry_count: u32,
	/// Milliseconds since the Unix epoch of the last scheduled restart.
	pub last_restart_at: Option<u64>,
	pub device: Option<DeviceInfo>,
	pub last_error: Option<String>,
	pub termination: Option<TerminationCause>,
}

impl Session {
	pub fn new(id: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			state: SessionState::Pending,
			challenge: None,
			retry_count: 0,
			last_restart_at: None,
			device: None,
			last_error: None,
			termination: None,
		}
	}

	/// Returns the challenge only while one is actually pending.
	pub fn pending_challenge(&self) -> Option<&str> {
		if self.state != SessionState::AwaitingChallenge {
			return None;
		}
		self.challenge.as_deref().filter(|c| !c.is_empty())
	}

	pub fn summary(&self) -> SessionSummary {
		SessionSummary {
			id: self.id.clone(),
			state: self.state,
			has_challenge: self.pending_challenge().is_some(),
			retry_count: self.retry_count,
			last_restart_at: self.last_restart_at,
			device: self.device.clone(),
			last_error: self.last_error.clone(),
			termination: self.termination.clone(),
		}
	}
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_millis() as u64)
		.unwrap_or(0)
}

/// Checks that a caller-chosen session id is usable as a key and a URL segment.
pub fn validate_id(id: &str) -> crate::Result<()> {
	if id.is_empty() {
		return Err(crate::Error::InvalidArgument("session id must not be empty".into()));
	}
	if id.chars().count() > 128 {
		return Err(crate::Error::InvalidArgument("session id must be at most 128 characters".into()));
	}
	if id.chars().any(|c| c.is_whitespace() || c == '/') {
		return Err(crate::Error::InvalidArgument(format!(
			"session id '{id}' must not contain whitespace or '/'"
		)));
	}
	Ok(())
}
