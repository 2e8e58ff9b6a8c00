//! Durable per-session records: status, pending challenge, credential blob.
//!
//! The supervisor never talks to a store directly; it goes through
//! [`AuthStateBridge`](crate::bridge::AuthStateBridge), which owns the write
//! policy. Stores only need idempotent upsert semantics per id.

mod file;
mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use hub_protocol::{Credential, DeviceInfo};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::session::now_ms;

/// Persisted status of a session record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
	/// Placeholder written at creation, before any connection succeeded.
	#[default]
	Pending,
	AwaitingChallenge,
	Connected,
	/// Terminated for a reason other than logout, e.g. restarts ran out.
	Disconnected,
	/// Remote end revoked the credential.
	LoggedOut,
}

/// One persisted session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
	pub id: String,
	#[serde(default)]
	pub status: RecordStatus,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub challenge: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub credential: Option<Credential>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub device: Option<DeviceInfo>,
	pub created_at: u64,
	pub updated_at: u64,
}

impl SessionRecord {
	pub fn new(id: impl Into<String>) -> Self {
		let now = now_ms();
		Self {
			id: id.into(),
			status: RecordStatus::Pending,
			challenge: None,
			credential: None,
			device: None,
			created_at: now,
			updated_at: now,
		}
	}

	/// Returns the stored credential if it is non-empty.
	pub fn usable_credential(&self) -> Option<&Credential> {
		self.credential.as_ref().filter(|c| !c.is_empty())
	}
}

/// Partial update applied by [`CredentialStore::upsert`].
///
/// Outer `None` leaves a field alone; `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordUpdate {
	pub status: Option<RecordStatus>,
	pub challenge: Option<Option<String>>,
	pub credential: Option<Option<Credential>>,
	pub device: Option<Option<DeviceInfo>>,
}

impl RecordUpdate {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn status(mut self, status: RecordStatus) -> Self {
		self.status = Some(status);
		self
	}

	pub fn challenge(mut self, challenge: Option<String>) -> Self {
		self.challenge = Some(challenge);
		self
	}

	pub fn credential(mut self, credential: Option<Credential>) -> Self {
		self.credential = Some(credential);
		self
	}

	pub fn device(mut self, device: Option<DeviceInfo>) -> Self {
		self.device = Some(device);
		self
	}

	/// True when the update would only touch the timestamp.
	pub fn is_empty(&self) -> bool {
		self.status.is_none() && self.challenge.is_none() && self.credential.is_none() && self.device.is_none()
	}

	/// Applies the update to `record` and bumps `updated_at`.
	pub fn apply(self, record: &mut SessionRecord) {
		if let Some(status) = self.status {
			record.status = status;
		}
		if let Some(challenge) = self.challenge {
			record.challenge = challenge;
		}
		if let Some(credential) = self.credential {
			record.credential = credential;
		}
		if let Some(device) = self.device {
			record.device = device;
		}
		record.updated_at = now_ms().max(record.updated_at);
	}
}

/// Durable key -> record mapping.
///
/// Implementations must make `upsert` idempotent per id and last-write-wins.
#[async_trait]
pub trait CredentialStore: Send + Sync {
	async fn get(&self, id: &str) -> Result<Option<SessionRecord>>;

	/// Creates the record if missing, applies `update`, and returns the result.
	async fn upsert(&self, id: &str, update: RecordUpdate) -> Result<SessionRecord>;

	/// Returns true if a record was removed.
	async fn delete(&self, id: &str) -> Result<bool>;

	async fn list(&self) -> Result<Vec<SessionRecord>>;
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn update_distinguishes_untouched_from_cleared() {
		let mut record = SessionRecord::new("ops");
		record.challenge = Some("2@abc".into());
		record.credential = Some(Credential::from("key"));

		RecordUpdate::new().status(RecordStatus::Connected).apply(&mut record);
		assert_eq!(record.challenge.as_deref(), Some("2@abc"));
		assert_eq!(record.status, RecordStatus::Connected);

		RecordUpdate::new().challenge(None).apply(&mut record);
		assert_eq!(record.challenge, None);
		assert!(record.credential.is_some());
	}

	#[test]
	fn empty_credential_is_not_usable() {
		let mut record = SessionRecord::new("ops");
		record.credential = Some(Credential::default());
		assert!(record.usable_credential().is_none());
	}

	#[test]
	fn record_json_shape() {
		let mut record = SessionRecord::new("ops");
		record.status = RecordStatus::AwaitingChallenge;
		let json = serde_json::to_value(&record).unwrap();
		assert_eq!(json["status"], "awaiting_challenge");
		assert!(json.get("credential").is_none());
		assert!(json.get("createdAt").is_some());
	}
}
