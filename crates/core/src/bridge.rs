//! Adapter between a transport's credential lifecycle and the credential store.
//!
//! The bridge is the only writer of credential material. It remembers the
//! last credential it persisted per session so that repeated reports of the
//! same value never hit the store twice.

use std::collections::HashMap;
use std::sync::Arc;

use hub_protocol::{Credential, DeviceInfo};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::config::CredentialPolicy;
use crate::error::{Error, Result};
use crate::store::{CredentialStore, RecordStatus, RecordUpdate, SessionRecord};

/// Outcome of [`AuthStateBridge::on_credential_updated`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialWrite {
	/// The credential was persisted.
	Written,
	/// Same value as already stored (or empty); nothing written.
	Unchanged,
	/// A different credential is already authoritative; nothing written.
	Retained,
}

pub struct AuthStateBridge {
	store: Arc<dyn CredentialStore>,
	policy: CredentialPolicy,
	persisted: Mutex<HashMap<String, Credential>>,
}

impl AuthStateBridge {
	pub fn new(store: Arc<dyn CredentialStore>, policy: CredentialPolicy) -> Self {
		Self {
			store,
			policy,
			persisted: Mutex::new(HashMap::new()),
		}
	}

	pub fn store(&self) -> &Arc<dyn CredentialStore> {
		&self.store
	}

	/// Loads the stored credential. `None` means the transport must pair via a challenge.
	pub async fn load(&self, id: &str) -> Result<Option<Credential>> {
		let record = self.store.get(id).await.map_err(|e| Error::persistence(id, e))?;
		let credential = record.as_ref().and_then(SessionRecord::usable_credential).cloned();
		match &credential {
			Some(credential) => {
				self.persisted.lock().insert(id.to_string(), credential.clone());
			}
			None => {
				self.persisted.lock().remove(id);
			}
		}
		debug!(target = "hub.auth", session = id, has_credential = credential.is_some(), "loaded credential");
		Ok(credential)
	}

	/// Writes new credential material through to the store, subject to the policy.
	///
	/// Failures are returned, never swallowed: losing a fresh credential forces re-pairing.
	pub async fn on_credential_updated(&self, id: &str, credential: &Credential) -> Result<CredentialWrite> {
		if credential.is_empty() {
			return Ok(CredentialWrite::Unchanged);
		}

		let cached = self.persisted.lock().get(id).cloned();
		let current = match cached {
			Some(current) => Some(current),
			None => {
				let record = self.store.get(id).await.map_err(|e| Error::persistence(id, e))?;
				record.as_ref().and_then(SessionRecord::usable_credential).cloned()
			}
		};

		match current {
			Some(current) if current == *credential => {
				self.persisted.lock().insert(id.to_string(), current);
				return Ok(CredentialWrite::Unchanged);
			}
			Some(current) if self.policy == CredentialPolicy::KeepFirst => {
				debug!(target = "hub.auth", session = id, "keeping first stored credential");
				self.persisted.lock().insert(id.to_string(), current);
				return Ok(CredentialWrite::Retained);
			}
			_ => {}
		}

		self.store
			.upsert(id, RecordUpdate::new().credential(Some(credential.clone())))
			.await
			.map_err(|e| Error::persistence(id, e))?;
		self.persisted.lock().insert(id.to_string(), credential.clone());
		info!(target = "hub.auth", session = id, bytes = credential.len(), "credential persisted");
		Ok(CredentialWrite::Written)
	}

	/// Stores a fresh challenge, replacing any previous one.
	pub async fn on_challenge(&self, id: &str, challenge: &str) -> Result<()> {
		self.store
			.upsert(
				id,
				RecordUpdate::new()
					.status(RecordStatus::AwaitingChallenge)
					.challenge(Some(challenge.to_string())),
			)
			.await
			.map_err(|e| Error::persistence(id, e))?;
		Ok(())
	}

	/// Marks the session connected and clears any stored challenge.
	pub async fn on_connected(&self, id: &str, credential: Option<&Credential>, device: Option<DeviceInfo>) -> Result<()> {
		if let Some(credential) = credential {
			self.on_credential_updated(id, credential).await?;
		}
		self.store
			.upsert(
				id,
				RecordUpdate::new()
					.status(RecordStatus::Connected)
					.challenge(None)
					.device(device),
			)
			.await
			.map_err(|e| Error::persistence(id, e))?;
		Ok(())
	}

	/// Records a status change and drops any stale challenge.
	pub async fn on_status(&self, id: &str, status: RecordStatus) -> Result<()> {
		self.store
			.upsert(id, RecordUpdate::new().status(status).challenge(None))
			.await
			.map_err(|e| Error::persistence(id, e))?;
		Ok(())
	}

	/// Writes the placeholder record for a newly created session.
	///
	/// An existing record keeps its status, so a restored session stays
	/// `Connected` until its supervisor learns otherwise.
	pub async fn ensure_record(&self, id: &str) -> Result<SessionRecord> {
		if let Some(existing) = self.store.get(id).await.map_err(|e| Error::persistence(id, e))? {
			return Ok(existing);
		}
		self.store
			.upsert(id, RecordUpdate::new().status(RecordStatus::Pending))
			.await
			.map_err(|e| Error::persistence(id, e))
	}

	/// Deletes everything persisted for `id`.
	pub async fn wipe(&self, id: &str) -> Result<bool> {
		self.persisted.lock().remove(id);
		self.store.delete(id).await.map_err(|e| Error::persistence(id, e))
	}
}

impl std::fmt::Debug for AuthStateBridge {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AuthStateBridge")
			.field("policy", &self.policy)
			.finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::store::MemoryStore;

	fn bridge(policy: CredentialPolicy) -> (AuthStateBridge, Arc<MemoryStore>) {
		let store = Arc::new(MemoryStore::new());
		(AuthStateBridge::new(store.clone(), policy), store)
	}

	#[tokio::test]
	async fn fresh_session_loads_nothing() {
		let (bridge, _) = bridge(CredentialPolicy::KeepFirst);
		bridge.ensure_record("ops").await.unwrap();
		assert_eq!(bridge.load("ops").await.unwrap(), None);
	}

	#[tokio::test]
	async fn identical_credential_is_written_once() {
		let (bridge, store) = bridge(CredentialPolicy::KeepFirst);
		let key = Credential::from("key-1");
		assert_eq!(bridge.on_credential_updated("ops", &key).await.unwrap(), CredentialWrite::Written);
		assert_eq!(bridge.on_credential_updated("ops", &key).await.unwrap(), CredentialWrite::Unchanged);
		assert_eq!(store.get("ops").await.unwrap().unwrap().credential, Some(key));
	}

	#[tokio::test]
	async fn keep_first_retains_existing_credential() {
		let (bridge, store) = bridge(CredentialPolicy::KeepFirst);
		bridge.on_credential_updated("ops", &Credential::from("first")).await.unwrap();
		let outcome = bridge.on_credential_updated("ops", &Credential::from("second")).await.unwrap();
		assert_eq!(outcome, CredentialWrite::Retained);
		assert_eq!(store.get("ops").await.unwrap().unwrap().credential, Some(Credential::from("first")));
	}

	#[tokio::test]
	async fn replace_on_change_overwrites() {
		let (bridge, store) = bridge(CredentialPolicy::ReplaceOnChange);
		bridge.on_credential_updated("ops", &Credential::from("first")).await.unwrap();
		let outcome = bridge.on_credential_updated("ops", &Credential::from("second")).await.unwrap();
		assert_eq!(outcome, CredentialWrite::Written);
		assert_eq!(store.get("ops").await.unwrap().unwrap().credential, Some(Credential::from("second")));
	}

	#[tokio::test]
	async fn placeholder_never_downgrades_existing_record() {
		let (bridge, store) = bridge(CredentialPolicy::KeepFirst);
		assert_eq!(bridge.ensure_record("ops").await.unwrap().status, RecordStatus::Pending);

		bridge.on_connected("ops", Some(&Credential::from("key-1")), None).await.unwrap();
		let record = bridge.ensure_record("ops").await.unwrap();
		assert_eq!(record.status, RecordStatus::Connected);
		assert_eq!(store.get("ops").await.unwrap().unwrap().status, RecordStatus::Connected);
	}

	#[tokio::test]
	async fn connected_clears_challenge() {
		let (bridge, store) = bridge(CredentialPolicy::KeepFirst);
		bridge.on_challenge("ops", "2@abc").await.unwrap();
		let record = store.get("ops").await.unwrap().unwrap();
		assert_eq!(record.status, RecordStatus::AwaitingChallenge);
		assert_eq!(record.challenge.as_deref(), Some("2@abc"));

		bridge.on_connected("ops", None, None).await.unwrap();
		let record = store.get("ops").await.unwrap().unwrap();
		assert_eq!(record.status, RecordStatus::Connected);
		assert_eq!(record.challenge, None);
	}

	#[tokio::test]
	async fn wipe_forgets_cached_credential() {
		let (bridge, _) = bridge(CredentialPolicy::KeepFirst);
		bridge.on_credential_updated("ops", &Credential::from("first")).await.unwrap();
		assert!(bridge.wipe("ops").await.unwrap());
		let outcome = bridge.on_credential_updated("ops", &Credential::from("second")).await.unwrap();
		assert_eq!(outcome, CredentialWrite::Written);
	}
}
