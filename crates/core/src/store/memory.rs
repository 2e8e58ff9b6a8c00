use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{CredentialStore, RecordUpdate, SessionRecord};
use crate::error::Result;

/// Process-local store, lost on exit.
#[derive(Debug, Default)]
pub struct MemoryStore {
	records: Mutex<HashMap<String, SessionRecord>>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Seeds the store, replacing any record with the same id.
	pub fn with_records(records: impl IntoIterator<Item = SessionRecord>) -> Self {
		let store = Self::new();
		{
			let mut map = store.records.lock();
			for record in records {
				map.insert(record.id.clone(), record);
			}
		}
		store
	}

	pub fn len(&self) -> usize {
		self.records.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.records.lock().is_empty()
	}
}

#[async_trait]
impl CredentialStore for MemoryStore {
	async fn get(&self, id: &str) -> Result<Option<SessionRecord>> {
		Ok(self.records.lock().get(id).cloned())
	}

	async fn upsert(&self, id: &str, update: RecordUpdate) -> Result<SessionRecord> {
		let mut records = self.records.lock();
		let record = records.entry(id.to_string()).or_insert_with(|| SessionRecord::new(id));
		update.apply(record);
		Ok(record.clone())
	}

	async fn delete(&self, id: &str) -> Result<bool> {
		Ok(self.records.lock().remove(id).is_some())
	}

	async fn list(&self) -> Result<Vec<SessionRecord>> {
		Ok(self.records.lock().values().cloned().collect())
	}
}

#[cfg(test)]
mod tests {
	use hub_protocol::Credential;

	use super::*;
	use crate::store::RecordStatus;

	#[tokio::test]
	async fn upsert_creates_then_updates() {
		let store = MemoryStore::new();
		let created = store.upsert("ops", RecordUpdate::new()).await.unwrap();
		assert_eq!(created.status, RecordStatus::Pending);

		let updated = store
			.upsert(
				"ops",
				RecordUpdate::new()
					.status(RecordStatus::Connected)
					.credential(Some(Credential::from("k"))),
			)
			.await
			.unwrap();
		assert_eq!(updated.created_at, created.created_at);
		assert_eq!(updated.status, RecordStatus::Connected);
		assert_eq!(store.len(), 1);

		assert!(store.delete("ops").await.unwrap());
		assert!(!store.delete("ops").await.unwrap());
		assert!(store.get("ops").await.unwrap().is_none());
	}
}
