#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use hub::protocol::{SessionEvent, SessionEventKind};
use hub::transport::fake::{FakeTransportBuilder, FakeTransportController};
use hub::{CredentialStore, Error, MemoryStore, RecordStatus, RecordUpdate, SessionRecord, SessionRegistry, SupervisorConfig};
use parking_lot::Mutex;
use tokio::sync::broadcast;

/// Wraps a [`MemoryStore`], recording every upsert and optionally failing credential writes.
pub struct CountingStore {
	inner: MemoryStore,
	updates: Mutex<Vec<(String, RecordUpdate)>>,
	fail_credential_writes: AtomicBool,
	fail_deletes: AtomicBool,
}

impl CountingStore {
	pub fn new(inner: MemoryStore) -> Self {
		Self {
			inner,
			updates: Mutex::new(Vec::new()),
			fail_credential_writes: AtomicBool::new(false),
			fail_deletes: AtomicBool::new(false),
		}
	}

	pub fn credential_writes(&self, id: &str) -> usize {
		self.updates
			.lock()
			.iter()
			.filter(|(key, update)| key == id && matches!(update.credential, Some(Some(_))))
			.count()
	}

	pub fn placeholder_writes(&self, id: &str) -> usize {
		self.updates
			.lock()
			.iter()
			.filter(|(key, update)| key == id && update.status == Some(RecordStatus::Pending))
			.count()
	}

	pub fn fail_credential_writes(&self, fail: bool) {
		self.fail_credential_writes.store(fail, Ordering::SeqCst);
	}

	pub fn fail_deletes(&self, fail: bool) {
		self.fail_deletes.store(fail, Ordering::SeqCst);
	}

	pub async fn record(&self, id: &str) -> SessionRecord {
		self.inner.get(id).await.unwrap().expect("record should exist")
	}

	pub async fn maybe_record(&self, id: &str) -> Option<SessionRecord> {
		self.inner.get(id).await.unwrap()
	}
}

#[async_trait]
impl CredentialStore for CountingStore {
	async fn get(&self, id: &str) -> hub::Result<Option<SessionRecord>> {
		self.inner.get(id).await
	}

	async fn upsert(&self, id: &str, update: RecordUpdate) -> hub::Result<SessionRecord> {
		if self.fail_credential_writes.load(Ordering::SeqCst) && matches!(update.credential, Some(Some(_))) {
			return Err(Error::Io(std::io::Error::other("disk full")));
		}
		self.updates.lock().push((id.to_string(), update.clone()));
		self.inner.upsert(id, update).await
	}

	async fn delete(&self, id: &str) -> hub::Result<bool> {
		if self.fail_deletes.load(Ordering::SeqCst) {
			return Err(Error::Io(std::io::Error::other("read-only file system")));
		}
		self.inner.delete(id).await
	}

	async fn list(&self) -> hub::Result<Vec<SessionRecord>> {
		self.inner.list().await
	}
}

pub struct Harness {
	pub registry: SessionRegistry,
	pub controller: FakeTransportController,
	pub store: Arc<CountingStore>,
	pub events: broadcast::Receiver<SessionEvent>,
}

impl Harness {
	pub fn new() -> Self {
		Self::build(FakeTransportBuilder::new(), MemoryStore::new())
	}

	pub fn build(builder: FakeTransportBuilder, store: MemoryStore) -> Self {
		let (transport, controller) = builder.build();
		let store = Arc::new(CountingStore::new(store));
		let registry = SessionRegistry::new(Arc::new(transport), store.clone(), SupervisorConfig::default());
		let events = registry.subscribe();
		Self {
			registry,
			controller,
			store,
			events,
		}
	}

	/// Waits for the next event for `id` matching `pred`, skipping others.
	pub async fn next_matching(&mut self, id: &str, pred: impl Fn(&SessionEventKind) -> bool) -> SessionEventKind {
		let wait = async {
			loop {
				match self.events.recv().await {
					Ok(event) if event.session == id && pred(&event.kind) => return event.kind,
					Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
					Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
				}
			}
		};
		tokio::time::timeout(Duration::from_secs(3600), wait)
			.await
			.expect("timed out waiting for session event")
	}

	pub async fn wait_challenge(&mut self, id: &str) {
		self.next_matching(id, |kind| matches!(kind, SessionEventKind::Challenge { .. }))
			.await;
	}

	pub async fn wait_connected(&mut self, id: &str) {
		self.next_matching(id, |kind| matches!(kind, SessionEventKind::Connected { .. }))
			.await;
	}

	/// Returns the delay of the next scheduled restart.
	pub async fn wait_restart(&mut self, id: &str) -> (u32, u64) {
		match self
			.next_matching(id, |kind| matches!(kind, SessionEventKind::RestartScheduled { .. }))
			.await
		{
			SessionEventKind::RestartScheduled { attempt, delay_ms } => (attempt, delay_ms),
			_ => unreachable!(),
		}
	}

	pub async fn wait_terminated(&mut self, id: &str) -> hub::protocol::TerminationCause {
		match self
			.next_matching(id, |kind| matches!(kind, SessionEventKind::Terminated { .. }))
			.await
		{
			SessionEventKind::Terminated { cause } => cause,
			_ => unreachable!(),
		}
	}
}
