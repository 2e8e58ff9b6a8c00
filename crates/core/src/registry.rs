//! Process-wide table of session supervisors.
//!
//! Every mutation for one id (create, reset) runs under that id's gate, so
//! two concurrent calls can never leave two supervisors alive for the same
//! session. Different ids never contend beyond a brief table lookup.
//!
//! Once [`SessionRegistry::shutdown`] has drained the table, the registry is
//! closed: no later create, reset or restore can start a supervisor.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::future::join_all;
use hub_protocol::{ChallengeRef, Payload, SessionEvent};
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::{Mutex, broadcast};
use tracing::{info, warn};

use crate::bridge::AuthStateBridge;
use crate::config::SupervisorConfig;
use crate::error::{Error, Result};
use crate::qr;
use crate::session::{Session, validate_id};
use crate::store::{CredentialStore, RecordStatus};
use crate::supervisor::{SupervisorContext, SupervisorHandle};
use crate::transport::Transport;

#[derive(Default)]
struct Entry {
	gate: Mutex<()>,
	supervisor: RwLock<Option<Arc<SupervisorHandle>>>,
}

impl Entry {
	fn current(&self) -> Option<Arc<SupervisorHandle>> {
		self.supervisor.read().clone()
	}
}

/// Owns every session supervisor in the process.
///
/// Construct one per process and share it; dropping it without calling
/// [`shutdown`](Self::shutdown) leaves supervisor tasks running.
pub struct SessionRegistry {
	ctx: Arc<SupervisorContext>,
	entries: RwLock<HashMap<String, Arc<Entry>>>,
	/// Set under the `entries` write lock by `shutdown`.
	closed: AtomicBool,
}

impl SessionRegistry {
	pub fn new(transport: Arc<dyn Transport>, store: Arc<dyn CredentialStore>, config: SupervisorConfig) -> Self {
		let (events, _) = broadcast::channel(config.event_capacity.max(1));
		let bridge = Arc::new(AuthStateBridge::new(store, config.credential_policy));
		Self {
			ctx: Arc::new(SupervisorContext {
				transport,
				bridge,
				backoff: config.backoff,
				events,
			}),
			entries: RwLock::new(HashMap::new()),
			closed: AtomicBool::new(false),
		}
	}

	/// Receives lifecycle events for every session.
	pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
		self.ctx.events.subscribe()
	}

	/// Returns the existing session unless it is terminated; otherwise writes
	/// a placeholder record and starts a supervisor.
	pub async fn create(&self, id: &str) -> Result<Session> {
		validate_id(id)?;
		self.ensure_open()?;
		let entry = self.entry(id);
		let _gate = entry.gate.lock().await;

		if let Some(existing) = entry.current() {
			if !existing.is_terminated() {
				return Ok(existing.snapshot());
			}
			existing.shutdown().await;
		}
		self.start(id, &entry).await
	}

	pub fn get(&self, id: &str) -> Result<Session> {
		self.supervisor(id).map(|supervisor| supervisor.snapshot())
	}

	/// Snapshots of every session, ordered by id.
	pub fn list(&self) -> Vec<Session> {
		let mut sessions: Vec<Session> = self
			.entries
			.read()
			.values()
			.filter_map(|entry| entry.current())
			.map(|supervisor| supervisor.snapshot())
			.collect();
		sessions.sort_by(|a, b| a.id.cmp(&b.id));
		sessions
	}

	/// Tears the session down, wipes everything persisted for it, and starts over.
	///
	/// If the wipe fails the session is started again on its old record and
	/// the persistence error is returned, so the id never drops out of the table.
	pub async fn reset(&self, id: &str) -> Result<Session> {
		validate_id(id)?;
		self.ensure_open()?;
		let entry = self.entry(id);
		let _gate = entry.gate.lock().await;

		let previous = entry.supervisor.write().take();
		if let Some(previous) = previous {
			previous.shutdown().await;
		}
		if let Err(err) = self.ctx.bridge.wipe(id).await {
			warn!(target = "hub.registry", session = id, error = %err, "reset could not wipe session, restarting it unchanged");
			self.start(id, &entry).await?;
			return Err(err);
		}
		info!(target = "hub.registry", session = id, "session reset");
		self.start(id, &entry).await
	}

	/// Sends `payload` to `to` over the session's live connection.
	pub async fn send(&self, id: &str, to: &str, payload: &Payload) -> Result<Value> {
		if to.trim().is_empty() {
			return Err(Error::InvalidArgument("target must not be empty".into()));
		}
		if payload.is_empty() {
			return Err(Error::InvalidArgument(format!("{} payload must not be empty", payload.kind())));
		}
		self.supervisor(id)?.send(to, payload).await
	}

	/// The pending login challenge, if the session is waiting for one.
	pub fn challenge(&self, id: &str) -> Result<ChallengeRef> {
		let session = self.get(id)?;
		let challenge = session
			.pending_challenge()
			.ok_or_else(|| Error::ChallengeUnavailable(id.to_string()))?;
		Ok(ChallengeRef {
			session: id.to_string(),
			challenge: challenge.to_string(),
			image_url: format!("/sessions/{id}/qr"),
		})
	}

	/// Renders the pending challenge as an image.
	pub fn challenge_image(&self, id: &str) -> Result<Vec<u8>> {
		qr::challenge_image(&self.get(id)?)
	}

	/// Starts supervisors for every session persisted as connected.
	///
	/// Sessions that fail to start are logged and skipped.
	pub async fn restore(&self) -> Result<Vec<Session>> {
		self.ensure_open()?;
		let records = self
			.ctx
			.bridge
			.store()
			.list()
			.await
			.map_err(|e| Error::persistence("*", e))?;

		let mut restored = Vec::new();
		for record in records.into_iter().filter(|r| r.status == RecordStatus::Connected) {
			match self.create(&record.id).await {
				Ok(session) => restored.push(session),
				Err(err) => {
					warn!(target = "hub.registry", session = %record.id, error = %err, "failed to restore session");
				}
			}
		}
		info!(target = "hub.registry", count = restored.len(), "restored sessions");
		Ok(restored)
	}

	/// Stops every supervisor and closes every live connection.
	///
	/// The registry stays closed afterwards.
	pub async fn shutdown(&self) {
		let supervisors: Vec<Arc<SupervisorHandle>> = {
			let mut entries = self.entries.write();
			self.closed.store(true, Ordering::SeqCst);
			entries
				.drain()
				.filter_map(|(_, entry)| entry.supervisor.write().take())
				.collect()
		};
		let count = supervisors.len();
		join_all(supervisors.iter().map(|supervisor| supervisor.shutdown())).await;
		info!(target = "hub.registry", count, "all sessions shut down");
	}

	pub fn len(&self) -> usize {
		self.entries.read().values().filter(|entry| entry.current().is_some()).count()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn ensure_open(&self) -> Result<()> {
		if self.closed.load(Ordering::SeqCst) {
			return Err(Error::ShuttingDown);
		}
		Ok(())
	}

	fn entry(&self, id: &str) -> Arc<Entry> {
		if let Some(entry) = self.entries.read().get(id) {
			return Arc::clone(entry);
		}
		Arc::clone(self.entries.write().entry(id.to_string()).or_default())
	}

	fn supervisor(&self, id: &str) -> Result<Arc<SupervisorHandle>> {
		self.entries
			.read()
			.get(id)
			.and_then(|entry| entry.current())
			.ok_or_else(|| Error::NotFound(id.to_string()))
	}

	/// Caller must hold `entry.gate`.
	async fn start(&self, id: &str, entry: &Entry) -> Result<Session> {
		self.ctx.bridge.ensure_record(id).await?;
		let snapshot = {
			// shutdown drains under the write lock, so an entry seen open here gets drained later
			let _entries = self.entries.read();
			self.ensure_open()?;
			let supervisor = SupervisorHandle::spawn(id, Arc::clone(&self.ctx));
			let snapshot = supervisor.snapshot();
			*entry.supervisor.write() = Some(supervisor);
			snapshot
		};
		info!(target = "hub.registry", session = id, "session started");
		Ok(snapshot)
	}
}

impl std::fmt::Debug for SessionRegistry {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SessionRegistry")
			.field("sessions", &self.len())
			.finish_non_exhaustive()
	}
}
