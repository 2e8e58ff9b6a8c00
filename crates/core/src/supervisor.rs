//! Per-session connection supervisor.
//!
//! Each session runs in its own task. The task owns the transport handle and
//! the only event stream for that session, so events are applied strictly in
//! arrival order while other sessions proceed independently.
//!
//! ```text
//! Pending -> Connecting -> AwaitingChallenge -> Connected
//!                 ^              |                  |
//!                 |              +---- closed ------+
//!                 |                      |
//!             Restarting <-- retriable --+-- otherwise --> Terminated
//! ```

use std::sync::Arc;

use hub_protocol::{
	CloseReason, Credential, DeviceInfo, Payload, SessionEvent, SessionEventKind, SessionState, TerminationCause,
	TransportEvent,
};
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::bridge::AuthStateBridge;
use crate::config::BackoffPolicy;
use crate::error::{Error, Result};
use crate::session::{Session, now_ms};
use crate::store::RecordStatus;
use crate::transport::{EventStream, Transport, TransportHandle};

/// Collaborators shared by every supervisor of one registry.
pub(crate) struct SupervisorContext {
	pub transport: Arc<dyn Transport>,
	pub bridge: Arc<AuthStateBridge>,
	pub backoff: BackoffPolicy,
	pub events: broadcast::Sender<SessionEvent>,
}

/// State visible outside the supervisor task.
struct SessionCell {
	session: RwLock<Session>,
	handle: RwLock<Option<Arc<dyn TransportHandle>>>,
}

/// Registry-side handle to a running supervisor.
pub(crate) struct SupervisorHandle {
	id: String,
	cell: Arc<SessionCell>,
	cancel: CancellationToken,
	task: Mutex<Option<JoinHandle<()>>>,
}

impl SupervisorHandle {
	/// Starts supervising `id`. The task connects immediately.
	pub fn spawn(id: &str, ctx: Arc<SupervisorContext>) -> Arc<Self> {
		let cell = Arc::new(SessionCell {
			session: RwLock::new(Session::new(id)),
			handle: RwLock::new(None),
		});
		let cancel = CancellationToken::new();
		let supervisor = Supervisor {
			id: id.to_string(),
			cell: Arc::clone(&cell),
			ctx,
			cancel: cancel.clone(),
		};
		let task = tokio::spawn(supervisor.run());
		Arc::new(Self {
			id: id.to_string(),
			cell,
			cancel,
			task: Mutex::new(Some(task)),
		})
	}

	pub fn snapshot(&self) -> Session {
		self.cell.session.read().clone()
	}

	pub fn state(&self) -> SessionState {
		self.cell.session.read().state
	}

	pub fn is_terminated(&self) -> bool {
		self.state().is_terminated()
	}

	/// Sends through the live handle, or explains why there is none.
	pub async fn send(&self, to: &str, payload: &Payload) -> Result<Value> {
		let (state, termination) = {
			let session = self.cell.session.read();
			(session.state, session.termination.clone())
		};
		let handle = self.cell.handle.read().clone();
		match handle {
			Some(handle) if state == SessionState::Connected && handle.is_open() => handle.send(to, payload).await,
			_ => match termination {
				Some(TerminationCause::MaxRetriesExceeded { attempts }) => Err(Error::MaxRetriesExceeded {
					id: self.id.clone(),
					attempts,
				}),
				_ => Err(Error::NotReady {
					id: self.id.clone(),
					state,
				}),
			},
		}
	}

	/// Stops the task, cancelling any pending restart, and releases the transport.
	///
	/// Persisted status is left alone so a later restore can pick the session up again.
	pub async fn shutdown(&self) {
		self.cancel.cancel();
		let task = self.task.lock().await.take();
		if let Some(task) = task {
			if let Err(err) = task.await {
				warn!(target = "hub.session", session = %self.id, error = %err, "supervisor task failed");
			}
		}
		let handle = self.cell.handle.write().take();
		if let Some(handle) = handle {
			handle.close().await;
		}
	}
}

/// Loop-local state owned by the supervisor task.
#[derive(Default)]
struct Lifecycle {
	events: Option<EventStream>,
	/// At most one pending restart per session.
	restart_at: Option<Instant>,
	/// Credential whose write failed; retried when the connection opens.
	unsaved: Option<Credential>,
}

struct Supervisor {
	id: String,
	cell: Arc<SessionCell>,
	ctx: Arc<SupervisorContext>,
	cancel: CancellationToken,
}

impl Supervisor {
	async fn run(self) {
		let mut lifecycle = Lifecycle::default();
		self.transition(SessionState::Connecting);
		self.connect(&mut lifecycle).await;

		while !self.state().is_terminated() {
			tokio::select! {
				biased;
				_ = self.cancel.cancelled() => break,
				event = next_event(&mut lifecycle.events) => match event {
					Some(event) => self.handle_event(event, &mut lifecycle).await,
					None => {
						debug!(target = "hub.session", session = %self.id, "event stream ended");
						self.on_closed(CloseReason::ConnectionLost, &mut lifecycle).await;
					}
				},
				_ = wait_until(lifecycle.restart_at) => {
					lifecycle.restart_at = None;
					self.transition(SessionState::Connecting);
					self.connect(&mut lifecycle).await;
				}
			}
		}

		if self.cancel.is_cancelled() {
			self.release_handle().await;
		}
		debug!(target = "hub.session", session = %self.id, state = %self.state(), "supervisor stopped");
	}

	fn state(&self) -> SessionState {
		self.cell.session.read().state
	}

	async fn connect(&self, lifecycle: &mut Lifecycle) {
		let credential = match self.ctx.bridge.load(&self.id).await {
			Ok(credential) => credential,
			Err(err) => {
				warn!(target = "hub.session", session = %self.id, error = %err, "failed to load credential");
				self.on_closed(CloseReason::ConnectionLost, lifecycle).await;
				self.record_error(&err);
				return;
			}
		};

		let result = tokio::select! {
			biased;
			_ = self.cancel.cancelled() => return,
			result = self.ctx.transport.connect(&self.id, credential) => result,
		};
		match result {
			Ok(parts) => {
				*self.cell.handle.write() = Some(parts.handle);
				lifecycle.events = Some(parts.events);
				debug!(target = "hub.session", session = %self.id, "transport connected");
			}
			Err(err) => {
				warn!(target = "hub.session", session = %self.id, error = %err, "transport connect failed");
				self.on_closed(CloseReason::ConnectionLost, lifecycle).await;
				self.record_error(&err);
			}
		}
	}

	async fn handle_event(&self, event: TransportEvent, lifecycle: &mut Lifecycle) {
		debug!(target = "hub.session", session = %self.id, event = event.name(), "transport event");
		match event {
			TransportEvent::Challenge { value } => self.on_challenge(value).await,
			TransportEvent::CredentialsUpdated { credential } => {
				match self.ctx.bridge.on_credential_updated(&self.id, &credential).await {
					Ok(_) => lifecycle.unsaved = None,
					Err(err) => {
						error!(target = "hub.session", session = %self.id, error = %err, "failed to persist credential");
						self.persistence_failed(&err);
						lifecycle.unsaved = Some(credential);
					}
				}
			}
			TransportEvent::Open { device } => self.on_open(device, lifecycle).await,
			TransportEvent::Closed { reason } => self.on_closed(reason, lifecycle).await,
			TransportEvent::MessagesArrived { messages } => {
				debug!(target = "hub.session", session = %self.id, count = messages.len(), "messages arrived");
				self.emit(SessionEventKind::MessagesArrived { count: messages.len() });
			}
		}
	}

	async fn on_challenge(&self, value: String) {
		self.transition_with(SessionState::AwaitingChallenge, |session| {
			session.challenge = Some(value.clone());
		});
		info!(target = "hub.session", session = %self.id, "login challenge issued");
		if let Err(err) = self.ctx.bridge.on_challenge(&self.id, &value).await {
			warn!(target = "hub.session", session = %self.id, error = %err, "failed to store challenge");
			self.persistence_failed(&err);
		}
		self.emit(SessionEventKind::Challenge { value });
	}

	async fn on_open(&self, device: Option<DeviceInfo>, lifecycle: &mut Lifecycle) {
		self.transition_with(SessionState::Connected, |session| {
			session.retry_count = 0;
			session.device = device.clone();
			session.last_error = None;
		});
		info!(
			target = "hub.session",
			session = %self.id,
			device = device.as_ref().map(|d| d.id.as_str()).unwrap_or("unknown"),
			"session connected"
		);
		match self
			.ctx
			.bridge
			.on_connected(&self.id, lifecycle.unsaved.as_ref(), device.clone())
			.await
		{
			Ok(()) => lifecycle.unsaved = None,
			Err(err) => {
				error!(target = "hub.session", session = %self.id, error = %err, "failed to persist connected state");
				self.persistence_failed(&err);
			}
		}
		self.emit(SessionEventKind::Connected { device });
	}

	/// Applies the restart policy to a closure. The old handle is released first.
	async fn on_closed(&self, reason: CloseReason, lifecycle: &mut Lifecycle) {
		lifecycle.events = None;
		self.release_handle().await;
		if lifecycle.restart_at.is_some() {
			return;
		}

		let previous = self.state();
		self.transition(SessionState::Closed);
		if !reason.is_retriable() {
			warn!(target = "hub.session", session = %self.id, %reason, "connection closed, not restarting");
			self.terminate(TerminationCause::Closed { reason }).await;
			return;
		}

		let attempts = self.cell.session.read().retry_count;
		if self.ctx.backoff.is_exhausted(attempts) {
			error!(target = "hub.session", session = %self.id, attempts, "restart attempts exhausted");
			self.terminate(TerminationCause::MaxRetriesExceeded { attempts }).await;
			return;
		}

		// a challenge never outlives its connection
		if previous == SessionState::AwaitingChallenge {
			if let Err(err) = self.ctx.bridge.on_status(&self.id, RecordStatus::Pending).await {
				warn!(target = "hub.session", session = %self.id, error = %err, "failed to clear stale challenge");
			}
		}

		let attempt = attempts + 1;
		let delay = self.ctx.backoff.delay_for_attempt(attempt);
		lifecycle.restart_at = Some(Instant::now() + delay);
		self.transition_with(SessionState::Restarting, |session| {
			session.retry_count = attempt;
			session.last_restart_at = Some(now_ms());
			session.last_error = Some(reason.to_string());
		});
		warn!(
			target = "hub.session",
			session = %self.id,
			%reason,
			attempt,
			delay_ms = delay.as_millis() as u64,
			"restart scheduled"
		);
		self.emit(SessionEventKind::RestartScheduled {
			attempt,
			delay_ms: delay.as_millis() as u64,
		});
	}

	async fn terminate(&self, cause: TerminationCause) {
		let status = match &cause {
			TerminationCause::Closed {
				reason: CloseReason::LoggedOut,
			} => RecordStatus::LoggedOut,
			_ => RecordStatus::Disconnected,
		};
		let message = match &cause {
			TerminationCause::Closed { reason } => reason.to_string(),
			TerminationCause::MaxRetriesExceeded { attempts } => format!("max retries exceeded after {attempts} attempts"),
		};
		self.transition_with(SessionState::Terminated, |session| {
			session.termination = Some(cause.clone());
			session.last_error = Some(message);
		});
		if let Err(err) = self.ctx.bridge.on_status(&self.id, status).await {
			warn!(target = "hub.session", session = %self.id, error = %err, "failed to record terminal status");
		}
		self.emit(SessionEventKind::Terminated { cause });
	}

	async fn release_handle(&self) {
		let handle = self.cell.handle.write().take();
		if let Some(handle) = handle {
			handle.close().await;
		}
	}

	fn transition(&self, to: SessionState) {
		self.transition_with(to, |_| {});
	}

	/// Moves to `to`, applying `update` under the same lock. The challenge
	/// survives only in `AwaitingChallenge`.
	fn transition_with(&self, to: SessionState, update: impl FnOnce(&mut Session)) {
		let from = {
			let mut session = self.cell.session.write();
			let from = session.state;
			session.state = to;
			if to != SessionState::AwaitingChallenge {
				session.challenge = None;
			}
			update(&mut session);
			from
		};
		if from != to {
			debug!(target = "hub.session", session = %self.id, %from, %to, "state changed");
			self.emit(SessionEventKind::StateChanged { from, to });
		}
	}

	fn record_error(&self, err: &Error) {
		self.cell.session.write().last_error = Some(err.to_string());
	}

	fn persistence_failed(&self, err: &Error) {
		self.record_error(err);
		self.emit(SessionEventKind::PersistenceFailed { message: err.to_string() });
	}

	fn emit(&self, kind: SessionEventKind) {
		// no subscribers is fine
		let _ = self.ctx.events.send(SessionEvent {
			session: self.id.clone(),
			kind,
		});
	}
}

async fn next_event(events: &mut Option<EventStream>) -> Option<TransportEvent> {
	match events {
		Some(events) => events.recv().await,
		None => std::future::pending().await,
	}
}

async fn wait_until(deadline: Option<Instant>) {
	match deadline {
		Some(deadline) => tokio::time::sleep_until(deadline).await,
		None => std::future::pending().await,
	}
}
