//! In-memory transport for exercising supervisors without a bridge.
//!
//! # Example
//!
//! ```ignore
//! let (transport, controller) = FakeTransportBuilder::new().build();
//! let registry = SessionRegistry::new(Arc::new(transport), store, config);
//!
//! registry.create("ops").await?;
//! controller.wait_for_connects(1).await;
//! controller.challenge("2@abc");
//! controller.open(None);
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use hub_protocol::{CloseReason, Credential, DeviceInfo, Payload, TransportEvent};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::{mpsc, watch};

use super::{Transport, TransportHandle, TransportParts};
use crate::error::{Error, Result};

/// Builder for creating fake transport instances.
#[derive(Debug, Default)]
pub struct FakeTransportBuilder {
	fail_first: u32,
}

impl FakeTransportBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	/// Makes the first `count` connect attempts fail.
	pub fn fail_first_connects(mut self, count: u32) -> Self {
		self.fail_first = count;
		self
	}

	/// Returns the transport to hand to a registry and a controller for driving it.
	pub fn build(self) -> (FakeTransport, FakeTransportController) {
		let (connects_tx, _) = watch::channel(0usize);
		let shared = Arc::new(Shared {
			state: Mutex::new(State {
				fail_next: self.fail_first,
				..State::default()
			}),
			connects: connects_tx,
		});
		(
			FakeTransport {
				shared: Arc::clone(&shared),
			},
			FakeTransportController { shared },
		)
	}
}

#[derive(Default)]
struct State {
	current: Option<Slot>,
	credentials_seen: Vec<Option<Credential>>,
	live: usize,
	max_live: usize,
	sent: Vec<(String, Payload)>,
	fail_next: u32,
}

struct Slot {
	events: mpsc::UnboundedSender<TransportEvent>,
	handle: Arc<FakeHandle>,
}

struct Shared {
	state: Mutex<State>,
	/// Number of connect attempts, failed ones included.
	connects: watch::Sender<usize>,
}

/// Transport half of the fake; see [`FakeTransportController`].
#[derive(Clone)]
pub struct FakeTransport {
	shared: Arc<Shared>,
}

#[async_trait]
impl Transport for FakeTransport {
	async fn connect(&self, _session: &str, credential: Option<Credential>) -> Result<TransportParts> {
		let parts = {
			let mut state = self.shared.state.lock();
			state.credentials_seen.push(credential);
			if state.fail_next > 0 {
				state.fail_next -= 1;
				None
			} else {
				let (tx, rx) = mpsc::unbounded_channel();
				let handle = Arc::new(FakeHandle {
					shared: Arc::clone(&self.shared),
					open: AtomicBool::new(true),
					released: AtomicBool::new(false),
				});
				state.live += 1;
				state.max_live = state.max_live.max(state.live);
				state.current = Some(Slot {
					events: tx,
					handle: Arc::clone(&handle),
				});
				Some(TransportParts { handle, events: rx })
			}
		};
		self.shared.connects.send_modify(|count| *count += 1);
		parts.ok_or_else(|| Error::Transport("connection refused".into()))
	}
}

struct FakeHandle {
	shared: Arc<Shared>,
	/// Cleared when the remote side reports closure.
	open: AtomicBool,
	/// Set once the supervisor released the handle.
	released: AtomicBool,
}

#[async_trait]
impl TransportHandle for FakeHandle {
	async fn send(&self, to: &str, payload: &Payload) -> Result<Value> {
		if !self.is_open() {
			return Err(Error::TransportClosed(CloseReason::ConnectionLost));
		}
		let mut state = self.shared.state.lock();
		state.sent.push((to.to_string(), payload.clone()));
		Ok(json!({ "messageId": format!("fake-{}", state.sent.len()) }))
	}

	async fn close(&self) {
		self.open.store(false, Ordering::SeqCst);
		if !self.released.swap(true, Ordering::SeqCst) {
			self.shared.state.lock().live -= 1;
		}
	}

	fn is_open(&self) -> bool {
		self.open.load(Ordering::SeqCst) && !self.released.load(Ordering::SeqCst)
	}
}

/// Controller for injecting events and inspecting what the supervisor did.
///
/// Injection always targets the most recent connection.
#[derive(Clone)]
pub struct FakeTransportController {
	shared: Arc<Shared>,
}

impl FakeTransportController {
	/// Injects a raw event. Returns false if there is no connection or its stream is gone.
	pub fn emit(&self, event: TransportEvent) -> bool {
		let state = self.shared.state.lock();
		let Some(slot) = state.current.as_ref() else {
			return false;
		};
		if let TransportEvent::Closed { .. } = event {
			slot.handle.open.store(false, Ordering::SeqCst);
		}
		slot.events.send(event).is_ok()
	}

	pub fn challenge(&self, value: &str) -> bool {
		self.emit(TransportEvent::Challenge { value: value.to_string() })
	}

	pub fn open(&self, device: Option<DeviceInfo>) -> bool {
		self.emit(TransportEvent::Open { device })
	}

	pub fn close(&self, reason: CloseReason) -> bool {
		self.emit(TransportEvent::Closed { reason })
	}

	pub fn credentials(&self, credential: Credential) -> bool {
		self.emit(TransportEvent::CredentialsUpdated { credential })
	}

	pub fn messages(&self, messages: Vec<Value>) -> bool {
		self.emit(TransportEvent::MessagesArrived { messages })
	}

	/// Ends the current event stream without a `closed` event.
	pub fn drop_stream(&self) {
		let mut state = self.shared.state.lock();
		if let Some(slot) = state.current.take() {
			slot.handle.open.store(false, Ordering::SeqCst);
			let (dead, _) = mpsc::unbounded_channel();
			state.current = Some(Slot {
				events: dead,
				handle: slot.handle,
			});
		}
	}

	/// Makes the next `count` connect attempts fail.
	pub fn fail_next_connects(&self, count: u32) {
		self.shared.state.lock().fail_next = count;
	}

	/// Waits until at least `count` connect attempts happened.
	pub async fn wait_for_connects(&self, count: usize) {
		let mut rx = self.shared.connects.subscribe();
		let _ = rx.wait_for(|seen| *seen >= count).await;
	}

	/// Number of connect attempts so far.
	pub fn connects(&self) -> usize {
		*self.shared.connects.borrow()
	}

	/// Handles opened and not yet released.
	pub fn live(&self) -> usize {
		self.shared.state.lock().live
	}

	/// Highest number of simultaneously live handles ever observed.
	pub fn max_live(&self) -> usize {
		self.shared.state.lock().max_live
	}

	/// Credential passed to each connect attempt, in order.
	pub fn credentials_seen(&self) -> Vec<Option<Credential>> {
		self.shared.state.lock().credentials_seen.clone()
	}

	/// Take all sent messages, clearing the buffer.
	pub fn take_sent(&self) -> Vec<(String, Payload)> {
		std::mem::take(&mut self.shared.state.lock().sent)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn connect_tracks_live_handles() {
		let (transport, controller) = FakeTransportBuilder::new().build();
		let mut parts = transport.connect("ops", None).await.unwrap();
		assert_eq!(controller.live(), 1);

		assert!(controller.challenge("2@abc"));
		assert_eq!(
			parts.events.recv().await,
			Some(TransportEvent::Challenge { value: "2@abc".into() })
		);

		parts.handle.send("123", &Payload::text("hi")).await.unwrap();
		parts.handle.close().await;
		parts.handle.close().await;
		assert_eq!(controller.live(), 0);
		assert!(parts.handle.send("123", &Payload::text("again")).await.is_err());
		assert_eq!(controller.take_sent().len(), 1);
	}

	#[tokio::test]
	async fn failed_connects_still_count() {
		let (transport, controller) = FakeTransportBuilder::new().fail_first_connects(1).build();
		assert!(transport.connect("ops", None).await.is_err());
		assert!(transport.connect("ops", Some(Credential::from("k"))).await.is_ok());
		controller.wait_for_connects(2).await;
		assert_eq!(controller.connects(), 2);
		assert_eq!(controller.credentials_seen()[1], Some(Credential::from("k")));
	}

	#[tokio::test]
	async fn dropping_stream_ends_events() {
		let (transport, controller) = FakeTransportBuilder::new().build();
		let mut parts = transport.connect("ops", None).await.unwrap();
		controller.drop_stream();
		assert_eq!(parts.events.recv().await, None);
		assert!(!parts.handle.is_open());
	}
}
