//! The transport seam: whatever actually speaks the messaging wire protocol.
//!
//! A supervisor only needs three things from a connection: a handle to send
//! on and close, and an ordered stream of [`TransportEvent`]s. The stream
//! ending without a `closed` event counts as a lost connection.

pub mod fake;
mod websocket;

pub use websocket::{WebSocketHandle, WebSocketTransport};

use std::sync::Arc;

use async_trait::async_trait;
use hub_protocol::{Credential, Payload, TransportEvent};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::Result;

/// Ordered events from one connection.
pub type EventStream = mpsc::UnboundedReceiver<TransportEvent>;

/// Sending half of one open connection.
#[async_trait]
pub trait TransportHandle: Send + Sync {
	/// Delivers `payload` to `to`, failing with
	/// [`Error::TransportClosed`](crate::Error::TransportClosed) once the handle is closed.
	async fn send(&self, to: &str, payload: &Payload) -> Result<Value>;

	/// Releases the connection. Must be idempotent.
	async fn close(&self);

	fn is_open(&self) -> bool;
}

/// A freshly opened connection.
pub struct TransportParts {
	pub handle: Arc<dyn TransportHandle>,
	pub events: EventStream,
}

impl std::fmt::Debug for TransportParts {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("TransportParts")
			.field("open", &self.handle.is_open())
			.finish_non_exhaustive()
	}
}

/// Factory for connections, one per session attempt.
#[async_trait]
pub trait Transport: Send + Sync {
	/// Opens a connection for `session`. Without a credential the remote end
	/// is expected to start a challenge-based pairing flow.
	async fn connect(&self, session: &str, credential: Option<Credential>) -> Result<TransportParts>;
}
