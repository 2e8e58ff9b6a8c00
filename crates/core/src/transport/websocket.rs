//! WebSocket transport talking to an external protocol bridge.
//!
//! One socket per session at `<base-url>/<session-id>`. Outbound sends are
//! correlated with bridge responses by request id, the same way a JSON-RPC
//! connection pairs requests with oneshot channels.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use hub_protocol::{BridgeMessage, BridgeRequest, BridgeResponse, CloseReason, Credential, Payload, TransportEvent};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use super::{Transport, TransportHandle, TransportParts};
use crate::error::{Error, Result};

type Pending = Arc<Mutex<HashMap<u32, oneshot::Sender<Result<Value>>>>>;

/// Connects sessions to a bridge over WebSocket.
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
	base_url: String,
}

impl WebSocketTransport {
	pub fn new(base_url: impl Into<String>) -> Self {
		Self {
			base_url: base_url.into(),
		}
	}

	pub fn session_url(&self, session: &str) -> String {
		format!("{}/{}", self.base_url.trim_end_matches('/'), session)
	}
}

#[async_trait]
impl Transport for WebSocketTransport {
	async fn connect(&self, session: &str, credential: Option<Credential>) -> Result<TransportParts> {
		let url = self.session_url(session);
		let (ws, _) = tokio_tungstenite::connect_async(url.as_str())
			.await
			.map_err(|e| Error::Transport(format!("failed to connect to {url}: {e}")))?;
		let (mut sink, mut stream) = ws.split();

		let hello = serde_json::to_string(&BridgeRequest::Hello {
			session: session.to_string(),
			credential,
		})?;
		sink.send(Message::Text(hello))
			.await
			.map_err(|e| Error::Transport(format!("failed to send hello: {e}")))?;
		debug!(target = "hub.transport", session, %url, "bridge socket open");

		let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
		tokio::spawn(async move {
			while let Some(message) = outbound_rx.recv().await {
				if sink.send(message).await.is_err() {
					break;
				}
			}
			let _ = sink.close().await;
		});

		let (events_tx, events_rx) = mpsc::unbounded_channel();
		let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
		let open = Arc::new(AtomicBool::new(true));

		let reader = tokio::spawn({
			let pending = Arc::clone(&pending);
			let open = Arc::clone(&open);
			let session = session.to_string();
			async move {
				while let Some(frame) = stream.next().await {
					let text = match frame {
						Ok(Message::Text(text)) => text,
						Ok(Message::Close(_)) => break,
						Ok(_) => continue,
						Err(e) => {
							warn!(target = "hub.transport", session = %session, error = %e, "bridge socket error");
							break;
						}
					};
					match serde_json::from_str::<BridgeMessage>(&text) {
						Ok(BridgeMessage::Response(response)) => complete(&pending, response),
						Ok(BridgeMessage::Event(event)) => {
							if matches!(event, TransportEvent::Closed { .. }) {
								open.store(false, Ordering::SeqCst);
							}
							if events_tx.send(event).is_err() {
								break;
							}
						}
						Err(e) => {
							warn!(target = "hub.transport", session = %session, error = %e, "unparseable bridge frame");
						}
					}
				}

				if open.swap(false, Ordering::SeqCst) {
					let _ = events_tx.send(TransportEvent::Closed {
						reason: CloseReason::ConnectionLost,
					});
				}
				fail_pending(&pending);
				debug!(target = "hub.transport", session = %session, "bridge socket reader ended");
			}
		});

		let handle = WebSocketHandle {
			session: session.to_string(),
			last_id: AtomicU32::new(0),
			pending,
			outbound: Mutex::new(Some(outbound_tx)),
			open,
			reader: Mutex::new(Some(reader)),
		};
		Ok(TransportParts {
			handle: Arc::new(handle),
			events: events_rx,
		})
	}
}

fn complete(pending: &Pending, response: BridgeResponse) {
	let Some(callback) = pending.lock().remove(&response.id) else {
		warn!(target = "hub.transport", id = response.id, "response for unknown request");
		return;
	};
	let result = match response.error {
		Some(message) => Err(Error::Transport(message)),
		None => Ok(response.result.unwrap_or(Value::Null)),
	};
	let _ = callback.send(result);
}

fn fail_pending(pending: &Pending) {
	for (_, callback) in pending.lock().drain() {
		let _ = callback.send(Err(Error::TransportClosed(CloseReason::ConnectionLost)));
	}
}

/// Sending half of one bridge socket.
pub struct WebSocketHandle {
	session: String,
	last_id: AtomicU32,
	pending: Pending,
	outbound: Mutex<Option<mpsc::UnboundedSender<Message>>>,
	open: Arc<AtomicBool>,
	reader: Mutex<Option<JoinHandle<()>>>,
}

impl WebSocketHandle {
	fn push(&self, message: Message) -> bool {
		match self.outbound.lock().as_ref() {
			Some(tx) => tx.send(message).is_ok(),
			None => false,
		}
	}
}

#[async_trait]
impl TransportHandle for WebSocketHandle {
	async fn send(&self, to: &str, payload: &Payload) -> Result<Value> {
		if !self.is_open() {
			return Err(Error::TransportClosed(CloseReason::ConnectionLost));
		}
		let id = self.last_id.fetch_add(1, Ordering::SeqCst);
		let (tx, rx) = oneshot::channel();
		self.pending.lock().insert(id, tx);

		let request = serde_json::to_string(&BridgeRequest::Send {
			id,
			to: to.to_string(),
			payload: payload.clone(),
		})?;
		if !self.push(Message::Text(request)) {
			self.pending.lock().remove(&id);
			return Err(Error::TransportClosed(CloseReason::ConnectionLost));
		}

		rx.await
			.map_err(|_| Error::TransportClosed(CloseReason::ConnectionLost))
			.and_then(|result| result)
	}

	async fn close(&self) {
		let was_open = self.open.swap(false, Ordering::SeqCst);
		if let Some(reader) = self.reader.lock().take() {
			reader.abort();
		}
		if was_open {
			if let Ok(frame) = serde_json::to_string(&BridgeRequest::Close) {
				self.push(Message::Text(frame));
			}
		}
		// dropping the sender lets the writer flush and close the socket
		self.outbound.lock().take();
		fail_pending(&self.pending);
		debug!(target = "hub.transport", session = %self.session, "bridge socket released");
	}

	fn is_open(&self) -> bool {
		self.open.load(Ordering::SeqCst)
	}
}
