//! Frames exchanged with an external protocol bridge over WebSocket.
//!
//! The bridge owns the messaging wire protocol. Each session gets its own
//! socket. The exchange is simple:
//!
//! 1. Client connects and sends [`BridgeRequest::Hello`] with the stored credential (if any)
//! 2. Bridge streams [`TransportEvent`]s for that session
//! 3. Client sends [`BridgeRequest::Send`] with a request id; bridge answers with a [`BridgeResponse`]
//! 4. Client sends [`BridgeRequest::Close`] before dropping the socket
//!
//! Responses are distinguished from events by the presence of an `id` field:
//! ```json
//! { "id": 7, "result": { "messageId": "3EB0C431" } }
//! { "type": "challenge", "value": "2@b2x..." }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::credential::Credential;
use crate::payload::Payload;
use crate::transport::TransportEvent;

/// Frame sent from the supervisor side to the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeRequest {
	/// Opens the session; `credential` is absent when pairing must start from a challenge.
	Hello {
		session: String,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		credential: Option<Credential>,
	},
	/// Delivers one payload to `to`.
	Send { id: u32, to: String, payload: Payload },
	/// Asks the bridge to tear the session connection down.
	Close,
}

/// Answer to a [`BridgeRequest::Send`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeResponse {
	pub id: u32,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub result: Option<Value>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

/// Frame received from the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BridgeMessage {
	/// Response message (has `id` field)
	Response(BridgeResponse),
	/// Event message (no `id` field)
	Event(TransportEvent),
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn response_and_event_are_told_apart_by_id() {
		let response: BridgeMessage = serde_json::from_str(r#"{"id": 3, "result": {"ok": true}}"#).unwrap();
		match response {
			BridgeMessage::Response(resp) => {
				assert_eq!(resp.id, 3);
				assert_eq!(resp.result.unwrap()["ok"], true);
				assert!(resp.error.is_none());
			}
			other => panic!("expected response, got {other:?}"),
		}

		let event: BridgeMessage = serde_json::from_str(r#"{"type": "challenge", "value": "2@abc"}"#).unwrap();
		match event {
			BridgeMessage::Event(TransportEvent::Challenge { value }) => assert_eq!(value, "2@abc"),
			other => panic!("expected challenge event, got {other:?}"),
		}
	}

	#[test]
	fn hello_omits_missing_credential() {
		let hello = BridgeRequest::Hello {
			session: "ops".to_string(),
			credential: None,
		};
		let json = serde_json::to_value(&hello).unwrap();
		assert_eq!(json, serde_json::json!({ "type": "hello", "session": "ops" }));
	}

	#[test]
	fn send_request_wire_shape() {
		let send = BridgeRequest::Send {
			id: 0,
			to: "15551234567".to_string(),
			payload: Payload::text("hello"),
		};
		let json = serde_json::to_value(&send).unwrap();
		assert_eq!(json["type"], "send");
		assert_eq!(json["payload"]["type"], "text");
		assert_eq!(json["payload"]["text"], "hello");
	}
}
