//! Outbound message payloads.
//!
//! Binary content must already be in memory; resolving URLs or file paths
//! into bytes happens before a payload is built.

use serde::{Deserialize, Serialize};

use crate::credential::base64_bytes;

/// Content of one outbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
	Text {
		text: String,
	},
	Image {
		#[serde(with = "base64_bytes")]
		data: Vec<u8>,
		mimetype: String,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		caption: Option<String>,
	},
	Document {
		#[serde(with = "base64_bytes")]
		data: Vec<u8>,
		mimetype: String,
		filename: String,
	},
}

impl Payload {
	pub fn text(text: impl Into<String>) -> Self {
		Payload::Text { text: text.into() }
	}

	pub fn kind(&self) -> &'static str {
		match self {
			Payload::Text { .. } => "text",
			Payload::Image { .. } => "image",
			Payload::Document { .. } => "document",
		}
	}

	/// Returns true when the payload carries nothing to deliver.
	pub fn is_empty(&self) -> bool {
		match self {
			Payload::Text { text } => text.is_empty(),
			Payload::Image { data, .. } | Payload::Document { data, .. } => data.is_empty(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn document_payload_carries_base64_data() {
		let json = serde_json::json!({
			"type": "document",
			"data": "JVBERi0=",
			"mimetype": "application/pdf",
			"filename": "invoice.pdf"
		});
		let payload: Payload = serde_json::from_value(json).unwrap();
		match &payload {
			Payload::Document { data, filename, .. } => {
				assert_eq!(data, b"%PDF-");
				assert_eq!(filename, "invoice.pdf");
			}
			other => panic!("expected document, got {other:?}"),
		}
		assert_eq!(payload.kind(), "document");
	}

	#[test]
	fn empty_text_is_empty() {
		assert!(Payload::text("").is_empty());
		assert!(!Payload::text("hi").is_empty());
	}
}
