//! Opaque credential material.
//!
//! Only the transport and the auth-state bridge care what is inside a
//! credential. Everything else moves it around as bytes, serialized as a
//! standard base64 string.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Durable credential blob that lets a transport reconnect without a new challenge.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Credential(Vec<u8>);

impl Credential {
	pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
		Self(bytes.into())
	}

	pub fn as_bytes(&self) -> &[u8] {
		&self.0
	}

	pub fn into_bytes(self) -> Vec<u8> {
		self.0
	}

	/// An empty blob is treated the same as no credential at all.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}
}

// Never print credential contents.
impl fmt::Debug for Credential {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Credential({} bytes)", self.0.len())
	}
}

impl From<Vec<u8>> for Credential {
	fn from(bytes: Vec<u8>) -> Self {
		Self(bytes)
	}
}

impl From<&str> for Credential {
	fn from(value: &str) -> Self {
		Self(value.as_bytes().to_vec())
	}
}

impl Serialize for Credential {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		base64_bytes::serialize(&self.0, serializer)
	}
}

impl<'de> Deserialize<'de> for Credential {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		base64_bytes::deserialize(deserializer).map(Self)
	}
}

/// Serde adapter for `Vec<u8>` fields carried as base64 strings.
pub mod base64_bytes {
	use base64::Engine;
	use base64::engine::general_purpose::STANDARD;
	use serde::{Deserialize, Deserializer, Serializer, de};

	pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&STANDARD.encode(bytes))
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
		let encoded = String::deserialize(deserializer)?;
		STANDARD.decode(encoded.as_bytes()).map_err(de::Error::custom)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn credential_serializes_as_base64_string() {
		let credential = Credential::from("noise-key");
		let json = serde_json::to_value(&credential).unwrap();
		assert_eq!(json, serde_json::json!("bm9pc2Uta2V5"));

		let back: Credential = serde_json::from_value(json).unwrap();
		assert_eq!(back, credential);
	}

	#[test]
	fn credential_rejects_invalid_base64() {
		let result = serde_json::from_value::<Credential>(serde_json::json!("not base64!"));
		assert!(result.is_err());
	}

	#[test]
	fn debug_output_hides_contents() {
		let credential = Credential::from("secret");
		assert_eq!(format!("{credential:?}"), "Credential(6 bytes)");
	}
}
