//! Pub/Sub message record.

// crates.io
use base64::{DecodeError, Engine, engine::general_purpose::STANDARD};
// self
use crate::_prelude::*;

/// A message as published to or delivered from a topic.
///
/// `data` holds the base64 encoding of the payload, as the REST API expects.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
	/// Base64-encoded payload.
	#[serde(default)]
	pub data: String,
	/// Optional string attributes.
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub attributes: BTreeMap<String, String>,
	/// Server-assigned ID, present on delivered messages.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub message_id: Option<String>,
	/// Server-assigned publish time, present on delivered messages.
	#[serde(default, skip_serializing_if = "Option::is_none", with = "time::serde::rfc3339::option")]
	pub publish_time: Option<OffsetDateTime>,
}
impl Message {
	/// Creates a message carrying `payload`.
	pub fn of(payload: impl AsRef<[u8]>) -> Self {
		Self { data: STANDARD.encode(payload), ..Default::default() }
	}

	/// Creates a message from an already base64-encoded payload.
	pub fn of_encoded(data: impl Into<String>) -> Self {
		Self { data: data.into(), ..Default::default() }
	}

	/// Adds an attribute.
	pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.attributes.insert(key.into(), value.into());

		self
	}

	/// Decodes the payload bytes.
	pub fn decoded_data(&self) -> Result<Vec<u8>, DecodeError> {
		STANDARD.decode(&self.data)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn outbound_message_serializes_minimal_fields() {
		let message = Message::of("hello").with_attribute("k", "v");
		let json = serde_json::to_string(&message).expect("Message should serialize.");

		assert_eq!(json, r#"{"data":"aGVsbG8=","attributes":{"k":"v"}}"#);
		assert_eq!(message.decoded_data().expect("Payload should decode."), b"hello");
	}

	#[test]
	fn delivered_message_reads_server_fields() {
		let message: Message = serde_json::from_str(
			r#"{"data":"aGk=","messageId":"42","publishTime":"2024-05-01T12:00:00Z"}"#,
		)
		.expect("Delivered message should decode.");

		assert_eq!(message.message_id.as_deref(), Some("42"));
		assert_eq!(
			message.publish_time.map(OffsetDateTime::unix_timestamp),
			Some(1_714_564_800)
		);
	}
}
