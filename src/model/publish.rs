//! Publish request and response envelopes.

// self
use crate::{_prelude::*, model::Message};

/// Body of `topics.publish`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
	/// Messages to publish, in order.
	pub messages: Vec<Message>,
}
impl PublishRequest {
	/// Wraps a batch of messages.
	pub fn of(messages: Vec<Message>) -> Self {
		Self { messages }
	}
}

/// Response of `topics.publish`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishResponse {
	/// Server-assigned IDs, in the order the messages were submitted.
	#[serde(default)]
	pub message_ids: Vec<String>,
}
impl PublishResponse {
	/// Consumes the envelope, returning the message IDs.
	pub fn message_ids(self) -> Vec<String> {
		self.message_ids
	}
}
