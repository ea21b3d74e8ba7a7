//! Optional observability helpers for client requests.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `pubsub_client.request` with the
//!   `operation`, `method`, `url`, and `payload_size` fields, plus lifecycle events
//!   (configuration, token refresh, shutdown).
//! - Enable `metrics` to increment the `pubsub_client_request_total` counter for every
//!   attempt/success/not-found/failure, labeled by `operation` + `outcome`.

mod metrics;
mod tracing;

pub use self::metrics::*;
pub use self::tracing::*;

// self
use crate::_prelude::*;

/// Client operations observed by spans and metrics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
	/// `topics.list`.
	ListTopics,
	/// `topics.create`.
	CreateTopic,
	/// `topics.get`.
	GetTopic,
	/// `topics.delete`.
	DeleteTopic,
	/// `topics.publish`.
	Publish,
}
impl Operation {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Operation::ListTopics => "list_topics",
			Operation::CreateTopic => "create_topic",
			Operation::GetTopic => "get_topic",
			Operation::DeleteTopic => "delete_topic",
			Operation::Publish => "publish",
		}
	}
}
impl Display for Operation {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestOutcome {
	/// Request handed to the transport.
	Attempt,
	/// Future completed with a value.
	Success,
	/// Future completed with the not-found absence value.
	NotFound,
	/// Future completed with an error.
	Failure,
}
impl RequestOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RequestOutcome::Attempt => "attempt",
			RequestOutcome::Success => "success",
			RequestOutcome::NotFound => "not_found",
			RequestOutcome::Failure => "failure",
		}
	}
}
impl Display for RequestOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
