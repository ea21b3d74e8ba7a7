//! Per-request response state machine.
//!
//! ```text
//! AwaitingStatus ──2xx, body expected──▶ AwaitingBody ──body complete──▶ Completed
//!        │                                    │
//!        ├─404 on GET/DELETE ─────────────────┼──────────────────────────▶ Completed
//!        ├─non-2xx ───────────────────────────┼──────────────────────────▶ Completed
//!        ├─2xx, no content expected ──────────┼──────────────────────────▶ Completed
//!        └─transport failure (any state) ─────┴──────────────────────────▶ Completed
//! ```
//!
//! Each event handler returns a [`Flow`] telling the driver whether to keep feeding events.
//! Events arriving after `Completed`, or after the future was settled elsewhere, are
//! ignored.

// self
use crate::{
	_prelude::*,
	error::TransportError,
	future::Completer,
	http::{Method, TransportResponse},
	obs::RequestOutcome,
};

/// What the caller declared it expects in a successful response body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Expect {
	/// A JSON document decoded into the response type.
	Json,
	/// Nothing; the body is discarded.
	NoContent,
}

/// Success value of an interpreted response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply<T> {
	/// Decoded response body.
	Value(T),
	/// 2xx response for a request that expects no content.
	Empty,
	/// 404 for a GET or DELETE request.
	NotFound,
}
impl<T> Reply<T> {
	/// Returns the decoded value, failing with [`Error::EmptyResponse`] when there is none.
	pub fn into_required(self) -> Result<T> {
		match self {
			Reply::Value(value) => Ok(value),
			Reply::Empty | Reply::NotFound => Err(Error::EmptyResponse),
		}
	}

	/// Maps "not found" to `None` and any other reply to `Some`, carrying the value if any.
	pub fn found(self) -> Option<Option<T>> {
		match self {
			Reply::Value(value) => Some(Some(value)),
			Reply::Empty => Some(None),
			Reply::NotFound => None,
		}
	}

	/// Returns the decoded value, or `None` for empty and not-found replies.
	pub fn into_value(self) -> Option<T> {
		match self {
			Reply::Value(value) => Some(value),
			Reply::Empty | Reply::NotFound => None,
		}
	}
}

/// Interpreter states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
	/// Waiting for the status line.
	AwaitingStatus,
	/// Accumulating body chunks.
	AwaitingBody,
	/// Terminal.
	Completed,
}

/// Whether the driver should keep delivering events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
	/// Keep going.
	Continue,
	/// Stop; any remaining body is discarded.
	Abort,
}

/// Drives one request's [`Completer`] from transport events.
pub struct ResponseInterpreter<T> {
	method: Method,
	expect: Expect,
	state: State,
	body: Vec<u8>,
	completer: Completer<Reply<T>>,
	outcome: Option<RequestOutcome>,
}
impl<T> ResponseInterpreter<T>
where
	T: DeserializeOwned,
{
	/// Creates an interpreter for a request sent with `method`.
	pub fn new(method: Method, expect: Expect, completer: Completer<Reply<T>>) -> Self {
		Self {
			method,
			expect,
			state: State::AwaitingStatus,
			body: Vec::new(),
			completer,
			outcome: None,
		}
	}

	/// Current state.
	pub fn state(&self) -> State {
		self.state
	}

	/// How this interpreter settled the future, if it was the one to settle it.
	pub fn outcome(&self) -> Option<RequestOutcome> {
		self.outcome
	}

	/// The transport failed (connect, timeout, protocol, body read).
	pub fn on_failure(&mut self, error: TransportError) -> Flow {
		if self.is_done() {
			return Flow::Abort;
		}

		self.complete_with(Err(error.into()))
	}

	/// The status line arrived.
	pub fn on_status(&mut self, status: u16, status_text: &str) -> Flow {
		if self.state != State::AwaitingStatus || self.completer.is_terminal() {
			return self.halt();
		}
		if status == 404 && self.method.treats_not_found_as_absent() {
			return self.complete_with(Ok(Reply::NotFound));
		}
		if !(200..300).contains(&status) {
			return self.complete_with(Err(Error::RequestFailed {
				status,
				status_text: status_text.to_owned(),
			}));
		}
		if self.expect == Expect::NoContent {
			return self.complete_with(Ok(Reply::Empty));
		}

		self.state = State::AwaitingBody;

		Flow::Continue
	}

	/// A body chunk arrived.
	pub fn on_body_chunk(&mut self, chunk: &[u8]) -> Flow {
		if self.state != State::AwaitingBody || self.completer.is_terminal() {
			return self.halt();
		}

		self.body.extend_from_slice(chunk);

		Flow::Continue
	}

	/// The body is complete.
	pub fn on_completed(&mut self) -> Flow {
		if self.state != State::AwaitingBody || self.completer.is_terminal() {
			return self.halt();
		}

		let body = std::mem::take(&mut self.body);
		let mut deserializer = serde_json::Deserializer::from_slice(&body);
		let decoded = serde_path_to_error::deserialize(&mut deserializer)
			.map(Reply::Value)
			.map_err(|source| Error::MalformedResponse { source });

		self.complete_with(decoded)
	}

	/// Feeds an entire transport response through the state machine.
	pub async fn drive(&mut self, response: TransportResponse) {
		let TransportResponse { status, status_text, mut body } = response;

		if self.on_status(status, &status_text) == Flow::Abort {
			return;
		}

		loop {
			let flow = match body.next_chunk().await {
				Ok(Some(chunk)) => self.on_body_chunk(&chunk),
				Ok(None) => {
					self.on_completed();

					return;
				},
				Err(e) => self.on_failure(e),
			};

			if flow == Flow::Abort {
				return;
			}
		}
	}

	fn is_done(&self) -> bool {
		self.state == State::Completed || self.completer.is_terminal()
	}

	fn halt(&mut self) -> Flow {
		self.state = State::Completed;
		self.body = Vec::new();

		Flow::Abort
	}

	fn complete_with(&mut self, result: Result<Reply<T>>) -> Flow {
		let outcome = match &result {
			Ok(Reply::NotFound) => RequestOutcome::NotFound,
			Ok(_) => RequestOutcome::Success,
			Err(_) => RequestOutcome::Failure,
		};
		let settled = match result {
			Ok(reply) => self.completer.succeed(reply),
			Err(e) => self.completer.fail(e),
		};

		if settled {
			self.outcome = Some(outcome);
		}

		self.halt()
	}
}
impl<T> Debug for ResponseInterpreter<T> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ResponseInterpreter")
			.field("method", &self.method)
			.field("expect", &self.expect)
			.field("state", &self.state)
			.field("buffered", &self.body.len())
			.field("outcome", &self.outcome)
			.finish()
	}
}
