//! Shared fixtures for the integration tests.

#![allow(dead_code)]

// std
use std::{
	collections::{HashMap, VecDeque},
	io::{self, Read},
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
};
// crates.io
use flate2::read::GzDecoder;
use parking_lot::Mutex;
use time::Duration;
// self
use pubsub_client::{
	Pubsub, PubsubBuilder,
	auth::{CredentialError, CredentialFuture, CredentialSource, StaticCredential, TokenSecret},
	error::TransportError,
	http::{OutboundRequest, PubsubTransport, TransportFuture, TransportResponse},
};

/// Base URI used by stubbed clients.
pub const BASE_URI: &str = "https://pubsub.test/v1/";
/// Token handed out by [`StaticCredential`] fixtures.
pub const TOKEN: &str = "test-token";

enum Scripted {
	Respond { status: u16, status_text: String, chunks: Vec<Vec<u8>> },
	Timeout,
	Hang,
}

struct Route {
	status: u16,
	status_text: String,
	body: Vec<u8>,
	stall: usize,
}

/// Transport that records every request and answers it by URL route or from a script.
///
/// Routes match the full request URL and answer every matching request; everything else is
/// served from the script in order. Unscripted requests get `500 Unscripted`.
#[derive(Default)]
pub struct StubTransport {
	routes: Mutex<HashMap<String, Route>>,
	script: Mutex<VecDeque<Scripted>>,
	requests: Mutex<Vec<OutboundRequest>>,
}
impl StubTransport {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	pub fn respond(&self, status: u16, status_text: &str, body: impl Into<Vec<u8>>) -> &Self {
		let body = body.into();
		let chunks = if body.is_empty() { Vec::new() } else { vec![body] };

		self.respond_chunked(status, status_text, chunks)
	}

	pub fn respond_chunked(&self, status: u16, status_text: &str, chunks: Vec<Vec<u8>>) -> &Self {
		self.script.lock().push_back(Scripted::Respond {
			status,
			status_text: status_text.to_owned(),
			chunks,
		});

		self
	}

	/// Answers every request for `BASE_URI` + `path` with `body`, after yielding to the
	/// scheduler `stall` times.
	pub fn route(
		&self,
		path: &str,
		stall: usize,
		status: u16,
		status_text: &str,
		body: impl Into<Vec<u8>>,
	) -> &Self {
		self.routes.lock().insert(
			format!("{BASE_URI}{path}"),
			Route { status, status_text: status_text.to_owned(), body: body.into(), stall },
		);

		self
	}

	pub fn time_out(&self) -> &Self {
		self.script.lock().push_back(Scripted::Timeout);

		self
	}

	pub fn hang(&self) -> &Self {
		self.script.lock().push_back(Scripted::Hang);

		self
	}

	pub fn requests(&self) -> Vec<OutboundRequest> {
		self.requests.lock().clone()
	}

	pub fn last_request(&self) -> OutboundRequest {
		self.requests.lock().last().cloned().expect("At least one request should have been sent.")
	}
}
impl PubsubTransport for StubTransport {
	fn execute(&self, request: OutboundRequest) -> TransportFuture<'_, TransportResponse> {
		let routed = self.routes.lock().get(&request.url).map(|route| {
			(route.status, route.status_text.clone(), route.body.clone(), route.stall)
		});

		self.requests.lock().push(request);

		if let Some((status, status_text, body, stall)) = routed {
			return Box::pin(async move {
				for _ in 0..stall {
					tokio::task::yield_now().await;
				}

				Ok(TransportResponse::buffered(status, status_text, body))
			});
		}

		let next = self.script.lock().pop_front();

		Box::pin(async move {
			match next {
				Some(Scripted::Respond { status, status_text, chunks }) =>
					Ok(TransportResponse::chunked(status, status_text, chunks)),
				Some(Scripted::Timeout) => Err(TransportError::timeout(io::Error::new(
					io::ErrorKind::TimedOut,
					"stubbed timeout",
				))),
				Some(Scripted::Hang) => std::future::pending().await,
				None => Ok(TransportResponse::buffered(500, "Unscripted", Vec::new())),
			}
		})
	}
}

/// Credential that mints `token-{n}` on every refresh and always reports `expires_in`.
pub struct CountingCredential {
	refreshes: AtomicUsize,
	token: Mutex<Option<TokenSecret>>,
	expires_in: Duration,
	fail: bool,
}
impl CountingCredential {
	pub fn new(expires_in: Duration) -> Arc<Self> {
		Arc::new(Self {
			refreshes: AtomicUsize::new(0),
			token: Mutex::new(None),
			expires_in,
			fail: false,
		})
	}

	pub fn failing() -> Arc<Self> {
		Arc::new(Self {
			refreshes: AtomicUsize::new(0),
			token: Mutex::new(None),
			expires_in: Duration::hours(1),
			fail: true,
		})
	}

	pub fn refreshes(&self) -> usize {
		self.refreshes.load(Ordering::SeqCst)
	}
}
impl CredentialSource for CountingCredential {
	fn access_token(&self) -> Option<TokenSecret> {
		self.token.lock().clone()
	}

	fn expires_in(&self) -> Option<Duration> {
		self.token.lock().as_ref().map(|_| self.expires_in)
	}

	fn refresh(&self) -> CredentialFuture<'_, ()> {
		Box::pin(async move {
			let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;

			if self.fail {
				return Err(CredentialError::Refresh { message: format!("attempt {n} refused") });
			}

			*self.token.lock() = Some(TokenSecret::new(format!("token-{n}")));

			Ok(())
		})
	}
}

/// Builder wired to `transport`, a static token, and [`BASE_URI`].
pub fn stub_builder(transport: Arc<StubTransport>) -> PubsubBuilder {
	Pubsub::builder()
		.uri_str(BASE_URI)
		.expect("Stub base URI should be accepted.")
		.credential(Arc::new(StaticCredential::new(TOKEN)))
		.transport(transport)
}

pub async fn stub_client(transport: Arc<StubTransport>) -> Pubsub {
	stub_builder(transport).build().await.expect("Stubbed client should build.")
}

pub fn gunzip(bytes: &[u8]) -> String {
	let mut out = String::new();

	GzDecoder::new(bytes).read_to_string(&mut out).expect("Request body should be valid gzip.");

	out
}
