//! Transport seam between the request engine and an HTTP stack.
//!
//! The engine hands a fully built [`OutboundRequest`] to a [`PubsubTransport`] and consumes
//! the [`TransportResponse`] it resolves to: the status line first, then body chunks in
//! arrival order through [`ResponseBody::next_chunk`]. Implementations must be
//! `Send + Sync + 'static`; the client shares one transport across every in-flight request
//! and drives each exchange from its own task. Timeouts are the transport's business and
//! surface as [`TransportError::Timeout`].
//!
//! [`ReqwestTransport`] is the bundled implementation (feature `reqwest`); tests and
//! emulators can plug in anything else through
//! [`PubsubBuilder::transport`](crate::PubsubBuilder::transport).

// std
use std::collections::VecDeque;
// crates.io
#[cfg(feature = "reqwest")] use tokio::sync::{OwnedSemaphorePermit, Semaphore};
// self
use crate::{_prelude::*, error::TransportError};
#[cfg(feature = "reqwest")] use crate::{config::HttpOptions, error::ConfigError};

/// Boxed future returned by transport operations.
pub type TransportFuture<'a, T> =
	Pin<Box<dyn Future<Output = Result<T, TransportError>> + 'a + Send>>;

/// HTTP methods used by the Pub/Sub REST surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
	/// `GET`.
	Get,
	/// `PUT`.
	Put,
	/// `POST`.
	Post,
	/// `DELETE`.
	Delete,
}
impl Method {
	/// Returns the method token.
	pub const fn as_str(self) -> &'static str {
		match self {
			Method::Get => "GET",
			Method::Put => "PUT",
			Method::Post => "POST",
			Method::Delete => "DELETE",
		}
	}

	/// Whether a 404 answer means "absent" rather than failure.
	pub const fn treats_not_found_as_absent(self) -> bool {
		matches!(self, Method::Get | Method::Delete)
	}
}
impl Display for Method {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
#[cfg(feature = "reqwest")]
impl From<Method> for reqwest::Method {
	fn from(method: Method) -> Self {
		match method {
			Method::Get => reqwest::Method::GET,
			Method::Put => reqwest::Method::PUT,
			Method::Post => reqwest::Method::POST,
			Method::Delete => reqwest::Method::DELETE,
		}
	}
}

/// A ready-to-send request. Immutable once handed to the transport.
#[derive(Clone)]
pub struct OutboundRequest {
	/// Request method.
	pub method: Method,
	/// Absolute request URL.
	pub url: String,
	/// Headers in insertion order.
	pub headers: Vec<(String, String)>,
	/// Compressed body, if any.
	pub body: Option<Vec<u8>>,
}
impl OutboundRequest {
	/// Looks up a header value (case-insensitive).
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers
			.iter()
			.find(|(key, _)| key.eq_ignore_ascii_case(name))
			.map(|(_, value)| value.as_str())
	}

	/// Size of the body in bytes (zero when absent).
	pub fn payload_size(&self) -> usize {
		self.body.as_ref().map_or(0, Vec::len)
	}
}
impl Debug for OutboundRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let headers = self
			.headers
			.iter()
			.map(|(key, value)| {
				if key.eq_ignore_ascii_case("authorization") {
					(key.as_str(), "<redacted>")
				} else {
					(key.as_str(), value.as_str())
				}
			})
			.collect::<Vec<_>>();

		f.debug_struct("OutboundRequest")
			.field("method", &self.method)
			.field("url", &self.url)
			.field("headers", &headers)
			.field("payload_size", &self.payload_size())
			.finish()
	}
}

/// Streaming body of a transport response.
pub trait ResponseBody
where
	Self: Send,
{
	/// Yields the next chunk, or `None` once the body is complete.
	fn next_chunk(&mut self) -> TransportFuture<'_, Option<Vec<u8>>>;
}

/// Body whose chunks are already in memory.
#[derive(Clone, Debug, Default)]
pub struct ChunkedBody(VecDeque<Vec<u8>>);
impl ChunkedBody {
	/// Creates a body that yields `chunks` in order.
	pub fn new(chunks: impl IntoIterator<Item = Vec<u8>>) -> Self {
		Self(chunks.into_iter().collect())
	}
}
impl ResponseBody for ChunkedBody {
	fn next_chunk(&mut self) -> TransportFuture<'_, Option<Vec<u8>>> {
		let chunk = self.0.pop_front();

		Box::pin(async move { Ok(chunk) })
	}
}

/// Status line plus streaming body of one response.
pub struct TransportResponse {
	/// HTTP status code.
	pub status: u16,
	/// HTTP reason phrase.
	pub status_text: String,
	/// Body chunks, delivered in arrival order.
	pub body: Box<dyn ResponseBody>,
}
impl TransportResponse {
	/// Builds a response whose body is a single in-memory chunk.
	pub fn buffered(status: u16, status_text: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
		let body = body.into();
		let chunks = if body.is_empty() { Vec::new() } else { vec![body] };

		Self::chunked(status, status_text, chunks)
	}

	/// Builds a response whose body arrives as `chunks`.
	pub fn chunked(status: u16, status_text: impl Into<String>, chunks: Vec<Vec<u8>>) -> Self {
		Self { status, status_text: status_text.into(), body: Box::new(ChunkedBody::new(chunks)) }
	}
}
impl Debug for TransportResponse {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TransportResponse")
			.field("status", &self.status)
			.field("status_text", &self.status_text)
			.finish_non_exhaustive()
	}
}

/// HTTP stack capable of executing Pub/Sub requests.
pub trait PubsubTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends `request`, resolving once the status line is available.
	fn execute(&self, request: OutboundRequest) -> TransportFuture<'_, TransportResponse>;
}

/// reqwest-backed transport honoring [`HttpOptions`].
///
/// `max_connections` is enforced as a cap on concurrently in-flight exchanges; a permit is
/// held until the response body has been fully read or dropped. Waiting for a permit counts
/// against `request_timeout` and fails with [`TransportError::Timeout`] once it elapses.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
	client: ReqwestClient,
	permits: Option<Arc<Semaphore>>,
	permit_timeout: StdDuration,
}
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Builds a reqwest client from the configured options.
	pub fn new(options: &HttpOptions) -> Result<Self, ConfigError> {
		let mut builder = ReqwestClient::builder()
			.gzip(true)
			.timeout(options.request_timeout)
			.read_timeout(options.read_timeout);

		if let Some(timeout) = options.connect_timeout {
			builder = builder.connect_timeout(timeout);
		}
		if let Some(timeout) = options.pooled_connection_idle_timeout {
			builder = builder.pool_idle_timeout(timeout);
		}
		if !options.allow_pooling_connections {
			builder = builder.pool_max_idle_per_host(0);
		} else if let Some(max) = options.max_connections_per_host {
			builder = builder.pool_max_idle_per_host(max);
		}

		Self::with_options(builder.build()?, options)
	}

	/// Wraps an existing reqwest client, applying only the connection cap from `options`.
	///
	/// Timeouts and pooling stay whatever `client` was built with; `request_timeout` still
	/// bounds the wait for a connection permit.
	pub fn with_options(client: ReqwestClient, options: &HttpOptions) -> Result<Self, ConfigError> {
		let permits = match options.max_connections {
			Some(0) => return Err(ConfigError::InvalidMaxConnections),
			Some(max) => Some(Arc::new(Semaphore::new(max))),
			None => None,
		};

		Ok(Self { client, permits, permit_timeout: options.request_timeout })
	}

	/// Wraps an existing reqwest client without a concurrency cap.
	pub fn with_client(client: ReqwestClient) -> Self {
		Self { client, permits: None, permit_timeout: crate::config::DEFAULT_TIMEOUT }
	}
}
#[cfg(feature = "reqwest")]
impl PubsubTransport for ReqwestTransport {
	fn execute(&self, request: OutboundRequest) -> TransportFuture<'_, TransportResponse> {
		Box::pin(async move {
			let permit = match &self.permits {
				Some(permits) => Some(
					tokio::time::timeout(self.permit_timeout, Arc::clone(permits).acquire_owned())
						.await
						.map_err(TransportError::timeout)?
						.map_err(|_| TransportError::Closed)?,
				),
				None => None,
			};
			let mut builder = self.client.request(request.method.into(), request.url.as_str());

			for (name, value) in &request.headers {
				builder = builder.header(name.as_str(), value.as_str());
			}
			if let Some(body) = request.body {
				builder = builder.body(body);
			}

			let response = builder.send().await?;
			let status = response.status();

			Ok(TransportResponse {
				status: status.as_u16(),
				status_text: status.canonical_reason().unwrap_or_default().to_owned(),
				body: Box::new(ReqwestBody { response, _permit: permit }),
			})
		})
	}
}

#[cfg(feature = "reqwest")]
struct ReqwestBody {
	response: reqwest::Response,
	_permit: Option<OwnedSemaphorePermit>,
}
#[cfg(feature = "reqwest")]
impl ResponseBody for ReqwestBody {
	fn next_chunk(&mut self) -> TransportFuture<'_, Option<Vec<u8>>> {
		Box::pin(async move {
			let chunk = self.response.chunk().await?;

			Ok(chunk.map(|bytes| bytes.to_vec()))
		})
	}
}
