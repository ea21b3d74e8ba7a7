//! Client-level error types shared by credentials, transports, and request futures.

// self
use crate::{_prelude::*, auth::CredentialError, model::TopicNameError};

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical client error surfaced through [`PubsubFuture`](crate::PubsubFuture) and the
/// builder.
#[derive(Debug, ThisError)]
pub enum Error {
	/// No initial access token could be obtained while constructing the client.
	#[error("Failed to obtain an initial access token.")]
	CredentialAcquisition {
		/// Refresh failure reported by the credential source, if any.
		#[source]
		source: Option<CredentialError>,
	},
	/// A background token refresh failed; the previous token stays in use.
	#[error("Access token refresh failed.")]
	CredentialRefresh(#[source] CredentialError),
	/// Rejected configuration option.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (connect, timeout, protocol, shutdown).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Canonical topic name could not be composed or validated.
	#[error(transparent)]
	InvalidTopic(#[from] TopicNameError),
	/// Request payload could not be encoded.
	#[error(transparent)]
	Encode(#[from] EncodeError),

	/// The service answered with a non-2xx status.
	#[error("Request failed with status {status} {status_text}.")]
	RequestFailed {
		/// HTTP status code.
		status: u16,
		/// HTTP reason phrase.
		status_text: String,
	},
	/// A successful response carried a body that could not be decoded.
	#[error("Service returned a malformed response body.")]
	MalformedResponse {
		/// Decoding failure with the JSON path of the offending field.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// A successful reply carried no resource where one was required.
	#[error("Service returned no resource where one was required.")]
	EmptyResponse,
	/// The request task went away without completing its future.
	#[error("Request was abandoned before completion.")]
	Abandoned,
}

/// Configuration failures raised by [`PubsubBuilder`](crate::PubsubBuilder).
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Compression level outside `-1..=9`.
	#[error("Compression level must be -1 or 0-9, got {level}.")]
	InvalidCompressionLevel {
		/// Rejected level.
		level: i32,
	},
	/// Background refresh period is zero or too large to schedule.
	#[error("Illegal refresh interval {period:?}: {reason}.")]
	InvalidRefreshInterval {
		/// Rejected period.
		period: StdDuration,
		/// Why the period was rejected.
		reason: &'static str,
	},
	/// Connection cap of zero would block every request.
	#[error("Maximum connections must be at least 1.")]
	InvalidMaxConnections,
	/// Service URI is not usable as a base URI.
	#[error("Illegal service URI `{uri}`: {reason}.")]
	InvalidServiceUri {
		/// Rejected URI.
		uri: String,
		/// Why the URI was rejected.
		reason: &'static str,
	},
	/// Service URI could not be parsed.
	#[error("Service URI could not be parsed.")]
	UnparsableServiceUri {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// No transport was supplied and the bundled reqwest transport is disabled.
	#[error("No transport configured; enable the `reqwest` feature or supply one.")]
	MissingTransport,
	/// The client was built outside a Tokio runtime.
	#[error("Client must be built inside a Tokio runtime.")]
	MissingRuntime,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, timeouts, IO, shutdown).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network or protocol failure.
	#[error("Network error occurred while calling the Pub/Sub service.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Connect, read, or request timeout elapsed.
	#[error("Timed out while calling the Pub/Sub service.")]
	Timeout {
		/// Transport-specific timeout error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the Pub/Sub service.")]
	Io(#[from] std::io::Error),
	/// The client was closed while the request was in flight.
	#[error("Client was closed while the request was in flight.")]
	Closed,
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}

	/// Wraps a transport-specific timeout error.
	pub fn timeout(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Timeout { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::timeout(e) } else { Self::network(e) }
	}
}

/// Request payload encoding failures.
#[derive(Debug, ThisError)]
pub enum EncodeError {
	/// Payload could not be serialized to JSON.
	#[error("Payload could not be serialized to JSON.")]
	Json(#[from] serde_json::Error),
	/// Payload could not be gzip-compressed.
	#[error("Payload could not be compressed.")]
	Compress(#[source] std::io::Error),
}
