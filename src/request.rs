//! Request construction: URL composition, gzip-compressed JSON bodies, and auth headers.

// std
use std::io::Write;
// crates.io
use flate2::{Compression, write::GzEncoder};
// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	error::{ConfigError, EncodeError},
	http::{Method, OutboundRequest},
};

/// `User-Agent` sent with every request; advertises gzip support.
pub const USER_AGENT: &str = concat!("pubsub-client-rs/", env!("CARGO_PKG_VERSION"), " (gzip)");
/// `Content-Type` of every request body.
pub const APPLICATION_JSON_UTF8: &str = "application/json; charset=UTF-8";
/// `Content-Encoding` of every request body.
pub const GZIP: &str = "gzip";

/// Validated gzip level: `-1` for the library default, otherwise `0..=9`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompressionLevel(i32);
impl CompressionLevel {
	/// Library default level.
	pub const DEFAULT: Self = Self(-1);

	/// Validates `level`.
	pub fn new(level: i32) -> Result<Self, ConfigError> {
		if (-1..=9).contains(&level) {
			Ok(Self(level))
		} else {
			Err(ConfigError::InvalidCompressionLevel { level })
		}
	}

	/// Raw level value.
	pub fn get(self) -> i32 {
		self.0
	}

	fn compression(self) -> Compression {
		match u32::try_from(self.0) {
			Ok(level) => Compression::new(level),
			Err(_) => Compression::default(),
		}
	}
}
impl Default for CompressionLevel {
	fn default() -> Self {
		Self::DEFAULT
	}
}

/// Turns `(method, path, payload)` into an [`OutboundRequest`].
#[derive(Clone, Debug)]
pub struct RequestBuilder {
	base_uri: String,
	compression: CompressionLevel,
}
impl RequestBuilder {
	/// Creates a builder rooted at `base_uri`; `path` fragments are appended verbatim.
	pub fn new(base_uri: impl Into<String>, compression: CompressionLevel) -> Self {
		Self { base_uri: base_uri.into(), compression }
	}

	/// Base URI every path is appended to.
	pub fn base_uri(&self) -> &str {
		&self.base_uri
	}

	/// Builds a request without a body.
	pub fn build(&self, method: Method, path: &str, token: &TokenSecret) -> OutboundRequest {
		OutboundRequest {
			method,
			url: format!("{}{path}", self.base_uri),
			headers: vec![
				("Authorization".into(), token.bearer()),
				("User-Agent".into(), USER_AGENT.into()),
			],
			body: None,
		}
	}

	/// Builds a request carrying `payload` as gzip-compressed JSON.
	pub fn build_with_payload<P>(
		&self,
		method: Method,
		path: &str,
		token: &TokenSecret,
		payload: &P,
	) -> Result<OutboundRequest, EncodeError>
	where
		P: ?Sized + Serialize,
	{
		let body = self.gzip_json(payload)?;
		let mut request = self.build(method, path, token);

		request.headers.push(("Content-Encoding".into(), GZIP.into()));
		request.headers.push(("Content-Length".into(), body.len().to_string()));
		request.headers.push(("Content-Type".into(), APPLICATION_JSON_UTF8.into()));
		request.body = Some(body);

		Ok(request)
	}

	fn gzip_json<P>(&self, payload: &P) -> Result<Vec<u8>, EncodeError>
	where
		P: ?Sized + Serialize,
	{
		let mut encoder = GzEncoder::new(Vec::new(), self.compression.compression());

		serde_json::to_writer(&mut encoder, payload)?;
		encoder.flush().map_err(EncodeError::Compress)?;

		encoder.finish().map_err(EncodeError::Compress)
	}
}
