//! Client configuration and the async [`PubsubBuilder`].

// crates.io
use tokio::runtime::Handle;
// self
use crate::{
	_prelude::*,
	auth::{CredentialManager, CredentialSource, DEFAULT_REFRESH_INTERVAL},
	client::Pubsub,
	error::ConfigError,
	http::PubsubTransport,
	obs,
	request::{CompressionLevel, RequestBuilder},
};

/// Production Pub/Sub REST endpoint.
pub const DEFAULT_URI: &str = "https://pubsub.googleapis.com/v1/";
/// Default read and whole-request timeout.
pub const DEFAULT_TIMEOUT: StdDuration = StdDuration::from_secs(30);

/// Connection-level options handed to the bundled transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpOptions {
	/// Connect timeout; `None` keeps the transport default.
	pub connect_timeout: Option<StdDuration>,
	/// Per-read timeout.
	pub read_timeout: StdDuration,
	/// Whole-request timeout.
	pub request_timeout: StdDuration,
	/// Cap on concurrently in-flight exchanges; `None` is unlimited.
	pub max_connections: Option<usize>,
	/// Idle connections kept per host; `None` keeps the transport default.
	pub max_connections_per_host: Option<usize>,
	/// Maximum lifetime of a pooled connection. Advisory only.
	pub pooled_connection_ttl: Option<StdDuration>,
	/// How long an idle pooled connection is kept.
	pub pooled_connection_idle_timeout: Option<StdDuration>,
	/// Whether idle connections are pooled at all.
	pub allow_pooling_connections: bool,
	/// Preferred TLS cipher suites. Advisory only; rustls negotiates its own set.
	pub enabled_cipher_suites: Vec<String>,
}
impl Default for HttpOptions {
	fn default() -> Self {
		Self {
			connect_timeout: None,
			read_timeout: DEFAULT_TIMEOUT,
			request_timeout: DEFAULT_TIMEOUT,
			max_connections: None,
			max_connections_per_host: None,
			pooled_connection_ttl: None,
			pooled_connection_idle_timeout: None,
			allow_pooling_connections: true,
			enabled_cipher_suites: Vec::new(),
		}
	}
}

/// Builder for [`Pubsub`] clients.
///
/// Setters that can reject their input return `Result<Self, ConfigError>` so invalid values
/// fail at configuration time instead of at the first request.
pub struct PubsubBuilder {
	uri: Option<Url>,
	http: HttpOptions,
	compression: CompressionLevel,
	refresh_interval: StdDuration,
	credential: Option<Arc<dyn CredentialSource>>,
	transport: Option<Arc<dyn PubsubTransport>>,
}
impl PubsubBuilder {
	/// Creates a builder with production defaults.
	pub fn new() -> Self {
		Self {
			uri: None,
			http: HttpOptions::default(),
			compression: CompressionLevel::DEFAULT,
			refresh_interval: DEFAULT_REFRESH_INTERVAL,
			credential: None,
			transport: None,
		}
	}

	/// Sets the service base URI. A trailing `/` is appended when missing.
	pub fn uri(mut self, uri: Url) -> Result<Self, ConfigError> {
		self.uri = Some(normalize_uri(uri)?);

		Ok(self)
	}

	/// Parses and sets the service base URI.
	pub fn uri_str(self, uri: &str) -> Result<Self, ConfigError> {
		let uri = Url::parse(uri).map_err(|source| ConfigError::UnparsableServiceUri { source })?;

		self.uri(uri)
	}

	/// Sets the connect timeout.
	pub fn connect_timeout(mut self, timeout: StdDuration) -> Self {
		self.http.connect_timeout = Some(timeout);

		self
	}

	/// Sets the per-read timeout.
	pub fn read_timeout(mut self, timeout: StdDuration) -> Self {
		self.http.read_timeout = timeout;

		self
	}

	/// Sets the whole-request timeout.
	pub fn request_timeout(mut self, timeout: StdDuration) -> Self {
		self.http.request_timeout = timeout;

		self
	}

	/// Caps the number of concurrently in-flight exchanges. The cap must be at least 1.
	pub fn max_connections(mut self, max: usize) -> Result<Self, ConfigError> {
		if max == 0 {
			return Err(ConfigError::InvalidMaxConnections);
		}

		self.http.max_connections = Some(max);

		Ok(self)
	}

	/// Sets the idle pool size per host.
	pub fn max_connections_per_host(mut self, max: usize) -> Self {
		self.http.max_connections_per_host = Some(max);

		self
	}

	/// Records a pooled-connection lifetime.
	pub fn pooled_connection_ttl(mut self, ttl: StdDuration) -> Self {
		self.http.pooled_connection_ttl = Some(ttl);

		self
	}

	/// Sets how long idle pooled connections are kept.
	pub fn pooled_connection_idle_timeout(mut self, timeout: StdDuration) -> Self {
		self.http.pooled_connection_idle_timeout = Some(timeout);

		self
	}

	/// Enables or disables idle connection pooling.
	pub fn allow_pooling_connections(mut self, allow: bool) -> Self {
		self.http.allow_pooling_connections = allow;

		self
	}

	/// Records preferred TLS cipher suites.
	pub fn enabled_cipher_suites<I, S>(mut self, suites: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.http.enabled_cipher_suites = suites.into_iter().map(Into::into).collect();

		self
	}

	/// Sets the gzip level for request bodies: `-1` for the default, otherwise `0..=9`.
	pub fn compression_level(mut self, level: i32) -> Result<Self, ConfigError> {
		self.compression = CompressionLevel::new(level)?;

		Ok(self)
	}

	/// Sets the background token check period.
	///
	/// The period must be non-zero and small enough to schedule from now.
	pub fn refresh_interval(mut self, period: StdDuration) -> Result<Self, ConfigError> {
		let invalid = |reason| ConfigError::InvalidRefreshInterval { period, reason };

		if period.is_zero() {
			return Err(invalid("must be non-zero"));
		}
		if std::time::Instant::now().checked_add(period).is_none() {
			return Err(invalid("too large to schedule"));
		}

		self.refresh_interval = period;

		Ok(self)
	}

	/// Uses `credential` instead of application default credentials.
	pub fn credential(mut self, credential: Arc<dyn CredentialSource>) -> Self {
		self.credential = Some(credential);

		self
	}

	/// Uses `transport` instead of the bundled reqwest transport.
	pub fn transport(mut self, transport: Arc<dyn PubsubTransport>) -> Self {
		self.transport = Some(transport);

		self
	}

	/// Connection options collected so far.
	pub fn http_options(&self) -> &HttpOptions {
		&self.http
	}

	/// Acquires the initial token, starts the background refresh task, and returns the client.
	///
	/// Must run inside a Tokio runtime; that runtime hosts every task the client spawns.
	pub async fn build(self) -> Result<Pubsub> {
		let runtime = Handle::try_current().map_err(|_| ConfigError::MissingRuntime)?;
		let transport = match self.transport {
			Some(transport) => transport,
			None => default_transport(&self.http)?,
		};
		let credential = match self.credential {
			Some(credential) => credential,
			None => default_credential()?,
		};
		let uri = match self.uri {
			Some(uri) => uri,
			None => Url::parse(DEFAULT_URI)
				.map_err(|source| ConfigError::UnparsableServiceUri { source })?,
		};
		let credentials = Arc::new(CredentialManager::initialize(credential).await?);
		let requests = RequestBuilder::new(uri.as_str(), self.compression);

		obs::event!(
			debug,
			uri = %uri,
			compression_level = self.compression.get(),
			refresh_interval = ?self.refresh_interval,
			http = ?self.http,
			"Pub/Sub client configured."
		);

		if self.http.pooled_connection_ttl.is_some() || !self.http.enabled_cipher_suites.is_empty()
		{
			obs::event!(
				warn,
				pooled_connection_ttl = ?self.http.pooled_connection_ttl,
				enabled_cipher_suites = ?self.http.enabled_cipher_suites,
				"Connection TTL and cipher suites are advisory and not enforced by the transport."
			);
		}

		Ok(Pubsub::start(transport, requests, credentials, runtime, self.refresh_interval))
	}
}
impl Default for PubsubBuilder {
	fn default() -> Self {
		Self::new()
	}
}
impl Debug for PubsubBuilder {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PubsubBuilder")
			.field("uri", &self.uri.as_ref().map_or(DEFAULT_URI, Url::as_str))
			.field("http", &self.http)
			.field("compression", &self.compression)
			.field("refresh_interval", &self.refresh_interval)
			.field("custom_credential", &self.credential.is_some())
			.field("custom_transport", &self.transport.is_some())
			.finish()
	}
}

fn normalize_uri(mut uri: Url) -> Result<Url, ConfigError> {
	let invalid = |uri: &Url, reason| ConfigError::InvalidServiceUri { uri: uri.to_string(), reason };

	if uri.cannot_be_a_base() {
		return Err(invalid(&uri, "not a base URI"));
	}
	if !matches!(uri.scheme(), "http" | "https") {
		return Err(invalid(&uri, "scheme must be http or https"));
	}
	if uri.query().is_some() {
		return Err(invalid(&uri, "query strings are not allowed"));
	}
	if uri.fragment().is_some() {
		return Err(invalid(&uri, "fragments are not allowed"));
	}
	if !uri.path().ends_with('/') {
		let path = format!("{}/", uri.path());

		uri.set_path(&path);
	}

	Ok(uri)
}

#[cfg(feature = "reqwest")]
fn default_transport(options: &HttpOptions) -> Result<Arc<dyn PubsubTransport>, ConfigError> {
	Ok(Arc::new(crate::http::ReqwestTransport::new(options)?))
}
#[cfg(not(feature = "reqwest"))]
fn default_transport(_: &HttpOptions) -> Result<Arc<dyn PubsubTransport>, ConfigError> {
	Err(ConfigError::MissingTransport)
}

#[cfg(feature = "reqwest")]
fn default_credential() -> Result<Arc<dyn CredentialSource>> {
	let credential = crate::auth::AuthorizedUserCredential::application_default()
		.map_err(|e| Error::CredentialAcquisition { source: Some(e) })?;

	Ok(Arc::new(credential))
}
#[cfg(not(feature = "reqwest"))]
fn default_credential() -> Result<Arc<dyn CredentialSource>> {
	Err(Error::CredentialAcquisition { source: None })
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn parse(uri: &str) -> Url {
		Url::parse(uri).expect("URI fixture should parse.")
	}

	#[test]
	fn defaults_match_documented_values() {
		let builder = PubsubBuilder::new();

		assert!(builder.uri.is_none());
		assert!(format!("{builder:?}").contains(DEFAULT_URI));
		assert_eq!(builder.compression, CompressionLevel::DEFAULT);
		assert_eq!(builder.refresh_interval, StdDuration::from_secs(10));
		assert_eq!(builder.http_options().read_timeout, StdDuration::from_secs(30));
		assert_eq!(builder.http_options().request_timeout, StdDuration::from_secs(30));
		assert!(builder.http_options().allow_pooling_connections);
		assert!(builder.http_options().max_connections.is_none());
	}

	#[test]
	fn uri_gains_trailing_slash() {
		let builder = PubsubBuilder::new()
			.uri(parse("http://localhost:8085/v1"))
			.expect("Emulator URI should be accepted.");

		assert_eq!(builder.uri.as_ref().map(Url::as_str), Some("http://localhost:8085/v1/"));

		let builder = PubsubBuilder::new()
			.uri_str("https://pubsub.example.com/")
			.expect("Slash-terminated URI should be accepted.");

		assert_eq!(builder.uri.as_ref().map(Url::as_str), Some("https://pubsub.example.com/"));
	}

	#[test]
	fn uri_rejects_query_fragment_and_odd_schemes() {
		for uri in [
			"https://pubsub.example.com/v1/?alt=json",
			"https://pubsub.example.com/v1/#frag",
			"ftp://pubsub.example.com/v1/",
			"mailto:ops@example.com",
		] {
			assert!(
				matches!(
					PubsubBuilder::new().uri(parse(uri)),
					Err(ConfigError::InvalidServiceUri { .. })
				),
				"{uri} should be rejected."
			);
		}
	}

	#[test]
	fn unparsable_uri_is_reported() {
		assert!(matches!(
			PubsubBuilder::new().uri_str("not a uri"),
			Err(ConfigError::UnparsableServiceUri { .. })
		));
	}

	#[test]
	fn compression_level_is_validated_at_configuration_time() {
		assert!(PubsubBuilder::new().compression_level(9).is_ok());
		assert!(matches!(
			PubsubBuilder::new().compression_level(10),
			Err(ConfigError::InvalidCompressionLevel { level: 10 })
		));
	}

	#[test]
	fn refresh_interval_rejects_zero_and_unschedulable_periods() {
		let builder = PubsubBuilder::new()
			.refresh_interval(StdDuration::from_millis(500))
			.expect("A sub-second period should be accepted.");

		assert_eq!(builder.refresh_interval, StdDuration::from_millis(500));

		for period in [StdDuration::ZERO, StdDuration::MAX] {
			assert!(
				matches!(
					PubsubBuilder::new().refresh_interval(period),
					Err(ConfigError::InvalidRefreshInterval { period: rejected, .. }) if rejected == period
				),
				"{period:?} should be rejected."
			);
		}
	}

	#[test]
	fn zero_connection_cap_is_rejected() {
		assert!(matches!(
			PubsubBuilder::new().max_connections(0),
			Err(ConfigError::InvalidMaxConnections)
		));
		assert!(PubsubBuilder::new().max_connections(1).is_ok());
	}

	#[test]
	fn http_setters_are_recorded() {
		let builder = PubsubBuilder::new()
			.connect_timeout(StdDuration::from_secs(2))
			.max_connections(4)
			.expect("A positive connection cap should be accepted.")
			.max_connections_per_host(2)
			.pooled_connection_ttl(StdDuration::from_secs(60))
			.pooled_connection_idle_timeout(StdDuration::from_secs(15))
			.allow_pooling_connections(false)
			.enabled_cipher_suites(["TLS_AES_128_GCM_SHA256"]);
		let http = builder.http_options();

		assert_eq!(http.connect_timeout, Some(StdDuration::from_secs(2)));
		assert_eq!(http.max_connections, Some(4));
		assert_eq!(http.max_connections_per_host, Some(2));
		assert_eq!(http.pooled_connection_ttl, Some(StdDuration::from_secs(60)));
		assert_eq!(http.pooled_connection_idle_timeout, Some(StdDuration::from_secs(15)));
		assert!(!http.allow_pooling_connections);
		assert_eq!(http.enabled_cipher_suites, vec!["TLS_AES_128_GCM_SHA256".to_owned()]);
	}
}
