//! Credential source contract and the static token source.

// self
use crate::{_prelude::*, auth::TokenSecret, error::BoxError};

/// Boxed future returned by [`CredentialSource::refresh`].
pub type CredentialFuture<'a, T> =
	Pin<Box<dyn Future<Output = Result<T, CredentialError>> + 'a + Send>>;

/// Anything that can hand out an access token and refresh it on demand.
///
/// The client never drives the token protocol itself. It only reads the current token and
/// its remaining lifetime, and asks for a refresh when the token is missing or close to
/// expiry. Implementations must be cheap to read and safe to share across threads.
pub trait CredentialSource
where
	Self: 'static + Send + Sync,
{
	/// Returns the most recently issued access token, if any.
	fn access_token(&self) -> Option<TokenSecret>;

	/// Returns the remaining lifetime of the current token, if known.
	fn expires_in(&self) -> Option<Duration>;

	/// Obtains a new access token, replacing the current one on success.
	fn refresh(&self) -> CredentialFuture<'_, ()>;
}

/// Failures reported by credential sources.
#[derive(Debug, ThisError)]
pub enum CredentialError {
	/// The source could not mint a new token.
	#[error("Token refresh failed: {message}.")]
	Refresh {
		/// Source-supplied reason.
		message: String,
	},
	/// The token endpoint call itself failed.
	#[error("Token endpoint request failed.")]
	TokenEndpoint {
		/// Underlying OAuth or transport failure.
		#[source]
		source: BoxError,
	},
	/// Credential file could not be read.
	#[error("Credential file could not be read.")]
	Io(#[from] std::io::Error),
	/// Credential file is not valid JSON or misses required fields.
	#[error("Credential file is malformed.")]
	InvalidFile(#[source] serde_json::Error),
	/// Credential file describes a type this crate cannot refresh.
	#[error("Credential type `{kind}` is not supported.")]
	UnsupportedCredentialType {
		/// `type` field found in the credential file.
		kind: String,
	},
	/// No application default credential file could be located.
	#[error("No application default credentials were found.")]
	NotFound,
}
impl CredentialError {
	/// Wraps a token endpoint failure.
	pub fn token_endpoint(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::TokenEndpoint { source: Box::new(src) }
	}
}

/// Fixed token for emulators, tests, and externally managed credentials.
///
/// Refreshing is a no-op; an expiry may be attached so lifetime checks still behave.
#[derive(Clone)]
pub struct StaticCredential {
	token: TokenSecret,
	expires_at: Option<OffsetDateTime>,
}
impl StaticCredential {
	/// Creates a source that always hands out `token`.
	pub fn new(token: impl Into<String>) -> Self {
		Self { token: TokenSecret::new(token), expires_at: None }
	}

	/// Attaches an absolute expiry to the token.
	pub fn with_expires_at(mut self, expires_at: OffsetDateTime) -> Self {
		self.expires_at = Some(expires_at);

		self
	}
}
impl CredentialSource for StaticCredential {
	fn access_token(&self) -> Option<TokenSecret> {
		Some(self.token.clone())
	}

	fn expires_in(&self) -> Option<Duration> {
		self.expires_at.map(|at| at - OffsetDateTime::now_utc())
	}

	fn refresh(&self) -> CredentialFuture<'_, ()> {
		Box::pin(async { Ok(()) })
	}
}
impl Debug for StaticCredential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("StaticCredential")
			.field("token", &self.token)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}
