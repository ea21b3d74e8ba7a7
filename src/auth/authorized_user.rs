//! OAuth 2.0 refresh-token credential backed by `authorized_user` credential files.
//!
//! This is the format `gcloud auth application-default login` writes. The refresh-token
//! grant runs through the `oauth2` crate over a reqwest client.

// std
use std::{
	env, fs,
	path::{Path, PathBuf},
};
// crates.io
use oauth2::{
	AsyncHttpClient, AuthType, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
	HttpClientError, HttpRequest, HttpResponse, RefreshToken, TokenResponse, TokenUrl,
	basic::BasicClient,
};
// self
use crate::{
	_prelude::*,
	auth::{CredentialError, CredentialFuture, CredentialSource, TokenSecret},
};

type RefreshClient =
	BasicClient<EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Google's OAuth 2.0 token endpoint.
pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
/// Environment variable pointing at an explicit credential file.
pub const CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";

#[derive(Deserialize)]
struct CredentialKind {
	#[serde(rename = "type")]
	kind: String,
}

#[derive(Deserialize)]
struct AuthorizedUserFile {
	client_id: String,
	client_secret: String,
	refresh_token: String,
}

#[derive(Clone)]
struct IssuedToken {
	access_token: TokenSecret,
	expires_at: Option<OffsetDateTime>,
}

/// Refresh-token credential for end-user (authorized user) accounts.
pub struct AuthorizedUserCredential {
	client_id: String,
	client_secret: TokenSecret,
	refresh_token: TokenSecret,
	token_uri: Url,
	http_client: OAuthHttpClient,
	issued: RwLock<Option<IssuedToken>>,
}
impl AuthorizedUserCredential {
	/// Creates a credential from explicit client and refresh-token values.
	pub fn new(
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
		refresh_token: impl Into<String>,
	) -> Result<Self, CredentialError> {
		let token_uri = Url::parse(GOOGLE_TOKEN_URI).map_err(CredentialError::token_endpoint)?;

		Ok(Self {
			client_id: client_id.into(),
			client_secret: TokenSecret::new(client_secret),
			refresh_token: TokenSecret::new(refresh_token),
			token_uri,
			http_client: OAuthHttpClient(ReqwestClient::new()),
			issued: RwLock::new(None),
		})
	}

	/// Overrides the token endpoint (useful for tests and private deployments).
	pub fn with_token_uri(mut self, token_uri: Url) -> Self {
		self.token_uri = token_uri;

		self
	}

	/// Overrides the reqwest client used for token requests.
	pub fn with_http_client(mut self, client: ReqwestClient) -> Self {
		self.http_client = OAuthHttpClient(client);

		self
	}

	/// Loads an `authorized_user` credential file.
	pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CredentialError> {
		let bytes = fs::read(path.as_ref())?;

		Self::from_json(&bytes)
	}

	/// Parses an `authorized_user` credential document.
	pub fn from_json(bytes: &[u8]) -> Result<Self, CredentialError> {
		let CredentialKind { kind } =
			serde_json::from_slice(bytes).map_err(CredentialError::InvalidFile)?;

		if kind != "authorized_user" {
			return Err(CredentialError::UnsupportedCredentialType { kind });
		}

		let file: AuthorizedUserFile =
			serde_json::from_slice(bytes).map_err(CredentialError::InvalidFile)?;

		Self::new(file.client_id, file.client_secret, file.refresh_token)
	}

	/// Resolves application default credentials.
	///
	/// Checks [`CREDENTIALS_ENV`] first, then the well-known gcloud location.
	pub fn application_default() -> Result<Self, CredentialError> {
		let path = application_default_path().ok_or(CredentialError::NotFound)?;

		if !path.exists() {
			return Err(CredentialError::NotFound);
		}

		Self::from_file(path)
	}

	fn oauth_client(&self) -> Result<RefreshClient, CredentialError> {
		let token_url =
			TokenUrl::new(self.token_uri.to_string()).map_err(CredentialError::token_endpoint)?;

		Ok(BasicClient::new(ClientId::new(self.client_id.clone()))
			.set_client_secret(ClientSecret::new(self.client_secret.expose().to_owned()))
			.set_auth_type(AuthType::RequestBody)
			.set_token_uri(token_url))
	}
}
impl CredentialSource for AuthorizedUserCredential {
	fn access_token(&self) -> Option<TokenSecret> {
		self.issued.read().as_ref().map(|issued| issued.access_token.clone())
	}

	fn expires_in(&self) -> Option<Duration> {
		self.issued
			.read()
			.as_ref()
			.and_then(|issued| issued.expires_at)
			.map(|at| at - OffsetDateTime::now_utc())
	}

	fn refresh(&self) -> CredentialFuture<'_, ()> {
		Box::pin(async move {
			let client = self.oauth_client()?;
			let refresh = RefreshToken::new(self.refresh_token.expose().to_owned());
			let response = client
				.exchange_refresh_token(&refresh)
				.request_async(&self.http_client)
				.await
				.map_err(CredentialError::token_endpoint)?;
			let expires_at = response.expires_in().map(|lifetime| {
				let secs = i64::try_from(lifetime.as_secs()).unwrap_or(i64::MAX);

				OffsetDateTime::now_utc().saturating_add(Duration::seconds(secs))
			});

			*self.issued.write() = Some(IssuedToken {
				access_token: TokenSecret::new(response.access_token().secret().to_owned()),
				expires_at,
			});

			Ok(())
		})
	}
}
impl Debug for AuthorizedUserCredential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthorizedUserCredential")
			.field("client_id", &self.client_id)
			.field("token_uri", &self.token_uri.as_str())
			.field("has_token", &self.issued.read().is_some())
			.finish()
	}
}

fn application_default_path() -> Option<PathBuf> {
	if let Some(explicit) = env::var_os(CREDENTIALS_ENV).filter(|value| !value.is_empty()) {
		return Some(PathBuf::from(explicit));
	}

	let config_dir = if cfg!(windows) {
		PathBuf::from(env::var_os("APPDATA")?)
	} else {
		PathBuf::from(env::var_os("HOME")?).join(".config")
	};

	Some(config_dir.join("gcloud").join("application_default_credentials.json"))
}

/// Adapter that lets the `oauth2` crate drive token requests over reqwest.
#[derive(Clone)]
struct OAuthHttpClient(ReqwestClient);
impl<'c> AsyncHttpClient<'c> for OAuthHttpClient {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let client = self.0.clone();

		Box::pin(async move {
			let response = client
				.execute(request.try_into().map_err(Box::new)?)
				.await
				.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let mut response_new =
				HttpResponse::new(response.bytes().await.map_err(Box::new)?.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn parses_authorized_user_file() {
		let credential = AuthorizedUserCredential::from_json(
			br#"{"type":"authorized_user","client_id":"cid","client_secret":"cs","refresh_token":"rt"}"#,
		)
		.expect("Authorized user document should parse.");

		assert_eq!(credential.client_id, "cid");
		assert_eq!(credential.refresh_token.expose(), "rt");
		assert_eq!(credential.token_uri.as_str(), GOOGLE_TOKEN_URI);
		assert!(credential.access_token().is_none());
	}

	#[test]
	fn rejects_service_account_files() {
		let err = AuthorizedUserCredential::from_json(
			br#"{"type":"service_account","client_email":"svc@example.iam.gserviceaccount.com"}"#,
		)
		.expect_err("Service account files are not refreshable by this source.");

		assert!(matches!(
			err,
			CredentialError::UnsupportedCredentialType { kind } if kind == "service_account"
		));
	}

	#[test]
	fn rejects_incomplete_files() {
		let err = AuthorizedUserCredential::from_json(br#"{"type":"authorized_user"}"#)
			.expect_err("Missing fields should be reported.");

		assert!(matches!(err, CredentialError::InvalidFile(_)));
	}
}
