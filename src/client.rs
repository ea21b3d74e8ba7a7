//! Public client facade: topic administration and publishing.
//!
//! Every operation validates its identifiers, builds the request with the current token,
//! and hands the exchange to a task on the client's runtime. The caller gets a
//! [`PubsubFuture`] back immediately; invalid identifiers produce an already-failed future
//! instead of a request.

// std
use std::sync::atomic::{AtomicBool, Ordering};
// crates.io
use tokio::{runtime::Handle, task::JoinHandle};
use tokio_util::sync::CancellationToken;
// self
use crate::{
	_prelude::*,
	auth::{CredentialManager, RefreshMetrics, TokenSecret},
	config::PubsubBuilder,
	error::TransportError,
	future::{PubsubFuture, RequestInfo},
	http::{Method, OutboundRequest, PubsubTransport},
	model::{
		Message, PublishRequest, PublishResponse, Topic, TopicList, canonical_topic,
		topics_collection, validate_canonical_topic,
	},
	obs::{self, Operation, RequestOutcome, RequestSpan},
	request::RequestBuilder,
	response::{Expect, Reply, ResponseInterpreter},
};

struct Inner {
	transport: RwLock<Option<Arc<dyn PubsubTransport>>>,
	requests: RequestBuilder,
	credentials: Arc<CredentialManager>,
	runtime: Handle,
	shutdown: CancellationToken,
	refresh_task: Mutex<Option<JoinHandle<()>>>,
	closed: AtomicBool,
}
impl Drop for Inner {
	fn drop(&mut self) {
		self.shutdown.cancel();

		if let Some(task) = self.refresh_task.get_mut().take() {
			task.abort();
		}
	}
}

/// Async Pub/Sub client.
///
/// Cheap to clone; clones share the transport, the token, and the background refresh task.
/// Dropping the last clone shuts the client down.
#[derive(Clone)]
pub struct Pubsub {
	inner: Arc<Inner>,
}
impl Pubsub {
	/// Starts configuring a client.
	pub fn builder() -> PubsubBuilder {
		PubsubBuilder::new()
	}

	pub(crate) fn start(
		transport: Arc<dyn PubsubTransport>,
		requests: RequestBuilder,
		credentials: Arc<CredentialManager>,
		runtime: Handle,
		refresh_interval: StdDuration,
	) -> Self {
		let shutdown = CancellationToken::new();
		let refresh_task =
			credentials.spawn_refresh_task(&runtime, refresh_interval, shutdown.clone());

		Self {
			inner: Arc::new(Inner {
				transport: RwLock::new(Some(transport)),
				requests,
				credentials,
				runtime,
				shutdown,
				refresh_task: Mutex::new(Some(refresh_task)),
				closed: AtomicBool::new(false),
			}),
		}
	}

	/// Base URI every request path is appended to.
	pub fn base_uri(&self) -> &str {
		self.inner.requests.base_uri()
	}

	/// Token refresh counters.
	pub fn refresh_metrics(&self) -> &RefreshMetrics {
		self.inner.credentials.metrics()
	}

	/// Lists the first page of topics in `project`. `None` means the project was not found.
	pub fn list_topics(&self, project: &str) -> PubsubFuture<Option<TopicList>> {
		self.list_topics_page(project, None)
	}

	/// Lists one page of topics in `project`, continuing from `page_token` when given.
	pub fn list_topics_page(
		&self,
		project: &str,
		page_token: Option<&str>,
	) -> PubsubFuture<Option<TopicList>> {
		let mut path = match topics_collection(project) {
			Ok(path) => path,
			Err(e) => {
				return self.rejected(
					Operation::ListTopics,
					Method::Get,
					&format!("projects/{project}/topics"),
					e,
				);
			},
		};

		if let Some(token) = page_token {
			path.push_str("?pageToken=");
			path.extend(url::form_urlencoded::byte_serialize(token.as_bytes()));
		}

		let request = self.inner.requests.build(Method::Get, &path, &self.token());

		self.send::<TopicList>(Operation::ListTopics, Expect::Json, request).map(Reply::into_value)
	}

	/// Creates `topic` in `project`.
	pub fn create_topic(&self, project: &str, topic: &str) -> PubsubFuture<Topic> {
		match canonical_topic(project, topic) {
			Ok(canonical) => self.create_topic_canonical(&canonical),
			Err(e) => self.rejected(Operation::CreateTopic, Method::Put, &raw_path(project, topic), e),
		}
	}

	/// Creates the topic named `canonical` (`projects/{project}/topics/{topic}`).
	pub fn create_topic_canonical(&self, canonical: &str) -> PubsubFuture<Topic> {
		if let Err(e) = validate_canonical_topic(canonical) {
			return self.rejected(Operation::CreateTopic, Method::Put, canonical, e);
		}

		let request = match self.inner.requests.build_with_payload(
			Method::Put,
			canonical,
			&self.token(),
			&Topic::of(canonical),
		) {
			Ok(request) => request,
			Err(e) => return self.rejected(Operation::CreateTopic, Method::Put, canonical, e),
		};

		self.send::<Topic>(Operation::CreateTopic, Expect::Json, request)
			.and_then(Reply::into_required)
	}

	/// Fetches `topic` in `project`. `None` means it does not exist.
	pub fn get_topic(&self, project: &str, topic: &str) -> PubsubFuture<Option<Topic>> {
		match canonical_topic(project, topic) {
			Ok(canonical) => self.get_topic_canonical(&canonical),
			Err(e) => self.rejected(Operation::GetTopic, Method::Get, &raw_path(project, topic), e),
		}
	}

	/// Fetches the topic named `canonical`. `None` means it does not exist.
	pub fn get_topic_canonical(&self, canonical: &str) -> PubsubFuture<Option<Topic>> {
		if let Err(e) = validate_canonical_topic(canonical) {
			return self.rejected(Operation::GetTopic, Method::Get, canonical, e);
		}

		let request = self.inner.requests.build(Method::Get, canonical, &self.token());

		self.send::<Topic>(Operation::GetTopic, Expect::Json, request).map(Reply::into_value)
	}

	/// Deletes `topic` in `project`. `None` means it did not exist.
	pub fn delete_topic(&self, project: &str, topic: &str) -> PubsubFuture<Option<()>> {
		match canonical_topic(project, topic) {
			Ok(canonical) => self.delete_topic_canonical(&canonical),
			Err(e) =>
				self.rejected(Operation::DeleteTopic, Method::Delete, &raw_path(project, topic), e),
		}
	}

	/// Deletes the topic named `canonical`. `None` means it did not exist.
	pub fn delete_topic_canonical(&self, canonical: &str) -> PubsubFuture<Option<()>> {
		if let Err(e) = validate_canonical_topic(canonical) {
			return self.rejected(Operation::DeleteTopic, Method::Delete, canonical, e);
		}

		let request = self.inner.requests.build(Method::Delete, canonical, &self.token());

		self.send::<()>(Operation::DeleteTopic, Expect::NoContent, request)
			.map(|reply| reply.found().map(|_| ()))
	}

	/// Publishes `messages` to `topic` in `project`, resolving to the assigned message IDs in
	/// submission order.
	pub fn publish(
		&self,
		project: &str,
		topic: &str,
		messages: Vec<Message>,
	) -> PubsubFuture<Vec<String>> {
		match canonical_topic(project, topic) {
			Ok(canonical) => self.publish_canonical(&canonical, messages),
			Err(e) => self.rejected(
				Operation::Publish,
				Method::Post,
				&format!("{}:publish", raw_path(project, topic)),
				e,
			),
		}
	}

	/// Publishes `messages` to the topic named `canonical`.
	pub fn publish_canonical(
		&self,
		canonical: &str,
		messages: Vec<Message>,
	) -> PubsubFuture<Vec<String>> {
		let path = format!("{canonical}:publish");

		if let Err(e) = validate_canonical_topic(canonical) {
			return self.rejected(Operation::Publish, Method::Post, &path, e);
		}

		let request = match self.inner.requests.build_with_payload(
			Method::Post,
			&path,
			&self.token(),
			&PublishRequest::of(messages),
		) {
			Ok(request) => request,
			Err(e) => return self.rejected(Operation::Publish, Method::Post, &path, e),
		};

		self.send::<PublishResponse>(Operation::Publish, Expect::Json, request)
			.and_then(|reply| reply.into_required().map(PublishResponse::message_ids))
	}

	/// Shuts the client down.
	///
	/// Stops the refresh task, releases the transport, and fails in-flight requests with
	/// [`TransportError::Closed`]. Repeated calls are no-ops.
	pub fn close(&self) {
		if self.inner.closed.swap(true, Ordering::AcqRel) {
			return;
		}

		self.inner.shutdown.cancel();

		if let Some(task) = self.inner.refresh_task.lock().take() {
			task.abort();
		}

		self.inner.transport.write().take();

		obs::event!(info, uri = self.base_uri(), "Pub/Sub client closed.");
	}

	/// Whether [`Pubsub::close`] has been called.
	pub fn is_closed(&self) -> bool {
		self.inner.closed.load(Ordering::Acquire)
	}

	/// Resolves once the client is closed or its last handle is dropped.
	pub fn closed(&self) -> impl Future<Output = ()> + Send + 'static {
		let shutdown = self.inner.shutdown.clone();

		async move { shutdown.cancelled().await }
	}

	fn token(&self) -> Arc<TokenSecret> {
		self.inner.credentials.current_token()
	}

	/// Fails a request before sending; `path` is the attempted path relative to the base URI.
	fn rejected<T>(
		&self,
		operation: Operation,
		method: Method,
		path: &str,
		error: impl Into<Error>,
	) -> PubsubFuture<T>
	where
		T: 'static + Send,
	{
		let error = error.into();

		obs::event!(
			debug,
			operation = operation.as_str(),
			path,
			error = %error,
			"Request rejected before sending."
		);
		obs::record_request_outcome(operation, RequestOutcome::Failure);

		let url = format!("{}{path}", self.base_uri());

		PubsubFuture::failed(RequestInfo::new(operation, method, url, 0), error)
	}

	fn send<T>(
		&self,
		operation: Operation,
		expect: Expect,
		request: OutboundRequest,
	) -> PubsubFuture<Reply<T>>
	where
		T: 'static + Send + DeserializeOwned,
	{
		let method = request.method;
		let info = RequestInfo::new(operation, method, request.url.clone(), request.payload_size());
		let span = RequestSpan::new(&info);
		let (future, completer) = PubsubFuture::pending(info);
		let mut interpreter = ResponseInterpreter::new(method, expect, completer);
		let Some(transport) = self.inner.transport.read().clone() else {
			interpreter.on_failure(TransportError::Closed);
			obs::record_request_outcome(operation, RequestOutcome::Failure);

			return future;
		};
		let shutdown = self.inner.shutdown.clone();

		obs::record_request_outcome(operation, RequestOutcome::Attempt);

		self.inner.runtime.spawn(span.instrument(async move {
			let exchange = async {
				match transport.execute(request).await {
					Ok(response) => interpreter.drive(response).await,
					Err(e) => {
						interpreter.on_failure(e);
					},
				}
			};
			let interrupted = tokio::select! {
				_ = shutdown.cancelled() => true,
				_ = exchange => false,
			};

			if interrupted {
				interpreter.on_failure(TransportError::Closed);
			}
			if let Some(outcome) = interpreter.outcome() {
				obs::event!(debug, outcome = outcome.as_str(), "Request completed.");
				obs::record_request_outcome(operation, outcome);
			}
		}));

		future
	}
}
impl Debug for Pubsub {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Pubsub")
			.field("base_uri", &self.base_uri())
			.field("credentials", &self.inner.credentials)
			.field("closed", &self.is_closed())
			.finish()
	}
}

fn raw_path(project: &str, topic: &str) -> String {
	format!("projects/{project}/topics/{topic}")
}
