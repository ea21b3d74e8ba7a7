//! Single-assignment futures returned by every client operation.
//!
//! A [`PubsubFuture`] is paired with a [`Completer`] when a request is issued. The
//! completer may be cloned and shared between the transport task and anything else that
//! might settle the request; whichever caller settles it first wins, and every later
//! [`Completer::succeed`]/[`Completer::fail`] is a silent no-op. The future resolves to
//! exactly that first value.

// std
use std::{
	sync::atomic::{AtomicBool, Ordering},
	task::{Context, Poll},
};
// crates.io
use tokio::sync::oneshot;
// self
use crate::{_prelude::*, http::Method, obs::Operation};

type BoxedResult<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;

/// Descriptive metadata carried by a request future for diagnostics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestInfo {
	/// Client operation that issued the request.
	pub operation: Operation,
	/// HTTP method.
	pub method: Method,
	/// Absolute request URL.
	pub url: String,
	/// Size of the (compressed) request body in bytes.
	pub payload_size: usize,
}
impl RequestInfo {
	/// Creates request metadata.
	pub fn new(
		operation: Operation,
		method: Method,
		url: impl Into<String>,
		payload_size: usize,
	) -> Self {
		Self { operation, method, url: url.into(), payload_size }
	}
}

struct Slot<T> {
	sender: Mutex<Option<oneshot::Sender<Result<T>>>>,
	terminal: Arc<AtomicBool>,
}

/// Producer half of a [`PubsubFuture`].
pub struct Completer<T>(Arc<Slot<T>>);
impl<T> Completer<T> {
	/// Completes the future with a value. Returns `false` if it was already terminal.
	pub fn succeed(&self, value: T) -> bool {
		self.settle(Ok(value))
	}

	/// Completes the future with an error. Returns `false` if it was already terminal.
	pub fn fail(&self, error: impl Into<Error>) -> bool {
		self.settle(Err(error.into()))
	}

	/// Whether the future has already been completed.
	pub fn is_terminal(&self) -> bool {
		self.0.terminal.load(Ordering::Acquire)
	}

	fn settle(&self, result: Result<T>) -> bool {
		let Some(sender) = self.0.sender.lock().take() else {
			return false;
		};

		self.0.terminal.store(true, Ordering::Release);

		// The receiver may be gone if the caller dropped the future; that is fine.
		let _ = sender.send(result);

		true
	}
}
impl<T> Clone for Completer<T> {
	fn clone(&self) -> Self {
		Self(Arc::clone(&self.0))
	}
}
impl<T> Debug for Completer<T> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Completer").field("terminal", &self.is_terminal()).finish()
	}
}

/// Future of one client request, resolving to the typed result or a typed failure.
///
/// Awaiting it never blocks a thread; the request makes progress on the client's runtime
/// whether or not the future is polled.
#[must_use = "futures do nothing unless awaited; the request itself runs regardless"]
pub struct PubsubFuture<T> {
	info: Arc<RequestInfo>,
	terminal: Arc<AtomicBool>,
	inner: BoxedResult<T>,
}
impl<T> PubsubFuture<T> {
	/// Metadata describing the request behind this future.
	pub fn info(&self) -> &RequestInfo {
		&self.info
	}

	/// Whether the underlying request has completed (successfully or not).
	pub fn is_terminal(&self) -> bool {
		self.terminal.load(Ordering::Acquire)
	}
}
impl<T> PubsubFuture<T>
where
	T: 'static + Send,
{
	/// Creates a pending future and its completer.
	pub fn pending(info: RequestInfo) -> (Self, Completer<T>) {
		let (sender, receiver) = oneshot::channel();
		let terminal = Arc::new(AtomicBool::new(false));
		let completer = Completer(Arc::new(Slot {
			sender: Mutex::new(Some(sender)),
			terminal: Arc::clone(&terminal),
		}));
		let inner = Box::pin(async move { receiver.await.unwrap_or(Err(Error::Abandoned)) });

		(Self { info: Arc::new(info), terminal, inner }, completer)
	}

	/// Creates a future that has already failed.
	pub fn failed(info: RequestInfo, error: impl Into<Error>) -> Self {
		let (future, completer) = Self::pending(info);

		completer.fail(error);

		future
	}

	/// Transforms the success value; failures pass through unchanged.
	pub fn map<U, F>(self, f: F) -> PubsubFuture<U>
	where
		U: 'static + Send,
		F: 'static + Send + FnOnce(T) -> U,
	{
		let Self { info, terminal, inner } = self;

		PubsubFuture { info, terminal, inner: Box::pin(async move { inner.await.map(f) }) }
	}

	/// Transforms the success value with a fallible step.
	pub fn and_then<U, F>(self, f: F) -> PubsubFuture<U>
	where
		U: 'static + Send,
		F: 'static + Send + FnOnce(T) -> Result<U>,
	{
		let Self { info, terminal, inner } = self;

		PubsubFuture { info, terminal, inner: Box::pin(async move { inner.await.and_then(f) }) }
	}
}
impl<T> Future for PubsubFuture<T> {
	type Output = Result<T>;

	fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
		self.inner.as_mut().poll(cx)
	}
}
impl<T> Debug for PubsubFuture<T> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PubsubFuture")
			.field("info", &self.info)
			.field("terminal", &self.is_terminal())
			.finish()
	}
}
