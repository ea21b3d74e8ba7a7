// self
use crate::{_prelude::*, future::RequestInfo};

/// Emits a `tracing` event when the feature is enabled; expands to nothing otherwise.
macro_rules! event {
	($level:ident, $($arg:tt)+) => {
		#[cfg(feature = "tracing")]
		{
			::tracing::$level!($($arg)+);
		}
	};
}
pub(crate) use event;

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedRequest<F> = ::tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedRequest<F> = F;

/// Span wrapping one request/response exchange.
#[derive(Clone, Debug)]
pub struct RequestSpan {
	#[cfg(feature = "tracing")]
	span: ::tracing::Span,
}
impl RequestSpan {
	/// Creates a span tagged with the request's descriptive metadata.
	pub fn new(info: &RequestInfo) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = ::tracing::info_span!(
				"pubsub_client.request",
				operation = info.operation.as_str(),
				method = info.method.as_str(),
				url = %info.url,
				payload_size = info.payload_size,
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = info;

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedRequest<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use ::tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}
