// self
use crate::{_prelude::*, obs::Operation};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedOp<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedOp<F> = F;

/// A span builder used by gateway operations.
#[derive(Clone, Debug)]
pub struct OperationSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl OperationSpan {
	/// Creates a new span tagged with the provided operation + stage.
	pub fn new(op: Operation, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("exam_gateway.op", op = op.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (op, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedOp<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Logs a warning tied to `op` (when tracing is enabled).
pub(crate) fn warn(op: Operation, message: &'static str, err: &dyn Display) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(op = op.as_str(), error = %err, "{message}");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (op, message, err);
	}
}

/// Logs a debug event tied to `op` (when tracing is enabled).
pub(crate) fn debug(op: Operation, message: &'static str) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(op = op.as_str(), "{message}");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (op, message);
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn instrument_wraps_future() {
		let span = OperationSpan::new(Operation::Refresh, "instrument_wraps_future");
		let value = span.instrument(async { 42 }).await;

		assert_eq!(value, 42);
	}
}
