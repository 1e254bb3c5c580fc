//! Optional observability helpers for gateway operations.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `exam_gateway.op` with the `op` (operation)
//!   and `stage` (call site) fields, plus warnings when a refresh fails or teardown misbehaves.
//! - Enable `metrics` to increment the `exam_gateway_operation_total` counter for every
//!   attempt/success/failure, labeled by `op` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operations observed by the gateway.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
	/// Ordinary API request (including its transparent retry).
	Request,
	/// Access-token refresh call.
	Refresh,
	/// Login exchange.
	Login,
	/// Logout and local session teardown.
	Logout,
}
impl Operation {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Operation::Request => "request",
			Operation::Refresh => "refresh",
			Operation::Login => "login",
			Operation::Logout => "logout",
		}
	}
}
impl Display for Operation {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
	/// Entry to a gateway operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl Outcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Outcome::Attempt => "attempt",
			Outcome::Success => "success",
			Outcome::Failure => "failure",
		}
	}
}
impl Display for Outcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Records the terminal outcome of `result` for `op`.
pub(crate) fn record_result<T>(op: Operation, result: &Result<T>) {
	match result {
		Ok(_) => record_operation(op, Outcome::Success),
		Err(_) => record_operation(op, Outcome::Failure),
	}
}
