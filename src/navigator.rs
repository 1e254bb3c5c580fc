//! Navigation contract used to leave the application once a session cannot be renewed.
//!
//! In a browser this is a full page load of the login entry point, which discards in-memory
//! state. Native embedders typically route it to a "signed out" screen or a process exit.

// self
use crate::_prelude::*;

/// Performs the full navigation triggered by an unrecoverable refresh failure.
pub trait Navigator
where
	Self: Send + Sync,
{
	/// Navigates to `location` (e.g. `/login`).
	fn navigate(&self, location: &str);
}

/// Navigator that ignores redirects; the default for headless embedders.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopNavigator;
impl Navigator for NoopNavigator {
	fn navigate(&self, _location: &str) {}
}

/// Navigator that records every requested location, for tests and embedders that poll.
#[derive(Clone, Debug, Default)]
pub struct RecordingNavigator(Arc<Mutex<Vec<String>>>);
impl RecordingNavigator {
	/// Returns the locations requested so far, oldest first.
	pub fn visits(&self) -> Vec<String> {
		self.0.lock().clone()
	}
}
impl Navigator for RecordingNavigator {
	fn navigate(&self, location: &str) {
		self.0.lock().push(location.to_owned());
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn recording_navigator_shares_history_across_clones() {
		let navigator = RecordingNavigator::default();
		let handle: Arc<dyn Navigator> = Arc::new(navigator.clone());

		handle.navigate("/login");
		NoopNavigator.navigate("/ignored");

		assert_eq!(navigator.visits(), vec!["/login".to_string()]);
	}
}
