//! Tracing notifier adapter.

use std::sync::Mutex;

use super::{StatusNotifier, StatusText};

/// Notifier that writes status changes to the `tracing` log.
///
/// Used by the CLI, where the log file stands in for the notification
/// shade. Repeated identical updates are logged once.
#[derive(Debug, Default)]
pub struct TracingNotifier {
    last: Mutex<Option<StatusText>>,
}

impl TracingNotifier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatusNotifier for TracingNotifier {
    fn update(&self, status: &StatusText) {
        let mut last = match self.last.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if last.as_ref() == Some(status) {
            return;
        }
        tracing::debug!(title = %status.title, body = %status.body, "Status updated");
        *last = Some(status.clone());
    }

    fn clear(&self) {
        if let Ok(mut last) = self.last.lock() {
            *last = None;
        }
        tracing::debug!("Status cleared");
    }
}
