//! No-operation notifier implementation.

use super::{StatusNotifier, StatusText};

/// A notifier that discards every update.
///
/// Useful for tests and for headless runs where nobody looks at a
/// notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpNotifier;

impl StatusNotifier for NoOpNotifier {
    #[inline]
    fn update(&self, _status: &StatusText) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_notifier_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<NoOpNotifier>();
    }

    #[test]
    fn test_noop_notifier_as_trait_object() {
        let notifier: Box<dyn StatusNotifier> = Box::new(NoOpNotifier);
        notifier.update(&StatusText::new("title", "body"));
        notifier.clear();
    }
}
