//! Status notifier trait definition.

use std::sync::Arc;

/// Title and body of the user-visible tracking notification.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusText {
    pub title: String,
    pub body: String,
}

impl StatusText {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

/// The surface that keeps the user informed while tracking runs.
///
/// On a phone this is the persistent foreground-service notification. The
/// engine refreshes it on every capture and every tick; failures to update
/// it are never the engine's problem, so the methods return nothing.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so the engine task can own one.
pub trait StatusNotifier: Send + Sync {
    /// Replace the notification content.
    fn update(&self, status: &StatusText);

    /// Remove the notification. Called once when the engine stops.
    fn clear(&self) {}
}

impl<T: StatusNotifier + ?Sized> StatusNotifier for Arc<T> {
    fn update(&self, status: &StatusText) {
        (**self).update(status)
    }

    fn clear(&self) {
        (**self).clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording(Mutex<Vec<StatusText>>);

    impl StatusNotifier for Recording {
        fn update(&self, status: &StatusText) {
            self.0.lock().unwrap().push(status.clone());
        }
    }

    #[test]
    fn test_arc_forwards_updates() {
        let inner = Arc::new(Recording::default());
        let notifier: Arc<dyn StatusNotifier> = inner.clone();

        notifier.update(&StatusText::new("Tracking", "3 points"));
        notifier.clear();

        let seen = inner.0.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].body, "3 points");
    }
}
