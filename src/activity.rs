use std::sync::Arc;

/// Busy indicator supplied by the host application.
pub trait ActivityIndicator: Send + Sync {
    fn show(&self, label: Option<&str>);
    fn hide(&self);
    fn is_already_showing(&self) -> bool;
}

/// Shows an indicator for one call and hides it exactly once, either on
/// `finish` or when dropped.
pub struct ActivityGuard {
    indicator: Option<Arc<dyn ActivityIndicator>>,
}

impl ActivityGuard {
    pub fn show(indicator: Option<Arc<dyn ActivityIndicator>>, label: Option<&str>) -> Self {
        if let Some(indicator) = indicator.as_ref() {
            indicator.show(label);
        }
        Self { indicator }
    }

    pub fn finish(mut self) {
        self.hide();
    }

    fn hide(&mut self) {
        if let Some(indicator) = self.indicator.take() {
            indicator.hide();
        }
    }
}

impl Drop for ActivityGuard {
    fn drop(&mut self) {
        self.hide();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counter {
        shown: AtomicUsize,
        hidden: AtomicUsize,
    }

    impl ActivityIndicator for Counter {
        fn show(&self, _label: Option<&str>) {
            self.shown.fetch_add(1, Ordering::SeqCst);
        }
        fn hide(&self) {
            self.hidden.fetch_add(1, Ordering::SeqCst);
        }
        fn is_already_showing(&self) -> bool {
            self.shown.load(Ordering::SeqCst) > self.hidden.load(Ordering::SeqCst)
        }
    }

    #[test]
    fn finish_hides_once() {
        let counter = Arc::new(Counter::default());
        let guard = ActivityGuard::show(Some(counter.clone()), Some("loading"));
        assert!(counter.is_already_showing());
        guard.finish();
        assert_eq!(counter.hidden.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_hides_when_not_finished() {
        let counter = Arc::new(Counter::default());
        {
            let _guard = ActivityGuard::show(Some(counter.clone()), None);
        }
        assert_eq!(counter.shown.load(Ordering::SeqCst), 1);
        assert_eq!(counter.hidden.load(Ordering::SeqCst), 1);
    }
}
