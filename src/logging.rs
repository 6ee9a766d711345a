use std::sync::Arc;

use crate::ops::{Listen, ListenerRef};

/// Forwarding listener that logs every transition to stdout.
///
/// Enabled via the `logging` feature. Useful for demos and debugging; wrap the
/// real listener and attach the wrapper instead.
///
/// ```rust,ignore
/// let listener = LogListener::wrap("avatar", real_listener);
/// registry.init(0, factory, listener)?;
/// ```
pub struct LogListener<T, E> {
    name: &'static str,
    inner: ListenerRef<T, E>,
}

impl<T, E> LogListener<T, E> {
    /// Wraps `inner`, tagging log lines with `name`.
    pub fn wrap(name: &'static str, inner: ListenerRef<T, E>) -> Arc<Self> {
        Arc::new(Self { name, inner })
    }
}

impl<T, E> Listen<T, E> for LogListener<T, E> {
    fn on_start(&self) {
        println!("[started] op={}", self.name);
        self.inner.on_start();
    }

    fn on_result(&self, value: &T) {
        println!("[result] op={}", self.name);
        self.inner.on_result(value);
    }

    fn on_success(&self) {
        println!("[succeeded] op={}", self.name);
        self.inner.on_success();
    }

    fn on_error(&self, error: &E) {
        println!("[failed] op={}", self.name);
        self.inner.on_error(error);
    }
}
