//! Scoped release of sessions and tunnels, and cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::IntrospectError;
use crate::source::Close;

/// Owns a [`Close`] resource and releases it when dropped.
///
/// Release failures are logged and swallowed: whatever the guarded work
/// returned is what the caller sees.
pub struct Scoped<T: ?Sized + Close> {
    inner: Option<Box<T>>,
}

impl<T: ?Sized + Close> Scoped<T> {
    pub fn new(inner: Box<T>) -> Self {
        Scoped { inner: Some(inner) }
    }

    /// Mutable access to the guarded resource.
    pub fn get_mut(&mut self) -> &mut T {
        self.inner
            .as_deref_mut()
            .unwrap_or_else(|| unreachable!("scoped resource used after release"))
    }

    pub fn get(&self) -> &T {
        self.inner
            .as_deref()
            .unwrap_or_else(|| unreachable!("scoped resource used after release"))
    }

    /// Releases the resource now.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if let Some(inner) = self.inner.take() {
            let label = inner.describe();
            match inner.close() {
                Ok(()) => tracing::debug!(resource = %label, "released"),
                Err(err) => tracing::warn!(resource = %label, error = %err, "release failed"),
            }
        }
    }
}

impl<T: ?Sized + Close> Drop for Scoped<T> {
    fn drop(&mut self) {
        self.release_inner();
    }
}

/// Shared cancellation flag, checked between units of work.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Fails with [`IntrospectError::Cancelled`] once cancellation was requested.
    pub fn check(&self) -> Result<(), IntrospectError> {
        if self.is_cancelled() {
            Err(IntrospectError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Probe {
        log: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl Close for Probe {
        fn describe(&self) -> String {
            "probe".into()
        }

        fn close(self: Box<Self>) -> Result<(), IntrospectError> {
            self.log.lock().unwrap().push("closed".into());
            if self.fail {
                Err(IntrospectError::Connection("socket reset".into()))
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_drop_releases_once() {
        let log = Arc::new(Mutex::new(Vec::new()));
        {
            let _guard = Scoped::new(Box::new(Probe {
                log: log.clone(),
                fail: false,
            }));
        }
        assert_eq!(*log.lock().unwrap(), vec!["closed".to_string()]);
    }

    #[test]
    fn test_explicit_release_does_not_double_close() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let guard = Scoped::new(Box::new(Probe {
            log: log.clone(),
            fail: true,
        }));
        guard.release();
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_cancel_token_shared_between_clones() {
        let token = CancelToken::new();
        let observer = token.clone();
        assert!(observer.check().is_ok());
        token.cancel();
        assert!(matches!(observer.check(), Err(IntrospectError::Cancelled)));
    }
}
