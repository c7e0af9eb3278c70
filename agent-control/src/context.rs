//! A small cancellation primitive shared by every long-running loop in the
//! agent: the supervisor's backoff sleep, the readiness probe, the API
//! server's shutdown wait, and the helper's accept loop all block on the
//! same [`Context`] and wake up as soon as it is cancelled.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// A cloneable cancellation token carrying a value of type `T`.
///
/// Cloning shares the same underlying signal: cancelling one clone cancels
/// every other clone derived from it.
#[derive(Debug, Clone)]
pub struct Context<T>(Arc<(Mutex<T>, Condvar)>);

impl<T> Default for Context<T>
where
    T: Default,
{
    fn default() -> Self {
        Self(Arc::new((Mutex::new(T::default()), Condvar::new())))
    }
}

impl<T> Context<T>
where
    T: Default + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the cancellation signal. Every thread blocked in [`Context::wait`]
    /// wakes up and observes `val`.
    pub fn cancel_all(&self, val: T) -> Result<(), PoisonError<MutexGuard<'_, T>>> {
        let (lock, cvar) = &*self.0;
        let mut guard = lock.lock()?;
        *guard = val;
        cvar.notify_all();
        Ok(())
    }

    /// Resets the signal back to `T::default()`, allowing the context to be
    /// reused for a subsequent run.
    pub fn reset(&self) -> Result<(), PoisonError<MutexGuard<'_, T>>> {
        let (lock, _) = &*self.0;
        let mut guard = lock.lock()?;
        *guard = T::default();
        Ok(())
    }

    /// Returns the current value without blocking.
    pub fn get(&self) -> T {
        let (lock, _) = &*self.0;
        lock.lock().map(|g| g.clone()).unwrap_or_else(|p| p.into_inner().clone())
    }

    pub fn lock_cvar(&self) -> &(Mutex<T>, Condvar) {
        &self.0
    }
}

impl Context<bool> {
    /// True once [`Context::cancel_all`] has been called with `true`.
    pub fn is_cancelled(&self) -> bool {
        self.get()
    }

    /// Blocks the calling thread until either the context is cancelled or
    /// `timeout` elapses, whichever comes first. Returns `true` if the
    /// context was cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (lock, cvar) = &*self.0;
        let guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        if *guard {
            return true;
        }
        let (guard, result) = cvar
            .wait_timeout_while(guard, timeout, |cancelled| !*cancelled)
            .unwrap_or_else(PoisonError::into_inner);
        let _ = result;
        *guard
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn cancel_all_wakes_waiters() {
        let ctx: Context<bool> = Context::new();
        let waiter_ctx = ctx.clone();
        let handle = thread::spawn(move || waiter_ctx.wait_timeout(Duration::from_secs(10)));

        thread::sleep(Duration::from_millis(20));
        ctx.cancel_all(true).unwrap();

        assert!(handle.join().unwrap());
    }

    #[test]
    fn wait_timeout_expires_without_cancellation() {
        let ctx: Context<bool> = Context::new();
        let start = Instant::now();
        let cancelled = ctx.wait_timeout(Duration::from_millis(50));
        assert!(!cancelled);
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn reset_allows_reuse() {
        let ctx: Context<bool> = Context::new();
        ctx.cancel_all(true).unwrap();
        assert!(ctx.is_cancelled());
        ctx.reset().unwrap();
        assert!(!ctx.is_cancelled());
    }
}
