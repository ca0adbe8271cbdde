use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};

use tracing::warn;

use crate::error::RipError;

/// Exit status for a second interrupt, as shells report SIGINT.
const INTERRUPTED_EXIT: i32 = 130;

/// Cooperative stop signal. Work checks it between units and never mid-call.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Cancels this token on the first Ctrl-C. A second Ctrl-C exits right away.
    /// Only one handler can be installed per process.
    pub fn cancel_on_interrupt(&self) -> Result<(), RipError> {
        ctrlc::set_handler(self.interrupt_handler())
            .map_err(|err| RipError::Signal(err.to_string()))
    }

    fn interrupt_handler(&self) -> impl FnMut() + Send + 'static {
        let token = self.clone();
        move || {
            if token.is_cancelled() {
                std::process::exit(INTERRUPTED_EXIT);
            }
            warn!("interrupted, finishing work in flight; interrupt again to exit now");
            token.cancel();
        }
    }
}

/// Fixed number of permits. `acquire` blocks until one is free; submissions are
/// never dropped.
#[derive(Debug)]
pub struct WorkerPool {
    capacity: usize,
    free: Mutex<usize>,
    released: Condvar,
}

impl WorkerPool {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            free: Mutex::new(capacity),
            released: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn acquire(&self) -> Permit<'_> {
        // The count stays consistent even if a holder panicked, so poisoning is ignored.
        let mut free = self.free.lock().unwrap_or_else(PoisonError::into_inner);
        while *free == 0 {
            free = self
                .released
                .wait(free)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *free -= 1;
        Permit { pool: self }
    }

    pub fn available(&self) -> usize {
        *self.free.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self) {
        let mut free = self.free.lock().unwrap_or_else(PoisonError::into_inner);
        *free += 1;
        self.released.notify_one();
    }
}

/// Returned to the pool on drop, whatever the task's outcome.
#[derive(Debug)]
pub struct Permit<'a> {
    pool: &'a WorkerPool,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.pool.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn cancel_is_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn first_interrupt_cancels_every_clone() {
        let token = CancelToken::new();
        let shared = token.clone();
        let mut on_interrupt = token.interrupt_handler();
        assert!(!shared.is_cancelled());
        on_interrupt();
        assert!(shared.is_cancelled());
        assert!(token.is_cancelled());
    }

    #[test]
    fn permits_return_on_drop() {
        let pool = WorkerPool::new(2);
        let a = pool.acquire();
        let b = pool.acquire();
        assert_eq!(pool.available(), 0);
        drop(a);
        assert_eq!(pool.available(), 1);
        drop(b);
        assert_eq!(pool.available(), 2);
    }

    #[test]
    fn acquire_blocks_at_capacity() {
        let pool = WorkerPool::new(3);
        let active = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        thread::scope(|scope| {
            for _ in 0..20 {
                let permit = pool.acquire();
                let active = &active;
                let peak = &peak;
                scope.spawn(move || {
                    let _permit = permit;
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(2));
                    active.fetch_sub(1, Ordering::SeqCst);
                });
            }
        });
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(pool.available(), 3);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        assert_eq!(WorkerPool::new(0).capacity(), 1);
    }
}
