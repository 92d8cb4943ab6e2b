//! Counting semaphore with close semantics
//!
//! The handshake between the two endpoints of a shared-memory channel runs
//! over a pair of these: `slots_filled` (sender -> receiver) and
//! `slots_freed` (receiver -> sender). The sender also keeps a bounded local
//! one, `capacity`, seeded with the ring depth.
//!
//! Closing a semaphore wakes every blocked acquirer. Permits already
//! released before the close can still be drained; only an acquire that
//! would have to wait reports [`Closed`].

use parking_lot::{Condvar, Mutex};
use std::time::Instant;
use thiserror::Error;
use tracing::warn;

/// The semaphore was closed and no permits remain
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("semaphore closed")]
pub struct Closed;

#[derive(Debug)]
struct State {
    permits: usize,
    closed: bool,
}

#[derive(Debug)]
pub struct Semaphore {
    state: Mutex<State>,
    available: Condvar,
    max: Option<usize>,
}

impl Semaphore {
    /// Unbounded semaphore starting with `permits`
    pub fn new(permits: usize) -> Self {
        Self {
            state: Mutex::new(State {
                permits,
                closed: false,
            }),
            available: Condvar::new(),
            max: None,
        }
    }

    /// Semaphore that never holds more than `max` permits, starting full
    pub fn bounded(max: usize) -> Self {
        Self {
            max: Some(max),
            ..Self::new(max)
        }
    }

    pub fn acquire(&self) -> Result<(), Closed> {
        self.acquire_until(None).map(|_| ())
    }

    /// Block until a permit is taken, the deadline passes (`Ok(false)`) or
    /// the semaphore is closed and drained
    pub fn acquire_until(&self, deadline: Option<Instant>) -> Result<bool, Closed> {
        let mut state = self.state.lock();
        loop {
            if state.permits > 0 {
                state.permits -= 1;
                return Ok(true);
            }
            if state.closed {
                return Err(Closed);
            }
            match deadline {
                None => self.available.wait(&mut state),
                Some(deadline) => {
                    if self.available.wait_until(&mut state, deadline).timed_out() {
                        // One last look: a release may have raced the timeout
                        if state.permits > 0 {
                            state.permits -= 1;
                            return Ok(true);
                        }
                        return Ok(false);
                    }
                }
            }
        }
    }

    /// Take a permit without blocking
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock();
        if state.permits > 0 {
            state.permits -= 1;
            true
        } else {
            false
        }
    }

    pub fn release(&self) {
        let mut state = self.state.lock();
        if let Some(max) = self.max {
            if state.permits >= max {
                warn!(max, "Released a bounded semaphore past its limit");
                return;
            }
        }
        state.permits += 1;
        drop(state);
        self.available.notify_one();
    }

    /// Wake all waiters; further acquires fail once the permits run out
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.available.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn permits(&self) -> usize {
        self.state.lock().permits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_bounded_starts_full_and_saturates() {
        let sem = Semaphore::bounded(2);
        assert_eq!(sem.permits(), 2);
        sem.release();
        assert_eq!(sem.permits(), 2);
        assert!(sem.try_acquire());
        assert!(sem.try_acquire());
        assert!(!sem.try_acquire());
    }

    #[test]
    fn test_release_wakes_blocked_acquirer() {
        let sem = Arc::new(Semaphore::new(0));
        let waiter = {
            let sem = Arc::clone(&sem);
            thread::spawn(move || sem.acquire())
        };
        thread::sleep(Duration::from_millis(20));
        sem.release();
        assert_eq!(waiter.join().unwrap(), Ok(()));
        assert_eq!(sem.permits(), 0);
    }

    #[test]
    fn test_close_drains_then_fails() {
        let sem = Semaphore::new(1);
        sem.close();
        assert!(sem.is_closed());
        assert_eq!(sem.acquire(), Ok(()));
        assert_eq!(sem.acquire(), Err(Closed));
    }

    #[test]
    fn test_close_wakes_blocked_acquirer() {
        let sem = Arc::new(Semaphore::new(0));
        let waiter = {
            let sem = Arc::clone(&sem);
            thread::spawn(move || sem.acquire())
        };
        thread::sleep(Duration::from_millis(20));
        sem.close();
        assert_eq!(waiter.join().unwrap(), Err(Closed));
    }

    #[test]
    fn test_acquire_until_times_out() {
        let sem = Semaphore::new(0);
        let deadline = Instant::now() + Duration::from_millis(10);
        assert_eq!(sem.acquire_until(Some(deadline)), Ok(false));
        sem.release();
        assert_eq!(sem.acquire_until(Some(Instant::now())), Ok(true));
    }
}
