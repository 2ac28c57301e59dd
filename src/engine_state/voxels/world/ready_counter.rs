//! Count of chunks in a ready state, with a blocking wait for startup.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

use web_time::Instant;

use crate::engine_state::error::WorldError;

/// Longest single sleep of `wait_for`; bounds how late a dead worker is noticed.
const WAIT_SLICE: Duration = Duration::from_millis(100);

#[derive(Debug, Default)]
pub struct ReadyCounter {
    count: AtomicUsize,
    lock: Mutex<()>,
    changed: Condvar,
}

impl ReadyCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    pub fn increment(&self) {
        // Taking the lock orders the increment against a waiter's check-then-wait.
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.count.fetch_add(1, Ordering::AcqRel);
        self.changed.notify_all();
    }

    pub fn decrement(&self) {
        let _ = self
            .count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                count.checked_sub(1)
            });
    }

    pub fn reset(&self) {
        self.count.store(0, Ordering::Release);
    }

    /// Blocks until at least `wanted` chunks are ready.
    ///
    /// # Errors
    /// * `WorkerNotRunning` - `worker_alive` turned false while waiting
    /// * `GenerationTimeout` - `timeout` elapsed first
    pub fn wait_for<F>(&self, wanted: usize, timeout: Duration, worker_alive: F) -> Result<(), WorldError>
    where
        F: Fn() -> bool,
    {
        let deadline = Instant::now() + timeout;
        let mut guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            let ready = self.get();
            if ready >= wanted {
                return Ok(());
            }
            if !worker_alive() {
                return Err(WorldError::WorkerNotRunning);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(WorldError::GenerationTimeout { wanted, ready });
            }
            let slice = (deadline - now).min(WAIT_SLICE);
            guard = self
                .changed
                .wait_timeout(guard, slice)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn decrement_saturates_at_zero() {
        let counter = ReadyCounter::new();
        counter.decrement();
        assert_eq!(counter.get(), 0);
        counter.increment();
        counter.increment();
        counter.decrement();
        assert_eq!(counter.get(), 1);
        counter.reset();
        assert_eq!(counter.get(), 0);
    }

    #[test]
    fn wait_returns_once_threshold_reached() {
        let counter = Arc::new(ReadyCounter::new());
        let producer = {
            let counter = Arc::clone(&counter);
            thread::spawn(move || {
                for _ in 0..3 {
                    thread::sleep(Duration::from_millis(10));
                    counter.increment();
                }
            })
        };
        counter
            .wait_for(3, Duration::from_secs(10), || true)
            .expect("threshold not reached");
        assert!(counter.get() >= 3);
        producer.join().expect("producer panicked");
    }

    #[test]
    fn wait_times_out() {
        let counter = ReadyCounter::new();
        counter.increment();
        let error = counter
            .wait_for(2, Duration::from_millis(30), || true)
            .expect_err("should time out");
        assert!(matches!(
            error,
            WorldError::GenerationTimeout { wanted: 2, ready: 1 }
        ));
    }

    #[test]
    fn wait_stops_when_worker_dies() {
        let counter = ReadyCounter::new();
        let error = counter
            .wait_for(1, Duration::from_secs(30), || false)
            .expect_err("should fail");
        assert!(matches!(error, WorldError::WorkerNotRunning));
    }
}
