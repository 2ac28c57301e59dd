//! # Job Scheduler
//!
//! The work queue shared by the world and its update thread.
//!
//! Three kinds of job exist, served in this order:
//! 1. `Evict` - persist (if modified) and drop a chunk that left the window
//! 2. `Remesh` - rebuild the mesh of an edited chunk
//! 3. `Generate` - load or generate a queued chunk, nearest to the center first
//!
//! Evictions go first so memory is released before new chunks are built, and
//! remeshes beat generation so edits show up before the horizon fills in.
//!
//! An eviction whose save failed is deferred and handed out again once
//! `EVICTION_RETRY_DELAY` has passed, after any other queued work.
//!
//! ## Drain protocol
//!
//! Every job handed out is counted as in flight until `finish` is called.
//! `pause_and_drain` stops new jobs from being handed out and waits for that
//! count to reach zero, which gives the caller a quiescent world to restructure.

use std::collections::{HashSet, VecDeque};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use web_time::{Duration, Instant};

use crate::engine_state::voxels::chunk::ChunkCoord;

/// How long a failed eviction waits before it is attempted again.
pub const EVICTION_RETRY_DELAY: Duration = Duration::from_millis(500);

/// A unit of background work.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Job {
    Generate(ChunkCoord),
    Remesh(ChunkCoord),
    Evict(ChunkCoord),
}

#[derive(Debug, Default)]
struct Scheduler {
    generation: VecDeque<ChunkCoord>,
    remesh: VecDeque<ChunkCoord>,
    remesh_pending: HashSet<ChunkCoord>,
    evictions: VecDeque<ChunkCoord>,
    /// Failed evictions and when they become due, oldest first
    deferred: VecDeque<(Instant, ChunkCoord)>,
    paused: bool,
    shutdown: bool,
    in_flight: usize,
}

impl Scheduler {
    fn pop(&mut self) -> Option<Job> {
        if let Some(coord) = self.evictions.pop_front() {
            return Some(Job::Evict(coord));
        }
        if let Some(coord) = self.remesh.pop_front() {
            self.remesh_pending.remove(&coord);
            return Some(Job::Remesh(coord));
        }
        if let Some(coord) = self.generation.pop_front() {
            return Some(Job::Generate(coord));
        }
        match self.deferred.front() {
            Some((due, _)) if *due <= Instant::now() => {
                self.deferred.pop_front().map(|(_, coord)| Job::Evict(coord))
            }
            _ => None,
        }
    }

    /// Time left until the oldest deferred eviction is due.
    fn next_retry_in(&self) -> Option<Duration> {
        self.deferred
            .front()
            .map(|(due, _)| due.saturating_duration_since(Instant::now()))
    }

    fn pending(&self) -> usize {
        self.generation.len() + self.remesh.len() + self.evictions.len()
    }
}

/// Thread-safe job queue with pause, drain and shutdown support.
#[derive(Debug, Default)]
pub struct JobQueue {
    state: Mutex<Scheduler>,
    /// Signalled when work arrives, on resume and on shutdown
    wake: Condvar,
    /// Signalled when the in-flight count drops to zero
    idle: Condvar,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Scheduler> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the generation queue. `coords` must already be nearest-first.
    pub fn set_generation_queue(&self, coords: Vec<ChunkCoord>) {
        let mut state = self.lock();
        state.generation = coords.into();
        self.wake.notify_all();
    }

    /// Queues a remesh of `coord` unless one is already pending.
    pub fn push_remesh(&self, coord: ChunkCoord) {
        let mut state = self.lock();
        if state.remesh_pending.insert(coord) {
            state.remesh.push_back(coord);
            self.wake.notify_all();
        }
    }

    pub fn push_eviction(&self, coord: ChunkCoord) {
        let mut state = self.lock();
        state.evictions.push_back(coord);
        self.wake.notify_all();
    }

    /// Queues another eviction attempt of `coord` after `EVICTION_RETRY_DELAY`.
    pub fn defer_eviction(&self, coord: ChunkCoord) {
        let mut state = self.lock();
        if state.deferred.iter().all(|(_, deferred)| *deferred != coord) {
            state
                .deferred
                .push_back((Instant::now() + EVICTION_RETRY_DELAY, coord));
            self.wake.notify_all();
        }
    }

    /// Drops every queued job. In-flight jobs are unaffected.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.generation.clear();
        state.remesh.clear();
        state.remesh_pending.clear();
        state.evictions.clear();
        state.deferred.clear();
    }

    /// Number of queued jobs, not counting in-flight or deferred ones.
    pub fn pending(&self) -> usize {
        self.lock().pending()
    }

    /// Number of failed evictions waiting for another attempt.
    pub fn deferred(&self) -> usize {
        self.lock().deferred.len()
    }

    /// Takes the next job and marks it in flight.
    ///
    /// With `block` set, waits while the queue is empty or paused, waking up
    /// when a deferred eviction falls due. Returns `None` once shutdown is
    /// requested, or immediately when not blocking and nothing can be handed out.
    pub fn next_job(&self, block: bool) -> Option<Job> {
        let mut state = self.lock();
        loop {
            if state.shutdown {
                return None;
            }
            if !state.paused {
                if let Some(job) = state.pop() {
                    state.in_flight += 1;
                    return Some(job);
                }
            }
            if !block {
                return None;
            }
            state = match state.next_retry_in() {
                Some(timeout) if !state.paused => {
                    self.wake
                        .wait_timeout(state, timeout)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
                _ => self.wake.wait(state).unwrap_or_else(PoisonError::into_inner),
            };
        }
    }

    /// Marks one job handed out by `next_job` as done.
    pub fn finish(&self) {
        let mut state = self.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
        if state.in_flight == 0 {
            self.idle.notify_all();
        }
    }

    /// Stops handing out jobs and waits until none is in flight.
    pub fn pause_and_drain(&self) {
        let mut state = self.lock();
        state.paused = true;
        while state.in_flight > 0 {
            state = self.idle.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub fn resume(&self) {
        self.lock().paused = false;
        self.wake.notify_all();
    }

    /// Makes every current and future `next_job` call return `None`.
    pub fn request_shutdown(&self) {
        self.lock().shutdown = true;
        self.wake.notify_all();
    }

    /// Re-arms the queue after a shutdown so a new update thread can start.
    pub fn reset_shutdown(&self) {
        self.lock().shutdown = false;
    }
}

/// Calls `JobQueue::finish` on drop, so a panicking job still leaves the in-flight count balanced.
pub struct InFlight<'a>(pub &'a JobQueue);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.finish();
    }
}
