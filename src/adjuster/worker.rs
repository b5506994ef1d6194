//! Background recalculation worker.
//!
//! One dedicated thread turns the shared accumulator plus the current
//! [`ToneSettings`] into a [`DisplayBuffer`]. Every input change is recorded
//! under a single lock and marks the pipeline dirty:
//!
//! - a *hard kick* (settings or data changed) also cancels a run in flight so
//!   the worker restarts with the newest inputs;
//! - a *soft kick* (output became visible) only wakes an idle worker.
//!
//! Bursts of hard kicks collapse into one completed run: each kick cancels the
//! previous run, and the dirty flag is a boolean rather than a queue.
//!
//! The accumulator is read under its own lock only while it is normalized;
//! a producer depositing between runs, or between batches during a run, is
//! fine. Later stages work on the worker's private copy.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, warn};
use parking_lot::{Condvar, Mutex};

use crate::accum::SharedAccumulator;
use crate::tonemap::{BleedParams, DisplayBuffer, Pipeline, ToneSettings};
use crate::util::{CancelToken, Error, Result};

/// Notifications sent from the worker to the display side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjusterEvent {
    /// A new buffer was published; the display should repaint.
    Redraw { generation: u64 },
}

/// Inputs and flags guarded by the coordination lock.
#[derive(Debug)]
pub(crate) struct State {
    pub accumulator: Option<SharedAccumulator>,
    pub settings: ToneSettings,
    /// Bumped on every hard kick; published buffers carry the value they saw.
    pub generation: u64,
    dirty: bool,
    visible: bool,
    running: bool,
    shutdown: bool,
}

/// Everything the handle and the worker thread share.
pub(crate) struct Shared {
    state: Mutex<State>,
    wake: Condvar,
    cancel: CancelToken,
    published: Mutex<Option<Arc<DisplayBuffer>>>,
    /// Signalled after every publish.
    published_wake: Condvar,
    completed: AtomicU64,
    interrupted: AtomicU64,
}

/// Snapshot taken under the lock at the start of a run.
struct Job {
    accumulator: SharedAccumulator,
    settings: ToneSettings,
    generation: u64,
}

/// Handle to the recalculation thread. Dropping it stops the thread.
pub struct Recalculator {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl Recalculator {
    /// Spawn the worker. It starts dirty but hidden and without an accumulator.
    pub fn spawn(
        settings: ToneSettings,
        bleed: BleedParams,
        events: Sender<AdjusterEvent>,
    ) -> Result<Self> {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                accumulator: None,
                settings,
                generation: 0,
                dirty: true,
                visible: false,
                running: false,
                shutdown: false,
            }),
            wake: Condvar::new(),
            cancel: CancelToken::new(),
            published: Mutex::new(None),
            published_wake: Condvar::new(),
            completed: AtomicU64::new(0),
            interrupted: AtomicU64::new(0),
        });

        let worker_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("recalculation".into())
            .spawn(move || worker_loop(worker_shared, bleed, events))?;

        Ok(Self { shared, handle: Some(handle) })
    }

    /// Mutate the inputs under the lock, mark dirty and cancel any run in flight.
    pub(crate) fn hard_kick<R>(&self, update: impl FnOnce(&mut State) -> R) -> R {
        let mut state = self.shared.state.lock();
        let out = update(&mut state);
        self.kick_locked(&mut state);
        out
    }

    /// Like [`hard_kick`](Self::hard_kick), but nothing happens if `update` fails.
    ///
    /// `update` must not modify the state before it fails.
    pub(crate) fn try_hard_kick<R>(
        &self,
        update: impl FnOnce(&mut State) -> Result<R>,
    ) -> Result<R> {
        let mut state = self.shared.state.lock();
        let out = update(&mut state)?;
        self.kick_locked(&mut state);
        Ok(out)
    }

    fn kick_locked(&self, state: &mut State) {
        state.dirty = true;
        state.generation += 1;
        if state.running {
            self.shared.cancel.cancel();
        }
        self.shared.wake.notify_all();
    }

    /// Wake the worker without invalidating a run in flight.
    pub fn soft_kick(&self) {
        let _state = self.shared.state.lock();
        self.shared.wake.notify_all();
    }

    /// Read the inputs under the lock.
    pub(crate) fn with_state<R>(&self, read: impl FnOnce(&State) -> R) -> R {
        read(&self.shared.state.lock())
    }

    /// Set whether output is observed; becoming visible soft-kicks.
    pub fn set_visible(&self, visible: bool) {
        let mut state = self.shared.state.lock();
        let was_visible = std::mem::replace(&mut state.visible, visible);
        if visible && !was_visible {
            self.shared.wake.notify_all();
        }
    }

    pub fn is_visible(&self) -> bool {
        self.shared.state.lock().visible
    }

    /// True while changes are waiting to be picked up.
    pub fn is_dirty(&self) -> bool {
        self.shared.state.lock().dirty
    }

    /// Latest complete buffer, if any run has finished.
    pub fn latest(&self) -> Option<Arc<DisplayBuffer>> {
        self.shared.published.lock().clone()
    }

    /// Block until a buffer reflecting at least `generation` is published.
    pub fn wait_for_generation(
        &self,
        generation: u64,
        timeout: Duration,
    ) -> Option<Arc<DisplayBuffer>> {
        let deadline = Instant::now() + timeout;
        let mut published = self.shared.published.lock();
        loop {
            let current = published.as_ref().filter(|b| b.generation() >= generation);
            if let Some(buffer) = current {
                return Some(Arc::clone(buffer));
            }
            if self.shared.published_wake.wait_until(&mut published, deadline).timed_out() {
                return published.as_ref().filter(|b| b.generation() >= generation).cloned();
            }
        }
    }

    /// Number of runs that published a buffer.
    pub fn completed_runs(&self) -> u64 {
        self.shared.completed.load(Ordering::Acquire)
    }

    /// Number of runs abandoned because of a newer hard kick.
    pub fn interrupted_runs(&self) -> u64 {
        self.shared.interrupted.load(Ordering::Acquire)
    }

    /// Stop the worker and wait for it to finish.
    pub fn stop(&mut self) {
        {
            let mut state = self.shared.state.lock();
            state.shutdown = true;
            self.shared.cancel.cancel();
            self.shared.wake.notify_all();
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Recalculator {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Main worker loop - runs in background thread.
fn worker_loop(shared: Arc<Shared>, bleed: BleedParams, events: Sender<AdjusterEvent>) {
    let mut pipeline = Pipeline::new(bleed);

    while let Some(job) = next_job(&shared) {
        let result = run_job(&mut pipeline, &job, &shared.cancel);
        shared.state.lock().running = false;

        match result {
            Ok(buffer) => {
                *shared.published.lock() = Some(Arc::new(buffer));
                shared.published_wake.notify_all();
                shared.completed.fetch_add(1, Ordering::AcqRel);
                // The display side may have gone away; keep serving `latest()`.
                let _ = events.send(AdjusterEvent::Redraw { generation: job.generation });
            }
            Err(Error::Interrupted) => {
                shared.interrupted.fetch_add(1, Ordering::AcqRel);
                debug!("recalculation {} interrupted, restarting", job.generation);
            }
            Err(e) => {
                warn!("recalculation {} failed: {}", job.generation, e);
            }
        }
    }
    debug!("recalculation thread stopped");
}

/// Block until there is dirty, visible work. `None` on shutdown.
fn next_job(shared: &Shared) -> Option<Job> {
    let mut state = shared.state.lock();
    loop {
        if state.shutdown {
            return None;
        }
        if state.dirty && state.visible {
            if let Some(acc) = &state.accumulator {
                let job = Job {
                    accumulator: Arc::clone(acc),
                    settings: state.settings,
                    generation: state.generation,
                };
                state.dirty = false;
                state.running = true;
                shared.cancel.reset();
                return Some(job);
            }
        }
        shared.wake.wait(&mut state);
    }
}

fn run_job(pipeline: &mut Pipeline, job: &Job, cancel: &CancelToken) -> Result<DisplayBuffer> {
    let _span = tracing::info_span!("recalculate", generation = job.generation).entered();
    {
        let acc = job.accumulator.read();
        pipeline.load(&acc, cancel)?;
    }
    cancel.check()?;
    pipeline.develop(&job.settings, job.generation, cancel)
}
