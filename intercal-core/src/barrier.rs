//! # Join Barrier
//!
//! A [`Barrier`] waits for a threshold of heterogeneous watched actions to
//! complete, optionally racing a timeout.
//!
//! ## Lifecycle
//!
//! ```text
//!  add()*      lock() / auto-lock           threshold reached
//! ┌──────┐ ───────────────────────> ┌────────┐ ─────────────────> Resolved | Failed
//! │ Open │                          │ Locked │
//! └──────┘                          └────────┘ ─────────────────> TimedOut
//!                                                timer expired
//! ```
//!
//! - `Open`: actions may be added. With `item_count > 0` the barrier locks
//!   itself when the last expected action is added.
//! - `Locked`: membership is fixed and the timeout clock runs.
//! - Terminal states are mutually exclusive and reached at most once.
//!
//! A failed action still counts toward the threshold; its argument list is
//! recorded and the barrier fails with every recorded payload once the
//! threshold is met. Actions completing after a terminal outcome update the
//! progress counters only.
//!
//! ## Timers
//!
//! Locking a barrier that has a timeout spawns a local task
//! (`intercal_async::task::spawn_local`). On native targets this requires a
//! `LocalSet`, which `intercal_async::runtime::block_on` and
//! `#[intercal_async::test]` provide.
//!
//! ## Example
//!
//! ```rust
//! use intercal_core::barrier::{self, Barrier};
//! use intercal_core::signal::{Event, Once};
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let loaded: Once = Once::new();
//! let clicked: Event = Event::new();
//!
//! let barrier = barrier::all(vec![loaded.clone().into(), clicked.clone().into()], None).unwrap();
//! assert!(barrier.is_locked());
//!
//! let done = Rc::new(Cell::new(0));
//! let counter = done.clone();
//! barrier.on_done(move || counter.set(counter.get() + 1));
//!
//! clicked.fire(vec![]);
//! clicked.fire(vec![]);
//! loaded.resolve(vec![]);
//!
//! assert_eq!(done.get(), 1);
//! assert!(barrier.status().finished);
//! ```

use crate::action::{Completion, WatchedAction};
use crate::config::BarrierConfig;
use crate::error::{Error, Result};
use crate::signal::{Args, Once, OnceState};
use intercal_async::sync::oneshot;
use intercal_async::{task, time};
use serde::Serialize;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;
use thiserror::Error as ThisError;
use tracing::{debug, trace, warn};

/// Value reported by [`BarrierStatus`] for timestamps and durations that
/// are not set yet.
pub const NOT_SET: i64 = -1;

/// Why a barrier failed.
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum BarrierFailure {
    /// Failure payloads, one per failed action, in completion order.
    #[error("{} watched action(s) failed", .0.len())]
    Actions(Vec<Args>),

    #[error("timeout")]
    Timeout,
}

impl BarrierFailure {
    /// `"timeout"` for timeouts, `"actions"` for aggregated failures.
    pub fn cause(&self) -> &'static str {
        match self {
            BarrierFailure::Actions(_) => "actions",
            BarrierFailure::Timeout => "timeout",
        }
    }

    pub fn failed_args(&self) -> &[Args] {
        match self {
            BarrierFailure::Actions(args) => args,
            BarrierFailure::Timeout => &[],
        }
    }
}

/// Lifecycle phase of a barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BarrierPhase {
    Open,
    Locked,
    Resolved,
    Failed,
    TimedOut,
}

impl BarrierPhase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BarrierPhase::Resolved | BarrierPhase::Failed | BarrierPhase::TimedOut
        )
    }
}

/// Point-in-time snapshot returned by [`Barrier::status`].
///
/// Times are milliseconds; `start_time`/`end_time` are UNIX epoch based.
/// Unset values are [`NOT_SET`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BarrierStatus {
    pub total: usize,
    pub completed: usize,
    pub remaining: usize,
    pub start_time: i64,
    /// Time since lock, frozen once the barrier settles (0 before lock)
    pub elapsed_time: i64,
    pub end_time: i64,
    /// `end_time - start_time` once settled
    pub total_time: i64,
    /// Time left before the timeout fires, while running with a timeout
    pub remaining_time: i64,
    /// Locked, auto-lock configured, and every action completed
    pub finished: bool,
    pub timed_out: bool,
}

enum Settle {
    Resolve,
    Fail(Vec<Args>),
}

struct BarrierState {
    config: BarrierConfig,
    phase: BarrierPhase,
    /// Outstanding actions keyed by insertion sequence
    items: Vec<(u64, WatchedAction)>,
    next_item: u64,
    added: usize,
    total: usize,
    completed: usize,
    failed_args: Vec<Args>,
    start_time: i64,
    end_time: i64,
    timed_out: bool,
    /// Dropping the sender cancels the pending timeout task
    cancel_timer: Option<oneshot::Sender<()>>,
}

impl BarrierState {
    fn threshold(&self) -> usize {
        self.config.threshold().unwrap_or(self.total)
    }

    /// Settles the barrier if it is locked and the threshold is reached.
    fn evaluate(&mut self) -> Option<Settle> {
        if self.phase != BarrierPhase::Locked || self.completed < self.threshold() {
            return None;
        }

        self.end_time = now();
        self.cancel_timer = None;

        if self.failed_args.is_empty() {
            self.phase = BarrierPhase::Resolved;
            Some(Settle::Resolve)
        } else {
            self.phase = BarrierPhase::Failed;
            Some(Settle::Fail(self.failed_args.clone()))
        }
    }
}

/// A join barrier over watched actions.
///
/// `Barrier` is a cheap handle; clones share state. Watched actions keep the
/// barrier alive until they report, and a running timeout keeps it alive
/// until it fires or is cancelled.
#[derive(Clone)]
pub struct Barrier {
    state: Rc<RefCell<BarrierState>>,
    outcome: Once<(), BarrierFailure>,
    timeout_signal: Once<(), ()>,
}

impl Barrier {
    /// Creates an empty, unlocked barrier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the configuration could never settle.
    pub fn new(config: BarrierConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            state: Rc::new(RefCell::new(BarrierState {
                config,
                phase: BarrierPhase::Open,
                items: Vec::new(),
                next_item: 0,
                added: 0,
                total: 0,
                completed: 0,
                failed_args: Vec::new(),
                start_time: NOT_SET,
                end_time: NOT_SET,
                timed_out: false,
                cancel_timer: None,
            })),
            outcome: Once::new(),
            timeout_signal: Once::new(),
        })
    }

    /// Creates a barrier pre-seeded with `actions`.
    ///
    /// `item_count` is the number of actions, so a non-empty list locks the
    /// barrier immediately. An empty list yields a manual-lock barrier.
    ///
    /// # Panics
    ///
    /// Same as [`lock`](Self::lock) for a non-empty list with a timeout.
    pub fn from_actions(
        actions: Vec<WatchedAction>,
        timeout: Option<Duration>,
        wait_completed_count: Option<usize>,
    ) -> Result<Self> {
        let mut builder = BarrierConfig::builder()
            .item_count(actions.len())
            .maybe_timeout(timeout);
        if let Some(count) = wait_completed_count {
            builder = builder.wait_completed_count(count);
        }

        let barrier = Self::new(builder.build()?)?;
        barrier.add_all(actions)?;
        Ok(barrier)
    }

    /// Adds a watched action.
    ///
    /// Returns `Ok(false)` without watching the action once the barrier is
    /// locked. Adding the last expected action locks the barrier.
    ///
    /// # Panics
    ///
    /// Same as [`lock`](Self::lock) when the action triggers auto-lock.
    pub fn add(&self, action: impl Into<WatchedAction>) -> Result<bool> {
        let action = action.into();

        let id = {
            let mut state = self.state.borrow_mut();
            if state.phase != BarrierPhase::Open {
                trace!(kind = action.kind(), "barrier locked, ignoring action");
                return Ok(false);
            }
            let id = state.next_item;
            state.next_item += 1;
            state.added += 1;
            state.items.push((id, action.clone()));
            trace!(item = id, kind = action.kind(), added = state.added, "watching action");
            id
        };

        let barrier = self.clone();
        action.on_first_completion(move |completion| barrier.report(id, completion));

        let auto_lock = {
            let state = self.state.borrow();
            state.phase == BarrierPhase::Open
                && state.config.auto_locks()
                && state.added == state.config.item_count
        };
        if auto_lock {
            self.lock()?;
        }

        Ok(true)
    }

    /// Adds every action in order, stopping at the first error.
    pub fn add_all<I>(&self, actions: I) -> Result<()>
    where
        I: IntoIterator,
        I::Item: Into<WatchedAction>,
    {
        for action in actions {
            self.add(action)?;
        }
        Ok(())
    }

    /// Fixes membership and starts the timeout clock.
    ///
    /// Locking an already-locked barrier is a no-op.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyBarrier`] when no action was ever added
    /// - [`Error::PrematureLock`] when fewer than `item_count` actions were added
    /// - [`Error::Config`] in manual mode when the threshold exceeds the
    ///   number of added actions
    ///
    /// # Panics
    ///
    /// On native targets, panics when a timeout is configured and the call
    /// locks the barrier outside of a Tokio `LocalSet`. Use
    /// `intercal_async::runtime::block_on` or `#[intercal_async::test]`.
    pub fn lock(&self) -> Result<()> {
        let (settle, timer) = {
            let mut state = self.state.borrow_mut();
            if state.phase != BarrierPhase::Open {
                return Ok(());
            }
            if state.added == 0 {
                return Err(Error::EmptyBarrier);
            }
            if state.config.auto_locks() && state.added != state.config.item_count {
                return Err(Error::PrematureLock {
                    expected: state.config.item_count,
                    added: state.added,
                });
            }
            if let Some(wait) = state.config.wait_completed_count {
                if wait > state.added {
                    return Err(Error::Config(format!(
                        "waitCompletedCount ({}) exceeds the {} watched action(s)",
                        wait, state.added
                    )));
                }
            }

            state.phase = BarrierPhase::Locked;
            state.total = state.added;
            state.start_time = now();
            debug!(
                total = state.total,
                threshold = state.threshold(),
                completed = state.completed,
                timeout_ms = state.config.timeout_ms,
                "barrier locked"
            );

            // Actions that completed while the barrier was open count now.
            let settle = state.evaluate();
            let timer = match (&settle, state.config.timeout()) {
                (None, Some(timeout)) => {
                    let (cancel, cancelled) = oneshot::channel();
                    state.cancel_timer = Some(cancel);
                    Some((timeout, cancelled))
                }
                _ => None,
            };
            (settle, timer)
        };

        if let Some((timeout, cancelled)) = timer {
            self.start_timer(timeout, cancelled);
        }
        if let Some(settle) = settle {
            self.apply(settle);
        }

        Ok(())
    }

    fn start_timer(&self, timeout: Duration, cancelled: oneshot::Receiver<()>) {
        let barrier = self.clone();
        task::spawn_local(async move {
            // Resolves early when the barrier settles and drops the sender.
            if time::timeout(timeout, cancelled).await.is_err() {
                barrier.expire();
            }
        });
    }

    fn report(&self, id: u64, completion: Completion) {
        let settle = {
            let mut state = self.state.borrow_mut();
            let before = state.items.len();
            state.items.retain(|(item, _)| *item != id);
            if state.items.len() == before {
                return;
            }
            state.completed += 1;

            if let Completion::Failed(args) = &completion {
                if !state.phase.is_terminal() {
                    state.failed_args.push(args.clone());
                }
            }
            trace!(
                item = id,
                failed = matches!(completion, Completion::Failed(_)),
                completed = state.completed,
                phase = ?state.phase,
                "action completed"
            );

            state.evaluate()
        };

        if let Some(settle) = settle {
            self.apply(settle);
        }
    }

    fn apply(&self, settle: Settle) {
        match settle {
            Settle::Resolve => {
                debug!("barrier resolved");
                self.outcome.resolve(());
            }
            Settle::Fail(failed_args) => {
                debug!(failures = failed_args.len(), "barrier failed");
                self.outcome.reject(BarrierFailure::Actions(failed_args));
            }
        }
    }

    fn expire(&self) {
        {
            let mut state = self.state.borrow_mut();
            if state.phase != BarrierPhase::Locked {
                return;
            }
            state.phase = BarrierPhase::TimedOut;
            state.timed_out = true;
            state.end_time = now();
            state.cancel_timer = None;
            warn!(
                completed = state.completed,
                total = state.total,
                timeout_ms = state.config.timeout_ms,
                "barrier timed out"
            );
        }

        self.timeout_signal.resolve(());
        self.outcome.reject(BarrierFailure::Timeout);
    }

    pub fn is_locked(&self) -> bool {
        self.state.borrow().phase != BarrierPhase::Open
    }

    pub fn phase(&self) -> BarrierPhase {
        self.state.borrow().phase
    }

    pub fn config(&self) -> BarrierConfig {
        self.state.borrow().config
    }

    /// Failure payloads recorded so far, in completion order.
    pub fn failed_args(&self) -> Vec<Args> {
        self.state.borrow().failed_args.clone()
    }

    /// The settled outcome, if any.
    pub fn outcome(&self) -> Option<std::result::Result<(), BarrierFailure>> {
        self.outcome.outcome()
    }

    /// Point-in-time progress snapshot.
    pub fn status(&self) -> BarrierStatus {
        let state = self.state.borrow();
        let locked = state.phase != BarrierPhase::Open;
        let terminal = state.phase.is_terminal();
        let remaining = state.items.len();

        let elapsed_time = if !locked {
            0
        } else if terminal {
            state.end_time - state.start_time
        } else {
            now() - state.start_time
        };

        let remaining_time = match state.config.timeout() {
            Some(timeout) if state.phase == BarrierPhase::Locked => {
                i64::try_from(timeout.as_millis())
                    .unwrap_or(i64::MAX)
                    .saturating_sub(elapsed_time)
                    .max(0)
            }
            _ => NOT_SET,
        };

        BarrierStatus {
            total: if locked { state.total } else { state.added },
            completed: state.completed,
            remaining,
            start_time: state.start_time,
            elapsed_time,
            end_time: state.end_time,
            total_time: if terminal {
                state.end_time - state.start_time
            } else {
                NOT_SET
            },
            remaining_time,
            finished: locked && state.config.auto_locks() && remaining == 0,
            timed_out: state.timed_out,
        }
    }

    /// Runs `callback` once the barrier resolves (immediately if it has).
    pub fn on_done<F>(&self, callback: F) -> &Self
    where
        F: FnOnce() + 'static,
    {
        self.outcome.on_done(move |_| callback());
        self
    }

    /// Runs `callback` with the failure once the barrier fails or times out.
    pub fn on_fail<F>(&self, callback: F) -> &Self
    where
        F: FnOnce(&BarrierFailure) + 'static,
    {
        self.outcome.on_fail(callback);
        self
    }

    /// Runs `callback` when the timeout fires, before the fail callbacks.
    pub fn on_timeout<F>(&self, callback: F) -> &Self
    where
        F: FnOnce() + 'static,
    {
        self.timeout_signal.on_done(move |_| callback());
        self
    }

    /// Waits for the outcome.
    pub async fn wait(&self) -> std::result::Result<(), BarrierFailure> {
        self.outcome.settled().await
    }

    /// Whether the timeout notification has fired.
    pub fn timed_out(&self) -> bool {
        self.timeout_signal.state() == OnceState::Resolved
    }
}

impl fmt::Debug for Barrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state.try_borrow() {
            Ok(state) => f
                .debug_struct("Barrier")
                .field("phase", &state.phase)
                .field("config", &state.config)
                .field("added", &state.added)
                .field("completed", &state.completed)
                .field("outstanding", &state.items.len())
                .field("failures", &state.failed_args.len())
                .finish(),
            Err(_) => f.debug_struct("Barrier").finish_non_exhaustive(),
        }
    }
}

/// Waits for every action; locks immediately when `actions` is non-empty.
///
/// # Panics
///
/// On native targets, panics when `timeout` is set and `actions` is non-empty
/// outside of a Tokio `LocalSet` (see [`Barrier::lock`]).
pub fn all(actions: Vec<WatchedAction>, timeout: Option<Duration>) -> Result<Barrier> {
    Barrier::from_actions(actions, timeout, None)
}

/// Settles once `count` of `actions` have completed, whatever their outcome.
///
/// # Panics
///
/// On native targets, panics when `timeout` is set and `actions` is non-empty
/// outside of a Tokio `LocalSet` (see [`Barrier::lock`]).
pub fn any(actions: Vec<WatchedAction>, count: usize, timeout: Option<Duration>) -> Result<Barrier> {
    Barrier::from_actions(actions, timeout, Some(count))
}

/// [`any`] with a count of one.
///
/// # Panics
///
/// On native targets, panics when `timeout` is set and `actions` is non-empty
/// outside of a Tokio `LocalSet` (see [`Barrier::lock`]).
pub fn any_one(actions: Vec<WatchedAction>, timeout: Option<Duration>) -> Result<Barrier> {
    any(actions, 1, timeout)
}

fn now() -> i64 {
    time::now_millis() as i64
}
