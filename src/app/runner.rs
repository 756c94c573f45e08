//! Engine task runner: the acquire / work / release / sleep loop.
//!
//! ```text
//!            ┌──────── first acquire timed out ────────▶ Halted (terminal)
//!  acquire ──┤
//!            ├──────── later acquire timed out ────────▶ sleep busy_retry ─▶ acquire
//!            │
//!            └─ granted ─▶ [setup once] ─▶ run_once ─▶ release ─▶ sleep ─▶ acquire
//! ```
//!
//! Every engine shares this skeleton; only `run_once` differs.  The token
//! is always released (guard dropped) before any sleep.

use core::time::Duration;
use std::sync::Arc;

use embedded_hal::delay::DelayNs;
use log::{error, info};

use super::arbiter::{LinkArbiter, LinkGuard};
use super::events::{EngineEvent, HaltReason, TaskId};
use super::health::{HealthBoard, TaskHealth};
use super::ports::{EventSink, LinkPort};
use crate::config::ClientConfig;

/// How one iteration ended, as decided by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Exchange done (or aborted mid-way); sleep the full pause.
    Finished,
    /// The link could not be brought up; nothing was attempted.
    LinkDown,
    /// Transient failure before the exchange; retry after a short delay.
    Retry { after_ms: u32 },
}

/// Result of one [`EngineTask::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Token was granted and the engine ran.
    Acquired(Outcome),
    /// Token wait timed out; the task backed off.
    Busy,
    /// The task is halted and will never run again.
    Halted(HaltReason),
}

/// One client workflow driven by [`EngineTask`].
pub trait Engine {
    fn task(&self) -> TaskId;

    /// One-time initialisation, run while the token is held on the first
    /// grant.  An error halts the task.
    fn setup(&mut self) -> Result<(), HaltReason> {
        Ok(())
    }

    /// One request/response exchange (or inbox poll).
    fn run_once<L: LinkPort>(&mut self, link: &mut LinkGuard<'_, L>, sink: &mut impl EventSink) -> Outcome;
}

/// Loop timing shared by every engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskTiming {
    pub pause_secs: u32,
    pub acquire_timeout_ms: u32,
    pub busy_retry_ms: u32,
    pub stall_poll_ms: u32,
}

impl From<&ClientConfig> for TaskTiming {
    fn from(c: &ClientConfig) -> Self {
        Self {
            pause_secs: c.task_pause_secs,
            acquire_timeout_ms: c.acquire_timeout_ms,
            busy_retry_ms: c.busy_retry_ms,
            stall_poll_ms: c.stall_poll_ms,
        }
    }
}

pub struct EngineTask<E, L, D, S> {
    engine: E,
    arbiter: Arc<LinkArbiter<L>>,
    health: Arc<HealthBoard>,
    delay: D,
    sink: S,
    timing: TaskTiming,
    started: bool,
    halted: Option<HaltReason>,
}

impl<E, L, D, S> EngineTask<E, L, D, S>
where
    E: Engine,
    L: LinkPort,
    D: DelayNs,
    S: EventSink,
{
    pub fn new(
        engine: E,
        arbiter: Arc<LinkArbiter<L>>,
        health: Arc<HealthBoard>,
        delay: D,
        sink: S,
        timing: TaskTiming,
    ) -> Self {
        Self {
            engine,
            arbiter,
            health,
            delay,
            sink,
            timing,
            started: false,
            halted: None,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn halted(&self) -> Option<HaltReason> {
        self.halted
    }

    /// One pass through the loop, including the trailing sleep.
    pub fn step(&mut self) -> Step {
        if let Some(reason) = self.halted {
            return Step::Halted(reason);
        }

        let task = self.engine.task();
        let first = !self.started;
        let timeout = Duration::from_millis(u64::from(self.timing.acquire_timeout_ms));

        let arbiter = Arc::clone(&self.arbiter);
        let mut guard = match arbiter.acquire(task, timeout) {
            Ok(guard) => guard,
            Err(e) if first => {
                error!("{}: *** ERROR: CANNOT GET LINK TOKEN *** ({})", task.tag(), e);
                return self.halt(HaltReason::InitialAcquireTimeout);
            }
            Err(e) => {
                error!("{}: ===== ERROR: CANNOT GET LINK TOKEN ===== ({})", task.tag(), e);
                self.sink.emit(&EngineEvent::TokenBusy { task, retry_ms: self.timing.busy_retry_ms });
                self.delay.delay_ms(self.timing.busy_retry_ms);
                return Step::Busy;
            }
        };

        if first {
            self.started = true;
            self.health.set(task, TaskHealth::Running);
            if let Err(reason) = self.engine.setup() {
                drop(guard);
                return self.halt(reason);
            }
        }

        let outcome = self.engine.run_once(&mut guard, &mut self.sink);
        drop(guard);

        match outcome {
            Outcome::Finished | Outcome::LinkDown => {
                if outcome == Outcome::LinkDown {
                    self.sink.emit(&EngineEvent::LinkDown(task));
                }
                info!("{}: Waiting {} sec...", task.tag(), self.timing.pause_secs);
                self.sink.emit(&EngineEvent::Waiting { task, secs: self.timing.pause_secs });
                self.delay.delay_ms(self.timing.pause_secs.saturating_mul(1000));
            }
            Outcome::Retry { after_ms } => {
                self.sink.emit(&EngineEvent::SoftRetry { task, retry_ms: after_ms });
                self.delay.delay_ms(after_ms);
            }
        }
        Step::Acquired(outcome)
    }

    /// Run until the process ends.  A halted task parks in a slow poll.
    pub fn run_forever(mut self) -> ! {
        loop {
            if let Step::Halted(_) = self.step() {
                self.delay.delay_ms(self.timing.stall_poll_ms);
            }
        }
    }

    fn halt(&mut self, reason: HaltReason) -> Step {
        let task = self.engine.task();
        error!("{}: HALTED: {}", task.tag(), reason);
        self.halted = Some(reason);
        self.health.set(task, TaskHealth::Halted(reason));
        self.sink.emit(&EngineEvent::Halted { task, reason });
        Step::Halted(reason)
    }
}
