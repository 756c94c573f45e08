//! Engine task loop: token handling, halting, sleeps and event flow.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gsm_pppos::app::arbiter::{LinkArbiter, LinkGuard};
use gsm_pppos::app::events::{EngineEvent, HaltReason, TaskId};
use gsm_pppos::app::health::{HealthBoard, TaskHealth};
use gsm_pppos::app::http_engine::HttpEngine;
use gsm_pppos::app::https_engine::HttpsEngine;
use gsm_pppos::app::ports::{EventSink, LinkPort};
use gsm_pppos::app::runner::{Engine, EngineTask, Outcome, Step, TaskTiming};
use gsm_pppos::config::ClientConfig;
use gsm_pppos::error::TlsSetupError;

use crate::mocks::{LinkCall, MockLink, MockNet, MockTls, RecordingDelay, RecordingSink};

const TIMING: TaskTiming =
    TaskTiming { pause_secs: 5, acquire_timeout_ms: 20, busy_retry_ms: 700, stall_poll_ms: 900 };

// ── Scripted engine ───────────────────────────────────────────

#[derive(Default)]
struct Counters {
    setups: AtomicUsize,
    runs: AtomicUsize,
    inside: AtomicUsize,
    max_inside: AtomicUsize,
}

struct ScriptedEngine {
    task: TaskId,
    setup: Result<(), HaltReason>,
    outcomes: VecDeque<Outcome>,
    counters: Arc<Counters>,
}

impl ScriptedEngine {
    fn new(task: TaskId) -> Self {
        Self { task, setup: Ok(()), outcomes: VecDeque::new(), counters: Arc::default() }
    }
}

impl Engine for ScriptedEngine {
    fn task(&self) -> TaskId {
        self.task
    }

    fn setup(&mut self) -> Result<(), HaltReason> {
        self.counters.setups.fetch_add(1, Ordering::SeqCst);
        self.setup
    }

    fn run_once<L: LinkPort>(&mut self, link: &mut LinkGuard<'_, L>, _sink: &mut impl EventSink) -> Outcome {
        let now = self.counters.inside.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.max_inside.fetch_max(now, Ordering::SeqCst);
        self.counters.runs.fetch_add(1, Ordering::SeqCst);
        let outcome = if link.ensure_data_mode() {
            self.outcomes.pop_front().unwrap_or(Outcome::Finished)
        } else {
            Outcome::LinkDown
        };
        std::thread::yield_now();
        self.counters.inside.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}

type Task<E> = EngineTask<E, MockLink, RecordingDelay, RecordingSink>;

fn task<E: Engine>(
    engine: E,
    arbiter: &Arc<LinkArbiter<MockLink>>,
    health: &Arc<HealthBoard>,
) -> (Task<E>, RecordingDelay) {
    let delay = RecordingDelay::default();
    let task = EngineTask::new(
        engine,
        Arc::clone(arbiter),
        Arc::clone(health),
        delay.clone(),
        RecordingSink::default(),
        TIMING,
    );
    (task, delay)
}

fn fixture(link: &MockLink) -> (Arc<LinkArbiter<MockLink>>, Arc<HealthBoard>) {
    (Arc::new(LinkArbiter::new(link.clone())), Arc::new(HealthBoard::new()))
}

// ── Normal iterations ─────────────────────────────────────────

#[test]
fn finished_run_releases_the_token_and_sleeps_the_pause() {
    let (arbiter, health) = fixture(&MockLink::connected());
    let (mut t, delay) = task(ScriptedEngine::new(TaskId::Http), &arbiter, &health);

    assert_eq!(t.step(), Step::Acquired(Outcome::Finished));

    assert_eq!(arbiter.holder(), None);
    assert_eq!(delay.delays(), vec![5_000]);
    assert_eq!(t.sink().events, vec![EngineEvent::Waiting { task: TaskId::Http, secs: 5 }]);
    assert_eq!(health.get(TaskId::Http), TaskHealth::Running);
}

#[test]
fn setup_runs_once_on_the_first_grant() {
    let (arbiter, health) = fixture(&MockLink::connected());
    let engine = ScriptedEngine::new(TaskId::Sms);
    let counters = Arc::clone(&engine.counters);
    let (mut t, _) = task(engine, &arbiter, &health);

    t.step();
    t.step();
    t.step();

    assert_eq!(counters.setups.load(Ordering::SeqCst), 1);
    assert_eq!(counters.runs.load(Ordering::SeqCst), 3);
    assert_eq!(arbiter.grants(), 3);
}

#[test]
fn retry_outcome_sleeps_the_short_delay_only() {
    let (arbiter, health) = fixture(&MockLink::connected());
    let mut engine = ScriptedEngine::new(TaskId::Http);
    engine.outcomes.push_back(Outcome::Retry { after_ms: 1_000 });
    let (mut t, delay) = task(engine, &arbiter, &health);

    assert_eq!(t.step(), Step::Acquired(Outcome::Retry { after_ms: 1_000 }));

    assert_eq!(delay.delays(), vec![1_000]);
    assert_eq!(t.sink().events, vec![EngineEvent::SoftRetry { task: TaskId::Http, retry_ms: 1_000 }]);
    assert_eq!(arbiter.holder(), None);
}

#[test]
fn link_down_skips_the_transport_but_still_releases_and_sleeps() {
    let link = MockLink::new(false);
    let (arbiter, health) = fixture(&link);
    let engine = HttpEngine::new(MockNet::serving(&[b"HTTP/1.1 200 OK\r\n\r\n"]), &ClientConfig::default());
    let (mut t, delay) = task(engine, &arbiter, &health);

    assert_eq!(t.step(), Step::Acquired(Outcome::LinkDown));

    assert!(t.engine().net().calls().is_empty());
    assert_eq!(link.calls(), vec![LinkCall::BringUp]);
    assert_eq!(arbiter.holder(), None);
    assert_eq!(delay.delays(), vec![5_000]);
    assert_eq!(
        t.sink().events,
        vec![EngineEvent::LinkDown(TaskId::Http), EngineEvent::Waiting { task: TaskId::Http, secs: 5 }]
    );
}

// ── Token timeouts ────────────────────────────────────────────

#[test]
fn first_acquire_timeout_halts_the_task() {
    let (arbiter, health) = fixture(&MockLink::connected());
    let engine = ScriptedEngine::new(TaskId::Https);
    let counters = Arc::clone(&engine.counters);
    let (mut t, delay) = task(engine, &arbiter, &health);

    let held = arbiter.acquire(TaskId::Supervisor, Duration::from_millis(20)).unwrap();
    assert_eq!(t.step(), Step::Halted(HaltReason::InitialAcquireTimeout));
    drop(held);

    // halted for good, even once the token is free
    assert_eq!(t.step(), Step::Halted(HaltReason::InitialAcquireTimeout));
    assert_eq!(arbiter.grants(), 1);
    assert_eq!(counters.runs.load(Ordering::SeqCst), 0);
    assert!(delay.delays().is_empty());
    assert_eq!(
        health.get(TaskId::Https),
        TaskHealth::Halted(HaltReason::InitialAcquireTimeout)
    );
    assert_eq!(
        t.sink().events,
        vec![EngineEvent::Halted { task: TaskId::Https, reason: HaltReason::InitialAcquireTimeout }]
    );
}

#[test]
fn later_acquire_timeout_backs_off_and_retries() {
    let (arbiter, health) = fixture(&MockLink::connected());
    let (mut t, delay) = task(ScriptedEngine::new(TaskId::Sms), &arbiter, &health);
    assert_eq!(t.step(), Step::Acquired(Outcome::Finished));

    let held = arbiter.acquire(TaskId::Http, Duration::from_millis(20)).unwrap();
    assert_eq!(t.step(), Step::Busy);
    drop(held);

    assert_eq!(delay.delays(), vec![5_000, 700]);
    assert_eq!(
        t.sink().events.last(),
        Some(&EngineEvent::TokenBusy { task: TaskId::Sms, retry_ms: 700 })
    );
    assert_eq!(t.halted(), None);
    assert_eq!(t.step(), Step::Acquired(Outcome::Finished));
}

// ── Setup failures ────────────────────────────────────────────

#[test]
fn setup_failure_halts_after_releasing_the_token() {
    let (arbiter, health) = fixture(&MockLink::connected());
    let mut engine = ScriptedEngine::new(TaskId::Http);
    engine.setup = Err(HaltReason::BufferAllocation);
    let counters = Arc::clone(&engine.counters);
    let (mut t, _) = task(engine, &arbiter, &health);

    assert_eq!(t.step(), Step::Halted(HaltReason::BufferAllocation));
    assert_eq!(arbiter.holder(), None);
    assert_eq!(counters.runs.load(Ordering::SeqCst), 0);

    assert_eq!(t.step(), Step::Halted(HaltReason::BufferAllocation));
    assert_eq!(arbiter.grants(), 1);
    assert_eq!(health.halted(), vec![(TaskId::Http, HaltReason::BufferAllocation)]);
}

#[test]
fn bad_trust_anchor_halts_the_https_task_only() {
    let (arbiter, health) = fixture(&MockLink::connected());
    let mut tls = MockTls::serving(&[]);
    tls.setup_result = Err(TlsSetupError::TrustAnchor(-0x2180));
    let https = HttpsEngine::new(tls, &b""[..], &ClientConfig::default());
    let (mut bad, _) = task(https, &arbiter, &health);
    let (mut good, _) = task(ScriptedEngine::new(TaskId::Sms), &arbiter, &health);

    let reason = HaltReason::TlsSetup(TlsSetupError::TrustAnchor(-0x2180));
    assert_eq!(bad.step(), Step::Halted(reason));
    assert_eq!(good.step(), Step::Acquired(Outcome::Finished));
    assert!(health.is_halted(TaskId::Https));
    assert!(!health.is_halted(TaskId::Sms));
}

// ── Concurrency ───────────────────────────────────────────────

#[test]
fn concurrent_tasks_never_hold_the_link_together() {
    let (arbiter, health) = fixture(&MockLink::connected());
    let counters = Arc::new(Counters::default());
    let timing = TaskTiming { acquire_timeout_ms: 10_000, ..TIMING };

    let handles: Vec<_> = [TaskId::Http, TaskId::Https, TaskId::Sms]
        .into_iter()
        .map(|id| {
            let mut engine = ScriptedEngine::new(id);
            engine.counters = Arc::clone(&counters);
            let mut t = EngineTask::new(
                engine,
                Arc::clone(&arbiter),
                Arc::clone(&health),
                RecordingDelay::default(),
                RecordingSink::default(),
                timing,
            );
            std::thread::spawn(move || (0..50).map(|_| t.step()).collect::<Vec<_>>())
        })
        .collect();

    for h in handles {
        let steps = h.join().unwrap();
        assert!(steps.iter().all(|s| *s == Step::Acquired(Outcome::Finished)));
    }
    assert_eq!(counters.max_inside.load(Ordering::SeqCst), 1);
    assert_eq!(arbiter.grants(), 150);
    assert_eq!(arbiter.holder(), None);
}
