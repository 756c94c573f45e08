//! Task identities, halt reasons and outbound engine events.
//!
//! The engine runner emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them (serial log, test recorder, ...).

use core::fmt;

use crate::error::TlsSetupError;

/// Every party that can hold the link token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TaskId {
    /// Startup code in `main` (initial bring-up, time sync).
    Supervisor = 0,
    Http = 1,
    Https = 2,
    Sms = 3,
}

impl TaskId {
    /// Total number of identities, used to size the health board.
    pub const COUNT: usize = 4;

    pub const ALL: [TaskId; Self::COUNT] = [Self::Supervisor, Self::Http, Self::Https, Self::Sms];

    pub fn name(self) -> &'static str {
        match self {
            Self::Supervisor => "supervisor",
            Self::Http => "http_get_task",
            Self::Https => "https_get_task",
            Self::Sms => "sms_task",
        }
    }

    /// Log prefix for the task.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Supervisor => "MAIN",
            Self::Http => "HTTP",
            Self::Https => "HTTPS",
            Self::Sms => "SMS",
        }
    }
}

/// Why a task entered its terminal halted state.
///
/// A halted task never recovers; it only stays visible on the health
/// board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    /// The very first link-token wait at task start timed out.
    InitialAcquireTimeout,
    /// The response buffer could not be allocated.
    BufferAllocation,
    /// TLS session setup failed.
    TlsSetup(TlsSetupError),
    /// The link could not be brought up at boot.
    LinkInit,
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitialAcquireTimeout => write!(f, "cannot get link token at start"),
            Self::BufferAllocation => write!(f, "cannot allocate receive buffer"),
            Self::TlsSetup(e) => write!(f, "{e}"),
            Self::LinkInit => write!(f, "GSM not initialized"),
        }
    }
}

impl From<TlsSetupError> for HaltReason {
    fn from(e: TlsSetupError) -> Self {
        Self::TlsSetup(e)
    }
}

/// Structured events emitted by the engine runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A non-initial token wait timed out; the task backs off.
    TokenBusy { task: TaskId, retry_ms: u32 },
    /// The link could not be brought up; the iteration was skipped.
    LinkDown(TaskId),
    /// A transient failure released the token early.
    SoftRetry { task: TaskId, retry_ms: u32 },
    /// One request/response exchange finished (successfully or aborted).
    ExchangeComplete {
        task: TaskId,
        received: usize,
        stored: usize,
    },
    /// One inbox poll finished.
    InboxPolled { messages: usize, replies: usize },
    /// The task released the token and sleeps until the next run.
    Waiting { task: TaskId, secs: u32 },
    /// The task entered its terminal state.
    Halted { task: TaskId, reason: HaltReason },
}
