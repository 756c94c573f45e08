//! Link arbiter: exclusive ownership of the single modem link.
//!
//! ```text
//!  http ──┐                       ┌────────────┐
//!  https ─┼─ acquire(timeout) ───▶│ LinkArbiter│── LinkGuard ──▶ LinkPort
//!  sms ───┘                       └────────────┘   (mode changes)
//! ```
//!
//! The token is a binary lock with a bounded wait.  A successful acquire
//! hands out a [`LinkGuard`]; the guard is the only way to touch the link,
//! and dropping it releases the token, so release happens exactly once per
//! grant on every path.
//!
//! The link's mode (data session vs. command mode) is tracked next to the
//! port so an engine can see what the previous holder left behind.

use core::time::Duration;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use log::{debug, info, warn};

use super::events::TaskId;
use super::ports::{LinkPort, LinkStatus};

/// What the link was last switched to by a token holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkMode {
    /// Nothing has touched the link yet.
    Unknown,
    /// PPP data session is up.
    Data,
    /// Data session dropped, radio on, AT commands available.
    Command,
    /// Radio off or bring-up failed.
    Offline,
}

/// The bounded wait for the token expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquireTimeout {
    pub task: TaskId,
    /// Holder at the moment the wait gave up.
    pub holder: Option<TaskId>,
}

impl core::fmt::Display for AcquireTimeout {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.holder {
            Some(h) => write!(f, "{} timed out waiting for link (held by {})", self.task.name(), h.name()),
            None => write!(f, "{} timed out waiting for link", self.task.name()),
        }
    }
}

struct TokenState {
    holder: Option<TaskId>,
    grants: u64,
}

struct LinkCell<L> {
    port: L,
    mode: LinkMode,
}

pub struct LinkArbiter<L> {
    token: Mutex<TokenState>,
    released: Condvar,
    link: Mutex<LinkCell<L>>,
}

impl<L: LinkPort> LinkArbiter<L> {
    pub fn new(port: L) -> Self {
        Self {
            token: Mutex::new(TokenState { holder: None, grants: 0 }),
            released: Condvar::new(),
            link: Mutex::new(LinkCell { port, mode: LinkMode::Unknown }),
        }
    }

    /// Wait up to `timeout` for the token.
    pub fn acquire(&self, task: TaskId, timeout: Duration) -> Result<LinkGuard<'_, L>, AcquireTimeout> {
        let deadline = Instant::now() + timeout;
        let mut state = self.token.lock().unwrap_or_else(PoisonError::into_inner);

        while let Some(holder) = state.holder {
            let now = Instant::now();
            if now >= deadline {
                return Err(AcquireTimeout { task, holder: Some(holder) });
            }
            let (next, _) = self
                .released
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            state = next;
        }

        state.holder = Some(task);
        state.grants += 1;
        drop(state);
        debug!("Link: token granted to {}", task.name());

        let link = self.link.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(LinkGuard { arbiter: self, task, link })
    }

    /// Current token holder.
    pub fn holder(&self) -> Option<TaskId> {
        self.token.lock().unwrap_or_else(PoisonError::into_inner).holder
    }

    /// Total successful acquisitions since boot.
    pub fn grants(&self) -> u64 {
        self.token.lock().unwrap_or_else(PoisonError::into_inner).grants
    }

    fn release(&self, task: TaskId) {
        let mut state = self.token.lock().unwrap_or_else(PoisonError::into_inner);
        if state.holder == Some(task) {
            state.holder = None;
            drop(state);
            self.released.notify_one();
            debug!("Link: token released by {}", task.name());
        } else {
            warn!("Link: release by {} but holder is {:?}", task.name(), state.holder);
        }
    }
}

/// Proof of token ownership.  All link operations go through here.
pub struct LinkGuard<'a, L: LinkPort> {
    arbiter: &'a LinkArbiter<L>,
    task: TaskId,
    link: MutexGuard<'a, LinkCell<L>>,
}

impl<L: LinkPort> LinkGuard<'_, L> {
    pub fn task(&self) -> TaskId {
        self.task
    }

    /// Mode left behind by the last holder (or by this one).
    pub fn mode(&self) -> LinkMode {
        self.link.mode
    }

    pub fn status(&self) -> LinkStatus {
        self.link.port.status()
    }

    /// Make sure the data session is up, bringing it up if needed.
    /// Returns `false` when bring-up failed.
    pub fn ensure_data_mode(&mut self) -> bool {
        if self.link.port.status() == LinkStatus::Connected {
            self.link.mode = LinkMode::Data;
            return true;
        }
        if self.link.mode == LinkMode::Command {
            info!("Link: {} switching from command to data mode", self.task.name());
        }
        let up = self.link.port.bring_up();
        self.link.mode = if up { LinkMode::Data } else { LinkMode::Offline };
        up
    }

    /// Drop the data session and power the radio for AT commands.
    pub fn enter_command_mode(&mut self) {
        self.link.port.disconnect(false, false);
        self.link.port.radio_on();
        self.link.mode = LinkMode::Command;
    }

    /// Close the data session and turn the radio off to save power.
    pub fn end_data_session(&mut self) {
        self.link.port.disconnect(false, true);
        self.link.mode = LinkMode::Offline;
    }

    pub fn radio_off(&mut self) {
        self.link.port.radio_off();
        self.link.mode = LinkMode::Offline;
    }
}

impl<L: LinkPort> Drop for LinkGuard<'_, L> {
    fn drop(&mut self) {
        self.arbiter.release(self.task);
    }
}
