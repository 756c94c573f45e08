//! Task health board.
//!
//! A halted task used to be indistinguishable from one sleeping between
//! runs.  Each task now publishes its lifecycle here; the supervisor loop
//! drains the change reports and anyone can query the current state.
//!
//! ```text
//! ┌──────────────┐  set(task, health)  ┌──────────────┐  try_next_report()
//! │ Engine tasks │────────────────────▶│ HealthBoard  │──────────────────▶ supervisor
//! └──────────────┘                     └──────────────┘
//! ```
//!
//! Uses `embassy-sync` primitives so the board is shareable between
//! FreeRTOS tasks without a heap-allocated lock.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::warn;

use super::events::{HaltReason, TaskId};

/// Lifecycle of one task as seen from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskHealth {
    NotStarted,
    Running,
    /// Terminal: the task never leaves this state.
    Halted(HaltReason),
}

/// A change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthReport {
    pub task: TaskId,
    pub health: TaskHealth,
}

/// Pending change reports kept for the supervisor.
const REPORT_DEPTH: usize = 8;

pub struct HealthBoard {
    slots: Mutex<CriticalSectionRawMutex, RefCell<[TaskHealth; TaskId::COUNT]>>,
    reports: Channel<CriticalSectionRawMutex, HealthReport, REPORT_DEPTH>,
}

impl Default for HealthBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthBoard {
    pub const fn new() -> Self {
        Self {
            slots: Mutex::new(RefCell::new([TaskHealth::NotStarted; TaskId::COUNT])),
            reports: Channel::new(),
        }
    }

    /// Record a task's state.  A halted task cannot be moved out of
    /// `Halted`; such updates are ignored.
    pub fn set(&self, task: TaskId, health: TaskHealth) {
        let changed = self.slots.lock(|slots| {
            let mut slots = slots.borrow_mut();
            let slot = &mut slots[task as usize];
            if matches!(*slot, TaskHealth::Halted(_)) || *slot == health {
                return false;
            }
            *slot = health;
            true
        });
        if changed && self.reports.try_send(HealthReport { task, health }).is_err() {
            warn!("Health: report queue full, dropping {:?} update", task);
        }
    }

    pub fn get(&self, task: TaskId) -> TaskHealth {
        self.slots.lock(|slots| slots.borrow()[task as usize])
    }

    pub fn is_halted(&self, task: TaskId) -> bool {
        matches!(self.get(task), TaskHealth::Halted(_))
    }

    /// All halted tasks and their reasons.
    pub fn halted(&self) -> Vec<(TaskId, HaltReason)> {
        TaskId::ALL
            .iter()
            .filter_map(|&t| match self.get(t) {
                TaskHealth::Halted(reason) => Some((t, reason)),
                _ => None,
            })
            .collect()
    }

    /// Next unread change report, if any.
    pub fn try_next_report(&self) -> Option<HealthReport> {
        self.reports.try_receive().ok()
    }
}
