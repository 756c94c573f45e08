//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured engine events to the
//! ESP-IDF logger (UART / USB-CDC in production).

use log::{error, info, warn};

use crate::app::events::EngineEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`EngineEvent`] to the serial console.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &EngineEvent) {
        match event {
            EngineEvent::TokenBusy { task, retry_ms } => {
                warn!("LINK | {} busy, retry in {} ms", task.name(), retry_ms);
            }
            EngineEvent::LinkDown(task) => {
                warn!("LINK | {} found the link down", task.name());
            }
            EngineEvent::SoftRetry { task, retry_ms } => {
                warn!("RETRY | {} in {} ms", task.name(), retry_ms);
            }
            EngineEvent::ExchangeComplete { task, received, stored } => {
                info!("XCHG | {} | received={} stored={}", task.name(), received, stored);
            }
            EngineEvent::InboxPolled { messages, replies } => {
                info!("SMS | messages={} replies={}", messages, replies);
            }
            EngineEvent::Waiting { task, secs } => {
                info!("WAIT | {} | {} s", task.name(), secs);
            }
            EngineEvent::Halted { task, reason } => {
                error!("HALT | {} | {}", task.name(), reason);
            }
        }
    }
}
