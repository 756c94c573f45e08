//! SMS inbox poll and command responder.
//!
//! ```text
//! command mode ─▶ settle ─▶ [test send] ─▶ read all ─▶ for each:
//!     print ─▶ command? ─▶ reply ─▶ release body ─▶ (last) delete
//! ─▶ radio off
//! ```
//!
//! Bodies are owned by the inbox and released as each message goes out of
//! scope, so every body is freed exactly once whichever branch is taken.
//!
//! Only the last message of a batch is deleted.  Earlier messages stay on
//! the SIM and are read again on the next poll.

use core::fmt::Write as _;

use embedded_hal::delay::DelayNs;
use log::{info, warn};

use super::arbiter::LinkGuard;
use super::events::{EngineEvent, TaskId};
use super::ports::{ClockPort, EventSink, LinkPort, SmsInbox, SmsMessage, SmsPort};
use super::runner::{Engine, Outcome};
use super::timefmt::{asctime, reply_stamp};
use crate::config::{ClientConfig, MessageString, PhoneString, PhraseString};
use crate::error::SmsError;

pub struct SmsEngine<S, C, D> {
    sms: S,
    clock: C,
    delay: D,
    send_enabled: bool,
    number: PhoneString,
    interval_secs: u64,
    settle_ms: u32,
    command: PhraseString,
    test_message: MessageString,
    utc_offset_secs: i32,
    /// Uptime at which the next test message may go out.
    next_send_at: Option<u64>,
}

impl<S, C, D> SmsEngine<S, C, D>
where
    S: SmsPort,
    C: ClockPort,
    D: DelayNs,
{
    pub fn new(sms: S, clock: C, delay: D, config: &ClientConfig) -> Self {
        Self {
            sms,
            clock,
            delay,
            send_enabled: config.sms_send_enabled,
            number: config.sms_number.clone(),
            interval_secs: u64::from(config.sms_interval_secs),
            settle_ms: config.sms_settle_ms,
            command: config.sms_command.clone(),
            test_message: config.sms_test_message.clone(),
            utc_offset_secs: config.utc_offset_secs,
            next_send_at: None,
        }
    }

    pub fn sms(&self) -> &S {
        &self.sms
    }

    fn maybe_send_test(&mut self) {
        let now = self.clock.uptime_secs();
        if self.next_send_at.is_some_and(|next| now < next) {
            return;
        }
        match self.sms.send(&self.number, &self.test_message) {
            Ok(()) => info!("SMS: test message sent successfully"),
            Err(e) => warn!("SMS: test message {}", e),
        }
        self.next_send_at = Some(now + self.interval_secs);
    }

    fn print_message(&self, n: usize, msg: &SmsMessage<S::Body>) {
        info!("SMS: -------------------------------------------");
        info!(
            "SMS: Message #{}: idx={}, from: {}, status: {}, time: {}, tz=GMT+{}, timestamp: {}",
            n,
            msg.index,
            msg.sender,
            msg.status,
            msg.display_time,
            msg.tz_offset,
            asctime(msg.raw_time, self.utc_offset_secs)
        );
        info!("SMS: Text: [\r\n{}\r\n]", msg.text());
    }

    /// Answer a command message.  Returns whether the reply went out.
    fn reply(&mut self, msg: &SmsMessage<S::Body>) -> bool {
        let stamp = reply_stamp(self.clock.unix_time(), self.utc_offset_secs);
        let mut text = MessageString::new();
        let result = write!(text, "Hi, {}\rMy time is now\r{}", msg.sender, stamp)
            .map_err(|_| SmsError::MessageTooLong)
            .and_then(|()| self.sms.send(&self.number, &text));
        match result {
            Ok(()) => {
                info!("SMS: Response sent successfully");
                true
            }
            Err(e) => {
                warn!("SMS: Response {}", e);
                false
            }
        }
    }
}

impl<S, C, D> Engine for SmsEngine<S, C, D>
where
    S: SmsPort,
    C: ClockPort,
    D: DelayNs,
{
    fn task(&self) -> TaskId {
        TaskId::Sms
    }

    fn run_once<L: LinkPort>(&mut self, link: &mut LinkGuard<'_, L>, sink: &mut impl EventSink) -> Outcome {
        info!("SMS: ===== SMS TEST =====");
        link.enter_command_mode();
        self.delay.delay_ms(self.settle_ms);

        if self.send_enabled {
            self.maybe_send_test();
        }

        let inbox = self.sms.read_all().unwrap_or_else(|e| {
            warn!("SMS: {}", e);
            SmsInbox::empty()
        });
        let count = inbox.len();
        if count == 0 {
            info!("SMS: No messages");
        } else {
            info!("SMS: Received messages: {}", count);
        }

        let mut replies = 0;
        for (i, msg) in inbox.into_iter().enumerate() {
            self.print_message(i + 1, &msg);
            if msg.text().starts_with(self.command.as_str()) && self.reply(&msg) {
                replies += 1;
            }
            let index = msg.index;
            drop(msg);
            if i + 1 == count {
                info!("SMS: Delete message at index {}", index);
                match self.sms.delete(index) {
                    Ok(()) => info!("SMS: Delete OK"),
                    Err(e) => warn!("SMS: {}", e),
                }
            }
        }
        sink.emit(&EngineEvent::InboxPolled { messages: count, replies });

        link.radio_off();
        Outcome::Finished
    }
}
