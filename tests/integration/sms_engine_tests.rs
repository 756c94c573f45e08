//! SMS engine: command mode, inbox handling, replies, test messages.

use std::time::Duration;

use gsm_pppos::app::arbiter::{LinkArbiter, LinkMode};
use gsm_pppos::app::events::{EngineEvent, TaskId};
use gsm_pppos::app::runner::{Engine, Outcome};
use gsm_pppos::app::sms_engine::SmsEngine;
use gsm_pppos::config::ClientConfig;

use crate::mocks::{LinkCall, MockClock, MockLink, MockSms, RecordingDelay, RecordingSink};

/// 2018-01-01 10:00:00 UTC
const NOW: i64 = 1_514_800_800;

type Engine3 = SmsEngine<MockSms, MockClock, RecordingDelay>;

fn engine(sms: MockSms, config: &ClientConfig) -> (Engine3, MockClock, RecordingDelay) {
    let clock = MockClock::at_unix(NOW);
    let delay = RecordingDelay::default();
    (SmsEngine::new(sms, clock.clone(), delay.clone(), config), clock, delay)
}

fn run(engine: &mut Engine3, link: &MockLink) -> (Outcome, RecordingSink) {
    let arbiter = LinkArbiter::new(link.clone());
    let mut guard = arbiter.acquire(TaskId::Sms, Duration::from_millis(50)).unwrap();
    let mut sink = RecordingSink::default();
    let outcome = engine.run_once(&mut guard, &mut sink);
    assert_eq!(guard.mode(), LinkMode::Offline);
    (outcome, sink)
}

#[test]
fn modem_is_switched_to_command_mode_and_back_off() {
    let config = ClientConfig::default();
    let link = MockLink::connected();
    let (mut sms, _, delay) = engine(MockSms::default(), &config);

    let (outcome, _) = run(&mut sms, &link);

    assert_eq!(outcome, Outcome::Finished);
    assert_eq!(
        link.calls(),
        vec![
            LinkCall::Disconnect { close_session: false, radio_off: false },
            LinkCall::RadioOn,
            LinkCall::RadioOff,
        ]
    );
    assert_eq!(delay.delays(), vec![config.sms_settle_ms]);
}

#[test]
fn link_state_does_not_gate_the_sms_task() {
    let link = MockLink::new(false);
    let (mut sms, _, _) = engine(MockSms::default(), &ClientConfig::default());

    let (outcome, _) = run(&mut sms, &link);

    assert_eq!(outcome, Outcome::Finished);
    assert!(!link.calls().contains(&LinkCall::BringUp));
}

#[test]
fn only_the_last_message_is_deleted_after_every_body_is_released() {
    let store = MockSms::with_messages(&[
        (1, "+100", "hello"),
        (2, "+200", "Esp32 info please"),
        (5, "+300", "bye"),
    ]);
    let (mut sms, _, _) = engine(store, &ClientConfig::default());

    let (_, sink) = run(&mut sms, &MockLink::connected());

    let store = sms.sms();
    assert_eq!(store.deleted, vec![(5, 3)]);
    assert_eq!(store.released(), 3);
    assert_eq!(
        store.stored.iter().map(|(i, _, _)| *i).collect::<Vec<_>>(),
        vec![1, 2]
    );
    assert_eq!(sink.events, vec![EngineEvent::InboxPolled { messages: 3, replies: 1 }]);
}

#[test]
fn command_gets_a_reply_with_the_current_time_to_the_configured_number() {
    let config = ClientConfig::default();
    let store = MockSms::with_messages(&[(3, "+38640111222", "Esp32 info")]);
    let (mut sms, _, _) = engine(store, &config);

    run(&mut sms, &MockLink::connected());

    assert_eq!(
        sms.sms().sent,
        vec![(
            config.sms_number.to_string(),
            "Hi, +38640111222\rMy time is now\r01/01/18 10:00:00".to_string()
        )]
    );
}

#[test]
fn command_must_open_the_message() {
    let store = MockSms::with_messages(&[(1, "+100", "say Esp32 info"), (2, "+100", "esp32 info")]);
    let (mut sms, _, _) = engine(store, &ClientConfig::default());

    let (_, sink) = run(&mut sms, &MockLink::connected());

    assert!(sms.sms().sent.is_empty());
    assert_eq!(sink.events, vec![EngineEvent::InboxPolled { messages: 2, replies: 0 }]);
}

#[test]
fn failed_reply_does_not_stop_deletion() {
    let mut store = MockSms::with_messages(&[(7, "+100", "Esp32 info")]);
    store.send_fails = true;
    let (mut sms, _, _) = engine(store, &ClientConfig::default());

    let (_, sink) = run(&mut sms, &MockLink::connected());

    assert_eq!(sms.sms().deleted, vec![(7, 1)]);
    assert_eq!(sink.events, vec![EngineEvent::InboxPolled { messages: 1, replies: 0 }]);
}

#[test]
fn empty_inbox_deletes_nothing() {
    let (mut sms, _, _) = engine(MockSms::default(), &ClientConfig::default());

    let (_, sink) = run(&mut sms, &MockLink::connected());

    assert!(sms.sms().deleted.is_empty());
    assert_eq!(sink.events, vec![EngineEvent::InboxPolled { messages: 0, replies: 0 }]);
}

#[test]
fn unreadable_inbox_counts_as_empty() {
    let mut store = MockSms::with_messages(&[(1, "+100", "Esp32 info")]);
    store.read_fails = true;
    let (mut sms, _, _) = engine(store, &ClientConfig::default());

    let (outcome, sink) = run(&mut sms, &MockLink::connected());

    assert_eq!(outcome, Outcome::Finished);
    assert!(sms.sms().deleted.is_empty());
    assert_eq!(sink.events, vec![EngineEvent::InboxPolled { messages: 0, replies: 0 }]);
}

#[test]
fn test_message_respects_the_interval() {
    let config = ClientConfig { sms_send_enabled: true, sms_interval_secs: 600, ..ClientConfig::default() };
    let (mut sms, clock, _) = engine(MockSms::default(), &config);
    let link = MockLink::connected();

    run(&mut sms, &link);
    assert_eq!(sms.sms().sent.len(), 1);
    assert_eq!(sms.sms().sent[0], (config.sms_number.to_string(), config.sms_test_message.to_string()));

    clock.advance(300);
    run(&mut sms, &link);
    assert_eq!(sms.sms().sent.len(), 1);

    clock.advance(300);
    run(&mut sms, &link);
    assert_eq!(sms.sms().sent.len(), 2);
}

#[test]
fn test_message_disabled_by_default() {
    let (mut sms, _, _) = engine(MockSms::default(), &ClientConfig::default());
    run(&mut sms, &MockLink::connected());
    assert!(sms.sms().sent.is_empty());
}
