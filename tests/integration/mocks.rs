//! Recording mock adapters for integration tests.
//!
//! Each mock logs every port call so tests can assert on the full
//! conversation with the modem, sockets and TLS library without real
//! hardware.  Mocks that end up owned by an arbiter or an engine share
//! their log through an `Arc<Mutex<..>>` handle the test keeps.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use gsm_pppos::app::events::EngineEvent;
use gsm_pppos::app::ports::{
    ClockPort, EventSink, LinkPort, LinkStatus, NetPort, NetStream, SmsInbox, SmsMessage, SmsPort,
    SntpPort, TlsClient,
};
use gsm_pppos::config::bounded;
use gsm_pppos::error::{NetError, SmsError, SntpError, TlsError, TlsSetupError};

fn locked<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

// ── Link ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkCall {
    BringUp,
    Disconnect { close_session: bool, radio_off: bool },
    RadioOn,
    RadioOff,
}

#[derive(Debug, Default)]
struct LinkState {
    connected: bool,
    bring_up_ok: bool,
    /// Statuses returned before falling back to `connected`.
    status_script: VecDeque<LinkStatus>,
    calls: Vec<LinkCall>,
}

#[derive(Debug, Clone, Default)]
pub struct MockLink {
    state: Arc<Mutex<LinkState>>,
}

impl MockLink {
    /// Link that is down and comes up on demand (or not).
    pub fn new(bring_up_ok: bool) -> Self {
        let link = Self::default();
        locked(&link.state).bring_up_ok = bring_up_ok;
        link
    }

    /// Link with the data session already up.
    pub fn connected() -> Self {
        let link = Self::new(true);
        locked(&link.state).connected = true;
        link
    }

    pub fn calls(&self) -> Vec<LinkCall> {
        locked(&self.state).calls.clone()
    }

    pub fn is_connected(&self) -> bool {
        locked(&self.state).connected
    }

    pub fn script_status(&self, statuses: impl IntoIterator<Item = LinkStatus>) {
        locked(&self.state).status_script.extend(statuses);
    }
}

impl LinkPort for MockLink {
    fn bring_up(&mut self) -> bool {
        let mut s = locked(&self.state);
        s.calls.push(LinkCall::BringUp);
        s.connected = s.bring_up_ok;
        s.bring_up_ok
    }

    fn status(&self) -> LinkStatus {
        let mut s = locked(&self.state);
        if let Some(next) = s.status_script.pop_front() {
            return next;
        }
        if s.connected { LinkStatus::Connected } else { LinkStatus::Disconnected }
    }

    fn disconnect(&mut self, close_session: bool, radio_off: bool) {
        let mut s = locked(&self.state);
        s.calls.push(LinkCall::Disconnect { close_session, radio_off });
        s.connected = false;
    }

    fn radio_on(&mut self) {
        locked(&self.state).calls.push(LinkCall::RadioOn);
    }

    fn radio_off(&mut self) {
        locked(&self.state).calls.push(LinkCall::RadioOff);
    }
}

// ── Sockets ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetCall {
    Resolve(String, u16),
    Connect(SocketAddr),
    Write(Vec<u8>),
    Read(usize),
    SetReadTimeout(Option<Duration>),
    Close,
}

pub struct MockNet {
    pub resolve: Result<Vec<SocketAddr>, NetError>,
    pub connect_error: Option<NetError>,
    pub write_error: Option<NetError>,
    /// Replayed by every stream this mock opens.  An exhausted script
    /// reads as a peer close.
    pub reads: Vec<Result<Vec<u8>, NetError>>,
    log: Arc<Mutex<Vec<NetCall>>>,
}

impl MockNet {
    pub fn serving(response: &[&[u8]]) -> Self {
        Self {
            resolve: Ok(vec!["10.0.0.7:80".parse().unwrap()]),
            connect_error: None,
            write_error: None,
            reads: response.iter().map(|c| Ok(c.to_vec())).collect(),
            log: Arc::default(),
        }
    }

    pub fn calls(&self) -> Vec<NetCall> {
        locked(&self.log).clone()
    }
}

impl NetPort for MockNet {
    type Stream = MockStream;

    fn resolve(&mut self, host: &str, port: u16) -> Result<Vec<SocketAddr>, NetError> {
        locked(&self.log).push(NetCall::Resolve(host.to_string(), port));
        self.resolve.clone()
    }

    fn connect(&mut self, addr: &SocketAddr) -> Result<MockStream, NetError> {
        locked(&self.log).push(NetCall::Connect(*addr));
        if let Some(e) = self.connect_error {
            return Err(e);
        }
        Ok(MockStream {
            reads: self.reads.iter().cloned().collect(),
            write_error: self.write_error,
            log: Arc::clone(&self.log),
        })
    }
}

pub struct MockStream {
    reads: VecDeque<Result<Vec<u8>, NetError>>,
    write_error: Option<NetError>,
    log: Arc<Mutex<Vec<NetCall>>>,
}

impl NetStream for MockStream {
    fn write(&mut self, data: &[u8]) -> Result<usize, NetError> {
        locked(&self.log).push(NetCall::Write(data.to_vec()));
        match self.write_error {
            Some(e) => Err(e),
            None => Ok(data.len()),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, NetError> {
        locked(&self.log).push(NetCall::Read(buf.len()));
        match self.reads.pop_front() {
            None => Ok(0),
            Some(Err(e)) => Err(e),
            Some(Ok(mut data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    self.reads.push_front(Ok(data.split_off(n)));
                }
                Ok(n)
            }
        }
    }

    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), NetError> {
        locked(&self.log).push(NetCall::SetReadTimeout(timeout));
        Ok(())
    }

    fn close(self) {
        locked(&self.log).push(NetCall::Close);
    }
}

// ── TLS ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlsCall {
    Setup(String),
    Connect(String, u16),
    Handshake,
    VerifyResult,
    Write(Vec<u8>),
    Read(usize),
    CloseNotify,
    SessionReset,
}

pub struct MockTls {
    pub setup_result: Result<(), TlsSetupError>,
    pub connect_result: Result<(), TlsError>,
    /// Handshake step results; an exhausted script completes the handshake.
    pub handshakes: VecDeque<Result<(), TlsError>>,
    pub verify_flags: u32,
    /// Read results; an exhausted script reads as a peer close_notify.
    pub reads: VecDeque<Result<Vec<u8>, TlsError>>,
    /// Write results; an exhausted script accepts the whole request.
    pub writes: VecDeque<Result<usize, TlsError>>,
    pub calls: Vec<TlsCall>,
}

impl MockTls {
    pub fn serving(response: &[&[u8]]) -> Self {
        Self {
            setup_result: Ok(()),
            connect_result: Ok(()),
            handshakes: VecDeque::new(),
            verify_flags: 0,
            reads: response.iter().map(|c| Ok(c.to_vec())).collect(),
            writes: VecDeque::new(),
            calls: Vec::new(),
        }
    }

    pub fn count(&self, call: &TlsCall) -> usize {
        self.calls.iter().filter(|c| *c == call).count()
    }
}

impl TlsClient for MockTls {
    fn setup(&mut self, _trust_anchor: &[u8], hostname: &str) -> Result<(), TlsSetupError> {
        self.calls.push(TlsCall::Setup(hostname.to_string()));
        self.setup_result
    }

    fn connect(&mut self, host: &str, port: u16) -> Result<(), TlsError> {
        self.calls.push(TlsCall::Connect(host.to_string(), port));
        self.connect_result
    }

    fn handshake(&mut self) -> Result<(), TlsError> {
        self.calls.push(TlsCall::Handshake);
        self.handshakes.pop_front().unwrap_or(Ok(()))
    }

    fn verify_result(&self) -> u32 {
        self.verify_flags
    }

    fn verify_info(&self, flags: u32) -> String {
        format!("  ! flags 0x{flags:x}")
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TlsError> {
        self.calls.push(TlsCall::Write(data.to_vec()));
        self.writes.pop_front().unwrap_or(Ok(data.len()))
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TlsError> {
        self.calls.push(TlsCall::Read(buf.len()));
        match self.reads.pop_front() {
            None => Err(TlsError::PeerCloseNotify),
            Some(Err(e)) => Err(e),
            Some(Ok(mut data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    self.reads.push_front(Ok(data.split_off(n)));
                }
                Ok(n)
            }
        }
    }

    fn close_notify(&mut self) {
        self.calls.push(TlsCall::CloseNotify);
    }

    fn session_reset(&mut self) {
        self.calls.push(TlsCall::SessionReset);
    }

    fn error_text(&self, code: i32) -> String {
        format!("mock error {code}")
    }
}

// ── SMS ───────────────────────────────────────────────────────

/// Message body that counts how often it is released.
#[derive(Debug)]
pub struct CountedBody {
    text: String,
    drops: Arc<AtomicUsize>,
}

impl AsRef<str> for CountedBody {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

impl Drop for CountedBody {
    fn drop(&mut self) {
        self.drops.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct MockSms {
    /// `(index, sender, body)`
    pub stored: Vec<(u32, String, String)>,
    pub sent: Vec<(String, String)>,
    /// `(index, bodies released when the delete was issued)`
    pub deleted: Vec<(u32, usize)>,
    pub read_fails: bool,
    pub send_fails: bool,
    pub drops: Arc<AtomicUsize>,
}

impl MockSms {
    pub fn with_messages(messages: &[(u32, &str, &str)]) -> Self {
        Self {
            stored: messages
                .iter()
                .map(|(i, from, body)| (*i, from.to_string(), body.to_string()))
                .collect(),
            ..Self::default()
        }
    }

    pub fn released(&self) -> usize {
        self.drops.load(Ordering::SeqCst)
    }
}

impl SmsPort for MockSms {
    type Body = CountedBody;

    fn send(&mut self, destination: &str, body: &str) -> Result<(), SmsError> {
        if self.send_fails {
            return Err(SmsError::SendFailed);
        }
        self.sent.push((destination.to_string(), body.to_string()));
        Ok(())
    }

    fn read_all(&mut self) -> Result<SmsInbox<CountedBody>, SmsError> {
        if self.read_fails {
            return Err(SmsError::ReadFailed);
        }
        let messages = self
            .stored
            .iter()
            .map(|(index, from, body)| SmsMessage {
                index: *index,
                sender: bounded(from),
                status: bounded("REC UNREAD"),
                display_time: bounded("18/01/01,10:00:00+04"),
                tz_offset: 1,
                raw_time: 1_514_800_800,
                body: CountedBody { text: body.clone(), drops: Arc::clone(&self.drops) },
            })
            .collect();
        Ok(SmsInbox::new(messages))
    }

    fn delete(&mut self, index: u32) -> Result<(), SmsError> {
        self.deleted.push((index, self.released()));
        let before = self.stored.len();
        self.stored.retain(|(i, _, _)| *i != index);
        if self.stored.len() < before { Ok(()) } else { Err(SmsError::DeleteFailed) }
    }
}

// ── Clock, time client, delay ─────────────────────────────────

/// Clock with settable uptime and a scripted wall clock.  Once the script
/// runs dry the last value repeats.
#[derive(Debug, Clone, Default)]
pub struct MockClock {
    uptime: Arc<Mutex<u64>>,
    unix: Arc<Mutex<VecDeque<i64>>>,
}

impl MockClock {
    pub fn at_unix(unix: i64) -> Self {
        Self::with_unix_sequence([unix])
    }

    pub fn with_unix_sequence(seq: impl IntoIterator<Item = i64>) -> Self {
        Self { uptime: Arc::default(), unix: Arc::new(Mutex::new(seq.into_iter().collect())) }
    }

    pub fn advance(&self, secs: u64) {
        *locked(&self.uptime) += secs;
    }
}

impl ClockPort for MockClock {
    fn uptime_secs(&self) -> u64 {
        *locked(&self.uptime)
    }

    fn unix_time(&self) -> i64 {
        let mut seq = locked(&self.unix);
        if seq.len() > 1 { seq.pop_front().unwrap_or(0) } else { seq.front().copied().unwrap_or(0) }
    }
}

#[derive(Debug, Default)]
pub struct MockSntp {
    pub starts: usize,
    pub stops: usize,
    pub fail_start: bool,
}

impl SntpPort for MockSntp {
    fn start(&mut self) -> Result<(), SntpError> {
        self.starts += 1;
        if self.fail_start { Err(SntpError::StartFailed) } else { Ok(()) }
    }

    fn stop(&mut self) {
        self.stops += 1;
    }
}

/// Records every requested delay in milliseconds instead of sleeping.
#[derive(Debug, Clone, Default)]
pub struct RecordingDelay {
    log: Arc<Mutex<Vec<u32>>>,
}

impl RecordingDelay {
    pub fn delays(&self) -> Vec<u32> {
        locked(&self.log).clone()
    }
}

impl DelayNs for RecordingDelay {
    fn delay_ns(&mut self, ns: u32) {
        locked(&self.log).push(ns / 1_000_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        locked(&self.log).push(ms);
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<EngineEvent>,
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &EngineEvent) {
        self.events.push(event.clone());
    }
}

// ── Log capture ───────────────────────────────────────────────

/// Process-wide logger that keeps every formatted record.  Tests run in
/// parallel, so assertions should look for lines unique to their own run.
pub struct CapturedLog {
    lines: Mutex<Vec<String>>,
}

static CAPTURED_LOG: CapturedLog = CapturedLog { lines: Mutex::new(Vec::new()) };

impl log::Log for CapturedLog {
    fn enabled(&self, metadata: &log::Metadata<'_>) -> bool {
        metadata.level() <= log::Level::Info
    }

    fn log(&self, record: &log::Record<'_>) {
        if self.enabled(record.metadata()) {
            self.lines.lock().unwrap().push(record.args().to_string());
        }
    }

    fn flush(&self) {}
}

impl CapturedLog {
    /// Install the capture logger (first call wins) and return it.
    pub fn install() -> &'static Self {
        static INSTALL: std::sync::Once = std::sync::Once::new();
        INSTALL.call_once(|| {
            log::set_logger(&CAPTURED_LOG).unwrap();
            log::set_max_level(log::LevelFilter::Info);
        });
        &CAPTURED_LOG
    }

    pub fn lines_containing(&self, needle: &str) -> Vec<String> {
        self.lines.lock().unwrap().iter().filter(|l| l.contains(needle)).cloned().collect()
    }
}
