//! Port traits: the hexagonal boundary between the client engines and
//! the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Engine (domain)
//! ```
//!
//! Every external capability the engines consume (modem link, sockets,
//! TLS library, modem messaging, clock, time service) sits behind one of
//! these traits.  Engines are generic over them, so the whole core runs
//! against recording mocks on the host.
//!
//! Delays go through [`embedded_hal::delay::DelayNs`]; they are the only
//! deliberate suspension points besides the link-token wait.

use core::time::Duration;
use std::net::SocketAddr;

use crate::error::{NetError, SmsError, SntpError, TlsError, TlsSetupError};

// ───────────────────────────────────────────────────────────────
// Link port (driven adapter: modem PPPoS link)
// ───────────────────────────────────────────────────────────────

/// Connection state reported by the link driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Disconnected,
    Connecting,
    Connected,
}

/// The single physical modem link.
///
/// Engines never call this directly; every call is routed through a
/// [`LinkGuard`](super::arbiter::LinkGuard) so mode changes only happen
/// while the link token is held.
pub trait LinkPort {
    /// Bring the data (PPP) session up, blocking until it is up or failed.
    fn bring_up(&mut self) -> bool;

    /// Current data-session status.
    fn status(&self) -> LinkStatus;

    /// Drop the data session.  `close_session` also ends the driver's
    /// session task; `radio_off` powers the RF section down afterwards.
    fn disconnect(&mut self, close_session: bool, radio_off: bool);

    fn radio_on(&mut self);

    fn radio_off(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Transport port (driven adapter: DNS + TCP sockets)
// ───────────────────────────────────────────────────────────────

/// Stream socket connected to a server.
pub trait NetStream {
    fn write(&mut self, data: &[u8]) -> Result<usize, NetError>;

    /// Returns `Ok(0)` when the peer closed the connection.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, NetError>;

    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), NetError>;

    fn close(self);
}

/// Name resolution and stream socket creation.
pub trait NetPort {
    type Stream: NetStream;

    /// Resolve `host` to one or more IPv4 socket addresses.
    fn resolve(&mut self, host: &str, port: u16) -> Result<Vec<SocketAddr>, NetError>;

    /// Allocate a socket and connect it.
    fn connect(&mut self, addr: &SocketAddr) -> Result<Self::Stream, NetError>;
}

// ───────────────────────────────────────────────────────────────
// TLS port (driven adapter: TLS library client session)
// ───────────────────────────────────────────────────────────────

/// A long-lived TLS client session.
///
/// `setup` runs once; after that the session is reused for every
/// exchange and cleared with [`session_reset`](Self::session_reset), which
/// keeps configuration, RNG and trust anchors but drops negotiated state
/// and the network connection.
pub trait TlsClient {
    /// Seed the RNG, parse the trust anchor, set the SNI/CN hostname and
    /// build the client configuration (peer verification is optional).
    fn setup(&mut self, trust_anchor: &[u8], hostname: &str) -> Result<(), TlsSetupError>;

    /// Open the TCP connection to the server.
    fn connect(&mut self, host: &str, port: u16) -> Result<(), TlsError>;

    /// One handshake step.  `WantRead`/`WantWrite` mean "call again".
    fn handshake(&mut self) -> Result<(), TlsError>;

    /// Peer certificate verification flags (`0` means verified).
    fn verify_result(&self) -> u32;

    /// Human-readable diagnostic for non-zero verification flags.
    fn verify_info(&self, flags: u32) -> String;

    fn write(&mut self, data: &[u8]) -> Result<usize, TlsError>;

    /// Returns `Ok(0)` when the connection closed without close_notify.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TlsError>;

    fn close_notify(&mut self);

    /// Clear negotiated state and free the network connection.
    fn session_reset(&mut self);

    /// Library text for an error code.
    fn error_text(&self, code: i32) -> String;
}

// ───────────────────────────────────────────────────────────────
// Messaging port (driven adapter: modem AT command library)
// ───────────────────────────────────────────────────────────────

/// One stored text message.
///
/// `B` is the body storage chosen by the adapter; the inbox owns it and
/// releases it when the message is dropped.
#[derive(Debug)]
pub struct SmsMessage<B> {
    /// Storage slot on the SIM, used for deletion.
    pub index: u32,
    pub sender: heapless::String<32>,
    /// Modem status text ("REC UNREAD", "REC READ", ...).
    pub status: heapless::String<16>,
    /// Timestamp as reported by the modem.
    pub display_time: heapless::String<32>,
    /// Timezone offset in hours from GMT.
    pub tz_offset: i8,
    /// Timestamp as seconds since the Unix epoch.
    pub raw_time: i64,
    pub body: B,
}

impl<B: AsRef<str>> SmsMessage<B> {
    pub fn text(&self) -> &str {
        self.body.as_ref()
    }
}

/// Messages drained from the modem in one poll.  Dropping the inbox
/// releases every message body exactly once.
#[derive(Debug)]
pub struct SmsInbox<B> {
    messages: Vec<SmsMessage<B>>,
}

impl<B> SmsInbox<B> {
    pub fn new(messages: Vec<SmsMessage<B>>) -> Self {
        Self { messages }
    }

    pub fn empty() -> Self {
        Self { messages: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl<B> IntoIterator for SmsInbox<B> {
    type Item = SmsMessage<B>;
    type IntoIter = std::vec::IntoIter<SmsMessage<B>>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.into_iter()
    }
}

pub trait SmsPort {
    type Body: AsRef<str>;

    fn send(&mut self, destination: &str, body: &str) -> Result<(), SmsError>;

    fn read_all(&mut self) -> Result<SmsInbox<Self::Body>, SmsError>;

    fn delete(&mut self, index: u32) -> Result<(), SmsError>;
}

// ───────────────────────────────────────────────────────────────
// Clock + time service ports
// ───────────────────────────────────────────────────────────────

pub trait ClockPort {
    /// Seconds since boot (monotonic).
    fn uptime_secs(&self) -> u64;

    /// Wall-clock seconds since the Unix epoch.
    fn unix_time(&self) -> i64;
}

/// Network time client.
pub trait SntpPort {
    fn start(&mut self) -> Result<(), SntpError>;

    fn stop(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Event sink
// ───────────────────────────────────────────────────────────────

/// The engines emit structured [`EngineEvent`](super::events::EngineEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::EngineEvent);
}
