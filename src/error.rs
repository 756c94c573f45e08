//! Unified error types for the GSM PPPoS client.
//!
//! A single `Error` enum that every subsystem converts into.  All variants
//! are `Copy` so they can be passed through the engine runner and health
//! board without allocation.  None of these ever leave the process: the
//! engines log them and pick a failure policy (soft-retry, iteration
//! abort, best-effort).

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the client funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Plain socket or DNS failure.
    Net(NetError),
    /// TLS record-layer or handshake failure.
    Tls(TlsError),
    /// One-time TLS setup failure.
    TlsSetup(TlsSetupError),
    /// Modem messaging command failed.
    Sms(SmsError),
    /// Network time service failure.
    Sntp(SntpError),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Net(e) => write!(f, "net: {e}"),
            Self::Tls(e) => write!(f, "tls: {e}"),
            Self::TlsSetup(e) => write!(f, "tls setup: {e}"),
            Self::Sms(e) => write!(f, "sms: {e}"),
            Self::Sntp(e) => write!(f, "sntp: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Socket / DNS errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetError {
    /// Name resolution failed or returned no IPv4 address.
    DnsLookup,
    /// The stack could not allocate a socket.
    SocketAlloc,
    /// TCP connect failed; carries the OS error code when known.
    Connect(i32),
    /// Sending the request failed.
    Write,
    /// Receiving failed (includes receive timeout expiry).
    Read,
    /// Receive timeout could not be installed.
    SocketOption,
}

impl fmt::Display for NetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DnsLookup => write!(f, "DNS lookup failed"),
            Self::SocketAlloc => write!(f, "failed to allocate socket"),
            Self::Connect(errno) => write!(f, "socket connect failed errno={errno}"),
            Self::Write => write!(f, "socket send failed"),
            Self::Read => write!(f, "socket receive failed"),
            Self::SocketOption => write!(f, "setting socket option failed"),
        }
    }
}

impl From<NetError> for Error {
    fn from(e: NetError) -> Self {
        Self::Net(e)
    }
}

// ---------------------------------------------------------------------------
// TLS errors
// ---------------------------------------------------------------------------

/// Outcome codes from a TLS operation that did not complete normally.
///
/// `WantRead` / `WantWrite` mean "call again", everything else ends the
/// current exchange.  `Failed` carries the negative library code so it can
/// be rendered with the library's own error text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsError {
    WantRead,
    WantWrite,
    /// Peer sent close_notify.
    PeerCloseNotify,
    /// TCP connect to the server failed.
    Connect(i32),
    /// Any other library error code.
    Failed(i32),
}

impl TlsError {
    /// Whether the operation should simply be retried at this layer.
    pub fn is_would_block(self) -> bool {
        matches!(self, Self::WantRead | Self::WantWrite)
    }

    /// Raw library code (negative), used for "Last error was" reporting.
    pub fn code(self) -> i32 {
        match self {
            Self::WantRead => -0x6900,
            Self::WantWrite => -0x6880,
            Self::PeerCloseNotify => -0x7880,
            Self::Connect(code) | Self::Failed(code) => code,
        }
    }
}

impl fmt::Display for TlsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WantRead => write!(f, "want read"),
            Self::WantWrite => write!(f, "want write"),
            Self::PeerCloseNotify => write!(f, "peer sent close_notify"),
            Self::Connect(code) => write!(f, "connect returned -0x{:x}", code.unsigned_abs()),
            Self::Failed(code) => write!(f, "error -0x{:x}", code.unsigned_abs()),
        }
    }
}

impl From<TlsError> for Error {
    fn from(e: TlsError) -> Self {
        Self::Tls(e)
    }
}

/// One-time TLS session setup failures.  All of them are fatal for the
/// HTTPS engine: there is no recovery from a broken entropy source or a
/// malformed trust anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsSetupError {
    RngSeed(i32),
    TrustAnchor(i32),
    Hostname(i32),
    Config(i32),
}

impl fmt::Display for TlsSetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RngSeed(rc) => write!(f, "seeding the random generator returned {rc}"),
            Self::TrustAnchor(rc) => {
                write!(f, "parsing the trust anchor returned -0x{:x}", rc.unsigned_abs())
            }
            Self::Hostname(rc) => write!(f, "setting the hostname returned -0x{:x}", rc.unsigned_abs()),
            Self::Config(rc) => write!(f, "TLS configuration returned -0x{:x}", rc.unsigned_abs()),
        }
    }
}

impl From<TlsSetupError> for Error {
    fn from(e: TlsSetupError) -> Self {
        Self::TlsSetup(e)
    }
}

// ---------------------------------------------------------------------------
// Messaging errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmsError {
    SendFailed,
    ReadFailed,
    DeleteFailed,
    /// Reply text did not fit in a single message.
    MessageTooLong,
}

impl fmt::Display for SmsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SendFailed => write!(f, "send failed"),
            Self::ReadFailed => write!(f, "reading inbox failed"),
            Self::DeleteFailed => write!(f, "delete failed"),
            Self::MessageTooLong => write!(f, "message too long"),
        }
    }
}

impl From<SmsError> for Error {
    fn from(e: SmsError) -> Self {
        Self::Sms(e)
    }
}

// ---------------------------------------------------------------------------
// Time service errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SntpError {
    StartFailed,
}

impl fmt::Display for SntpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StartFailed => write!(f, "SNTP client could not be started"),
        }
    }
}

impl From<SntpError> for Error {
    fn from(e: SntpError) -> Self {
        Self::Sntp(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
