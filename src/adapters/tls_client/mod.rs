//! TLS client adapter.
//!
//! Implements [`TlsClient`] for the HTTPS engine.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: ESP-IDF mbedTLS client session over an
//!   lwIP TCP socket, peer verification optional.
//! - **all other targets**: plaintext simulation over `std::net::TcpStream`
//!   for host-side testing.  The trust anchor is only checked for PEM
//!   framing and every peer reports as unverified.
//!
//! ## Session model
//!
//! 1. `setup()` once: RNG, trust anchor, hostname, client config.
//! 2. per exchange: `connect()` → `handshake()` → `write()` / `read()`
//!    → `close_notify()` → `session_reset()`.
//! 3. `session_reset()` keeps configuration and trust anchor but drops the
//!    negotiated state and closes the socket.

use log::info;
#[cfg(not(target_os = "espidf"))]
use log::warn;

use crate::app::ports::TlsClient;
use crate::error::{TlsError, TlsSetupError};

#[cfg(not(target_os = "espidf"))]
use std::io::{Read, Write};

// ───────────────────────────────────────────────────────────────
// ESP-IDF platform helpers (real lwIP + mbedTLS)
// ───────────────────────────────────────────────────────────────
#[cfg(target_os = "espidf")]
mod esp_impl;

// ───────────────────────────────────────────────────────────────
// Simulation constants
// ───────────────────────────────────────────────────────────────

/// PEM framing every trust anchor must carry.
#[cfg(not(target_os = "espidf"))]
const PEM_CERT_HEADER: &str = "-----BEGIN CERTIFICATE-----";

/// `MBEDTLS_ERR_X509_INVALID_FORMAT`
#[cfg(not(target_os = "espidf"))]
const X509_INVALID_FORMAT: i32 = -0x2180;
/// `MBEDTLS_ERR_NET_CONNECT_FAILED`
#[cfg(not(target_os = "espidf"))]
const NET_CONNECT_FAILED: i32 = -0x0052;
/// `MBEDTLS_ERR_NET_RECV_FAILED`
#[cfg(not(target_os = "espidf"))]
const NET_RECV_FAILED: i32 = -0x004C;
/// `MBEDTLS_ERR_NET_SEND_FAILED`
#[cfg(not(target_os = "espidf"))]
const NET_SEND_FAILED: i32 = -0x004E;
/// `MBEDTLS_X509_BADCERT_NOT_TRUSTED`
#[cfg(not(target_os = "espidf"))]
const BADCERT_NOT_TRUSTED: u32 = 0x08;

// ───────────────────────────────────────────────────────────────
// TlsClientAdapter
// ───────────────────────────────────────────────────────────────

pub struct TlsClientAdapter {
    // ── ESP-IDF fields ──────────────────────────────────────────
    #[cfg(target_os = "espidf")]
    session: Option<esp_impl::EspTlsSession>,

    // ── Simulation fields ───────────────────────────────────────
    #[cfg(not(target_os = "espidf"))]
    configured: bool,
    #[cfg(not(target_os = "espidf"))]
    stream: Option<std::net::TcpStream>,
}

impl Default for TlsClientAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl TlsClientAdapter {
    #[cfg(target_os = "espidf")]
    pub fn new() -> Self {
        Self { session: None }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Self {
        Self { configured: false, stream: None }
    }

    /// Whether a TCP connection is currently attached.
    #[cfg(target_os = "espidf")]
    pub fn is_connected(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.fd >= 0)
    }

    /// Whether a TCP connection is currently attached.
    #[cfg(not(target_os = "espidf"))]
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

// ───────────────────────────────────────────────────────────────
// TlsClient implementation (ESP-IDF)
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
impl TlsClient for TlsClientAdapter {
    fn setup(&mut self, trust_anchor: &[u8], hostname: &str) -> Result<(), TlsSetupError> {
        self.session = Some(esp_impl::esp_setup(trust_anchor, hostname)?);
        Ok(())
    }

    fn connect(&mut self, host: &str, port: u16) -> Result<(), TlsError> {
        let s = self.session.as_mut().ok_or(TlsError::Connect(-1))?;
        esp_impl::esp_connect(s, host, port)?;
        info!("TLS(espidf): connected to {}:{}", host, port);
        Ok(())
    }

    fn handshake(&mut self) -> Result<(), TlsError> {
        let s = self.session.as_mut().ok_or(TlsError::Failed(-1))?;
        esp_impl::esp_handshake(s)
    }

    fn verify_result(&self) -> u32 {
        self.session.as_ref().map_or(u32::MAX, esp_impl::esp_verify_result)
    }

    fn verify_info(&self, flags: u32) -> String {
        esp_impl::esp_verify_info(flags)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TlsError> {
        let s = self.session.as_mut().ok_or(TlsError::Failed(-1))?;
        esp_impl::esp_write(s, data)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TlsError> {
        let s = self.session.as_mut().ok_or(TlsError::Failed(-1))?;
        esp_impl::esp_read(s, buf)
    }

    fn close_notify(&mut self) {
        if let Some(s) = self.session.as_mut() {
            esp_impl::esp_close_notify(s);
        }
    }

    fn session_reset(&mut self) {
        if let Some(s) = self.session.as_mut() {
            esp_impl::esp_session_reset(s);
        }
    }

    fn error_text(&self, code: i32) -> String {
        esp_impl::esp_strerror(code)
    }
}

// ───────────────────────────────────────────────────────────────
// TlsClient implementation (simulation)
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
impl TlsClient for TlsClientAdapter {
    fn setup(&mut self, trust_anchor: &[u8], hostname: &str) -> Result<(), TlsSetupError> {
        let pem = String::from_utf8_lossy(trust_anchor);
        if !pem.contains(PEM_CERT_HEADER) {
            return Err(TlsSetupError::TrustAnchor(X509_INVALID_FORMAT));
        }
        info!("TLS(sim): session configured for {} (plaintext)", hostname);
        self.configured = true;
        Ok(())
    }

    fn connect(&mut self, host: &str, port: u16) -> Result<(), TlsError> {
        let stream = std::net::TcpStream::connect((host, port)).map_err(|e| {
            warn!("TLS(sim): connect to {}:{} failed: {}", host, port, e);
            TlsError::Connect(NET_CONNECT_FAILED)
        })?;
        info!("TLS(sim): connected to {}:{}", host, port);
        self.stream = Some(stream);
        Ok(())
    }

    fn handshake(&mut self) -> Result<(), TlsError> {
        if self.configured && self.stream.is_some() {
            Ok(())
        } else {
            Err(TlsError::Failed(NET_CONNECT_FAILED))
        }
    }

    fn verify_result(&self) -> u32 {
        BADCERT_NOT_TRUSTED
    }

    fn verify_info(&self, _flags: u32) -> String {
        "  ! simulation: peer certificate was not checked".into()
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TlsError> {
        let stream = self.stream.as_mut().ok_or(TlsError::Failed(NET_SEND_FAILED))?;
        stream.write(data).map_err(|_| TlsError::Failed(NET_SEND_FAILED))
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TlsError> {
        let stream = self.stream.as_mut().ok_or(TlsError::Failed(NET_RECV_FAILED))?;
        match stream.read(buf) {
            Ok(n) => Ok(n),
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => Err(TlsError::WantRead),
            Err(_) => Err(TlsError::Failed(NET_RECV_FAILED)),
        }
    }

    fn close_notify(&mut self) {
        if let Some(stream) = self.stream.as_ref() {
            let _ = stream.shutdown(std::net::Shutdown::Write);
        }
    }

    fn session_reset(&mut self) {
        self.stream = None;
    }

    fn error_text(&self, code: i32) -> String {
        format!("simulated TLS error -0x{:04x}", code.unsigned_abs())
    }
}

// ───────────────────────────────────────────────────────────────
// Tests (host / simulation path only)
// ───────────────────────────────────────────────────────────────
