//! Client configuration parameters
//!
//! All tunable parameters for the three client tasks and the link
//! arbiter.  Defaults reproduce the reference deployment; the firmware can
//! overlay a JSON document at build time (`GSM_PPPOS_CONFIG`).

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Short host names, URLs and phone numbers live in fixed-capacity strings.
pub type HostString = heapless::String<64>;
pub type UrlString = heapless::String<128>;
pub type PhoneString = heapless::String<24>;
pub type PhraseString = heapless::String<32>;
pub type MessageString = heapless::String<160>;

/// Copy `s` into a fixed-capacity string, truncating at a char boundary.
pub fn bounded<const N: usize>(s: &str) -> heapless::String<N> {
    let mut out = heapless::String::new();
    for ch in s.chars() {
        if out.push(ch).is_err() {
            break;
        }
    }
    out
}

/// Core client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    // --- Arbiter / task loop ---
    /// Pause between task runs (seconds)
    pub task_pause_secs: u32,
    /// Maximum wait for the link token (milliseconds)
    pub acquire_timeout_ms: u32,
    /// Back-off after a timed-out, non-initial token wait (milliseconds)
    pub busy_retry_ms: u32,
    /// Sleep period of a halted task (milliseconds)
    pub stall_poll_ms: u32,

    // --- Plain HTTP ---
    pub http_host: HostString,
    pub http_port: u16,
    pub http_url: UrlString,
    /// Response buffer capacity (bytes, one reserved for the terminator)
    pub http_buffer_size: usize,
    /// Socket read chunk (bytes)
    pub http_chunk_size: usize,
    /// Receive timeout installed after the first chunk (milliseconds)
    pub http_read_timeout_ms: u32,
    /// Retry delay after DNS or socket allocation failure (milliseconds)
    pub dns_retry_ms: u32,
    /// Retry delay after connect or send failure (milliseconds)
    pub connect_retry_ms: u32,

    // --- HTTPS ---
    pub https_host: HostString,
    pub https_port: u16,
    pub https_url: UrlString,
    pub https_buffer_size: usize,
    pub tls_chunk_size: usize,
    /// Handshake would-block retries before the exchange is aborted
    pub handshake_max_retries: u32,
    /// Start of the JSON object inside the response body
    pub json_marker: PhraseString,

    // --- SMS ---
    /// Send the periodic test message
    pub sms_send_enabled: bool,
    /// Destination of test messages and command replies
    pub sms_number: PhoneString,
    /// Minimum time between test messages (seconds)
    pub sms_interval_secs: u32,
    /// Settle delay after switching the modem to command mode (milliseconds)
    pub sms_settle_ms: u32,
    /// Phrase that must open a message body for it to count as a command
    pub sms_command: PhraseString,
    pub sms_test_message: MessageString,

    // --- Time ---
    /// Wall-clock polls while waiting for SNTP
    pub sntp_retry_count: u32,
    pub sntp_retry_ms: u32,
    /// Offset applied when formatting local time (seconds east of UTC)
    pub utc_offset_secs: i32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            // Arbiter
            task_pause_secs: 300,
            acquire_timeout_ms: 140_000,
            busy_retry_ms: 30_000,
            stall_poll_ms: 10_000,

            // Plain HTTP
            http_host: bounded("loboris.eu"),
            http_port: 80,
            http_url: bounded("http://loboris.eu/ESP32/info.txt"),
            http_buffer_size: 2048,
            http_chunk_size: 128,
            http_read_timeout_ms: 500,
            dns_retry_ms: 1000,
            connect_retry_ms: 4000,

            // HTTPS
            https_host: bounded("www.howsmyssl.com"),
            https_port: 443,
            https_url: bounded("https://www.howsmyssl.com/a/check"),
            https_buffer_size: 8192,
            tls_chunk_size: 512,
            handshake_max_retries: 100,
            json_marker: bounded("{\"given_cipher_suites\":"),

            // SMS
            sms_send_enabled: false,
            sms_number: bounded("+1234567890"),
            sms_interval_secs: 600,
            sms_settle_ms: 2000,
            sms_command: bounded("Esp32 info"),
            sms_test_message: bounded("Hi from ESP32 via GSM\rThis is the test message."),

            // Time
            sntp_retry_count: 10,
            sntp_retry_ms: 2000,
            utc_offset_secs: 0,
        }
    }
}

impl ClientConfig {
    /// Merge a JSON document over the defaults.  Missing fields keep their
    /// default value.
    pub fn from_json_overlay(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|_| Error::Config("malformed JSON overlay"))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would break the task loops.
    pub fn validate(&self) -> Result<()> {
        if self.task_pause_secs == 0 {
            return Err(Error::Config("task_pause_secs must be non-zero"));
        }
        if self.acquire_timeout_ms == 0 {
            return Err(Error::Config("acquire_timeout_ms must be non-zero"));
        }
        if self.http_chunk_size == 0 || self.http_buffer_size <= self.http_chunk_size {
            return Err(Error::Config("http buffer must be larger than one read chunk"));
        }
        if self.tls_chunk_size == 0 || self.https_buffer_size <= self.tls_chunk_size {
            return Err(Error::Config("https buffer must be larger than one read chunk"));
        }
        if self.http_host.is_empty() || self.https_host.is_empty() {
            return Err(Error::Config("server host must not be empty"));
        }
        if self.sms_command.is_empty() {
            return Err(Error::Config("sms_command must not be empty"));
        }
        if self.sms_send_enabled && self.sms_number.is_empty() {
            return Err(Error::Config("sms_number required when sending is enabled"));
        }
        if self.sntp_retry_count == 0 {
            return Err(Error::Config("sntp_retry_count must be non-zero"));
        }
        Ok(())
    }

    /// Request line and headers for the plain HTTP fetch.
    pub fn http_request(&self) -> String {
        build_request(&self.http_url, &self.http_host)
    }

    /// Request line and headers for the HTTPS fetch.
    pub fn https_request(&self) -> String {
        build_request(&self.https_url, &self.https_host)
    }
}

fn build_request(url: &str, host: &str) -> String {
    format!("GET {url} HTTP/1.1\nHost: {host}\nUser-Agent: esp-idf/1.0 esp32\n\n")
}
