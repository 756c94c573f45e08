//! HTTPS fetch engine.
//!
//! ```text
//! setup (once):  seed RNG ─▶ load trust anchor ─▶ hostname ─▶ client config
//! per run:       link up? ─▶ connect ─▶ handshake ─▶ verify (optional)
//!                ─▶ write request ─▶ read loop ─▶ close_notify
//!                ─▶ session reset ─▶ print header, body, JSON ─▶ link down
//! ```
//!
//! Any connect, handshake or write error jumps to the session reset
//! without touching the read loop; the run still finishes normally.
//! Handshake and write would-block retries share `handshake_max_retries`.
//!
//! Certificate verification is *optional*: a peer that fails verification
//! is logged with a warning and the exchange proceeds anyway.  This
//! connects to servers whose chain cannot be checked and must not be used
//! where the peer's identity matters.

use log::{error, info, warn};

use super::arbiter::LinkGuard;
use super::buffer::ResponseBuffer;
use super::events::{EngineEvent, HaltReason, TaskId};
use super::ports::{EventSink, LinkPort, TlsClient};
use super::response::{extract_json_object, flatten, split_header_body};
use super::runner::{Engine, Outcome};
use crate::config::{ClientConfig, HostString, PhraseString};
use crate::error::TlsError;

pub struct HttpsEngine<T> {
    tls: T,
    trust_anchor: Vec<u8>,
    host: HostString,
    port: u16,
    request: String,
    json_marker: PhraseString,
    buffer_size: usize,
    chunk_size: usize,
    handshake_max_retries: u32,
    buffer: Option<ResponseBuffer>,
}

impl<T: TlsClient> HttpsEngine<T> {
    pub fn new(tls: T, trust_anchor: impl Into<Vec<u8>>, config: &ClientConfig) -> Self {
        Self {
            tls,
            trust_anchor: trust_anchor.into(),
            host: config.https_host.clone(),
            port: config.https_port,
            request: config.https_request(),
            json_marker: config.json_marker.clone(),
            buffer_size: config.https_buffer_size,
            chunk_size: config.tls_chunk_size,
            handshake_max_retries: config.handshake_max_retries,
            buffer: None,
        }
    }

    pub fn buffer(&self) -> Option<&ResponseBuffer> {
        self.buffer.as_ref()
    }

    pub fn tls(&self) -> &T {
        &self.tls
    }

    /// Connect through write.  Any error here aborts the exchange.
    fn open_and_send(&mut self) -> Result<(), TlsError> {
        info!("HTTPS: Connecting to {}:{}...", self.host, self.port);
        self.tls.connect(&self.host, self.port).inspect_err(|e| {
            error!("HTTPS: connect failed: {}", e);
        })?;
        info!("HTTPS: Connected. Performing the SSL/TLS handshake...");

        let mut retries = 0u32;
        loop {
            match self.tls.handshake() {
                Ok(()) => break,
                Err(e) if e.is_would_block() && retries < self.handshake_max_retries => retries += 1,
                Err(e) => {
                    error!("HTTPS: handshake returned {}", e);
                    return Err(e);
                }
            }
        }

        info!("HTTPS: Verifying peer X.509 certificate...");
        let flags = self.tls.verify_result();
        if flags == 0 {
            info!("HTTPS: Certificate verified.");
        } else {
            warn!("HTTPS: Failed to verify peer certificate!");
            warn!("HTTPS: verification info: {}", self.tls.verify_info(flags));
        }

        info!("HTTPS: Writing HTTP request...");
        let mut stalls = 0u32;
        let written = loop {
            match self.tls.write(self.request.as_bytes()) {
                Ok(n) if n > 0 => break n,
                Ok(_) if stalls < self.handshake_max_retries => stalls += 1,
                Err(e) if e.is_would_block() && stalls < self.handshake_max_retries => stalls += 1,
                Ok(_) => {
                    error!("HTTPS: write made no progress after {} retries", stalls);
                    return Err(TlsError::WantWrite);
                }
                Err(e) => {
                    error!("HTTPS: write returned {}", e);
                    return Err(e);
                }
            }
        };
        info!("HTTPS: {} bytes written", written);
        Ok(())
    }

    /// Read until the peer closes.  Returns the error that ended the loop,
    /// if any.
    fn read_response(tls: &mut T, buffer: &mut ResponseBuffer, chunk_size: usize) -> Option<TlsError> {
        info!("HTTPS: Reading HTTP response...");
        let mut chunk = vec![0u8; chunk_size.max(2)];
        let limit = chunk.len() - 1;
        loop {
            match tls.read(&mut chunk[..limit]) {
                Err(e) if e.is_would_block() => {}
                Err(TlsError::PeerCloseNotify) => return None,
                Err(e) => {
                    error!("HTTPS: read returned {}", e);
                    return Some(e);
                }
                Ok(0) => {
                    info!("HTTPS: connection closed");
                    return None;
                }
                Ok(n) => {
                    buffer.append(&chunk[..n]);
                }
            }
        }
    }

    fn print_response(&self, buffer: &ResponseBuffer) {
        let text = buffer.text();
        if let Some((header, body)) = split_header_body(&text) {
            info!("HTTPS: Header:\r\n-------\r\n{}\r\n-------", header);
            info!("HTTPS: Data:\r\n-----\r\n{}\r\n-----", body);
        }
        if let Some(obj) = extract_json_object(&text, &self.json_marker) {
            info!("HTTPS: JSON data received, parsing:");
            for line in flatten(&obj) {
                info!("{}", line);
            }
        }
    }
}

impl<T: TlsClient> Engine for HttpsEngine<T> {
    fn task(&self) -> TaskId {
        TaskId::Https
    }

    fn setup(&mut self) -> Result<(), HaltReason> {
        let buffer = ResponseBuffer::with_capacity(self.buffer_size).map_err(|e| {
            error!("HTTPS: *** ERROR: {} ***", e);
            HaltReason::BufferAllocation
        })?;
        self.buffer = Some(buffer);

        info!("HTTPS: Seeding the random number generator, loading the CA root certificate...");
        self.tls.setup(&self.trust_anchor, &self.host).map_err(|e| {
            error!("HTTPS: {}", e);
            HaltReason::from(e)
        })
    }

    fn run_once<L: LinkPort>(&mut self, link: &mut LinkGuard<'_, L>, sink: &mut impl EventSink) -> Outcome {
        if !link.ensure_data_mode() {
            error!("HTTPS: link is not up, skipping this run");
            return Outcome::LinkDown;
        }
        let Some(mut buffer) = self.buffer.take() else {
            error!("HTTPS: no receive buffer");
            return Outcome::Finished;
        };

        info!("HTTPS: ===== HTTPS GET REQUEST =====");
        buffer.clear();

        let last_error = match self.open_and_send() {
            Ok(()) => {
                let err = Self::read_response(&mut self.tls, &mut buffer, self.chunk_size);
                self.tls.close_notify();
                err
            }
            Err(e) => Some(e),
        };
        self.tls.session_reset();

        info!("HTTPS: {} bytes read, {} in buffer", buffer.received_total(), buffer.stored_len());
        if let Some(e) = last_error {
            error!("HTTPS: Last error was: {} - {}", e, self.tls.error_text(e.code()));
        }

        self.print_response(&buffer);
        sink.emit(&EngineEvent::ExchangeComplete {
            task: TaskId::Https,
            received: buffer.received_total(),
            stored: buffer.stored_len(),
        });
        self.buffer = Some(buffer);

        link.end_data_session();
        Outcome::Finished
    }
}
