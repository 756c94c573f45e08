//! Plain HTTP fetch engine.
//!
//! One iteration: resolve, connect, send the fixed request, read the
//! response into the bounded buffer, print header and body, close the
//! socket and drop the data session.
//!
//! DNS, socket, connect and send failures release the token and retry
//! after a short delay; they never reach the printing step.  The read loop
//! installs a receive timeout after the first chunk so a half-open peer
//! cannot block the task forever.

use core::time::Duration;

use log::{error, info, warn};

use super::arbiter::LinkGuard;
use super::buffer::ResponseBuffer;
use super::events::{EngineEvent, HaltReason, TaskId};
use super::ports::{EventSink, LinkPort, NetPort, NetStream};
use super::response::split_header_body;
use super::runner::{Engine, Outcome};
use crate::config::{ClientConfig, HostString};
use crate::error::NetError;

pub struct HttpEngine<N> {
    net: N,
    host: HostString,
    port: u16,
    request: String,
    buffer_size: usize,
    chunk_size: usize,
    read_timeout: Duration,
    dns_retry_ms: u32,
    connect_retry_ms: u32,
    buffer: Option<ResponseBuffer>,
}

impl<N: NetPort> HttpEngine<N> {
    pub fn new(net: N, config: &ClientConfig) -> Self {
        Self {
            net,
            host: config.http_host.clone(),
            port: config.http_port,
            request: config.http_request(),
            buffer_size: config.http_buffer_size,
            chunk_size: config.http_chunk_size,
            read_timeout: Duration::from_millis(u64::from(config.http_read_timeout_ms)),
            dns_retry_ms: config.dns_retry_ms,
            connect_retry_ms: config.connect_retry_ms,
            buffer: None,
        }
    }

    /// Buffer of the last exchange (after `setup`).
    pub fn buffer(&self) -> Option<&ResponseBuffer> {
        self.buffer.as_ref()
    }

    pub fn net(&self) -> &N {
        &self.net
    }
}

impl<N: NetPort> Engine for HttpEngine<N> {
    fn task(&self) -> TaskId {
        TaskId::Http
    }

    fn setup(&mut self) -> Result<(), HaltReason> {
        let buffer = ResponseBuffer::with_capacity(self.buffer_size).map_err(|e| {
            error!("HTTP: *** ERROR: {} ***", e);
            HaltReason::BufferAllocation
        })?;
        self.buffer = Some(buffer);
        Ok(())
    }

    fn run_once<L: LinkPort>(&mut self, link: &mut LinkGuard<'_, L>, sink: &mut impl EventSink) -> Outcome {
        if !link.ensure_data_mode() {
            error!("HTTP: link is not up, skipping this run");
            return Outcome::LinkDown;
        }
        let Some(buffer) = self.buffer.as_mut() else {
            error!("HTTP: no receive buffer");
            return Outcome::Finished;
        };

        info!("HTTP: ===== HTTP GET REQUEST =====");

        let addr = match self.net.resolve(&self.host, self.port) {
            Ok(addrs) if !addrs.is_empty() => addrs[0],
            Ok(_) | Err(_) => {
                error!("HTTP: DNS lookup failed for {}", self.host);
                return Outcome::Retry { after_ms: self.dns_retry_ms };
            }
        };
        info!("HTTP: DNS lookup succeeded. IP={}", addr.ip());

        let mut stream = match self.net.connect(&addr) {
            Ok(stream) => stream,
            Err(NetError::SocketAlloc) => {
                error!("HTTP: ... failed to allocate socket");
                return Outcome::Retry { after_ms: self.dns_retry_ms };
            }
            Err(e) => {
                error!("HTTP: ... {}", e);
                return Outcome::Retry { after_ms: self.connect_retry_ms };
            }
        };
        info!("HTTP: ... connected");

        if let Err(e) = stream.write(self.request.as_bytes()) {
            error!("HTTP: ... {}", e);
            stream.close();
            return Outcome::Retry { after_ms: self.connect_retry_ms };
        }
        info!("HTTP: ... socket send success, reading response");

        buffer.clear();
        // one byte of the chunk stays free, as in the response buffer
        let mut chunk = vec![0u8; self.chunk_size.max(2)];
        let limit = chunk.len() - 1;
        let mut first_block = true;
        let mut last_error = None;
        loop {
            match stream.read(&mut chunk[..limit]) {
                Ok(0) => break,
                Ok(n) => {
                    buffer.append(&chunk[..n]);
                }
                Err(e) => {
                    last_error = Some(e);
                    break;
                }
            }
            if first_block {
                first_block = false;
                if let Err(e) = stream.set_read_timeout(Some(self.read_timeout)) {
                    warn!("HTTP: {}", e);
                }
            }
        }

        let text = buffer.text();
        if let Some((header, body)) = split_header_body(&text) {
            info!("HTTP: Header:\r\n-------\r\n{}\r\n-------", header);
            info!("HTTP: Data:\r\n-----\r\n{}\r\n-----", body);
        }
        match last_error {
            Some(e) => info!(
                "HTTP: ... done reading from socket. {} bytes read, {} in buffer ({})",
                buffer.received_total(),
                buffer.stored_len(),
                e
            ),
            None => info!(
                "HTTP: ... done reading from socket. {} bytes read, {} in buffer",
                buffer.received_total(),
                buffer.stored_len()
            ),
        }
        sink.emit(&EngineEvent::ExchangeComplete {
            task: TaskId::Http,
            received: buffer.received_total(),
            stored: buffer.stored_len(),
        });

        stream.close();
        link.end_data_session();
        Outcome::Finished
    }
}
