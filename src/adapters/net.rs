//! Socket transport adapter.
//!
//! Implements [`NetPort`] / [`NetStream`] with `std::net`.  On ESP-IDF the
//! standard library sits on lwIP, so the same code drives the PPP
//! interface on the device and the host network in tests.

use core::time::Duration;
use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};

use log::warn;

use crate::app::ports::{NetPort, NetStream};
use crate::error::NetError;

#[derive(Debug, Default)]
pub struct StdNet;

impl StdNet {
    pub fn new() -> Self {
        Self
    }
}

impl NetPort for StdNet {
    type Stream = StdStream;

    fn resolve(&mut self, host: &str, port: u16) -> Result<Vec<SocketAddr>, NetError> {
        let addrs: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|e| {
                warn!("Net: getaddrinfo({}) failed: {}", host, e);
                NetError::DnsLookup
            })?
            .filter(SocketAddr::is_ipv4)
            .collect();
        if addrs.is_empty() { Err(NetError::DnsLookup) } else { Ok(addrs) }
    }

    fn connect(&mut self, addr: &SocketAddr) -> Result<StdStream, NetError> {
        TcpStream::connect(addr)
            .map(StdStream)
            .map_err(|e| NetError::Connect(e.raw_os_error().unwrap_or(-1)))
    }
}

/// Connected TCP socket.
#[derive(Debug)]
pub struct StdStream(TcpStream);

impl NetStream for StdStream {
    fn write(&mut self, data: &[u8]) -> Result<usize, NetError> {
        self.0.write_all(data).map(|()| data.len()).map_err(|_| NetError::Write)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, NetError> {
        self.0.read(buf).map_err(|_| NetError::Read)
    }

    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), NetError> {
        self.0.set_read_timeout(timeout).map_err(|_| NetError::SocketOption)
    }

    fn close(self) {
        let _ = self.0.shutdown(Shutdown::Both);
    }
}
