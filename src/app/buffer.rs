//! Bounded response accumulation buffer.
//!
//! Fixed capacity, allocated once per engine and reused for every
//! exchange.  Chunks are stored whole or not at all: a chunk is copied only
//! while `stored + chunk < capacity`, which keeps one byte free for the
//! terminator.  Every chunk counts toward `received_total`, so a response
//! larger than the buffer shows up as `received_total > stored_len`.

use std::borrow::Cow;

/// The fixed-capacity storage could not be reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocError {
    pub capacity: usize,
}

impl core::fmt::Display for AllocError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "cannot allocate {} byte response buffer", self.capacity)
    }
}

#[derive(Debug)]
pub struct ResponseBuffer {
    data: Vec<u8>,
    capacity: usize,
    received_total: usize,
}

impl ResponseBuffer {
    /// Reserve `capacity` bytes up front.  Nothing grows afterwards.
    pub fn with_capacity(capacity: usize) -> Result<Self, AllocError> {
        let mut data = Vec::new();
        data.try_reserve_exact(capacity).map_err(|_| AllocError { capacity })?;
        Ok(Self { data, capacity, received_total: 0 })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stored_len(&self) -> usize {
        self.data.len()
    }

    pub fn received_total(&self) -> usize {
        self.received_total
    }

    /// Bytes received but not stored.
    pub fn dropped(&self) -> usize {
        self.received_total - self.data.len()
    }

    /// Forget the previous exchange; the allocation is kept.
    pub fn clear(&mut self) {
        self.data.clear();
        self.received_total = 0;
    }

    /// Append one received chunk.  Returns how many of its bytes were
    /// dropped (either `0` or `chunk.len()`).
    pub fn append(&mut self, chunk: &[u8]) -> usize {
        self.received_total += chunk.len();
        if self.data.len() + chunk.len() < self.capacity {
            self.data.extend_from_slice(chunk);
            0
        } else {
            chunk.len()
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Stored bytes as text, cut at the first NUL.
    pub fn text(&self) -> Cow<'_, str> {
        let end = self.data.iter().position(|&b| b == 0).unwrap_or(self.data.len());
        String::from_utf8_lossy(&self.data[..end])
    }
}
