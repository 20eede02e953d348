//! In-memory transport for loopback runs and tests

use std::collections::VecDeque;
use std::io::{self, Read, Write};

use crate::transport::Transport;

/// A transport backed by byte queues.
///
/// Reads drain `inbound`, writes append to `outbound`. Read and write sizes
/// can be capped to simulate a peer that trickles data, and a write budget
/// simulates a send that stalls until its timeout.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    inbound: VecDeque<u8>,
    outbound: Vec<u8>,
    nonblocking: bool,
    closed: bool,
    read_limit: Option<usize>,
    write_limit: Option<usize>,
    write_budget: Option<usize>,
    reset_on_read: bool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver at most `limit` bytes per read call
    pub fn with_read_limit(mut self, limit: usize) -> Self {
        self.read_limit = Some(limit.max(1));
        self
    }

    /// Accept at most `limit` bytes per write call
    pub fn with_write_limit(mut self, limit: usize) -> Self {
        self.write_limit = Some(limit.max(1));
        self
    }

    /// Accept `budget` bytes in total, then time out every write
    pub fn with_write_budget(mut self, budget: usize) -> Self {
        self.write_budget = Some(budget);
        self
    }

    pub fn push_inbound(&mut self, bytes: &[u8]) {
        self.inbound.extend(bytes.iter().copied());
    }

    /// Mark the peer as gone; reads return end-of-stream once inbound drains
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Fail the next read with a connection reset
    pub fn reset(&mut self) {
        self.reset_on_read = true;
    }

    /// Restore an exhausted write budget
    pub fn refill_write_budget(&mut self, budget: usize) {
        self.write_budget = Some(budget);
    }

    pub fn outbound(&self) -> &[u8] {
        &self.outbound
    }

    pub fn take_outbound(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.outbound)
    }

    pub fn pending_inbound(&self) -> usize {
        self.inbound.len()
    }

    pub fn is_nonblocking(&self) -> bool {
        self.nonblocking
    }
}

impl Read for MemoryTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.reset_on_read {
            return Err(io::Error::from(io::ErrorKind::ConnectionReset));
        }
        if self.inbound.is_empty() {
            // A blocking read with nothing left can never be satisfied
            return if self.nonblocking && !self.closed {
                Err(io::Error::from(io::ErrorKind::WouldBlock))
            } else {
                Ok(0)
            };
        }

        let limit = self.read_limit.unwrap_or(usize::MAX);
        let n = buf.len().min(limit).min(self.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(self.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for MemoryTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let limit = self.write_limit.unwrap_or(usize::MAX);
        let mut n = buf.len().min(limit);
        if let Some(budget) = self.write_budget.as_mut() {
            if *budget == 0 && !buf.is_empty() {
                return Err(io::Error::from(io::ErrorKind::WouldBlock));
            }
            n = n.min(*budget);
            *budget -= n;
        }
        self.outbound.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for MemoryTransport {
    fn set_nonblocking(&mut self, nonblocking: bool) -> io::Result<()> {
        self.nonblocking = nonblocking;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_would_block_when_empty() {
        let mut t = MemoryTransport::new();
        t.set_nonblocking(true).unwrap();
        let mut buf = [0u8; 4];
        let err = t.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
    }

    #[test]
    fn test_read_limit() {
        let mut t = MemoryTransport::new().with_read_limit(2);
        t.push_inbound(&[1, 2, 3]);
        let mut buf = [0u8; 8];
        assert_eq!(t.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], &[1, 2]);
        assert_eq!(t.read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], 3);
    }

    #[test]
    fn test_closed_reads_eof() {
        let mut t = MemoryTransport::new();
        t.set_nonblocking(true).unwrap();
        t.close();
        let mut buf = [0u8; 1];
        assert_eq!(t.read(&mut buf).unwrap(), 0);
    }
}
