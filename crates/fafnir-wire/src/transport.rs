//! Byte-stream transport abstraction

use std::io::{self, Read, Write};
use std::net::TcpStream;

/// A bidirectional byte stream whose reads can be switched between
/// blocking and non-blocking mode.
///
/// In non-blocking mode a read with no data available must fail with
/// `io::ErrorKind::WouldBlock`; a read returning `Ok(0)` means the peer
/// closed the stream.
pub trait Transport: Read + Write {
    fn set_nonblocking(&mut self, nonblocking: bool) -> io::Result<()>;
}

impl Transport for TcpStream {
    fn set_nonblocking(&mut self, nonblocking: bool) -> io::Result<()> {
        TcpStream::set_nonblocking(self, nonblocking)
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn set_nonblocking(&mut self, nonblocking: bool) -> io::Result<()> {
        (**self).set_nonblocking(nonblocking)
    }
}
