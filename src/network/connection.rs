//! Connection state
//!
//! Per-client buffers and socket pumping. The server owns the event loop;
//! this type owns one socket, its receive buffer, and its outbound queue.

use std::io::{self, ErrorKind, Read, Write};
use std::net::SocketAddr;

use mio::net::TcpStream;
use mio::{Interest, Registry, Token};

/// Bytes read from the socket per recv call
const CHUNK_SIZE: usize = 4096;

/// Initial reserved capacity of the receive buffer
const INITIAL_RECV_BUFFER: usize = 1024 * 1024;

/// A single client connection
pub struct Connection {
    stream: TcpStream,
    token: Token,
    addr: SocketAddr,

    /// Bytes received but not yet consumed by the decoder
    recv: Vec<u8>,

    /// Reply bytes not yet written to the socket
    outbox: Vec<u8>,

    /// Interest currently registered with the poller
    interest: Interest,
}

impl Connection {
    /// Wrap an accepted stream. The caller has already registered it
    /// readable under `token`.
    pub fn new(stream: TcpStream, token: Token, addr: SocketAddr) -> Self {
        Self {
            stream,
            token,
            addr,
            recv: Vec::with_capacity(INITIAL_RECV_BUFFER),
            outbox: Vec::new(),
            interest: Interest::READABLE,
        }
    }

    /// Peer address, for logging
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Received bytes awaiting decode
    pub fn recv_buffer(&self) -> &[u8] {
        &self.recv
    }

    /// Drop the first `n` received bytes (consumed by the decoder)
    pub fn consume_recv(&mut self, n: usize) {
        self.recv.drain(..n);
    }

    /// Discard the whole receive buffer (resynchronize after a protocol
    /// error)
    pub fn clear_recv(&mut self) {
        self.recv.clear();
    }

    /// Append reply bytes to the outbound queue
    pub fn queue_reply(&mut self, bytes: &[u8]) {
        self.outbox.extend_from_slice(bytes);
    }

    /// Read everything currently available in CHUNK_SIZE pieces.
    ///
    /// Returns `false` when the peer closed the stream or a hard error
    /// occurred; the connection should then be dropped.
    pub fn fill_recv(&mut self) -> bool {
        let mut chunk = [0u8; CHUNK_SIZE];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => return false, // end-of-stream
                Ok(n) => {
                    self.recv.extend_from_slice(&chunk[..n]);
                    // Keep at least one chunk of headroom, growing
                    // geometrically
                    if self.recv.len() + CHUNK_SIZE > self.recv.capacity() {
                        self.recv.reserve(self.recv.capacity());
                    }
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => return true,
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::debug!("read error from {}: {}", self.addr, e);
                    return false;
                }
            }
        }
    }

    /// Write as much of the outbound queue as the socket accepts.
    ///
    /// Returns `false` on a hard write error. Leftover bytes stay queued for
    /// the next write-readiness event.
    pub fn flush_outbox(&mut self) -> bool {
        let mut written = 0;
        while written < self.outbox.len() {
            match self.stream.write(&self.outbox[written..]) {
                Ok(0) => {
                    self.outbox.drain(..written);
                    return false;
                }
                Ok(n) => written += n,
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::debug!("write error to {}: {}", self.addr, e);
                    return false;
                }
            }
        }
        self.outbox.drain(..written);
        true
    }

    /// True when reply bytes are still queued
    pub fn has_pending_output(&self) -> bool {
        !self.outbox.is_empty()
    }

    /// Re-register with write interest added or removed to match the
    /// outbound queue.
    pub fn update_interest(&mut self, registry: &Registry) -> io::Result<()> {
        let wanted = if self.has_pending_output() {
            Interest::READABLE | Interest::WRITABLE
        } else {
            Interest::READABLE
        };
        if wanted != self.interest {
            registry.reregister(&mut self.stream, self.token, wanted)?;
            self.interest = wanted;
        }
        Ok(())
    }

    /// Deregister from the poller on close
    pub fn deregister(&mut self, registry: &Registry) {
        let _ = registry.deregister(&mut self.stream);
    }
}
