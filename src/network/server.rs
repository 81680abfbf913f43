//! RESP Server
//!
//! Readiness-driven accept and dispatch loop. One thread owns the poller,
//! every socket, and all engine calls; the only other threads in the process
//! are the engine's flush and compaction workers.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::Arc;

use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token};

use crate::engine::LsmEngine;
use crate::error::Result;
use crate::protocol::{self, encoder, Command, Decoded};
use crate::{BasaltError, Config};

/// Token of the listening socket; client tokens count up from 1
const LISTENER: Token = Token(0);

/// Initial event-list capacity; doubled whenever a poll fills it
const INITIAL_EVENT_CAPACITY: usize = 512;

/// Hard cap on a connection's receive buffer. A request larger than this
/// gets an error reply and the connection is closed.
const MAX_RECV_BUFFER: usize = 64 * 1024 * 1024;

/// The RESP TCP server
pub struct Server {
    poll: Poll,
    listener: TcpListener,
    connections: HashMap<Token, super::Connection>,
    engine: Arc<LsmEngine>,
    next_token: usize,
    event_capacity: usize,
}

impl Server {
    /// Bind the listener and set up the poller. Failure here is fatal to the
    /// process.
    pub fn bind(config: &Config, engine: Arc<LsmEngine>) -> Result<Self> {
        let addr: SocketAddr = config.listen_addr.parse().map_err(|_| {
            BasaltError::Network(format!("invalid listen address: {}", config.listen_addr))
        })?;

        let mut listener = TcpListener::bind(addr)
            .map_err(|e| BasaltError::Network(format!("failed to bind {}: {}", addr, e)))?;

        let poll = Poll::new()?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)?;

        tracing::info!("listening on {}", listener.local_addr()?);

        Ok(Self {
            poll,
            listener,
            connections: HashMap::new(),
            engine,
            next_token: 1,
            event_capacity: INITIAL_EVENT_CAPACITY,
        })
    }

    /// Address actually bound (useful with port 0)
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Run the event loop. Returns only on a non-recoverable poll error;
    /// interrupted waits continue.
    pub fn run(&mut self) -> Result<()> {
        let mut events = Events::with_capacity(self.event_capacity);

        loop {
            if let Err(e) = self.poll.poll(&mut events, None) {
                if e.kind() == ErrorKind::Interrupted {
                    continue;
                }
                return Err(e.into());
            }

            let mut delivered = 0;
            for event in events.iter() {
                delivered += 1;
                match event.token() {
                    LISTENER => self.accept_pending(),
                    token => self.drive_client(token, event.is_readable(), event.is_writable()),
                }
            }

            // A full event list may mean more readiness is pending; give the
            // next wait room to deliver it all
            if delivered == self.event_capacity {
                self.event_capacity *= 2;
                events = Events::with_capacity(self.event_capacity);
            }
        }
    }

    /// Accept until the listener reports no more pending connections
    fn accept_pending(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((mut stream, addr)) => {
                    let token = Token(self.next_token);
                    self.next_token += 1;

                    if let Err(e) =
                        self.poll
                            .registry()
                            .register(&mut stream, token, Interest::READABLE)
                    {
                        tracing::warn!("failed to register connection from {}: {}", addr, e);
                        continue;
                    }

                    tracing::debug!("accepted connection from {}", addr);
                    self.connections
                        .insert(token, super::Connection::new(stream, token, addr));
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::error!("accept error: {}", e);
                    break;
                }
            }
        }
    }

    /// Service one client readiness event: finish pending writes, drain the
    /// socket, decode and dispatch complete frames, then adjust interest.
    fn drive_client(&mut self, token: Token, readable: bool, writable: bool) {
        let engine = Arc::clone(&self.engine);
        let registry = self.poll.registry();

        let open = match self.connections.get_mut(&token) {
            Some(conn) => {
                let mut open = true;

                if writable {
                    open = conn.flush_outbox();
                }

                if open && readable {
                    open = conn.fill_recv();
                    let keep_going = dispatch_frames(conn, &engine);
                    // EOF still gets its replies flushed below; the
                    // connection closes either way
                    open = open && keep_going;
                }

                if conn.has_pending_output() {
                    let flushed = conn.flush_outbox();
                    open = open && flushed;
                }

                if open {
                    if let Err(e) = conn.update_interest(registry) {
                        tracing::warn!("failed to update interest for {}: {}", conn.addr(), e);
                        open = false;
                    }
                }

                open
            }
            None => return,
        };

        if !open {
            if let Some(mut conn) = self.connections.remove(&token) {
                conn.deregister(self.poll.registry());
                tracing::debug!("closed connection from {}", conn.addr());
            }
        }
    }
}

/// Decode and dispatch every complete frame in the receive buffer.
///
/// Returns `false` when the connection must close (oversized request).
/// Protocol errors reply `-ERR` and clear the buffer so the client can
/// resynchronize on its next request; the connection stays open.
fn dispatch_frames(conn: &mut super::Connection, engine: &LsmEngine) -> bool {
    let mut consumed_total = 0;

    loop {
        let rest = &conn.recv_buffer()[consumed_total..];
        if rest.is_empty() {
            break;
        }

        match protocol::decode(rest) {
            Ok(Decoded::Frame { command, consumed }) => {
                consumed_total += consumed;
                let reply = execute(engine, command);
                conn.queue_reply(&reply);
            }
            Ok(Decoded::Incomplete) => break,
            Err(e) => {
                tracing::debug!("protocol error from {}: {}", conn.addr(), e);
                conn.queue_reply(&encoder::error(&e.to_string()));
                conn.clear_recv();
                return true;
            }
        }
    }

    if consumed_total > 0 {
        conn.consume_recv(consumed_total);
    }

    if conn.recv_buffer().len() > MAX_RECV_BUFFER {
        tracing::warn!("request from {} exceeds the receive limit", conn.addr());
        conn.queue_reply(&encoder::error("request too large"));
        return false;
    }

    true
}

/// Run one command against the engine and encode its reply.
///
/// Engine failures are caught here: the client sees a generic error and the
/// connection survives.
fn execute(engine: &LsmEngine, command: Command) -> Vec<u8> {
    match command {
        Command::Get { key } => match engine.get(&key) {
            Ok(Some(value)) => encoder::bulk_string(&value),
            Ok(None) => encoder::null_bulk_string(),
            Err(e) => {
                tracing::error!("engine error on GET: {}", e);
                encoder::error("Internal server error")
            }
        },
        Command::Set { key, value } => {
            engine.put(key, value);
            encoder::simple_string("OK")
        }
        Command::Del { key } => {
            engine.delete(key);
            encoder::integer(1)
        }
    }
}
