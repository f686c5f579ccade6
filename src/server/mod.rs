//! Readiness multiplexer.
//!
//! One cooperative loop services the listener and every occupied slot. The
//! poll timeout bounds how long the loop can sit idle, so timed-out slots
//! are reclaimed even with no traffic at all. Accept and first-read are
//! never fused: a connection admitted in one iteration is read no earlier
//! than the next.

pub mod slots;

use std::io::{self, Read, Write};
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token};

use crate::config::ServerConfig;
use crate::error::{BodyError, FatalError};
use crate::handlers::{self, Credentials};
use crate::http::request;
use crate::http::response::Response;
use crate::server::slots::{SlotId, SlotPhase, SlotTable};

const LISTENER: Token = Token(0);
const POLL_INTERVAL: Duration = Duration::from_millis(1000);

fn slot_token(id: SlotId) -> Token {
    Token(id + 1)
}

enum ReadOutcome {
    Wait,
    Close,
    Dispatch,
    Overflow,
}

pub struct Server {
    poll: Poll,
    listener: TcpListener,
    local_addr: std::net::SocketAddr,
    slots: SlotTable,
    config: ServerConfig,
    credentials: Box<dyn Credentials + Send>,
    running: Arc<AtomicBool>,
}

impl Server {
    /// Binds the listener and sets up the poller. The only fatal failures
    /// in the whole server live here.
    pub fn bind(
        config: ServerConfig,
        credentials: Box<dyn Credentials + Send>,
    ) -> Result<Self, FatalError> {
        let addr = config.addr();
        let mut listener =
            TcpListener::bind(addr).map_err(|source| FatalError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| FatalError::Bind { addr, source })?;

        let poll = Poll::new().map_err(FatalError::Poll)?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)
            .map_err(FatalError::Poll)?;

        let slots = SlotTable::new(
            config.max_connections,
            config.timeout,
            config.recv_buffer_size,
        );

        info!("bound to http://{local_addr}");
        Ok(Self {
            poll,
            listener,
            local_addr,
            slots,
            config,
            credentials,
            running: Arc::new(AtomicBool::new(true)),
        })
    }

    pub fn local_addr(&self) -> std::net::SocketAddr {
        self.local_addr
    }

    /// Clearing the returned flag makes `run` return after at most one poll
    /// interval.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn run(&mut self) {
        let mut events = Events::with_capacity(1024);

        info!("event loop started");
        while self.running.load(Ordering::Relaxed) {
            if let Err(e) = self.poll.poll(&mut events, Some(POLL_INTERVAL)) {
                if e.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                error!("poll error: {e}");
                continue;
            }

            for event in events.iter() {
                match event.token() {
                    LISTENER => self.accept_ready(),
                    Token(n) => {
                        let id = n - 1;
                        if event.is_readable() {
                            self.slot_readable(id);
                        }
                        if event.is_writable() {
                            self.slot_writable(id);
                        }
                        if event.is_read_closed() || event.is_write_closed() {
                            self.hangup(id);
                        }
                    }
                }
            }

            self.evict_expired();
        }
        info!("event loop stopped");
    }

    /// Drains the accept queue. mio's listener is edge-triggered, so accepts
    /// continue until the OS reports would-block.
    fn accept_ready(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    if self.config.rfc1918_filter && !peer_allowed(peer.ip()) {
                        debug!("refusing non-private peer {peer}");
                        drop(stream);
                        continue;
                    }
                    match self.slots.admit(stream, peer, Instant::now()) {
                        Ok(id) => {
                            let registered = match self.slots.get_mut(id) {
                                Some(slot) => self
                                    .poll
                                    .registry()
                                    .register(
                                        &mut slot.stream,
                                        slot_token(id),
                                        Interest::READABLE,
                                    )
                                    .is_ok(),
                                None => false,
                            };
                            if registered {
                                debug!("admitted {peer} into slot {id}");
                            } else {
                                self.slots.release(id);
                            }
                        }
                        Err(stream) => {
                            // Hard capacity: refuse without a reply.
                            warn!("slot table full, refusing {peer}");
                            drop(stream);
                        }
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("accept failed: {e}");
                    break;
                }
            }
        }
    }

    fn slot_readable(&mut self, id: SlotId) {
        let buffer_size = self.slots.buffer_size();
        let single_read = self.config.single_read;

        let outcome = {
            let Some(slot) = self.slots.get_mut(id) else { return };
            if slot.phase != SlotPhase::ReadRequest {
                return;
            }

            let mut tmp = [0u8; 4096];
            let mut peer_done = false;
            let mut failed = false;
            loop {
                let room = buffer_size - slot.read_buffer.len();
                if room == 0 {
                    break;
                }
                let want = room.min(tmp.len());
                match slot.stream.read(&mut tmp[..want]) {
                    Ok(0) => {
                        peer_done = true;
                        break;
                    }
                    Ok(n) => slot.read_buffer.extend_from_slice(&tmp[..n]),
                    Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                    Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(_) => {
                        failed = true;
                        break;
                    }
                }
            }

            if failed || (peer_done && slot.read_buffer.is_empty()) {
                // Zero-length read with nothing buffered: release without
                // dispatch.
                ReadOutcome::Close
            } else if request::is_complete(&slot.read_buffer)
                || (single_read && !slot.read_buffer.is_empty())
            {
                ReadOutcome::Dispatch
            } else if peer_done {
                // Peer stopped sending mid-request; nothing to answer.
                ReadOutcome::Close
            } else if slot.read_buffer.len() == buffer_size {
                ReadOutcome::Overflow
            } else {
                ReadOutcome::Wait
            }
        };

        match outcome {
            ReadOutcome::Wait => {}
            ReadOutcome::Close => self.close(id),
            ReadOutcome::Dispatch => self.dispatch(id),
            ReadOutcome::Overflow => {
                let e = BodyError::TooLarge;
                self.queue_response(id, Response::error(e.status(), e.message()));
            }
        }
    }

    /// Hands the buffered request to the router and queues the reply. The
    /// slot flips to write interest whatever the handler decided.
    fn dispatch(&mut self, id: SlotId) {
        let Some(slot) = self.slots.get_mut(id) else { return };
        let response =
            handlers::handle(&self.config, self.credentials.as_ref(), &slot.read_buffer);
        debug!("slot {id} ({}) -> {}", slot.peer, response.status);
        self.queue_response(id, response);
    }

    fn queue_response(&mut self, id: SlotId, response: Response) {
        let bytes = response.to_bytes();
        let mut failed = false;
        if let Some(slot) = self.slots.get_mut(id) {
            slot.write_buffer = bytes;
            slot.bytes_written = 0;
            slot.phase = SlotPhase::WriteResponse;
            failed = self
                .poll
                .registry()
                .reregister(&mut slot.stream, slot_token(id), Interest::WRITABLE)
                .is_err();
        }
        if failed {
            self.close(id);
        }
    }

    fn slot_writable(&mut self, id: SlotId) {
        let mut done = false;
        {
            let Some(slot) = self.slots.get_mut(id) else { return };
            if slot.phase != SlotPhase::WriteResponse {
                return;
            }
            loop {
                if slot.bytes_written >= slot.write_buffer.len() {
                    done = true;
                    break;
                }
                match slot.stream.write(&slot.write_buffer[slot.bytes_written..]) {
                    Ok(0) => {
                        done = true;
                        break;
                    }
                    Ok(n) => slot.bytes_written += n,
                    Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                    Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(_) => {
                        done = true;
                        break;
                    }
                }
            }
        }
        // One response per connection; flushing it ends the cycle.
        if done {
            self.close(id);
        }
    }

    /// Peer hung up. Only slots still waiting on request bytes are dropped
    /// here; a queued response still gets its write attempt.
    fn hangup(&mut self, id: SlotId) {
        let reading =
            matches!(self.slots.get_mut(id), Some(s) if s.phase == SlotPhase::ReadRequest);
        if reading {
            self.close(id);
        }
    }

    fn evict_expired(&mut self) {
        for (id, mut conn) in self.slots.sweep(Instant::now()) {
            let _ = self.poll.registry().deregister(&mut conn.stream);
            debug!("evicted slot {id} ({}) after timeout", conn.peer);
        }
    }

    fn close(&mut self, id: SlotId) {
        if let Some(mut conn) = self.slots.release(id) {
            let _ = self.poll.registry().deregister(&mut conn.stream);
        }
    }
}

/// RFC1918 plus loopback. Applied at accept time when the filter flag is
/// set; refused peers never see an HTTP reply.
fn peer_allowed(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback(),
        IpAddr::V6(v6) => v6.is_loopback(),
    }
}
