//! Fixed-capacity connection slot arena.
//!
//! One slot per in-flight connection, with an explicit free list. The table
//! is owned by the event loop and handed to whoever needs it; nothing in the
//! crate reaches for it as ambient state. Exceeding the capacity refuses the
//! connection outright; there is no queue.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use mio::net::TcpStream;

pub type SlotId = usize;

#[derive(Debug, PartialEq, Eq)]
pub enum SlotPhase {
    ReadRequest,
    WriteResponse,
}

pub struct ConnectionSlot {
    pub stream: TcpStream,
    pub peer: SocketAddr,
    pub accepted_at: Instant,
    pub read_buffer: Vec<u8>,
    pub write_buffer: Vec<u8>,
    pub bytes_written: usize,
    pub phase: SlotPhase,
}

impl ConnectionSlot {
    fn new(stream: TcpStream, peer: SocketAddr, now: Instant, buffer_size: usize) -> Self {
        Self {
            stream,
            peer,
            accepted_at: now,
            read_buffer: Vec::with_capacity(buffer_size),
            write_buffer: Vec::new(),
            bytes_written: 0,
            phase: SlotPhase::ReadRequest,
        }
    }
}

pub struct SlotTable {
    slots: Vec<Option<ConnectionSlot>>,
    free: Vec<SlotId>,
    timeout: Duration,
    buffer_size: usize,
}

impl SlotTable {
    pub fn new(capacity: usize, timeout: Duration, buffer_size: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        // Low ids come off the free list first.
        let free = (0..capacity).rev().collect();
        Self { slots, free, timeout, buffer_size }
    }

    /// Occupies a free slot. On a full table the stream is handed back so
    /// the caller can close it without an HTTP reply.
    pub fn admit(
        &mut self,
        stream: TcpStream,
        peer: SocketAddr,
        now: Instant,
    ) -> Result<SlotId, TcpStream> {
        match self.free.pop() {
            Some(id) => {
                self.slots[id] = Some(ConnectionSlot::new(stream, peer, now, self.buffer_size));
                Ok(id)
            }
            None => Err(stream),
        }
    }

    /// Frees a slot, returning the connection so the caller can deregister
    /// the stream before it drops.
    pub fn release(&mut self, id: SlotId) -> Option<ConnectionSlot> {
        let conn = self.slots.get_mut(id)?.take()?;
        self.free.push(id);
        Some(conn)
    }

    /// Removes and returns every slot whose age exceeds the timeout. No
    /// response is owed to an evicted connection.
    pub fn sweep(&mut self, now: Instant) -> Vec<(SlotId, ConnectionSlot)> {
        let mut evicted = Vec::new();
        for id in 0..self.slots.len() {
            let expired = match &self.slots[id] {
                Some(conn) => now.duration_since(conn.accepted_at) > self.timeout,
                None => false,
            };
            if expired {
                if let Some(conn) = self.release(id) {
                    evicted.push((id, conn));
                }
            }
        }
        evicted
    }

    pub fn get_mut(&mut self, id: SlotId) -> Option<&mut ConnectionSlot> {
        self.slots.get_mut(id)?.as_mut()
    }

    pub fn occupied(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }
}
