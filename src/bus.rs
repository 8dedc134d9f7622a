//! Software bus boundary and the in-process bus used by the host runtime and tests.

use crate::protocol::{Envelope, MsgId};
use crate::telemetry::TelemetryPacket;
use arrayvec::ArrayString;
use heapless::{Deque, Vec};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_PIPES: usize = 4;
pub const MAX_PIPE_DEPTH: usize = 32;
pub const MAX_PIPE_NAME_LEN: usize = 20;
const MAX_SUBSCRIPTIONS: usize = 16;
const MAX_OUTBOX: usize = 32;
const SEQ_COUNT_MASK: u16 = 0x3FFF;

pub type PipeName = ArrayString<MAX_PIPE_NAME_LEN>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PipeId(pub u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BusError {
    #[error("invalid pipe depth {depth}, must be 1..={max}")]
    InvalidDepth { depth: u16, max: usize },
    #[error("pipe name too long or empty")]
    InvalidPipeName,
    #[error("pipe name already in use")]
    DuplicatePipeName,
    #[error("pipe table full")]
    PipeTableFull,
    #[error("unknown pipe {0:?}")]
    UnknownPipe(PipeId),
    #[error("subscription table full")]
    SubscriptionTableFull,
}

/// Outbound half of the bus.
pub trait TelemetrySink {
    /// Send a packet as its originator: the bus assigns the sequence count.
    fn transmit(&mut self, packet: &TelemetryPacket) -> Result<(), BusError>;
}

pub trait SoftwareBus: TelemetrySink {
    fn create_pipe(&mut self, depth: u16, name: &str) -> Result<PipeId, BusError>;

    fn subscribe(&mut self, msg_id: MsgId, pipe: PipeId) -> Result<(), BusError>;

    /// Take the next message from `pipe`. `WouldBlock` means the pipe is empty and a
    /// blocking host would pend here.
    fn receive(&mut self, pipe: PipeId) -> nb::Result<Envelope, BusError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusStats {
    pub published: u32,
    pub delivered: u32,
    pub dropped_pipe_full: u32,
    pub unrouted: u32,
    pub transmitted: u32,
    pub telemetry_dropped: u32,
}

#[derive(Debug)]
struct Pipe {
    id: PipeId,
    name: PipeName,
    depth: usize,
    queue: Deque<Envelope, MAX_PIPE_DEPTH>,
}

#[derive(Debug)]
pub struct LocalBus {
    pipes: Vec<Pipe, MAX_PIPES>,
    subscriptions: Vec<(MsgId, PipeId), MAX_SUBSCRIPTIONS>,
    sequences: Vec<(MsgId, u16), MAX_SUBSCRIPTIONS>,
    outbox: Deque<TelemetryPacket, MAX_OUTBOX>,
    next_pipe_id: u8,
    stats: BusStats,
}

impl LocalBus {
    pub fn new() -> Self {
        Self {
            pipes: Vec::new(),
            subscriptions: Vec::new(),
            sequences: Vec::new(),
            outbox: Deque::new(),
            next_pipe_id: 0,
            stats: BusStats::default(),
        }
    }

    /// Route `envelope` to every subscribed pipe. Returns how many pipes took it.
    pub fn publish(&mut self, envelope: &Envelope) -> usize {
        self.stats.published = self.stats.published.saturating_add(1);
        let msg_id = envelope.msg_id();

        let mut delivered = 0;
        for &(_, pipe_id) in self.subscriptions.iter().filter(|(id, _)| *id == msg_id) {
            let Some(pipe) = self.pipes.iter_mut().find(|p| p.id == pipe_id) else {
                continue;
            };
            if pipe.queue.len() >= pipe.depth || pipe.queue.push_back(envelope.clone()).is_err() {
                self.stats.dropped_pipe_full = self.stats.dropped_pipe_full.saturating_add(1);
                tracing::warn!(%msg_id, pipe = %pipe.name, "pipe full, message dropped");
                continue;
            }
            delivered += 1;
        }

        if delivered == 0 && !self.subscriptions.iter().any(|(id, _)| *id == msg_id) {
            self.stats.unrouted = self.stats.unrouted.saturating_add(1);
            tracing::debug!(%msg_id, "no subscribers");
        }
        self.stats.delivered = self.stats.delivered.saturating_add(delivered as u32);
        delivered
    }

    pub fn delete_pipe(&mut self, pipe: PipeId) -> Result<(), BusError> {
        let index = self
            .pipes
            .iter()
            .position(|p| p.id == pipe)
            .ok_or(BusError::UnknownPipe(pipe))?;
        self.pipes.swap_remove(index);
        self.subscriptions.retain(|(_, p)| *p != pipe);
        Ok(())
    }

    pub fn pending(&self, pipe: PipeId) -> usize {
        self.pipes
            .iter()
            .find(|p| p.id == pipe)
            .map_or(0, |p| p.queue.len())
    }

    pub fn pop_telemetry(&mut self) -> Option<TelemetryPacket> {
        self.outbox.pop_front()
    }

    pub fn telemetry_len(&self) -> usize {
        self.outbox.len()
    }

    pub fn stats(&self) -> &BusStats {
        &self.stats
    }

    fn next_sequence(&mut self, msg_id: MsgId) -> u16 {
        if let Some((_, seq)) = self.sequences.iter_mut().find(|(id, _)| *id == msg_id) {
            *seq = (*seq + 1) & SEQ_COUNT_MASK;
            return *seq;
        }
        let _ = self.sequences.push((msg_id, 0));
        0
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetrySink for LocalBus {
    fn transmit(&mut self, packet: &TelemetryPacket) -> Result<(), BusError> {
        let mut packet = *packet;
        let sequence = self.next_sequence(packet.msg_id());
        packet.header_mut().sequence = sequence;

        if self.outbox.is_full() {
            self.outbox.pop_front();
            self.stats.telemetry_dropped = self.stats.telemetry_dropped.saturating_add(1);
        }
        let _ = self.outbox.push_back(packet);
        self.stats.transmitted = self.stats.transmitted.saturating_add(1);
        Ok(())
    }
}

impl SoftwareBus for LocalBus {
    fn create_pipe(&mut self, depth: u16, name: &str) -> Result<PipeId, BusError> {
        if depth == 0 || usize::from(depth) > MAX_PIPE_DEPTH {
            return Err(BusError::InvalidDepth {
                depth,
                max: MAX_PIPE_DEPTH,
            });
        }
        let name = PipeName::from(name).map_err(|_| BusError::InvalidPipeName)?;
        if name.is_empty() {
            return Err(BusError::InvalidPipeName);
        }
        if self.pipes.iter().any(|p| p.name == name) {
            return Err(BusError::DuplicatePipeName);
        }
        if self.pipes.is_full() {
            return Err(BusError::PipeTableFull);
        }

        let id = PipeId(self.next_pipe_id);
        self.next_pipe_id = self.next_pipe_id.wrapping_add(1);
        let _ = self.pipes.push(Pipe {
            id,
            name,
            depth: usize::from(depth),
            queue: Deque::new(),
        });
        tracing::debug!(pipe = %name, depth, "pipe created");
        Ok(id)
    }

    fn subscribe(&mut self, msg_id: MsgId, pipe: PipeId) -> Result<(), BusError> {
        if !self.pipes.iter().any(|p| p.id == pipe) {
            return Err(BusError::UnknownPipe(pipe));
        }
        if self.subscriptions.contains(&(msg_id, pipe)) {
            return Ok(());
        }
        self.subscriptions
            .push((msg_id, pipe))
            .map_err(|_| BusError::SubscriptionTableFull)
    }

    fn receive(&mut self, pipe: PipeId) -> nb::Result<Envelope, BusError> {
        let pipe = self
            .pipes
            .iter_mut()
            .find(|p| p.id == pipe)
            .ok_or(nb::Error::Other(BusError::UnknownPipe(pipe)))?;
        pipe.queue.pop_front().ok_or(nb::Error::WouldBlock)
    }
}
