//! Event service boundary.
//!
//! The host event service takes a severity, an event id and a short formatted message.
//! [`TracingEventSink`] forwards events to `tracing`; [`EventLog`] does the same and
//! keeps a bounded history that ground tools and tests can inspect.

use arrayvec::ArrayString;
use core::fmt::{self, Write};
use heapless::Deque;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_EVENT_MESSAGE_LEN: usize = 122;
const MAX_EVENT_HISTORY: usize = 32;

pub type EventMessage = ArrayString<MAX_EVENT_MESSAGE_LEN>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u16)]
pub enum EventId {
    Reserved = 0,
    InitInf = 1,
    CcErr = 2,
    NoopInf = 3,
    ResetInf = 4,
    MidErr = 5,
    CmdLenErr = 6,
    PipeErr = 7,
}

impl EventId {
    pub const fn value(self) -> u16 {
        self as u16
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    Debug,
    Information,
    Error,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub id: EventId,
    pub kind: EventType,
    pub message: EventMessage,
}

impl Event {
    pub fn new(id: EventId, kind: EventType, args: fmt::Arguments<'_>) -> Self {
        let mut message = EventMessage::new();
        // Overlong messages keep the fragments that fit.
        let _ = message.write_fmt(args);
        Self { id, kind, message }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    #[error("event service rejected registration: {0}")]
    Registration(&'static str),
}

pub trait EventSink {
    fn send_event(&mut self, event: Event);

    fn register(&mut self) -> Result<(), EventError> {
        Ok(())
    }

    fn send_fmt(&mut self, id: EventId, kind: EventType, args: fmt::Arguments<'_>) {
        self.send_event(Event::new(id, kind, args));
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl TracingEventSink {
    pub fn emit(event: &Event) {
        let event_id = event.id.value();
        match event.kind {
            EventType::Debug => tracing::debug!(event_id, "{}", event.message),
            EventType::Information => tracing::info!(event_id, "{}", event.message),
            EventType::Error => tracing::error!(event_id, "{}", event.message),
            EventType::Critical => tracing::error!(event_id, critical = true, "{}", event.message),
        }
    }
}

impl EventSink for TracingEventSink {
    fn send_event(&mut self, event: Event) {
        Self::emit(&event);
    }
}

/// Recording sink with a bounded history; the oldest entry is dropped when full.
#[derive(Debug, Default)]
pub struct EventLog {
    history: Deque<Event, MAX_EVENT_HISTORY>,
    total: u32,
    reject_registration: bool,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log that refuses registration, for exercising init failure paths.
    pub fn rejecting_registration() -> Self {
        Self {
            reject_registration: true,
            ..Self::default()
        }
    }

    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.history.iter()
    }

    pub fn last(&self) -> Option<&Event> {
        self.history.back()
    }

    pub fn count(&self, id: EventId) -> usize {
        self.history.iter().filter(|e| e.id == id).count()
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }
}

impl EventSink for EventLog {
    fn send_event(&mut self, event: Event) {
        TracingEventSink::emit(&event);
        if self.history.is_full() {
            self.history.pop_front();
        }
        let _ = self.history.push_back(event);
        self.total = self.total.saturating_add(1);
    }

    fn register(&mut self) -> Result<(), EventError> {
        if self.reject_registration {
            return Err(EventError::Registration("registration disabled"));
        }
        Ok(())
    }
}
