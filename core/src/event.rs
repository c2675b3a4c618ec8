//! Time-ordered events and the event queue.
//!
//! RULE: Events with equal execution times run in the order they were
//! scheduled. The tie-break is the insertion sequence, never a priority
//! field — simultaneous events must replay identically from run to run.
//!
//! An event may be cancelled only while it is still queued; once popped
//! it always runs to completion.

use crate::{simulation::Simulation, types::SimTime};
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap, HashSet};

/// The outcome instruction an event returns to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventDisposition {
    /// The event is finished; drop it.
    Delete,
    /// Requeue the event at the given time.
    Reschedule(SimTime),
    /// Park the event for external release.
    Hold,
}

/// A time-stamped, one-shot unit of scheduled work.
///
/// The scheduler never inspects an event beyond this contract.
pub trait Event: Send {
    /// The simulation time at which the event should execute.
    fn time(&self) -> SimTime;

    fn execute(&mut self, sim: &mut Simulation) -> EventDisposition;
}

/// Adapts a closure into a delete-after-execute event.
pub struct OneShotEvent {
    time: SimTime,
    action: Option<Box<dyn FnOnce(&mut Simulation) + Send>>,
}

impl OneShotEvent {
    pub fn new<F>(time: SimTime, action: F) -> Self
    where
        F: FnOnce(&mut Simulation) + Send + 'static,
    {
        Self { time, action: Some(Box::new(action)) }
    }

    /// An event that does nothing. Used as the end-of-run sentinel.
    pub fn noop(time: SimTime) -> Self {
        Self { time, action: None }
    }
}

impl Event for OneShotEvent {
    fn time(&self) -> SimTime {
        self.time
    }

    fn execute(&mut self, sim: &mut Simulation) -> EventDisposition {
        if let Some(action) = self.action.take() {
            action(sim);
        }
        EventDisposition::Delete
    }
}

/// Identity of a queued event, usable for cancellation before it pops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId(u64);

struct Entry {
    time: SimTime,
    seq: u64,
    event: Box<dyn Event>,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .total_cmp(&other.time)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Ordered multiset of pending events keyed by (time, sequence).
#[derive(Default)]
pub struct EventQueue {
    heap: BinaryHeap<Reverse<Entry>>,
    pending: HashSet<u64>,
    cancelled: HashSet<u64>,
    held: HashMap<u64, Box<dyn Event>>,
    next_seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (not cancelled) queued events.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Queue an event at its own reported time.
    pub fn schedule(&mut self, event: Box<dyn Event>) -> EventId {
        let time = event.time();
        self.schedule_at(time, event)
    }

    /// Queue an event at an explicit time, ignoring `event.time()`.
    /// Used by the dispatcher to apply a Reschedule disposition.
    pub fn schedule_at(&mut self, time: SimTime, event: Box<dyn Event>) -> EventId {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.insert(seq);
        self.heap.push(Reverse(Entry { time, seq, event }));
        EventId(seq)
    }

    /// Time of the earliest live event, if any.
    pub fn peek_time(&mut self) -> Option<SimTime> {
        self.skim_cancelled();
        self.heap.peek().map(|Reverse(e)| e.time)
    }

    /// Remove and return the earliest live event. Callers must check
    /// `peek_time` first; popping an empty queue returns None.
    pub fn pop_next(&mut self) -> Option<(EventId, SimTime, Box<dyn Event>)> {
        self.skim_cancelled();
        let Reverse(entry) = self.heap.pop()?;
        self.pending.remove(&entry.seq);
        Some((EventId(entry.seq), entry.time, entry.event))
    }

    /// Cancel a queued event by identity. Returns false if the event has
    /// already executed, been cancelled, or is held.
    pub fn cancel(&mut self, id: EventId) -> bool {
        if self.pending.remove(&id.0) {
            self.cancelled.insert(id.0);
            true
        } else {
            false
        }
    }

    /// Park a popped event under its original identity.
    pub fn hold(&mut self, id: EventId, event: Box<dyn Event>) {
        self.held.insert(id.0, event);
    }

    /// Release a held event back into the queue at the given time.
    pub fn release_held(&mut self, id: EventId, time: SimTime) -> Option<EventId> {
        let event = self.held.remove(&id.0)?;
        Some(self.schedule_at(time, event))
    }

    pub fn held_count(&self) -> usize {
        self.held.len()
    }

    /// Drop every queued and held event.
    pub fn clear(&mut self) {
        self.heap.clear();
        self.pending.clear();
        self.cancelled.clear();
        self.held.clear();
    }

    /// Drop cancelled entries sitting at the head of the heap.
    fn skim_cancelled(&mut self) {
        while let Some(Reverse(entry)) = self.heap.peek() {
            let seq = entry.seq;
            if self.cancelled.remove(&seq) {
                self.heap.pop();
            } else {
                break;
            }
        }
    }
}
