//! Beat-positioned event queue
//!
//! The transport is a cooperative clock: nothing happens until [`Transport::advance`]
//! moves the position forward, after which due events are popped one at a time
//! in (time, track, insertion) order. Events are plain data; the scheduler
//! decides what each one does.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Tempo bounds accepted by the transport
pub const MIN_BPM: f64 = 40.0;
pub const MAX_BPM: f64 = 240.0;

/// Tolerance when comparing event times against the play head
const EPSILON: f64 = 1e-9;

/// Tie-break order for events at the same beat
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Track {
    Chord,
    Bass,
    Harmony,
    Drums,
    Click,
}

/// Owner of a group of events, cancelled together
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Bar boundary; `bar` counts from the start of the session
    Bar { bar: u64 },
    /// One arpeggiator step
    ArpNote { note: u8, duration_beats: f64 },
    /// One eighth-note drum step
    DrumStep { step: u64 },
    /// Metronome click; `beat` is 1-based
    Click { beat: u32, accent: bool },
    /// The count-in has run its full length
    CountInDone,
}

#[derive(Debug, Clone)]
pub struct ScheduledEvent {
    pub time: f64,
    pub track: Track,
    pub session: SessionId,
    pub event: TransportEvent,
    seq: u64,
}

impl ScheduledEvent {
    fn key_cmp(&self, other: &Self) -> Ordering {
        self.time
            .total_cmp(&other.time)
            .then(self.track.cmp(&other.track))
            .then(self.seq.cmp(&other.seq))
    }
}

impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.key_cmp(other) == Ordering::Equal
    }
}

impl Eq for ScheduledEvent {}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Reversed so the BinaryHeap pops the earliest event first
impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        other.key_cmp(self)
    }
}

#[derive(Debug)]
pub struct Transport {
    queue: BinaryHeap<ScheduledEvent>,
    position: f64,
    bpm: f64,
    running: bool,
    next_seq: u64,
    next_session: u64,
}

impl Default for Transport {
    fn default() -> Self {
        Self::new(120.0)
    }
}

impl Transport {
    pub fn new(bpm: f64) -> Self {
        Self {
            queue: BinaryHeap::new(),
            position: 0.0,
            bpm: clamp_bpm(bpm),
            running: false,
            next_seq: 0,
            next_session: 0,
        }
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Set tempo, clamped to 40-240; returns the value applied
    pub fn set_bpm(&mut self, bpm: f64) -> f64 {
        self.bpm = clamp_bpm(bpm);
        self.bpm
    }

    pub fn seconds_per_beat(&self) -> f64 {
        60.0 / self.bpm
    }

    /// Play head in beats
    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    /// Stop the clock; pending events stay queued
    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn new_session(&mut self) -> SessionId {
        self.next_session += 1;
        SessionId(self.next_session)
    }

    pub fn schedule(&mut self, session: SessionId, time: f64, track: Track, event: TransportEvent) {
        self.next_seq += 1;
        self.queue.push(ScheduledEvent {
            time,
            track,
            session,
            event,
            seq: self.next_seq,
        });
    }

    /// Drop every pending event of a session; returns how many were removed
    pub fn cancel(&mut self, session: SessionId) -> usize {
        let before = self.queue.len();
        self.queue.retain(|e| e.session != session);
        before - self.queue.len()
    }

    pub fn cancel_all(&mut self) -> usize {
        let count = self.queue.len();
        self.queue.clear();
        count
    }

    pub fn pending(&self, session: SessionId) -> usize {
        self.queue.iter().filter(|e| e.session == session).count()
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    /// Move the play head by wall-clock seconds at the current tempo.
    ///
    /// No-op while stopped. Returns the new position.
    pub fn advance(&mut self, seconds: f64) -> f64 {
        if self.running && seconds > 0.0 {
            self.position += seconds / self.seconds_per_beat();
        }
        self.position
    }

    /// Pop the earliest event that is due at the current position
    pub fn pop_due(&mut self) -> Option<ScheduledEvent> {
        let due = self
            .queue
            .peek()
            .is_some_and(|e| e.time <= self.position + EPSILON);
        if due {
            self.queue.pop()
        } else {
            None
        }
    }
}

pub fn clamp_bpm(bpm: f64) -> f64 {
    if bpm.is_nan() {
        return MIN_BPM;
    }
    bpm.clamp(MIN_BPM, MAX_BPM)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bpm_clamped() {
        let mut transport = Transport::new(500.0);
        assert_eq!(transport.bpm(), 240.0);
        assert_eq!(transport.set_bpm(10.0), 40.0);
        assert_eq!(transport.set_bpm(f64::NAN), 40.0);
        assert_eq!(transport.set_bpm(93.0), 93.0);
    }

    #[test]
    fn test_advance_converts_seconds_to_beats() {
        let mut transport = Transport::new(120.0);
        assert_eq!(transport.advance(1.0), 0.0); // stopped
        transport.start();
        assert_eq!(transport.advance(1.0), 2.0);
        transport.set_bpm(60.0);
        assert_eq!(transport.advance(1.0), 3.0);
    }

    #[test]
    fn test_events_pop_in_time_then_track_order() {
        let mut transport = Transport::new(120.0);
        let session = transport.new_session();
        transport.schedule(session, 0.0, Track::Drums, TransportEvent::DrumStep { step: 0 });
        transport.schedule(session, 1.0, Track::Chord, TransportEvent::Bar { bar: 1 });
        transport.schedule(session, 0.0, Track::Chord, TransportEvent::Bar { bar: 0 });
        transport.schedule(session, 0.0, Track::Drums, TransportEvent::DrumStep { step: 99 });

        let mut popped = Vec::new();
        while let Some(e) = transport.pop_due() {
            popped.push(e.event);
        }
        assert_eq!(
            popped,
            vec![
                TransportEvent::Bar { bar: 0 },
                TransportEvent::DrumStep { step: 0 },
                TransportEvent::DrumStep { step: 99 },
            ]
        );

        transport.start();
        transport.advance(0.5);
        assert_eq!(transport.pop_due().map(|e| e.event), Some(TransportEvent::Bar { bar: 1 }));
    }

    #[test]
    fn test_cancel_only_touches_one_session() {
        let mut transport = Transport::new(120.0);
        let a = transport.new_session();
        let b = transport.new_session();
        for i in 0..4 {
            transport.schedule(a, i as f64, Track::Chord, TransportEvent::Bar { bar: i });
        }
        transport.schedule(b, 0.0, Track::Click, TransportEvent::CountInDone);

        assert_eq!(transport.cancel(a), 4);
        assert_eq!(transport.pending(a), 0);
        assert_eq!(transport.pending(b), 1);
        assert_eq!(transport.cancel(a), 0);
        assert_eq!(transport.cancel_all(), 1);
        assert!(transport.is_idle());
    }
}
