//! # MIDI Export
//!
//! Encode a progression and drum pattern as a two-track Standard MIDI File.
//!
//! ## File Layout
//! - Header chunk: format 1, 2 tracks, 480 ticks per quarter note
//! - Track 1 (chords, channel 1): program change, then one bar per chord with
//!   every chord tone held for the whole bar; the tempo is set right after the
//!   first bar's notes start
//! - Track 2 (drums, channel 10): program change, then the pattern on an
//!   eighth-note grid for the length of the progression
//!
//! Delta times are variable-length quantities. Events are ordered by absolute
//! tick with note-offs ahead of note-ons at the same tick.
//!
//! ## Example
//! ```rust
//! use jam::midi::encode;
//!
//! let bytes = encode(&["C", "G"], 120, None);
//! assert_eq!(&bytes[0..4], b"MThd");
//! ```

use crate::drums::DrumPattern;
use crate::error::JamError;
use crate::theory::{ChordTheory, BASE_OCTAVE};
use crate::voicing::base_voicing;

pub const TICKS_PER_QUARTER: u16 = 480;
pub const TICKS_PER_BAR: u32 = TICKS_PER_QUARTER as u32 * 4;
pub const TICKS_PER_EIGHTH: u32 = TICKS_PER_QUARTER as u32 / 2;

/// How long a drum hit is held
pub const DRUM_NOTE_TICKS: u32 = 120;

pub const CHORD_VELOCITY: u8 = 80;

const CHORD_CHANNEL: u8 = 0;
const DRUM_CHANNEL: u8 = 9;

/// Append a MIDI variable-length quantity: 7 bits per byte, most significant
/// group first, continuation bit on every byte but the last.
pub fn write_vlq(value: u32, out: &mut Vec<u8>) {
    let mut groups = [0u8; 5];
    let mut count = 0;
    let mut v = value;
    loop {
        groups[count] = (v & 0x7F) as u8;
        count += 1;
        v >>= 7;
        if v == 0 {
            break;
        }
    }
    for i in (0..count).rev() {
        let continuation = if i > 0 { 0x80 } else { 0x00 };
        out.push(groups[i] | continuation);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum NoteEdge {
    // offs sort first at equal ticks
    Off,
    On,
}

#[derive(Debug, Clone, Copy)]
struct NoteEvent {
    tick: u32,
    edge: NoteEdge,
    note: u8,
    velocity: u8,
}

/// Track data builder tracking the running tick
struct TrackWriter {
    data: Vec<u8>,
    tick: u32,
}

impl TrackWriter {
    fn new() -> Self {
        Self {
            data: Vec::new(),
            tick: 0,
        }
    }

    fn delta_to(&mut self, tick: u32) {
        write_vlq(tick.saturating_sub(self.tick), &mut self.data);
        self.tick = self.tick.max(tick);
    }

    fn program_change(&mut self, channel: u8, program: u8) {
        self.delta_to(self.tick);
        self.data.extend_from_slice(&[0xC0 | channel, program]);
    }

    fn tempo(&mut self, bpm: u32) {
        let micros = 60_000_000 / bpm;
        self.delta_to(self.tick);
        self.data.extend_from_slice(&[
            0xFF,
            0x51,
            0x03,
            (micros >> 16) as u8,
            (micros >> 8) as u8,
            micros as u8,
        ]);
    }

    fn note(&mut self, channel: u8, event: NoteEvent) {
        self.delta_to(event.tick);
        match event.edge {
            NoteEdge::On => self.data.extend_from_slice(&[0x90 | channel, event.note, event.velocity]),
            NoteEdge::Off => self.data.extend_from_slice(&[0x80 | channel, event.note, 0]),
        }
    }

    fn finish(mut self) -> Vec<u8> {
        self.delta_to(self.tick);
        self.data.extend_from_slice(&[0xFF, 0x2F, 0x00]);
        self.data
    }
}

fn sorted(mut events: Vec<NoteEvent>) -> Vec<NoteEvent> {
    events.sort_by_key(|e| (e.tick, e.edge));
    events
}

fn chord_track<S: AsRef<str>>(progression: &[S], bpm: u32) -> Vec<u8> {
    let theory = ChordTheory::new();
    let mut events = Vec::new();
    for (bar, symbol) in progression.iter().enumerate() {
        let start = bar as u32 * TICKS_PER_BAR;
        for note in base_voicing(&theory, symbol.as_ref(), BASE_OCTAVE, false) {
            events.push(NoteEvent {
                tick: start,
                edge: NoteEdge::On,
                note,
                velocity: CHORD_VELOCITY,
            });
            events.push(NoteEvent {
                tick: start + TICKS_PER_BAR,
                edge: NoteEdge::Off,
                note,
                velocity: 0,
            });
        }
    }

    let mut track = TrackWriter::new();
    track.program_change(CHORD_CHANNEL, 0);
    let events = sorted(events);
    let first_later = events.iter().position(|e| e.tick > 0).unwrap_or(events.len());
    for event in &events[..first_later] {
        track.note(CHORD_CHANNEL, *event);
    }
    track.tempo(bpm);
    for event in &events[first_later..] {
        track.note(CHORD_CHANNEL, *event);
    }
    track.finish()
}

fn drum_track(bars: usize, pattern: Option<&DrumPattern>) -> Vec<u8> {
    let mut events = Vec::new();
    if let Some(pattern) = pattern {
        let steps = bars * (TICKS_PER_BAR / TICKS_PER_EIGHTH) as usize;
        for step in 0..steps {
            let Some(drums) = pattern.step(step) else {
                continue;
            };
            let tick = step as u32 * TICKS_PER_EIGHTH;
            for hit in drums.hits() {
                events.push(NoteEvent {
                    tick,
                    edge: NoteEdge::On,
                    note: hit.midi_note(),
                    velocity: hit.velocity(),
                });
                events.push(NoteEvent {
                    tick: tick + DRUM_NOTE_TICKS,
                    edge: NoteEdge::Off,
                    note: hit.midi_note(),
                    velocity: 0,
                });
            }
        }
    }

    let mut track = TrackWriter::new();
    track.program_change(DRUM_CHANNEL, 0);
    for event in sorted(events) {
        track.note(DRUM_CHANNEL, event);
    }
    track.finish()
}

fn push_chunk(out: &mut Vec<u8>, tag: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(tag);
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(data);
}

/// Encode a progression as Standard MIDI File bytes.
///
/// Rests and unparseable chords occupy a bar without notes. `bpm` is clamped
/// to 40-240.
pub fn encode<S: AsRef<str>>(progression: &[S], bpm: u32, pattern: Option<&DrumPattern>) -> Vec<u8> {
    let bpm = bpm.clamp(40, 240);

    let mut header = Vec::with_capacity(6);
    header.extend_from_slice(&1u16.to_be_bytes()); // format 1
    header.extend_from_slice(&2u16.to_be_bytes()); // tracks
    header.extend_from_slice(&TICKS_PER_QUARTER.to_be_bytes());

    let mut out = Vec::new();
    push_chunk(&mut out, b"MThd", &header);
    push_chunk(&mut out, b"MTrk", &chord_track(progression, bpm));
    push_chunk(&mut out, b"MTrk", &drum_track(progression.len(), pattern));
    out
}

/// [`encode`], refusing an empty progression
pub fn export<S: AsRef<str>>(
    progression: &[S],
    bpm: u32,
    pattern: Option<&DrumPattern>,
) -> Result<Vec<u8>, JamError> {
    if progression.is_empty() {
        return Err(JamError::Validation("cannot export an empty progression".to_string()));
    }
    Ok(encode(progression, bpm, pattern))
}
