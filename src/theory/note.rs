//! Pitch-class and MIDI note helpers

/// Pitch class 0-11 (C = 0)
pub type PitchClass = u8;

pub const NOTE_NAMES_SHARP: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];
pub const NOTE_NAMES_FLAT: [&str; 12] = ["C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B"];

/// Octave the voicing engine places chords in before any offset (C4 = MIDI 60)
pub const BASE_OCTAVE: i8 = 4;

/// Natural note letter to pitch class
pub fn letter_to_pitch_class(letter: char) -> Option<PitchClass> {
    match letter {
        'C' => Some(0),
        'D' => Some(2),
        'E' => Some(4),
        'F' => Some(5),
        'G' => Some(7),
        'A' => Some(9),
        'B' => Some(11),
        _ => None,
    }
}

/// Parse a note name like "C", "F#", "Bb" into a pitch class.
///
/// Only a single accidental is accepted; anything trailing is rejected.
pub fn parse_note_name(name: &str) -> Option<PitchClass> {
    let mut chars = name.trim().chars();
    let base = letter_to_pitch_class(chars.next()?)? as i8;
    let accidental: i8 = match chars.next() {
        None => 0,
        Some('#') => 1,
        Some('b') => -1,
        Some(_) => return None,
    };
    if chars.next().is_some() {
        return None;
    }
    Some((base + accidental).rem_euclid(12) as PitchClass)
}

/// MIDI note number for a pitch class in an octave (C4 = 60).
///
/// Returns `None` outside the MIDI range.
pub fn midi_note(pitch_class: PitchClass, octave: i8) -> Option<u8> {
    let midi = (octave as i16 + 1) * 12 + pitch_class as i16;
    u8::try_from(midi).ok().filter(|m| *m <= 127)
}

/// Scientific pitch name for a MIDI note, e.g. 61 -> "C#4"
pub fn midi_to_name(midi: u8, prefer_flat: bool) -> String {
    let names = if prefer_flat { &NOTE_NAMES_FLAT } else { &NOTE_NAMES_SHARP };
    let octave = midi as i16 / 12 - 1;
    format!("{}{}", names[(midi % 12) as usize], octave)
}

/// Keys that are conventionally spelled with flats
pub fn prefers_flats(key_name: &str) -> bool {
    let trimmed = key_name.trim();
    trimmed == "F" || (trimmed.len() > 1 && trimmed.ends_with('b'))
}
