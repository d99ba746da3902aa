//! # Chord Theory Module
//!
//! Parses chord symbols into interval sets and classifies chords against a key.
//!
//! ## Sub-modules
//! - `note` - Pitch classes, note names, MIDI numbers
//! - `chord_parser` - Tokenizer producing a typed [`ChordSymbol`]
//! - `intervals` - Table-driven resolver producing an [`IntervalSet`]
//! - `roman` - Diatonic chords and roman numerals
//!
//! ## Parsing Pipeline
//! 1. Split the root (`[A-G][#b]?`); no root means a rest
//! 2. Tokenize the quality (`m`, `maj`, `7`, `sus4`, `b9`, ...)
//! 3. Resolve third, fifth, suspension, seventh, extensions, sixth
//! 4. Apply explicit alterations last (last alteration wins)
//!
//! Nothing in this module returns an error for a bad symbol: the worst case is a
//! rest (no root) or a bare root (unsupported quality).
//!
//! ## Caching
//! [`ChordTheory`] memoizes both resolution and roman-numeral analysis. The UI
//! asks for numerals on every redraw, so the cache is keyed by the exact
//! (symbol, key, scale) triple.
//!
//! ## Example
//! ```rust
//! use jam::theory::{ChordTheory, Scale};
//!
//! let theory = ChordTheory::new();
//! assert_eq!(theory.resolve("Am7").offsets(), vec![0, 3, 7, 10]);
//! assert_eq!(theory.roman_numeral("Am", "C", Scale::Major), "vi");
//! ```

mod chord_parser;
mod intervals;
mod note;
mod roman;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

pub use chord_parser::{parse_chord_symbol, Alteration, ChordSymbol, ChordToken, QualityTags, Suspension};
pub use intervals::{resolve, resolve_chord, Degree, IntervalSet};
pub use note::{
    midi_note, midi_to_name, parse_note_name, prefers_flats, PitchClass, BASE_OCTAVE, NOTE_NAMES_FLAT,
    NOTE_NAMES_SHARP,
};
pub use roman::{diatonic_chords, match_diatonic, parse_key, roman_numeral, DiatonicChord, Scale, TriadQuality};

/// A parsed chord together with its resolved intervals
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedChord {
    pub symbol: ChordSymbol,
    pub intervals: IntervalSet,
}

/// Caching front-end over the chord parser and roman-numeral analysis
///
/// Cheap to share: all methods take `&self`.
#[derive(Debug, Default)]
pub struct ChordTheory {
    chords: RwLock<HashMap<String, Option<Arc<ResolvedChord>>>>,
    numerals: RwLock<HashMap<(String, String, Scale), String>>,
}

impl ChordTheory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and resolve a chord symbol; `None` for rests and unparseable roots
    pub fn chord(&self, symbol: &str) -> Option<Arc<ResolvedChord>> {
        if let Some(cached) = self.chords.read().get(symbol) {
            return cached.clone();
        }

        let resolved = parse_chord_symbol(symbol).map(|parsed| {
            let intervals = resolve_chord(&parsed);
            Arc::new(ResolvedChord {
                symbol: parsed,
                intervals,
            })
        });
        self.chords
            .write()
            .insert(symbol.to_string(), resolved.clone());
        resolved
    }

    /// Interval set for a symbol (empty for a rest)
    pub fn resolve(&self, symbol: &str) -> IntervalSet {
        self.chord(symbol)
            .map(|c| c.intervals.clone())
            .unwrap_or_default()
    }

    /// Root pitch class of a symbol, if it has one
    pub fn root_pitch_class(&self, symbol: &str) -> Option<PitchClass> {
        self.chord(symbol).map(|c| c.symbol.root)
    }

    /// Cached roman numeral; non-diatonic chords come back unchanged
    pub fn roman_numeral(&self, symbol: &str, key: &str, scale: Scale) -> String {
        let cache_key = (symbol.to_string(), key.to_string(), scale);
        if let Some(numeral) = self.numerals.read().get(&cache_key) {
            return numeral.clone();
        }
        let numeral = roman_numeral(symbol, key, scale);
        self.numerals.write().insert(cache_key, numeral.clone());
        numeral
    }

    pub fn is_diatonic(&self, symbol: &str, key: &str, scale: Scale) -> bool {
        match_diatonic(symbol, key, scale).is_some()
    }
}
