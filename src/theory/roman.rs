//! Diatonic analysis: roman numerals for chords in a key

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::chord_parser::{parse_chord_symbol, ChordSymbol};
use super::intervals::resolve_chord;
use super::note::{parse_note_name, prefers_flats, PitchClass, NOTE_NAMES_FLAT, NOTE_NAMES_SHARP};

/// Scale of a key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Scale {
    #[default]
    Major,
    Minor,
}

impl FromStr for Scale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "major" | "maj" | "ionian" => Ok(Scale::Major),
            "minor" | "min" | "aeolian" => Ok(Scale::Minor),
            other => Err(format!("unknown scale '{}', expected Major or Minor", other)),
        }
    }
}

impl fmt::Display for Scale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scale::Major => write!(f, "Major"),
            Scale::Minor => write!(f, "Minor"),
        }
    }
}

/// Parse a key name such as "C", "F#", "Am" or "Bb minor" into tonic and scale.
///
/// A bare note name is a major key; a trailing `m` or a scale word selects minor.
pub fn parse_key(name: &str) -> Option<(PitchClass, Scale)> {
    let trimmed = name.trim();
    if let Some((note, scale)) = trimmed.split_once(char::is_whitespace) {
        return Some((parse_note_name(note)?, scale.parse().ok()?));
    }
    match trimmed.strip_suffix('m') {
        Some(note) if !note.is_empty() => Some((parse_note_name(note)?, Scale::Minor)),
        _ => Some((parse_note_name(trimmed)?, Scale::Major)),
    }
}

/// Basic triad quality used for diatonic matching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriadQuality {
    Major,
    Minor,
    Diminished,
    Augmented,
}

impl TriadQuality {
    fn suffix(self) -> &'static str {
        match self {
            TriadQuality::Major => "",
            TriadQuality::Minor => "m",
            TriadQuality::Diminished => "dim",
            TriadQuality::Augmented => "aug",
        }
    }
}

const MAJOR_SCALE: [u8; 7] = [0, 2, 4, 5, 7, 9, 11];
const MINOR_SCALE: [u8; 7] = [0, 2, 3, 5, 7, 8, 10];

const MAJOR_QUALITIES: [TriadQuality; 7] = [
    TriadQuality::Major,
    TriadQuality::Minor,
    TriadQuality::Minor,
    TriadQuality::Major,
    TriadQuality::Major,
    TriadQuality::Minor,
    TriadQuality::Diminished,
];

const MINOR_QUALITIES: [TriadQuality; 7] = [
    TriadQuality::Minor,
    TriadQuality::Diminished,
    TriadQuality::Major,
    TriadQuality::Minor,
    TriadQuality::Minor,
    TriadQuality::Major,
    TriadQuality::Major,
];

const NUMERALS: [&str; 7] = ["I", "II", "III", "IV", "V", "VI", "VII"];

/// One of the seven chords built on a scale degree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiatonicChord {
    /// 0-based scale degree
    pub degree: usize,
    pub root: PitchClass,
    pub quality: TriadQuality,
    /// Chord name, e.g. "Am"
    pub name: String,
    /// Roman numeral, e.g. "vi"
    pub numeral: String,
}

fn format_numeral(degree: usize, quality: TriadQuality) -> String {
    let upper = NUMERALS[degree];
    match quality {
        TriadQuality::Major => upper.to_string(),
        TriadQuality::Minor => upper.to_lowercase(),
        TriadQuality::Diminished => format!("{}°", upper.to_lowercase()),
        TriadQuality::Augmented => format!("{}+", upper),
    }
}

/// Build the seven diatonic triads of a key
///
/// `key` is a note name ("C", "F#", "Bb"); returns `None` if it isn't one.
pub fn diatonic_chords(key: &str, scale: Scale) -> Option<Vec<DiatonicChord>> {
    let tonic = parse_note_name(key)?;
    let names = if prefers_flats(key) { &NOTE_NAMES_FLAT } else { &NOTE_NAMES_SHARP };
    let (steps, qualities) = match scale {
        Scale::Major => (&MAJOR_SCALE, &MAJOR_QUALITIES),
        Scale::Minor => (&MINOR_SCALE, &MINOR_QUALITIES),
    };

    Some(
        steps
            .iter()
            .zip(qualities.iter())
            .enumerate()
            .map(|(degree, (step, quality))| {
                let root = (tonic + step) % 12;
                DiatonicChord {
                    degree,
                    root,
                    quality: *quality,
                    name: format!("{}{}", names[root as usize], quality.suffix()),
                    numeral: format_numeral(degree, *quality),
                }
            })
            .collect(),
    )
}

/// Triad quality of a parsed chord; `None` for chords without a third (sus, power)
fn basic_quality(chord: &ChordSymbol) -> Option<TriadQuality> {
    let intervals = resolve_chord(chord);
    if intervals.is_diminished() {
        Some(TriadQuality::Diminished)
    } else if intervals.is_augmented() {
        Some(TriadQuality::Augmented)
    } else if intervals.is_minor() {
        Some(TriadQuality::Minor)
    } else if intervals.get(super::Degree::Third) == Some(4) {
        Some(TriadQuality::Major)
    } else {
        None
    }
}

/// Find the diatonic function of a chord, if it has one.
///
/// Matching order:
/// 1. exact: same root, same triad quality, no extension
/// 2. same root and triad quality, extension carried onto the numeral ("V7")
/// 3. minor keys only: the borrowed major V
pub fn match_diatonic(symbol: &str, key: &str, scale: Scale) -> Option<String> {
    let chord = parse_chord_symbol(symbol)?;
    let diatonic = diatonic_chords(key, scale)?;
    let quality = basic_quality(&chord);
    let suffix = chord.extension_suffix();

    let on_root = diatonic.iter().find(|d| d.root == chord.root)?;

    if chord.is_plain_triad() && quality == Some(on_root.quality) {
        return Some(on_root.numeral.clone());
    }

    // Suspended chords have no third to disagree with
    if quality.is_none() || quality == Some(on_root.quality) {
        return Some(format!("{}{}", on_root.numeral, suffix));
    }

    if scale == Scale::Minor && on_root.degree == 4 && quality == Some(TriadQuality::Major) {
        return Some(format!("V{}", suffix));
    }

    None
}

/// Roman numeral for a chord in a key, or the chord symbol itself when the
/// chord is not diatonic (borrowed / chromatic).
///
/// This is the uncached form; prefer [`super::ChordTheory::roman_numeral`] in
/// anything called per redraw.
///
/// # Examples
/// ```
/// use jam::theory::{roman_numeral, Scale};
///
/// assert_eq!(roman_numeral("C", "C", Scale::Major), "I");
/// assert_eq!(roman_numeral("Am", "C", Scale::Major), "vi");
/// assert_eq!(roman_numeral("G7", "C", Scale::Major), "V7");
/// assert_eq!(roman_numeral("E", "A", Scale::Minor), "V");
/// assert_eq!(roman_numeral("F#", "C", Scale::Major), "F#");
/// ```
pub fn roman_numeral(symbol: &str, key: &str, scale: Scale) -> String {
    match_diatonic(symbol, key, scale).unwrap_or_else(|| symbol.to_string())
}
