//! # Voice Leading
//!
//! Turns a chord-symbol sequence into octave-placed MIDI note sets with smooth
//! motion between consecutive chords.
//!
//! ## Algorithm
//! 1. Base voicing: chord intervals stacked on the root in octave `4 + offset`
//! 2. Optional spread: open the voicing by raising inner chord tones an octave
//! 3. Inversions: for every chord that follows another chord, try each
//!    rotation of the base voicing shifted down, unshifted and up an octave,
//!    and keep the candidate whose mean pitch is closest to the previous chord
//!
//! The search is greedy (no backtracking). A rest yields an empty voicing and
//! resets the memory, so the chord after a rest starts again from its base
//! voicing.
//!
//! ## Example
//! ```rust
//! use jam::voicing::{voice, VoicingOptions};
//!
//! let voiced = voice(&["C", "F"], &VoicingOptions::default());
//! assert_eq!(voiced[0], vec![60, 64, 67]);
//! assert_eq!(voiced[1], vec![60, 65, 69]); // F/C, closest to the C chord
//! ```

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::theory::{midi_note, ChordTheory, Degree, BASE_OCTAVE};

/// Ascending MIDI notes of one chord; empty for a rest
pub type VoicedChord = Vec<u8>;

/// Octave shifts tried for every rotation
const OCTAVE_SHIFTS: [i16; 3] = [-12, 0, 12];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VoicingOptions {
    /// Octaves relative to the base octave (C4)
    pub octave_offset: i8,
    pub spread: bool,
    pub use_inversions: bool,
    /// Pick randomly between the best and second-best candidate
    pub allow_variation: bool,
}

impl Default for VoicingOptions {
    fn default() -> Self {
        Self {
            octave_offset: 0,
            spread: false,
            use_inversions: true,
            allow_variation: false,
        }
    }
}

impl VoicingOptions {
    pub fn octave(&self) -> i8 {
        BASE_OCTAVE + self.octave_offset
    }
}

fn mean(notes: &[u8]) -> f64 {
    notes.iter().map(|n| *n as f64).sum::<f64>() / notes.len() as f64
}

/// Root-position voicing of a chord in an octave, optionally spread.
///
/// Chord tones that would leave the MIDI range are dropped.
pub fn base_voicing(theory: &ChordTheory, symbol: &str, octave: i8, spread: bool) -> VoicedChord {
    let Some(chord) = theory.chord(symbol) else {
        return Vec::new();
    };
    let Some(root) = midi_note(chord.symbol.root, octave) else {
        return Vec::new();
    };

    let entries = chord.intervals.sorted_entries();
    let count = entries.len();
    let mut notes: Vec<u8> = entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, (degree, offset))| {
            let raise = spread
                && match count {
                    3 => index == 1,
                    n if n >= 4 => matches!(degree, Degree::Third | Degree::Seventh),
                    _ => false,
                };
            let note = root as u16 + offset as u16 + if raise { 12 } else { 0 };
            u8::try_from(note).ok().filter(|n| *n <= 127)
        })
        .collect();
    notes.sort_unstable();
    notes
}

/// Every rotation of `base` under every octave shift, in generation order.
///
/// Rotation `k` raises the lowest note an octave `k` times. Candidates with a
/// note outside 0..=127 are discarded.
fn candidates(base: &[u8]) -> Vec<VoicedChord> {
    let mut rotations = Vec::with_capacity(base.len());
    let mut current: Vec<i16> = base.iter().map(|n| *n as i16).collect();
    for _ in 0..base.len() {
        rotations.push(current.clone());
        let lowest = current.remove(0);
        current.push(lowest + 12);
        current.sort_unstable();
    }

    let mut out = Vec::new();
    for shift in OCTAVE_SHIFTS {
        for rotation in &rotations {
            let shifted: Option<Vec<u8>> = rotation
                .iter()
                .map(|n| u8::try_from(n + shift).ok().filter(|m| *m <= 127))
                .collect();
            if let Some(notes) = shifted {
                out.push(notes);
            }
        }
    }
    out
}

/// Pick the candidate closest to `previous`, or one of the two closest when
/// `allow_variation` is set.
fn lead_from<R: Rng + ?Sized>(
    previous: &[u8],
    base: VoicedChord,
    allow_variation: bool,
    rng: &mut R,
) -> VoicedChord {
    let target = mean(previous);
    let mut ranked: Vec<(f64, VoicedChord)> = candidates(&base)
        .into_iter()
        .map(|c| ((mean(&c) - target).abs(), c))
        .collect();
    // stable: ties keep generation order
    ranked.sort_by(|a, b| a.0.total_cmp(&b.0));

    let pick = if allow_variation && ranked.len() >= 2 && rng.random_bool(0.5) {
        1
    } else {
        0
    };
    if pick < ranked.len() {
        ranked.swap_remove(pick).1
    } else {
        base
    }
}

/// Voice a whole progression with an explicit random source.
pub fn voice_progression<S, R>(
    theory: &ChordTheory,
    progression: &[S],
    options: &VoicingOptions,
    rng: &mut R,
) -> Vec<VoicedChord>
where
    S: AsRef<str>,
    R: Rng + ?Sized,
{
    let octave = options.octave();
    let mut previous: Option<VoicedChord> = None;
    let mut voiced = Vec::with_capacity(progression.len());

    for symbol in progression {
        let base = base_voicing(theory, symbol.as_ref(), octave, options.spread);
        if base.is_empty() {
            previous = None;
            voiced.push(base);
            continue;
        }

        let chord = match (&previous, options.use_inversions) {
            (Some(prev), true) => lead_from(prev, base, options.allow_variation, rng),
            _ => base,
        };
        previous = Some(chord.clone());
        voiced.push(chord);
    }

    voiced
}

/// Voice a progression with a fresh chord cache and the thread-local RNG.
pub fn voice<S: AsRef<str>>(progression: &[S], options: &VoicingOptions) -> Vec<VoicedChord> {
    voice_progression(&ChordTheory::new(), progression, options, &mut rand::rng())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn no_inversions() -> VoicingOptions {
        VoicingOptions {
            use_inversions: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_base_voicing_root_position() {
        let theory = ChordTheory::new();
        assert_eq!(base_voicing(&theory, "C", 4, false), vec![60, 64, 67]);
        assert_eq!(base_voicing(&theory, "Am7", 3, false), vec![57, 60, 64, 67]);
        assert_eq!(base_voicing(&theory, "N.C.", 4, false), Vec::<u8>::new());
    }

    #[test]
    fn test_spread_triad_raises_middle_note() {
        let theory = ChordTheory::new();
        assert_eq!(base_voicing(&theory, "C", 4, true), vec![60, 67, 76]);
    }

    #[test]
    fn test_spread_seventh_raises_third_and_seventh() {
        let theory = ChordTheory::new();
        // Cmaj7: C E G B -> C G E' B'
        assert_eq!(base_voicing(&theory, "Cmaj7", 4, true), vec![60, 67, 76, 83]);
        // sus chords have no third; only the seventh moves
        assert_eq!(base_voicing(&theory, "G7sus4", 3, true), vec![55, 60, 62, 77]);
    }

    #[test]
    fn test_octave_offset() {
        let options = VoicingOptions {
            octave_offset: -1,
            ..no_inversions()
        };
        assert_eq!(voice(&["C"], &options), vec![vec![48, 52, 55]]);
    }

    #[test]
    fn test_without_inversions_keeps_base_voicings() {
        let voiced = voice(&["C", "F", "G"], &no_inversions());
        assert_eq!(voiced, vec![vec![60, 64, 67], vec![65, 69, 72], vec![67, 71, 74]]);
    }

    #[test]
    fn test_voice_leading_never_moves_further_than_base() {
        let theory = ChordTheory::new();
        let progression = ["C", "F", "G", "C"];
        let voiced = voice(&progression, &VoicingOptions::default());

        // First chord keeps its base voicing
        assert_eq!(voiced[0], vec![60, 64, 67]);

        for i in 1..progression.len() {
            let prev = mean(&voiced[i - 1]);
            let base = base_voicing(&theory, progression[i], 4, false);
            let chosen = (mean(&voiced[i]) - prev).abs();
            let unvoiced = (mean(&base) - prev).abs();
            assert!(chosen <= unvoiced, "chord {} moved {} > {}", i, chosen, unvoiced);
        }
    }

    #[test]
    fn test_voiced_chords_keep_pitch_classes() {
        let voiced = voice(&["C", "F", "G", "C"], &VoicingOptions::default());
        let mut classes: Vec<u8> = voiced[1].iter().map(|n| n % 12).collect();
        classes.sort_unstable();
        assert_eq!(classes, vec![0, 5, 9]); // F A C
    }

    #[test]
    fn test_rest_resets_memory() {
        let voiced = voice(&["C", "N.C.", "F"], &VoicingOptions::default());
        assert_eq!(voiced[1], Vec::<u8>::new());
        // F after a rest is not led from C
        assert_eq!(voiced[2], vec![65, 69, 72]);
    }

    #[test]
    fn test_candidates_discard_out_of_range() {
        // near the top of the range only the downward shifts and the base survive
        let all = candidates(&[120, 124, 127]);
        assert!(all.iter().all(|c| c.iter().all(|n| *n <= 127)));
        assert_eq!(
            all,
            vec![
                vec![108, 112, 115],
                vec![112, 115, 120],
                vec![115, 120, 124],
                vec![120, 124, 127],
            ]
        );
    }

    #[test]
    fn test_variation_stays_within_top_two() {
        let theory = ChordTheory::new();
        let options = VoicingOptions {
            allow_variation: true,
            ..Default::default()
        };
        let mut seen = std::collections::HashSet::new();
        for seed in 0..32 {
            let mut rng = StdRng::seed_from_u64(seed);
            let voiced = voice_progression(&theory, &["C", "F"], &options, &mut rng);
            seen.insert(voiced[1].clone());
        }
        // best is F/C, runner-up is F/A below it
        let allowed = [vec![60, 65, 69], vec![57, 60, 65]];
        assert!(seen.iter().all(|v| allowed.contains(v)), "unexpected voicings {:?}", seen);
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_seeded_variation_is_deterministic() {
        let theory = ChordTheory::new();
        let options = VoicingOptions {
            allow_variation: true,
            ..Default::default()
        };
        let progression = ["C", "Am", "F", "G", "Em", "Dm"];
        let a = voice_progression(&theory, &progression, &options, &mut StdRng::seed_from_u64(7));
        let b = voice_progression(&theory, &progression, &options, &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
    }
}
