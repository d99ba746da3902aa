//! # jam
//!
//! Chord-progression playback engine: chord theory, voice leading, a
//! transport-synchronized multi-track scheduler, audio-graph lifecycle with
//! emergency reset, a training loop, and Standard MIDI File export.
//!
//! ## Modules
//! - [`theory`] - chord symbol parsing, interval resolution, roman numerals
//! - [`voicing`] - octave placement and smooth voice leading
//! - [`drums`] - step patterns, built-in and user-defined
//! - [`audio`] - the node graph behind an [`audio::AudioBackend`], and the transport
//! - [`playback`] - the scheduler that plays a session through the graph
//! - [`training`] - count-in, loop, reset, repeat
//! - [`midi`] - MIDI file export
//! - [`jam_state`] - saved sessions as JSON
//! - [`generator`] - contract and validation for the progression generator
//! - [`config`] - engine configuration (YAML)

pub mod audio;
pub mod config;
pub mod drums;
pub mod error;
pub mod generator;
pub mod jam_state;
pub mod midi;
pub mod playback;
pub mod theory;
pub mod training;
pub mod voicing;

pub use config::EngineConfig;
pub use drums::{DrumPattern, DrumPatternStore};
pub use error::*;
pub use jam_state::JamState;
pub use playback::{PlaybackScheduler, PlaybackSession};
pub use theory::{ChordTheory, Scale};
pub use training::{TrainingController, TrainingState};

/// Export a progression and drum pattern as Standard MIDI File bytes.
///
/// # Example
/// ```rust
/// use jam::{export_midi, DrumPatternStore};
///
/// let store = DrumPatternStore::new();
/// let progression = vec!["C".to_string(), "Am".to_string()];
/// let bytes = export_midi(&progression, 100, store.get("Basic Rock"))?;
/// assert_eq!(&bytes[0..4], b"MThd");
/// # Ok::<(), jam::JamError>(())
/// ```
///
/// # Errors
/// Returns [`JamError::Validation`] for an empty progression.
pub fn export_midi(
    progression: &[String],
    bpm: u32,
    pattern: Option<&DrumPattern>,
) -> Result<Vec<u8>, JamError> {
    midi::export(progression, bpm, pattern)
}
