//! Audio graph value types: voices, channel mix and synth presets

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::JamError;

/// Mixer channel names
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Voice {
    Chords,
    Bass,
    Harmony,
    Drums,
    Click,
}

impl Voice {
    pub const ALL: [Voice; 5] = [Voice::Chords, Voice::Bass, Voice::Harmony, Voice::Drums, Voice::Click];

    /// Voices played by a pitched synth (everything except the drum kit)
    pub const SYNTHS: [Voice; 4] = [Voice::Chords, Voice::Bass, Voice::Harmony, Voice::Click];
}

/// Gain and stereo position of one mixer channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelMix {
    /// Linear gain, 0.0 - 1.0
    pub volume: f32,
    /// -1.0 (left) to 1.0 (right)
    pub pan: f32,
}

impl Default for ChannelMix {
    fn default() -> Self {
        Self { volume: 0.8, pan: 0.0 }
    }
}

impl ChannelMix {
    pub fn new(volume: f32, pan: f32) -> Self {
        Self { volume, pan }
    }

    pub fn validate(&self) -> Result<(), JamError> {
        if !(0.0..=1.0).contains(&self.volume) {
            return Err(JamError::Validation(format!(
                "volume must be between 0 and 1, got {}",
                self.volume
            )));
        }
        if !(-1.0..=1.0).contains(&self.pan) {
            return Err(JamError::Validation(format!(
                "pan must be between -1 and 1, got {}",
                self.pan
            )));
        }
        Ok(())
    }
}

/// Per-voice mix settings
pub type MixSettings = BTreeMap<Voice, ChannelMix>;

/// Mix with every voice at its default level
pub fn default_mix() -> MixSettings {
    Voice::ALL.iter().map(|v| (*v, ChannelMix::default())).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    Sine,
    #[default]
    Triangle,
    Sawtooth,
    Square,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Oscillator {
    pub waveform: Waveform,
    /// Cents
    pub detune: f32,
    /// Number of harmonics for additive waveforms; 0 means the plain waveform
    pub partials: u8,
}

impl Default for Oscillator {
    fn default() -> Self {
        Self {
            waveform: Waveform::Triangle,
            detune: 0.0,
            partials: 0,
        }
    }
}

/// ADSR envelope; times in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Envelope {
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
}

impl Default for Envelope {
    fn default() -> Self {
        Self {
            attack: 0.02,
            decay: 0.3,
            sustain: 0.6,
            release: 0.8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Filter {
    /// Hz
    pub cutoff: f32,
    /// Q
    pub resonance: f32,
}

impl Default for Filter {
    fn default() -> Self {
        Self {
            cutoff: 2400.0,
            resonance: 1.0,
        }
    }
}

/// Sound of a pitched synth voice
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthConfig {
    pub oscillator: Oscillator,
    pub envelope: Envelope,
    pub filter: Filter,
}

impl SynthConfig {
    /// Preset for the bass voice
    pub fn bass() -> Self {
        Self {
            oscillator: Oscillator {
                waveform: Waveform::Sawtooth,
                ..Default::default()
            },
            envelope: Envelope {
                attack: 0.01,
                decay: 0.2,
                sustain: 0.8,
                release: 0.3,
            },
            filter: Filter {
                cutoff: 800.0,
                resonance: 2.0,
            },
        }
    }

    /// Short percussive blip for the metronome
    pub fn click() -> Self {
        Self {
            oscillator: Oscillator {
                waveform: Waveform::Square,
                ..Default::default()
            },
            envelope: Envelope {
                attack: 0.001,
                decay: 0.05,
                sustain: 0.0,
                release: 0.01,
            },
            filter: Filter {
                cutoff: 6000.0,
                resonance: 1.0,
            },
        }
    }

    pub fn validate(&self) -> Result<(), JamError> {
        let env = &self.envelope;
        for (name, value) in [
            ("attack", env.attack),
            ("decay", env.decay),
            ("release", env.release),
        ] {
            if !(value >= 0.0) {
                return Err(JamError::Validation(format!(
                    "envelope {} must be >= 0, got {}",
                    name, value
                )));
            }
        }
        if !(0.0..=1.0).contains(&env.sustain) {
            return Err(JamError::Validation(format!(
                "envelope sustain must be between 0 and 1, got {}",
                env.sustain
            )));
        }
        if !(self.filter.cutoff > 0.0) {
            return Err(JamError::Validation(format!(
                "filter cutoff must be > 0 Hz, got {}",
                self.filter.cutoff
            )));
        }
        if !(self.filter.resonance > 0.0) {
            return Err(JamError::Validation(format!(
                "filter resonance must be > 0, got {}",
                self.filter.resonance
            )));
        }
        Ok(())
    }
}
