//! Playback session and per-track option types

use serde::{Deserialize, Serialize};

use crate::audio::{default_mix, MixSettings, SynthConfig};
use crate::drums::DrumPattern;
use crate::error::JamError;
use crate::theory::{Degree, IntervalSet};
use crate::voicing::VoicingOptions;

/// Beats per bar; everything is in 4/4
pub const BEATS_PER_BAR: f64 = 4.0;

/// Arpeggiator note order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ArpDirection {
    #[default]
    Up,
    Down,
    /// Ascending then descending, endpoints not repeated
    UpDown,
    Random,
}

/// Arpeggiator step length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ArpRate {
    Quarter,
    #[default]
    Eighth,
    Sixteenth,
    EighthTriplet,
}

impl ArpRate {
    pub fn steps_per_bar(self) -> usize {
        match self {
            ArpRate::Quarter => 4,
            ArpRate::Eighth => 8,
            ArpRate::Sixteenth => 16,
            ArpRate::EighthTriplet => 12,
        }
    }

    /// Step length in beats
    pub fn beats(self) -> f64 {
        BEATS_PER_BAR / self.steps_per_bar() as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArpConfig {
    pub enabled: bool,
    pub direction: ArpDirection,
    pub rate: ArpRate,
    /// Fraction of the step each note is held, (0, 1]
    pub gate: f64,
}

impl Default for ArpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            direction: ArpDirection::Up,
            rate: ArpRate::Eighth,
            gate: 0.8,
        }
    }
}

impl ArpConfig {
    pub fn validate(&self) -> Result<(), JamError> {
        if !(self.gate > 0.0 && self.gate <= 1.0) {
            return Err(JamError::Validation(format!(
                "arpeggiator gate must be in (0, 1], got {}",
                self.gate
            )));
        }
        Ok(())
    }
}

/// Interval of the harmony line above each chord root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HarmonyInterval {
    #[serde(alias = "2nd")]
    Second,
    #[serde(alias = "3rd")]
    Third,
    #[serde(alias = "5th")]
    Fifth,
    #[serde(alias = "6th")]
    Sixth,
    #[serde(alias = "7th")]
    Seventh,
}

impl HarmonyInterval {
    /// Semitones above the root for a chord, or `None` when the harmony rests
    /// (rests, and a third over a suspended chord).
    pub fn semitones(self, chord: &IntervalSet) -> Option<u8> {
        if chord.is_empty() {
            return None;
        }
        let minor = chord.is_minor() || chord.is_diminished();
        match self {
            HarmonyInterval::Second => Some(2),
            HarmonyInterval::Third if chord.is_suspended() => None,
            HarmonyInterval::Third => Some(if minor { 3 } else { 4 }),
            HarmonyInterval::Fifth => Some(if chord.is_diminished() { 6 } else { 7 }),
            HarmonyInterval::Sixth => Some(if minor { 8 } else { 9 }),
            HarmonyInterval::Seventh => Some(
                chord
                    .get(Degree::Seventh)
                    .unwrap_or(if minor { 10 } else { 11 }),
            ),
        }
    }
}

/// Everything needed to play a progression
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSession {
    pub progression: Vec<String>,
    pub pattern: DrumPattern,
    /// 40-240, clamped on start
    pub bpm: f64,
    /// Stop after this many passes through the progression
    pub loop_target: Option<u32>,
    pub voicing: VoicingOptions,
    pub arpeggiator: ArpConfig,
    pub harmony: Option<HarmonyInterval>,
    pub mix: MixSettings,
    pub synth: SynthConfig,
}

impl PlaybackSession {
    pub fn new<S: Into<String>>(
        progression: impl IntoIterator<Item = S>,
        pattern: DrumPattern,
        bpm: f64,
    ) -> Self {
        Self {
            progression: progression.into_iter().map(Into::into).collect(),
            pattern,
            bpm,
            loop_target: None,
            voicing: VoicingOptions::default(),
            arpeggiator: ArpConfig::default(),
            harmony: None,
            mix: default_mix(),
            synth: SynthConfig::default(),
        }
    }

    pub fn with_loop_target(mut self, loops: u32) -> Self {
        self.loop_target = Some(loops);
        self
    }

    pub fn with_arpeggiator(mut self, arpeggiator: ArpConfig) -> Self {
        self.arpeggiator = arpeggiator;
        self
    }

    pub fn with_harmony(mut self, harmony: HarmonyInterval) -> Self {
        self.harmony = Some(harmony);
        self
    }

    pub fn with_voicing(mut self, voicing: VoicingOptions) -> Self {
        self.voicing = voicing;
        self
    }
}
