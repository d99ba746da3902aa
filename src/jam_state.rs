//! # Jam State Documents
//!
//! A saved jam session as pretty-printed JSON:
//!
//! ```json
//! {
//!   "version": 2,
//!   "progression": ["C", "G", "Am", "F", "C", "G", "Am", "F"],
//!   "bpm": 120.0,
//!   "key": "C",
//!   "scale": "Major",
//!   "drumPattern": "Basic Rock",
//!   "mix": { "bass": { "volume": 0.6, "pan": 0.0 } },
//!   "loopCount": 2
//! }
//! ```
//!
//! Every field is optional and falls back to [`JamState::default`]. The
//! drum pattern is either a built-in name or an inline `{name, steps}`
//! object. Mix entries are merged over the default mix.
//!
//! Version 1 documents used `tempo` for the bpm, `pattern` for the drum
//! pattern name, and flat `chordVolume` / `bassVolume` / `drumVolume`
//! numbers. They are upgraded on load.
//!
//! A document that fails to parse or validate is rejected as a whole with
//! [`JamError::InvalidState`] naming the offending field.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::audio::{clamp_bpm, default_mix, MixSettings, SynthConfig, Voice, MAX_BPM, MIN_BPM};
use crate::drums::{DrumPattern, DrumPatternStore};
use crate::error::JamError;
use crate::playback::{ArpConfig, HarmonyInterval, PlaybackSession};
use crate::theory::{parse_note_name, Scale};
use crate::voicing::VoicingOptions;

pub const CURRENT_VERSION: u32 = 2;

/// Fields only found in version 1 documents
const LEGACY_FIELDS: [&str; 5] = ["tempo", "pattern", "chordVolume", "bassVolume", "drumVolume"];

/// A drum pattern by built-in name, or spelled out in the document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatternRef {
    Named(String),
    Inline(DrumPattern),
}

impl PatternRef {
    pub fn resolve(&self, store: &DrumPatternStore) -> Result<DrumPattern, JamError> {
        match self {
            PatternRef::Named(name) => store
                .get(name)
                .cloned()
                .ok_or_else(|| JamError::state("drumPattern", format!("unknown drum pattern '{}'", name))),
            PatternRef::Inline(pattern) => Ok(pattern.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JamState {
    pub version: u32,
    pub progression: Vec<String>,
    pub bpm: f64,
    /// Tonic name, e.g. "C" or "F#"
    pub key: String,
    pub scale: Scale,
    pub drum_pattern: PatternRef,
    pub mix: MixSettings,
    pub synth: SynthConfig,
    pub arpeggiator: ArpConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub harmony: Option<HarmonyInterval>,
    pub voicing: VoicingOptions,
    /// Passes through the progression before stopping; `None` loops forever
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loop_count: Option<u32>,
}

impl Default for JamState {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            progression: ["C", "G", "Am", "F", "C", "G", "Am", "F"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            bpm: 120.0,
            key: "C".to_string(),
            scale: Scale::Major,
            drum_pattern: PatternRef::Named("Basic Rock".to_string()),
            mix: default_mix(),
            synth: SynthConfig::default(),
            arpeggiator: ArpConfig::default(),
            harmony: None,
            voicing: VoicingOptions::default(),
            loop_count: None,
        }
    }
}

impl JamState {
    /// Parse and validate a document, upgrading older versions
    pub fn from_json(content: &str) -> Result<Self, JamError> {
        let value: Value =
            serde_json::from_str(content).map_err(|e| JamError::state("document", e.to_string()))?;
        let Value::Object(mut map) = value else {
            return Err(JamError::state("document", "expected a JSON object"));
        };

        let version = document_version(&map)?;
        if version > CURRENT_VERSION {
            return Err(JamError::state(
                "version",
                format!("unsupported version {}, newest known is {}", version, CURRENT_VERSION),
            ));
        }
        if version < 2 {
            debug!("upgrading version {} jam state", version);
            upgrade_v1(&mut map);
        }

        let defaults = JamState::default();
        let scale = match field::<String>(&map, "scale")? {
            Some(name) => name.parse().map_err(|e: String| JamError::state("scale", e))?,
            None => defaults.scale,
        };
        let mut mix = defaults.mix.clone();
        if let Some(entries) = field::<MixSettings>(&map, "mix")? {
            mix.extend(entries);
        }

        let state = JamState {
            version: CURRENT_VERSION,
            progression: field(&map, "progression")?.unwrap_or(defaults.progression),
            bpm: field(&map, "bpm")?.unwrap_or(defaults.bpm),
            key: field(&map, "key")?.unwrap_or(defaults.key),
            scale,
            drum_pattern: field(&map, "drumPattern")?.unwrap_or(defaults.drum_pattern),
            mix,
            synth: field(&map, "synth")?.unwrap_or(defaults.synth),
            arpeggiator: field(&map, "arpeggiator")?.unwrap_or(defaults.arpeggiator),
            harmony: field(&map, "harmony")?,
            voicing: field(&map, "voicing")?.unwrap_or(defaults.voicing),
            loop_count: field(&map, "loopCount")?,
        };
        state.validate()?;
        Ok(state)
    }

    pub fn to_json(&self) -> Result<String, JamError> {
        serde_json::to_string_pretty(self).map_err(|e| JamError::state("document", e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, JamError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let state = Self::from_json(&content)?;
        info!("loaded jam state from {}", path.display());
        Ok(state)
    }

    /// Write the document, creating parent directories as needed
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), JamError> {
        let path = path.as_ref();
        let json = self.to_json()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;
        info!("saved jam state to {}", path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<(), JamError> {
        if self.progression.is_empty() {
            return Err(JamError::state("progression", "must contain at least one chord"));
        }
        if !(self.bpm >= MIN_BPM && self.bpm <= MAX_BPM) {
            return Err(JamError::state(
                "bpm",
                format!("must be between {} and {}, got {}", MIN_BPM, MAX_BPM, self.bpm),
            ));
        }
        if parse_note_name(&self.key).is_none() {
            return Err(JamError::state("key", format!("'{}' is not a note name", self.key)));
        }
        if let PatternRef::Inline(pattern) = &self.drum_pattern {
            if pattern.is_empty() {
                return Err(JamError::state("drumPattern", format!("pattern '{}' has no steps", pattern.name)));
            }
        }
        for (voice, mix) in &self.mix {
            mix.validate().map_err(in_field(&format!("mix.{}", voice_key(*voice))))?;
        }
        self.synth.validate().map_err(in_field("synth"))?;
        self.arpeggiator.validate().map_err(in_field("arpeggiator"))?;
        if self.loop_count == Some(0) {
            return Err(JamError::state("loopCount", "must be at least 1"));
        }
        Ok(())
    }

    /// Build a playback session, resolving the drum pattern by name
    pub fn to_session(&self, store: &DrumPatternStore) -> Result<PlaybackSession, JamError> {
        let pattern = self.drum_pattern.resolve(store)?;
        let mut session = PlaybackSession::new(self.progression.iter().cloned(), pattern, clamp_bpm(self.bpm))
            .with_voicing(self.voicing)
            .with_arpeggiator(self.arpeggiator);
        session.harmony = self.harmony;
        session.loop_target = self.loop_count;
        session.mix = self.mix.clone();
        session.synth = self.synth;
        Ok(session)
    }
}

fn document_version(map: &Map<String, Value>) -> Result<u32, JamError> {
    match map.get("version") {
        Some(v) => v
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| JamError::state("version", format!("expected a whole number, got {}", v))),
        None if LEGACY_FIELDS.iter().any(|f| map.contains_key(*f)) => Ok(1),
        None => Ok(CURRENT_VERSION),
    }
}

fn upgrade_v1(map: &mut Map<String, Value>) {
    if let Some(tempo) = map.remove("tempo") {
        map.entry("bpm").or_insert(tempo);
    }
    if let Some(pattern) = map.remove("pattern") {
        map.entry("drumPattern").or_insert(pattern);
    }

    let mut mix = Map::new();
    for (old, voice) in [("chordVolume", "chords"), ("bassVolume", "bass"), ("drumVolume", "drums")] {
        if let Some(volume) = map.remove(old) {
            mix.insert(voice.to_string(), json!({ "volume": volume }));
        }
    }
    if !mix.is_empty() {
        map.entry("mix").or_insert(Value::Object(mix));
    }
    map.insert("version".to_string(), json!(CURRENT_VERSION));
}

/// Deserialize one optional field, naming it in the error
fn field<T: DeserializeOwned>(map: &Map<String, Value>, name: &str) -> Result<Option<T>, JamError> {
    match map.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|e| JamError::state(name, e.to_string())),
    }
}

fn in_field(name: &str) -> impl FnOnce(JamError) -> JamError + '_ {
    move |e| match e {
        JamError::Validation(message) => JamError::state(name, message),
        other => other,
    }
}

fn voice_key(voice: Voice) -> String {
    serde_json::to_value(voice)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| format!("{:?}", voice))
}
