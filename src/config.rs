//! Engine configuration
//!
//! Timing and lifecycle constants, read from a kebab-case YAML file. Every key
//! is optional:
//!
//! ```yaml
//! sample-load-timeout-ms: 2000
//! reset-settle-ms: 150
//! tick-interval-ms: 10
//! count-in-beats: 4
//! training-loops: 2
//! limiter-threshold-db: -1.0
//! drum-samples:
//!   kick: samples/kick.wav
//!   snare: samples/snare.wav
//!   hihat: samples/hihat.wav
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::drums::DrumHit;
use crate::error::JamError;

/// Sample files for the drum kit
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DrumSamples {
    pub kick: PathBuf,
    pub snare: PathBuf,
    pub hihat: PathBuf,
}

impl DrumSamples {
    pub fn path(&self, hit: DrumHit) -> &Path {
        match hit {
            DrumHit::Kick => &self.kick,
            DrumHit::Snare => &self.snare,
            DrumHit::Hihat => &self.hihat,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Budget for loading all drum samples before falling back to synth drums
    pub sample_load_timeout: Duration,
    /// Pause between teardown and rebuild during a reset
    pub reset_settle: Duration,
    /// Wall-clock tick of the realtime transport driver
    pub tick_interval: Duration,
    pub count_in_beats: u32,
    /// Loops played per training cycle
    pub training_loops: u32,
    /// `None` means synthesized drums only
    pub drum_samples: Option<DrumSamples>,
    pub limiter_threshold_db: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_load_timeout: Duration::from_millis(2000),
            reset_settle: Duration::from_millis(150),
            tick_interval: Duration::from_millis(10),
            count_in_beats: 4,
            training_loops: 2,
            drum_samples: None,
            limiter_threshold_db: -1.0,
        }
    }
}

/// Raw configuration for YAML deserialization
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct RawEngineConfig {
    sample_load_timeout_ms: Option<u64>,
    reset_settle_ms: Option<u64>,
    tick_interval_ms: Option<u64>,
    count_in_beats: Option<u32>,
    training_loops: Option<u32>,
    drum_samples: Option<DrumSamples>,
    limiter_threshold_db: Option<f32>,
}

impl EngineConfig {
    pub fn from_yaml(content: &str) -> Result<Self, JamError> {
        // an empty document is valid and means "all defaults"
        let raw: RawEngineConfig = if content.trim().is_empty() {
            RawEngineConfig::default()
        } else {
            serde_yaml::from_str(content).map_err(|e| JamError::Config(e.to_string()))?
        };

        let defaults = EngineConfig::default();

        let tick_interval = match raw.tick_interval_ms {
            Some(0) => return Err(JamError::Config("tick-interval-ms must be > 0".to_string())),
            Some(ms) => Duration::from_millis(ms),
            None => defaults.tick_interval,
        };

        let count_in_beats = raw.count_in_beats.unwrap_or(defaults.count_in_beats);
        if count_in_beats == 0 {
            return Err(JamError::Config("count-in-beats must be > 0".to_string()));
        }

        let training_loops = raw.training_loops.unwrap_or(defaults.training_loops);
        if training_loops == 0 {
            return Err(JamError::Config("training-loops must be > 0".to_string()));
        }

        let limiter_threshold_db = raw.limiter_threshold_db.unwrap_or(defaults.limiter_threshold_db);
        if !(limiter_threshold_db <= 0.0) {
            return Err(JamError::Config(format!(
                "limiter-threshold-db must be <= 0, got {}",
                limiter_threshold_db
            )));
        }

        Ok(EngineConfig {
            sample_load_timeout: raw
                .sample_load_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.sample_load_timeout),
            reset_settle: raw
                .reset_settle_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.reset_settle),
            tick_interval,
            count_in_beats,
            training_loops,
            drum_samples: raw.drum_samples,
            limiter_threshold_db,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, JamError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }
}
