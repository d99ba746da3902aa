//! # Drum Patterns
//!
//! Fixed-length eighth-note step patterns. Six patterns are built in; users can
//! add their own under any other name.
//!
//! Patterns are cyclic: step `i` of playback reads `steps[i % len]`, so a
//! pattern shorter than the progression simply repeats.
//!
//! ## Example
//! ```rust
//! use jam::drums::DrumPatternStore;
//!
//! let store = DrumPatternStore::new();
//! let rock = store.get("Basic Rock").unwrap();
//! assert_eq!(rock.len(), 16);
//! assert!(rock.step(0).unwrap().kick);
//! assert!(rock.step(16).unwrap().kick); // wraps
//! ```

use serde::{Deserialize, Serialize};

use crate::error::JamError;

/// Steps in every built-in pattern (two bars of eighths)
pub const BUILTIN_STEPS: usize = 16;

/// One drum voice of the kit
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DrumHit {
    Kick,
    Snare,
    Hihat,
}

impl DrumHit {
    pub const ALL: [DrumHit; 3] = [DrumHit::Kick, DrumHit::Snare, DrumHit::Hihat];

    /// General MIDI percussion note
    pub fn midi_note(self) -> u8 {
        match self {
            DrumHit::Kick => 36,
            DrumHit::Snare => 38,
            DrumHit::Hihat => 42,
        }
    }

    pub fn velocity(self) -> u8 {
        match self {
            DrumHit::Kick => 100,
            DrumHit::Snare => 110,
            DrumHit::Hihat => 70,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DrumHit::Kick => "kick",
            DrumHit::Snare => "snare",
            DrumHit::Hihat => "hihat",
        }
    }
}

/// Which drums sound on one step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrumStep {
    pub kick: bool,
    pub snare: bool,
    pub hihat: bool,
}

impl DrumStep {
    pub fn is_silent(&self) -> bool {
        !(self.kick || self.snare || self.hihat)
    }

    pub fn has(&self, hit: DrumHit) -> bool {
        match hit {
            DrumHit::Kick => self.kick,
            DrumHit::Snare => self.snare,
            DrumHit::Hihat => self.hihat,
        }
    }

    /// Active drums in kick, snare, hihat order
    pub fn hits(&self) -> impl Iterator<Item = DrumHit> + '_ {
        DrumHit::ALL.into_iter().filter(|hit| self.has(*hit))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrumPattern {
    pub name: String,
    pub steps: Vec<Option<DrumStep>>,
}

impl DrumPattern {
    pub fn new(name: impl Into<String>, steps: Vec<Option<DrumStep>>) -> Self {
        Self {
            name: name.into(),
            steps,
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Step at a playback position, wrapping around the pattern
    pub fn step(&self, index: usize) -> Option<DrumStep> {
        if self.steps.is_empty() {
            return None;
        }
        self.steps[index % self.steps.len()].filter(|s| !s.is_silent())
    }

    /// True when no step sounds anything
    pub fn is_silent(&self) -> bool {
        self.steps.iter().all(|s| s.map_or(true, |s| s.is_silent()))
    }
}

/// Build steps from three `x`/`.` lanes of equal length
fn grid(kick: &str, snare: &str, hihat: &str) -> Vec<Option<DrumStep>> {
    kick.chars()
        .zip(snare.chars())
        .zip(hihat.chars())
        .map(|((k, s), h)| {
            let step = DrumStep {
                kick: k == 'x',
                snare: s == 'x',
                hihat: h == 'x',
            };
            (!step.is_silent()).then_some(step)
        })
        .collect()
}

fn builtin_patterns() -> Vec<DrumPattern> {
    vec![
        DrumPattern::new(
            "Basic Rock",
            grid("x...x...x...xx..", "..x...x...x...x.", "xxxxxxxxxxxxxxxx"),
        ),
        DrumPattern::new(
            "Four on the Floor",
            grid("x.x.x.x.x.x.x.x.", "..x...x...x...x.", ".x.x.x.x.x.x.x.x"),
        ),
        DrumPattern::new(
            "Hip Hop",
            grid("x..x.x..x..x..x.", "..x...x...x...x.", "xxxxxxxxxxxxxxxx"),
        ),
        DrumPattern::new(
            "Bossa Nova",
            grid("x..xx..xx..xx..x", "x..x..x...x..x..", "xxxxxxxxxxxxxxxx"),
        ),
        DrumPattern::new(
            "Half Time",
            grid("x.......x..x....", "....x.......x...", "x.x.x.x.x.x.x.x."),
        ),
        DrumPattern::new("None", vec![None; BUILTIN_STEPS]),
    ]
}

/// Built-in plus user-defined patterns, looked up by name
#[derive(Debug, Clone)]
pub struct DrumPatternStore {
    builtins: Vec<DrumPattern>,
    user: Vec<DrumPattern>,
}

impl Default for DrumPatternStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DrumPatternStore {
    pub fn new() -> Self {
        Self {
            builtins: builtin_patterns(),
            user: Vec::new(),
        }
    }

    pub fn is_builtin(&self, name: &str) -> bool {
        self.builtins.iter().any(|p| p.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&DrumPattern> {
        self.builtins
            .iter()
            .chain(self.user.iter())
            .find(|p| p.name == name)
    }

    /// All pattern names, built-ins first
    pub fn names(&self) -> Vec<&str> {
        self.builtins
            .iter()
            .chain(self.user.iter())
            .map(|p| p.name.as_str())
            .collect()
    }

    /// Add a user pattern, replacing any user pattern with the same name
    pub fn add(&mut self, pattern: DrumPattern) -> Result<(), JamError> {
        if pattern.name.trim().is_empty() {
            return Err(JamError::Validation("drum pattern name is empty".to_string()));
        }
        if pattern.is_empty() {
            return Err(JamError::Validation(format!(
                "drum pattern '{}' has no steps",
                pattern.name
            )));
        }
        if self.is_builtin(&pattern.name) {
            return Err(JamError::Validation(format!(
                "'{}' is a built-in pattern and cannot be replaced",
                pattern.name
            )));
        }

        match self.user.iter_mut().find(|p| p.name == pattern.name) {
            Some(existing) => *existing = pattern,
            None => self.user.push(pattern),
        }
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<DrumPattern, JamError> {
        if self.is_builtin(name) {
            return Err(JamError::Validation(format!(
                "'{}' is a built-in pattern and cannot be removed",
                name
            )));
        }
        let index = self
            .user
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| JamError::Validation(format!("no drum pattern named '{}'", name)))?;
        Ok(self.user.remove(index))
    }
}
