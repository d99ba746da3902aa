//! Contract for the external progression generator
//!
//! The generator turns a free-text prompt ("moody minor ballad") into a key,
//! a scale and eight chords. It is a remote service, so its answer is treated
//! as untrusted text: [`parse_generated`] checks every field before anything
//! else sees it, and any problem is a retriable
//! [`JamError::MalformedResponse`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::JamError;
use crate::theory::{ChordTheory, Scale};

/// Number of chords a generated progression must have
pub const PROGRESSION_LENGTH: usize = 8;

/// Key names the generator may answer with
pub const ALLOWED_KEYS: [&str; 17] = [
    "C", "C#", "Db", "D", "D#", "Eb", "E", "F", "F#", "Gb", "G", "G#", "Ab", "A", "A#", "Bb", "B",
];

#[async_trait]
pub trait ProgressionGenerator: Send + Sync {
    /// Send the prompt and return the raw response body
    async fn generate(&self, prompt: &str) -> Result<String, JamError>;
}

/// A validated generator answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedProgression {
    pub key: String,
    pub scale: Scale,
    pub progression: Vec<String>,
}

#[derive(Deserialize)]
struct RawResponse {
    key: String,
    scale: String,
    progression: Vec<String>,
}

/// Validate a raw generator response.
///
/// Accepts the JSON object on its own or wrapped in a Markdown code fence.
pub fn parse_generated(raw: &str) -> Result<GeneratedProgression, JamError> {
    let body = strip_code_fence(raw);
    let response: RawResponse = serde_json::from_str(body)
        .map_err(|e| JamError::MalformedResponse(format!("not a progression object: {}", e)))?;

    let key = response.key.trim();
    if !ALLOWED_KEYS.contains(&key) {
        return Err(JamError::MalformedResponse(format!("unknown key '{}'", response.key)));
    }

    let scale = match response.scale.trim().to_lowercase().as_str() {
        "major" => Scale::Major,
        "minor" => Scale::Minor,
        _ => {
            return Err(JamError::MalformedResponse(format!(
                "scale must be Major or Minor, got '{}'",
                response.scale
            )))
        }
    };

    if response.progression.len() != PROGRESSION_LENGTH {
        return Err(JamError::MalformedResponse(format!(
            "expected {} chords, got {}",
            PROGRESSION_LENGTH,
            response.progression.len()
        )));
    }

    let theory = ChordTheory::new();
    let progression: Vec<String> = response.progression.iter().map(|c| c.trim().to_string()).collect();
    for (i, chord) in progression.iter().enumerate() {
        if theory.root_pitch_class(chord).is_none() {
            return Err(JamError::MalformedResponse(format!(
                "chord {} ('{}') has no valid root",
                i + 1,
                chord
            )));
        }
    }

    Ok(GeneratedProgression {
        key: key.to_string(),
        scale,
        progression,
    })
}

/// Ask the generator and validate its answer
pub async fn request_progression(
    generator: &dyn ProgressionGenerator,
    prompt: &str,
) -> Result<GeneratedProgression, JamError> {
    debug!("requesting progression for prompt {:?}", prompt);
    let raw = generator.generate(prompt).await?;
    parse_generated(&raw).inspect_err(|e| warn!("discarding generator response: {}", e))
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // drop the info string ("json") on the opening line
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}
