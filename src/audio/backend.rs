//! Boundary to the sound-producing library

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use super::types::{SynthConfig, Voice};
use crate::drums::DrumHit;

/// Opaque handle to a node created by a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// What to build
#[derive(Debug, Clone, PartialEq)]
pub enum NodeSpec {
    /// Polyphonic synth for a pitched voice
    Synth { voice: Voice, config: SynthConfig },
    /// Synthesized drum (fallback kit)
    SynthDrum { hit: DrumHit },
    /// Gain + pan strip for one voice
    Channel { voice: Voice },
    Reverb { decay: f32, wet: f32 },
    Chorus { frequency: f32, depth: f32, wet: f32 },
    Limiter { threshold_db: f32 },
}

impl NodeSpec {
    /// Short name for logs
    pub fn label(&self) -> String {
        match self {
            NodeSpec::Synth { voice, .. } => format!("{:?} synth", voice),
            NodeSpec::SynthDrum { hit } => format!("{} (synth)", hit.name()),
            NodeSpec::Channel { voice } => format!("{:?} channel", voice),
            NodeSpec::Reverb { .. } => "reverb".to_string(),
            NodeSpec::Chorus { .. } => "chorus".to_string(),
            NodeSpec::Limiter { .. } => "limiter".to_string(),
        }
    }
}

/// Runtime parameter change on an existing node
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Gain(f32),
    Pan(f32),
    Synth(SynthConfig),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("{0} does not exist")]
    UnknownNode(NodeId),

    #[error("{0} was already disposed")]
    AlreadyDisposed(NodeId),

    #[error("failed to load sample '{path}': {reason}")]
    SampleLoad { path: PathBuf, reason: String },

    #[error("audio context error: {0}")]
    Context(String),
}

/// Node-graph operations the engine needs from an audio library.
///
/// Node creation, sample loading and context suspend/resume may wait on the
/// audio thread; everything the scheduler calls while dispatching is
/// synchronous.
#[async_trait]
pub trait AudioBackend: Send + Sync {
    async fn create(&self, spec: NodeSpec) -> Result<NodeId, BackendError>;

    /// Load a drum sample into a player node
    async fn load_sample(&self, hit: DrumHit, path: PathBuf) -> Result<NodeId, BackendError>;

    fn dispose(&self, node: NodeId) -> Result<(), BackendError>;

    fn connect(&self, from: NodeId, to: NodeId) -> Result<(), BackendError>;

    fn set_param(&self, node: NodeId, param: Param) -> Result<(), BackendError>;

    /// Play `notes` now and release them after `duration_secs`
    fn trigger(
        &self,
        node: NodeId,
        notes: &[u8],
        velocity: u8,
        duration_secs: f64,
    ) -> Result<(), BackendError>;

    /// Release every sounding note on a node
    fn release_all(&self, node: NodeId) -> Result<(), BackendError>;

    async fn suspend(&self) -> Result<(), BackendError>;

    async fn resume(&self) -> Result<(), BackendError>;
}
