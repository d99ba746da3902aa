//! # Audio Module
//!
//! Owns the audio-node graph and the transport clock.
//!
//! ## Sub-modules
//! - `types` - Voices, channel mix, synth presets
//! - `backend` - [`AudioBackend`] trait, the boundary to the sound library
//! - `offline` - [`OfflineBackend`], a recording backend for tests and dry runs
//! - `transport` - Beat-positioned event queue
//! - `graph` - Graph lifecycle: init, teardown, emergency reset
//!
//! ## Graph Layout
//! ```text
//! chords synth  ──► chords channel ──┬──► reverb ──┐
//!                                    ├──► chorus ──┤
//!                                    └─────────────┼──► limiter
//! bass/harmony/click synths ──► own channel ───────┤
//! kick/snare/hihat ──────────► drums channel ──────┘
//! ```

mod backend;
mod graph;
mod offline;
mod transport;
mod types;

pub use backend::{AudioBackend, BackendError, NodeId, NodeSpec, Param};
pub use graph::{
    AudioGraph, AudioGraphHandle, DrumKitKind, GraphState, ResetOutcome, TeardownFailure, TeardownReport,
};
pub use offline::{Fault, OfflineBackend, TriggerRecord, TriggerTarget};
pub use transport::{clamp_bpm, ScheduledEvent, SessionId, Track, Transport, TransportEvent, MAX_BPM, MIN_BPM};
pub use types::{
    default_mix, ChannelMix, Envelope, Filter, MixSettings, Oscillator, SynthConfig, Voice, Waveform,
};
