//! # Playback Module
//!
//! Schedule a chord progression onto the shared transport and play it through
//! the audio graph.
//!
//! ## Purpose
//! This module drives four bar-synchronized tracks from one clock:
//! 1. **Chords** - voiced chords, or arpeggio steps when the arpeggiator is on
//! 2. **Bass** - chord roots, two octaves below the voicing
//! 3. **Harmony** - an optional interval line above each root
//! 4. **Drums** - the drum pattern on an eighth-note grid
//!
//! ## Sub-modules
//! - `types` - PlaybackSession, ArpConfig, HarmonyInterval
//! - `engine` - PlaybackScheduler, the dispatch loop
//! - `arpeggiator` - note orders for the arpeggiator
//!
//! ## Key Types
//! - [`PlaybackSession`] - Progression, pattern, tempo and per-track options
//! - [`PlaybackScheduler`] - Starts/stops sessions, dispatches transport events
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use jam::audio::{AudioGraphHandle, OfflineBackend};
//! use jam::config::EngineConfig;
//! use jam::drums::DrumPatternStore;
//! use jam::playback::{PlaybackScheduler, PlaybackSession};
//!
//! # tokio_test_runtime(async {
//! let graph = AudioGraphHandle::new(Arc::new(OfflineBackend::new()), EngineConfig::default());
//! graph.init().await.unwrap();
//!
//! let pattern = DrumPatternStore::new().get("Basic Rock").unwrap().clone();
//! let mut scheduler = PlaybackScheduler::new(graph);
//! assert!(scheduler.start(PlaybackSession::new(["C", "Am", "F", "G"], pattern, 120.0), None));
//!
//! scheduler.advance(2.0); // one bar at 120 bpm
//! assert_eq!(scheduler.current_chord(), Some(1));
//! # });
//! # fn tokio_test_runtime(f: impl std::future::Future<Output = ()>) {
//! #     tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap().block_on(f)
//! # }
//! ```
//!
//! ## Timing
//!
//! Positions are in beats. [`PlaybackScheduler::advance`] converts elapsed
//! seconds to beats at the current tempo, so a tempo change only affects what
//! has not happened yet. Within one beat position, events dispatch in track
//! order: chord, bass, harmony, drums.
//!
//! ## Looping
//!
//! With a loop target of N the scheduler counts passes through bar zero. When
//! pass N+1 would start, all tracks stop and the completion callback runs
//! once, after the dispatch pass that detected it.

mod arpeggiator;
mod engine;
mod types;

#[cfg(test)]
mod tests;

pub use arpeggiator::arp_sequence;
pub use engine::{BarCallback, CompletionCallback, CountInCallback, PlaybackScheduler};
pub use types::{ArpConfig, ArpDirection, ArpRate, HarmonyInterval, PlaybackSession, BEATS_PER_BAR};
