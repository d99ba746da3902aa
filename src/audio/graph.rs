//! Audio graph lifecycle: init, teardown and emergency reset
//!
//! [`AudioGraphHandle`] is the only thing that builds or destroys nodes. The
//! scheduler and training controller hold clones of the handle and go through
//! [`AudioGraph`] (behind the handle's lock) to trigger notes.
//!
//! ## Reset protocol
//! 1. Raise the reset guard (a second reset while one runs is ignored)
//! 2. Stop the transport and cancel every pending event
//! 3. Suspend the audio context
//! 4. Dispose nodes bottom-up: instruments, then mixer channels and effects
//! 5. Wait the settle delay
//! 6. Rebuild the graph and re-apply mix and synth settings
//! 7. Resume the context (failure here is fatal)
//!
//! The guard is RAII, so it also drops if the reset future is cancelled.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use super::backend::{AudioBackend, BackendError, NodeId, NodeSpec, Param};
use super::transport::Transport;
use super::types::{default_mix, ChannelMix, MixSettings, SynthConfig, Voice};
use crate::config::EngineConfig;
use crate::drums::DrumHit;
use crate::error::JamError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphState {
    Uninitialized,
    Initialized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrumKitKind {
    Sampled,
    Synthesized,
}

#[derive(Debug)]
struct DrumKit {
    kind: DrumKitKind,
    nodes: BTreeMap<DrumHit, NodeId>,
}

/// Every node of an initialized graph
#[derive(Debug)]
struct GraphNodes {
    synths: BTreeMap<Voice, NodeId>,
    drums: DrumKit,
    channels: BTreeMap<Voice, NodeId>,
    reverb: NodeId,
    chorus: NodeId,
    limiter: NodeId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TeardownFailure {
    pub node: NodeId,
    pub label: String,
    pub error: BackendError,
}

/// Outcome of disposing a graph; failures were logged and skipped
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TeardownReport {
    pub disposed: usize,
    pub failures: Vec<TeardownFailure>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn dispose(&mut self, backend: &dyn AudioBackend, node: NodeId, label: String) {
        match backend.dispose(node) {
            Ok(()) => self.disposed += 1,
            Err(error) => {
                warn!("teardown: failed to dispose {} ({}): {}", label, node, error);
                self.failures.push(TeardownFailure { node, label, error });
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResetOutcome {
    Completed(TeardownReport),
    /// Another reset was already running; nothing was done
    AlreadyRunning,
}

/// The node graph plus the settings re-applied whenever it is rebuilt
pub struct AudioGraph {
    backend: Arc<dyn AudioBackend>,
    nodes: Option<GraphNodes>,
    transport: Transport,
    mix: MixSettings,
    synth: SynthConfig,
}

impl AudioGraph {
    fn new(backend: Arc<dyn AudioBackend>) -> Self {
        Self {
            backend,
            nodes: None,
            transport: Transport::default(),
            mix: default_mix(),
            synth: SynthConfig::default(),
        }
    }

    pub fn state(&self) -> GraphState {
        if self.nodes.is_some() {
            GraphState::Initialized
        } else {
            GraphState::Uninitialized
        }
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut Transport {
        &mut self.transport
    }

    pub fn drum_kit(&self) -> Option<DrumKitKind> {
        self.nodes.as_ref().map(|n| n.drums.kind)
    }

    pub fn mix(&self) -> &MixSettings {
        &self.mix
    }

    pub fn channel_mix(&self, voice: Voice) -> ChannelMix {
        self.mix.get(&voice).copied().unwrap_or_default()
    }

    /// Store a channel's mix and apply it to the live channel, if any
    pub fn set_mix(&mut self, voice: Voice, mix: ChannelMix) -> Result<(), JamError> {
        mix.validate()?;
        self.mix.insert(voice, mix);
        if let Some(channel) = self.nodes.as_ref().and_then(|n| n.channels.get(&voice)) {
            apply_mix(self.backend.as_ref(), *channel, mix);
        }
        Ok(())
    }

    pub fn synth_config(&self) -> SynthConfig {
        self.synth
    }

    /// Store the chord/harmony synth sound and apply it to the live synths
    pub fn set_synth_config(&mut self, config: SynthConfig) -> Result<(), JamError> {
        config.validate()?;
        self.synth = config;
        if let Some(nodes) = &self.nodes {
            for voice in [Voice::Chords, Voice::Harmony] {
                if let Some(node) = nodes.synths.get(&voice) {
                    if let Err(e) = self.backend.set_param(*node, Param::Synth(config)) {
                        warn!("failed to update {:?} synth: {}", voice, e);
                    }
                }
            }
        }
        Ok(())
    }

    /// Play notes on a pitched voice. Returns false when nothing sounded.
    pub fn play(&self, voice: Voice, notes: &[u8], velocity: u8, duration_secs: f64) -> bool {
        let Some(node) = self.nodes.as_ref().and_then(|n| n.synths.get(&voice)) else {
            return false;
        };
        if notes.is_empty() {
            return false;
        }
        match self.backend.trigger(*node, notes, velocity, duration_secs) {
            Ok(()) => true,
            Err(e) => {
                warn!("{:?} trigger failed: {}", voice, e);
                false
            }
        }
    }

    pub fn play_drum(&self, hit: DrumHit, duration_secs: f64) -> bool {
        let Some(node) = self.nodes.as_ref().and_then(|n| n.drums.nodes.get(&hit)) else {
            return false;
        };
        match self
            .backend
            .trigger(*node, &[hit.midi_note()], hit.velocity(), duration_secs)
        {
            Ok(()) => true,
            Err(e) => {
                warn!("{} trigger failed: {}", hit.name(), e);
                false
            }
        }
    }

    /// Release every sounding note on every instrument
    pub fn release_all(&self) {
        let Some(nodes) = &self.nodes else {
            return;
        };
        for node in nodes.synths.values().chain(nodes.drums.nodes.values()) {
            if let Err(e) = self.backend.release_all(*node) {
                debug!("release on {} failed: {}", node, e);
            }
        }
    }

    /// Dispose every node, bottom-up, logging and skipping failures
    fn teardown(&mut self) -> TeardownReport {
        let mut report = TeardownReport::default();
        let Some(nodes) = self.nodes.take() else {
            return report;
        };
        let backend = self.backend.as_ref();

        for (voice, node) in &nodes.synths {
            if let Err(e) = backend.release_all(*node) {
                debug!("release on {:?} synth failed: {}", voice, e);
            }
        }

        for (voice, node) in nodes.synths {
            report.dispose(backend, node, format!("{:?} synth", voice));
        }
        for (hit, node) in nodes.drums.nodes {
            report.dispose(backend, node, format!("{} drum", hit.name()));
        }
        for (voice, node) in nodes.channels {
            report.dispose(backend, node, format!("{:?} channel", voice));
        }
        report.dispose(backend, nodes.chorus, "chorus".to_string());
        report.dispose(backend, nodes.reverb, "reverb".to_string());
        report.dispose(backend, nodes.limiter, "limiter".to_string());

        info!(
            "audio graph disposed: {} nodes, {} failures",
            report.disposed,
            report.failures.len()
        );
        report
    }
}

fn apply_mix(backend: &dyn AudioBackend, channel: NodeId, mix: ChannelMix) {
    if let Err(e) = backend
        .set_param(channel, Param::Gain(mix.volume))
        .and_then(|_| backend.set_param(channel, Param::Pan(mix.pan)))
    {
        warn!("failed to apply mix to {}: {}", channel, e);
    }
}

/// Clears the reset flag when dropped
struct ResetGuard<'a>(&'a AtomicBool);

impl<'a> ResetGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ResetGuard(flag))
    }
}

impl Drop for ResetGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct Shared {
    graph: Mutex<AudioGraph>,
    backend: Arc<dyn AudioBackend>,
    config: EngineConfig,
    resetting: AtomicBool,
    lifecycle: tokio::sync::Mutex<()>,
}

/// Shared handle to the audio graph
#[derive(Clone)]
pub struct AudioGraphHandle {
    shared: Arc<Shared>,
}

impl AudioGraphHandle {
    pub fn new(backend: Arc<dyn AudioBackend>, config: EngineConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                graph: Mutex::new(AudioGraph::new(backend.clone())),
                backend,
                config,
                resetting: AtomicBool::new(false),
                lifecycle: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    /// Lock the graph. Never hold the guard across an await.
    pub fn lock(&self) -> MutexGuard<'_, AudioGraph> {
        self.shared.graph.lock()
    }

    pub fn is_resetting(&self) -> bool {
        self.shared.resetting.load(Ordering::Acquire)
    }

    pub fn is_initialized(&self) -> bool {
        self.lock().state() == GraphState::Initialized
    }

    /// Build the graph. Calling it on an initialized graph does nothing.
    pub async fn init(&self) -> Result<(), JamError> {
        let _lifecycle = self.shared.lifecycle.lock().await;
        self.init_locked().await
    }

    async fn init_locked(&self) -> Result<(), JamError> {
        if self.is_initialized() {
            debug!("audio graph already initialized");
            return Ok(());
        }

        let (mix, synth) = {
            let graph = self.lock();
            (graph.mix.clone(), graph.synth)
        };

        let backend = self.shared.backend.as_ref();
        let mut created = Vec::new();
        match build_nodes(backend, &self.shared.config, &mix, synth, &mut created).await {
            Ok(nodes) => {
                let kit = nodes.drums.kind;
                self.lock().nodes = Some(nodes);
                info!("audio graph initialized ({} nodes, {:?} drums)", created.len(), kit);
                Ok(())
            }
            Err(e) => {
                for node in created.into_iter().rev() {
                    if let Err(err) = backend.dispose(node) {
                        warn!("rollback: failed to dispose {}: {}", node, err);
                    }
                }
                Err(JamError::Engine(format!("failed to build audio graph: {}", e)))
            }
        }
    }

    /// Tear the graph down. The transport keeps its position; pending events
    /// are left to their owners to cancel.
    pub fn dispose(&self) -> TeardownReport {
        self.lock().teardown()
    }

    /// Emergency reset: tear everything down and rebuild from scratch.
    ///
    /// Returns [`ResetOutcome::AlreadyRunning`] if another reset holds the guard.
    /// A context that refuses to resume is fatal ([`JamError::Engine`]).
    pub async fn reset(&self) -> Result<ResetOutcome, JamError> {
        let Some(_guard) = ResetGuard::acquire(&self.shared.resetting) else {
            warn!("audio reset already in progress, ignoring request");
            return Ok(ResetOutcome::AlreadyRunning);
        };
        let _lifecycle = self.shared.lifecycle.lock().await;

        info!("audio reset: stopping transport");
        {
            let mut graph = self.lock();
            graph.transport.stop();
            let cancelled = graph.transport.cancel_all();
            debug!("audio reset: cancelled {} pending events", cancelled);
            graph.release_all();
        }

        if let Err(e) = self.shared.backend.suspend().await {
            warn!("audio reset: suspend failed, continuing: {}", e);
        }

        info!("audio reset: disposing graph");
        let report = self.dispose();

        tokio::time::sleep(self.shared.config.reset_settle).await;

        info!("audio reset: rebuilding graph");
        self.init_locked().await?;

        self.shared
            .backend
            .resume()
            .await
            .map_err(|e| JamError::Engine(format!("audio context failed to resume: {}", e)))?;

        info!("audio reset complete");
        Ok(ResetOutcome::Completed(report))
    }

    /// Finish what an abandoned [`reset`](Self::reset) left undone: rebuild
    /// the graph if it was torn down and resume the context.
    pub async fn recover(&self) -> Result<(), JamError> {
        let _lifecycle = self.shared.lifecycle.lock().await;
        if !self.is_initialized() {
            info!("audio recovery: rebuilding graph");
            tokio::time::sleep(self.shared.config.reset_settle).await;
            self.init_locked().await?;
        }
        self.shared
            .backend
            .resume()
            .await
            .map_err(|e| JamError::Engine(format!("audio context failed to resume: {}", e)))
    }
}

async fn build_nodes(
    backend: &dyn AudioBackend,
    config: &EngineConfig,
    mix: &MixSettings,
    synth: SynthConfig,
    created: &mut Vec<NodeId>,
) -> Result<GraphNodes, BackendError> {
    let limiter = backend
        .create(NodeSpec::Limiter {
            threshold_db: config.limiter_threshold_db,
        })
        .await?;
    created.push(limiter);

    let reverb = backend.create(NodeSpec::Reverb { decay: 2.5, wet: 0.25 }).await?;
    created.push(reverb);
    let chorus = backend
        .create(NodeSpec::Chorus {
            frequency: 1.5,
            depth: 0.4,
            wet: 0.2,
        })
        .await?;
    created.push(chorus);
    backend.connect(reverb, limiter)?;
    backend.connect(chorus, limiter)?;

    let mut channels = BTreeMap::new();
    for voice in Voice::ALL {
        let channel = backend.create(NodeSpec::Channel { voice }).await?;
        created.push(channel);
        backend.connect(channel, limiter)?;
        apply_mix(backend, channel, mix.get(&voice).copied().unwrap_or_default());
        channels.insert(voice, channel);
    }
    // Only the chord bed goes through the shared effects
    if let Some(chords) = channels.get(&Voice::Chords) {
        backend.connect(*chords, reverb)?;
        backend.connect(*chords, chorus)?;
    }

    let mut synths = BTreeMap::new();
    for voice in Voice::SYNTHS {
        let preset = match voice {
            Voice::Bass => SynthConfig::bass(),
            Voice::Click => SynthConfig::click(),
            _ => synth,
        };
        let node = backend.create(NodeSpec::Synth { voice, config: preset }).await?;
        created.push(node);
        if let Some(channel) = channels.get(&voice) {
            backend.connect(node, *channel)?;
        }
        synths.insert(voice, node);
    }

    let drums = load_drum_kit(backend, config, created).await?;
    if let Some(channel) = channels.get(&Voice::Drums) {
        for node in drums.nodes.values() {
            backend.connect(*node, *channel)?;
        }
    }

    Ok(GraphNodes {
        synths,
        drums,
        channels,
        reverb,
        chorus,
        limiter,
    })
}

/// Load the sampled kit within the configured timeout, or fall back to
/// synthesized drums.
async fn load_drum_kit(
    backend: &dyn AudioBackend,
    config: &EngineConfig,
    created: &mut Vec<NodeId>,
) -> Result<DrumKit, BackendError> {
    if let Some(samples) = &config.drum_samples {
        let mut loaded: Vec<(DrumHit, NodeId)> = Vec::new();
        let attempt = tokio::time::timeout(config.sample_load_timeout, async {
            for hit in DrumHit::ALL {
                let node = backend.load_sample(hit, samples.path(hit).to_path_buf()).await?;
                loaded.push((hit, node));
            }
            Ok::<(), BackendError>(())
        })
        .await;

        match attempt {
            Ok(Ok(())) => {
                created.extend(loaded.iter().map(|(_, node)| *node));
                return Ok(DrumKit {
                    kind: DrumKitKind::Sampled,
                    nodes: loaded.into_iter().collect(),
                });
            }
            Ok(Err(e)) => warn!("drum samples failed to load, using synthesized drums: {}", e),
            Err(_) => warn!(
                "drum samples did not load within {:?}, using synthesized drums",
                config.sample_load_timeout
            ),
        }

        for (hit, node) in loaded {
            if let Err(e) = backend.dispose(node) {
                warn!("failed to dispose partial {} sample: {}", hit.name(), e);
            }
        }
    }

    let mut nodes = BTreeMap::new();
    for hit in DrumHit::ALL {
        let node = backend.create(NodeSpec::SynthDrum { hit }).await?;
        created.push(node);
        nodes.insert(hit, node);
    }
    Ok(DrumKit {
        kind: DrumKitKind::Synthesized,
        nodes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::offline::{Fault, OfflineBackend, TriggerTarget};
    use crate::audio::transport::{Track, TransportEvent};
    use crate::config::DrumSamples;
    use std::time::Duration;

    fn sampled_config() -> EngineConfig {
        EngineConfig {
            drum_samples: Some(DrumSamples {
                kick: "kick.wav".into(),
                snare: "snare.wav".into(),
                hihat: "hihat.wav".into(),
            }),
            ..Default::default()
        }
    }

    fn graph_with(config: EngineConfig) -> (Arc<OfflineBackend>, AudioGraphHandle) {
        let backend = Arc::new(OfflineBackend::new());
        let handle = AudioGraphHandle::new(backend.clone(), config);
        (backend, handle)
    }

    #[tokio::test]
    async fn test_init_is_idempotent() {
        let (backend, handle) = graph_with(EngineConfig::default());
        assert!(!handle.is_initialized());

        handle.init().await.unwrap();
        let nodes = backend.live_nodes();
        // limiter, reverb, chorus, 5 channels, 4 synths, 3 drums
        assert_eq!(nodes, 15);

        handle.init().await.unwrap();
        assert_eq!(backend.live_nodes(), nodes);
        assert_eq!(handle.lock().drum_kit(), Some(DrumKitKind::Synthesized));
    }

    #[tokio::test(start_paused = true)]
    async fn test_graph_wiring_survives_reset() {
        let (backend, handle) = graph_with(EngineConfig::default());
        handle.init().await.unwrap();
        handle.reset().await.unwrap();

        let edges = backend.connections();
        let has = |from: &str, to: &str| edges.iter().any(|(f, t)| f == from && t == to);
        assert_eq!(edges.len(), 16);

        assert!(has("reverb", "limiter"));
        assert!(has("chorus", "limiter"));
        for voice in Voice::ALL {
            assert!(has(&format!("{:?} channel", voice), "limiter"), "{:?}", voice);
        }
        assert!(has("Chords channel", "reverb"));
        assert!(has("Chords channel", "chorus"));
        assert!(!has("Bass channel", "reverb"));
        for voice in Voice::SYNTHS {
            assert!(has(&format!("{:?} synth", voice), &format!("{:?} channel", voice)));
        }
        for hit in DrumHit::ALL {
            assert!(has(&format!("{} (synth)", hit.name()), "Drums channel"));
        }
    }

    #[tokio::test]
    async fn test_sampled_kit_when_samples_load() {
        let (backend, handle) = graph_with(sampled_config());
        handle.init().await.unwrap();
        assert_eq!(handle.lock().drum_kit(), Some(DrumKitKind::Sampled));
        assert_eq!(backend.live_samples(), 3);
    }

    #[tokio::test]
    async fn test_partial_sample_failure_falls_back() {
        let (backend, handle) = graph_with(sampled_config());
        backend.inject(Fault::SampleLoad(DrumHit::Snare));

        handle.init().await.unwrap();
        assert_eq!(handle.lock().drum_kit(), Some(DrumKitKind::Synthesized));
        // the kick that did load was disposed again
        assert_eq!(backend.live_samples(), 0);
        assert_eq!(backend.count_live(|s| matches!(s, NodeSpec::SynthDrum { .. })), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sample_timeout_falls_back() {
        let (backend, handle) = graph_with(sampled_config());
        backend.inject(Fault::SampleDelay(Duration::from_secs(5)));

        handle.init().await.unwrap();
        assert_eq!(handle.lock().drum_kit(), Some(DrumKitKind::Synthesized));
        assert_eq!(backend.live_samples(), 0);
    }

    #[tokio::test]
    async fn test_play_routes_to_voice_synth() {
        let (backend, handle) = graph_with(EngineConfig::default());
        assert!(!handle.lock().play(Voice::Chords, &[60, 64, 67], 80, 1.0));

        handle.init().await.unwrap();
        {
            let graph = handle.lock();
            assert!(graph.play(Voice::Chords, &[60, 64, 67], 80, 1.0));
            assert!(!graph.play(Voice::Bass, &[], 80, 1.0));
            assert!(graph.play_drum(DrumHit::Kick, 0.1));
        }

        let triggers = backend.triggers();
        assert_eq!(triggers.len(), 2);
        assert_eq!(triggers[0].target, TriggerTarget::Voice(Voice::Chords));
        assert_eq!(triggers[1].target, TriggerTarget::Drum(DrumHit::Kick));
        assert_eq!(triggers[1].velocity, 100);
    }

    #[tokio::test]
    async fn test_dispose_tolerates_failures() {
        let (backend, handle) = graph_with(EngineConfig::default());
        handle.init().await.unwrap();
        backend.inject(Fault::Dispose);

        let report = handle.dispose();
        assert!(!report.is_clean());
        assert_eq!(report.failures.len(), 15);
        assert_eq!(backend.disposed_nodes(), 0);
        assert!(!handle.is_initialized());

        // disposing again is a no-op
        assert_eq!(handle.dispose(), TeardownReport::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_rebuilds_and_reapplies_mix() {
        let (backend, handle) = graph_with(EngineConfig::default());
        handle.init().await.unwrap();
        handle
            .lock()
            .set_mix(Voice::Bass, ChannelMix::new(0.3, -0.5))
            .unwrap();

        let outcome = handle.reset().await.unwrap();
        let ResetOutcome::Completed(report) = outcome else {
            panic!("reset did not run");
        };
        assert!(report.is_clean());
        assert_eq!(report.disposed, 15);
        assert_eq!(backend.disposed_nodes(), 15);
        assert!(handle.is_initialized());
        assert!(!handle.is_resetting());
        assert!(!backend.is_suspended());
        assert_eq!(backend.live_nodes(), 15);

        // the last gain written is the bass channel's stored volume, on a new node
        let gains: Vec<f32> = backend
            .params()
            .into_iter()
            .filter_map(|(_, p)| match p {
                Param::Gain(g) => Some(g),
                _ => None,
            })
            .collect();
        assert_eq!(gains.iter().filter(|g| **g == 0.3).count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_reset_is_ignored() {
        let (_backend, handle) = graph_with(EngineConfig::default());
        handle.init().await.unwrap();

        let first = tokio::spawn({
            let handle = handle.clone();
            async move { handle.reset().await }
        });
        tokio::task::yield_now().await;
        assert!(handle.is_resetting());

        assert_eq!(handle.reset().await.unwrap(), ResetOutcome::AlreadyRunning);
        assert!(matches!(first.await.unwrap(), Ok(ResetOutcome::Completed(_))));
        assert!(!handle.is_resetting());
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_failure_is_fatal() {
        let (backend, handle) = graph_with(EngineConfig::default());
        handle.init().await.unwrap();
        backend.inject(Fault::Resume);

        let err = handle.reset().await.unwrap_err();
        assert!(err.is_fatal());
        assert!(!handle.is_resetting());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_reset_clears_guard() {
        let (backend, handle) = graph_with(EngineConfig::default());
        handle.init().await.unwrap();

        // settle delay is 150ms; give up long before that
        let result = tokio::time::timeout(Duration::from_millis(10), handle.reset()).await;
        assert!(result.is_err());
        assert!(!handle.is_resetting());
        assert!(!handle.is_initialized());
        assert!(backend.is_suspended());

        handle.recover().await.unwrap();
        assert!(handle.is_initialized());
        assert!(!backend.is_suspended());
        assert_eq!(backend.live_nodes(), 15);

        // nothing left to rebuild
        handle.recover().await.unwrap();
        assert_eq!(backend.live_nodes(), 15);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_cancels_pending_events() {
        let (_backend, handle) = graph_with(EngineConfig::default());
        handle.init().await.unwrap();
        {
            let mut graph = handle.lock();
            let transport = graph.transport_mut();
            let session = transport.new_session();
            transport.schedule(session, 4.0, Track::Chord, TransportEvent::Bar { bar: 1 });
            transport.start();
        }

        handle.reset().await.unwrap();
        let graph = handle.lock();
        assert!(graph.transport().is_idle());
        assert!(!graph.transport().is_running());
    }
}
