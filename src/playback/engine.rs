//! Transport-driven playback scheduler
//!
//! Turns a [`PlaybackSession`] into transport events and, as the transport
//! advances, into notes on the audio graph. Four tracks share the clock:
//!
//! - **chords**: one voiced chord per bar, or arpeggio steps across the bar
//! - **bass**: the chord root two octaves below the voicing octave
//! - **harmony**: one note above the root, one octave above the voicing octave
//! - **drums**: an eighth-note grid over the pattern, independent of bars
//!
//! Callbacks never run while the graph lock is held: every dispatch pass
//! collects notices first and delivers them after the pass.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::arpeggiator::arp_sequence;
use super::types::{ArpConfig, HarmonyInterval, PlaybackSession, BEATS_PER_BAR};
use crate::audio::{
    AudioGraph, AudioGraphHandle, ChannelMix, GraphState, ScheduledEvent, SessionId, SynthConfig, Track,
    TransportEvent, Voice,
};
use crate::drums::DrumPattern;
use crate::error::JamError;
use crate::theory::{midi_note, ChordTheory};
use crate::voicing::{voice_progression, VoicedChord, VoicingOptions};

pub type BarCallback = Box<dyn FnMut(usize) + Send>;
pub type CompletionCallback = Box<dyn FnOnce() + Send>;
pub type CountInCallback = Box<dyn FnMut(u32) + Send>;

const CHORD_VELOCITY: u8 = 80;
const BASS_VELOCITY: u8 = 90;
const HARMONY_VELOCITY: u8 = 70;

/// Drum grid resolution in beats (eighth notes)
const DRUM_STEP_BEATS: f64 = 0.5;

// Metronome: (note, velocity) for the downbeat and the other beats
const CLICK_ACCENT: (u8, u8) = (84, 110);
const CLICK_NORMAL: (u8, u8) = (72, 80);
const CLICK_SECS: f64 = 0.05;

struct ActiveSession {
    id: SessionId,
    config: PlaybackSession,
    voiced: Vec<VoicedChord>,
    cycles_started: u32,
    current_chord: usize,
    on_complete: Option<CompletionCallback>,
}

struct CountIn {
    id: SessionId,
    on_beat: CountInCallback,
    on_done: Option<CompletionCallback>,
}

/// Something that happened during a dispatch pass, delivered after it
enum Notice {
    Bar(usize),
    Completed(Option<CompletionCallback>),
    Click(u32),
    CountInDone,
}

pub struct PlaybackScheduler {
    graph: AudioGraphHandle,
    theory: Arc<ChordTheory>,
    rng: StdRng,
    session: Option<ActiveSession>,
    count_in: Option<CountIn>,
    finished: Option<PlaybackSession>,
    on_bar: Option<BarCallback>,
}

impl PlaybackScheduler {
    pub fn new(graph: AudioGraphHandle) -> Self {
        Self::with_theory(graph, Arc::new(ChordTheory::new()))
    }

    /// Share a chord cache with other components
    pub fn with_theory(graph: AudioGraphHandle, theory: Arc<ChordTheory>) -> Self {
        Self {
            graph,
            theory,
            rng: StdRng::from_rng(&mut rand::rng()),
            session: None,
            count_in: None,
            finished: None,
            on_bar: None,
        }
    }

    /// Fix the random source used for voicing variation and random arpeggios
    pub fn seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    pub fn graph(&self) -> &AudioGraphHandle {
        &self.graph
    }

    pub fn theory(&self) -> &Arc<ChordTheory> {
        &self.theory
    }

    /// Called with the active chord index on every bar boundary
    pub fn on_bar(&mut self, callback: impl FnMut(usize) + Send + 'static) {
        self.on_bar = Some(Box::new(callback));
    }

    pub fn is_playing(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_counting_in(&self) -> bool {
        self.count_in.is_some()
    }

    /// Index of the chord sounding now
    pub fn current_chord(&self) -> Option<usize> {
        self.session.as_ref().map(|s| s.current_chord)
    }

    pub fn session(&self) -> Option<&PlaybackSession> {
        self.session.as_ref().map(|s| &s.config)
    }

    pub fn voiced(&self) -> Option<&[VoicedChord]> {
        self.session.as_ref().map(|s| s.voiced.as_slice())
    }

    /// Settings of the last session to reach its loop target, live edits
    /// included, as they stood when it ended
    pub fn take_finished(&mut self) -> Option<PlaybackSession> {
        self.finished.take()
    }

    /// Start playing a session from the current transport position.
    ///
    /// Returns false (and logs a warning) while an audio reset is running,
    /// while the graph is uninitialized, or for an empty progression. A
    /// session that is already playing is replaced.
    pub fn start(&mut self, session: PlaybackSession, on_complete: Option<CompletionCallback>) -> bool {
        if session.progression.is_empty() {
            warn!("start ignored: progression is empty");
            return false;
        }

        let handle = self.graph.clone();
        let mut graph = handle.lock();
        if handle.is_resetting() {
            warn!("start ignored: audio reset in progress");
            return false;
        }
        if graph.state() != GraphState::Initialized {
            warn!("start ignored: audio graph is not initialized");
            return false;
        }

        if let Some(previous) = self.session.take() {
            graph.transport_mut().cancel(previous.id);
            graph.release_all();
        }

        apply_sound(&mut graph, &session);
        let bpm = graph.transport_mut().set_bpm(session.bpm);
        let voiced = voice_progression(&self.theory, &session.progression, &session.voicing, &mut self.rng);

        let transport = graph.transport_mut();
        let id = transport.new_session();
        let at = transport.position();
        transport.schedule(id, at, Track::Chord, TransportEvent::Bar { bar: 0 });
        transport.schedule(id, at, Track::Drums, TransportEvent::DrumStep { step: 0 });
        transport.start();

        info!(
            "playback started: {} chords at {} bpm, loop target {:?}",
            session.progression.len(),
            bpm,
            session.loop_target
        );
        self.session = Some(ActiveSession {
            id,
            config: PlaybackSession { bpm, ..session },
            voiced,
            cycles_started: 0,
            current_chord: 0,
            on_complete,
        });
        true
    }

    /// Cancel every pending event, silence every voice. Safe to call twice.
    pub fn stop(&mut self) {
        let handle = self.graph.clone();
        let mut graph = handle.lock();
        let mut cancelled = 0;
        if let Some(active) = self.session.take() {
            cancelled += graph.transport_mut().cancel(active.id);
        }
        if let Some(count_in) = self.count_in.take() {
            cancelled += graph.transport_mut().cancel(count_in.id);
        }
        graph.release_all();
        graph.transport_mut().stop();
        debug!("playback stopped, {} pending events cancelled", cancelled);
    }

    /// Schedule a metronome count-in of `beats` clicks at `bpm`.
    ///
    /// `on_beat` gets the 1-based beat number as each click sounds; `on_done`
    /// runs once the last beat's duration has elapsed. Refused under the same
    /// conditions as [`start`](Self::start).
    pub fn count_in(
        &mut self,
        beats: u32,
        bpm: f64,
        on_beat: impl FnMut(u32) + Send + 'static,
        on_done: impl FnOnce() + Send + 'static,
    ) -> bool {
        let handle = self.graph.clone();
        let mut graph = handle.lock();
        if handle.is_resetting() || graph.state() != GraphState::Initialized {
            warn!("count-in ignored: audio graph unavailable");
            return false;
        }

        let transport = graph.transport_mut();
        if let Some(previous) = self.count_in.take() {
            transport.cancel(previous.id);
        }
        transport.set_bpm(bpm);
        let id = transport.new_session();
        let at = transport.position();
        for beat in 1..=beats {
            transport.schedule(
                id,
                at + (beat - 1) as f64,
                Track::Click,
                TransportEvent::Click { beat, accent: beat == 1 },
            );
        }
        transport.schedule(id, at + beats as f64, Track::Click, TransportEvent::CountInDone);
        transport.start();

        self.count_in = Some(CountIn {
            id,
            on_beat: Box::new(on_beat),
            on_done: Some(Box::new(on_done)),
        });
        true
    }

    /// Drop a pending count-in without running its callbacks
    pub fn cancel_count_in(&mut self) {
        if let Some(count_in) = self.count_in.take() {
            self.graph.lock().transport_mut().cancel(count_in.id);
        }
    }

    /// Move the transport forward and dispatch everything that became due
    pub fn advance(&mut self, seconds: f64) {
        let handle = self.graph.clone();
        let mut notices = Vec::new();
        {
            let mut graph = handle.lock();
            self.drop_orphans(&mut graph);
            graph.transport_mut().advance(seconds);
            while let Some(event) = graph.transport_mut().pop_due() {
                self.dispatch(&mut graph, event, &mut notices);
            }
        }
        self.deliver(notices);
    }

    /// Drive [`advance`](Self::advance) from wall-clock time until cancelled or
    /// until nothing is playing or counting in.
    pub async fn run_realtime(&mut self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.graph.config().tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last = Instant::now();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let now = Instant::now();
                    self.advance((now - last).as_secs_f64());
                    last = now;
                    if self.session.is_none() && self.count_in.is_none() {
                        break;
                    }
                }
            }
        }
    }

    // ---- setters ----

    /// Change tempo (clamped 40-240); returns the tempo applied
    pub fn set_bpm(&mut self, bpm: f64) -> f64 {
        let applied = self.graph.lock().transport_mut().set_bpm(bpm);
        if let Some(active) = self.session.as_mut() {
            active.config.bpm = applied;
        }
        applied
    }

    /// Replace one chord of the playing progression and re-voice it
    pub fn set_chord(&mut self, index: usize, symbol: &str) -> Result<(), JamError> {
        let Some(active) = self.session.as_mut() else {
            debug!("set_chord ignored: nothing playing");
            return Ok(());
        };
        let len = active.config.progression.len();
        let slot = active.config.progression.get_mut(index).ok_or_else(|| {
            JamError::Validation(format!("chord index {} out of range (progression has {})", index, len))
        })?;
        *slot = symbol.to_string();
        active.voiced = voice_progression(
            &self.theory,
            &active.config.progression,
            &active.config.voicing,
            &mut self.rng,
        );
        Ok(())
    }

    pub fn set_drum_pattern(&mut self, pattern: DrumPattern) -> Result<(), JamError> {
        if pattern.is_empty() {
            return Err(JamError::Validation(format!("drum pattern '{}' has no steps", pattern.name)));
        }
        if let Some(active) = self.session.as_mut() {
            active.config.pattern = pattern;
        }
        Ok(())
    }

    pub fn set_arpeggiator(&mut self, arpeggiator: ArpConfig) -> Result<(), JamError> {
        arpeggiator.validate()?;
        if let Some(active) = self.session.as_mut() {
            active.config.arpeggiator = arpeggiator;
        }
        Ok(())
    }

    pub fn set_harmony(&mut self, harmony: Option<HarmonyInterval>) {
        if let Some(active) = self.session.as_mut() {
            active.config.harmony = harmony;
        }
    }

    pub fn set_voicing(&mut self, voicing: VoicingOptions) {
        if let Some(active) = self.session.as_mut() {
            active.config.voicing = voicing;
            active.voiced =
                voice_progression(&self.theory, &active.config.progression, &voicing, &mut self.rng);
        }
    }

    pub fn set_channel_mix(&mut self, voice: Voice, mix: ChannelMix) -> Result<(), JamError> {
        self.graph.lock().set_mix(voice, mix)?;
        if let Some(active) = self.session.as_mut() {
            active.config.mix.insert(voice, mix);
        }
        Ok(())
    }

    pub fn set_synth_config(&mut self, config: SynthConfig) -> Result<(), JamError> {
        self.graph.lock().set_synth_config(config)?;
        if let Some(active) = self.session.as_mut() {
            active.config.synth = config;
        }
        Ok(())
    }

    // ---- dispatch ----

    fn dispatch(&mut self, graph: &mut AudioGraph, scheduled: ScheduledEvent, notices: &mut Vec<Notice>) {
        let ScheduledEvent {
            time,
            session,
            event,
            ..
        } = scheduled;
        let playing = self.session.as_ref().is_some_and(|s| s.id == session);
        let counting = self.count_in.as_ref().is_some_and(|c| c.id == session);

        match event {
            TransportEvent::Bar { bar } if playing => self.play_bar(graph, time, bar, notices),
            TransportEvent::ArpNote { note, duration_beats } if playing => {
                let secs = duration_beats * graph.transport().seconds_per_beat();
                graph.play(Voice::Chords, &[note], CHORD_VELOCITY, secs);
            }
            TransportEvent::DrumStep { step } if playing => self.play_drum_step(graph, time, step),
            TransportEvent::Click { beat, accent } if counting => {
                let (note, velocity) = if accent { CLICK_ACCENT } else { CLICK_NORMAL };
                graph.play(Voice::Click, &[note], velocity, CLICK_SECS);
                notices.push(Notice::Click(beat));
            }
            TransportEvent::CountInDone if counting => notices.push(Notice::CountInDone),
            other => debug!("dropping event from a finished session: {:?}", other),
        }
    }

    fn play_bar(&mut self, graph: &mut AudioGraph, time: f64, bar: u64, notices: &mut Vec<Notice>) {
        let Some(active) = self.session.as_mut() else {
            return;
        };
        let len = active.config.progression.len() as u64;
        let index = (bar % len) as usize;

        if index == 0 {
            active.cycles_started += 1;
            if let Some(target) = active.config.loop_target {
                if active.cycles_started > target {
                    info!("loop target of {} reached after {} bars", target, bar);
                    self.finish(graph, notices);
                    return;
                }
            }
        }

        active.current_chord = index;
        notices.push(Notice::Bar(index));

        let spb = graph.transport().seconds_per_beat();
        let bar_secs = BEATS_PER_BAR * spb;
        let notes = &active.voiced[index];
        let arp = active.config.arpeggiator;

        // chords
        if arp.enabled {
            let step = arp.rate.beats();
            let sequence = arp_sequence(notes, arp.direction, arp.rate.steps_per_bar(), &mut self.rng);
            if let Some((first, rest)) = sequence.split_first() {
                graph.play(Voice::Chords, &[*first], CHORD_VELOCITY, step * arp.gate * spb);
                for (k, note) in rest.iter().enumerate() {
                    graph.transport_mut().schedule(
                        active.id,
                        time + step * (k + 1) as f64,
                        Track::Chord,
                        TransportEvent::ArpNote {
                            note: *note,
                            duration_beats: step * arp.gate,
                        },
                    );
                }
            }
        } else {
            graph.play(Voice::Chords, notes, CHORD_VELOCITY, bar_secs);
        }

        // bass, then harmony
        if let Some(chord) = self.theory.chord(&active.config.progression[index]) {
            let octave = active.config.voicing.octave();
            if let Some(bass) = midi_note(chord.symbol.root, octave - 2) {
                graph.play(Voice::Bass, &[bass], BASS_VELOCITY, bar_secs);
            }
            let harmony_note = active.config.harmony.and_then(|h| {
                let semitones = h.semitones(&chord.intervals)?;
                let root = midi_note(chord.symbol.root, octave + 1)?;
                u8::try_from(root as u16 + semitones as u16).ok().filter(|n| *n <= 127)
            });
            if let Some(note) = harmony_note {
                graph.play(Voice::Harmony, &[note], HARMONY_VELOCITY, bar_secs);
            }
        }

        graph.transport_mut().schedule(
            active.id,
            time + BEATS_PER_BAR,
            Track::Chord,
            TransportEvent::Bar { bar: bar + 1 },
        );
    }

    fn play_drum_step(&mut self, graph: &mut AudioGraph, time: f64, step: u64) {
        let Some(active) = self.session.as_ref() else {
            return;
        };
        if let Some(hits) = active.config.pattern.step(step as usize) {
            let secs = DRUM_STEP_BEATS / 2.0 * graph.transport().seconds_per_beat();
            for hit in hits.hits() {
                graph.play_drum(hit, secs);
            }
        }
        graph.transport_mut().schedule(
            active.id,
            time + DRUM_STEP_BEATS,
            Track::Drums,
            TransportEvent::DrumStep { step: step + 1 },
        );
    }

    /// End the session after its loop target; completion is delivered later
    fn finish(&mut self, graph: &mut AudioGraph, notices: &mut Vec<Notice>) {
        if let Some(done) = self.session.take() {
            graph.transport_mut().cancel(done.id);
            graph.release_all();
            if self.count_in.is_none() {
                graph.transport_mut().stop();
            }
            notices.push(Notice::Completed(done.on_complete));
            self.finished = Some(done.config);
        }
    }

    /// A playing session always has its next bar queued and a count-in its
    /// done marker. Nothing queued means an audio reset cancelled them.
    fn drop_orphans(&mut self, graph: &mut AudioGraph) {
        let transport = graph.transport();
        let session_lost = self.session.as_ref().is_some_and(|s| transport.pending(s.id) == 0);
        let count_in_lost = self.count_in.as_ref().is_some_and(|c| transport.pending(c.id) == 0);
        if session_lost {
            warn!("playback session lost its events to an audio reset, dropping it");
            self.session = None;
            graph.release_all();
        }
        if count_in_lost {
            warn!("count-in lost its events to an audio reset, dropping it");
            self.count_in = None;
        }
    }

    fn deliver(&mut self, notices: Vec<Notice>) {
        for notice in notices {
            match notice {
                Notice::Bar(index) => {
                    if let Some(callback) = self.on_bar.as_mut() {
                        callback(index);
                    }
                }
                Notice::Completed(callback) => {
                    if let Some(callback) = callback {
                        callback();
                    }
                }
                Notice::Click(beat) => {
                    if let Some(count_in) = self.count_in.as_mut() {
                        (count_in.on_beat)(beat);
                    }
                }
                Notice::CountInDone => {
                    if let Some(done) = self.count_in.take().and_then(|c| c.on_done) {
                        done();
                    }
                }
            }
        }
    }
}

/// Push a session's mix and synth sound onto the graph
fn apply_sound(graph: &mut AudioGraph, session: &PlaybackSession) {
    for (voice, mix) in &session.mix {
        if let Err(e) = graph.set_mix(*voice, *mix) {
            warn!("ignoring {:?} mix: {}", voice, e);
        }
    }
    if let Err(e) = graph.set_synth_config(session.synth) {
        warn!("ignoring synth config: {}", e);
    }
}
