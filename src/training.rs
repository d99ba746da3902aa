//! # Training Mode
//!
//! Loop a progression for practice: count in, play it a fixed number of
//! times, reset the whole audio graph, and go again until stopped.
//!
//! ```text
//!   Idle ──start──▶ CountingIn ──last click──▶ Playing
//!                      ▲                          │ loops done
//!                      └──── reset complete ── Resetting
//! ```
//!
//! `stop()` returns to `Idle` from any state. A reset in flight can also be
//! abandoned from another task through [`TrainingController::stop_handle`];
//! the graph is then rebuilt before the controller settles in `Idle`.
//!
//! Live edits made through [`TrainingController::scheduler_mut`] while
//! playing carry over into the next cycle.
//!
//! Scheduler callbacks do not touch the controller directly. They post a
//! [`Signal`] on a channel and the controller handles it after the scheduler's
//! dispatch pass, so phase changes never happen mid-pass.

use std::fmt;

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::audio::ResetOutcome;
use crate::error::JamError;
use crate::playback::{PlaybackScheduler, PlaybackSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrainingState {
    Idle,
    CountingIn,
    Playing,
    Resetting,
}

impl fmt::Display for TrainingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrainingState::Idle => "idle",
            TrainingState::CountingIn => "counting in",
            TrainingState::Playing => "playing",
            TrainingState::Resetting => "resetting",
        };
        f.write_str(name)
    }
}

pub type PhaseCallback = Box<dyn FnMut(TrainingState) + Send>;
pub type BeatCallback = Box<dyn FnMut(u32) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    Beat(u32),
    CountInDone,
    LoopsDone,
}

pub struct TrainingController {
    scheduler: PlaybackScheduler,
    state: TrainingState,
    session: Option<PlaybackSession>,
    tx: UnboundedSender<Signal>,
    rx: UnboundedReceiver<Signal>,
    stop: CancellationToken,
    on_phase: Option<PhaseCallback>,
    on_count_in: Option<BeatCallback>,
}

impl TrainingController {
    pub fn new(scheduler: PlaybackScheduler) -> Self {
        let (tx, rx) = unbounded_channel();
        Self {
            scheduler,
            state: TrainingState::Idle,
            session: None,
            tx,
            rx,
            stop: CancellationToken::new(),
            on_phase: None,
            on_count_in: None,
        }
    }

    pub fn state(&self) -> TrainingState {
        self.state
    }

    /// Called on every state transition
    pub fn on_phase(&mut self, callback: impl FnMut(TrainingState) + Send + 'static) {
        self.on_phase = Some(Box::new(callback));
    }

    /// Called with the 1-based beat number of each count-in click
    pub fn on_count_in(&mut self, callback: impl FnMut(u32) + Send + 'static) {
        self.on_count_in = Some(Box::new(callback));
    }

    pub fn scheduler(&self) -> &PlaybackScheduler {
        &self.scheduler
    }

    /// Direct access for live edits (tempo, chords, mix) while training
    pub fn scheduler_mut(&mut self) -> &mut PlaybackScheduler {
        &mut self.scheduler
    }

    pub fn session(&self) -> Option<&PlaybackSession> {
        self.session.as_ref()
    }

    /// Token that stops training when cancelled, including a reset in flight.
    ///
    /// A fresh token is issued by `start` after a stop, so fetch it after
    /// starting.
    pub fn stop_handle(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Begin training from the count-in. Restarts if already running.
    ///
    /// Returns false when the count-in cannot be scheduled (empty
    /// progression, graph unavailable); the controller stays idle.
    pub fn start(&mut self, session: PlaybackSession) -> bool {
        if self.state != TrainingState::Idle {
            self.stop();
        }
        if session.progression.is_empty() {
            warn!("training not started: progression is empty");
            return false;
        }
        if self.stop.is_cancelled() {
            self.stop = CancellationToken::new();
        }

        self.session = Some(session);
        if !self.begin_count_in() {
            self.session = None;
            return false;
        }
        true
    }

    /// Force `Idle`: stop playback, drop any count-in, discard queued signals
    pub fn stop(&mut self) {
        self.stop.cancel();
        self.scheduler.stop();
        while self.rx.try_recv().is_ok() {}
        if self.state != TrainingState::Idle {
            info!("training stopped while {}", self.state);
        }
        self.set_state(TrainingState::Idle);
    }

    /// Advance the scheduler clock and act on whatever it reported.
    ///
    /// Awaits the audio reset when a training cycle ends in this step. An
    /// error means the reset failed fatally; the controller is idle then.
    pub async fn advance(&mut self, seconds: f64) -> Result<(), JamError> {
        if self.stop.is_cancelled() {
            if self.state != TrainingState::Idle {
                self.stop();
            }
            return Ok(());
        }

        self.scheduler.advance(seconds);
        while let Ok(signal) = self.rx.try_recv() {
            debug!("training signal {:?} while {}", signal, self.state);
            match signal {
                Signal::Beat(beat) => {
                    if let Some(callback) = self.on_count_in.as_mut() {
                        callback(beat);
                    }
                }
                Signal::CountInDone if self.state == TrainingState::CountingIn => self.begin_playing(),
                Signal::LoopsDone if self.state == TrainingState::Playing => self.reset_and_repeat().await?,
                other => debug!("ignoring stale training signal {:?}", other),
            }
        }
        Ok(())
    }

    /// Drive [`advance`](Self::advance) from wall-clock time until stopped
    pub async fn run_realtime(&mut self) -> Result<(), JamError> {
        let mut ticker = tokio::time::interval(self.scheduler.graph().config().tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last = Instant::now();
        let stop = self.stop.clone();

        while self.state != TrainingState::Idle {
            tokio::select! {
                _ = stop.cancelled() => {
                    self.stop();
                    break;
                }
                _ = ticker.tick() => {
                    let now = Instant::now();
                    self.advance((now - last).as_secs_f64()).await?;
                    last = now;
                }
            }
        }
        Ok(())
    }

    fn set_state(&mut self, state: TrainingState) {
        if self.state == state {
            return;
        }
        info!("training: {} -> {}", self.state, state);
        self.state = state;
        if let Some(callback) = self.on_phase.as_mut() {
            callback(state);
        }
    }

    fn begin_count_in(&mut self) -> bool {
        let Some(bpm) = self.session.as_ref().map(|s| s.bpm) else {
            return false;
        };
        let beats = self.scheduler.graph().config().count_in_beats;
        let beat_tx = self.tx.clone();
        let done_tx = self.tx.clone();
        let scheduled = self.scheduler.count_in(
            beats,
            bpm,
            move |beat| {
                let _ = beat_tx.send(Signal::Beat(beat));
            },
            move || {
                let _ = done_tx.send(Signal::CountInDone);
            },
        );
        if scheduled {
            self.set_state(TrainingState::CountingIn);
        } else {
            warn!("training: count-in refused, going idle");
            self.set_state(TrainingState::Idle);
        }
        scheduled
    }

    fn begin_playing(&mut self) {
        let Some(session) = self.session.clone() else {
            self.set_state(TrainingState::Idle);
            return;
        };
        let loops = session
            .loop_target
            .unwrap_or(self.scheduler.graph().config().training_loops);
        let tx = self.tx.clone();
        let started = self.scheduler.start(
            session.with_loop_target(loops),
            Some(Box::new(move || {
                let _ = tx.send(Signal::LoopsDone);
            })),
        );
        if started {
            self.set_state(TrainingState::Playing);
        } else {
            warn!("training: playback refused, going idle");
            self.set_state(TrainingState::Idle);
        }
    }

    async fn reset_and_repeat(&mut self) -> Result<(), JamError> {
        self.set_state(TrainingState::Resetting);

        let graph = self.scheduler.graph().clone();
        self.keep_live_edits();
        let stop = self.stop.clone();
        let outcome = tokio::select! {
            _ = stop.cancelled() => None,
            result = graph.reset() => Some(result),
        };

        match outcome {
            None => {
                info!("training: reset abandoned by stop request");
                self.stop();
                graph
                    .recover()
                    .await
                    .inspect_err(|e| warn!("training: audio recovery failed: {}", e))
            }
            Some(Err(e)) => {
                warn!("training: audio reset failed: {}", e);
                self.stop();
                Err(e)
            }
            Some(Ok(ResetOutcome::AlreadyRunning)) => {
                warn!("training: another reset is running, going idle");
                self.stop();
                Ok(())
            }
            Some(Ok(ResetOutcome::Completed(report))) => {
                if !report.is_clean() {
                    debug!("training: {} nodes failed to dispose", report.failures.len());
                }
                self.reapply_sound();
                self.begin_count_in();
                Ok(())
            }
        }
    }

    /// Replace the stored session with the one that just finished, as edited
    /// while it played. Mix and synth are read back from the graph.
    fn keep_live_edits(&mut self) {
        let Some(mut live) = self.scheduler.take_finished() else {
            return;
        };
        {
            let graph = self.scheduler.graph().lock();
            live.mix = graph.mix().clone();
            live.synth = graph.synth_config();
        }
        live.loop_target = self.session.as_ref().and_then(|s| s.loop_target);
        self.session = Some(live);
    }

    /// Push the session's mix and synth onto the rebuilt graph
    fn reapply_sound(&mut self) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let mix = session.mix.clone();
        let synth = session.synth;
        for (voice, channel) in mix {
            if let Err(e) = self.scheduler.set_channel_mix(voice, channel) {
                warn!("training: ignoring {:?} mix: {}", voice, e);
            }
        }
        if let Err(e) = self.scheduler.set_synth_config(synth) {
            warn!("training: ignoring synth config: {}", e);
        }
    }
}
