use super::*;
use crate::audio::{AudioGraphHandle, OfflineBackend, TriggerRecord, TriggerTarget, Voice};
use crate::config::EngineConfig;
use crate::drums::{DrumHit, DrumPattern, DrumPatternStore, DrumStep};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

async fn ready_graph() -> (Arc<OfflineBackend>, AudioGraphHandle) {
    let backend = Arc::new(OfflineBackend::new());
    let graph = AudioGraphHandle::new(backend.clone(), EngineConfig::default());
    graph.init().await.unwrap();
    (backend, graph)
}

fn silent() -> DrumPattern {
    DrumPatternStore::new().get("None").unwrap().clone()
}

fn voice_triggers(backend: &OfflineBackend, voice: Voice) -> Vec<TriggerRecord> {
    backend
        .triggers()
        .into_iter()
        .filter(|t| t.target == TriggerTarget::Voice(voice))
        .collect()
}

fn drum_triggers(backend: &OfflineBackend, hit: DrumHit) -> usize {
    backend
        .triggers()
        .iter()
        .filter(|t| t.target == TriggerTarget::Drum(hit))
        .count()
}

/// Advance in small steps, like the realtime driver would
fn run_for(scheduler: &mut PlaybackScheduler, seconds: f64) {
    let ticks = (seconds / 0.01).round() as usize;
    for _ in 0..ticks {
        scheduler.advance(0.01);
    }
}

#[tokio::test]
async fn test_loop_target_two_gives_eight_bars_then_completion() {
    let (_backend, graph) = ready_graph().await;
    let mut scheduler = PlaybackScheduler::new(graph);

    let bars = Arc::new(Mutex::new(Vec::new()));
    let completions = Arc::new(AtomicUsize::new(0));
    {
        let bars = bars.clone();
        scheduler.on_bar(move |index| bars.lock().push(index));
    }
    let done = completions.clone();
    let session = PlaybackSession::new(["C", "Am", "F", "G"], silent(), 120.0).with_loop_target(2);
    assert!(scheduler.start(
        session,
        Some(Box::new(move || {
            done.fetch_add(1, Ordering::SeqCst);
        }))
    ));

    // 120 bpm: one bar = 2 seconds, two loops of four bars = 16 seconds
    run_for(&mut scheduler, 20.0);

    assert_eq!(*bars.lock(), vec![0, 1, 2, 3, 0, 1, 2, 3]);
    assert_eq!(completions.load(Ordering::SeqCst), 1);
    assert!(!scheduler.is_playing());
}

#[tokio::test]
async fn test_completion_runs_after_the_dispatch_pass() {
    let (_backend, graph) = ready_graph().await;
    let mut scheduler = PlaybackScheduler::new(graph.clone());

    let log = Arc::new(Mutex::new(Vec::new()));
    {
        let log = log.clone();
        scheduler.on_bar(move |index| log.lock().push(format!("bar{}", index)));
    }
    let completion_log = log.clone();
    let completion_graph = graph.clone();
    let session = PlaybackSession::new(["C", "G"], silent(), 120.0).with_loop_target(1);
    scheduler.start(
        session,
        Some(Box::new(move || {
            // the graph lock is free by the time the callback runs
            assert!(completion_graph.is_initialized());
            completion_log.lock().push("done".to_string());
        })),
    );

    // one huge step dispatches everything in a single pass
    scheduler.advance(60.0);

    assert_eq!(*log.lock(), vec!["bar0", "bar1", "done"]);
}

#[tokio::test]
async fn test_emission_order_within_a_bar() {
    let (backend, graph) = ready_graph().await;
    let mut scheduler = PlaybackScheduler::new(graph);
    let rock = DrumPatternStore::new().get("Basic Rock").unwrap().clone();

    let session = PlaybackSession::new(["C"], rock, 120.0).with_harmony(HarmonyInterval::Third);
    scheduler.start(session, None);
    scheduler.advance(0.0);

    let targets: Vec<_> = backend.triggers().iter().map(|t| t.target).collect();
    assert_eq!(
        targets,
        vec![
            TriggerTarget::Voice(Voice::Chords),
            TriggerTarget::Voice(Voice::Bass),
            TriggerTarget::Voice(Voice::Harmony),
            TriggerTarget::Drum(DrumHit::Kick),
            TriggerTarget::Drum(DrumHit::Hihat),
        ]
    );

    let triggers = backend.triggers();
    assert_eq!(triggers[0].notes, vec![60, 64, 67]); // C4 E4 G4
    assert_eq!(triggers[1].notes, vec![36]); // C2
    assert_eq!(triggers[2].notes, vec![76]); // E5
}

#[tokio::test]
async fn test_harmony_third_rests_on_suspended_chords() {
    let (backend, graph) = ready_graph().await;
    let mut scheduler = PlaybackScheduler::new(graph);

    let session = PlaybackSession::new(["Csus4"], silent(), 120.0).with_harmony(HarmonyInterval::Third);
    scheduler.start(session, None);
    scheduler.advance(0.0);

    assert!(voice_triggers(&backend, Voice::Harmony).is_empty());
    assert_eq!(voice_triggers(&backend, Voice::Chords).len(), 1);
}

#[tokio::test]
async fn test_harmony_seventh_follows_the_chord() {
    let (backend, graph) = ready_graph().await;
    let mut scheduler = PlaybackScheduler::new(graph);

    let session = PlaybackSession::new(["Cm7", "C", "Cdim", "Cdim7"], silent(), 120.0)
        .with_harmony(HarmonyInterval::Seventh);
    scheduler.start(session, None);
    run_for(&mut scheduler, 7.0); // four bars at 2 s each, dispatched at 0, 2, 4, 6

    let notes: Vec<u8> = voice_triggers(&backend, Voice::Harmony)
        .iter()
        .map(|t| t.notes[0])
        .collect();
    // C5 = 72: own minor seventh, major seventh, minor seventh, diminished seventh
    assert_eq!(notes, vec![82, 83, 82, 81]);
}

#[tokio::test]
async fn test_arpeggiator_up_down_on_c_major() {
    let (backend, graph) = ready_graph().await;
    let mut scheduler = PlaybackScheduler::new(graph);

    let arp = ArpConfig {
        enabled: true,
        direction: ArpDirection::UpDown,
        rate: ArpRate::Quarter,
        gate: 0.8,
    };
    let session = PlaybackSession::new(["C"], silent(), 120.0).with_arpeggiator(arp);
    scheduler.start(session, None);
    run_for(&mut scheduler, 1.9);

    let chords = voice_triggers(&backend, Voice::Chords);
    let notes: Vec<Vec<u8>> = chords.iter().map(|t| t.notes.clone()).collect();
    assert_eq!(notes, vec![vec![60], vec![64], vec![67], vec![64]]);

    // quarter at 120 bpm = 0.5 s, held for 80%
    assert!((chords[0].duration_secs - 0.4).abs() < 1e-9);
}

#[tokio::test]
async fn test_drums_run_on_their_own_grid() {
    let (backend, graph) = ready_graph().await;
    let mut scheduler = PlaybackScheduler::new(graph);

    let kick = DrumStep {
        kick: true,
        ..Default::default()
    };
    let snare = DrumStep {
        snare: true,
        ..Default::default()
    };
    // three steps against an eight-step bar
    let pattern = DrumPattern::new("Odd", vec![Some(kick), None, Some(snare)]);
    scheduler.start(PlaybackSession::new(["C"], pattern, 120.0), None);

    // eighth notes at 120 bpm are 0.25 s apart; steps 0..=7 fall within 1.8 s
    run_for(&mut scheduler, 1.8);

    assert_eq!(drum_triggers(&backend, DrumHit::Kick), 3); // steps 0, 3, 6
    assert_eq!(drum_triggers(&backend, DrumHit::Snare), 2); // steps 2, 5
}

#[tokio::test]
async fn test_rest_bar_is_silent_but_reported() {
    let (backend, graph) = ready_graph().await;
    let mut scheduler = PlaybackScheduler::new(graph);

    let bars = Arc::new(Mutex::new(Vec::new()));
    {
        let bars = bars.clone();
        scheduler.on_bar(move |index| bars.lock().push(index));
    }
    scheduler.start(PlaybackSession::new(["C", "N.C."], silent(), 120.0), None);
    run_for(&mut scheduler, 3.0);

    assert_eq!(*bars.lock(), vec![0, 1]);
    assert_eq!(voice_triggers(&backend, Voice::Chords).len(), 1);
    assert_eq!(voice_triggers(&backend, Voice::Bass).len(), 1);
}

#[tokio::test]
async fn test_stop_cancels_everything_and_is_idempotent() {
    let (backend, graph) = ready_graph().await;
    let mut scheduler = PlaybackScheduler::new(graph.clone());
    let rock = DrumPatternStore::new().get("Basic Rock").unwrap().clone();

    scheduler.start(PlaybackSession::new(["C", "F"], rock, 120.0), None);
    run_for(&mut scheduler, 1.0);
    assert!(scheduler.is_playing());

    scheduler.stop();
    scheduler.stop();
    assert!(!scheduler.is_playing());
    assert!(graph.lock().transport().is_idle());
    assert!(backend.releases() > 0);

    let before = backend.triggers().len();
    run_for(&mut scheduler, 10.0);
    assert_eq!(backend.triggers().len(), before);
}

#[tokio::test]
async fn test_start_refused_without_graph_or_chords() {
    let backend = Arc::new(OfflineBackend::new());
    let graph = AudioGraphHandle::new(backend, EngineConfig::default());
    let mut scheduler = PlaybackScheduler::new(graph.clone());

    // not initialized yet
    assert!(!scheduler.start(PlaybackSession::new(["C"], silent(), 120.0), None));

    graph.init().await.unwrap();
    let empty: Vec<String> = Vec::new();
    assert!(!scheduler.start(PlaybackSession::new(empty, silent(), 120.0), None));
    assert!(scheduler.start(PlaybackSession::new(["C"], silent(), 120.0), None));
}

#[tokio::test(start_paused = true)]
async fn test_start_during_reset_makes_no_sound() {
    let (backend, graph) = ready_graph().await;
    let mut scheduler = PlaybackScheduler::new(graph.clone());

    let reset = tokio::spawn({
        let graph = graph.clone();
        async move { graph.reset().await }
    });
    tokio::task::yield_now().await;
    assert!(graph.is_resetting());

    assert!(!scheduler.start(PlaybackSession::new(["C", "G"], silent(), 120.0), None));
    run_for(&mut scheduler, 1.0);

    reset.await.unwrap().unwrap();
    run_for(&mut scheduler, 5.0);

    assert!(backend.triggers().is_empty());
    assert!(!scheduler.is_playing());
}

#[tokio::test]
async fn test_set_bpm_is_clamped() {
    let (_backend, graph) = ready_graph().await;
    let mut scheduler = PlaybackScheduler::new(graph);
    scheduler.start(PlaybackSession::new(["C"], silent(), 500.0), None);

    assert_eq!(scheduler.session().unwrap().bpm, 240.0);
    assert_eq!(scheduler.set_bpm(20.0), 40.0);
    assert_eq!(scheduler.session().unwrap().bpm, 40.0);
}

#[tokio::test]
async fn test_tempo_change_stretches_future_bars() {
    let (_backend, graph) = ready_graph().await;
    let mut scheduler = PlaybackScheduler::new(graph);
    scheduler.start(PlaybackSession::new(["C", "F", "G"], silent(), 120.0), None);

    scheduler.advance(0.0);
    scheduler.set_bpm(60.0);
    // at 60 bpm a bar is 4 s
    run_for(&mut scheduler, 3.5);
    assert_eq!(scheduler.current_chord(), Some(0));
    run_for(&mut scheduler, 0.6);
    assert_eq!(scheduler.current_chord(), Some(1));
}

#[tokio::test]
async fn test_set_chord_revoices_progression() {
    let (_backend, graph) = ready_graph().await;
    let mut scheduler = PlaybackScheduler::new(graph);
    scheduler.start(PlaybackSession::new(["C", "F"], silent(), 120.0), None);

    scheduler.set_chord(1, "G").unwrap();
    assert_eq!(scheduler.session().unwrap().progression[1], "G");

    let mut classes: Vec<u8> = scheduler.voiced().unwrap()[1].iter().map(|n| n % 12).collect();
    classes.sort_unstable();
    assert_eq!(classes, vec![2, 7, 11]); // D G B

    assert!(scheduler.set_chord(5, "A").is_err());
}

#[tokio::test]
async fn test_invalid_setter_input_rejected() {
    let (_backend, graph) = ready_graph().await;
    let mut scheduler = PlaybackScheduler::new(graph);

    let bad_gate = ArpConfig {
        gate: 0.0,
        ..Default::default()
    };
    assert!(scheduler.set_arpeggiator(bad_gate).is_err());
    assert!(scheduler.set_drum_pattern(DrumPattern::new("Empty", vec![])).is_err());
    assert!(scheduler
        .set_channel_mix(Voice::Bass, crate::audio::ChannelMix::new(2.0, 0.0))
        .is_err());
}

#[tokio::test]
async fn test_count_in_clicks_then_done() {
    let (backend, graph) = ready_graph().await;
    let mut scheduler = PlaybackScheduler::new(graph);

    let beats = Arc::new(Mutex::new(Vec::new()));
    let done = Arc::new(AtomicUsize::new(0));
    let beats_cb = beats.clone();
    let done_cb = done.clone();
    assert!(scheduler.count_in(
        4,
        120.0,
        move |beat| beats_cb.lock().push(beat),
        move || {
            done_cb.fetch_add(1, Ordering::SeqCst);
        },
    ));

    // clicks at 0, 0.5, 1.0, 1.5 s; done after the fourth beat, at 2.0 s
    run_for(&mut scheduler, 1.6);
    assert_eq!(*beats.lock(), vec![1, 2, 3, 4]);
    assert_eq!(done.load(Ordering::SeqCst), 0);

    run_for(&mut scheduler, 0.5);
    assert_eq!(done.load(Ordering::SeqCst), 1);
    assert!(!scheduler.is_counting_in());

    let clicks = voice_triggers(&backend, Voice::Click);
    assert_eq!(clicks.len(), 4);
    assert!(clicks[0].velocity > clicks[1].velocity); // accented downbeat
}

#[tokio::test]
async fn test_restart_replaces_session() {
    let (backend, graph) = ready_graph().await;
    let mut scheduler = PlaybackScheduler::new(graph);

    scheduler.start(PlaybackSession::new(["C"], silent(), 120.0), None);
    scheduler.start(PlaybackSession::new(["G"], silent(), 120.0), None);
    scheduler.advance(0.0);

    let chords = voice_triggers(&backend, Voice::Chords);
    assert_eq!(chords.len(), 1);
    assert_eq!(chords[0].notes, vec![67, 71, 74]);
}

#[tokio::test]
async fn test_cancelled_count_in_goes_quiet() {
    let (backend, graph) = ready_graph().await;
    let mut scheduler = PlaybackScheduler::new(graph);

    let beats = Arc::new(Mutex::new(Vec::new()));
    let done = Arc::new(AtomicUsize::new(0));
    let beats_cb = beats.clone();
    let done_cb = done.clone();
    scheduler.count_in(
        4,
        120.0,
        move |beat| beats_cb.lock().push(beat),
        move || {
            done_cb.fetch_add(1, Ordering::SeqCst);
        },
    );

    run_for(&mut scheduler, 0.6);
    scheduler.cancel_count_in();
    assert!(!scheduler.is_counting_in());
    run_for(&mut scheduler, 3.0);

    assert_eq!(*beats.lock(), vec![1, 2]);
    assert_eq!(done.load(Ordering::SeqCst), 0);
    assert_eq!(voice_triggers(&backend, Voice::Click).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_audio_reset_ends_playback_and_count_in() {
    let (backend, graph) = ready_graph().await;
    let mut scheduler = PlaybackScheduler::new(graph.clone());

    let done = Arc::new(AtomicUsize::new(0));
    let done_cb = done.clone();
    scheduler.start(PlaybackSession::new(["C", "G"], silent(), 120.0), None);
    scheduler.count_in(4, 120.0, |_| {}, move || {
        done_cb.fetch_add(1, Ordering::SeqCst);
    });
    run_for(&mut scheduler, 0.1);

    graph.reset().await.unwrap();
    scheduler.advance(0.0);
    assert!(!scheduler.is_playing());
    assert!(!scheduler.is_counting_in());
    assert_eq!(done.load(Ordering::SeqCst), 0);

    // the rebuilt graph takes a fresh session
    let before = voice_triggers(&backend, Voice::Chords).len();
    assert!(scheduler.start(PlaybackSession::new(["F"], silent(), 120.0), None));
    scheduler.advance(0.0);
    assert_eq!(voice_triggers(&backend, Voice::Chords).len(), before + 1);
}

#[tokio::test(start_paused = true)]
async fn test_realtime_driver_returns_at_loop_target() {
    let (_backend, graph) = ready_graph().await;
    let mut scheduler = PlaybackScheduler::new(graph);

    let bars = Arc::new(Mutex::new(Vec::new()));
    let sink = bars.clone();
    scheduler.on_bar(move |index| sink.lock().push(index));
    let completions = Arc::new(AtomicUsize::new(0));
    let done = completions.clone();
    let session = PlaybackSession::new(["C", "G"], silent(), 120.0).with_loop_target(1);
    scheduler.start(
        session,
        Some(Box::new(move || {
            done.fetch_add(1, Ordering::SeqCst);
        })),
    );

    let driver = scheduler.run_realtime(CancellationToken::new());
    let finished = tokio::time::timeout(Duration::from_secs(30), driver).await;
    assert!(finished.is_ok());
    assert_eq!(*bars.lock(), vec![0, 1]);
    assert_eq!(completions.load(Ordering::SeqCst), 1);
    assert!(!scheduler.is_playing());
}

#[tokio::test(start_paused = true)]
async fn test_realtime_driver_returns_after_audio_reset() {
    let (_backend, graph) = ready_graph().await;
    let mut scheduler = PlaybackScheduler::new(graph.clone());
    scheduler.start(PlaybackSession::new(["C", "G"], silent(), 120.0), None);

    let reset = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        graph.reset().await
    });

    let driver = scheduler.run_realtime(CancellationToken::new());
    let finished = tokio::time::timeout(Duration::from_secs(30), driver).await;
    assert!(finished.is_ok());
    assert!(!scheduler.is_playing());
    reset.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_realtime_driver_stops_on_cancel() {
    let (_backend, graph) = ready_graph().await;
    let mut scheduler = PlaybackScheduler::new(graph);
    scheduler.start(PlaybackSession::new(["C", "G"], silent(), 120.0), None);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(3)).await;
        trigger.cancel();
    });

    scheduler.run_realtime(cancel).await;
    // cancelling the driver leaves the session to its owner
    assert!(scheduler.is_playing());
    assert_eq!(scheduler.current_chord(), Some(1));
}
