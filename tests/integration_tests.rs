//! Integration tests for the jam engine
//!
//! Tests whole flows: saved session to MIDI file, saved session to playback,
//! generator answer to playable session, and training with a configured graph.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use midly::{MetaMessage, MidiMessage, Smf, TrackEventKind};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

use jam::audio::{AudioGraphHandle, OfflineBackend, TriggerTarget, Voice};
use jam::generator::parse_generated;
use jam::jam_state::PatternRef;
use jam::{
    export_midi, DrumPatternStore, EngineConfig, JamError, JamState, PlaybackScheduler, TrainingController,
    TrainingState,
};

const SESSION: &str = r#"{
    "version": 2,
    "progression": ["C", "G", "Am", "F"],
    "bpm": 120,
    "key": "C",
    "scale": "Major",
    "drumPattern": "Four on the Floor",
    "loopCount": 2
}"#;

fn note_ons(smf: &Smf, track: usize) -> Vec<(u32, u8)> {
    let mut tick = 0;
    let mut ons = Vec::new();
    for event in &smf.tracks[track] {
        tick += event.delta.as_int();
        if let TrackEventKind::Midi {
            message: MidiMessage::NoteOn { key, .. },
            ..
        } = event.kind
        {
            ons.push((tick, key.as_int()));
        }
    }
    ons
}

#[test]
fn test_export_saved_session() {
    let state = JamState::from_json(SESSION).unwrap();
    let pattern = state.drum_pattern.resolve(&DrumPatternStore::new()).unwrap();
    let bytes = export_midi(&state.progression, state.bpm as u32, Some(&pattern)).unwrap();

    let smf = Smf::parse(&bytes).unwrap();
    assert_eq!(smf.tracks.len(), 2);

    let chords = note_ons(&smf, 0);
    assert_eq!(chords.len(), 12);
    // G is voiced from G4
    assert_eq!(&chords[3..6], &[(1920, 67), (1920, 71), (1920, 74)]);

    let tempo = smf.tracks[0].iter().find_map(|e| match e.kind {
        TrackEventKind::Meta(MetaMessage::Tempo(t)) => Some(t.as_int()),
        _ => None,
    });
    assert_eq!(tempo, Some(500_000));

    // four on the floor: a kick on every beat of every bar
    let kicks: Vec<u32> = note_ons(&smf, 1)
        .into_iter()
        .filter(|(_, key)| *key == 36)
        .map(|(tick, _)| tick)
        .collect();
    assert_eq!(kicks.len(), 16);
    assert!(kicks.iter().all(|t| t % 480 == 0));
}

#[test]
fn test_export_empty_progression_is_rejected() {
    let result = export_midi(&[], 120, None);
    assert!(matches!(result, Err(JamError::Validation(_))));
}

#[tokio::test]
async fn test_saved_session_plays_two_loops() {
    let state = JamState::from_json(SESSION).unwrap();
    let session = state.to_session(&DrumPatternStore::new()).unwrap();

    let backend = Arc::new(OfflineBackend::new());
    let graph = AudioGraphHandle::new(backend.clone(), EngineConfig::default());
    graph.init().await.unwrap();

    let mut scheduler = PlaybackScheduler::new(graph);
    let bars = Arc::new(Mutex::new(Vec::new()));
    let sink = bars.clone();
    scheduler.on_bar(move |index| sink.lock().push(index));
    let completions = Arc::new(AtomicUsize::new(0));
    let done = completions.clone();
    assert!(scheduler.start(
        session,
        Some(Box::new(move || {
            done.fetch_add(1, Ordering::SeqCst);
        }))
    ));

    for _ in 0..2000 {
        scheduler.advance(0.01);
    }

    assert_eq!(*bars.lock(), vec![0, 1, 2, 3, 0, 1, 2, 3]);
    assert_eq!(completions.load(Ordering::SeqCst), 1);
    assert!(!scheduler.is_playing());

    let triggers = backend.triggers();
    let chords = triggers
        .iter()
        .filter(|t| t.target == TriggerTarget::Voice(Voice::Chords))
        .count();
    let bass = triggers
        .iter()
        .filter(|t| t.target == TriggerTarget::Voice(Voice::Bass))
        .count();
    assert_eq!(chords, 8);
    assert_eq!(bass, 8);
}

#[test]
fn test_generated_progression_becomes_a_session() {
    let generated = parse_generated(
        r#"{"key": "D", "scale": "Minor", "progression": ["Dm", "Bb", "F", "C", "Dm", "Gm", "A7", "Dm"]}"#,
    )
    .unwrap();

    let state = JamState {
        progression: generated.progression.clone(),
        key: generated.key.clone(),
        scale: generated.scale,
        drum_pattern: PatternRef::Named("Half Time".to_string()),
        ..JamState::default()
    };
    state.validate().unwrap();

    let reloaded = JamState::from_json(&state.to_json().unwrap()).unwrap();
    assert_eq!(reloaded, state);
    assert_eq!(reloaded.to_session(&DrumPatternStore::new()).unwrap().progression.len(), 8);
}

#[tokio::test(start_paused = true)]
async fn test_training_uses_configured_loops_and_count_in() {
    let config = EngineConfig::from_yaml("count-in-beats: 2\ntraining-loops: 1\nreset-settle-ms: 20\n").unwrap();
    let backend = Arc::new(OfflineBackend::new());
    let graph = AudioGraphHandle::new(backend.clone(), config);
    graph.init().await.unwrap();

    let mut controller = TrainingController::new(PlaybackScheduler::new(graph));
    let phases = Arc::new(Mutex::new(Vec::new()));
    let sink = phases.clone();
    controller.on_phase(move |state| sink.lock().push(state));

    let mut state = JamState::from_json(SESSION).unwrap();
    state.loop_count = None;
    assert!(controller.start(state.to_session(&DrumPatternStore::new()).unwrap()));

    // two clicks, then one pass of four bars
    controller.advance(1.0).await.unwrap();
    assert_eq!(controller.state(), TrainingState::Playing);
    controller.advance(8.0).await.unwrap();

    assert_eq!(
        *phases.lock(),
        vec![
            TrainingState::CountingIn,
            TrainingState::Playing,
            TrainingState::Resetting,
            TrainingState::CountingIn,
        ]
    );

    controller.stop();
    assert_eq!(controller.state(), TrainingState::Idle);
}
