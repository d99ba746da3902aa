//! jam - command-line front end for the jam engine
//!
//! Subcommands:
//! - `jam export <state.json>` - Write the session as a MIDI file
//! - `jam analyze <state.json>` - Roman numerals and voicings per chord
//! - `jam play <state.json> --bars N` - Dry-run playback on the offline backend
//! - `jam patterns` - List the built-in drum patterns

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use jam::audio::{AudioGraphHandle, OfflineBackend, TriggerTarget, Voice};
use jam::drums::DrumHit;
use jam::playback::BEATS_PER_BAR;
use jam::theory::{midi_to_name, prefers_flats};
use jam::voicing::voice;
use jam::{export_midi, ChordTheory, DrumPatternStore, EngineConfig, JamState, PlaybackScheduler};

#[derive(Parser)]
#[command(name = "jam")]
#[command(about = "Chord-progression playback engine")]
#[command(version)]
struct Cli {
    /// Engine configuration (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a saved session as a Standard MIDI File
    Export {
        /// Jam state document (JSON)
        state: PathBuf,

        /// Output path (defaults to the input with a .mid extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print roman numerals and voicings for each chord
    Analyze {
        /// Jam state document (JSON)
        state: PathBuf,
    },

    /// Play a session on the offline backend and print what sounded
    Play {
        /// Jam state document (JSON)
        state: PathBuf,

        /// Number of bars to play
        #[arg(short, long, default_value = "8")]
        bars: u32,
    },

    /// List the built-in drum patterns
    Patterns,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EngineConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Export { state, output } => export(&state, output),
        Commands::Analyze { state } => analyze(&state),
        Commands::Play { state, bars } => play(&state, bars, config).await,
        Commands::Patterns => {
            let store = DrumPatternStore::new();
            for name in store.names() {
                if let Some(pattern) = store.get(name) {
                    println!("{:<20} {} steps", name, pattern.len());
                }
            }
            Ok(())
        }
    }
}

fn load_state(path: &Path) -> Result<JamState> {
    JamState::load(path).with_context(|| format!("reading {}", path.display()))
}

fn export(path: &Path, output: Option<PathBuf>) -> Result<()> {
    let state = load_state(path)?;
    let pattern = state.drum_pattern.resolve(&DrumPatternStore::new())?;
    let bytes = export_midi(&state.progression, state.bpm.round() as u32, Some(&pattern))?;

    let output = output.unwrap_or_else(|| path.with_extension("mid"));
    std::fs::write(&output, &bytes).with_context(|| format!("writing {}", output.display()))?;
    eprintln!("Wrote {} bytes of MIDI to {}", bytes.len(), output.display());
    Ok(())
}

fn analyze(path: &Path) -> Result<()> {
    let state = load_state(path)?;
    let theory = ChordTheory::new();
    let flats = prefers_flats(&state.key);
    let voiced = voice(&state.progression, &state.voicing);

    println!("Key: {} {}", state.key, state.scale);
    for (i, (symbol, notes)) in state.progression.iter().zip(&voiced).enumerate() {
        let numeral = theory.roman_numeral(symbol, &state.key, state.scale);
        let names: Vec<String> = notes.iter().map(|n| midi_to_name(*n, flats)).collect();
        let marker = if theory.is_diatonic(symbol, &state.key, state.scale) {
            ""
        } else {
            " (borrowed)"
        };
        println!("{:>2}. {:<8} {:<6}{} {}", i + 1, symbol, numeral, marker, names.join(" "));
    }
    Ok(())
}

async fn play(path: &Path, bars: u32, config: EngineConfig) -> Result<()> {
    let state = load_state(path)?;
    let session = state.to_session(&DrumPatternStore::new())?;
    let bar_secs = BEATS_PER_BAR * 60.0 / session.bpm;

    let backend = Arc::new(OfflineBackend::new());
    let graph = AudioGraphHandle::new(backend.clone(), config);
    graph.init().await?;

    let mut scheduler = PlaybackScheduler::new(graph);
    let progression = session.progression.clone();
    scheduler.on_bar(move |index| println!("bar: chord {} ({})", index + 1, progression[index]));
    if !scheduler.start(session, Some(Box::new(|| println!("loop target reached")))) {
        anyhow::bail!("playback did not start");
    }

    // bar one sounds at position zero
    scheduler.advance(0.0);
    for _ in 1..bars {
        if !scheduler.is_playing() {
            break;
        }
        scheduler.advance(bar_secs);
    }
    scheduler.stop();

    let triggers = backend.triggers();
    for voice in [Voice::Chords, Voice::Bass, Voice::Harmony] {
        let count = triggers.iter().filter(|t| t.target == TriggerTarget::Voice(voice)).count();
        println!("{:?}: {} notes", voice, count);
    }
    for hit in DrumHit::ALL {
        let count = triggers.iter().filter(|t| t.target == TriggerTarget::Drum(hit)).count();
        println!("{}: {} hits", hit.name(), count);
    }
    Ok(())
}
