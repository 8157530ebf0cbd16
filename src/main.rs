// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

use anyhow::{anyhow, bail, Context, Result};
use songsync::audio::PlaybackEvent;
use songsync::model::Layer;
use songsync::{LayerSelection, Session, SessionEvent, Settings};
use std::env;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::Level;

fn print_usage() {
    println!("songsync - Time-aligned lyrics and chords");
    println!();
    println!("Usage: songsync [--config <file>] [-v] <COMMAND>");
    println!();
    println!("Commands:");
    println!("  --check <audio>               Validate the song data next to <audio>");
    println!("  --blocks <audio> [width]      Print the block view (default width from settings)");
    println!("  --chordpro <audio> <out>      Export ChordPro text");
    println!("  --midi <audio> <out>          Export a 3-track MIDI file");
    println!("  --export-data <audio> [out]   Write song data JSON (default <audio>.song_data)");
    println!("  --play <audio> <block>        Preview the start of block N");
    println!("  --watch <audio>               Reload song data as it changes on disk");
    println!("  --alt                         Use the alternative layer for exports and blocks");
    println!("  --help                        Show this help message");
}

/// Open `audio`, failing if no valid song data could be imported
fn open_song(session: &mut Session, audio: &Path) -> Result<()> {
    for event in session.open(audio) {
        match event {
            SessionEvent::Loaded(source) => {
                tracing::debug!("Loaded {:?}", source);
            }
            SessionEvent::ImportRejected(err) => {
                eprintln!("Song data rejected: {}", err);
                for diagnostic in &err.diagnostics {
                    eprintln!("  {}", diagnostic);
                }
            }
            SessionEvent::NeedsProcessing(path) => {
                bail!("No valid song data for {:?}; run the processing pipeline first", path);
            }
            other => tracing::debug!("{:?}", other),
        }
    }
    if session.store().is_none() {
        bail!("No valid song data for {:?}", audio);
    }
    Ok(())
}

fn check(session: &mut Session, audio: &Path) -> Result<()> {
    open_song(session, audio)?;
    let store = session
        .store()
        .ok_or_else(|| anyhow!("No song loaded"))?;

    println!("Song data OK: {:?}", audio);
    println!("  version:   {}", store.metadata().version);
    println!("  created:   {}", store.metadata().created_at);
    println!("  words:     {}", store.words().len());
    println!("  chords:    {}", store.chords().len());
    println!("  notes:     {}", store.notes().len());
    println!("  segments:  {}", store.segments().len());
    println!("  duration:  {:.2}s", store.duration());
    if !store.alternative().is_empty() {
        println!(
            "  alternative: {} words, {} chords",
            store.alternative().words.len(),
            store.alternative().chords.len()
        );
    }
    Ok(())
}

fn print_blocks(session: &mut Session, audio: &Path, width: Option<f64>, layer: Layer) -> Result<()> {
    open_song(session, audio)?;
    let song = session
        .song_mut()
        .ok_or_else(|| anyhow!("No song loaded"))?;
    if let Some(width) = width {
        song.set_block_width(width);
    }

    let blocks = song.blocks().to_vec();
    let store = song.store();
    println!("{} blocks of {:.1}s", blocks.len(), song.block_width());
    for block in &blocks {
        let text = match layer {
            Layer::Primary => &block.text,
            Layer::Alternative => &block.alt_text,
        };
        println!(
            "{:>3}  {:>7.2}-{:<7.2}  {:<8}  {}",
            block.index,
            block.start,
            block.end,
            block.chord_symbol(store, layer),
            text
        );
    }
    Ok(())
}

fn play(session: &mut Session, audio: &Path, block: usize) -> Result<()> {
    open_song(session, audio)?;
    let request = session.play_block(block)?;
    println!("Previewing block {} ({:.1}s)...", block, session.settings().preview_seconds);

    loop {
        for event in session.poll() {
            if let SessionEvent::Playback(event) = event {
                if event.request() != request || !event.is_terminal() {
                    continue;
                }
                return match event {
                    PlaybackEvent::Failed(_, err) => Err(err.into()),
                    _ => {
                        println!("Preview complete!");
                        Ok(())
                    }
                };
            }
        }
        // Small sleep to prevent busy-waiting
        thread::sleep(Duration::from_millis(20));
    }
}

fn watch(session: &mut Session, audio: &Path) -> Result<()> {
    session.set_watch(true);
    for event in session.open(audio) {
        println!("{:?}", event);
    }

    println!("Watching song data for {:?} (press Ctrl+C to stop)...", audio);
    loop {
        for event in session.poll() {
            match event {
                SessionEvent::Loaded(source) => {
                    let words = session.store().map(|s| s.words().len()).unwrap_or(0);
                    println!("Reloaded from {:?}: {} words", source, words);
                }
                SessionEvent::ImportRejected(err) => {
                    println!("Rejected: {}", err);
                    for diagnostic in &err.diagnostics {
                        println!("  {}", diagnostic);
                    }
                }
                other => println!("{:?}", other),
            }
        }
        thread::sleep(Duration::from_millis(100));
    }
}

/// Value following a command, or a usage error
fn required<'a>(args: &'a [String], index: usize, what: &str) -> Result<&'a str> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("{} requires {}", args[0], what))
}

fn main() -> Result<()> {
    let mut args: Vec<String> = env::args().skip(1).collect();

    // Global options
    let mut verbose = false;
    let mut config_path: Option<PathBuf> = None;
    let mut layer = Layer::Primary;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-v" | "--verbose" => {
                verbose = true;
                args.remove(i);
            }
            "--alt" => {
                layer = Layer::Alternative;
                args.remove(i);
            }
            "--config" => {
                args.remove(i);
                if i >= args.len() {
                    bail!("--config requires a file");
                }
                config_path = Some(PathBuf::from(args.remove(i)));
            }
            _ => i += 1,
        }
    }

    tracing_subscriber::fmt()
        .with_max_level(if verbose { Level::DEBUG } else { Level::INFO })
        .with_target(false)
        .init();

    let settings = match &config_path {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    let problems = settings.validate();
    if !problems.is_empty() {
        for problem in &problems {
            eprintln!("Config error: {}", problem);
        }
        bail!("Invalid settings");
    }

    if args.is_empty() {
        println!("songsync - Time-aligned lyrics and chords");
        println!("Run with --help for usage information");
        return Ok(());
    }

    let layers = LayerSelection {
        lyrics: layer,
        chords: layer,
    };
    let mut session = Session::new(settings);

    match args[0].as_str() {
        "--check" => {
            let audio = required(&args, 1, "an audio file")?;
            check(&mut session, Path::new(audio))?;
        }
        "--blocks" => {
            let audio = required(&args, 1, "an audio file")?;
            let width = match args.get(2) {
                Some(w) => Some(
                    w.parse::<f64>()
                        .map_err(|_| anyhow!("Invalid block width: {}", w))?,
                ),
                None => None,
            };
            print_blocks(&mut session, Path::new(audio), width, layer)?;
        }
        "--chordpro" => {
            let audio = required(&args, 1, "an audio file")?;
            let out = required(&args, 2, "an output file")?;
            open_song(&mut session, Path::new(audio))?;
            session.export_chordpro(layers, out)?;
            println!("Wrote {}", out);
        }
        "--midi" => {
            let audio = required(&args, 1, "an audio file")?;
            let out = required(&args, 2, "an output file")?;
            open_song(&mut session, Path::new(audio))?;
            session.export_midi(layers, out)?;
            println!("Wrote {}", out);
        }
        "--export-data" => {
            let audio = required(&args, 1, "an audio file")?;
            open_song(&mut session, Path::new(audio))?;
            let written = session.export_song_data(args.get(2).map(Path::new))?;
            println!("Wrote {:?}", written);
        }
        "--play" => {
            let audio = required(&args, 1, "an audio file")?;
            let block = required(&args, 2, "a block number")?;
            let block: usize = block
                .parse()
                .with_context(|| format!("Invalid block number: {}", block))?;
            play(&mut session, Path::new(audio), block)?;
        }
        "--watch" => {
            let audio = required(&args, 1, "an audio file")?;
            watch(&mut session, Path::new(audio))?;
        }
        "--help" | "-h" => {
            print_usage();
        }
        _ => {
            eprintln!("Unknown option: {}", args[0]);
            print_usage();
            std::process::exit(1);
        }
    }

    Ok(())
}
