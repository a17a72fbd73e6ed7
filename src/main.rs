use fretboard::animation::Animator;
use fretboard::chord::ChordShape;
use fretboard::config::FretboardConfig;
use fretboard::coordinator::Coordinator;
use fretboard::interaction::Fretboard;
use fretboard::notes::note_name;
use fretboard::output::AudioOutput;
use fretboard::page::build_page;
use fretboard::render::RenderTree;
use fretboard::synth::{SynthHandle, VoiceBank, DEFAULT_SAMPLE_RATE};
use fretboard::types::*;
use fretboard::wav_export;
#[cfg(feature = "gui")]
use fretboard::webview_app;
use fretboard::ws_server::WsServer;

use clap::Parser;
use crossbeam_channel::{bounded, unbounded};
use log::{error, info, warn};
use std::path::PathBuf;
use std::process;
use std::thread;

#[derive(Parser)]
#[command(name = "fretboard")]
#[command(about = "Interactive virtual guitar fretboard")]
struct Cli {
    /// JSON config file (canvas, tuning, palette, note duration, tempo)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the effective config to this file and continue
    #[arg(long)]
    save_config: Option<PathBuf>,

    /// HTTP/WebSocket bind address
    #[arg(long, default_value = "127.0.0.1:8080")]
    addr: String,

    /// Disable the native GUI window
    #[arg(long)]
    no_gui: bool,

    /// Suppress auto-opening the browser when running without the GUI
    #[arg(long)]
    no_open: bool,

    /// Starting mode: fret, strum or chord
    #[arg(long)]
    mode: Option<Mode>,

    /// Note length token: 3n, 8t, 1m or seconds
    #[arg(long)]
    duration: Option<String>,

    /// Tempo for tempo-relative durations
    #[arg(long)]
    bpm: Option<f64>,

    /// Scale the canvas, keeping its aspect ratio
    #[arg(long)]
    scale: Option<f64>,

    /// Preselect a chord shape, low string first (e.g. x32010); starts in chord mode
    #[arg(long)]
    chord: Option<ChordShape>,

    /// Render the chord to a WAV file and exit
    #[arg(long, requires = "chord")]
    export_wav: Option<PathBuf>,

    /// Only play on click in fret mode
    #[arg(long)]
    no_fret_hover: bool,

    /// Upper bound on frame updates sent to the page per second
    #[arg(long, default_value_t = 120)]
    max_fps: u32,
}

fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .format_timestamp_millis()
    .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => FretboardConfig::load(path).unwrap_or_else(|| {
            warn!("Using default config");
            FretboardConfig::default()
        }),
        None => FretboardConfig::default(),
    };
    if let Some(d) = &cli.duration {
        config.note_duration = d.clone();
    }
    if let Some(bpm) = cli.bpm {
        config.bpm = bpm;
    }
    if let Some(factor) = cli.scale {
        config.scale(factor);
    }
    if let Some(mode) = cli.mode {
        config.initial_mode = mode;
    }
    if cli.no_fret_hover {
        config.fret_mode_hover = false;
    }
    if let Err(e) = config.validate() {
        error!("{}", e);
        process::exit(2);
    }
    if let Some(path) = &cli.save_config {
        if let Err(e) = config.save(path) {
            warn!("{}", e);
        }
    }
    let duration = match config.duration() {
        Ok(d) => d,
        Err(e) => {
            error!("{}", e);
            process::exit(2);
        }
    };

    let chord_notes = match &cli.chord {
        Some(shape) => match shape.notes(&config.tuning, config.fret_count) {
            Ok(n) => Some(n),
            Err(e) => {
                error!("{}", e);
                process::exit(2);
            }
        },
        None => None,
    };

    if let Some(path) = &cli.export_wav {
        let notes = chord_notes.unwrap_or_default();
        match wav_export::export_chord(path, &notes, duration, config.bpm) {
            Ok(_) => process::exit(0),
            Err(e) => {
                error!("{}", e);
                process::exit(1);
            }
        }
    }

    let gui_enabled = cfg!(feature = "gui") && !cli.no_gui;
    let tuning: Vec<String> = config.tuning.iter().map(|&n| note_name(n)).collect();

    info!("═══════════════════════════════════════════════");
    info!("  FRETBOARD v{}", env!("CARGO_PKG_VERSION"));
    info!("  Tuning: {}", tuning.join(" "));
    info!("  Canvas: {}x{}  {} frets", config.width, config.height, config.fret_count);
    info!("  Notes: {} @ {} bpm", duration, config.bpm);
    info!("  Server: http://{}", cli.addr);
    info!("═══════════════════════════════════════════════");

    // Channel: page + voices → coordinator
    let (input_tx, input_rx) = unbounded::<InputEvent>();
    // Channel: coordinator → server
    let (frame_tx, frame_rx) = bounded::<FrameUpdate>(256);

    let bank = VoiceBank::new(config.string_count(), DEFAULT_SAMPLE_RATE)
        .with_bpm(config.bpm)
        .with_silence_sender(input_tx.clone());
    let synth = SynthHandle::new(bank);
    let audio = AudioOutput::start(synth.bank());
    info!("Audio: {}", if audio.is_silent() { "silent renderer" } else { "output device" });

    let geometry = config.geometry();
    let tree = RenderTree::build(&geometry, &config.tuning, &config.palette);

    let mut board = Fretboard::new(&config.tuning, config.fret_count, duration)
        .with_fret_mode_hover(config.fret_mode_hover);
    board.set_mode(config.initial_mode);
    if let Some(notes) = &chord_notes {
        board.set_mode(Mode::Chord);
        if let Err(e) = board.select_chord(notes) {
            warn!("{}", e);
        }
    }
    let page = build_page(&tree, board.mode());

    let server = match WsServer::bind(&cli.addr, frame_rx, input_tx.clone(), cli.max_fps, page, tree.to_svg()) {
        Ok(s) => s,
        Err(e) => {
            error!("Server failed to bind {}: {}", cli.addr, e);
            process::exit(1);
        }
    };
    let url = match server.local_addr() {
        Ok(a) => format!("http://{}", a),
        Err(_) => format!("http://{}", cli.addr),
    };

    let mut handles = Vec::new();
    handles.push(
        thread::Builder::new()
            .name("ws-server".into())
            .spawn(move || server.run()),
    );

    let animator = Animator::new(geometry);
    handles.push(
        thread::Builder::new()
            .name("coordinator".into())
            .spawn(move || {
                Coordinator::new(input_rx, vec![frame_tx], board, animator, synth).run();
            }),
    );

    let handles: Vec<_> = handles
        .into_iter()
        .filter_map(|h| h.map_err(|e| error!("Thread spawn failed: {}", e)).ok())
        .collect();

    // ─── Launch WebView on main thread (blocks until window closes) ──
    //
    // WKWebView (via wry/tao) MUST run on the main thread on macOS.
    #[cfg(feature = "gui")]
    if gui_enabled {
        info!("Launching WebView at {}", url);
        webview_app::run(&url, config.width, config.height);
    }

    if !gui_enabled && !cli.no_open {
        #[cfg(target_os = "macos")]
        let _ = process::Command::new("open").arg(&url).spawn();
        #[cfg(target_os = "linux")]
        let _ = process::Command::new("xdg-open").arg(&url).spawn();
        info!("Browser opened at {}", url);
    }

    info!("Running headless. Press Ctrl+C to stop.");
    for h in handles {
        let _ = h.join();
    }
}
