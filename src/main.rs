use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::Parser;
use crossterm::terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

use fretfall::audio::{self, AudioHandle, LogObserver, Stem};
use fretfall::chart::{self, Difficulty};
use fretfall::judge::Stats;
use fretfall::loader::song_loader;
use fretfall::logging;
use fretfall::middle::{Session, SessionOptions};
use fretfall::pipeline::settings::{self, MIN_LOOKAHEAD_SEC};
use fretfall::pipeline::song_ini;
use fretfall::shared::{InputEvent, TARGET_FPS};
use fretfall::tui;

#[derive(Parser, Debug)]
#[command(name = "fretfall", version, about = "Play guitar charts along with their stems in the terminal")]
struct Args {
    /// Song folder (notes.chart or notes.mid plus audio stems), or a chart file
    path: PathBuf,

    /// Extra stem to mix in (repeatable)
    #[arg(long = "stem", value_name = "FILE")]
    stems: Vec<PathBuf>,

    /// easy, medium, hard or expert (default: expert, else the hardest charted)
    #[arg(short, long, value_parser = parse_difficulty)]
    difficulty: Option<Difficulty>,

    /// Seconds of chart visible ahead of the strike line
    #[arg(long)]
    lookahead_sec: Option<f64>,

    /// Hammer-on spacing threshold in ticks (overrides song.ini)
    #[arg(long)]
    hopo_frequency: Option<u64>,

    /// Initial gain for a stem, e.g. --gain drums=0.5 (repeatable)
    #[arg(long = "gain", value_name = "NAME=GAIN", value_parser = parse_gain)]
    gains: Vec<(String, f32)>,

    /// Silence a stem by name (repeatable)
    #[arg(long = "mute", value_name = "NAME")]
    mutes: Vec<String>,

    /// Write logs here instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,
}

fn parse_difficulty(s: &str) -> Result<Difficulty, String> {
    Difficulty::from_name(s).ok_or_else(|| format!("unknown difficulty '{s}'"))
}

fn parse_gain(s: &str) -> Result<(String, f32), String> {
    let (name, gain) = s.split_once('=').ok_or("expected NAME=GAIN")?;
    let gain: f32 = gain.trim().parse().map_err(|e| format!("bad gain '{gain}': {e}"))?;
    Ok((name.trim().to_string(), gain.max(0.0)))
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init_logging(args.log_file.as_deref(), args.verbose)?;

    let settings_path = settings::default_settings_path();
    let settings = settings::load_settings(&settings_path);

    let song = song_loader::resolve(&args.path, &args.stems)?;
    let ini = song_ini::load_song_ini(&song.dir);
    let chart = chart::load_chart(&song.chart)
        .with_context(|| format!("failed to load chart {}", song.chart.display()))?;

    let difficulty = args.difficulty.unwrap_or_else(|| {
        if chart.has_difficulty(Difficulty::Expert) {
            Difficulty::Expert
        } else {
            chart.best_difficulty().unwrap_or(Difficulty::Expert)
        }
    });

    let output = audio::open_output()?;
    let stems = load_stems(&song.stems, output.sample_rate(), &args)?;
    let player_stem = audio::player_stem_index(&stems);
    match player_stem {
        Some(i) => log::info!("player stem: {}", stems[i].name()),
        None => log::info!("no guitar stem, miss feedback is silent"),
    }

    let lookahead_sec = args
        .lookahead_sec
        .map_or(settings.lookahead(), |s| s.max(MIN_LOOKAHEAD_SEC));
    let mut session = Session::new(
        chart,
        SessionOptions {
            title: ini.title(),
            difficulty,
            hopo_frequency: args.hopo_frequency.unwrap_or(ini.hopo_frequency),
            song_offset_ms: ini.offset_ms,
            lookahead_sec,
            settings: settings.clone(),
            settings_path: Some(settings_path),
            song_dir: Some(song.dir.clone()),
            player_stem,
        },
    )?;

    let audio = output.start(stems)?;
    log::info!("stems: {}", audio.stem_names().join(", "));

    let release_events = terminal::supports_keyboard_enhancement().unwrap_or(false);
    let stats = {
        terminal::enable_raw_mode()?;
        let _guard = RawModeGuard { enhanced: release_events }; // auto drops when out of scope
        crossterm::execute!(
            std::io::stdout(),
            terminal::EnterAlternateScreen,
            crossterm::event::EnableFocusChange
        )?;
        if release_events {
            // real press/release detection for held frets
            crossterm::execute!(
                std::io::stdout(),
                crossterm::event::PushKeyboardEnhancementFlags(
                    crossterm::event::KeyboardEnhancementFlags::REPORT_EVENT_TYPES
                )
            )?;
        }
        let mut tui_state = tui::mode::TuiState::new(&settings.keys, release_events);
        play(&mut session, &audio, &mut tui_state)?
    };

    drop(audio);
    println!(
        "score {} | hit {}/{} | final streak {}",
        stats.score,
        stats.hit,
        stats.hit + stats.miss,
        stats.streak
    );
    Ok(())
}

fn load_stems(paths: &[PathBuf], sample_rate: u32, args: &Args) -> anyhow::Result<Vec<Stem>> {
    let mut stems = Vec::with_capacity(paths.len());
    for (i, path) in paths.iter().enumerate() {
        log::info!("loading stem [{}/{}] {}", i + 1, paths.len(), path.display());
        let mut stem = audio::decode_stem(path, sample_rate)
            .with_context(|| format!("failed to decode {}", path.display()))?;
        if let Some((_, gain)) = args.gains.iter().find(|(n, _)| n.eq_ignore_ascii_case(stem.name())) {
            stem = stem.with_gain(*gain);
        }
        if args.mutes.iter().any(|n| n.eq_ignore_ascii_case(stem.name())) {
            stem.set_enabled(false);
        }
        stems.push(stem);
    }
    for (name, _) in &args.gains {
        if !stems.iter().any(|s| s.name().eq_ignore_ascii_case(name)) {
            log::warn!("--gain {name}: no stem with that name");
        }
    }
    if stems.is_empty() {
        log::warn!("no audio stems, playing with a silent clock");
    }
    Ok(stems)
}

// fixed-rate loop: poll input until the next frame is due, judge, draw
fn play(session: &mut Session, audio: &AudioHandle, tui_state: &mut tui::mode::TuiState) -> anyhow::Result<Stats> {
    let backend = CrosstermBackend::new(std::io::stdout());
    let mut term = Terminal::new(backend)?;
    term.clear()?;

    let frame_time = Duration::from_secs_f64(1.0 / TARGET_FPS as f64);
    let mut next_frame = Instant::now() + frame_time;
    let mut last_tick = Instant::now();
    let mut observer = LogObserver::default();

    loop {
        let ds = session.display_state();
        term.draw(|frame| {
            tui::view::render(frame, frame.area(), &ds, tui_state);
        })?;
        if session.is_complete() {
            break;
        }

        let timeout = next_frame.saturating_duration_since(Instant::now());
        let events = tui::input::poll_input(timeout, tui_state)?;
        let now = Instant::now();
        next_frame = if now > next_frame + frame_time { now + frame_time } else { next_frame + frame_time };

        for event in events {
            if event == InputEvent::Quit {
                return Ok(session.judge().stats());
            }
            for cmd in session.handle_input(event, audio.song_time()) {
                audio.send(cmd);
            }
        }

        let now = Instant::now();
        let dt = now.duration_since(last_tick).as_secs_f64();
        last_tick = now;
        for cmd in session.tick(audio.song_time(), dt) {
            audio.send(cmd);
        }
        audio.pump_events(&mut observer);
    }

    // leave the final screen up briefly so the result is readable
    std::thread::sleep(Duration::from_millis(1500));
    Ok(session.judge().stats())
}

struct RawModeGuard {
    enhanced: bool,
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if self.enhanced {
            let _ = crossterm::execute!(
                std::io::stdout(),
                crossterm::event::PopKeyboardEnhancementFlags
            );
        }
        let _ = crossterm::execute!(
            std::io::stdout(),
            crossterm::event::DisableFocusChange,
            terminal::LeaveAlternateScreen,
            crossterm::cursor::Show
        );
        let _ = terminal::disable_raw_mode();
    }
}
