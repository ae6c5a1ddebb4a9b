// The session sits between the terminal and the audio engine: it owns the
// chart, the judge and the offsets, turns input into judgements, and answers
// with the audio commands that should follow (start, pause, player gain).
use std::path::PathBuf;

use crate::audio_api::AudioCommand;
use crate::chart::{build_chords, Chord, Difficulty, ParsedChart, TrackFilter};
use crate::judge::{player_gain_for, JudgeConfig, JudgeEngine, Judgement, PlayState};
use crate::pipeline::settings::{self, Settings};
use crate::pipeline::song_ini;
use crate::shared::{DisplayState, InputEvent};

const PREFERRED_TRACK: &str = "PART GUITAR";

pub struct SessionOptions {
    pub title: String,
    pub difficulty: Difficulty,
    pub hopo_frequency: u64,
    pub song_offset_ms: f64,
    pub lookahead_sec: f64,
    pub settings: Settings,
    // where offset changes are written back; None keeps them in memory
    pub settings_path: Option<PathBuf>,
    pub song_dir: Option<PathBuf>,
    pub player_stem: Option<usize>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        let settings = Settings::default();
        Self {
            title: String::new(),
            difficulty: Difficulty::Expert,
            hopo_frequency: crate::chart::DEFAULT_HOPO_FREQUENCY,
            song_offset_ms: 0.0,
            lookahead_sec: settings.lookahead(),
            settings,
            settings_path: None,
            song_dir: None,
            player_stem: None,
        }
    }
}

pub struct Session {
    chart: ParsedChart,
    tracks: TrackFilter,
    judge: JudgeEngine,
    song_offset_ms: f64,
    player_gain: f32,
    opts: SessionOptions,
}

impl Session {
    pub fn new(chart: ParsedChart, opts: SessionOptions) -> anyhow::Result<Self> {
        let preferred = chart
            .track_names
            .iter()
            .find(|t| t.name.contains(PREFERRED_TRACK))
            .map(|t| TrackFilter::Track(t.track));

        let build = |tracks| build_chords(&chart.notes, opts.difficulty, tracks, opts.hopo_frequency);
        let (tracks, chords) = match preferred.map(|t| (t, build(t))) {
            Some((t, chords)) if !chords.is_empty() => (t, chords),
            _ => (TrackFilter::All, build(TrackFilter::All)),
        };
        if chords.is_empty() {
            anyhow::bail!("chart has no {} notes", opts.difficulty.name());
        }
        log::info!(
            "{} chords on {} ({:?}), {} hammer-ons",
            chords.len(),
            opts.difficulty.name(),
            tracks,
            chords.iter().filter(|c| c.is_hopo).count()
        );

        let judge = JudgeEngine::new(chords, JudgeConfig::default());
        let player_gain = judge.player_gain();
        Ok(Self {
            chart,
            tracks,
            judge,
            song_offset_ms: opts.song_offset_ms,
            player_gain,
            opts,
        })
    }

    pub fn judge(&self) -> &JudgeEngine {
        &self.judge
    }

    pub fn tracks(&self) -> TrackFilter {
        self.tracks
    }

    pub fn state(&self) -> PlayState {
        self.judge.state()
    }

    pub fn is_complete(&self) -> bool {
        self.judge.state() == PlayState::SongComplete
    }

    pub fn total_offset_sec(&self) -> f64 {
        (self.opts.settings.global_offset_ms + self.song_offset_ms) / 1000.0
    }

    /// Judge time for a given audio clock reading.
    pub fn song_time(&self, clock_secs: f64) -> f64 {
        clock_secs + self.total_offset_sec()
    }

    pub fn handle_input(&mut self, event: InputEvent, clock_secs: f64) -> Vec<AudioCommand> {
        let t = self.song_time(clock_secs);
        let mut cmds = Vec::new();

        let judgement = match event {
            InputEvent::FretDown(lane) => self.judge.press_fret(lane, t),
            InputEvent::FretUp(lane) => self.judge.release_fret(lane, t),
            InputEvent::Strum if self.judge.state() == PlayState::WaitingToStart => {
                if self.judge.start() {
                    log::info!("song started");
                    cmds.push(AudioCommand::Play);
                }
                None
            }
            InputEvent::Strum => self.judge.strum(t),
            InputEvent::TogglePause => {
                if self.judge.pause() {
                    cmds.push(AudioCommand::Pause);
                } else if self.judge.resume() {
                    cmds.push(AudioCommand::Play);
                }
                None
            }
            InputEvent::Restart => {
                if self.judge.restart() {
                    cmds.extend([AudioCommand::Rewind, AudioCommand::Play]);
                }
                None
            }
            InputEvent::NudgeSongOffset(ms) => {
                self.nudge_song_offset(ms);
                None
            }
            InputEvent::NudgeGlobalOffset(ms) => {
                self.nudge_global_offset(ms);
                None
            }
            InputEvent::SelectTrack(track) => {
                self.switch_tracks(TrackFilter::Track(track));
                None
            }
            InputEvent::AllTracks => {
                self.switch_tracks(TrackFilter::All);
                None
            }
            InputEvent::FocusLost => {
                self.judge.clear_held();
                None
            }
            InputEvent::Quit => None,
        };

        if let Some(j) = judgement {
            log_judgement(&j, t);
        }
        self.sync_player_gain(&mut cmds);
        cmds
    }

    pub fn tick(&mut self, clock_secs: f64, dt: f64) -> Vec<AudioCommand> {
        let t = self.song_time(clock_secs);
        let was_complete = self.is_complete();
        for j in self.judge.update(t) {
            log_judgement(&j, t);
        }
        self.judge.decay_feedback(dt);

        let mut cmds = Vec::new();
        if self.is_complete() && !was_complete {
            let stats = self.judge.stats();
            log::info!(
                "song complete: score {} hit {} miss {}",
                stats.score,
                stats.hit,
                stats.miss
            );
            cmds.push(AudioCommand::Pause);
        }
        self.sync_player_gain(&mut cmds);
        cmds
    }

    // only emits when the target actually changes
    fn sync_player_gain(&mut self, cmds: &mut Vec<AudioCommand>) {
        let Some(stem) = self.opts.player_stem else {
            return;
        };
        let gain = player_gain_for(self.judge.consecutive_misses(), &self.judge.config().feedback);
        if gain != self.player_gain {
            self.player_gain = gain;
            cmds.push(AudioCommand::SetTargetGain { stem, gain });
        }
    }

    fn switch_tracks(&mut self, tracks: TrackFilter) {
        if let TrackFilter::Track(t) = tracks {
            if self.chart.max_track().is_none_or(|max| t > max) {
                log::debug!("track {t} doesn't exist, keeping {:?}", self.tracks);
                return;
            }
        }
        let chords = build_chords(&self.chart.notes, self.opts.difficulty, tracks, self.opts.hopo_frequency);
        let count = chords.len();
        if self.judge.replace_chords(chords) {
            log::info!("switched to {tracks:?}: {count} chords");
            self.tracks = tracks;
        } else {
            log::warn!("{tracks:?} has no {} notes, keeping {:?}", self.opts.difficulty.name(), self.tracks);
        }
    }

    fn nudge_song_offset(&mut self, delta_ms: f64) {
        self.song_offset_ms += delta_ms;
        if let Some(dir) = &self.opts.song_dir {
            if let Err(e) = song_ini::save_offset(dir, self.song_offset_ms) {
                log::warn!("could not save song offset: {e:#}");
            }
        }
    }

    fn nudge_global_offset(&mut self, delta_ms: f64) {
        self.opts.settings.global_offset_ms += delta_ms;
        if let Some(path) = &self.opts.settings_path {
            if let Err(e) = settings::save_settings(path, &self.opts.settings) {
                log::warn!("could not save settings: {e:#}");
            }
        }
    }

    fn track_label(&self) -> String {
        match self.tracks {
            TrackFilter::All => "All tracks".to_string(),
            TrackFilter::Track(t) => match self.chart.track_name(t) {
                Some(name) => format!("{t}: {name}"),
                None => format!("Track {t}"),
            },
        }
    }

    pub fn display_state(&self) -> DisplayState<'_> {
        let t = self.judge.song_time();
        DisplayState {
            title: &self.opts.title,
            chords: self.judge.chords(),
            view_cursor: self.judge.view_cursor(t),
            song_time: t,
            lookahead_sec: self.opts.lookahead_sec,
            held_mask: self.judge.held_mask(),
            stats: self.judge.stats(),
            multiplier: self.judge.multiplier(),
            feedback: self.judge.feedback(),
            lane_effects: self.judge.lane_effects(),
            play_state: self.judge.state(),
            difficulty: self.opts.difficulty,
            track_label: self.track_label(),
            song_offset_ms: self.song_offset_ms,
            global_offset_ms: self.opts.settings.global_offset_ms,
        }
    }

    pub fn chords(&self) -> &[Chord] {
        self.judge.chords()
    }
}

fn log_judgement(j: &Judgement, t: f64) {
    match j {
        Judgement::Hit { chord, grade, delta } => {
            log::debug!("hit chord {chord} {} ({:+.0} ms) at {t:.3}", grade.label(), delta * 1000.0)
        }
        Judgement::Missed { chord } => log::debug!("missed chord {chord} at {t:.3}"),
        other => log::debug!("{other:?} at {t:.3}"),
    }
}
