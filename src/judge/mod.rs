//! Judging state machine.
//!
//! The engine is pure: callers pass song time (already offset-corrected) in,
//! judgements come back out. It never talks to audio or the terminal.
pub mod timing;

use crate::chart::{Chord, NUM_LANES};

pub use timing::{frets_match, HitGrade, ScoringRules, TimingWindows};

/// Seconds after the last chord before the song counts as complete.
pub const GRACE_PERIOD_SEC: f64 = 2.0;
/// How long feedback text stays on screen.
pub const FEEDBACK_SEC: f64 = 0.5;
/// How long a lane flashes after a hit or miss.
pub const LANE_EFFECT_SEC: f64 = 0.2;

// look-back for the view cursor: recent chords and visible sustain tails
const VIEW_RECENT_SEC: f64 = 0.5;
const VIEW_SUSTAIN_SEC: f64 = 0.3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayState {
    WaitingToStart,
    Playing,
    Paused,
    SongComplete,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    pub score: i64,
    pub streak: u32,
    pub hit: u32,
    pub miss: u32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Judgement {
    Hit { chord: usize, grade: HitGrade, delta: f64 },
    // inside the window with the wrong frets; the chord stays pending
    WrongFrets { chord: usize, delta: f64 },
    // swept past its window
    Missed { chord: usize },
    // outside the window, feedback only
    TooEarly { delta: f64 },
    TooLate { delta: f64 },
}

impl Judgement {
    /// Whether this outcome changed the hit/miss counters.
    pub fn is_transition(&self) -> bool {
        matches!(
            self,
            Judgement::Hit { .. } | Judgement::WrongFrets { .. } | Judgement::Missed { .. }
        )
    }

    pub fn feedback(&self) -> Option<&'static str> {
        match self {
            Judgement::WrongFrets { .. } => Some("WRONG FRETS"),
            Judgement::TooEarly { .. } => Some("TOO EARLY"),
            Judgement::TooLate { .. } => Some("TOO LATE"),
            Judgement::Hit { .. } | Judgement::Missed { .. } => None,
        }
    }
}

/// Flash shown on a lane's strike cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LaneEffect {
    Hit(HitGrade),
    Miss,
}

/// Player-stem gain policy driven by the run of consecutive misses.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FeedbackConfig {
    pub miss_threshold: u32,
    pub full_gain: f32,
    pub quiet_gain: f32,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            miss_threshold: 2,
            full_gain: 1.0,
            quiet_gain: 0.1,
        }
    }
}

pub fn player_gain_for(consecutive_misses: u32, config: &FeedbackConfig) -> f32 {
    if consecutive_misses >= config.miss_threshold {
        config.quiet_gain
    } else {
        config.full_gain
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct JudgeConfig {
    pub windows: TimingWindows,
    pub scoring: ScoringRules,
    pub feedback: FeedbackConfig,
}

pub struct JudgeEngine {
    chords: Vec<Chord>,
    cursor: usize,
    held: u8,
    stats: Stats,
    consecutive_misses: u32,
    state: PlayState,
    config: JudgeConfig,
    song_time: f64,
    feedback: Option<(&'static str, f64)>,
    // newest effect per lane with its remaining time
    lane_effects: [Option<(LaneEffect, f64)>; NUM_LANES],
}

impl JudgeEngine {
    pub fn new(chords: Vec<Chord>, config: JudgeConfig) -> Self {
        Self {
            chords,
            cursor: 0,
            held: 0,
            stats: Stats::default(),
            consecutive_misses: 0,
            state: PlayState::WaitingToStart,
            config,
            song_time: 0.0,
            feedback: None,
            lane_effects: [None; NUM_LANES],
        }
    }

    pub fn chords(&self) -> &[Chord] {
        &self.chords
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    pub fn held_mask(&self) -> u8 {
        self.held
    }

    pub fn consecutive_misses(&self) -> u32 {
        self.consecutive_misses
    }

    pub fn config(&self) -> &JudgeConfig {
        &self.config
    }

    /// Song time seen by the last update.
    pub fn song_time(&self) -> f64 {
        self.song_time
    }

    pub fn feedback(&self) -> Option<&'static str> {
        self.feedback.map(|(text, _)| text)
    }

    pub fn lane_effects(&self) -> [Option<LaneEffect>; NUM_LANES] {
        self.lane_effects.map(|slot| slot.map(|(effect, _)| effect))
    }

    pub fn multiplier(&self) -> u32 {
        self.config.scoring.display_multiplier(self.stats.streak)
    }

    pub fn player_gain(&self) -> f32 {
        player_gain_for(self.consecutive_misses, &self.config.feedback)
    }

    // ── state transitions ─────────────────────────────────────────

    pub fn start(&mut self) -> bool {
        self.transition(PlayState::WaitingToStart, PlayState::Playing)
    }

    pub fn pause(&mut self) -> bool {
        self.transition(PlayState::Playing, PlayState::Paused)
    }

    pub fn resume(&mut self) -> bool {
        self.transition(PlayState::Paused, PlayState::Playing)
    }

    fn transition(&mut self, from: PlayState, to: PlayState) -> bool {
        if self.state != from {
            return false;
        }
        self.state = to;
        true
    }

    /// Back to the first chord with zeroed counters, playing from the top.
    /// Only a running or paused song restarts; a finished one stays finished.
    pub fn restart(&mut self) -> bool {
        if !matches!(self.state, PlayState::Playing | PlayState::Paused) {
            return false;
        }
        self.reset_progress();
        self.held = 0;
        self.song_time = 0.0;
        self.state = PlayState::Playing;
        true
    }

    /// Swaps in a new chord timeline. Empty timelines are rejected and the
    /// current one is kept.
    pub fn replace_chords(&mut self, chords: Vec<Chord>) -> bool {
        if chords.is_empty() {
            return false;
        }
        self.chords = chords;
        self.reset_progress();
        true
    }

    fn reset_progress(&mut self) {
        self.cursor = 0;
        self.stats = Stats::default();
        self.consecutive_misses = 0;
        self.feedback = None;
        self.lane_effects = [None; NUM_LANES];
    }

    // ── per-tick ──────────────────────────────────────────────────

    /// Advances to song time `t`: sweeps missed chords and detects the end.
    pub fn update(&mut self, t: f64) -> Vec<Judgement> {
        self.song_time = t;
        let mut out = Vec::new();
        if self.state != PlayState::Playing {
            return out;
        }

        while let Some(&chord) = self.chords.get(self.cursor) {
            if !self.config.windows.is_missed(chord.time_sec, t) {
                break;
            }
            out.push(Judgement::Missed { chord: self.cursor });
            self.flash(chord.lane_mask, LaneEffect::Miss);
            self.record_miss();
            self.cursor += 1;
        }

        if self.cursor >= self.chords.len() {
            let done = self
                .chords
                .last()
                .is_none_or(|last| t > last.time_sec + GRACE_PERIOD_SEC);
            if done {
                self.state = PlayState::SongComplete;
            }
        }
        out
    }

    /// Ages the feedback text and the lane effects by `dt` seconds.
    pub fn decay_feedback(&mut self, dt: f64) {
        if let Some((_, remaining)) = self.feedback.as_mut() {
            *remaining -= dt;
            if *remaining <= 0.0 {
                self.feedback = None;
            }
        }
        for slot in &mut self.lane_effects {
            if let Some((_, remaining)) = slot.as_mut() {
                *remaining -= dt;
                if *remaining <= 0.0 {
                    *slot = None;
                }
            }
        }
    }

    // a newer effect on a lane replaces the older one
    fn flash(&mut self, mask: u8, effect: LaneEffect) {
        for (lane, slot) in self.lane_effects.iter_mut().enumerate() {
            if mask & (1 << lane) != 0 {
                *slot = Some((effect, LANE_EFFECT_SEC));
            }
        }
    }

    // ── input ─────────────────────────────────────────────────────

    pub fn press_fret(&mut self, lane: u8, t: f64) -> Option<Judgement> {
        self.set_held(self.held | lane_bit(lane)?, t)
    }

    pub fn release_fret(&mut self, lane: u8, t: f64) -> Option<Judgement> {
        self.set_held(self.held & !lane_bit(lane)?, t)
    }

    /// Drops every held fret without judging (focus loss).
    pub fn clear_held(&mut self) {
        self.held = 0;
    }

    // fret changes can only complete a pending hammer-on, never cost a miss
    fn set_held(&mut self, held: u8, t: f64) -> Option<Judgement> {
        let changed = held != self.held;
        self.held = held;
        if !changed || self.state != PlayState::Playing {
            return None;
        }
        let chord = *self.chords.get(self.cursor)?;
        if !chord.is_hopo || !frets_match(chord.lane_mask, self.held) {
            return None;
        }
        let delta = chord.time_sec - t;
        let grade = self.config.windows.grade(delta)?;
        Some(self.record_hit(grade, delta))
    }

    pub fn strum(&mut self, t: f64) -> Option<Judgement> {
        if self.state != PlayState::Playing {
            return None;
        }
        let chord = *self.chords.get(self.cursor)?;
        let delta = chord.time_sec - t;

        let judgement = match self.config.windows.grade(delta) {
            None if delta > 0.0 => Judgement::TooEarly { delta },
            None => Judgement::TooLate { delta },
            Some(grade) if frets_match(chord.lane_mask, self.held) => self.record_hit(grade, delta),
            Some(_) => {
                // light up the frets that were off
                self.flash(self.held ^ chord.lane_mask, LaneEffect::Miss);
                self.record_miss();
                Judgement::WrongFrets { chord: self.cursor, delta }
            }
        };
        if let Some(text) = judgement.feedback() {
            self.feedback = Some((text, FEEDBACK_SEC));
        }
        Some(judgement)
    }

    fn record_hit(&mut self, grade: HitGrade, delta: f64) -> Judgement {
        self.stats.hit += 1;
        self.stats.streak += 1;
        self.consecutive_misses = 0;
        self.stats.score += self.config.scoring.award(grade, self.stats.streak);
        let chord = self.cursor;
        if let Some(mask) = self.chords.get(chord).map(|c| c.lane_mask) {
            self.flash(mask, LaneEffect::Hit(grade));
        }
        self.cursor += 1;
        Judgement::Hit { chord, grade, delta }
    }

    fn record_miss(&mut self) {
        self.stats.miss += 1;
        self.stats.streak = 0;
        self.consecutive_misses += 1;
    }

    // ── view ──────────────────────────────────────────────────────

    /// First chord worth drawing at time `t`: steps back from the cursor over
    /// chords that just passed or whose sustain tail is still on screen.
    pub fn view_cursor(&self, t: f64) -> usize {
        let mut view = self.cursor.min(self.chords.len());
        while view > 0 {
            let prev = &self.chords[view - 1];
            if prev.time_sec > t - VIEW_RECENT_SEC || prev.time_sec + prev.duration_sec > t - VIEW_SUSTAIN_SEC {
                view -= 1;
            } else {
                break;
            }
        }
        view
    }
}

fn lane_bit(lane: u8) -> Option<u8> {
    (lane < crate::chart::NUM_LANES as u8).then(|| 1 << lane)
}
