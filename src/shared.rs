// Types passed between the terminal front end and the session layer.
//
// Frets:        z x c v b  (configurable)  //  FretDown(lane) / FretUp(lane)
// Strum:        Enter or space             //  Strum (also starts the song)
// Pause:        Esc                        //  TogglePause
// Restart:      r                          //  Restart
// Song offset:  - / +                      //  NudgeSongOffset(-/+10 ms)
// Global offset: [ / ]                     //  NudgeGlobalOffset(-/+10 ms)
// Track:        1-9 / 0                    //  SelectTrack(n) / AllTracks
// Quit:         q                          //  Quit
//
// The front end only ever reads a DisplayState; all game state lives in the session.
use crate::chart::{Chord, Difficulty};
use crate::judge::{LaneEffect, PlayState, Stats};

pub use crate::chart::NUM_LANES;

pub const TARGET_FPS: u32 = 60;
pub const OFFSET_STEP_MS: f64 = 10.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputEvent {
    FretDown(u8),
    FretUp(u8),
    Strum,
    TogglePause,
    Restart,
    NudgeSongOffset(f64),
    NudgeGlobalOffset(f64),
    SelectTrack(u16),
    AllTracks,
    // terminal lost focus; key releases won't arrive
    FocusLost,
    Quit,
}

#[derive(Clone, Debug)]
pub struct DisplayState<'a> {
    pub title: &'a str,
    pub chords: &'a [Chord],
    pub view_cursor: usize,
    pub song_time: f64,
    pub lookahead_sec: f64,
    pub held_mask: u8,
    pub stats: Stats,
    pub multiplier: u32,
    pub feedback: Option<&'static str>,
    pub lane_effects: [Option<LaneEffect>; NUM_LANES],
    pub play_state: PlayState,
    pub difficulty: Difficulty,
    pub track_label: String,
    pub song_offset_ms: f64,
    pub global_offset_ms: f64,
}
