use std::time::{Duration, Instant};

use crate::pipeline::settings::KeyBindings;
use crate::shared::NUM_LANES;

// without release events a fret counts as held this long after its last press/repeat
const HOLD_TIMEOUT: Duration = Duration::from_millis(120);

// state local to tui: key bindings plus fret hold tracking, which only
// matters on terminals that can't report key releases
#[derive(Clone, Debug)]
pub struct TuiState {
    pub frets: [char; NUM_LANES],
    pub strum: char,
    pub release_events: bool,
    last_press: [Option<Instant>; NUM_LANES],
}

impl TuiState {
    pub fn new(keys: &KeyBindings, release_events: bool) -> Self {
        Self {
            frets: keys.frets.map(|c| c.to_ascii_lowercase()),
            strum: keys.strum,
            release_events,
            last_press: [None; NUM_LANES],
        }
    }

    pub fn lane_for(&self, c: char) -> Option<u8> {
        let c = c.to_ascii_lowercase();
        self.frets.iter().position(|&f| f == c).map(|lane| lane as u8)
    }

    // true when this press starts a new hold
    pub fn note_press(&mut self, lane: u8, now: Instant) -> bool {
        let slot = &mut self.last_press[lane as usize];
        let fresh = slot.is_none();
        *slot = Some(now);
        fresh
    }

    pub fn note_release(&mut self, lane: u8) {
        self.last_press[lane as usize] = None;
    }

    /// Lanes whose hold timed out; always empty when the terminal reports releases.
    pub fn expire(&mut self, now: Instant) -> Vec<u8> {
        if self.release_events {
            return Vec::new();
        }
        let mut expired = Vec::new();
        for (lane, slot) in self.last_press.iter_mut().enumerate() {
            if slot.is_some_and(|at| now.duration_since(at) > HOLD_TIMEOUT) {
                *slot = None;
                expired.push(lane as u8);
            }
        }
        expired
    }
}
