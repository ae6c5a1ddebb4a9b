// groups the notes of one difficulty/track into chords and decides which
// of them can be played as hammer-ons/pull-offs (no strum)
use super::{Difficulty, NoteEvent};

/// Notes closer than this (seconds) to a chord's first note join that chord.
pub const CHORD_EPSILON_SEC: f64 = 0.0015;
/// Default `hopo_frequency` in ticks when song.ini doesn't set one.
pub const DEFAULT_HOPO_FREQUENCY: u64 = 170;
// notes below this velocity are hammer-on eligible regardless of spacing
const HOPO_VELOCITY: u8 = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackFilter {
    All,
    Track(u16),
}

impl TrackFilter {
    pub fn accepts(self, track: u16) -> bool {
        match self {
            TrackFilter::All => true,
            TrackFilter::Track(t) => t == track,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Chord {
    pub time_sec: f64,
    pub tick: u64,
    pub lane_mask: u8,
    pub is_hopo: bool,
    // longest sustain among the chord's notes
    pub duration_sec: f64,
}

impl Chord {
    pub fn has_lane(&self, lane: u8) -> bool {
        lane < 8 && self.lane_mask & (1 << lane) != 0
    }

    pub fn lane_count(&self) -> u32 {
        self.lane_mask.count_ones()
    }
}

// the chord being accumulated during the sweep
struct Pending {
    anchor_sec: f64,
    tick: u64,
    mask: u8,
    min_velocity: u8,
    duration_sec: f64,
}

impl Pending {
    fn start(note: &NoteEvent) -> Self {
        Self {
            anchor_sec: note.time_sec,
            tick: note.tick,
            mask: 1 << note.lane,
            min_velocity: note.velocity,
            duration_sec: note.duration_sec,
        }
    }

    fn absorb(&mut self, note: &NoteEvent) {
        self.mask |= 1 << note.lane;
        self.min_velocity = self.min_velocity.min(note.velocity);
        self.duration_sec = self.duration_sec.max(note.duration_sec);
    }

    fn finish(self, prev: Option<&Chord>, hopo_threshold_ticks: u64) -> Chord {
        let is_hopo = prev.is_some_and(|prev| {
            self.mask != prev.lane_mask
                && (self.min_velocity < HOPO_VELOCITY
                    || self.tick.saturating_sub(prev.tick) < hopo_threshold_ticks)
        });
        Chord {
            time_sec: self.anchor_sec,
            tick: self.tick,
            lane_mask: self.mask,
            is_hopo,
            duration_sec: self.duration_sec,
        }
    }
}

/// Builds the chord sequence for one difficulty and track selection.
///
/// The result is strictly increasing in `time_sec` and every chord has a
/// non-empty lane mask. The first chord is never a hammer-on.
pub fn build_chords(
    notes: &[NoteEvent],
    difficulty: Difficulty,
    tracks: TrackFilter,
    hopo_threshold_ticks: u64,
) -> Vec<Chord> {
    let mut selected: Vec<&NoteEvent> = notes
        .iter()
        .filter(|n| n.difficulty == difficulty && tracks.accepts(n.track) && n.lane < 8)
        .collect();
    selected.sort_by(|a, b| a.time_sec.total_cmp(&b.time_sec).then(a.lane.cmp(&b.lane)));

    let mut chords: Vec<Chord> = Vec::new();
    let mut pending: Option<Pending> = None;

    for note in selected {
        if let Some(p) = pending
            .as_mut()
            .filter(|p| (note.time_sec - p.anchor_sec).abs() <= CHORD_EPSILON_SEC)
        {
            p.absorb(note);
            continue;
        }
        if let Some(done) = pending.replace(Pending::start(note)) {
            let chord = done.finish(chords.last(), hopo_threshold_ticks);
            chords.push(chord);
        }
    }
    if let Some(done) = pending {
        let chord = done.finish(chords.last(), hopo_threshold_ticks);
        chords.push(chord);
    }
    chords
}
