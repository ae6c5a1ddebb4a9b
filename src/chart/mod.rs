// chart loading: both file formats normalize into the same note list,
// then chords.rs groups them into what the player actually hits
use std::path::Path;

use crate::error::ChartError;

pub mod chords;
pub mod midi;
pub mod tempo;
pub mod text;

pub use chords::{build_chords, Chord, TrackFilter, DEFAULT_HOPO_FREQUENCY};
pub use tempo::{TempoMap, TempoPoint};

pub const NUM_LANES: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Expert,
}

impl Difficulty {
    pub const ALL: [Difficulty; 4] = [
        Difficulty::Easy,
        Difficulty::Medium,
        Difficulty::Hard,
        Difficulty::Expert,
    ];

    pub fn tier(self) -> u8 {
        self as u8
    }

    pub fn from_tier(tier: u8) -> Option<Self> {
        Self::ALL.get(tier as usize).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
            Difficulty::Expert => "Expert",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|d| d.name().eq_ignore_ascii_case(name.trim()))
    }
}

/// One playable note, already placed on the song timeline.
#[derive(Clone, Debug, PartialEq)]
pub struct NoteEvent {
    pub tick: u64,
    pub time_sec: f64,
    pub pitch: u8,
    pub lane: u8,
    pub difficulty: Difficulty,
    pub velocity: u8,
    pub track: u16,
    pub duration_sec: f64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackName {
    pub track: u16,
    pub name: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChartFormat {
    Midi,
    Text,
}

#[derive(Clone, Debug)]
pub struct ParsedChart {
    pub notes: Vec<NoteEvent>,
    pub track_names: Vec<TrackName>,
    pub tempo: TempoMap,
    pub format: ChartFormat,
}

impl ParsedChart {
    pub fn track_name(&self, track: u16) -> Option<&str> {
        self.track_names
            .iter()
            .find(|t| t.track == track)
            .map(|t| t.name.as_str())
    }

    /// Highest track index carrying notes, if any.
    pub fn max_track(&self) -> Option<u16> {
        self.notes.iter().map(|n| n.track).max()
    }

    pub fn has_difficulty(&self, difficulty: Difficulty) -> bool {
        self.notes.iter().any(|n| n.difficulty == difficulty)
    }

    /// Hardest tier that has any notes.
    pub fn best_difficulty(&self) -> Option<Difficulty> {
        self.notes.iter().map(|n| n.difficulty).max()
    }
}

// pick the backend from the file extension
pub fn load_chart(path: &Path) -> Result<ParsedChart, ChartError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    let read = || {
        std::fs::read(path).map_err(|source| ChartError::Io { path: path.to_path_buf(), source })
    };
    let chart = match ext.as_deref() {
        Some("mid" | "midi") => midi::parse(&read()?)?,
        Some("chart") => text::parse(&String::from_utf8_lossy(&read()?))?,
        _ => return Err(ChartError::UnsupportedFormat(path.to_path_buf())),
    };
    log::info!(
        "loaded {:?} chart {}: {} notes, {} tempo points, {} named tracks",
        chart.format,
        path.display(),
        chart.notes.len(),
        chart.tempo.points().len(),
        chart.track_names.len(),
    );
    Ok(chart)
}

// shared by both backends so note order doesn't depend on the file layout
pub(crate) fn sort_notes(notes: &mut [NoteEvent]) {
    notes.sort_by(|a, b| a.tick.cmp(&b.tick).then(a.lane.cmp(&b.lane)));
}
