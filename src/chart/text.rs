// text chart backend (.chart): bracketed sections of `key = value` lines
use super::tempo::{TempoMap, TempoPoint};
use super::{sort_notes, ChartFormat, Difficulty, NoteEvent, ParsedChart, TrackName};
use crate::error::ChartError;

pub const DEFAULT_RESOLUTION: u32 = 192;
pub const GUITAR_TRACK_NAME: &str = "PART GUITAR";

// text charts encode pitches the same way as the binary windows
const PITCH_BASE: u8 = 60;
const PITCH_STRIDE: u8 = 12;

// forced notes carry a velocity below the hammer-on threshold
pub const NORMAL_VELOCITY: u8 = 100;
pub const FORCED_VELOCITY: u8 = 96;

const FORCED_FLAG_LANE: u8 = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Section {
    Song,
    SyncTrack,
    Notes(Difficulty),
    Other,
}

impl Section {
    fn from_header(name: &str) -> Self {
        match name {
            "Song" => Section::Song,
            "SyncTrack" => Section::SyncTrack,
            "ExpertSingle" => Section::Notes(Difficulty::Expert),
            "HardSingle" => Section::Notes(Difficulty::Hard),
            "MediumSingle" => Section::Notes(Difficulty::Medium),
            "EasySingle" => Section::Notes(Difficulty::Easy),
            _ => Section::Other,
        }
    }
}

// notes before the tempo map exists; placed in seconds once everything is read
struct RawNote {
    tick: u64,
    sustain: u64,
    lane: u8,
    difficulty: Difficulty,
    forced: bool,
}

pub fn parse(text: &str) -> Result<ParsedChart, ChartError> {
    let mut section = Section::Other;
    let mut saw_song = false;
    let mut resolution = DEFAULT_RESOLUTION;
    let mut offset_sec = 0.0;
    let mut tempo_points = Vec::new();
    let mut raw_notes: Vec<RawNote> = Vec::new();

    for line in text.trim_start_matches('\u{feff}').lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line == "{" || line == "}" {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            section = Section::from_header(name.trim());
            saw_song |= section == Section::Song;
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            log::debug!("chart: skipping line without '=': {line}");
            continue;
        };
        let (key, value) = (key.trim(), value.trim());

        match section {
            Section::Song => match key {
                "Resolution" => {
                    resolution = value
                        .parse::<i64>()
                        .ok()
                        .filter(|&r| r > 0)
                        .map_or(DEFAULT_RESOLUTION, |r| r as u32);
                }
                "Offset" => offset_sec = value.parse().unwrap_or(0.0),
                _ => {}
            },
            Section::SyncTrack => {
                if let Some(point) = parse_tempo_line(key, value) {
                    tempo_points.push(point);
                }
            }
            Section::Notes(difficulty) => {
                apply_note_line(key, value, difficulty, &mut raw_notes);
            }
            Section::Other => {}
        }
    }

    if !saw_song {
        return Err(ChartError::MissingSection("Song"));
    }

    let tempo = TempoMap::new(tempo_points, resolution);
    let mut notes: Vec<NoteEvent> = raw_notes
        .into_iter()
        .map(|raw| {
            let start = tempo.tick_to_seconds(raw.tick);
            NoteEvent {
                tick: raw.tick,
                time_sec: start + offset_sec,
                pitch: PITCH_BASE + raw.difficulty.tier() * PITCH_STRIDE + raw.lane,
                lane: raw.lane,
                difficulty: raw.difficulty,
                velocity: if raw.forced { FORCED_VELOCITY } else { NORMAL_VELOCITY },
                track: 0,
                duration_sec: tempo.tick_to_seconds(raw.tick.saturating_add(raw.sustain)) - start,
            }
        })
        .collect();
    sort_notes(&mut notes);

    Ok(ParsedChart {
        notes,
        track_names: vec![TrackName { track: 0, name: GUITAR_TRACK_NAME.to_string() }],
        tempo,
        format: ChartFormat::Text,
    })
}

// `tick = B bpm*1000`; time signatures and anchors don't affect timing here
fn parse_tempo_line(key: &str, value: &str) -> Option<TempoPoint> {
    let tick = key.parse::<u64>().ok()?;
    let mut parts = value.split_whitespace();
    if parts.next()? != "B" {
        return None;
    }
    let milli_bpm = parts.next()?.parse::<f64>().ok()?;
    if milli_bpm <= 0.0 {
        log::warn!("chart: ignoring non-positive tempo at tick {tick}");
        return None;
    }
    let bpm = milli_bpm / 1000.0;
    Some(TempoPoint::new(tick, (60_000_000.0 / bpm) as u32))
}

// `tick = N lane sustain`
fn apply_note_line(key: &str, value: &str, difficulty: Difficulty, notes: &mut Vec<RawNote>) {
    let Ok(tick) = key.parse::<u64>() else {
        return;
    };
    let mut parts = value.split_whitespace();
    if parts.next() != Some("N") {
        return;
    }
    let (Some(lane), Some(sustain)) = (
        parts.next().and_then(|l| l.parse::<u8>().ok()),
        parts.next().and_then(|s| s.parse::<u64>().ok()),
    ) else {
        log::debug!("chart: malformed note at tick {tick}: {value}");
        return;
    };

    match lane {
        0..=4 => notes.push(RawNote { tick, sustain, lane, difficulty, forced: false }),
        // the flag comes after the notes it modifies
        FORCED_FLAG_LANE if sustain == 0 => {
            for note in notes
                .iter_mut()
                .filter(|n| n.tick == tick && n.difficulty == difficulty)
            {
                note.forced = true;
            }
        }
        // tap flags and open notes aren't playable lanes
        _ => {}
    }
}
