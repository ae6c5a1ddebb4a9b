// binary chart backend: standard MIDI files with the four 5-key pitch windows
use std::collections::{HashMap, VecDeque};

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};

use super::tempo::{TempoMap, TempoPoint};
use super::{sort_notes, ChartFormat, Difficulty, NoteEvent, ParsedChart, TrackName};
use crate::error::ChartError;

// lowest pitch of each difficulty's window, easy..expert
const WINDOW_BASES: [u8; 4] = [60, 72, 84, 96];
const LANES_PER_WINDOW: u8 = 5;

// how many leading meta events we look through for a track name
const TRACK_NAME_LOOKAHEAD: usize = 16;
const MAX_TRACK_NAME_BYTES: usize = 63;

const CHUNK_HEADER_LEN: usize = 8;

// Walks the raw chunk list: every MTrk must fit inside the file and there must
// be as many as the header declares. A malformed header is left to midly.
fn check_track_bounds(data: &[u8]) -> Result<(), ChartError> {
    let Some(header) = data.get(..14).filter(|h| h.starts_with(b"MThd")) else {
        return Ok(());
    };
    let header_len = u32::from_be_bytes([header[4], header[5], header[6], header[7]]) as usize;
    let declared = u16::from_be_bytes([header[10], header[11]]);

    let mut pos = CHUNK_HEADER_LEN.saturating_add(header_len);
    let mut found: u16 = 0;
    while found < declared {
        let Some(chunk) = data.get(pos..).and_then(|rest| rest.get(..CHUNK_HEADER_LEN)) else {
            break;
        };
        let len = u32::from_be_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]) as usize;
        let end = pos.saturating_add(CHUNK_HEADER_LEN).saturating_add(len);
        if end > data.len() {
            return Err(ChartError::TruncatedTrack { index: found as usize });
        }
        // unknown chunk types are skipped, only MTrk counts
        if &chunk[..4] == b"MTrk" {
            found += 1;
        }
        pos = end;
    }
    if found < declared {
        return Err(ChartError::MissingTracks { declared, found });
    }
    Ok(())
}

/// Maps a MIDI pitch to its difficulty and lane, if it falls in a note window.
pub fn pitch_to_lane(pitch: u8) -> Option<(Difficulty, u8)> {
    WINDOW_BASES.iter().enumerate().find_map(|(tier, &base)| {
        let lane = pitch.checked_sub(base)?;
        (lane < LANES_PER_WINDOW)
            .then(|| Difficulty::from_tier(tier as u8).map(|d| (d, lane)))
            .flatten()
    })
}

pub fn parse(data: &[u8]) -> Result<ParsedChart, ChartError> {
    check_track_bounds(data)?;
    let smf = Smf::parse(data)?;
    let ticks_per_quarter = match smf.header.timing {
        Timing::Metrical(t) => t.as_int() as u32,
        Timing::Timecode(..) => return Err(ChartError::SmpteTiming),
    };
    if ticks_per_quarter == 0 {
        return Err(ChartError::ZeroTicksPerQuarter);
    }

    // tempo has to be known before any note can be placed in seconds
    let tempo = TempoMap::new(collect_tempo(&smf.tracks), ticks_per_quarter);

    let mut notes = Vec::new();
    for (track_idx, track) in smf.tracks.iter().enumerate() {
        collect_notes(track, track_idx as u16, &tempo, &mut notes);
    }
    sort_notes(&mut notes);

    let track_names = smf
        .tracks
        .iter()
        .enumerate()
        .filter_map(|(idx, track)| {
            leading_track_name(track).map(|name| TrackName { track: idx as u16, name })
        })
        .collect();

    Ok(ParsedChart {
        notes,
        track_names,
        tempo,
        format: ChartFormat::Midi,
    })
}

fn collect_tempo(tracks: &[Vec<TrackEvent>]) -> Vec<TempoPoint> {
    let mut points = Vec::new();
    for track in tracks {
        let mut tick = 0u64;
        for event in track {
            tick += event.delta.as_int() as u64;
            if let TrackEventKind::Meta(MetaMessage::Tempo(us)) = event.kind {
                points.push(TempoPoint::new(tick, us.as_int()));
            }
        }
    }
    points
}

fn collect_notes(track: &[TrackEvent], track_idx: u16, tempo: &TempoMap, out: &mut Vec<NoteEvent>) {
    // open notes by pitch, oldest first, so note-offs close sustains in order
    let mut open: HashMap<u8, VecDeque<usize>> = HashMap::new();
    let mut tick = 0u64;

    for event in track {
        tick += event.delta.as_int() as u64;
        let TrackEventKind::Midi { message, .. } = event.kind else {
            continue;
        };
        let (key, vel, is_on) = match message {
            MidiMessage::NoteOn { key, vel } => (key.as_int(), vel.as_int(), vel.as_int() > 0),
            MidiMessage::NoteOff { key, vel } => (key.as_int(), vel.as_int(), false),
            _ => continue,
        };
        let Some((difficulty, lane)) = pitch_to_lane(key) else {
            continue;
        };

        if is_on {
            open.entry(key).or_default().push_back(out.len());
            out.push(NoteEvent {
                tick,
                time_sec: tempo.tick_to_seconds(tick),
                pitch: key,
                lane,
                difficulty,
                velocity: vel,
                track: track_idx,
                duration_sec: 0.0,
            });
        } else if let Some(idx) = open.get_mut(&key).and_then(|q| q.pop_front()) {
            let note = &mut out[idx];
            note.duration_sec = (tempo.tick_to_seconds(tick) - note.time_sec).max(0.0);
        }
    }
}

fn leading_track_name(track: &[TrackEvent]) -> Option<String> {
    for event in track.iter().take(TRACK_NAME_LOOKAHEAD) {
        match event.kind {
            TrackEventKind::Meta(MetaMessage::TrackName(raw)) => {
                let raw = &raw[..raw.len().min(MAX_TRACK_NAME_BYTES)];
                let name = String::from_utf8_lossy(raw).trim().to_string();
                return (!name.is_empty()).then_some(name);
            }
            TrackEventKind::Meta(_) => continue,
            _ => return None,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use midly::num::{u15, u24, u28, u4, u7};
    use midly::{Format, Fps, Header};

    fn ev(delta: u32, kind: TrackEventKind<'static>) -> TrackEvent<'static> {
        TrackEvent { delta: u28::from(delta), kind }
    }

    fn note_on(delta: u32, key: u8, vel: u8) -> TrackEvent<'static> {
        ev(delta, TrackEventKind::Midi {
            channel: u4::from(0),
            message: MidiMessage::NoteOn { key: u7::from(key), vel: u7::from(vel) },
        })
    }

    fn note_off(delta: u32, key: u8) -> TrackEvent<'static> {
        ev(delta, TrackEventKind::Midi {
            channel: u4::from(0),
            message: MidiMessage::NoteOff { key: u7::from(key), vel: u7::from(0) },
        })
    }

    fn end() -> TrackEvent<'static> {
        ev(0, TrackEventKind::Meta(MetaMessage::EndOfTrack))
    }

    fn write(timing: Timing, tracks: Vec<Vec<TrackEvent<'static>>>) -> Vec<u8> {
        let smf = Smf {
            header: Header { format: Format::Parallel, timing },
            tracks,
        };
        let mut bytes = Vec::new();
        smf.write_std(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_pitch_windows() {
        assert_eq!(pitch_to_lane(60), Some((Difficulty::Easy, 0)));
        assert_eq!(pitch_to_lane(64), Some((Difficulty::Easy, 4)));
        assert_eq!(pitch_to_lane(65), None);
        assert_eq!(pitch_to_lane(74), Some((Difficulty::Medium, 2)));
        assert_eq!(pitch_to_lane(88), Some((Difficulty::Hard, 4)));
        assert_eq!(pitch_to_lane(96), Some((Difficulty::Expert, 0)));
        assert_eq!(pitch_to_lane(100), Some((Difficulty::Expert, 4)));
        assert_eq!(pitch_to_lane(101), None);
        assert_eq!(pitch_to_lane(59), None);
    }

    #[test]
    fn test_notes_tempo_and_names() {
        let tempo_track = vec![
            ev(0, TrackEventKind::Meta(MetaMessage::TrackName(b"tempo"))),
            ev(0, TrackEventKind::Meta(MetaMessage::Tempo(u24::from(500_000)))),
            ev(480, TrackEventKind::Meta(MetaMessage::Tempo(u24::from(1_000_000)))),
            end(),
        ];
        let guitar = vec![
            ev(0, TrackEventKind::Meta(MetaMessage::TrackName(b"PART GUITAR"))),
            note_on(0, 96, 100),
            note_off(240, 96),
            note_on(240, 97, 90),
            note_on(0, 50, 100), // outside every window
            note_on(480, 98, 0), // velocity 0 is a note-off
            end(),
        ];
        let chart = parse(&write(Timing::Metrical(u15::from(480)), vec![tempo_track, guitar])).unwrap();

        assert_eq!(chart.format, ChartFormat::Midi);
        assert_eq!(chart.notes.len(), 2);

        let first = &chart.notes[0];
        assert_eq!((first.tick, first.lane, first.track), (0, 0, 1));
        assert_eq!(first.difficulty, Difficulty::Expert);
        assert!((first.duration_sec - 0.25).abs() < 1e-9);

        let second = &chart.notes[1];
        assert_eq!((second.tick, second.lane, second.velocity), (480, 1, 90));
        assert!((second.time_sec - 0.5).abs() < 1e-9);
        assert_eq!(second.duration_sec, 0.0);

        assert_eq!(chart.track_name(0), Some("tempo"));
        assert_eq!(chart.track_name(1), Some("PART GUITAR"));
    }

    #[test]
    fn test_track_name_after_midi_event_is_ignored() {
        let track = vec![
            note_on(0, 60, 100),
            ev(0, TrackEventKind::Meta(MetaMessage::TrackName(b"late name"))),
            end(),
        ];
        let chart = parse(&write(Timing::Metrical(u15::from(192)), vec![track])).unwrap();
        assert!(chart.track_names.is_empty());
        assert_eq!(chart.notes.len(), 1);
    }

    #[test]
    fn test_missing_tempo_defaults_to_120_bpm() {
        let track = vec![note_on(960, 72, 100), end()];
        let chart = parse(&write(Timing::Metrical(u15::from(480)), vec![track])).unwrap();
        assert!((chart.notes[0].time_sec - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_smpte_is_rejected() {
        let bytes = write(Timing::Timecode(Fps::Fps25, 40), vec![vec![end()]]);
        assert!(matches!(parse(&bytes), Err(ChartError::SmpteTiming)));
    }

    fn one_track_file() -> Vec<u8> {
        write(Timing::Metrical(u15::from(480)), vec![vec![note_on(0, 96, 100), end()]])
    }

    #[test]
    fn test_track_longer_than_file_is_rejected() {
        let mut bytes = one_track_file();
        assert_eq!(&bytes[14..18], b"MTrk");
        bytes[18..22].copy_from_slice(&100u32.to_be_bytes());
        assert!(matches!(parse(&bytes), Err(ChartError::TruncatedTrack { index: 0 })));
    }

    #[test]
    fn test_missing_declared_track_is_rejected() {
        let mut bytes = one_track_file();
        bytes[10..12].copy_from_slice(&2u16.to_be_bytes());
        assert!(matches!(
            parse(&bytes),
            Err(ChartError::MissingTracks { declared: 2, found: 1 })
        ));
    }

    #[test]
    fn test_unknown_chunks_are_skipped() {
        let mut bytes = one_track_file();
        let track = bytes.split_off(14);
        bytes.extend_from_slice(b"XFIH");
        bytes.extend_from_slice(&3u32.to_be_bytes());
        bytes.extend_from_slice(&[1, 2, 3]);
        bytes.extend_from_slice(&track);
        assert!(check_track_bounds(&bytes).is_ok());
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(matches!(parse(b"not a midi file"), Err(ChartError::Midi(_))));
    }
}
