use fretfall::audio::{ClockConfig, MixerHandle, Stem, StereoFrame};
use fretfall::audio_api::AudioCommand;
use fretfall::chart::{self, ParsedChart};
use fretfall::judge::{HitGrade, JudgeConfig, JudgeEngine, Judgement, PlayState};
use fretfall::middle::{Session, SessionOptions};
use fretfall::pipeline::settings::Settings;
use fretfall::shared::InputEvent;

// 120 bpm at resolution 192: a quarter note is half a second
fn chart_with(notes: &str) -> ParsedChart {
    let text = format!(
        "[Song]\n{{\n  Resolution = 192\n}}\n[SyncTrack]\n{{\n  0 = B 120000\n}}\n[ExpertSingle]\n{{\n{notes}}}\n"
    );
    chart::text::parse(&text).unwrap()
}

fn session(chart: ParsedChart, player_stem: Option<usize>) -> Session {
    let opts = SessionOptions {
        settings: Settings { global_offset_ms: 0.0, ..Settings::default() },
        player_stem,
        ..SessionOptions::default()
    };
    Session::new(chart, opts).unwrap()
}

#[test]
fn test_one_hit_one_miss() {
    // lane 0 at 1.0s, lane 1 at 2.0s
    let mut s = session(chart_with("  384 = N 0 0\n  768 = N 1 0\n"), None);
    assert_eq!(s.state(), PlayState::WaitingToStart);

    assert_eq!(s.handle_input(InputEvent::Strum, 0.0), vec![AudioCommand::Play]);
    assert_eq!(s.state(), PlayState::Playing);

    s.handle_input(InputEvent::FretDown(0), 0.98);
    s.handle_input(InputEvent::Strum, 1.01);
    assert_eq!(s.judge().stats().hit, 1);
    assert_eq!(s.judge().stats().score, 100);

    s.tick(1.5, 0.016);
    assert_eq!(s.judge().stats().miss, 0);
    s.tick(2.2, 0.016);
    assert_eq!(s.judge().stats().miss, 1);
    assert!(!s.is_complete());

    assert_eq!(s.tick(4.1, 0.016), vec![AudioCommand::Pause]);
    assert!(s.is_complete());
    let stats = s.judge().stats();
    assert_eq!((stats.hit, stats.miss, stats.streak), (1, 1, 0));
}

#[test]
fn test_late_strum_leaves_the_miss_to_the_sweep() {
    // identical masks at 1.0s and 2.0s
    let mut s = session(chart_with("  384 = N 0 0\n  768 = N 0 0\n"), None);
    s.handle_input(InputEvent::Strum, 0.0);
    s.handle_input(InputEvent::FretDown(0), 0.9);
    s.handle_input(InputEvent::Strum, 1.0);
    s.tick(1.0, 0.016);

    // input is handled before the tick in a frame
    s.handle_input(InputEvent::Strum, 2.2);
    assert_eq!(s.judge().stats().miss, 0);
    assert_eq!(s.judge().feedback(), Some("TOO LATE"));
    s.tick(2.2, 0.016);

    let stats = s.judge().stats();
    assert_eq!((stats.hit, stats.miss), (1, 1));
    assert_eq!(s.judge().cursor(), 2);
}

#[test]
fn test_miss_sweep_waits_for_window() {
    let chords = chart::build_chords(
        &chart_with("  192 = N 0 0\n").notes,
        chart::Difficulty::Expert,
        chart::TrackFilter::All,
        170,
    );
    assert!((chords[0].time_sec - 0.5).abs() < 1e-9);

    let mut judge = JudgeEngine::new(chords, JudgeConfig::default());
    judge.start();
    assert!(judge.update(0.61).is_empty());
    assert_eq!(judge.update(0.6201), vec![Judgement::Missed { chord: 0 }]);
    assert_eq!(judge.state(), PlayState::Playing);
    judge.update(2.51);
    assert_eq!(judge.state(), PlayState::SongComplete);
}

#[test]
fn test_sustain_chain_single_note() {
    let mut s = session(chart_with("  384 = N 2 0\n"), None);
    s.handle_input(InputEvent::Strum, 0.0);
    // a lower fret held alongside is fine
    s.handle_input(InputEvent::FretDown(0), 0.9);
    s.handle_input(InputEvent::FretDown(2), 0.9);
    s.handle_input(InputEvent::Strum, 1.0);
    assert_eq!(s.judge().stats().hit, 1);
}

#[test]
fn test_chord_rejects_extra_fret() {
    let mut s = session(chart_with("  384 = N 0 0\n  384 = N 1 0\n"), None);
    s.handle_input(InputEvent::Strum, 0.0);
    for lane in [0, 1, 2] {
        s.handle_input(InputEvent::FretDown(lane), 0.9);
    }
    s.handle_input(InputEvent::Strum, 1.0);
    let stats = s.judge().stats();
    assert_eq!((stats.hit, stats.miss), (0, 1));
    // still pending, so fixing the fingering and strumming again counts
    s.handle_input(InputEvent::FretUp(2), 1.01);
    s.handle_input(InputEvent::Strum, 1.02);
    assert_eq!(s.judge().stats().hit, 1);
}

#[test]
fn test_hammer_on_by_fret_change() {
    // lane 0 at 1.0s then lane 1 a sixteenth later
    let mut s = session(chart_with("  384 = N 0 0\n  432 = N 1 0\n"), None);
    assert!(s.chords()[1].is_hopo);
    s.handle_input(InputEvent::Strum, 0.0);
    s.handle_input(InputEvent::FretDown(0), 0.95);
    s.handle_input(InputEvent::Strum, 1.0);
    s.handle_input(InputEvent::FretUp(0), 1.12);
    s.handle_input(InputEvent::FretDown(1), 1.125);
    let stats = s.judge().stats();
    assert_eq!((stats.hit, stats.miss, stats.streak), (2, 0, 2));
}

#[test]
fn test_streak_multiplier_scoring() {
    let rules = JudgeConfig::default().scoring;
    assert_eq!(rules.award(HitGrade::Perfect, 15), 200);
    assert_eq!(rules.display_multiplier(45), 4);
}

#[test]
fn test_player_stem_quiets_after_two_misses() {
    let mut s = session(
        chart_with("  192 = N 0 0\n  384 = N 0 0\n  576 = N 0 0\n"),
        Some(3),
    );
    s.handle_input(InputEvent::Strum, 0.0);
    assert!(s.tick(0.7, 0.016).is_empty());
    assert_eq!(
        s.tick(1.2, 0.016),
        vec![AudioCommand::SetTargetGain { stem: 3, gain: 0.1 }]
    );
    s.handle_input(InputEvent::FretDown(0), 1.4);
    assert_eq!(
        s.handle_input(InputEvent::Strum, 1.5),
        vec![AudioCommand::SetTargetGain { stem: 3, gain: 1.0 }]
    );
}

#[test]
fn test_clock_latency_numbers() {
    let clock = ClockConfig::new(48_000, 256);
    let expected = (100_000.0 - 512.0) / 48_000.0;
    assert!((clock.song_time(100_000) - expected).abs() < 1e-12);
    assert_eq!(clock.song_time(300), 0.0);
}

#[test]
fn test_session_driven_by_mixer_clock() {
    let stems = vec![Stem::new("guitar", vec![StereoFrame::mono(0.5); 96_000])];
    let (audio, events) = MixerHandle::new(stems, ClockConfig::new(48_000, 256));
    let mut s = session(chart_with("  192 = N 0 0\n"), Some(0));
    let mut block = vec![0.0f32; 2 * 4_800];

    // nothing advances before the first strum
    audio.render(&mut block, 2);
    assert_eq!(audio.shared().frames_played(), 0);
    assert!(block.iter().all(|&x| x == 0.0));

    for cmd in s.handle_input(InputEvent::Strum, audio.song_time()) {
        audio.apply(cmd);
    }
    for _ in 0..5 {
        audio.render(&mut block, 2);
    }
    assert_eq!(audio.shared().frames_played(), 24_000);
    assert!(block.iter().any(|&x| x != 0.0));
    let t = audio.song_time();
    assert!((t - (24_000.0 - 512.0) / 48_000.0).abs() < 1e-12);

    // 0.4893s against a chord at 0.5s
    s.handle_input(InputEvent::FretDown(0), t);
    s.handle_input(InputEvent::Strum, t);
    assert_eq!(s.judge().stats().hit, 1);
    assert!(events.try_recv().is_err());
}
