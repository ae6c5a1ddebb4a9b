//! State shared between the output callback and the game loop without a lock.
//!
//! `frames_played` is the song clock: it only moves when the callback
//! actually mixes frames, so it freezes while paused or before the start.
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

/// Output buffers assumed to be in flight between the mixer and the speaker.
pub const LATENCY_MULT: u32 = 2;
pub const DEFAULT_BUFFER_FRAMES: u32 = 256;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClockConfig {
    pub sample_rate: u32,
    pub buffer_frames: u32,
    pub latency_mult: u32,
}

impl ClockConfig {
    pub fn new(sample_rate: u32, buffer_frames: u32) -> Self {
        Self {
            sample_rate,
            buffer_frames,
            latency_mult: LATENCY_MULT,
        }
    }

    pub fn latency_frames(&self) -> u64 {
        self.buffer_frames as u64 * self.latency_mult as u64
    }

    /// Seconds of audio the listener has heard after `frames_played` mixed frames.
    pub fn song_time(&self, frames_played: u64) -> f64 {
        let heard = frames_played.saturating_sub(self.latency_frames());
        heard as f64 / self.sample_rate.max(1) as f64
    }
}

pub struct MixerShared {
    frames_played: AtomicU64,
    playing: AtomicBool,
    // f32 bits, one per stem
    target_gains: Vec<AtomicU32>,
    clock: ClockConfig,
}

impl MixerShared {
    pub fn new(clock: ClockConfig, initial_gains: &[f32]) -> Self {
        Self {
            frames_played: AtomicU64::new(0),
            playing: AtomicBool::new(false),
            target_gains: initial_gains.iter().map(|g| AtomicU32::new(g.to_bits())).collect(),
            clock,
        }
    }

    pub fn clock(&self) -> ClockConfig {
        self.clock
    }

    pub fn frames_played(&self) -> u64 {
        self.frames_played.load(Ordering::Acquire)
    }

    pub(crate) fn advance(&self, frames: u64) {
        self.frames_played.fetch_add(frames, Ordering::AcqRel);
    }

    // only called with the mixer lock held
    pub(crate) fn reset_frames(&self) {
        self.frames_played.store(0, Ordering::Release);
    }

    pub fn song_time(&self) -> f64 {
        self.clock.song_time(self.frames_played())
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    pub fn set_playing(&self, playing: bool) {
        self.playing.store(playing, Ordering::Release);
    }

    pub fn stem_count(&self) -> usize {
        self.target_gains.len()
    }

    /// Out-of-range stems read as silent.
    pub fn target_gain(&self, stem: usize) -> f32 {
        self.target_gains
            .get(stem)
            .map_or(0.0, |g| f32::from_bits(g.load(Ordering::Relaxed)))
    }

    pub fn set_target_gain(&self, stem: usize, gain: f32) {
        if let Some(slot) = self.target_gains.get(stem) {
            slot.store(gain.to_bits(), Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_compensation() {
        let clock = ClockConfig::new(48_000, 256);
        assert_eq!(clock.song_time(0), 0.0);
        assert_eq!(clock.song_time(512), 0.0);
        let expected = (100_000.0 - 512.0) / 48_000.0;
        assert!((clock.song_time(100_000) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_shared_gains() {
        let shared = MixerShared::new(ClockConfig::new(44_100, 256), &[1.0, 0.5]);
        assert_eq!(shared.target_gain(1), 0.5);
        shared.set_target_gain(1, 0.1);
        assert_eq!(shared.target_gain(1), 0.1);
        shared.set_target_gain(7, 1.0);
        assert_eq!(shared.target_gain(7), 0.0);
    }

    #[test]
    fn test_frames_freeze_until_advanced() {
        let shared = MixerShared::new(ClockConfig::new(44_100, 256), &[]);
        assert!(!shared.is_playing());
        shared.advance(1024);
        assert_eq!(shared.frames_played(), 1024);
        shared.reset_frames();
        assert_eq!(shared.song_time(), 0.0);
    }
}
