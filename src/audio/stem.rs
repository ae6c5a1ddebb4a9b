use super::frame::StereoFrame;

// per-frame gain slew; 0 -> 1 takes 10 frames
pub const GAIN_STEP: f32 = 0.1;

#[inline]
pub fn smooth_gain(current: f32, target: f32) -> f32 {
    if current < target {
        (current + GAIN_STEP).min(target)
    } else {
        (current - GAIN_STEP).max(target)
    }
}

/// One fully decoded instrument track, played in lockstep with the others.
#[derive(Clone, Debug)]
pub struct Stem {
    name: String,
    pcm: Vec<StereoFrame>,
    pos: usize, // keeps counting past the end so stems stay phase-locked
    gain: f32,  // current, slewed toward the shared target every frame
    enabled: bool,
    player_track: bool,
}

impl Stem {
    pub fn new(name: impl Into<String>, pcm: Vec<StereoFrame>) -> Self {
        let name = name.into();
        let player_track = name.to_ascii_lowercase().contains("guitar");
        Self {
            name,
            pcm,
            pos: 0,
            gain: 1.0,
            enabled: true,
            player_track,
        }
    }

    pub fn with_gain(mut self, gain: f32) -> Self {
        self.gain = gain;
        self
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn set_player_track(&mut self, player_track: bool) {
        self.player_track = player_track;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn frames(&self) -> usize {
        self.pcm.len()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_player_track(&self) -> bool {
        self.player_track
    }

    pub fn is_finished(&self) -> bool {
        self.pos >= self.pcm.len()
    }

    pub fn rewind(&mut self) {
        self.pos = 0;
    }

    // mix one frame of this stem into `acc` and step forward, whether or not it was audible
    #[inline]
    pub fn mix_frame_into(&mut self, acc: &mut StereoFrame, target_gain: f32) {
        self.gain = smooth_gain(self.gain, target_gain);
        if self.enabled {
            if let Some(&sample) = self.pcm.get(self.pos) {
                acc.add_scaled(sample, self.gain);
            }
        }
        self.pos = self.pos.saturating_add(1);
    }
}

/// Index of the stem muted on misses. With several guitar stems the last
/// one loaded wins.
pub fn player_stem_index(stems: &[Stem]) -> Option<usize> {
    stems.iter().rposition(Stem::is_player_track)
}
