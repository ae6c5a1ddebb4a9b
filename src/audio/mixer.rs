use std::sync::{Arc, Mutex, PoisonError, TryLockError};

use crossbeam_channel::{Receiver, Sender};

use super::clock::{ClockConfig, MixerShared};
use super::frame::StereoFrame;
use super::stem::Stem;
use super::telemetry::AudioEvent;
use crate::audio_api::AudioCommand;

const EVENT_QUEUE: usize = 256;

pub struct Mixer {
    stems: Vec<Stem>,
    shared: Arc<MixerShared>,
    exhausted_reported: bool,
}

impl Mixer {
    pub fn new(stems: Vec<Stem>, shared: Arc<MixerShared>) -> Self {
        Self { stems, shared, exhausted_reported: false }
    }

    pub fn stems(&self) -> &[Stem] {
        &self.stems
    }

    // fill one interleaved output block; silent and frozen until playback starts
    pub fn render(&mut self, out: &mut [f32], channels: usize) -> Option<AudioEvent> {
        out.fill(0.0);
        if channels == 0 || !self.shared.is_playing() {
            return None;
        }

        let mut frames = 0u64;
        for chunk in out.chunks_exact_mut(channels) {
            let mut acc = StereoFrame::zero();
            for (i, stem) in self.stems.iter_mut().enumerate() {
                stem.mix_frame_into(&mut acc, self.shared.target_gain(i));
            }
            write_frame(chunk, acc.clamped());
            frames += 1;
        }
        self.shared.advance(frames);

        if !self.exhausted_reported && self.stems.iter().all(Stem::is_finished) {
            self.exhausted_reported = true;
            return Some(AudioEvent::StemsExhausted);
        }
        None
    }

    // back to frame 0; the caller holds the lock so the callback can't be mid-block
    pub fn rewind(&mut self) {
        for stem in &mut self.stems {
            stem.rewind();
        }
        self.shared.reset_frames();
        self.exhausted_reported = false;
    }
}

fn write_frame(chunk: &mut [f32], frame: StereoFrame) {
    match chunk {
        [mono] => *mono = (frame.left + frame.right) * 0.5,
        [left, right, ..] => {
            *left = frame.left;
            *right = frame.right;
        }
        [] => {}
    }
}

/// Everything both sides of the output stream hold on to.
#[derive(Clone)]
pub struct MixerHandle {
    mixer: Arc<Mutex<Mixer>>,
    shared: Arc<MixerShared>,
    events: Sender<AudioEvent>,
}

impl MixerHandle {
    pub fn new(stems: Vec<Stem>, clock: ClockConfig) -> (Self, Receiver<AudioEvent>) {
        let gains: Vec<f32> = stems.iter().map(Stem::gain).collect();
        let shared = Arc::new(MixerShared::new(clock, &gains));
        let mixer = Arc::new(Mutex::new(Mixer::new(stems, Arc::clone(&shared))));
        let (events, events_rx) = crossbeam_channel::bounded(EVENT_QUEUE);
        (Self { mixer, shared, events }, events_rx)
    }

    pub fn shared(&self) -> &MixerShared {
        &self.shared
    }

    pub fn song_time(&self) -> f64 {
        self.shared.song_time()
    }

    // game-loop side
    pub fn apply(&self, cmd: AudioCommand) {
        match cmd {
            AudioCommand::Play => self.shared.set_playing(true),
            AudioCommand::Pause => self.shared.set_playing(false),
            AudioCommand::Rewind => self.with_mixer(Mixer::rewind),
            AudioCommand::SetTargetGain { stem, gain } => self.shared.set_target_gain(stem, gain),
        }
    }

    /// Runs `f` with the callback excluded.
    pub fn with_mixer<R>(&self, f: impl FnOnce(&mut Mixer) -> R) -> R {
        let mut mixer = self.mixer.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut mixer)
    }

    // callback side: never waits on the lock
    pub fn render(&self, out: &mut [f32], channels: usize) {
        let event = match self.mixer.try_lock() {
            Ok(mut mixer) => mixer.render(out, channels),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().render(out, channels),
            Err(TryLockError::WouldBlock) => {
                out.fill(0.0);
                Some(AudioEvent::BlockSkipped { frames: out.len() / channels.max(1) })
            }
        };
        if let Some(event) = event {
            let _ = self.events.try_send(event);
        }
    }
}
