use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::Receiver;

use crate::audio_api::AudioCommand;
use crate::error::AudioError;

mod clock;
mod decode;
mod frame;
mod mixer;
mod stem;
mod telemetry;

pub use clock::{ClockConfig, MixerShared, DEFAULT_BUFFER_FRAMES, LATENCY_MULT};
pub use decode::{decode_stem, is_supported, resample_linear, stem_name, PcmSource, MAX_CHANNELS};
pub use frame::StereoFrame;
pub use mixer::{Mixer, MixerHandle};
pub use stem::{player_stem_index, smooth_gain, Stem, GAIN_STEP};
pub use telemetry::{AudioEvent, LogObserver, MixObserver, NoopObserver};

const OUTPUT_CHANNELS: u16 = 2;

/// The default output device, opened but not yet streaming. Stems are decoded
/// at its sample rate before `start` hands them to the callback.
pub struct OutputDevice {
    device: cpal::Device,
    config: cpal::StreamConfig,
    clock: ClockConfig,
}

pub fn open_output() -> Result<OutputDevice, AudioError> {
    let host = cpal::default_host();
    let device = host.default_output_device().ok_or(AudioError::NoDevice)?;
    let supported = device
        .default_output_config()
        .map_err(|e| AudioError::Stream(e.to_string()))?;

    if supported.sample_format() != cpal::SampleFormat::F32 {
        return Err(AudioError::UnsupportedFormat(format!(
            "output sample format {:?} (only f32 is supported)",
            supported.sample_format()
        )));
    }

    // small fixed buffers keep the latency compensation honest
    let buffer_frames = match supported.buffer_size() {
        cpal::SupportedBufferSize::Range { min, max } => DEFAULT_BUFFER_FRAMES.clamp(*min, *max),
        cpal::SupportedBufferSize::Unknown => DEFAULT_BUFFER_FRAMES,
    };
    let sample_rate = supported.sample_rate();
    let config = cpal::StreamConfig {
        channels: OUTPUT_CHANNELS,
        sample_rate,
        buffer_size: cpal::BufferSize::Fixed(buffer_frames),
    };
    let clock = ClockConfig::new(sample_rate, buffer_frames);
    log::info!(
        "audio output: {} Hz, {} frame buffer, {:.1} ms compensated latency",
        sample_rate,
        buffer_frames,
        clock.latency_frames() as f64 * 1000.0 / sample_rate as f64
    );

    Ok(OutputDevice { device, config, clock })
}

impl OutputDevice {
    pub fn sample_rate(&self) -> u32 {
        self.clock.sample_rate
    }

    // silent until an AudioCommand::Play arrives
    pub fn start(self, stems: Vec<Stem>) -> Result<AudioHandle, AudioError> {
        let (mixer, events_rx) = MixerHandle::new(stems, self.clock);
        let callback_mixer = mixer.clone();
        let channels = self.config.channels as usize;

        let err_fn = |err| log::error!("audio output stream error: {err}");

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                    callback_mixer.render(data, channels);
                },
                err_fn,
                None,
            )
            .map_err(|e| AudioError::Stream(e.to_string()))?;
        stream.play().map_err(|e| AudioError::Stream(e.to_string()))?;

        Ok(AudioHandle {
            mixer,
            events_rx,
            stream: Some(stream),
        })
    }
}

pub struct AudioHandle {
    mixer: MixerHandle,
    events_rx: Receiver<AudioEvent>,
    stream: Option<cpal::Stream>,
}

impl AudioHandle {
    pub fn send(&self, cmd: AudioCommand) {
        self.mixer.apply(cmd);
    }

    /// Latency-compensated seconds since the song started.
    pub fn song_time(&self) -> f64 {
        self.mixer.song_time()
    }

    pub fn stem_names(&self) -> Vec<String> {
        self.mixer
            .with_mixer(|m| m.stems().iter().map(|s| s.name().to_string()).collect())
    }

    // drain whatever the callback reported since the last frame
    pub fn pump_events(&self, observer: &mut dyn MixObserver) {
        while let Ok(event) = self.events_rx.try_recv() {
            observer.on_event(event);
        }
    }
}

impl Drop for AudioHandle {
    fn drop(&mut self) {
        // stop, then close the stream; stems are freed only after the callback is gone
        self.mixer.shared().set_playing(false);
        if let Some(stream) = self.stream.take() {
            let _ = stream.pause();
            drop(stream);
        }
    }
}
