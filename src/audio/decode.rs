// Stem decoding: whole files into memory up front, the callback never touches disk
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use lewton::inside_ogg::OggStreamReader;
use ogg::reading::PacketReader;

use super::frame::StereoFrame;
use super::stem::Stem;
use crate::error::AudioError;

pub const MAX_CHANNELS: u16 = 8;
const MAX_STEM_NAME: usize = 20;
const WAV_CHUNK_FRAMES: usize = 4096;
// Opus always decodes at 48 kHz; 120 ms is the longest packet
const OPUS_RATE: u32 = 48_000;
const OPUS_MAX_PACKET_FRAMES: usize = 5760;

/// A codec stream producing interleaved float PCM.
pub trait PcmSource {
    fn channels(&self) -> u16;
    fn sample_rate(&self) -> u32;
    // frames, when the container says up front
    fn frames_hint(&self) -> Option<usize> {
        None
    }
    /// Appends the next decoded chunk to `buf`. Returns false at end of stream.
    fn read_chunk(&mut self, buf: &mut Vec<f32>) -> Result<bool, String>;
}

struct WavSource {
    reader: hound::WavReader<BufReader<File>>,
    spec: hound::WavSpec,
}

impl PcmSource for WavSource {
    fn channels(&self) -> u16 {
        self.spec.channels
    }

    fn sample_rate(&self) -> u32 {
        self.spec.sample_rate
    }

    fn frames_hint(&self) -> Option<usize> {
        Some(self.reader.duration() as usize)
    }

    fn read_chunk(&mut self, buf: &mut Vec<f32>) -> Result<bool, String> {
        let before = buf.len();
        // whole frames only, so chunk boundaries never split a frame
        let n = WAV_CHUNK_FRAMES * self.spec.channels as usize;
        match self.spec.sample_format {
            hound::SampleFormat::Float => { // float, just pass it through
                for s in self.reader.samples::<f32>().take(n) {
                    buf.push(s.map_err(|e| e.to_string())?);
                }
            }
            hound::SampleFormat::Int => { // int, scale into [-1, 1)
                let max = (1i64 << (self.spec.bits_per_sample.max(1) - 1)) as f32;
                for s in self.reader.samples::<i32>().take(n) {
                    buf.push(s.map_err(|e| e.to_string())? as f32 / max);
                }
            }
        }
        Ok(buf.len() > before)
    }
}

struct OggSource {
    reader: OggStreamReader<BufReader<File>>,
}

impl PcmSource for OggSource {
    fn channels(&self) -> u16 {
        self.reader.ident_hdr.audio_channels as u16
    }

    fn sample_rate(&self) -> u32 {
        self.reader.ident_hdr.audio_sample_rate
    }

    fn read_chunk(&mut self, buf: &mut Vec<f32>) -> Result<bool, String> {
        match self.reader.read_dec_packet_itl().map_err(|e| e.to_string())? {
            Some(packet) => {
                buf.extend(packet.iter().map(|&s| s as f32 / i16::MAX as f32));
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// The fields of an `OpusHead` identification packet this decoder uses.
#[derive(Clone, Copy, Debug, PartialEq)]
struct OpusHead {
    channels: u16,
    pre_skip: usize,
    output_gain_db: f32,
    mapping_family: u8,
}

impl OpusHead {
    fn parse(packet: &[u8]) -> Result<Self, String> {
        if packet.len() < 19 || !packet.starts_with(b"OpusHead") {
            return Err("missing OpusHead packet".to_string());
        }
        Ok(Self {
            channels: packet[9] as u16,
            pre_skip: u16::from_le_bytes([packet[10], packet[11]]) as usize,
            // Q7.8 fixed point dB
            output_gain_db: i16::from_le_bytes([packet[16], packet[17]]) as f32 / 256.0,
            mapping_family: packet[18],
        })
    }
}

struct OpusSource {
    packets: PacketReader<BufReader<File>>,
    // None for layouts that need the multistream decoder
    decoder: Option<opus::Decoder>,
    channels: u16,
    pre_skip: usize,
    gain: f32,
    pcm: Vec<f32>,
}

impl OpusSource {
    fn open(path: &Path) -> Result<Self, String> {
        let file = File::open(path).map_err(|e| e.to_string())?;
        let mut packets = PacketReader::new(BufReader::new(file));
        let head = packets
            .read_packet()
            .map_err(|e| e.to_string())?
            .ok_or("empty Ogg stream")?;
        let head = OpusHead::parse(&head.data)?;
        // OpusTags carries nothing we need
        packets
            .read_packet()
            .map_err(|e| e.to_string())?
            .ok_or("missing OpusTags packet")?;

        let layout = match (head.mapping_family, head.channels) {
            (0, 1) => Some(opus::Channels::Mono),
            (0, 2) => Some(opus::Channels::Stereo),
            _ => None,
        };
        let decoder = layout
            .map(|ch| opus::Decoder::new(OPUS_RATE, ch))
            .transpose()
            .map_err(|e| e.to_string())?;

        Ok(Self {
            packets,
            decoder,
            channels: head.channels,
            pre_skip: head.pre_skip,
            gain: 10f32.powf(head.output_gain_db / 20.0),
            pcm: vec![0.0; OPUS_MAX_PACKET_FRAMES * head.channels.max(1) as usize],
        })
    }
}

impl PcmSource for OpusSource {
    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        OPUS_RATE
    }

    fn read_chunk(&mut self, buf: &mut Vec<f32>) -> Result<bool, String> {
        let Some(packet) = self.packets.read_packet().map_err(|e| e.to_string())? else {
            return Ok(false);
        };
        let decoder = self
            .decoder
            .as_mut()
            .ok_or_else(|| format!("{}-channel multistream Opus is not supported", self.channels))?;
        if packet.data.is_empty() {
            return Ok(true);
        }
        let ch = self.channels as usize;
        let frames = decoder
            .decode_float(&packet.data, &mut self.pcm, false)
            .map_err(|e| e.to_string())?;

        // the encoder's priming samples come first and are dropped
        let skip = self.pre_skip.min(frames);
        self.pre_skip -= skip;
        let decoded = &self.pcm[skip * ch..frames * ch];
        if self.gain == 1.0 {
            buf.extend_from_slice(decoded);
        } else {
            buf.extend(decoded.iter().map(|s| s * self.gain));
        }
        Ok(true)
    }
}

fn open_source(path: &Path) -> Result<Box<dyn PcmSource>, AudioError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    let decode_err = |message: String| AudioError::Decode { path: path.to_path_buf(), message };

    match ext.as_deref() {
        Some("wav") => {
            let reader = hound::WavReader::open(path).map_err(|e| decode_err(e.to_string()))?;
            let spec = reader.spec();
            Ok(Box::new(WavSource { reader, spec }))
        }
        Some("ogg") => {
            let file = File::open(path)
                .map_err(|source| AudioError::Io { path: path.to_path_buf(), source })?;
            let reader = OggStreamReader::new(BufReader::new(file)).map_err(|e| decode_err(e.to_string()))?;
            Ok(Box::new(OggSource { reader }))
        }
        Some("opus") => Ok(Box::new(OpusSource::open(path).map_err(decode_err)?)),
        _ => Err(AudioError::UnsupportedFormat(path.display().to_string())),
    }
}

pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| matches!(e.to_ascii_lowercase().as_str(), "wav" | "ogg" | "opus"))
}

/// Decodes a whole file into a stem at `target_rate`.
pub fn decode_stem(path: &Path, target_rate: u32) -> Result<Stem, AudioError> {
    let mut source = open_source(path)?;
    let channels = source.channels();
    if channels == 0 || channels > MAX_CHANNELS {
        return Err(AudioError::UnsupportedChannels { path: path.to_path_buf(), channels });
    }

    let mut frames: Vec<StereoFrame> = Vec::with_capacity(source.frames_hint().unwrap_or(0));
    let mut chunk = Vec::new();
    loop {
        chunk.clear();
        let more = source
            .read_chunk(&mut chunk)
            .map_err(|message| AudioError::Decode { path: path.to_path_buf(), message })?;
        append_interleaved(&mut frames, &chunk, channels as usize);
        if !more {
            break;
        }
    }

    let source_rate = source.sample_rate();
    if source_rate != target_rate && source_rate > 0 {
        log::debug!("resampling {} from {source_rate} Hz to {target_rate} Hz", path.display());
        frames = resample_linear(&frames, source_rate, target_rate);
    }
    log::info!(
        "decoded {} ({} ch, {:.1}s)",
        path.display(),
        channels,
        frames.len() as f64 / target_rate.max(1) as f64
    );
    Ok(Stem::new(stem_name(path), frames))
}

// mono is duplicated, anything wider keeps its first two channels
fn append_interleaved(frames: &mut Vec<StereoFrame>, samples: &[f32], channels: usize) {
    if channels == 1 {
        frames.extend(samples.iter().map(|&s| StereoFrame::mono(s)));
    } else {
        frames.extend(samples.chunks_exact(channels).map(|c| StereoFrame { left: c[0], right: c[1] }));
    }
}

pub fn stem_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().chars().take(MAX_STEM_NAME).collect())
        .unwrap_or_default()
}

/// Rate conversion by straight-line interpolation between neighbouring
/// frames. Output past the last source frame repeats it.
pub fn resample_linear(frames: &[StereoFrame], source_rate: u32, target_rate: u32) -> Vec<StereoFrame> {
    let Some(&last) = frames.last() else {
        return Vec::new();
    };
    if source_rate == target_rate || source_rate == 0 || target_rate == 0 {
        return frames.to_vec();
    }
    let step = source_rate as f64 / target_rate as f64;
    let len = (frames.len() as f64 / step).ceil() as usize;
    (0..len)
        .map(|i| {
            let pos = i as f64 * step;
            let at = pos as usize;
            match (frames.get(at), frames.get(at + 1)) {
                (Some(a), Some(b)) => {
                    let w = (pos - at as f64) as f32;
                    StereoFrame {
                        left: a.left + (b.left - a.left) * w,
                        right: a.right + (b.right - a.right) * w,
                    }
                }
                _ => last,
            }
        })
        .collect()
}
