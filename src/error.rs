// typed failures for chart loading and the audio engine; the binary wraps these in anyhow
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("failed to read chart {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed MIDI data: {0}")]
    Midi(#[from] midly::Error),

    #[error("MIDI track {index} runs past the end of the file")]
    TruncatedTrack { index: usize },

    #[error("MIDI header declares {declared} tracks but only {found} are present")]
    MissingTracks { declared: u16, found: u16 },

    #[error("SMPTE time division is not supported")]
    SmpteTiming,

    #[error("MIDI header declares zero ticks per quarter note")]
    ZeroTicksPerQuarter,

    #[error("chart has no [{0}] section")]
    MissingSection(&'static str),

    #[error("unsupported chart file: {0}")]
    UnsupportedFormat(PathBuf),
}

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode {path}: {message}")]
    Decode { path: PathBuf, message: String },

    #[error("{path} has {channels} channels (supported: 1 to 8)")]
    UnsupportedChannels { path: PathBuf, channels: u16 },

    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("no output device available")]
    NoDevice,

    #[error("failed to build output stream: {0}")]
    Stream(String),
}
