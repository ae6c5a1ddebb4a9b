pub mod audio;
pub mod audio_api;
pub mod chart;
pub mod error;
pub mod judge;
pub mod loader;
pub mod logging;
pub mod middle;
pub mod pipeline;
pub mod shared;
pub mod tui;
