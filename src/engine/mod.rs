//! Audio Engine Module
//!
//! Core playback machinery:
//! - Decoded audio buffers and WAV decoding
//! - Per-track signal chain (gain → spatial panner)
//! - Scheduling clock and looping playback sources
//! - Offline mixer and the platform output backend

pub mod buffer;
pub mod clock;
pub mod decode;
pub mod graph;
pub mod mixer;
pub mod output;

pub use buffer::{AudioBuffer, ChannelLayout, INTERNAL_SAMPLE_RATE};
pub use clock::{AudioClock, ManualClock, SystemClock};
pub use decode::decode_wav;
pub use graph::{GainNode, Listener, SignalChain, SpatialPanner};
pub use mixer::{mix_frame, render_block, PlaybackSource};
pub use output::{AudioOutput, TrackStart};
