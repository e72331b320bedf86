//! Stemloop - Spatialized Multi-Stem Loop Playback
//!
//! Stemloop plays a set of instrument stems in perfect sync, each
//! spatially positioned at a clickable 3D model in the host scene:
//! - The first click on any bound model starts every stem at one shared
//!   scheduled timestamp, with only the clicked stem audible
//! - Every later click toggles that stem's mute state (binary 0/1 gain)
//!
//! # Architecture
//!
//! Each track plays through its own signal chain: gain → spatial panner
//! → output. The session manager owns the track registry and the
//! one-shot started flag; the click dispatcher owns the session and an
//! explicit, validated model→track mapping. Starting playback is a
//! two-phase operation: acquire all stems concurrently, then commit one
//! shared start time so looped playback stays phase-aligned.

pub mod engine;
pub mod error;
pub mod scene;
pub mod session;

pub use error::{Result, StemloopError};
pub use scene::{ClickDispatcher, ClickOutcome, Scene, SceneModel};
pub use session::{AudioSession, TrackManifest, SCHEDULE_LEAD_SECS};
