//! Audio Session Manager
//!
//! Owns the track registry, the one-shot started flag, and every
//! track's signal chain. Starting playback is an explicit two-phase
//! operation: acquire all stems concurrently, then commit a shared
//! scheduled start so every looping source stays phase-aligned.

pub mod fetch;

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::engine::buffer::AudioBuffer;
use crate::engine::clock::AudioClock;
use crate::engine::decode::decode_wav;
use crate::engine::graph::{Listener, SignalChain};
use crate::engine::mixer::{self, PlaybackSource};
use crate::engine::output::{AudioOutput, TrackStart};
use crate::error::{Result, StemloopError};
use crate::scene::{Scene, SceneModel};

use fetch::TrackFetcher;

/// How far ahead of the clock the shared start is scheduled, so every
/// source has time to be wired up before its first frame is due
pub const SCHEDULE_LEAD_SECS: f64 = 0.1;

/// One manifest row: a track name and where its audio lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    pub url: String,
}

/// The fixed mapping from track name to audio asset URL
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackManifest {
    entries: Vec<ManifestEntry>,
}

impl TrackManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration of one track
    pub fn with_track(mut self, name: impl Into<String>, url: impl Into<String>) -> Self {
        self.entries.push(ManifestEntry {
            name: name.into(),
            url: url.into(),
        });
        self
    }

    /// The original three-stem demo mapping
    pub fn demo() -> Self {
        Self::new()
            .with_track(
                "mic",
                "https://cdn.glitch.global/deaad1b3-c137-49a3-b9f1-f506e217d6d8/Michael%20Jackson%20Loop-vocals.mp3?v=1750764233292",
            )
            .with_track(
                "guitar",
                "https://cdn.glitch.global/deaad1b3-c137-49a3-b9f1-f506e217d6d8/Michael%20Jackson%20Loop-bass.mp3?v=1750764228420",
            )
            .with_track(
                "drums",
                "https://cdn.glitch.global/deaad1b3-c137-49a3-b9f1-f506e217d6d8/Michael%20Jackson%20Loop-drums.mp3?v=1750764225146",
            )
    }

    pub fn url_of(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.url.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One instrument stem and its playback state
pub struct Track {
    /// Unique track name (manifest key)
    pub name: String,
    /// Where the audio was fetched from
    pub url: String,
    /// Decoded audio
    pub buffer: Arc<AudioBuffer>,
    /// Gain → panner chain
    pub chain: SignalChain,
    /// Identifier of the bound 3D model
    pub model_id: String,
    /// Playback handle, present once the session has started
    pub source: Option<PlaybackSource>,
}

/// The session: every track, the one-shot started flag, and the output
///
/// Explicitly owned by the interaction handler; there are no
/// module-level singletons. All mutation happens through `&mut self`,
/// so click handling cannot interleave.
pub struct AudioSession {
    manifest: TrackManifest,
    fetcher: Arc<dyn TrackFetcher>,
    clock: Arc<dyn AudioClock>,
    output: AudioOutput,
    listener: Listener,
    tracks: HashMap<String, Track>,
    started: bool,
}

impl AudioSession {
    /// Create a session with a silent output (see [`Self::with_output`]
    /// for platform playback)
    pub fn new(
        manifest: TrackManifest,
        fetcher: Arc<dyn TrackFetcher>,
        clock: Arc<dyn AudioClock>,
    ) -> Self {
        Self {
            manifest,
            fetcher,
            clock,
            output: AudioOutput::default(),
            listener: Listener::default(),
            tracks: HashMap::new(),
            started: false,
        }
    }

    /// Attach an output backend (platform or stub)
    pub fn with_output(mut self, output: AudioOutput) -> Self {
        self.output = output;
        self
    }

    /// Move the virtual listener
    pub fn set_listener_position(&mut self, position: [f32; 3]) {
        self.listener.position = position;
    }

    pub fn manifest(&self) -> &TrackManifest {
        &self.manifest
    }

    /// Whether playback has been initiated for this session
    ///
    /// Transitions once, irreversibly, on the first start attempt.
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Names of all loaded tracks
    pub fn track_names(&self) -> Vec<&str> {
        self.tracks.keys().map(String::as_str).collect()
    }

    /// A loaded track's current gain
    pub fn track_gain(&self, name: &str) -> Result<f32> {
        self.tracks
            .get(name)
            .map(|t| t.chain.gain.gain())
            .ok_or_else(|| StemloopError::TrackNotLoaded {
                name: name.to_string(),
            })
    }

    /// A started track's scheduled start time
    pub fn track_start_time(&self, name: &str) -> Option<f64> {
        self.tracks
            .get(name)?
            .source
            .as_ref()
            .map(|s| s.start_at())
    }

    /// Fetch and decode one track, building its muted signal chain at
    /// the model's position
    ///
    /// The gain node starts at 0.0; the panner sits at the model's
    /// coordinates with the default distance configuration. Fetch and
    /// decode errors propagate with no retry.
    pub async fn load_track(&mut self, name: &str, model: &SceneModel) -> Result<()> {
        let url = self
            .manifest
            .url_of(name)
            .ok_or_else(|| StemloopError::UnknownTrack {
                name: name.to_string(),
            })?
            .to_string();

        let buffer = acquire(&*self.fetcher, name, &url).await?;

        debug!(track = name, model = %model.id, "track loaded");
        self.tracks.insert(
            name.to_string(),
            Track {
                name: name.to_string(),
                url,
                buffer: Arc::new(buffer),
                chain: SignalChain::new(model.position),
                model_id: model.id.clone(),
                source: None,
            },
        );
        Ok(())
    }

    /// Flip a track's gain between fully muted and fully audible
    ///
    /// Returns the new gain. Fails with `TrackNotLoaded` if the track
    /// has not been loaded.
    pub fn toggle_track(&mut self, name: &str) -> Result<f32> {
        let track = self
            .tracks
            .get_mut(name)
            .ok_or_else(|| StemloopError::TrackNotLoaded {
                name: name.to_string(),
            })?;

        let gain = track.chain.gain.toggle();
        self.output.set_track_volume(name, gain);
        info!(track = name, gain, "track toggled");
        Ok(gain)
    }

    /// Start synchronized playback of every manifest track, exactly once
    ///
    /// Phase 1 acquires all missing stems concurrently; phase 2 commits
    /// one shared start timestamp, builds each chain at its model's
    /// position, and sets exactly `unmuted_name` audible. Errors with
    /// `AlreadyStarted` on a second call. The started flag is set
    /// before the first suspension point and never reset, so racing
    /// clicks cannot trigger a second start; a failed acquire leaves
    /// the session started but silent.
    pub async fn start_all(&mut self, unmuted_name: &str, scene: &Scene) -> Result<()> {
        if self.started {
            return Err(StemloopError::AlreadyStarted);
        }
        if !self.manifest.contains(unmuted_name) {
            return Err(StemloopError::UnknownTrack {
                name: unmuted_name.to_string(),
            });
        }

        self.started = true;
        self.output.resume();

        // Phase 1: acquire. Already-loaded tracks keep their buffers;
        // everything else is fetched and decoded concurrently.
        let mut handles = Vec::new();
        for entry in self.manifest.iter() {
            if self.tracks.contains_key(&entry.name) {
                continue;
            }
            let fetcher = Arc::clone(&self.fetcher);
            let entry = entry.clone();
            handles.push(tokio::spawn(async move {
                let buffer = acquire(&*fetcher, &entry.name, &entry.url).await?;
                Ok::<_, StemloopError>((entry, buffer))
            }));
        }

        let mut acquired = Vec::with_capacity(handles.len());
        for handle in handles {
            let joined = handle.await.map_err(|e| {
                StemloopError::Io(io::Error::new(io::ErrorKind::Other, e.to_string()))
            })?;
            acquired.push(joined?);
        }

        // Phase 2: commit. One timestamp shared by every source.
        let start_at = self.clock.now() + SCHEDULE_LEAD_SECS;

        for (entry, buffer) in acquired {
            let model = scene.model_for_track(&entry.name).ok_or_else(|| {
                StemloopError::BindingInvalid {
                    reason: format!("track '{}' has no bound model", entry.name),
                }
            })?;
            self.tracks.insert(
                entry.name.clone(),
                Track {
                    name: entry.name.clone(),
                    url: entry.url,
                    buffer: Arc::new(buffer),
                    chain: SignalChain::new(model.position),
                    model_id: model.id.clone(),
                    source: None,
                },
            );
        }

        let mut batch = Vec::with_capacity(self.tracks.len());
        for track in self.tracks.values_mut() {
            let gain = if track.name == unmuted_name { 1.0 } else { 0.0 };
            track.chain.gain.set_gain(gain);
            track.source = Some(PlaybackSource::looping(
                Arc::clone(&track.buffer),
                start_at,
            ));
            batch.push(TrackStart {
                name: track.name.clone(),
                buffer: Arc::clone(&track.buffer),
                position: track.chain.panner.position,
                volume: gain,
            });
        }

        self.output.start_tracks(batch, self.listener.position)?;

        info!(
            tracks = self.tracks.len(),
            audible = unmuted_name,
            start_at,
            "synchronized playback started"
        );
        Ok(())
    }

    /// Render a block of the running mix as interleaved stereo
    ///
    /// Deterministic offline output for verification and headless
    /// hosts. Tracks that have not started yet contribute silence.
    pub fn render_block(&self, start_time: f64, frames: usize, sample_rate: u32) -> Vec<f32> {
        let tracks: Vec<_> = self
            .tracks
            .values()
            .filter_map(|t| t.source.clone().map(|s| (s, t.chain)))
            .collect();

        mixer::render_block(&tracks, start_time, frames, sample_rate, &self.listener)
    }
}

/// Fetch and decode one stem
async fn acquire(fetcher: &dyn TrackFetcher, name: &str, url: &str) -> Result<AudioBuffer> {
    let bytes = fetcher.fetch(name, url).await?;
    decode_wav(name, &bytes)
}
