//! Platform audio output
//!
//! Real playback goes through rodio when the `rodio_backend` feature is
//! enabled. Without it the backend is a silent stub with the same
//! surface, so session logic runs and is testable on machines with no
//! audio device. The offline mixer remains the authoritative rendering
//! path either way.

use std::sync::Arc;

use tracing::debug;

use crate::engine::buffer::AudioBuffer;
use crate::error::Result;

/// Everything the backend needs to begin one track's playback
pub struct TrackStart {
    /// Track name (sink key)
    pub name: String,
    /// Decoded stem
    pub buffer: Arc<AudioBuffer>,
    /// Emitter position for the platform's spatialization
    pub position: [f32; 3],
    /// Initial volume (0.0 or 1.0)
    pub volume: f32,
}

#[cfg(feature = "rodio_backend")]
mod backend {
    use super::*;
    use rodio::buffer::SamplesBuffer;
    use rodio::{OutputStream, OutputStreamHandle, Source, SpatialSink};
    use std::collections::HashMap;
    use std::io;

    /// Backend state for rodio audio
    pub struct BackendState {
        /// Output stream (must be kept alive)
        _stream: OutputStream,
        /// Stream handle for creating sinks
        stream_handle: OutputStreamHandle,
        /// One spatial sink per started track
        sinks: HashMap<String, SpatialSink>,
    }

    impl BackendState {
        pub fn new() -> Result<Self> {
            let (stream, stream_handle) = OutputStream::try_default().map_err(|e| {
                crate::error::StemloopError::Io(io::Error::new(
                    io::ErrorKind::Other,
                    format!("Failed to open audio output stream: {}", e),
                ))
            })?;

            Ok(Self {
                _stream: stream,
                stream_handle,
                sinks: HashMap::new(),
            })
        }

        pub fn start_tracks(&mut self, batch: Vec<TrackStart>, listener: [f32; 3]) -> Result<()> {
            let left_ear = [listener[0] - 0.1, listener[1], listener[2]];
            let right_ear = [listener[0] + 0.1, listener[1], listener[2]];

            // Build every sink paused, then release together so the
            // platform starts them as one batch.
            let mut started = Vec::with_capacity(batch.len());
            for spec in batch {
                let sink =
                    SpatialSink::try_new(&self.stream_handle, spec.position, left_ear, right_ear)
                        .map_err(|e| {
                            crate::error::StemloopError::Io(io::Error::new(
                                io::ErrorKind::Other,
                                format!("Failed to create audio sink: {}", e),
                            ))
                        })?;
                sink.pause();
                sink.set_volume(spec.volume);

                let source = SamplesBuffer::new(
                    spec.buffer.channels() as u16,
                    spec.buffer.sample_rate,
                    spec.buffer.to_interleaved(),
                )
                .repeat_infinite();
                sink.append(source);

                started.push((spec.name, sink));
            }

            for (name, sink) in started {
                sink.play();
                self.sinks.insert(name, sink);
            }

            Ok(())
        }

        pub fn set_track_volume(&self, name: &str, volume: f32) {
            if let Some(sink) = self.sinks.get(name) {
                sink.set_volume(volume);
            }
        }

        pub fn resume(&self) {
            for sink in self.sinks.values() {
                sink.play();
            }
        }

        pub fn active_track_count(&self) -> usize {
            self.sinks.len()
        }
    }
}

#[cfg(not(feature = "rodio_backend"))]
mod backend {
    use super::*;

    /// Backend state stub when rodio is not available
    pub struct BackendState {
        started: Vec<String>,
    }

    impl BackendState {
        pub fn new() -> Result<Self> {
            debug!("Audio backend: stub (no rodio)");
            Ok(Self {
                started: Vec::new(),
            })
        }

        pub fn start_tracks(
            &mut self,
            batch: Vec<TrackStart>,
            _listener: [f32; 3],
        ) -> Result<()> {
            for spec in batch {
                self.started.push(spec.name);
            }
            Ok(())
        }

        pub fn set_track_volume(&self, _name: &str, _volume: f32) {}

        pub fn resume(&self) {}

        pub fn active_track_count(&self) -> usize {
            self.started.len()
        }
    }
}

use backend::BackendState;

/// The output end of every signal chain
///
/// Starts suspended, like a platform audio context before the first
/// user gesture; the session resumes it during start.
pub struct AudioOutput {
    backend: Option<BackendState>,
    suspended: bool,
}

impl AudioOutput {
    /// Open the platform output, falling back to a silent stub if the
    /// device cannot be opened
    pub fn new() -> Self {
        let backend = match BackendState::new() {
            Ok(b) => Some(b),
            Err(e) => {
                tracing::warn!("Failed to initialize audio output: {}. Using stub.", e);
                None
            }
        };

        Self {
            backend,
            suspended: true,
        }
    }

    /// A silent output for tests and headless operation
    pub fn stub() -> Self {
        Self {
            backend: None,
            suspended: true,
        }
    }

    /// Check if real playback is available
    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    /// Whether the output is still waiting for its first resume
    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Resume the output if suspended
    pub fn resume(&mut self) {
        if self.suspended {
            self.suspended = false;
            debug!("audio output resumed");
        }
        if let Some(backend) = &self.backend {
            backend.resume();
        }
    }

    /// Begin playback of a batch of tracks as one unit
    pub fn start_tracks(&mut self, batch: Vec<TrackStart>, listener: [f32; 3]) -> Result<()> {
        debug!(tracks = batch.len(), "starting output batch");
        if let Some(backend) = &mut self.backend {
            backend.start_tracks(batch, listener)?;
        }
        Ok(())
    }

    /// Push a track's new volume to the platform sink
    pub fn set_track_volume(&self, name: &str, volume: f32) {
        if let Some(backend) = &self.backend {
            backend.set_track_volume(name, volume);
        }
    }

    /// Number of tracks the backend is playing
    pub fn active_track_count(&self) -> usize {
        self.backend
            .as_ref()
            .map(|b| b.active_track_count())
            .unwrap_or(0)
    }
}

impl Default for AudioOutput {
    fn default() -> Self {
        Self::stub()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stub_output() {
        let output = AudioOutput::stub();
        assert!(!output.is_available());
        assert_eq!(output.active_track_count(), 0);
    }

    #[test]
    fn test_starts_suspended_until_resumed() {
        let mut output = AudioOutput::stub();
        assert!(output.is_suspended());

        output.resume();
        assert!(!output.is_suspended());

        // Resuming again is a no-op
        output.resume();
        assert!(!output.is_suspended());
    }
}
