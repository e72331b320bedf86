//! Decoded audio storage
//!
//! All stems are held as non-interleaved 32-bit float samples at the
//! internal 48kHz rate so every source mixes on one clock.

use crate::error::{Result, StemloopError};

/// Internal sample rate for all mixing (48kHz)
pub const INTERNAL_SAMPLE_RATE: u32 = 48000;

/// Audio channel configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ChannelLayout {
    /// Single channel (mono)
    Mono,
    /// Two channels (stereo: left, right)
    #[default]
    Stereo,
}

impl ChannelLayout {
    /// Returns the number of channels for this layout
    pub fn num_channels(&self) -> usize {
        match self {
            ChannelLayout::Mono => 1,
            ChannelLayout::Stereo => 2,
        }
    }

    /// Create a ChannelLayout from a channel count
    pub fn from_count(count: usize) -> Option<Self> {
        match count {
            1 => Some(ChannelLayout::Mono),
            2 => Some(ChannelLayout::Stereo),
            _ => None,
        }
    }
}

/// Decoded audio for one stem
///
/// Stores audio as non-interleaved 32-bit floating point samples.
/// Each channel is a separate Vec<f32>.
///
/// # Example
/// ```
/// use stemloop::engine::buffer::{AudioBuffer, ChannelLayout, INTERNAL_SAMPLE_RATE};
///
/// let buffer = AudioBuffer::new(INTERNAL_SAMPLE_RATE as usize, ChannelLayout::Stereo);
/// assert_eq!(buffer.channels(), 2);
/// assert_eq!(buffer.len(), 48000);
/// ```
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    /// Sample data: outer Vec is channels, inner Vec is samples
    pub samples: Vec<Vec<f32>>,
    /// Sample rate in Hz (default: 48000)
    pub sample_rate: u32,
}

impl AudioBuffer {
    /// Create a new zeroed buffer with the given frame count and layout
    pub fn new(num_samples: usize, layout: ChannelLayout) -> Self {
        let num_channels = layout.num_channels();
        let samples = vec![vec![0.0_f32; num_samples]; num_channels];
        Self {
            samples,
            sample_rate: INTERNAL_SAMPLE_RATE,
        }
    }

    /// Create a buffer from interleaved sample data
    ///
    /// # Arguments
    /// * `interleaved` - Interleaved sample data (L, R, L, R, ... for stereo)
    /// * `layout` - Channel configuration
    /// * `sample_rate` - Sample rate in Hz
    pub fn from_interleaved(
        interleaved: &[f32],
        layout: ChannelLayout,
        sample_rate: u32,
    ) -> Result<Self> {
        let num_channels = layout.num_channels();

        if interleaved.is_empty() {
            return Ok(Self {
                samples: vec![Vec::new(); num_channels],
                sample_rate,
            });
        }

        if interleaved.len() % num_channels != 0 {
            return Err(StemloopError::DecodeFailed {
                name: String::new(),
                reason: format!(
                    "Interleaved data length {} is not divisible by channel count {}",
                    interleaved.len(),
                    num_channels
                ),
                source: None,
            });
        }

        let num_samples = interleaved.len() / num_channels;
        let mut samples = vec![Vec::with_capacity(num_samples); num_channels];

        for frame in interleaved.chunks_exact(num_channels) {
            for (ch, &sample) in frame.iter().enumerate() {
                samples[ch].push(sample);
            }
        }

        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Convert the buffer to interleaved format
    pub fn to_interleaved(&self) -> Vec<f32> {
        let num_channels = self.channels();
        let num_samples = self.len();

        if num_channels == 0 || num_samples == 0 {
            return Vec::new();
        }

        let mut interleaved = Vec::with_capacity(num_channels * num_samples);

        for sample_idx in 0..num_samples {
            for channel in &self.samples {
                interleaved.push(channel[sample_idx]);
            }
        }

        interleaved
    }

    /// Get the number of channels
    #[inline]
    pub fn channels(&self) -> usize {
        self.samples.len()
    }

    /// Get the number of samples per channel
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.first().map(|ch| ch.len()).unwrap_or(0)
    }

    /// Check if the buffer is empty (no samples)
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the duration in seconds
    #[inline]
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f64 / self.sample_rate as f64
    }

    /// Get the channel layout
    pub fn channel_layout(&self) -> Option<ChannelLayout> {
        ChannelLayout::from_count(self.channels())
    }

    /// Get immutable access to a channel's samples
    ///
    /// # Panics
    /// Panics if the channel index is out of bounds
    #[inline]
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.samples[index]
    }

    /// Get mutable access to a channel's samples
    ///
    /// # Panics
    /// Panics if the channel index is out of bounds
    #[inline]
    pub fn channel_mut(&mut self, index: usize) -> &mut [f32] {
        &mut self.samples[index]
    }

    /// Read one frame as a stereo pair
    ///
    /// Mono buffers duplicate their single channel into both outputs.
    /// Returns None if the frame index is out of bounds.
    #[inline]
    pub fn stereo_frame(&self, index: usize) -> Option<[f32; 2]> {
        match self.channels() {
            1 => {
                let s = *self.samples[0].get(index)?;
                Some([s, s])
            }
            2 => {
                let l = *self.samples[0].get(index)?;
                let r = *self.samples[1].get(index)?;
                Some([l, r])
            }
            _ => None,
        }
    }
}

impl Default for AudioBuffer {
    fn default() -> Self {
        Self::new(0, ChannelLayout::Stereo)
    }
}
