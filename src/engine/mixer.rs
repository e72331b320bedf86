//! Playback handles and offline mixing
//!
//! A [`PlaybackSource`] is one stem's playback handle: it binds the
//! decoded buffer to the shared scheduled start time and loops it from
//! there. The mixer sums every source through its signal chain into
//! interleaved stereo, which is both the verification surface for the
//! synchronization guarantees and the feed for headless hosts.

use std::sync::Arc;

use crate::engine::buffer::AudioBuffer;
use crate::engine::graph::{Listener, SignalChain};

/// A scheduled, looping playback of one decoded stem
///
/// Silent before `start_at`; afterwards the buffer repeats with its
/// phase locked to the shared start timestamp, so sources created with
/// the same `start_at` stay aligned forever.
#[derive(Debug, Clone)]
pub struct PlaybackSource {
    buffer: Arc<AudioBuffer>,
    start_at: f64,
    looping: bool,
}

impl PlaybackSource {
    /// Create a looping source scheduled at `start_at` seconds
    pub fn looping(buffer: Arc<AudioBuffer>, start_at: f64) -> Self {
        Self {
            buffer,
            start_at,
            looping: true,
        }
    }

    /// The scheduled start time in session-clock seconds
    #[inline]
    pub fn start_at(&self) -> f64 {
        self.start_at
    }

    #[inline]
    pub fn is_looping(&self) -> bool {
        self.looping
    }

    #[inline]
    pub fn buffer(&self) -> &Arc<AudioBuffer> {
        &self.buffer
    }

    /// The stereo frame playing at the given session-clock time
    ///
    /// Returns None before the scheduled start or, for a non-looping
    /// source, after the buffer has ended.
    pub fn frame_at(&self, time: f64) -> Option<[f32; 2]> {
        if time < self.start_at || self.buffer.is_empty() {
            return None;
        }

        let mut offset = time - self.start_at;
        let duration = self.buffer.duration_secs();

        if self.looping {
            offset %= duration;
        } else if offset >= duration {
            return None;
        }

        let frame_idx = (offset * self.buffer.sample_rate as f64) as usize;
        // Float rounding at the loop seam can land one past the end.
        self.buffer.stereo_frame(frame_idx.min(self.buffer.len() - 1))
    }
}

/// Sum one instant of every track into a stereo frame
pub fn mix_frame<'a, I>(tracks: I, time: f64, listener: &Listener) -> [f32; 2]
where
    I: IntoIterator<Item = (&'a PlaybackSource, &'a SignalChain)>,
{
    let mut out = [0.0_f32; 2];

    for (source, chain) in tracks {
        if let Some(frame) = source.frame_at(time) {
            let processed = chain.process_frame(frame, listener);
            out[0] += processed[0];
            out[1] += processed[1];
        }
    }

    out
}

/// Render a block of interleaved stereo starting at `start_time`
///
/// `sample_rate` is the rendering rate; sources are sampled at the
/// exact per-frame timestamps so scheduled starts land mid-block where
/// they belong.
pub fn render_block(
    tracks: &[(PlaybackSource, SignalChain)],
    start_time: f64,
    frames: usize,
    sample_rate: u32,
    listener: &Listener,
) -> Vec<f32> {
    let mut out = Vec::with_capacity(frames * 2);
    let dt = 1.0 / sample_rate as f64;

    for i in 0..frames {
        let t = start_time + i as f64 * dt;
        let [l, r] = mix_frame(
            tracks.iter().map(|(s, c)| (s, c)),
            t,
            listener,
        );
        out.push(l);
        out.push(r);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::buffer::{ChannelLayout, INTERNAL_SAMPLE_RATE};

    fn ramp_buffer(frames: usize) -> Arc<AudioBuffer> {
        let mut buffer = AudioBuffer::new(frames, ChannelLayout::Mono);
        for (i, s) in buffer.channel_mut(0).iter_mut().enumerate() {
            *s = i as f32;
        }
        Arc::new(buffer)
    }

    #[test]
    fn test_silent_before_start() {
        let source = PlaybackSource::looping(ramp_buffer(100), 0.5);
        assert_eq!(source.frame_at(0.0), None);
        assert_eq!(source.frame_at(0.49), None);
        assert!(source.frame_at(0.5).is_some());
    }

    #[test]
    fn test_loop_wraps_phase_coherently() {
        let frames = INTERNAL_SAMPLE_RATE as usize; // 1 second
        let source = PlaybackSource::looping(ramp_buffer(frames), 0.0);

        let first_pass = source.frame_at(0.25).unwrap();
        let second_pass = source.frame_at(1.25).unwrap();
        let tenth_pass = source.frame_at(9.25).unwrap();

        assert_eq!(first_pass, second_pass);
        assert_eq!(first_pass, tenth_pass);
    }

    #[test]
    fn test_loop_seam_in_bounds() {
        let frames = 480; // 10ms
        let source = PlaybackSource::looping(ramp_buffer(frames), 0.0);
        // Exactly on the seam and just before it must both resolve.
        assert!(source.frame_at(0.01).is_some());
        assert!(source.frame_at(0.0099999).is_some());
    }

    #[test]
    fn test_mix_sums_tracks() {
        let buffer = {
            let mut b = AudioBuffer::new(10, ChannelLayout::Mono);
            b.channel_mut(0).fill(0.5);
            Arc::new(b)
        };

        let mut audible = SignalChain::new([0.0, 0.0, 0.0]);
        audible.gain.set_gain(1.0);
        let muted = SignalChain::new([0.0, 0.0, 0.0]);

        let tracks = vec![
            (PlaybackSource::looping(Arc::clone(&buffer), 0.0), audible),
            (PlaybackSource::looping(buffer, 0.0), muted),
        ];

        let [l, r] = mix_frame(tracks.iter().map(|(s, c)| (s, c)), 0.0, &Listener::default());

        // Only the audible track contributes; emitter sits on the
        // listener so both channels get the centered equal-power weight.
        let expected = 0.5 * std::f32::consts::FRAC_1_SQRT_2;
        assert!((l - expected).abs() < 1e-6);
        assert!((r - expected).abs() < 1e-6);
    }

    #[test]
    fn test_render_block_length_and_schedule() {
        let source = PlaybackSource::looping(ramp_buffer(INTERNAL_SAMPLE_RATE as usize), 0.1);
        let mut chain = SignalChain::new([0.0, 0.0, 0.0]);
        chain.gain.set_gain(1.0);

        let tracks = vec![(source, chain)];
        let block = render_block(&tracks, 0.0, 4800, INTERNAL_SAMPLE_RATE, &Listener::default());

        assert_eq!(block.len(), 4800 * 2);
        // First 0.1s (4800 frames at 48kHz) is entirely pre-start silence.
        assert!(block.iter().all(|&s| s == 0.0));
    }
}
