//! Stem decoding
//!
//! Turns fetched byte buffers into playable [`AudioBuffer`]s. WAV is the
//! supported container; all bit depths are converted to 32-bit float and
//! everything is resampled to the internal 48kHz rate on the way in.
//! Sample rate conversion uses linear interpolation (TODO: upgrade to sinc).

use std::io::Cursor;

use hound::{SampleFormat, WavReader};
use tracing::debug;

use crate::engine::buffer::{AudioBuffer, ChannelLayout, INTERNAL_SAMPLE_RATE};
use crate::error::{Result, StemloopError};

/// Decode a WAV byte buffer into the internal format
///
/// # Arguments
/// * `name` - Track name, used only for error context
/// * `bytes` - Complete WAV file contents
///
/// # Errors
/// * `DecodeFailed` - If the bytes are not a valid WAV stream
/// * `UnsupportedFormat` - If the audio has more than 2 channels or an
///   unhandled bit depth
/// * `EmptyAudio` - If the stream decodes to zero samples
pub fn decode_wav(name: &str, bytes: &[u8]) -> Result<AudioBuffer> {
    let reader = WavReader::new(Cursor::new(bytes)).map_err(|e| StemloopError::DecodeFailed {
        name: name.to_string(),
        reason: format!("Failed to parse WAV stream: {}", e),
        source: Some(Box::new(e)),
    })?;

    let spec = reader.spec();
    let source_sample_rate = spec.sample_rate;
    let channels = spec.channels as usize;

    if channels > 2 {
        return Err(StemloopError::UnsupportedFormat {
            format: format!("{}-channel audio (only mono/stereo supported)", channels),
        });
    }

    let samples_f32 = read_samples_as_f32(name, reader, spec.bits_per_sample, spec.sample_format)?;

    if samples_f32.is_empty() {
        return Err(StemloopError::EmptyAudio);
    }

    // De-interleave into separate channels
    let channel_data = deinterleave(&samples_f32, channels);

    // Resample to the internal rate if needed
    let resampled_data = if source_sample_rate != INTERNAL_SAMPLE_RATE {
        resample_channels(&channel_data, source_sample_rate, INTERNAL_SAMPLE_RATE)
    } else {
        channel_data
    };

    let layout = if channels == 1 {
        ChannelLayout::Mono
    } else {
        ChannelLayout::Stereo
    };

    let mut buffer = AudioBuffer::new(resampled_data[0].len(), layout);
    for (ch, data) in resampled_data.iter().enumerate() {
        buffer.channel_mut(ch).copy_from_slice(data);
    }

    debug!(
        track = name,
        frames = buffer.len(),
        channels = buffer.channels(),
        source_rate = source_sample_rate,
        "decoded stem"
    );

    Ok(buffer)
}

/// Read samples from a WAV reader and convert to f32
fn read_samples_as_f32<R: std::io::Read>(
    name: &str,
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> Result<Vec<f32>> {
    let decode_err = |reason: String,
                      source: Box<dyn std::error::Error + Send + Sync>| {
        StemloopError::DecodeFailed {
            name: name.to_string(),
            reason,
            source: Some(source),
        }
    };

    match sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(|e| decode_err(format!("Failed to read float samples: {}", e), Box::new(e))),
        SampleFormat::Int => match bits_per_sample {
            8 => reader
                .samples::<i8>()
                .map(|s| s.map(|v| v as f32 / 128.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| {
                    decode_err(format!("Failed to read 8-bit samples: {}", e), Box::new(e))
                }),
            16 => reader
                .samples::<i16>()
                .map(|s| s.map(|v| v as f32 / 32768.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| {
                    decode_err(format!("Failed to read 16-bit samples: {}", e), Box::new(e))
                }),
            24 => {
                // 24-bit stored as i32 in hound
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / 8388608.0))
                    .collect::<std::result::Result<Vec<f32>, _>>()
                    .map_err(|e| {
                        decode_err(format!("Failed to read 24-bit samples: {}", e), Box::new(e))
                    })
            }
            32 => reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / 2147483648.0))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| {
                    decode_err(
                        format!("Failed to read 32-bit int samples: {}", e),
                        Box::new(e),
                    )
                }),
            _ => Err(StemloopError::UnsupportedFormat {
                format: format!("{}-bit integer audio", bits_per_sample),
            }),
        },
    }
}

/// De-interleave samples from [L,R,L,R,...] to [[L,L,...], [R,R,...]]
fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    let frames = samples.len() / channels;
    let mut result = vec![Vec::with_capacity(frames); channels];

    for (i, sample) in samples.iter().enumerate() {
        result[i % channels].push(*sample);
    }

    result
}

/// Resample audio channels to a different sample rate
fn resample_channels(channels: &[Vec<f32>], source_rate: u32, target_rate: u32) -> Vec<Vec<f32>> {
    let ratio = target_rate as f64 / source_rate as f64;

    channels
        .iter()
        .map(|channel| resample_linear(channel, ratio))
        .collect()
}

/// Linear interpolation resampling
fn resample_linear(samples: &[f32], ratio: f64) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }

    let source_len = samples.len();
    let target_len = ((source_len as f64) * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(target_len);

    for i in 0..target_len {
        let src_pos = i as f64 / ratio;
        let src_idx = src_pos.floor() as usize;
        let frac = (src_pos - src_idx as f64) as f32;

        let sample = if src_idx + 1 < source_len {
            samples[src_idx] * (1.0 - frac) + samples[src_idx + 1] * frac
        } else {
            samples[source_len - 1]
        };

        output.push(sample);
    }

    output
}
