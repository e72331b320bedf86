//! Per-track signal chain
//!
//! Every stem plays through gain → spatial panner → output. The gain
//! node is the mute switch (0.0 or 1.0); the panner places the stem at
//! its model's coordinates relative to the listener using the linear
//! distance model and equal-power stereo panning.

use std::f32::consts::FRAC_PI_4;

/// Default reference distance: attenuation is 1.0 at or inside it
pub const DEFAULT_REF_DISTANCE: f32 = 1.0;

/// Default maximum audible distance
pub const DEFAULT_MAX_DISTANCE: f32 = 10.0;

/// Default rolloff factor for the linear distance model
pub const DEFAULT_ROLLOFF_FACTOR: f32 = 1.5;

/// Volume control stage in the signal chain
///
/// Tracks are created fully muted and flipped between 0.0 and 1.0 by
/// the mute toggle. No fade ramp is applied.
#[derive(Debug, Clone, Copy)]
pub struct GainNode {
    gain: f32,
}

impl GainNode {
    /// Create a muted gain node (initial volume 0.0)
    pub fn new() -> Self {
        Self { gain: 0.0 }
    }

    /// Current linear gain
    #[inline]
    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Set the linear gain directly
    pub fn set_gain(&mut self, gain: f32) {
        self.gain = gain;
    }

    /// Flip between fully muted (0.0) and fully audible (1.0)
    ///
    /// Returns the new gain.
    pub fn toggle(&mut self) -> f32 {
        self.gain = if self.gain > 0.0 { 0.0 } else { 1.0 };
        self.gain
    }
}

impl Default for GainNode {
    fn default() -> Self {
        Self::new()
    }
}

/// The virtual ear the panners attenuate and pan against
///
/// Faces down the negative z axis with +x to its right, so panning is
/// derived from positions alone.
#[derive(Debug, Clone, Copy)]
pub struct Listener {
    /// World position
    pub position: [f32; 3],
}

impl Listener {
    pub fn new(position: [f32; 3]) -> Self {
        Self { position }
    }
}

impl Default for Listener {
    fn default() -> Self {
        Self::new([0.0, 0.0, 0.0])
    }
}

/// Spatial audio node positioning a stem relative to the listener
///
/// Distance attenuation follows the linear model:
/// `1 - rolloff * (clamp(d, ref, max) - ref) / (max - ref)`, clamped to
/// [0, 1]. Stereo placement is equal-power panning by azimuth.
#[derive(Debug, Clone, Copy)]
pub struct SpatialPanner {
    /// Emitter position (the bound model's coordinates)
    pub position: [f32; 3],
    /// Distance at which attenuation is still 1.0
    pub ref_distance: f32,
    /// Distance at or beyond which the stem is inaudible
    pub max_distance: f32,
    /// Attenuation slope for the linear distance model
    pub rolloff_factor: f32,
}

impl SpatialPanner {
    /// Create a panner at the given position with the default
    /// distance configuration
    pub fn new(position: [f32; 3]) -> Self {
        Self {
            position,
            ref_distance: DEFAULT_REF_DISTANCE,
            max_distance: DEFAULT_MAX_DISTANCE,
            rolloff_factor: DEFAULT_ROLLOFF_FACTOR,
        }
    }

    /// Move the emitter
    pub fn set_position(&mut self, position: [f32; 3]) {
        self.position = position;
    }

    /// Distance attenuation relative to the listener (linear model)
    pub fn attenuation(&self, listener: &Listener) -> f32 {
        let distance = self.distance_to(listener);

        if self.max_distance <= self.ref_distance {
            return 1.0;
        }

        let clamped = distance.clamp(self.ref_distance, self.max_distance);
        let falloff = (clamped - self.ref_distance) / (self.max_distance - self.ref_distance);
        (1.0 - self.rolloff_factor * falloff).clamp(0.0, 1.0)
    }

    /// Per-channel weights combining attenuation and equal-power pan
    pub fn channel_gains(&self, listener: &Listener) -> [f32; 2] {
        let attenuation = self.attenuation(listener);
        let pan = self.pan_position(listener);

        // Equal-power crossfade: full left keeps unity power, as does
        // full right; center plays both at 1/sqrt(2).
        let theta = (pan + 1.0) * FRAC_PI_4;
        [attenuation * theta.cos(), attenuation * theta.sin()]
    }

    /// Pan position in [-1, 1] from the horizontal offset to the listener
    fn pan_position(&self, listener: &Listener) -> f32 {
        let dx = self.position[0] - listener.position[0];
        let dz = self.position[2] - listener.position[2];
        let horizontal = (dx * dx + dz * dz).sqrt();

        if horizontal < f32::EPSILON {
            return 0.0;
        }

        (dx / horizontal).clamp(-1.0, 1.0)
    }

    fn distance_to(&self, listener: &Listener) -> f32 {
        let dx = self.position[0] - listener.position[0];
        let dy = self.position[1] - listener.position[1];
        let dz = self.position[2] - listener.position[2];
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// One stem's full chain: gain → panner
///
/// The output stage (mixer or platform backend) pulls frames through
/// `process_frame`.
#[derive(Debug, Clone, Copy)]
pub struct SignalChain {
    pub gain: GainNode,
    pub panner: SpatialPanner,
}

impl SignalChain {
    /// Build a chain with a muted gain node and a panner at the model
    /// position
    pub fn new(model_position: [f32; 3]) -> Self {
        Self {
            gain: GainNode::new(),
            panner: SpatialPanner::new(model_position),
        }
    }

    /// Run one stereo frame through gain and panner
    pub fn process_frame(&self, frame: [f32; 2], listener: &Listener) -> [f32; 2] {
        let g = self.gain.gain();
        let [wl, wr] = self.panner.channel_gains(listener);
        [frame[0] * g * wl, frame[1] * g * wr]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use test_case::test_case;

    #[test]
    fn test_gain_starts_muted() {
        let gain = GainNode::new();
        assert_eq!(gain.gain(), 0.0);
    }

    #[test]
    fn test_gain_toggle_pair_is_idempotent() {
        let mut gain = GainNode::new();
        gain.set_gain(1.0);

        assert_eq!(gain.toggle(), 0.0);
        assert_eq!(gain.toggle(), 1.0);
        assert_eq!(gain.gain(), 1.0);
    }

    #[test_case(0.0, 1.0 ; "at listener")]
    #[test_case(1.0, 1.0 ; "at reference distance")]
    #[test_case(10.0, 0.0 ; "at max distance")]
    #[test_case(25.0, 0.0 ; "beyond max distance")]
    fn test_linear_attenuation(distance: f32, expected: f32) {
        let panner = SpatialPanner::new([distance, 0.0, 0.0]);
        let listener = Listener::default();
        assert_relative_eq!(panner.attenuation(&listener), expected, epsilon = 1e-6);
    }

    #[test]
    fn test_attenuation_midpoint_scaled_by_rolloff() {
        // Halfway between ref (1.0) and max (10.0): falloff 0.5,
        // attenuation 1 - 1.5 * 0.5 = 0.25
        let panner = SpatialPanner::new([5.5, 0.0, 0.0]);
        let listener = Listener::default();
        assert_relative_eq!(panner.attenuation(&listener), 0.25, epsilon = 1e-6);
    }

    #[test]
    fn test_pan_center_when_colocated() {
        let panner = SpatialPanner::new([0.0, 0.0, 0.0]);
        let listener = Listener::default();
        let [l, r] = panner.channel_gains(&listener);
        assert_relative_eq!(l, r, epsilon = 1e-6);
    }

    #[test]
    fn test_pan_hard_right() {
        let panner = SpatialPanner::new([1.0, 0.0, 0.0]);
        let listener = Listener::default();
        let [l, r] = panner.channel_gains(&listener);
        // At ref distance attenuation is 1.0; pan fully right
        assert_relative_eq!(l, 0.0, epsilon = 1e-6);
        assert_relative_eq!(r, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_pan_hard_left() {
        let panner = SpatialPanner::new([-1.0, 0.0, 0.0]);
        let listener = Listener::default();
        let [l, r] = panner.channel_gains(&listener);
        assert_relative_eq!(l, 1.0, epsilon = 1e-6);
        assert_relative_eq!(r, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_equal_power_center() {
        // Straight ahead: both channels at 1/sqrt(2)
        let panner = SpatialPanner::new([0.0, 0.0, -1.0]);
        let listener = Listener::default();
        let [l, r] = panner.channel_gains(&listener);
        assert_relative_eq!(l, std::f32::consts::FRAC_1_SQRT_2, epsilon = 1e-6);
        assert_relative_eq!(r, std::f32::consts::FRAC_1_SQRT_2, epsilon = 1e-6);
    }

    #[test]
    fn test_chain_muted_outputs_silence() {
        let chain = SignalChain::new([0.0, 0.0, -1.0]);
        let listener = Listener::default();
        let out = chain.process_frame([0.8, 0.8], &listener);
        assert_eq!(out, [0.0, 0.0]);
    }

    #[test]
    fn test_chain_audible_applies_pan_weights() {
        let mut chain = SignalChain::new([0.0, 0.0, -1.0]);
        chain.gain.set_gain(1.0);
        let listener = Listener::default();
        let out = chain.process_frame([1.0, 1.0], &listener);
        assert_relative_eq!(out[0], std::f32::consts::FRAC_1_SQRT_2, epsilon = 1e-6);
        assert_relative_eq!(out[1], std::f32::consts::FRAC_1_SQRT_2, epsilon = 1e-6);
    }
}
