use rand::{rngs::StdRng, Rng, SeedableRng};

use super::config::AudioConfig;

/// Exponential moving average over normalized levels.
///
/// A little uniform jitter is added to each output so a silent room still
/// shows a living display; the jitter never feeds back into the average.
#[derive(Debug, Clone)]
pub struct SmoothingFilter {
    alpha: f32,
    jitter: f32,
    smoothed: f32,
    rng: StdRng,
}

impl SmoothingFilter {
    /// `alpha` is clamped into (0, 1]; non-finite values fall back to 1.
    pub fn new(alpha: f32, jitter: f32) -> Self {
        Self::with_rng(alpha, jitter, StdRng::from_entropy())
    }

    pub fn seeded(alpha: f32, jitter: f32, seed: u64) -> Self {
        Self::with_rng(alpha, jitter, StdRng::seed_from_u64(seed))
    }

    pub fn from_config(config: &AudioConfig) -> Self {
        Self::new(config.smoothing_alpha, config.jitter)
    }

    fn with_rng(alpha: f32, jitter: f32, rng: StdRng) -> Self {
        let alpha = if alpha.is_finite() {
            alpha.clamp(f32::EPSILON, 1.0)
        } else {
            1.0
        };
        let jitter = if jitter.is_finite() { jitter.abs() } else { 0.0 };

        Self {
            alpha,
            jitter,
            smoothed: 0.0,
            rng,
        }
    }

    pub fn update(&mut self, raw: f32) -> f32 {
        let raw = raw.clamp(0.0, 1.0);
        self.smoothed = self.smoothed * (1.0 - self.alpha) + raw * self.alpha;

        let noise = if self.jitter > 0.0 {
            self.rng.gen_range(-self.jitter..=self.jitter)
        } else {
            0.0
        };

        (self.smoothed + noise).clamp(0.0, 1.0)
    }

    /// Current average without jitter.
    pub fn smoothed(&self) -> f32 {
        self.smoothed
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn reset(&mut self) {
        self.smoothed = 0.0;
    }
}

/// Parameters of the post-stop fade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeOut {
    pub decay: f32,
    pub epsilon: f32,
}

impl FadeOut {
    pub fn from_config(config: &AudioConfig) -> Self {
        Self {
            decay: config.fade_decay.clamp(0.0, 0.999),
            epsilon: config.fade_epsilon.max(f32::EPSILON),
        }
    }
}
