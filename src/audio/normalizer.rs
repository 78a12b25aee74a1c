use super::config::AudioConfig;

/// Maps meter readings in dB onto a [0, 1] level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelNormalizer {
    pub min_db: f32,
    pub max_db: f32,
    pub boost_exponent: Option<f32>,
    pub boost_gain: f32,
}

impl LevelNormalizer {
    pub fn new(min_db: f32, max_db: f32) -> Self {
        Self {
            min_db,
            max_db,
            boost_exponent: None,
            boost_gain: 1.0,
        }
    }

    pub fn with_boost(mut self, exponent: f32, gain: f32) -> Self {
        self.boost_exponent = Some(exponent);
        self.boost_gain = gain;
        self
    }

    pub fn from_config(config: &AudioConfig) -> Self {
        Self {
            min_db: config.min_db,
            max_db: config.max_db,
            boost_exponent: config.boost_exponent,
            boost_gain: config.boost_gain,
        }
    }

    /// Out-of-window readings saturate to 0 or 1. A degenerate window or a
    /// NaN reading yields silence.
    pub fn normalize(&self, db: f32) -> f32 {
        let span = self.max_db - self.min_db;
        if !(span > 0.0) || db.is_nan() {
            return 0.0;
        }

        let linear = ((db - self.min_db) / span).clamp(0.0, 1.0);

        match self.boost_exponent {
            Some(exponent) if exponent > 0.0 => {
                (linear.powf(exponent) * self.boost_gain).clamp(0.0, 1.0)
            }
            _ => linear,
        }
    }
}

impl Default for LevelNormalizer {
    fn default() -> Self {
        Self::from_config(&AudioConfig::default())
    }
}
