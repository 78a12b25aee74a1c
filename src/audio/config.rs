use serde::{Deserialize, Serialize};

/// Tunables for the level pipeline.
///
/// None of these have a single correct value; the defaults reproduce the
/// look of the original waveform (32 bars, 50 ms cadence, -60..0 dB window).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AudioConfig {
    /// Number of bars kept in the ring buffer.
    pub bar_count: usize,

    /// Sampler cadence.
    pub tick_interval_ms: u64,
    /// Upper bound on a single meter read before the tick is skipped.
    pub read_timeout_ms: u64,

    /// dB window mapped onto [0, 1]
    pub min_db: f32,
    pub max_db: f32,
    /// Exponent < 1 lifts quiet input; `None` keeps the mapping linear.
    pub boost_exponent: Option<f32>,
    /// Re-scale applied after the boost.
    pub boost_gain: f32,

    /// Weight of the newest reading in the moving average.
    pub smoothing_alpha: f32,
    /// Half-width of the uniform jitter added after smoothing.
    pub jitter: f32,

    /// Fade-out after stop
    pub fade_decay: f32,
    pub fade_interval_ms: u64,
    pub fade_epsilon: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            bar_count: 32,
            tick_interval_ms: 50,
            read_timeout_ms: 250,
            min_db: -60.0,
            max_db: 0.0,
            boost_exponent: None,
            boost_gain: 1.0,
            smoothing_alpha: 0.35,
            jitter: 0.02,
            fade_decay: 0.9,
            fade_interval_ms: 50,
            fade_epsilon: 0.01,
        }
    }
}
