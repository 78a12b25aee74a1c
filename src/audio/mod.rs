pub mod config;
#[cfg(feature = "cpal-input")]
pub mod cpal_input;
pub mod microphone;
pub mod normalizer;
pub mod ring;
pub mod sampler;
pub mod smoothing;

use std::sync::Arc;

pub use config::AudioConfig;
pub use microphone::{MeterConfig, MeterHandle, Microphone, NoInputDevice};
pub use normalizer::LevelNormalizer;
pub use ring::{fit_window, LevelRing};
pub use sampler::{AudioSampler, LevelPipeline, PeriodicTask, SamplerPhase};
pub use smoothing::{FadeOut, SmoothingFilter};

/// The input backend this build was compiled with.
pub fn default_microphone() -> Arc<dyn Microphone> {
    #[cfg(feature = "cpal-input")]
    {
        Arc::new(cpal_input::CpalMicrophone::new())
    }

    #[cfg(not(feature = "cpal-input"))]
    {
        Arc::new(NoInputDevice)
    }
}
