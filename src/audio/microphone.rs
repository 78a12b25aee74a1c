use anyhow::{bail, Result};

/// Opaque token for one metering session on a microphone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeterHandle(pub u64);

/// Options passed when metering starts.
#[derive(Debug, Clone)]
pub struct MeterConfig {
    /// How often the caller intends to read; backends may size their
    /// analysis window from it.
    pub update_interval_ms: u64,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: 50,
        }
    }
}

/// Loudness-only access to an input device.
///
/// Implementations:
/// - `NoInputDevice`: default build, always denies permission
/// - `CpalMicrophone`: default input device via cpal (`cpal-input` feature)
#[async_trait::async_trait]
pub trait Microphone: Send + Sync {
    /// Ask for capture permission. Returns false when denied.
    async fn request_permission(&self) -> bool;

    /// Acquire the device and begin metering.
    async fn start_metering(&self, config: &MeterConfig) -> Result<MeterHandle>;

    /// Current loudness in dBFS. May fail transiently.
    async fn read_level(&self, handle: MeterHandle) -> Result<f32>;

    /// Release the device. Unknown handles are ignored.
    async fn stop_metering(&self, handle: MeterHandle) -> Result<()>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Stand-in used when the binary is built without an audio backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoInputDevice;

#[async_trait::async_trait]
impl Microphone for NoInputDevice {
    async fn request_permission(&self) -> bool {
        false
    }

    async fn start_metering(&self, _config: &MeterConfig) -> Result<MeterHandle> {
        bail!("no audio input backend compiled in")
    }

    async fn read_level(&self, _handle: MeterHandle) -> Result<f32> {
        bail!("no audio input backend compiled in")
    }

    async fn stop_metering(&self, _handle: MeterHandle) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "none"
    }
}

/// Converts a block of samples in [-1, 1] to an RMS level in dBFS.
/// Silence maps to `floor_db`.
pub fn rms_dbfs(samples: &[f32], floor_db: f32) -> f32 {
    if samples.is_empty() {
        return floor_db;
    }
    let mean_square = samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32;
    let rms = mean_square.sqrt();
    if rms <= 0.0 {
        return floor_db;
    }
    (20.0 * rms.log10()).max(floor_db)
}
