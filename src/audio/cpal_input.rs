//! Default-input-device meter built on cpal.
//!
//! cpal streams are not `Send` on every platform, so each metering session
//! gets a dedicated thread that owns the stream. The input callback reduces
//! every block to an RMS level in dBFS and publishes it through an atomic;
//! `read_level` just loads the latest value.

use std::{
    sync::{
        atomic::{AtomicU32, AtomicU64, Ordering},
        mpsc, Arc, Mutex,
    },
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, bail, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};
use log::{error, info};

use super::microphone::{rms_dbfs, MeterConfig, MeterHandle, Microphone};

const SILENCE_DB: f32 = -160.0;

struct ActiveMeter {
    handle: MeterHandle,
    level_bits: Arc<AtomicU32>,
    stop_tx: mpsc::Sender<()>,
    worker: JoinHandle<()>,
}

pub struct CpalMicrophone {
    active: Mutex<Option<ActiveMeter>>,
    next_id: AtomicU64,
}

impl CpalMicrophone {
    pub fn new() -> Self {
        Self {
            active: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    fn lock_active(&self) -> std::sync::MutexGuard<'_, Option<ActiveMeter>> {
        match self.active.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for CpalMicrophone {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Microphone for CpalMicrophone {
    async fn request_permission(&self) -> bool {
        // Desktop hosts prompt when the stream opens; having a device is the
        // closest thing to a grant we can check up front.
        tokio::task::spawn_blocking(|| cpal::default_host().default_input_device().is_some())
            .await
            .unwrap_or(false)
    }

    async fn start_metering(&self, _config: &MeterConfig) -> Result<MeterHandle> {
        if self.lock_active().is_some() {
            bail!("microphone already metering");
        }

        let handle = MeterHandle(self.next_id.fetch_add(1, Ordering::SeqCst));
        let level_bits = Arc::new(AtomicU32::new(SILENCE_DB.to_bits()));
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
        let bits_for_thread = Arc::clone(&level_bits);

        let worker = thread::Builder::new()
            .name("void-meter".into())
            .spawn(move || {
                let stream = match open_input_stream(bits_for_thread) {
                    Ok(stream) => stream,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };
                if let Err(err) = stream.play() {
                    let _ = ready_tx.send(Err(anyhow!("failed to start input stream: {err}")));
                    return;
                }
                if ready_tx.send(Ok(())).is_err() {
                    return;
                }

                // Hold the stream until asked to stop or the sender is gone.
                let _ = stop_rx.recv();
                drop(stream);
                info!("input meter released");
            })
            .context("failed to spawn meter thread")?;

        let ready = tokio::task::spawn_blocking(move || ready_rx.recv())
            .await
            .context("meter readiness wait failed")?
            .map_err(|_| anyhow!("meter thread exited before signaling readiness"))?;

        if let Err(err) = ready {
            let _ = worker.join();
            return Err(err);
        }

        *self.lock_active() = Some(ActiveMeter {
            handle,
            level_bits,
            stop_tx,
            worker,
        });
        Ok(handle)
    }

    async fn read_level(&self, handle: MeterHandle) -> Result<f32> {
        let guard = self.lock_active();
        match guard.as_ref() {
            Some(active) if active.handle == handle => {
                Ok(f32::from_bits(active.level_bits.load(Ordering::Relaxed)))
            }
            _ => bail!("meter {handle:?} is not active"),
        }
    }

    async fn stop_metering(&self, handle: MeterHandle) -> Result<()> {
        let active = {
            let mut guard = self.lock_active();
            match guard.as_ref() {
                Some(active) if active.handle == handle => guard.take(),
                _ => None,
            }
        };

        if let Some(active) = active {
            let _ = active.stop_tx.send(());
            tokio::task::spawn_blocking(move || active.worker.join())
                .await
                .context("meter join task failed")?
                .map_err(|_| anyhow!("meter thread panicked"))?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "cpal"
    }
}

fn open_input_stream(level_bits: Arc<AtomicU32>) -> Result<Stream> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("no audio input device found"))?;

    let supported = device
        .default_input_config()
        .context("no supported input configuration")?;
    let sample_format = supported.sample_format();
    let config: StreamConfig = supported.into();

    info!(
        "metering {:?} at {} Hz, {} channels, {:?}",
        device.name(),
        config.sample_rate.0,
        config.channels,
        sample_format
    );

    match sample_format {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, level_bits),
        SampleFormat::I16 => build_stream::<i16>(&device, &config, level_bits),
        SampleFormat::U16 => build_stream::<u16>(&device, &config, level_bits),
        other => bail!("unsupported sample format {other:?}"),
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    level_bits: Arc<AtomicU32>,
) -> Result<Stream>
where
    T: cpal::Sample + cpal::SizedSample + Send + 'static,
    f32: cpal::FromSample<T>,
{
    let mut scratch: Vec<f32> = Vec::new();
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                scratch.clear();
                scratch.extend(data.iter().map(|sample| sample.to_sample::<f32>()));
                let db = rms_dbfs(&scratch, SILENCE_DB);
                level_bits.store(db.to_bits(), Ordering::Relaxed);
            },
            |err| error!("input stream error: {err}"),
            None,
        )
        .context("failed to build input stream")
}
