use std::{future::Future, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use super::{
    config::AudioConfig,
    microphone::{MeterConfig, MeterHandle, Microphone},
    normalizer::LevelNormalizer,
    ring::LevelRing,
    smoothing::{FadeOut, SmoothingFilter},
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SamplerPhase {
    Idle,
    RequestingPermission,
    Recording,
    Stopping,
}

impl Default for SamplerPhase {
    fn default() -> Self {
        SamplerPhase::Idle
    }
}

/// Normalizer → filter → ring, shared between the sampler and its tasks.
#[derive(Debug)]
pub struct LevelPipeline {
    normalizer: LevelNormalizer,
    filter: SmoothingFilter,
    ring: LevelRing,
}

impl LevelPipeline {
    pub fn new(normalizer: LevelNormalizer, filter: SmoothingFilter, ring: LevelRing) -> Self {
        Self {
            normalizer,
            filter,
            ring,
        }
    }

    pub fn from_config(config: &AudioConfig) -> Self {
        Self::new(
            LevelNormalizer::from_config(config),
            SmoothingFilter::from_config(config),
            LevelRing::new(config.bar_count),
        )
    }

    /// Feeds one dB reading through the chain and returns the new window.
    pub fn ingest(&mut self, db: f32) -> Vec<f32> {
        let level = self.normalizer.normalize(db);
        let smoothed = self.filter.update(level);
        self.ring.push(smoothed);
        self.ring.snapshot()
    }

    /// One fade step. Returns the window and whether the fade has settled,
    /// in which case the ring is forced to zero.
    pub fn fade_step(&mut self, fade: FadeOut) -> (Vec<f32>, bool) {
        let settled = self.ring.decay(fade.decay, fade.epsilon);
        if settled {
            self.ring.clear();
            self.filter.reset();
        }
        (self.ring.snapshot(), settled)
    }

    pub fn reset(&mut self) {
        self.ring.clear();
        self.filter.reset();
    }

    pub fn snapshot(&self) -> Vec<f32> {
        self.ring.snapshot()
    }
}

/// A spawned periodic task together with the token that stops it.
pub struct PeriodicTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    pub fn spawn<F, Fut>(task: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let handle = tokio::spawn(task(token.clone()));
        Self { token, handle }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub async fn cancel_and_join(self) -> Result<()> {
        self.token.cancel();
        self.join().await
    }

    pub async fn join(self) -> Result<()> {
        self.handle.await.context("periodic task failed to join")
    }
}

/// Owns the microphone for one recording at a time and turns its readings
/// into a rolling window of bar levels.
pub struct AudioSampler {
    microphone: Arc<dyn Microphone>,
    config: AudioConfig,
    permission: Option<bool>,
    pipeline: Arc<Mutex<LevelPipeline>>,
    levels_tx: watch::Sender<Vec<f32>>,
    phase_tx: watch::Sender<SamplerPhase>,
    meter: Option<MeterHandle>,
    ticker: Option<PeriodicTask>,
    fade: Option<PeriodicTask>,
}

impl AudioSampler {
    pub fn new(microphone: Arc<dyn Microphone>, config: AudioConfig) -> Self {
        let pipeline = LevelPipeline::from_config(&config);
        Self::with_pipeline(microphone, config, pipeline)
    }

    pub fn with_pipeline(
        microphone: Arc<dyn Microphone>,
        config: AudioConfig,
        pipeline: LevelPipeline,
    ) -> Self {
        let (levels_tx, _) = watch::channel(pipeline.snapshot());
        let (phase_tx, _) = watch::channel(SamplerPhase::Idle);

        Self {
            microphone,
            config,
            permission: None,
            pipeline: Arc::new(Mutex::new(pipeline)),
            levels_tx,
            phase_tx,
            meter: None,
            ticker: None,
            fade: None,
        }
    }

    pub fn phase(&self) -> SamplerPhase {
        *self.phase_tx.borrow()
    }

    /// `None` until permission has been asked for.
    pub fn permission_granted(&self) -> Option<bool> {
        self.permission
    }

    pub fn is_recording(&self) -> bool {
        self.phase() == SamplerPhase::Recording
    }

    /// Live bar levels, oldest first. Updated on every tick and fade step.
    pub fn levels(&self) -> watch::Receiver<Vec<f32>> {
        self.levels_tx.subscribe()
    }

    pub fn fade_in_progress(&self) -> bool {
        self.fade.as_ref().map(|task| !task.is_finished()).unwrap_or(false)
    }

    /// Begins sampling. Denied permission is not an error: the sampler stays
    /// idle and `permission_granted()` reports `Some(false)`. Calling this
    /// while already recording does nothing.
    pub async fn start(&mut self) -> Result<()> {
        if self.phase() != SamplerPhase::Idle {
            log_debug!("sampler start ignored in phase {:?}", self.phase());
            return Ok(());
        }

        if self.permission != Some(true) {
            self.set_phase(SamplerPhase::RequestingPermission);
            let granted = self.microphone.request_permission().await;
            self.permission = Some(granted);
            if !granted {
                log_warn!("microphone permission denied ({})", self.microphone.name());
                self.set_phase(SamplerPhase::Idle);
                return Ok(());
            }
        }

        // A stale fade must not write into the fresh buffer.
        self.cancel_fade().await;
        let cleared = {
            let mut pipeline = self.pipeline.lock().await;
            pipeline.reset();
            pipeline.snapshot()
        };
        self.levels_tx.send_replace(cleared);

        let meter_config = MeterConfig {
            update_interval_ms: self.config.tick_interval_ms,
        };
        let handle = match self.microphone.start_metering(&meter_config).await {
            Ok(handle) => handle,
            Err(err) => {
                self.set_phase(SamplerPhase::Idle);
                return Err(err.context(format!(
                    "failed to start metering on {}",
                    self.microphone.name()
                )));
            }
        };
        self.meter = Some(handle);

        let microphone = Arc::clone(&self.microphone);
        let pipeline = Arc::clone(&self.pipeline);
        let levels_tx = self.levels_tx.clone();
        let tick = Duration::from_millis(self.config.tick_interval_ms.max(1));
        let read_timeout = Duration::from_millis(self.config.read_timeout_ms.max(1));

        self.ticker = Some(PeriodicTask::spawn(move |token| {
            sampling_loop(microphone, handle, pipeline, levels_tx, tick, read_timeout, token)
        }));
        self.set_phase(SamplerPhase::Recording);

        log_info!(
            "sampler recording on {} every {}ms",
            self.microphone.name(),
            tick.as_millis()
        );
        Ok(())
    }

    /// Stops sampling, releases the microphone and starts the fade-out.
    /// Does nothing while idle.
    pub async fn stop(&mut self) -> Result<()> {
        if self.phase() != SamplerPhase::Recording {
            return Ok(());
        }
        self.set_phase(SamplerPhase::Stopping);

        if let Some(ticker) = self.ticker.take() {
            if let Err(err) = ticker.cancel_and_join().await {
                log_warn!("sampling loop ended abnormally: {err:?}");
            }
        }

        if let Some(handle) = self.meter.take() {
            if let Err(err) = self.microphone.stop_metering(handle).await {
                log_warn!("failed to release {}: {err:?}", self.microphone.name());
            }
        }

        self.fade = Some(self.spawn_fade());
        self.set_phase(SamplerPhase::Idle);
        log_info!("sampler stopped, fading out");
        Ok(())
    }

    /// Resolves once the running fade (if any) has reached silence or been
    /// cancelled.
    pub async fn wait_for_fade(&mut self) {
        if let Some(fade) = self.fade.take() {
            if let Err(err) = fade.join().await {
                log_warn!("fade task ended abnormally: {err:?}");
            }
        }
    }

    async fn cancel_fade(&mut self) {
        if let Some(fade) = self.fade.take() {
            if let Err(err) = fade.cancel_and_join().await {
                log_warn!("fade task ended abnormally: {err:?}");
            }
        }
    }

    fn spawn_fade(&self) -> PeriodicTask {
        let pipeline = Arc::clone(&self.pipeline);
        let levels_tx = self.levels_tx.clone();
        let interval = Duration::from_millis(self.config.fade_interval_ms.max(1));
        let fade = FadeOut::from_config(&self.config);

        PeriodicTask::spawn(move |token| fade_loop(pipeline, levels_tx, interval, fade, token))
    }

    fn set_phase(&self, phase: SamplerPhase) {
        self.phase_tx.send_replace(phase);
    }
}

impl Drop for AudioSampler {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.cancel();
        }
        if let Some(fade) = self.fade.take() {
            fade.cancel();
        }

        // Dropped mid-recording: hand the release to the runtime if one is
        // still around.
        if let Some(handle) = self.meter.take() {
            let microphone = Arc::clone(&self.microphone);
            match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    runtime.spawn(async move {
                        let _ = microphone.stop_metering(handle).await;
                    });
                }
                Err(_) => log_warn!("sampler dropped outside a runtime; meter {handle:?} leaked"),
            }
        }
    }
}

async fn sampling_loop(
    microphone: Arc<dyn Microphone>,
    handle: MeterHandle,
    pipeline: Arc<Mutex<LevelPipeline>>,
    levels_tx: watch::Sender<Vec<f32>>,
    tick: Duration,
    read_timeout: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = time::interval(tick);
    // A slow read drops the ticks it overlapped instead of queueing them.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let reading = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            reading = time::timeout(read_timeout, microphone.read_level(handle)) => reading,
        };

        let db = match reading {
            Ok(Ok(db)) => db,
            Ok(Err(err)) => {
                log_debug!("meter read failed, skipping tick: {err}");
                continue;
            }
            Err(_) => {
                log_debug!("meter read exceeded {}ms, skipping tick", read_timeout.as_millis());
                continue;
            }
        };

        let snapshot = pipeline.lock().await.ingest(db);
        levels_tx.send_replace(snapshot);
    }

    log_debug!("sampling loop shutting down");
}

async fn fade_loop(
    pipeline: Arc<Mutex<LevelPipeline>>,
    levels_tx: watch::Sender<Vec<f32>>,
    interval: Duration,
    fade: FadeOut,
    cancel_token: CancellationToken,
) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                log_debug!("fade cancelled");
                return;
            }
            _ = ticker.tick() => {}
        }

        let (snapshot, settled) = pipeline.lock().await.fade_step(fade);
        levels_tx.send_replace(snapshot);

        if settled {
            log_debug!("fade settled");
            return;
        }
    }
}
