#![allow(dead_code)]

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::{bail, Result};
use tokio::sync::watch;
use void_lib::audio::{AudioConfig, MeterConfig, MeterHandle, Microphone};

/// Microphone double with a fixed level and optional failure modes.
pub struct ScriptedMicrophone {
    grant: bool,
    level_bits: AtomicU32,
    fail_start: AtomicBool,
    /// Every n-th read fails when set.
    fail_every: Option<usize>,
    read_delay: Option<Duration>,
    next_handle: AtomicU64,
    pub permission_requests: AtomicUsize,
    pub started: AtomicUsize,
    pub active: AtomicUsize,
    pub reads: AtomicUsize,
}

impl ScriptedMicrophone {
    pub fn new(level_db: f32) -> Self {
        Self {
            grant: true,
            level_bits: AtomicU32::new(level_db.to_bits()),
            fail_start: AtomicBool::new(false),
            fail_every: None,
            read_delay: None,
            next_handle: AtomicU64::new(1),
            permission_requests: AtomicUsize::new(0),
            started: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            reads: AtomicUsize::new(0),
        }
    }

    pub fn denying() -> Self {
        Self {
            grant: false,
            ..Self::new(-20.0)
        }
    }

    pub fn failing_every(mut self, n: usize) -> Self {
        self.fail_every = Some(n);
        self
    }

    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    pub fn set_level(&self, level_db: f32) {
        self.level_bits.store(level_db.to_bits(), Ordering::SeqCst);
    }

    pub fn set_fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Microphone for ScriptedMicrophone {
    async fn request_permission(&self) -> bool {
        self.permission_requests.fetch_add(1, Ordering::SeqCst);
        self.grant
    }

    async fn start_metering(&self, _config: &MeterConfig) -> Result<MeterHandle> {
        if self.fail_start.load(Ordering::SeqCst) {
            bail!("device busy");
        }
        self.started.fetch_add(1, Ordering::SeqCst);
        self.active.fetch_add(1, Ordering::SeqCst);
        Ok(MeterHandle(self.next_handle.fetch_add(1, Ordering::SeqCst)))
    }

    async fn read_level(&self, _handle: MeterHandle) -> Result<f32> {
        let read = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(delay) = self.read_delay {
            tokio::time::sleep(delay).await;
        }
        if matches!(self.fail_every, Some(n) if read % n == 0) {
            bail!("transient read failure");
        }
        Ok(f32::from_bits(self.level_bits.load(Ordering::SeqCst)))
    }

    async fn stop_metering(&self, _handle: MeterHandle) -> Result<()> {
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Fast, deterministic pipeline: no smoothing lag, no jitter.
pub fn fast_config() -> AudioConfig {
    AudioConfig {
        bar_count: 8,
        tick_interval_ms: 5,
        read_timeout_ms: 20,
        smoothing_alpha: 1.0,
        jitter: 0.0,
        fade_decay: 0.5,
        fade_interval_ms: 5,
        fade_epsilon: 0.01,
        ..AudioConfig::default()
    }
}

pub fn shared(mic: ScriptedMicrophone) -> Arc<ScriptedMicrophone> {
    Arc::new(mic)
}

/// Waits until the watched value satisfies `predicate`, failing after two
/// seconds.
pub async fn wait_for<T, F>(rx: &mut watch::Receiver<T>, mut predicate: F) -> T
where
    T: Clone,
    F: FnMut(&T) -> bool,
{
    let waited = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            {
                let value = rx.borrow_and_update();
                if predicate(&value) {
                    return value.clone();
                }
            }
            if rx.changed().await.is_err() {
                panic!("watch channel closed");
            }
        }
    })
    .await;

    match waited {
        Ok(value) => value,
        Err(_) => panic!("condition not reached within 2s"),
    }
}
