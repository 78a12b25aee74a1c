use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Instant,
};

use anyhow::{bail, Result};
use chrono::{DateTime, Local, TimeZone, Utc};
use log::{error, info, warn};
use tokio::sync::{watch, Mutex};

use crate::{
    audio::AudioSampler,
    db::{FocusSession, SessionRepository},
    timeline::{build_timeline, TimelineItem},
};

use super::FocusState;

static CONTROLLER_CLAIMED: AtomicBool = AtomicBool::new(false);

/// Process-wide marker that a controller exists; released on drop.
struct ControllerClaim;

impl ControllerClaim {
    fn acquire() -> Result<Self> {
        if CONTROLLER_CLAIMED
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            bail!("a focus controller already exists in this process");
        }
        Ok(Self)
    }
}

impl Drop for ControllerClaim {
    fn drop(&mut self) {
        CONTROLLER_CLAIMED.store(false, Ordering::SeqCst);
    }
}

/// Owns the current focus session and drives the repository and the audio
/// sampler from enter/exit.
///
/// Only one controller may exist per process so that at most one session
/// is ever active. Clones share the same state.
#[derive(Clone)]
pub struct FocusController {
    state: Arc<Mutex<FocusState>>,
    /// Held for the whole of enter/exit/recover so the sampler always
    /// follows the current session.
    lifecycle: Arc<Mutex<()>>,
    repository: SessionRepository,
    sampler: Arc<Mutex<AudioSampler>>,
    sessions_tx: Arc<watch::Sender<Vec<FocusSession>>>,
    levels: watch::Receiver<Vec<f32>>,
    _claim: Arc<ControllerClaim>,
}

impl FocusController {
    pub fn new(repository: SessionRepository, sampler: AudioSampler) -> Result<Self> {
        let claim = ControllerClaim::acquire()?;
        let (sessions_tx, _) = watch::channel(Vec::new());

        Ok(Self {
            state: Arc::new(Mutex::new(FocusState::new())),
            lifecycle: Arc::new(Mutex::new(())),
            repository,
            levels: sampler.levels(),
            sampler: Arc::new(Mutex::new(sampler)),
            sessions_tx: Arc::new(sessions_tx),
            _claim: Arc::new(claim),
        })
    }

    pub fn repository(&self) -> &SessionRepository {
        &self.repository
    }

    /// Reloads the session set from the store.
    pub async fn refresh(&self) -> Vec<FocusSession> {
        let sessions = self.repository.get_all().await;
        self.publish(sessions.clone());
        sessions
    }

    /// Last known session set.
    pub fn sessions(&self) -> Vec<FocusSession> {
        self.sessions_tx.borrow().clone()
    }

    pub fn timeline(&self) -> Vec<TimelineItem> {
        self.timeline_at(&Local::now())
    }

    pub fn timeline_at<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Vec<TimelineItem> {
        build_timeline(&self.sessions_tx.borrow(), now)
    }

    pub fn levels(&self) -> watch::Receiver<Vec<f32>> {
        self.levels.clone()
    }

    pub async fn permission_granted(&self) -> Option<bool> {
        self.sampler.lock().await.permission_granted()
    }

    pub async fn current(&self) -> Option<FocusSession> {
        self.state.lock().await.current.clone()
    }

    pub async fn elapsed_secs(&self) -> u64 {
        self.state.lock().await.elapsed_secs()
    }

    /// Starts a session and begins sampling. While a session is already
    /// running this returns it unchanged.
    pub async fn enter(&self) -> Result<FocusSession> {
        let _lifecycle = self.lifecycle.lock().await;
        let session = {
            let mut state = self.state.lock().await;
            if let Some(current) = state.current.as_ref() {
                return Ok(current.clone());
            }

            let session = FocusSession::begin(
                self.repository.generate_id(),
                Utc::now().timestamp_millis(),
            );
            state.begin(session.clone(), Instant::now());
            session
        };

        let sessions = self.repository.add(session.clone()).await;
        self.publish(sessions);

        // The session runs with or without levels.
        if let Err(err) = self.sampler.lock().await.start().await {
            error!("Failed to start audio sampling: {err:#}");
        }

        info!("Entered focus session {}", session.id);
        Ok(session)
    }

    /// Ends the running session, persists it and fades the levels out.
    /// Returns `None` when nothing was running.
    pub async fn exit(&self) -> Result<Option<FocusSession>> {
        let _lifecycle = self.lifecycle.lock().await;
        let ended_at = Utc::now().timestamp_millis();

        let Some(mut session) = self.state.lock().await.finish() else {
            return Ok(None);
        };

        if let Err(err) = self.sampler.lock().await.stop().await {
            warn!("Failed to stop audio sampling: {err:#}");
        }

        let patch = session.completion(ended_at);
        patch.apply(&mut session);

        let sessions = self.repository.update(&session.id, patch).await;
        self.publish(sessions);

        info!(
            "Exited focus session {} after {}s",
            session.id, session.duration
        );
        Ok(Some(session))
    }

    pub async fn delete(&self, id: &str) -> Vec<FocusSession> {
        let sessions = self.repository.delete(id).await;
        self.publish(sessions.clone());
        sessions
    }

    /// Closes sessions left active by an unclean shutdown. They are ended at
    /// their own start time since their real end is unknown.
    pub async fn recover_abandoned(&self) -> usize {
        let _lifecycle = self.lifecycle.lock().await;
        let current_id = self.current().await.map(|session| session.id);
        let stale: Vec<FocusSession> = self
            .repository
            .get_all()
            .await
            .into_iter()
            .filter(|session| session.is_active && Some(&session.id) != current_id.as_ref())
            .collect();

        for session in &stale {
            warn!(
                "Recovered abandoned session {}; closing with zero duration",
                session.id
            );
            self.repository
                .update(&session.id, session.completion(session.start_time))
                .await;
        }

        self.refresh().await;
        stale.len()
    }

    /// Waits for the post-exit fade to settle.
    pub async fn wait_for_fade(&self) {
        self.sampler.lock().await.wait_for_fade().await;
    }

    fn publish(&self, sessions: Vec<FocusSession>) {
        self.sessions_tx.send_replace(sessions);
    }
}
