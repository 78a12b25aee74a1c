use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::db::models::FocusSession;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum FocusStatus {
    Idle,
    Focusing,
}

impl Default for FocusStatus {
    fn default() -> Self {
        FocusStatus::Idle
    }
}

/// The one session currently in progress, if any.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusState {
    pub status: FocusStatus,
    pub current: Option<FocusSession>,
    /// Monotonic anchor for the elapsed display; wall-clock start lives in
    /// `current.start_time`.
    #[serde(skip)]
    pub running_anchor: Option<Instant>,
}

impl FocusState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, session: FocusSession, now: Instant) {
        *self = Self {
            status: FocusStatus::Focusing,
            current: Some(session),
            running_anchor: Some(now),
        };
    }

    /// Clears the state and hands back the session that was running.
    pub fn finish(&mut self) -> Option<FocusSession> {
        let current = self.current.take();
        *self = Self::default();
        current
    }

    pub fn elapsed_secs(&self) -> u64 {
        match (self.status, self.running_anchor) {
            (FocusStatus::Focusing, Some(anchor)) => anchor.elapsed().as_secs(),
            _ => 0,
        }
    }
}
