use serde::{Deserialize, Serialize};

/// One focus session as persisted.
///
/// Timestamps are milliseconds since the Unix epoch. `end_time` is only set
/// once the session has been explicitly ended; `duration` is in seconds and
/// stays 0 while the session is active.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FocusSession {
    pub id: String,
    pub start_time: i64,
    pub end_time: Option<i64>,
    pub duration: u64,
    pub is_active: bool,
}

impl FocusSession {
    pub fn begin(id: String, start_time: i64) -> Self {
        Self {
            id,
            start_time,
            end_time: None,
            duration: 0,
            is_active: true,
        }
    }

    pub fn is_completed(&self) -> bool {
        !self.is_active && self.end_time.is_some()
    }

    /// Field values that close this session at `end_time`.
    pub fn completion(&self, end_time: i64) -> SessionPatch {
        let elapsed_ms = end_time.saturating_sub(self.start_time).max(0);
        SessionPatch {
            end_time: Some(end_time),
            duration: Some((elapsed_ms / 1000) as u64),
            is_active: Some(false),
        }
    }
}

/// Partial update merged over an existing session; `None` leaves a field
/// untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionPatch {
    pub end_time: Option<i64>,
    pub duration: Option<u64>,
    pub is_active: Option<bool>,
}

impl SessionPatch {
    pub fn apply(&self, session: &mut FocusSession) {
        if let Some(end_time) = self.end_time {
            session.end_time = Some(end_time);
        }
        if let Some(duration) = self.duration {
            session.duration = duration;
        }
        if let Some(is_active) = self.is_active {
            session.is_active = is_active;
        }
    }
}
