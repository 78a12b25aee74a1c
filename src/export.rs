use anyhow::{bail, Result};
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::Serialize;

use crate::{db::FocusSession, timeline::format_duration};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExportedSession {
    pub id: String,
    pub start_time: String,
    pub end_time: Option<String>,
    pub duration_seconds: u64,
    pub duration_formatted: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionExport {
    pub exported: String,
    pub total_sessions: usize,
    pub sessions: Vec<ExportedSession>,
}

fn iso(timestamp_ms: i64) -> Option<String> {
    Utc.timestamp_millis_opt(timestamp_ms)
        .single()
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Snapshot of the full history in the order it is stored.
pub fn build_export(sessions: &[FocusSession], exported_at: DateTime<Utc>) -> Result<SessionExport> {
    if sessions.is_empty() {
        bail!("no sessions to export yet");
    }

    let sessions = sessions
        .iter()
        .map(|session| ExportedSession {
            id: session.id.clone(),
            start_time: iso(session.start_time).unwrap_or_default(),
            end_time: session.end_time.and_then(iso),
            duration_seconds: session.duration,
            duration_formatted: format_duration(session.duration),
        })
        .collect::<Vec<_>>();

    Ok(SessionExport {
        exported: exported_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        total_sessions: sessions.len(),
        sessions,
    })
}

pub fn export_json(sessions: &[FocusSession], exported_at: DateTime<Utc>) -> Result<String> {
    let export = build_export(sessions, exported_at)?;
    Ok(serde_json::to_string_pretty(&export)?)
}
