use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::db::models::FocusSession;

/// Version tag written alongside the session collection.
pub const SESSIONS_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct SessionsEnvelope {
    version: u32,
    sessions: Vec<FocusSession>,
}

#[derive(Serialize)]
struct SessionsEnvelopeRef<'a> {
    version: u32,
    sessions: &'a [FocusSession],
}

pub fn encode_sessions(sessions: &[FocusSession]) -> Result<String> {
    serde_json::to_string(&SessionsEnvelopeRef {
        version: SESSIONS_SCHEMA_VERSION,
        sessions,
    })
    .context("failed to serialize sessions")
}

/// Decodes a stored collection.
///
/// A bare JSON array is the unversioned layout written before the envelope
/// existed and is read as version 0. Versions newer than
/// [`SESSIONS_SCHEMA_VERSION`] are rejected rather than guessed at.
pub fn decode_sessions(raw: &str) -> Result<Vec<FocusSession>> {
    let value: Value = serde_json::from_str(raw).context("stored sessions are not valid JSON")?;

    match value {
        Value::Array(_) => {
            serde_json::from_value(value).context("failed to parse unversioned sessions")
        }
        Value::Object(ref map) => {
            let version = map
                .get("version")
                .and_then(Value::as_u64)
                .ok_or_else(|| anyhow!("stored sessions have no version tag"))?;

            if version > u64::from(SESSIONS_SCHEMA_VERSION) {
                bail!(
                    "stored sessions version ({}) is newer than supported ({})",
                    version,
                    SESSIONS_SCHEMA_VERSION
                );
            }

            let envelope: SessionsEnvelope = serde_json::from_value(value)
                .with_context(|| format!("failed to parse sessions version {version}"))?;
            Ok(envelope.sessions)
        }
        _ => bail!("stored sessions have an unexpected shape"),
    }
}
