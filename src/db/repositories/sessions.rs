use anyhow::{Context, Error, Result};
use log::error;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::db::{
    helpers::{decode_sessions, encode_sessions},
    kv::KvStore,
    models::{FocusSession, SessionPatch},
    Database,
};

/// Well-known key the session collection lives under.
pub const SESSIONS_KEY: &str = "@void_sessions";

const FAILURE_CHANNEL_CAPACITY: usize = 32;

/// A persistence failure that was swallowed by the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreFailure {
    pub operation: &'static str,
    pub message: String,
}

enum Mutation {
    Applied(Vec<FocusSession>),
    WriteFailed {
        previous: Vec<FocusSession>,
        error: Error,
    },
}

fn load_sessions(store: &KvStore<'_>) -> Result<Vec<FocusSession>> {
    match store.get(SESSIONS_KEY)? {
        Some(raw) => decode_sessions(&raw),
        None => Ok(Vec::new()),
    }
}

/// CRUD over the whole session collection.
///
/// Failures never reach the caller: they are logged, broadcast to
/// [`subscribe_failures`](Self::subscribe_failures) listeners, and the call
/// degrades to "no change". Reads that fail return an empty list; mutations
/// whose read fails (including an unsupported stored version) never write.
#[derive(Clone)]
pub struct SessionRepository {
    db: Database,
    failures: broadcast::Sender<StoreFailure>,
}

impl SessionRepository {
    pub fn new(db: Database) -> Self {
        let (failures, _) = broadcast::channel(FAILURE_CHANNEL_CAPACITY);
        Self { db, failures }
    }

    pub fn subscribe_failures(&self) -> broadcast::Receiver<StoreFailure> {
        self.failures.subscribe()
    }

    pub fn generate_id(&self) -> String {
        Uuid::new_v4().to_string()
    }

    pub async fn get_all(&self) -> Vec<FocusSession> {
        match self
            .db
            .execute(|conn| load_sessions(&KvStore::new(conn)))
            .await
        {
            Ok(sessions) => sessions,
            Err(err) => {
                self.report("get_all", &err);
                Vec::new()
            }
        }
    }

    /// Prepends `session` and returns the new collection.
    pub async fn add(&self, session: FocusSession) -> Vec<FocusSession> {
        self.mutate("add", move |sessions| sessions.insert(0, session))
            .await
    }

    /// Merges `patch` into the session with `id`. Unknown ids leave the
    /// collection unchanged.
    pub async fn update(&self, id: &str, patch: SessionPatch) -> Vec<FocusSession> {
        let id = id.to_string();
        self.mutate("update", move |sessions| {
            if let Some(session) = sessions.iter_mut().find(|s| s.id == id) {
                patch.apply(session);
            }
        })
        .await
    }

    pub async fn delete(&self, id: &str) -> Vec<FocusSession> {
        let id = id.to_string();
        self.mutate("delete", move |sessions| sessions.retain(|s| s.id != id))
            .await
    }

    /// Read, mutate and write back as one task on the database thread, so
    /// concurrent mutations are applied one after another.
    async fn mutate<F>(&self, operation: &'static str, change: F) -> Vec<FocusSession>
    where
        F: FnOnce(&mut Vec<FocusSession>) + Send + 'static,
    {
        let outcome = self
            .db
            .execute(move |conn| {
                let store = KvStore::new(conn);
                let previous = load_sessions(&store).context("failed to read sessions")?;

                let mut updated = previous.clone();
                change(&mut updated);

                let written =
                    encode_sessions(&updated).and_then(|raw| store.put(SESSIONS_KEY, &raw));
                Ok(match written {
                    Ok(()) => Mutation::Applied(updated),
                    Err(error) => Mutation::WriteFailed { previous, error },
                })
            })
            .await;

        match outcome {
            Ok(Mutation::Applied(sessions)) => sessions,
            Ok(Mutation::WriteFailed { previous, error }) => {
                self.report(operation, &error);
                previous
            }
            Err(err) => {
                self.report(operation, &err);
                Vec::new()
            }
        }
    }

    fn report(&self, operation: &'static str, err: &Error) {
        error!("session store {operation} failed: {err:#}");
        // No listeners is fine.
        let _ = self.failures.send(StoreFailure {
            operation,
            message: format!("{err:#}"),
        });
    }
}
