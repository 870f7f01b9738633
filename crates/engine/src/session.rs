//! Sessions: one representation store per conversation, behind a lock.
//!
//! Commands, ingests and direct edits take the write lock for their whole
//! duration. Queries share the read lock, so several can run at once but
//! never alongside a write.

use crate::variants::BotVariant;
use chrono::{DateTime, Utc};
use docforge_core::error::{Error, Result};
use docforge_core::representation::{Representation, RepresentationStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

pub struct Session {
    id: String,
    bot: String,
    created_at: DateTime<Utc>,
    store: RwLock<RepresentationStore>,
}

impl Session {
    /// A fresh session holding the variant's initial representations.
    pub fn new(id: impl Into<String>, variant: &BotVariant) -> Self {
        Self {
            id: id.into(),
            bot: variant.name.clone(),
            created_at: Utc::now(),
            store: RwLock::new(RepresentationStore::from_schema(&variant.schema)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn bot(&self) -> &str {
        &self.bot
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn store(&self) -> &RwLock<RepresentationStore> {
        &self.store
    }

    pub async fn snapshot(&self) -> Vec<Representation> {
        self.store.read().await.snapshot()
    }
}

/// In-memory sessions keyed by id.
///
/// When full, creating a session evicts the oldest one.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    max_sessions: usize,
}

impl SessionRegistry {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions: max_sessions.max(1),
        }
    }

    pub async fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(id).cloned()
    }

    /// The session `id`, created for `variant` if it does not exist yet.
    /// An existing session of another bot is an error.
    pub async fn get_or_create(&self, id: &str, variant: &BotVariant) -> Result<Arc<Session>> {
        if let Some(session) = self.get(id).await {
            return check_bot(session, variant);
        }

        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get(id) {
            return check_bot(session.clone(), variant);
        }

        if sessions.len() >= self.max_sessions {
            let oldest = sessions
                .values()
                .min_by_key(|s| s.created_at)
                .map(|s| s.id.clone());
            if let Some(oldest) = oldest {
                debug!(session = %oldest, "Evicting oldest session");
                sessions.remove(&oldest);
            }
        }

        let session = Arc::new(Session::new(id, variant));
        sessions.insert(id.to_string(), session.clone());
        info!(session = %id, bot = %variant.name, "Session created");
        Ok(session)
    }

    pub async fn remove(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.write().await.remove(id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

fn check_bot(session: Arc<Session>, variant: &BotVariant) -> Result<Arc<Session>> {
    if session.bot == variant.name {
        Ok(session)
    } else {
        Err(Error::Unsupported(format!(
            "session '{}' belongs to bot '{}', not '{}'",
            session.id, session.bot, variant.name
        )))
    }
}
