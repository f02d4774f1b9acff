use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use uuid::Uuid;

use crate::config::ConfigPaths;

/// One persisted exchange. Only the visible answer text is stored; thinking
/// segments and tool plumbing stay in memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMessage {
    pub role: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub messages: Vec<SessionMessage>,
}

impl Session {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
        }
    }

    pub fn push(&mut self, role: &str, content: &str) {
        self.messages.push(SessionMessage {
            role: role.to_string(),
            content: content.to_string(),
            timestamp: Utc::now(),
        });
        self.updated_at = Utc::now();
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// First user message, shortened, for listings.
    pub fn title(&self) -> String {
        let first = self
            .messages
            .iter()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .unwrap_or("(empty session)");
        let mut title: String = first.chars().take(60).collect();
        if first.chars().count() > 60 {
            title.push('…');
        }
        title
    }
}

/// Reads and writes sessions as pretty-printed JSON files under
/// `~/.parley/sessions/`, one file per session named by its id.
pub struct SessionStore {
    paths: ConfigPaths,
}

impl SessionStore {
    pub fn new(paths: ConfigPaths) -> Self {
        Self { paths }
    }

    pub fn save(&self, session: &Session) -> Result<()> {
        self.paths.ensure_layout()?;
        let file = self.paths.sessions_dir().join(format!("{}.json", session.id));
        let content = serde_json::to_string_pretty(session)?;
        fs::write(&file, content)
            .with_context(|| format!("Failed to write session '{}'", session.id))
    }

    pub fn load(&self, id: &str) -> Result<Session> {
        let file = self.paths.sessions_dir().join(format!("{}.json", id));
        let content = fs::read_to_string(&file)
            .with_context(|| format!("Session '{}' not found", id))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Session '{}' is not valid JSON", id))
    }

    pub fn remove(&self, id: &str) -> Result<()> {
        let file = self.paths.sessions_dir().join(format!("{}.json", id));
        fs::remove_file(&file).with_context(|| format!("Session '{}' not found", id))
    }

    /// All sessions, newest first. Files that fail to parse are skipped.
    pub fn list(&self) -> Result<Vec<Session>> {
        let dir = self.paths.sessions_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut sessions = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.path().extension().map_or(false, |ext| ext == "json") {
                if let Ok(content) = fs::read_to_string(entry.path()) {
                    if let Ok(session) = serde_json::from_str::<Session>(&content) {
                        sessions.push(session);
                    }
                }
            }
        }
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(sessions)
    }
}
