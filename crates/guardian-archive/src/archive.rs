//! Append-only incident log persisted as one JSON array under one key.
//!
//! Every append is a whole-collection read/replace. A value that no longer
//! parses is never overwritten in place: its bytes are copied to a
//! `<key>.corrupt.<id>` key first and the log restarts from empty.

use std::sync::Arc;

use chrono::{DateTime, Local};
use guardian_schema::{Incident, ThreatKind};
use serde::Serialize;
use tracing::{info, warn};

use crate::{ArchiveError, BlobStore};

pub const DEFAULT_ARCHIVE_KEY: &str = "guardian_records";

pub const DATE_KEY_FORMAT: &str = "%Y-%m-%d";
pub const TIME_LABEL_FORMAT: &str = "%H:%M:%S";

pub fn date_key(at: &DateTime<Local>) -> String {
    at.format(DATE_KEY_FORMAT).to_string()
}

pub fn time_label(at: &DateTime<Local>) -> String {
    at.format(TIME_LABEL_FORMAT).to_string()
}

pub fn default_details(kind: ThreatKind) -> String {
    format!("Neural alert triggered by {kind} sensor.")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub count: usize,
}

/// Result of a tolerant read: the records plus the reason they might be
/// missing, if any.
#[derive(Debug)]
pub struct ArchiveRead {
    pub incidents: Vec<Incident>,
    pub warning: Option<ArchiveError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Appended {
    pub incident: Incident,
    /// Key the unparseable previous value was copied to, when one was found.
    pub quarantined: Option<String>,
}

pub struct IncidentArchive {
    store: Arc<dyn BlobStore>,
    key: String,
    last_issued: Option<i64>,
}

impl IncidentArchive {
    pub fn new(store: Arc<dyn BlobStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            last_issued: None,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Strict load: a corrupt value is an error.
    pub async fn load(&self) -> Result<Vec<Incident>, ArchiveError> {
        let raw = self
            .store
            .get(&self.key)
            .await
            .map_err(|e| ArchiveError::unavailable(&self.key, e))?;
        match raw {
            Some(text) => self.parse(&text),
            None => Ok(Vec::new()),
        }
    }

    /// Tolerant load: a corrupt or unreadable store reads as empty and the
    /// cause is handed back alongside.
    pub async fn read(&self) -> ArchiveRead {
        match self.load().await {
            Ok(incidents) => ArchiveRead {
                incidents,
                warning: None,
            },
            Err(err) => {
                warn!(key = %self.key, error = %err, "archive read failed, treating as empty");
                ArchiveRead {
                    incidents: Vec::new(),
                    warning: Some(err),
                }
            }
        }
    }

    /// Insertion-ordered records; empty when the store is absent or corrupt.
    pub async fn all(&self) -> Vec<Incident> {
        self.read().await.incidents
    }

    pub async fn summary(&self, for_date: &str) -> Summary {
        let count = self
            .all()
            .await
            .iter()
            .filter(|incident| incident.date_key == for_date)
            .count();
        Summary { count }
    }

    /// Newest first. Matches `kind + dateKey` case-insensitively; an empty
    /// query returns everything.
    pub async fn search(&self, query: &str) -> Vec<Incident> {
        let needle = query.to_lowercase();
        self.all()
            .await
            .into_iter()
            .rev()
            .filter(|incident| needle.is_empty() || incident.search_text().contains(&needle))
            .collect()
    }

    pub async fn append(
        &mut self,
        kind: ThreatKind,
        at: &DateTime<Local>,
        details: impl Into<String>,
    ) -> Result<Appended, ArchiveError> {
        let id = at.timestamp_millis();
        if self.last_issued.is_some_and(|last| id <= last) {
            return Err(ArchiveError::IdCollision { id });
        }

        let raw = self
            .store
            .get(&self.key)
            .await
            .map_err(|e| ArchiveError::unavailable(&self.key, e))?;

        let mut quarantined = None;
        let mut incidents = match raw {
            None => Vec::new(),
            Some(text) => match self.parse(&text) {
                Ok(incidents) => incidents,
                Err(err) => {
                    let backup_key = format!("{}.corrupt.{id}", self.key);
                    self.store
                        .put(&backup_key, &text)
                        .await
                        .map_err(|e| ArchiveError::unavailable(&backup_key, e))?;
                    warn!(
                        key = %self.key,
                        backup = %backup_key,
                        error = %err,
                        "corrupt archive moved aside, starting a new log"
                    );
                    quarantined = Some(backup_key);
                    Vec::new()
                }
            },
        };

        if incidents.iter().any(|existing| existing.id == id) {
            return Err(ArchiveError::IdCollision { id });
        }

        let mut details: String = details.into();
        if details.is_empty() {
            details = default_details(kind);
        }
        let incident = Incident {
            id,
            kind,
            date_key: date_key(at),
            time_label: time_label(at),
            details,
        };
        incidents.push(incident.clone());

        let json = serde_json::to_string(&incidents)?;
        if let Err(e) = self.store.put(&self.key, &json).await {
            if let Some(backup) = &quarantined {
                warn!(
                    key = %self.key,
                    backup = %backup,
                    "corrupt archive was moved aside but the new log was not written"
                );
            }
            return Err(ArchiveError::StoreUnavailable {
                key: self.key.clone(),
                quarantined,
                source: e.into(),
            });
        }

        self.last_issued = Some(id);
        info!(id, kind = %kind, total = incidents.len(), "incident archived");
        Ok(Appended {
            incident,
            quarantined,
        })
    }

    fn parse(&self, text: &str) -> Result<Vec<Incident>, ArchiveError> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let mut incidents: Vec<Incident> =
            serde_json::from_str(text).map_err(|e| ArchiveError::StoreCorrupt {
                key: self.key.clone(),
                reason: e.to_string(),
            })?;
        // Older records may carry no details at all.
        for incident in incidents.iter_mut().filter(|i| i.details.is_empty()) {
            incident.details = default_details(incident.kind);
        }
        Ok(incidents)
    }
}
