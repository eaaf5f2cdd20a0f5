use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Row as the store holds it: the document is still undecoded.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: i32,
    pub user_id: i32,
    pub document: serde_json::Value,
    pub created_at: DateTime<FixedOffset>,
}

impl From<models::user_preferences::Model> for StoredDocument {
    fn from(m: models::user_preferences::Model) -> Self {
        Self { id: m.id, user_id: m.user_id, document: m.preferences, created_at: m.created_at }
    }
}

/// Domain record (business view)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreferenceRecord {
    pub id: i32,
    pub user_id: i32,
    pub preferences: Vec<String>,
    /// Refreshed on every upsert, so this is effectively "last modified".
    pub created_at: DateTime<FixedOffset>,
}

/// Result of a point lookup; a missing user is not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum PreferenceLookup {
    Found(PreferenceRecord),
    Empty { user_id: i32 },
}

impl PreferenceLookup {
    pub fn user_id(&self) -> i32 {
        match self {
            PreferenceLookup::Found(r) => r.user_id,
            PreferenceLookup::Empty { user_id } => *user_id,
        }
    }

    pub fn preferences(&self) -> &[String] {
        match self {
            PreferenceLookup::Found(r) => &r.preferences,
            PreferenceLookup::Empty { .. } => &[],
        }
    }

    pub fn record(&self) -> Option<&PreferenceRecord> {
        match self {
            PreferenceLookup::Found(r) => Some(r),
            PreferenceLookup::Empty { .. } => None,
        }
    }
}

/// A search hit that was dropped because its document did not decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedRow {
    pub id: i32,
    pub user_id: i32,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchOutcome {
    pub records: Vec<PreferenceRecord>,
    pub skipped: Vec<SkippedRow>,
}

impl SearchOutcome {
    pub fn is_partial(&self) -> bool {
        !self.skipped.is_empty()
    }
}
