//! Preference store: three-layer architecture (domain, repository, service).
//!
//! A user's preference list is one JSON document keyed by `user_id`. Writes
//! replace the whole document; searches go through a containment index.

pub mod domain;
pub mod repository;
pub mod repo;
pub mod service;

pub use domain::{PreferenceLookup, PreferenceRecord, SearchOutcome, SkippedRow, StoredDocument};
pub use repository::PreferenceRepository;
pub use service::{DynPreferenceService, PreferenceService};
