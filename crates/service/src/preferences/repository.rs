use async_trait::async_trait;

use super::domain::StoredDocument;
use crate::context::OpContext;
use crate::errors::ServiceError;

/// Document-store abstraction behind the preference service.
///
/// Implementations must make `upsert` atomic per `user_id`: concurrent calls
/// for the same user end with exactly one row holding one of the submitted
/// documents, and the row's `id` never changes once assigned.
///
/// `upsert` honours `ctx` only up to the point of commit: a `Cancelled`
/// result means nothing was written, and once the write is committed its
/// real outcome is returned even if the deadline has passed meanwhile.
#[async_trait]
pub trait PreferenceRepository: Send + Sync {
    async fn upsert(
        &self,
        user_id: i32,
        document: serde_json::Value,
        ctx: &OpContext,
    ) -> Result<StoredDocument, ServiceError>;
    async fn find(&self, user_id: i32) -> Result<Option<StoredDocument>, ServiceError>;
    /// Rows whose document holds `term` as an element, `id` ascending.
    async fn search(&self, term: &str) -> Result<Vec<StoredDocument>, ServiceError>;
    async fn count(&self, user_id: i32) -> Result<u64, ServiceError>;
}

/// In-memory store with an explicit inverted index, for tests and `store = "memory"`.
pub mod memory {
    use super::*;
    use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, Utc};
    use std::collections::{BTreeMap, BTreeSet, HashMap};
    use std::sync::{Mutex, MutexGuard};
    use std::time::Duration;

    #[derive(Default)]
    struct Inner {
        next_id: i32,
        rows: BTreeMap<i32, StoredDocument>,     // key: user_id
        index: HashMap<String, BTreeSet<i32>>, // term -> user_ids
    }

    impl Inner {
        fn unindex(&mut self, user_id: i32, doc: &serde_json::Value) {
            for term in string_elements(doc) {
                if let Some(users) = self.index.get_mut(term) {
                    users.remove(&user_id);
                    if users.is_empty() {
                        self.index.remove(term);
                    }
                }
            }
        }

        fn reindex(&mut self, user_id: i32, doc: &serde_json::Value) {
            for term in string_elements(doc) {
                self.index.entry(term.to_string()).or_default().insert(user_id);
            }
        }

        fn write(&mut self, user_id: i32, document: serde_json::Value, created_at: DateTime<FixedOffset>) -> StoredDocument {
            let id = match self.rows.get(&user_id) {
                Some(existing) => existing.id,
                None => {
                    self.next_id += 1;
                    self.next_id
                }
            };
            if let Some(old) = self.rows.get(&user_id).map(|r| r.document.clone()) {
                self.unindex(user_id, &old);
            }
            self.reindex(user_id, &document);
            let row = StoredDocument { id, user_id, document, created_at };
            self.rows.insert(user_id, row.clone());
            row
        }
    }

    /// Elements of a JSON array that are strings; anything else indexes nothing.
    fn string_elements(doc: &serde_json::Value) -> impl Iterator<Item = &str> {
        doc.as_array()
            .into_iter()
            .flatten()
            .filter_map(|v| v.as_str())
    }

    #[derive(Default)]
    pub struct MemoryPreferenceRepository {
        inner: Mutex<Inner>,
        latency: Option<Duration>,
    }

    impl MemoryPreferenceRepository {
        pub fn new() -> Self {
            Self::default()
        }

        /// Delay every operation before it touches the maps.
        pub fn with_latency(latency: Duration) -> Self {
            Self { latency: Some(latency), ..Self::default() }
        }

        /// Store a document as-is, bypassing the codec. Lets callers plant corrupt rows.
        pub fn insert_raw(&self, user_id: i32, document: serde_json::Value) -> StoredDocument {
            let mut inner = self.lock();
            inner.write(user_id, document, Utc::now().into())
        }

        pub fn len(&self) -> usize {
            self.lock().rows.len()
        }

        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }

        fn lock(&self) -> MutexGuard<'_, Inner> {
            self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
        }

        async fn pause(&self) {
            if let Some(d) = self.latency {
                tokio::time::sleep(d).await;
            }
        }
    }

    #[async_trait]
    impl PreferenceRepository for MemoryPreferenceRepository {
        async fn upsert(
            &self,
            user_id: i32,
            document: serde_json::Value,
            ctx: &OpContext,
        ) -> Result<StoredDocument, ServiceError> {
            ctx.run(async {
                self.pause().await;
                Ok(())
            })
            .await?;
            let mut inner = self.lock();
            let mut now: DateTime<FixedOffset> = Utc::now().into();
            // keep the timestamp strictly moving forward for a given user
            if let Some(prev) = inner.rows.get(&user_id).map(|r| r.created_at) {
                if now <= prev {
                    now = prev + ChronoDuration::microseconds(1);
                }
            }
            Ok(inner.write(user_id, document, now))
        }

        async fn find(&self, user_id: i32) -> Result<Option<StoredDocument>, ServiceError> {
            self.pause().await;
            Ok(self.lock().rows.get(&user_id).cloned())
        }

        async fn search(&self, term: &str) -> Result<Vec<StoredDocument>, ServiceError> {
            self.pause().await;
            let inner = self.lock();
            let mut hits: Vec<StoredDocument> = inner
                .index
                .get(term)
                .into_iter()
                .flatten()
                .filter_map(|uid| inner.rows.get(uid).cloned())
                .collect();
            hits.sort_by_key(|r| r.id);
            Ok(hits)
        }

        async fn count(&self, user_id: i32) -> Result<u64, ServiceError> {
            Ok(u64::from(self.lock().rows.contains_key(&user_id)))
        }
    }

}
