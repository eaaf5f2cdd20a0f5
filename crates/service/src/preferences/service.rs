use std::sync::Arc;

use models::user_preferences::{decode_preferences, encode_preferences, validate_user_id};
use tracing::{debug, info, instrument, warn};

use super::domain::{PreferenceLookup, PreferenceRecord, SearchOutcome, SkippedRow, StoredDocument};
use super::repository::PreferenceRepository;
use crate::context::OpContext;
use crate::errors::ServiceError;
use crate::metrics;

/// Preference service over a type-erased store, as held by the HTTP layer.
pub type DynPreferenceService = PreferenceService<dyn PreferenceRepository>;

/// Create-or-replace preference lists per user, with point lookup and
/// membership search. Holds no state besides the injected store handle.
pub struct PreferenceService<R: PreferenceRepository + ?Sized> {
    repo: Arc<R>,
}

impl<R: PreferenceRepository + ?Sized> PreferenceService<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    /// Replace the stored list for `user_id`, creating the record if needed.
    ///
    /// # Examples
    /// ```
    /// use service::context::OpContext;
    /// use service::preferences::{repository::memory::MemoryPreferenceRepository, PreferenceService};
    /// use std::sync::Arc;
    /// let svc = PreferenceService::new(Arc::new(MemoryPreferenceRepository::new()));
    /// let ctx = OpContext::new();
    /// let first = tokio_test::block_on(svc.upsert(42, vec!["a".into(), "b".into()], &ctx)).unwrap();
    /// let second = tokio_test::block_on(svc.upsert(42, vec!["c".into()], &ctx)).unwrap();
    /// assert_eq!(first.id, second.id);
    /// assert_eq!(second.preferences, vec!["c".to_string()]);
    /// ```
    #[instrument(skip(self, preferences, ctx), fields(count = preferences.len()))]
    pub async fn upsert(
        &self,
        user_id: i64,
        preferences: Vec<String>,
        ctx: &OpContext,
    ) -> Result<PreferenceRecord, ServiceError> {
        let result = async {
            let user_id = validate_user_id(user_id)?;
            let document = encode_preferences(&preferences)?;
            let stored = self.repo.upsert(user_id, document, ctx).await?;
            Ok::<_, ServiceError>(PreferenceRecord { id: stored.id, user_id, preferences, created_at: stored.created_at })
        }
        .await;

        match &result {
            Ok(r) => {
                metrics::UPSERTS_TOTAL.inc();
                info!(id = r.id, user_id = r.user_id, created_at = %r.created_at, "preferences_upserted");
            }
            Err(e) => {
                metrics::record_error("upsert", e);
                warn!(error = %e, code = e.code(), "preferences_upsert_failed");
            }
        }
        result
    }

    /// Point lookup. A user with no record yields `PreferenceLookup::Empty`.
    #[instrument(skip(self, ctx))]
    pub async fn get(&self, user_id: i64, ctx: &OpContext) -> Result<PreferenceLookup, ServiceError> {
        let result = async {
            let user_id = validate_user_id(user_id)?;
            match ctx.run(self.repo.find(user_id)).await? {
                Some(row) => Ok::<_, ServiceError>(PreferenceLookup::Found(decode_row(row)?)),
                None => {
                    debug!(user_id, "no preferences stored");
                    Ok(PreferenceLookup::Empty { user_id })
                }
            }
        }
        .await;

        if let Err(e) = &result {
            metrics::record_error("get", e);
            warn!(error = %e, code = e.code(), "preferences_get_failed");
        }
        result
    }

    /// Every record holding `term` as an exact element, `id` ascending.
    ///
    /// Rows whose document fails to decode are left out of `records` and
    /// reported in `skipped`; the search itself still succeeds.
    #[instrument(skip(self, ctx))]
    pub async fn search_by_preference(&self, term: &str, ctx: &OpContext) -> Result<SearchOutcome, ServiceError> {
        if term.is_empty() {
            let e = ServiceError::Validation("Preference parameter is required".into());
            metrics::record_error("search", &e);
            return Err(e);
        }

        let rows = match ctx.run(self.repo.search(term)).await {
            Ok(rows) => rows,
            Err(e) => {
                metrics::record_error("search", &e);
                warn!(error = %e, code = e.code(), "preferences_search_failed");
                return Err(e);
            }
        };
        metrics::SEARCHES_TOTAL.inc();

        let mut outcome = SearchOutcome::default();
        for row in rows {
            let (id, user_id) = (row.id, row.user_id);
            match decode_row(row) {
                Ok(record) => outcome.records.push(record),
                Err(e) => {
                    metrics::SEARCH_ROWS_SKIPPED_TOTAL.inc();
                    warn!(event = "search_row_skipped", id, user_id, error = %e, "skipping undecodable preferences row");
                    outcome.skipped.push(SkippedRow { id, user_id, reason: e.to_string() });
                }
            }
        }
        debug!(hits = outcome.records.len(), skipped = outcome.skipped.len(), "search complete");
        Ok(outcome)
    }

    /// Number of rows stored for `user_id`; always 0 or 1.
    pub async fn record_count(&self, user_id: i64, ctx: &OpContext) -> Result<u64, ServiceError> {
        let user_id = validate_user_id(user_id)?;
        ctx.run(self.repo.count(user_id)).await
    }
}

fn decode_row(row: StoredDocument) -> Result<PreferenceRecord, ServiceError> {
    let preferences = decode_preferences(&row.document)?;
    Ok(PreferenceRecord { id: row.id, user_id: row.user_id, preferences, created_at: row.created_at })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preferences::repository::memory::MemoryPreferenceRepository;
    use serde_json::json;
    use std::collections::HashSet;
    use std::time::Duration;

    fn prefs(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn service() -> (Arc<MemoryPreferenceRepository>, PreferenceService<MemoryPreferenceRepository>) {
        let repo = Arc::new(MemoryPreferenceRepository::new());
        (repo.clone(), PreferenceService::new(repo))
    }

    #[tokio::test]
    async fn walkthrough_upsert_get_search() {
        let (_, svc) = service();
        let ctx = OpContext::new();

        let first = svc.upsert(42, prefs(&["a", "b"]), &ctx).await.unwrap();
        assert_eq!(first.id, 1);
        assert_eq!(first.user_id, 42);

        let second = svc.upsert(42, prefs(&["c"]), &ctx).await.unwrap();
        assert_eq!(second.id, 1);
        assert!(second.created_at > first.created_at);

        let got = svc.get(42, &ctx).await.unwrap();
        assert_eq!(got.record(), Some(&second));

        let hits = svc.search_by_preference("c", &ctx).await.unwrap();
        assert_eq!(hits.records, vec![second]);
        assert!(svc.search_by_preference("a", &ctx).await.unwrap().records.is_empty());
    }

    #[tokio::test]
    async fn round_trip_preserves_order_and_empty_lists() {
        let (_, svc) = service();
        let ctx = OpContext::new();
        for (uid, list) in [(1, prefs(&[])), (2, prefs(&["z", "a", "z"])), (3, prefs(&["only"]))] {
            svc.upsert(uid, list.clone(), &ctx).await.unwrap();
            assert_eq!(svc.get(uid, &ctx).await.unwrap().preferences(), list.as_slice());
        }
    }

    #[tokio::test]
    async fn empty_list_is_a_record_not_absence() {
        let (_, svc) = service();
        let ctx = OpContext::new();
        svc.upsert(8, vec![], &ctx).await.unwrap();
        assert!(matches!(svc.get(8, &ctx).await.unwrap(), PreferenceLookup::Found(_)));
    }

    #[tokio::test]
    async fn missing_user_yields_empty_lookup() {
        let (_, svc) = service();
        let got = svc.get(7, &OpContext::new()).await.unwrap();
        assert_eq!(got, PreferenceLookup::Empty { user_id: 7 });
        assert!(got.preferences().is_empty());
    }

    #[tokio::test]
    async fn repeated_upserts_keep_one_record() {
        let (repo, svc) = service();
        let ctx = OpContext::new();
        for i in 0..10 {
            svc.upsert(5, vec![format!("p{i}")], &ctx).await.unwrap();
        }
        assert_eq!(svc.record_count(5, &ctx).await.unwrap(), 1);
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn containment_is_exact_membership() {
        let (_, svc) = service();
        let ctx = OpContext::new();
        svc.upsert(1, prefs(&["dark-mode", "email"]), &ctx).await.unwrap();
        svc.upsert(2, prefs(&["email"]), &ctx).await.unwrap();
        svc.upsert(3, prefs(&["dark"]), &ctx).await.unwrap();

        let users = |o: SearchOutcome| o.records.into_iter().map(|r| r.user_id).collect::<Vec<_>>();
        assert_eq!(users(svc.search_by_preference("email", &ctx).await.unwrap()), vec![1, 2]);
        assert_eq!(users(svc.search_by_preference("dark", &ctx).await.unwrap()), vec![3]);
        assert!(users(svc.search_by_preference("mode", &ctx).await.unwrap()).is_empty());
    }

    #[tokio::test]
    async fn corrupt_rows_are_skipped_and_reported() {
        let (repo, svc) = service();
        let ctx = OpContext::new();
        svc.upsert(1, prefs(&["x"]), &ctx).await.unwrap();
        let bad = repo.insert_raw(2, json!(["x", 5]));
        svc.upsert(3, prefs(&["x", "y"]), &ctx).await.unwrap();

        let outcome = svc.search_by_preference("x", &ctx).await.unwrap();
        assert_eq!(outcome.records.iter().map(|r| r.user_id).collect::<Vec<_>>(), vec![1, 3]);
        assert!(outcome.is_partial());
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].id, bad.id);
        assert_eq!(outcome.skipped[0].user_id, 2);
    }

    #[tokio::test]
    async fn corrupt_row_surfaces_on_point_lookup() {
        let (repo, svc) = service();
        repo.insert_raw(9, json!({"not": "a list"}));
        let err = svc.get(9, &OpContext::new()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Deserialization(_)));
    }

    #[tokio::test]
    async fn invalid_input_is_rejected_before_the_store() {
        let (repo, svc) = service();
        let ctx = OpContext::new();
        assert!(matches!(svc.upsert(-1, vec![], &ctx).await, Err(ServiceError::Validation(_))));
        assert!(matches!(svc.upsert(i64::from(i32::MAX) + 1, vec![], &ctx).await, Err(ServiceError::Validation(_))));
        assert!(matches!(svc.get(-3, &ctx).await, Err(ServiceError::Validation(_))));
        assert!(matches!(svc.search_by_preference("", &ctx).await, Err(ServiceError::Validation(_))));
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn concurrent_upserts_leave_one_submitted_state() {
        let (repo, svc) = service();
        let svc = Arc::new(svc);
        let submitted: Vec<Vec<String>> = (0..16).map(|i| vec![format!("v{i}"), "shared".into()]).collect();

        let mut handles = vec![];
        for list in submitted.clone() {
            let svc = svc.clone();
            handles.push(tokio::spawn(async move { svc.upsert(77, list, &OpContext::new()).await }));
        }
        let mut ids = HashSet::new();
        for h in handles {
            ids.insert(h.await.unwrap().unwrap().id);
        }

        assert_eq!(ids.len(), 1);
        assert_eq!(repo.len(), 1);
        let last = svc.get(77, &OpContext::new()).await.unwrap();
        assert!(submitted.iter().any(|s| s.as_slice() == last.preferences()));
        // index agrees with the surviving document
        let shared = svc.search_by_preference("shared", &OpContext::new()).await.unwrap();
        assert_eq!(shared.records.len(), 1);
    }

    #[tokio::test]
    async fn cancelled_upsert_writes_nothing() {
        let repo = Arc::new(MemoryPreferenceRepository::with_latency(Duration::from_millis(200)));
        let svc = PreferenceService::new(repo.clone());

        let ctx = OpContext::with_timeout(Duration::from_millis(10));
        let err = svc.upsert(1, prefs(&["a"]), &ctx).await.unwrap_err();
        assert!(matches!(err, ServiceError::Cancelled(_)));
        assert!(!err.is_retryable());
        assert!(repo.is_empty());

        let ctx = OpContext::new();
        ctx.token().cancel();
        assert!(matches!(svc.search_by_preference("a", &ctx).await, Err(ServiceError::Cancelled(_))));
    }

    #[tokio::test]
    async fn skipped_rows_increment_counter() {
        let (repo, svc) = service();
        repo.insert_raw(1, json!(["needle", null]));
        let before = metrics::SEARCH_ROWS_SKIPPED_TOTAL.get();
        svc.search_by_preference("needle", &OpContext::new()).await.unwrap();
        assert!(metrics::SEARCH_ROWS_SKIPPED_TOTAL.get() > before);
    }
}

#[cfg(test)]
mod db_tests {
    use super::*;
    use crate::preferences::repo::seaorm::SeaOrmPreferenceRepository;
    use crate::test_support::{fresh_id, get_db};

    #[tokio::test]
    async fn postgres_upsert_identity_and_search() -> Result<(), anyhow::Error> {
        let Some(db) = get_db().await? else { return Ok(()) };
        let svc = PreferenceService::new(Arc::new(SeaOrmPreferenceRepository::new(db.clone())));
        let ctx = OpContext::new();
        let uid = i64::from(fresh_id());
        let term = format!("svc-term-{uid}");

        let first = svc.upsert(uid, vec![term.clone(), "b".into()], &ctx).await?;
        let second = svc.upsert(uid, vec!["c".into()], &ctx).await?;
        assert_eq!(first.id, second.id);
        assert!(second.created_at >= first.created_at);
        assert_eq!(svc.record_count(uid, &ctx).await?, 1);

        let got = svc.get(uid, &ctx).await?;
        assert_eq!(got.preferences(), ["c".to_string()].as_slice());

        // the old term no longer matches this user
        let stale = svc.search_by_preference(&term, &ctx).await?;
        assert!(stale.records.iter().all(|r| i64::from(r.user_id) != uid));

        use sea_orm::EntityTrait;
        models::user_preferences::Entity::delete_by_id(first.id).exec(&db).await?;
        Ok(())
    }

    #[tokio::test]
    async fn postgres_cancelled_upsert_is_never_stored() -> Result<(), anyhow::Error> {
        let Some(db) = get_db().await? else { return Ok(()) };
        let svc = PreferenceService::new(Arc::new(SeaOrmPreferenceRepository::new(db.clone())));
        let check = OpContext::new();

        // deadlines spread across begin, statement and commit round-trips
        for i in 0..200u64 {
            let uid = i64::from(fresh_id());
            let ctx = OpContext::with_timeout(std::time::Duration::from_micros(200 + i * 20));
            match svc.upsert(uid, vec!["deadline".into()], &ctx).await {
                Err(ServiceError::Cancelled(_)) => {
                    assert_eq!(svc.record_count(uid, &check).await?, 0, "user {uid} written after Cancelled");
                }
                Ok(r) => {
                    assert_eq!(svc.record_count(uid, &check).await?, 1);
                    use sea_orm::EntityTrait;
                    models::user_preferences::Entity::delete_by_id(r.id).exec(&db).await?;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    #[tokio::test]
    async fn postgres_concurrent_upserts_single_row() -> Result<(), anyhow::Error> {
        let Some(db) = get_db().await? else { return Ok(()) };
        let svc = Arc::new(PreferenceService::new(Arc::new(SeaOrmPreferenceRepository::new(db.clone()))));
        let uid = i64::from(fresh_id());
        let submitted: Vec<Vec<String>> = (0..8).map(|i| vec![format!("c{i}")]).collect();

        let mut handles = vec![];
        for list in submitted.clone() {
            let svc = svc.clone();
            handles.push(tokio::spawn(async move { svc.upsert(uid, list, &OpContext::new()).await }));
        }
        for h in handles {
            h.await??;
        }

        let ctx = OpContext::new();
        assert_eq!(svc.record_count(uid, &ctx).await?, 1);
        let last = svc.get(uid, &ctx).await?;
        assert!(submitted.iter().any(|s| s.as_slice() == last.preferences()));

        if let Some(r) = last.record() {
            use sea_orm::EntityTrait;
            models::user_preferences::Entity::delete_by_id(r.id).exec(&db).await?;
        }
        Ok(())
    }
}
