//! # Identity Resolver
//!
//! Decides, for one observed (email, phone) pair, whether it starts a new
//! cluster, adds a secondary to an existing one, merges two clusters, or adds
//! nothing. Every resolution runs inside a single store unit of work while the
//! resolution gate is held, so the read and the writes it decides on cannot
//! interleave with another resolution.

use std::sync::Arc;
use std::time::Instant;

use common::journal::{
    log_clusters_merged, log_consistency_violation, log_contact_created,
    log_duplicate_observation, log_resolution_failed, log_secondary_linked,
};
use common::PersistenceError;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use super::cluster::{apply_merge, cluster_knows, elder_and_junior, Resolution, ResolvedCluster};
use super::error::ResolutionError;
use super::query::ContactQuery;
use crate::metrics;
use crate::persistence::{Contact, ContactStore, ContactUnitOfWork, LinkPrecedence, NewContact};

pub struct IdentityResolver {
    store: Arc<dyn ContactStore>,
    gate: Mutex<()>,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn ContactStore>) -> Self {
        Self {
            store,
            gate: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<dyn ContactStore> {
        &self.store
    }

    /// Resolve one observation and commit whatever it changes
    #[instrument(skip(self, query), fields(email = %query.email(), phone_number = %query.phone_number()))]
    pub async fn resolve(&self, query: &ContactQuery) -> Result<ResolvedCluster, ResolutionError> {
        let started = Instant::now();
        let _gate = self.gate.lock().await;

        let result = self.resolve_in_unit_of_work(query).await;
        match &result {
            Ok(cluster) => metrics::record_resolution(&cluster.resolution, started.elapsed()),
            Err(e) => metrics::record_resolution_failure(e),
        }
        result
    }

    async fn resolve_in_unit_of_work(
        &self,
        query: &ContactQuery,
    ) -> Result<ResolvedCluster, ResolutionError> {
        let mut uow = self.store.begin().await.map_err(store_failure("begin"))?;

        let outcome = resolve_within(uow.as_mut(), query).await;
        match outcome {
            Ok(cluster) => {
                uow.commit().await.map_err(store_failure("commit"))?;
                Ok(cluster)
            }
            Err(e) => {
                if let Err(rollback_err) = uow.rollback().await {
                    warn!(error = %rollback_err, "Rollback after failed resolution also failed");
                }
                Err(e)
            }
        }
    }
}

fn store_failure(stage: &'static str) -> impl FnOnce(PersistenceError) -> ResolutionError {
    move |e| {
        log_resolution_failed(stage, &e.to_string());
        ResolutionError::Store(e)
    }
}

async fn resolve_within(
    uow: &mut dyn ContactUnitOfWork,
    query: &ContactQuery,
) -> Result<ResolvedCluster, ResolutionError> {
    let email = query.email();
    let phone_number = query.phone_number();

    let matches = uow
        .find_matching(email, phone_number)
        .await
        .map_err(store_failure("find_matching"))?;

    if matches.is_empty() {
        return start_cluster(uow, query).await;
    }

    let primaries: Vec<Contact> = matches.iter().filter(|c| c.is_primary()).cloned().collect();

    match primaries.as_slice() {
        [primary] => extend_cluster(uow, query, primary, matches).await,
        [first, second] => merge_clusters(uow, query, first, second, matches).await,
        _ => {
            let ids: Vec<i64> = primaries.iter().map(|c| c.id).collect();
            log_consistency_violation(email, phone_number, &ids);
            Err(ResolutionError::ConsistencyViolation {
                primaries: primaries.len(),
                matches: matches.len(),
            })
        }
    }
}

async fn start_cluster(
    uow: &mut dyn ContactUnitOfWork,
    query: &ContactQuery,
) -> Result<ResolvedCluster, ResolutionError> {
    let id = uow
        .insert(&NewContact::primary(query.email(), query.phone_number()))
        .await
        .map_err(store_failure("insert"))?;
    let created = uow.fetch(id).await.map_err(store_failure("fetch"))?;

    log_contact_created(id, query.email(), query.phone_number());

    Ok(ResolvedCluster {
        primary_id: id,
        members: vec![created],
        resolution: Resolution::NewCluster,
    })
}

async fn extend_cluster(
    uow: &mut dyn ContactUnitOfWork,
    query: &ContactQuery,
    primary: &Contact,
    mut members: Vec<Contact>,
) -> Result<ResolvedCluster, ResolutionError> {
    // Nothing new when the primary's own cluster already holds both values.
    if cluster_knows(&members, primary.id, query.email(), query.phone_number()) {
        log_duplicate_observation(primary.id, members.len());
        return Ok(ResolvedCluster {
            primary_id: primary.id,
            members,
            resolution: Resolution::Unchanged,
        });
    }

    let id = uow
        .insert(&NewContact::secondary(
            query.email(),
            query.phone_number(),
            primary.id,
        ))
        .await
        .map_err(store_failure("insert"))?;
    let inserted = uow.fetch(id).await.map_err(store_failure("fetch"))?;
    members.push(inserted);

    log_secondary_linked(id, primary.id);

    Ok(ResolvedCluster {
        primary_id: primary.id,
        members,
        resolution: Resolution::SecondaryInserted { contact_id: id },
    })
}

async fn merge_clusters(
    uow: &mut dyn ContactUnitOfWork,
    query: &ContactQuery,
    first: &Contact,
    second: &Contact,
    mut members: Vec<Contact>,
) -> Result<ResolvedCluster, ResolutionError> {
    // The duplicate check looks at the primaries as matched, before age ordering.
    let duplicate = [first, second]
        .iter()
        .any(|p| p.carries(query.email(), query.phone_number()));

    let (elder, junior) = elder_and_junior(first, second);

    if duplicate {
        log_duplicate_observation(elder.id, members.len());
        return Ok(ResolvedCluster {
            primary_id: elder.id,
            members,
            resolution: Resolution::Unchanged,
        });
    }

    debug!(elder_id = elder.id, junior_id = junior.id, "Merging contact clusters");

    uow.reassign_precedence(junior.id, LinkPrecedence::Secondary, Some(elder.id))
        .await
        .map_err(store_failure("reassign_precedence"))?;
    let relinked = uow
        .relink_all(junior.id, elder.id)
        .await
        .map_err(store_failure("relink_all"))?;

    apply_merge(&mut members, elder.id, junior.id);
    log_clusters_merged(elder.id, junior.id, relinked);

    Ok(ResolvedCluster {
        primary_id: elder.id,
        members,
        resolution: Resolution::Merged {
            junior_id: junior.id,
            relinked,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::entities::contact::contact_at;
    use crate::resolution::ResponseAggregator;
    use crate::persistence::{MemoryContactStore, StoreOperation};
    use chrono::{TimeZone, Utc};

    fn query(email: &str, phone: &str) -> ContactQuery {
        ContactQuery::new(Some(email), Some(phone)).unwrap()
    }

    fn resolver_over(store: &MemoryContactStore) -> IdentityResolver {
        IdentityResolver::new(Arc::new(store.clone()))
    }

    fn by_id(contacts: &[Contact], id: i64) -> &Contact {
        contacts.iter().find(|c| c.id == id).unwrap()
    }

    #[tokio::test]
    async fn test_new_identity_creates_single_primary() {
        let store = MemoryContactStore::new();
        let resolver = resolver_over(&store);

        let cluster = resolver.resolve(&query("a@x", "1")).await.unwrap();

        assert_eq!(cluster.resolution, Resolution::NewCluster);
        let contacts = store.snapshot().await;
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].id, cluster.primary_id);
        assert!(contacts[0].is_primary());
        assert!(contacts[0].carries("a@x", "1"));
    }

    #[tokio::test]
    async fn test_exact_duplicate_is_not_stored_twice() {
        let store = MemoryContactStore::new();
        let resolver = resolver_over(&store);

        let first = resolver.resolve(&query("a@x", "1")).await.unwrap();
        let second = resolver.resolve(&query("a@x", "1")).await.unwrap();

        assert_eq!(second.resolution, Resolution::Unchanged);
        assert_eq!(second.primary_id, first.primary_id);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_new_fact_links_secondary_to_primary() {
        let store = MemoryContactStore::new();
        let resolver = resolver_over(&store);

        let primary = resolver.resolve(&query("a@x", "1")).await.unwrap().primary_id;
        let cluster = resolver.resolve(&query("a@x", "2")).await.unwrap();

        let Resolution::SecondaryInserted { contact_id } = cluster.resolution else {
            panic!("expected a secondary insert, got {:?}", cluster.resolution);
        };
        assert_eq!(cluster.primary_id, primary);
        assert_eq!(store.count().await.unwrap(), 2);

        let contacts = store.snapshot().await;
        let secondary = by_id(&contacts, contact_id);
        assert!(secondary.is_secondary());
        assert_eq!(secondary.linked_id, Some(primary));
        assert!(cluster.non_primary_members().any(|c| c.id == contact_id));
    }

    #[tokio::test]
    async fn test_secondary_links_to_primary_not_first_match() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        // An old secondary sorts ahead of its own, younger-looking primary.
        let store = MemoryContactStore::with_contacts(vec![
            contact_at(1, "a@x", "9", LinkPrecedence::Secondary, Some(2), t),
            contact_at(2, "a@x", "1", LinkPrecedence::Primary, None, t + chrono::Duration::seconds(5)),
        ]);
        let resolver = resolver_over(&store);

        let cluster = resolver.resolve(&query("a@x", "5")).await.unwrap();

        assert_eq!(cluster.primary_id, 2);
        let contacts = store.snapshot().await;
        assert_eq!(contacts.len(), 3);
        assert_eq!(contacts[2].linked_id, Some(2));
    }

    #[tokio::test]
    async fn test_two_primaries_merge_under_elder() {
        let store = MemoryContactStore::new();
        let resolver = resolver_over(&store);

        let p1 = resolver.resolve(&query("a@x", "1")).await.unwrap().primary_id;
        let p2 = resolver.resolve(&query("b@y", "2")).await.unwrap().primary_id;
        let Resolution::SecondaryInserted { contact_id: s2 } =
            resolver.resolve(&query("b@y", "3")).await.unwrap().resolution
        else {
            panic!("expected a secondary insert");
        };
        let rows_before = store.count().await.unwrap();

        let cluster = resolver.resolve(&query("a@x", "2")).await.unwrap();

        assert_eq!(cluster.primary_id, p1);
        assert_eq!(
            cluster.resolution,
            Resolution::Merged {
                junior_id: p2,
                relinked: 1
            }
        );
        assert_eq!(store.count().await.unwrap(), rows_before);

        let contacts = store.snapshot().await;
        assert!(by_id(&contacts, p1).is_primary());
        assert!(by_id(&contacts, p2).is_secondary());
        assert_eq!(by_id(&contacts, p2).linked_id, Some(p1));
        assert_eq!(by_id(&contacts, s2).linked_id, Some(p1));
        assert_eq!(contacts.iter().filter(|c| c.is_primary()).count(), 1);
    }

    #[tokio::test]
    async fn test_merge_tie_break_prefers_smaller_id() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let store = MemoryContactStore::with_contacts(vec![
            contact_at(7, "a@x", "1", LinkPrecedence::Primary, None, t),
            contact_at(3, "b@y", "2", LinkPrecedence::Primary, None, t),
        ]);
        let resolver = resolver_over(&store);

        let cluster = resolver.resolve(&query("a@x", "2")).await.unwrap();

        assert_eq!(cluster.primary_id, 3);
        let contacts = store.snapshot().await;
        assert_eq!(by_id(&contacts, 7).linked_id, Some(3));
    }

    #[tokio::test]
    async fn test_two_primary_duplicate_adds_nothing() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let store = MemoryContactStore::with_contacts(vec![
            contact_at(1, "a@x", "1", LinkPrecedence::Primary, None, t),
            contact_at(2, "b@y", "1", LinkPrecedence::Primary, None, t + chrono::Duration::seconds(1)),
        ]);
        let resolver = resolver_over(&store);

        let cluster = resolver.resolve(&query("b@y", "1")).await.unwrap();

        assert_eq!(cluster.resolution, Resolution::Unchanged);
        assert_eq!(cluster.primary_id, 1);
        let contacts = store.snapshot().await;
        assert!(contacts.iter().all(|c| c.is_primary()));
    }

    #[tokio::test]
    async fn test_resolution_is_idempotent() {
        let store = MemoryContactStore::new();
        let resolver = resolver_over(&store);
        resolver.resolve(&query("a@x", "1")).await.unwrap();

        let first = resolver.resolve(&query("a@x", "2")).await.unwrap();
        let second = resolver.resolve(&query("a@x", "2")).await.unwrap();

        assert_eq!(first.primary_id, second.primary_id);
        let ids = |c: &ResolvedCluster| {
            let mut ids: Vec<i64> = c.non_primary_members().map(|m| m.id).collect();
            ids.sort_unstable();
            ids
        };
        assert_eq!(ids(&first), ids(&second));
        assert_eq!(second.resolution, Resolution::Unchanged);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_repeating_a_merging_request_changes_nothing() {
        let store = MemoryContactStore::new();
        let resolver = resolver_over(&store);
        let p1 = resolver.resolve(&query("a@x", "1")).await.unwrap().primary_id;
        resolver.resolve(&query("b@y", "2")).await.unwrap();

        let merged = resolver.resolve(&query("a@x", "2")).await.unwrap();
        let rows_after_merge = store.count().await.unwrap();
        let repeated = resolver.resolve(&query("a@x", "2")).await.unwrap();

        assert!(matches!(merged.resolution, Resolution::Merged { .. }));
        assert_eq!(repeated.resolution, Resolution::Unchanged);
        assert_eq!(store.count().await.unwrap(), rows_after_merge);

        let merged_view = ResponseAggregator::summarize(&merged).contact;
        let repeated_view = ResponseAggregator::summarize(&repeated).contact;
        assert_eq!(merged_view.primary_contact_id, p1);
        assert_eq!(repeated_view.primary_contact_id, p1);
        assert_eq!(merged_view.emails, repeated_view.emails);
        assert_eq!(merged_view.phone_numbers, repeated_view.phone_numbers);
        let sorted = |mut ids: Vec<i64>| {
            ids.sort_unstable();
            ids
        };
        assert_eq!(
            sorted(merged_view.secondary_contact_ids),
            sorted(repeated_view.secondary_contact_ids)
        );
    }

    #[tokio::test]
    async fn test_known_values_on_separate_records_add_nothing() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let store = MemoryContactStore::with_contacts(vec![
            contact_at(1, "a@x", "1", LinkPrecedence::Primary, None, t),
            contact_at(2, "b@y", "2", LinkPrecedence::Secondary, Some(1), t),
        ]);
        let resolver = resolver_over(&store);

        let cluster = resolver.resolve(&query("a@x", "2")).await.unwrap();

        assert_eq!(cluster.resolution, Resolution::Unchanged);
        assert_eq!(cluster.primary_id, 1);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_secondary_of_unmatched_cluster_is_reported_with_matched_primary() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let store = MemoryContactStore::with_contacts(vec![
            contact_at(1, "a@x", "1", LinkPrecedence::Primary, None, t),
            contact_at(2, "c@z", "5", LinkPrecedence::Secondary, Some(1), t),
            contact_at(3, "b@y", "9", LinkPrecedence::Primary, None, t),
        ]);
        let resolver = resolver_over(&store);

        // Phone matches the foreign secondary, email matches the other primary.
        let cluster = resolver.resolve(&query("b@y", "5")).await.unwrap();

        assert_eq!(cluster.resolution, Resolution::SecondaryInserted { contact_id: 4 });
        let view = ResponseAggregator::summarize(&cluster).contact;
        assert_eq!(view.primary_contact_id, 3);
        assert_eq!(view.secondary_contact_ids, vec![2, 4]);
        assert_eq!(view.emails, vec!["b@y".to_string(), "c@z".to_string()]);
        assert_eq!(view.phone_numbers, vec!["5".to_string()]);

        // The clusters stay apart in the store.
        let contacts = store.snapshot().await;
        assert!(by_id(&contacts, 1).is_primary());
        assert_eq!(by_id(&contacts, 2).linked_id, Some(1));
        assert_eq!(by_id(&contacts, 4).linked_id, Some(3));
    }

    #[tokio::test]
    async fn test_more_than_two_primaries_is_consistency_violation() {
        let t = Utc::now();
        let store = MemoryContactStore::with_contacts(vec![
            contact_at(1, "a@x", "1", LinkPrecedence::Primary, None, t),
            contact_at(2, "b@y", "2", LinkPrecedence::Primary, None, t),
            contact_at(3, "c@z", "2", LinkPrecedence::Primary, None, t),
        ]);
        let resolver = resolver_over(&store);

        let err = resolver.resolve(&query("a@x", "2")).await.unwrap_err();
        assert!(matches!(
            err,
            ResolutionError::ConsistencyViolation {
                primaries: 3,
                matches: 3
            }
        ));
        assert_eq!(store.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_matches_without_primary_is_consistency_violation() {
        let t = Utc::now();
        let store = MemoryContactStore::with_contacts(vec![
            contact_at(1, "z@z", "9", LinkPrecedence::Primary, None, t),
            contact_at(2, "a@x", "1", LinkPrecedence::Secondary, Some(1), t),
        ]);
        let resolver = resolver_over(&store);

        let err = resolver.resolve(&query("a@x", "5")).await.unwrap_err();
        assert_eq!(err.kind(), "consistency_violation");
    }

    #[tokio::test]
    async fn test_failed_relink_rolls_back_demotion_and_retry_converges() {
        let store = MemoryContactStore::new();
        let resolver = resolver_over(&store);
        let p1 = resolver.resolve(&query("a@x", "1")).await.unwrap().primary_id;
        let p2 = resolver.resolve(&query("b@y", "2")).await.unwrap().primary_id;

        store.fail_on(StoreOperation::RelinkAll);
        let err = resolver.resolve(&query("a@x", "2")).await.unwrap_err();
        assert!(matches!(err, ResolutionError::Store(_)));
        assert!(by_id(&store.snapshot().await, p2).is_primary());

        store.clear_failures();
        let cluster = resolver.resolve(&query("a@x", "2")).await.unwrap();
        assert_eq!(cluster.primary_id, p1);
        assert_eq!(by_id(&store.snapshot().await, p2).linked_id, Some(p1));
    }

    #[tokio::test]
    async fn test_failed_insert_surfaces_store_error() {
        let store = MemoryContactStore::new();
        store.fail_on(StoreOperation::Insert);
        let resolver = resolver_over(&store);

        let err = resolver.resolve(&query("a@x", "1")).await.unwrap_err();
        assert_eq!(err.kind(), "store_failure");
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_first_sightings_create_one_primary() {
        let store = MemoryContactStore::new();
        let resolver = Arc::new(resolver_over(&store));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let resolver = resolver.clone();
                tokio::spawn(async move { resolver.resolve(&query("a@x", "1")).await })
            })
            .collect();

        let mut primaries = Vec::new();
        for handle in handles {
            primaries.push(handle.await.unwrap().unwrap().primary_id);
        }

        primaries.dedup();
        assert_eq!(primaries.len(), 1);
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
