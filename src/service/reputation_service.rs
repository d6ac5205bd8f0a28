// service/reputation_service.rs
use std::sync::Arc;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration, Utc};
use num_traits::Zero;

use crate::{
    db::{
        cache::{CachedSnapshot, SnapshotCache},
        reviewdb::ReviewExt,
    },
    models::{
        reputationmodel::{ClientHiringStats, ReputationSnapshot, SpendTier},
        reviewmodel::Review,
    },
    service::{error::ServiceError, job_service_client::ClientStatsProvider},
    utils::decimal::round_to_one_decimal,
};

/// Builds a snapshot from whatever rows it is given, but only counts released
/// reviews received by `client_id`.
pub fn compute_snapshot(
    client_id: &str,
    reviews: &[Review],
    hiring: Option<ClientHiringStats>,
    computed_at: DateTime<Utc>,
) -> ReputationSnapshot {
    let disclosed: Vec<&Review> = reviews
        .iter()
        .filter(|r| r.is_released() && r.reviewee_id == client_id)
        .collect();

    let total_spend = disclosed
        .iter()
        .fold(BigDecimal::zero(), |acc, r| acc + &r.contract_value);

    let avg_rating = if disclosed.is_empty() {
        0.0
    } else {
        let sum: i64 = disclosed.iter().map(|r| i64::from(r.rating_overall)).sum();
        round_to_one_decimal(sum as f64 / disclosed.len() as f64)
    };

    ReputationSnapshot {
        client_id: client_id.to_string(),
        spend_tier: SpendTier::from_total_spend(&total_spend),
        total_spend,
        avg_rating,
        reviews_count: disclosed.len() as i64,
        hiring_rate: hiring.map(|h| h.hiring_rate),
        avg_hourly_rate: hiring.map(|h| h.avg_hourly_rate),
        degraded: hiring.is_none(),
        computed_at,
    }
}

pub struct ReputationService {
    store: Arc<dyn ReviewExt>,
    job_service: Arc<dyn ClientStatsProvider>,
    cache: Arc<dyn SnapshotCache>,
    cache_ttl: Duration,
}

impl std::fmt::Debug for ReputationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReputationService")
            .field("cache_ttl", &self.cache_ttl)
            .finish_non_exhaustive()
    }
}

impl ReputationService {
    pub fn new(
        store: Arc<dyn ReviewExt>,
        job_service: Arc<dyn ClientStatsProvider>,
        cache: Arc<dyn SnapshotCache>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            store,
            job_service,
            cache,
            cache_ttl,
        }
    }

    pub async fn get_client_reputation(&self, client_id: &str) -> Result<ReputationSnapshot, ServiceError> {
        let now = Utc::now();

        // A cache outage only costs a recompute.
        let generation = match self.cache.generation(client_id).await {
            Ok(generation) => Some(generation),
            Err(e) => {
                tracing::warn!("Reputation cache unavailable for client {}: {}", client_id, e);
                None
            }
        };

        if let Some(generation) = generation {
            match self.cache.get(client_id).await {
                Ok(Some(entry))
                    if entry.generation == generation && now - entry.snapshot.computed_at < self.cache_ttl =>
                {
                    return Ok(entry.snapshot);
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("Reputation cache read failed for client {}: {}", client_id, e),
            }
        }

        let reviews = self.store.get_released_reviews_for_reviewee(client_id).await?;

        let hiring = match self.job_service.client_hiring_stats(client_id).await {
            Ok(stats) => Some(stats),
            Err(e) => {
                tracing::warn!("Serving degraded reputation for client {}: {}", client_id, e);
                None
            }
        };

        let snapshot = compute_snapshot(client_id, &reviews, hiring, now);

        let ttl_seconds = usize::try_from(self.cache_ttl.num_seconds()).unwrap_or(0);
        if let (Some(generation), false, true) = (generation, snapshot.degraded, ttl_seconds > 0) {
            let entry = CachedSnapshot {
                generation,
                snapshot: snapshot.clone(),
            };
            if let Err(e) = self.cache.set(client_id, &entry, ttl_seconds).await {
                tracing::warn!("Reputation cache write failed for client {}: {}", client_id, e);
            }
        }

        Ok(snapshot)
    }

    /// Drops cached snapshots for the parties of a release, on every replica
    /// sharing the cache.
    pub async fn invalidate(&self, client_ids: &[&str]) {
        for client_id in client_ids {
            if let Err(e) = self.cache.invalidate(client_id).await {
                tracing::error!("Failed to invalidate reputation cache for {}: {}", client_id, e);
            }
        }
    }
}
