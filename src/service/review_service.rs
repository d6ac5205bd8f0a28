// service/review_service.rs
use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use rand::Rng;
use uuid::Uuid;

use crate::{
    db::reviewdb::{ReviewExt, StoreError},
    models::reviewmodel::{NewReview, Review, SubmitOutcome},
    service::{
        audit_service::AuditService, error::ServiceError, reputation_service::ReputationService,
    },
    utils::keyed_lock::KeyedLocks,
};

const RETRY_BASE_DELAY_MS: u64 = 25;
const FORCED_RELEASE_BATCH: i64 = 100;

/// Owns the PENDING -> RELEASED transition. Submissions for one contract are
/// serialized through `contract_locks`; the store makes the pair write atomic.
pub struct ReviewService {
    store: Arc<dyn ReviewExt>,
    audit: Arc<AuditService>,
    reputation: Arc<ReputationService>,
    contract_locks: KeyedLocks,
    max_attempts: u32,
}

impl std::fmt::Debug for ReviewService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReviewService")
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

impl ReviewService {
    pub fn new(
        store: Arc<dyn ReviewExt>,
        audit: Arc<AuditService>,
        reputation: Arc<ReputationService>,
        max_attempts: u32,
    ) -> Self {
        Self {
            store,
            audit,
            reputation,
            contract_locks: KeyedLocks::new(),
            max_attempts: max_attempts.max(1),
        }
    }

    pub async fn submit_review(&self, review: NewReview) -> Result<Review, ServiceError> {
        let outcome = {
            let _guard = self.contract_locks.lock(&review.contract_id).await;
            self.submit_with_retry(review).await?
        };

        match outcome {
            SubmitOutcome::Pending(review) => {
                tracing::info!(
                    "Review {} for contract {} is pending its counterpart",
                    review.id,
                    review.contract_id
                );
                Ok(review)
            }
            SubmitOutcome::Released { review, counterpart } => {
                tracing::info!(
                    "Released reviews {} and {} for contract {}",
                    review.id,
                    counterpart.id,
                    review.contract_id
                );

                self.reputation
                    .invalidate(&[review.reviewee_id.as_str(), review.reviewer_id.as_str()])
                    .await;

                // The release is committed; a lost audit event must not undo it.
                if let Err(e) = self.audit.log_pair_release(&review, &counterpart).await {
                    tracing::error!(
                        "Failed to deliver release audit event for contract {}: {}",
                        review.contract_id,
                        e
                    );
                }

                Ok(review)
            }
        }
    }

    async fn submit_with_retry(&self, review: NewReview) -> Result<SubmitOutcome, ServiceError> {
        let mut attempt = 1;

        loop {
            match self
                .store
                .submit_review(Uuid::new_v4(), review.clone(), Utc::now())
                .await
            {
                Ok(outcome) => return Ok(outcome),
                Err(StoreError::Conflict) if attempt < self.max_attempts => {
                    let jitter = rand::rng().random_range(0..RETRY_BASE_DELAY_MS);
                    let delay = RETRY_BASE_DELAY_MS * 2u64.pow(attempt - 1) + jitter;
                    tracing::warn!(
                        "Serialization conflict on contract {} (attempt {}/{}), retrying in {}ms",
                        review.contract_id,
                        attempt,
                        self.max_attempts,
                        delay
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    attempt += 1;
                }
                Err(StoreError::Conflict) => {
                    return Err(ServiceError::ConcurrencyConflict { attempts: attempt });
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// A pending review is only visible to its author; everyone else gets
    /// `ReviewNotFound`.
    pub async fn get_review(&self, review_id: Uuid, viewer_id: &str) -> Result<Review, ServiceError> {
        match self.store.get_review(review_id).await? {
            Some(review) if review.visible_to(viewer_id) => Ok(review),
            _ => Err(ServiceError::ReviewNotFound(review_id)),
        }
    }

    pub async fn list_released_reviews(&self, reviewee_id: &str) -> Result<Vec<Review>, ServiceError> {
        Ok(self.store.get_released_reviews_for_reviewee(reviewee_id).await?)
    }

    /// Releases one-sided reviews created before `cutoff`. Each row is released
    /// under its contract's lock, so a counterpart arriving at the same moment
    /// either pairs first or finds the row already released.
    pub async fn release_expired(&self, cutoff: DateTime<Utc>) -> Result<usize, ServiceError> {
        let candidates = self
            .store
            .get_pending_reviews_created_before(cutoff, FORCED_RELEASE_BATCH)
            .await?;

        let mut released = 0;
        for candidate in candidates {
            let _guard = self.contract_locks.lock(&candidate.contract_id).await;

            let Some(review) = self.store.force_release_review(candidate.id, Utc::now()).await? else {
                continue;
            };
            released += 1;

            self.reputation
                .invalidate(&[review.reviewee_id.as_str(), review.reviewer_id.as_str()])
                .await;

            if let Err(e) = self.audit.log_forced_release(&review).await {
                tracing::error!("Failed to deliver forced release audit event for {}: {}", review.id, e);
            }
        }

        Ok(released)
    }
}
