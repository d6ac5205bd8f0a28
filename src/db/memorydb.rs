// db/memorydb.rs
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::reviewdb::{ReviewExt, StoreError};
use crate::models::reviewmodel::{NewReview, Review, ReviewStatus, SubmitOutcome};

/// In-process review store used for local runs without `DATABASE_URL` and
/// by the test suite. Every mutation runs under a single write lock, so a
/// pair release is never observable half-done.
#[derive(Debug, Default)]
pub struct MemoryReviewStore {
    state: RwLock<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    reviews: HashMap<Uuid, Review>,
    by_contract: HashMap<String, Vec<Uuid>>,
}

impl MemoryState {
    fn contract_reviews<'a>(&'a self, contract_id: &str) -> impl Iterator<Item = &'a Review> + 'a {
        self.by_contract
            .get(contract_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.reviews.get(id))
    }
}

impl MemoryReviewStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReviewExt for MemoryReviewStore {
    async fn get_review(&self, review_id: Uuid) -> Result<Option<Review>, StoreError> {
        let state = self.state.read().await;
        Ok(state.reviews.get(&review_id).cloned())
    }

    async fn submit_review(
        &self,
        review_id: Uuid,
        review: NewReview,
        now: DateTime<Utc>,
    ) -> Result<SubmitOutcome, StoreError> {
        let mut state = self.state.write().await;

        if state
            .contract_reviews(&review.contract_id)
            .any(|r| r.reviewer_id == review.reviewer_id)
        {
            return Err(StoreError::Duplicate {
                reviewer_id: review.reviewer_id,
                contract_id: review.contract_id,
            });
        }

        let opposing_id = state
            .contract_reviews(&review.contract_id)
            .find(|r| {
                r.reviewer_id == review.reviewee_id
                    && r.reviewee_id == review.reviewer_id
                    && r.status == ReviewStatus::Pending
            })
            .map(|r| r.id);

        let contract_id = review.contract_id.clone();
        let revealed_at = opposing_id.map(|_| now);
        let inserted = review.into_review(review_id, now, revealed_at);

        state.reviews.insert(review_id, inserted.clone());
        state.by_contract.entry(contract_id).or_default().push(review_id);

        let Some(opposing_id) = opposing_id else {
            return Ok(SubmitOutcome::Pending(inserted));
        };

        let counterpart = match state.reviews.get_mut(&opposing_id) {
            Some(counterpart) => {
                counterpart.status = ReviewStatus::Released;
                counterpart.revealed_at = Some(now);
                counterpart.clone()
            }
            None => return Err(StoreError::Conflict),
        };

        Ok(SubmitOutcome::Released {
            review: inserted,
            counterpart,
        })
    }

    async fn save_reply(
        &self,
        review_id: Uuid,
        reply: String,
        replied_at: DateTime<Utc>,
    ) -> Result<Option<Review>, StoreError> {
        let mut state = self.state.write().await;

        match state.reviews.get_mut(&review_id) {
            Some(review) if review.is_released() && review.reply.is_none() => {
                review.reply = Some(reply);
                review.replied_at = Some(replied_at);
                Ok(Some(review.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn get_released_reviews_for_reviewee(
        &self,
        reviewee_id: &str,
    ) -> Result<Vec<Review>, StoreError> {
        let state = self.state.read().await;

        let mut reviews: Vec<Review> = state
            .reviews
            .values()
            .filter(|r| r.reviewee_id == reviewee_id && r.is_released())
            .cloned()
            .collect();
        reviews.sort_by(|a, b| b.revealed_at.cmp(&a.revealed_at).then(a.id.cmp(&b.id)));

        Ok(reviews)
    }

    async fn get_pending_reviews_created_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Review>, StoreError> {
        let state = self.state.read().await;

        let mut reviews: Vec<Review> = state
            .reviews
            .values()
            .filter(|r| r.status == ReviewStatus::Pending && r.created_at < cutoff)
            .cloned()
            .collect();
        reviews.sort_by_key(|r| r.created_at);
        reviews.truncate(usize::try_from(limit).unwrap_or(0));

        Ok(reviews)
    }

    async fn force_release_review(
        &self,
        review_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Review>, StoreError> {
        let mut state = self.state.write().await;

        match state.reviews.get_mut(&review_id) {
            Some(review) if review.status == ReviewStatus::Pending => {
                review.status = ReviewStatus::Released;
                review.revealed_at = Some(now);
                Ok(Some(review.clone()))
            }
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
impl MemoryReviewStore {
    /// Rewrites `created_at` so tests can age a review past a cutoff.
    pub async fn backdate(&self, review_id: Uuid, created_at: DateTime<Utc>) {
        if let Some(review) = self.state.write().await.reviews.get_mut(&review_id) {
            review.created_at = created_at;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::new_review;

    #[tokio::test]
    async fn lone_review_stays_pending() {
        let store = MemoryReviewStore::new();
        let outcome = store
            .submit_review(Uuid::new_v4(), new_review("freelancer-1", "client-1", "contract-123", 5, "100"), Utc::now())
            .await
            .unwrap();

        let SubmitOutcome::Pending(review) = outcome else {
            panic!("expected a pending review");
        };
        assert_eq!(review.status, ReviewStatus::Pending);
        assert!(review.revealed_at.is_none());
    }

    #[tokio::test]
    async fn counterpart_releases_both_with_one_timestamp() {
        let store = MemoryReviewStore::new();
        let first = store
            .submit_review(Uuid::new_v4(), new_review("freelancer-1", "client-1", "contract-123", 5, "100"), Utc::now())
            .await
            .unwrap()
            .into_review();

        let outcome = store
            .submit_review(Uuid::new_v4(), new_review("client-1", "freelancer-1", "contract-123", 4, "100"), Utc::now())
            .await
            .unwrap();

        let SubmitOutcome::Released { review, counterpart } = outcome else {
            panic!("expected a paired release");
        };
        assert_eq!(counterpart.id, first.id);
        assert!(review.is_released() && counterpart.is_released());
        assert_eq!(review.revealed_at, counterpart.revealed_at);

        let stored = store.get_review(first.id).await.unwrap().unwrap();
        assert_eq!(stored.revealed_at, review.revealed_at);
    }

    #[tokio::test]
    async fn same_reviewer_same_contract_is_duplicate() {
        let store = MemoryReviewStore::new();
        store
            .submit_review(Uuid::new_v4(), new_review("a", "b", "c-1", 5, "10"), Utc::now())
            .await
            .unwrap();

        let err = store
            .submit_review(Uuid::new_v4(), new_review("a", "b", "c-1", 3, "10"), Utc::now())
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Duplicate { .. }));
    }

    #[tokio::test]
    async fn third_party_on_same_contract_is_not_a_counterpart() {
        let store = MemoryReviewStore::new();
        store
            .submit_review(Uuid::new_v4(), new_review("a", "b", "c-1", 5, "10"), Utc::now())
            .await
            .unwrap();

        let outcome = store
            .submit_review(Uuid::new_v4(), new_review("x", "a", "c-1", 4, "10"), Utc::now())
            .await
            .unwrap();

        assert!(matches!(outcome, SubmitOutcome::Pending(_)));
    }

    #[tokio::test]
    async fn reply_requires_release_and_is_written_once() {
        let store = MemoryReviewStore::new();
        let first = store
            .submit_review(Uuid::new_v4(), new_review("a", "b", "c-1", 5, "10"), Utc::now())
            .await
            .unwrap()
            .into_review();

        let early = store.save_reply(first.id, "thanks".into(), Utc::now()).await.unwrap();
        assert!(early.is_none());

        store
            .submit_review(Uuid::new_v4(), new_review("b", "a", "c-1", 4, "10"), Utc::now())
            .await
            .unwrap();

        let replied = store.save_reply(first.id, "thanks".into(), Utc::now()).await.unwrap();
        assert_eq!(replied.unwrap().reply.as_deref(), Some("thanks"));

        let again = store.save_reply(first.id, "again".into(), Utc::now()).await.unwrap();
        assert!(again.is_none());
    }

    #[tokio::test]
    async fn pending_listing_respects_cutoff_and_limit() {
        let store = MemoryReviewStore::new();
        let now = Utc::now();
        let old = store
            .submit_review(Uuid::new_v4(), new_review("a", "b", "c-1", 5, "10"), now)
            .await
            .unwrap()
            .into_review();
        store
            .submit_review(Uuid::new_v4(), new_review("a", "b", "c-2", 5, "10"), now)
            .await
            .unwrap();
        store.backdate(old.id, now - chrono::Duration::days(40)).await;

        let expired = store
            .get_pending_reviews_created_before(now - chrono::Duration::days(30), 10)
            .await
            .unwrap();

        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, old.id);
    }
}
