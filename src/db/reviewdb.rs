// db/reviewdb.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction};
use thiserror::Error;
use uuid::Uuid;

use super::db::DBClient;
use crate::models::reviewmodel::{NewReview, Review, ReviewStatus, SubmitOutcome};

const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";

const REVIEW_COLUMNS: &str = "id, reviewer_id, reviewee_id, job_id, contract_id, \
    rating_overall, rating_communication, rating_quality, rating_value, rating_schedule, \
    private_rating, comment, contract_value, status, revealed_at, reply, replied_at, created_at";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Review by {reviewer_id} for contract {contract_id} already exists")]
    Duplicate {
        reviewer_id: String,
        contract_id: String,
    },

    #[error("Transaction could not be serialized")]
    Conflict,

    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if matches!(
                db_err.code().as_deref(),
                Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED)
            ) {
                return StoreError::Conflict;
            }
        }
        StoreError::Database(err)
    }
}

/// Storage seam for reviews. Implementations must make `submit_review` and
/// `force_release_review` atomic per contract: no reader may observe one side
/// of a pair released while the other is still pending.
#[async_trait]
pub trait ReviewExt: Send + Sync {
    async fn get_review(&self, review_id: Uuid) -> Result<Option<Review>, StoreError>;

    /// Inserts `review`, releasing it together with its pending counterpart
    /// when one exists. Fails with `StoreError::Duplicate` when the reviewer
    /// already reviewed this contract.
    async fn submit_review(
        &self,
        review_id: Uuid,
        review: NewReview,
        now: DateTime<Utc>,
    ) -> Result<SubmitOutcome, StoreError>;

    /// Writes the reply only if the review is released and has no reply yet.
    async fn save_reply(
        &self,
        review_id: Uuid,
        reply: String,
        replied_at: DateTime<Utc>,
    ) -> Result<Option<Review>, StoreError>;

    async fn get_released_reviews_for_reviewee(
        &self,
        reviewee_id: &str,
    ) -> Result<Vec<Review>, StoreError>;

    async fn get_pending_reviews_created_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Review>, StoreError>;

    /// Releases a single pending review on its own. Returns `None` when the
    /// review is gone or no longer pending.
    async fn force_release_review(
        &self,
        review_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Review>, StoreError>;
}

async fn lock_contract(
    tx: &mut Transaction<'_, Postgres>,
    contract_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(contract_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

fn map_insert_error(err: sqlx::Error, review: &NewReview) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return StoreError::Duplicate {
                reviewer_id: review.reviewer_id.clone(),
                contract_id: review.contract_id.clone(),
            };
        }
    }
    StoreError::from(err)
}

#[async_trait]
impl ReviewExt for DBClient {
    async fn get_review(&self, review_id: Uuid) -> Result<Option<Review>, StoreError> {
        let review = sqlx::query_as::<_, Review>(&format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews WHERE id = $1"
        ))
        .bind(review_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(review)
    }

    async fn submit_review(
        &self,
        review_id: Uuid,
        review: NewReview,
        now: DateTime<Utc>,
    ) -> Result<SubmitOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Serializes every writer touching this contract until commit/rollback.
        lock_contract(&mut tx, &review.contract_id).await?;

        let existing: Option<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM reviews WHERE reviewer_id = $1 AND contract_id = $2",
        )
        .bind(&review.reviewer_id)
        .bind(&review.contract_id)
        .fetch_optional(&mut *tx)
        .await?;

        if existing.is_some() {
            return Err(StoreError::Duplicate {
                reviewer_id: review.reviewer_id,
                contract_id: review.contract_id,
            });
        }

        let opposing = sqlx::query_as::<_, Review>(&format!(
            r#"
            SELECT {REVIEW_COLUMNS} FROM reviews
            WHERE reviewer_id = $1 AND reviewee_id = $2 AND contract_id = $3
              AND status = 'pending'
            FOR UPDATE
            "#
        ))
        .bind(&review.reviewee_id)
        .bind(&review.reviewer_id)
        .bind(&review.contract_id)
        .fetch_optional(&mut *tx)
        .await?;

        let (status, revealed_at) = match opposing {
            Some(_) => (ReviewStatus::Released, Some(now)),
            None => (ReviewStatus::Pending, None),
        };

        let inserted = sqlx::query_as::<_, Review>(&format!(
            r#"
            INSERT INTO reviews
            (id, reviewer_id, reviewee_id, job_id, contract_id,
             rating_overall, rating_communication, rating_quality, rating_value, rating_schedule,
             private_rating, comment, contract_value, status, revealed_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING {REVIEW_COLUMNS}
            "#
        ))
        .bind(review_id)
        .bind(&review.reviewer_id)
        .bind(&review.reviewee_id)
        .bind(&review.job_id)
        .bind(&review.contract_id)
        .bind(review.ratings.overall)
        .bind(review.ratings.communication)
        .bind(review.ratings.quality)
        .bind(review.ratings.value)
        .bind(review.ratings.schedule)
        .bind(review.private_rating)
        .bind(&review.comment)
        .bind(&review.contract_value)
        .bind(status)
        .bind(revealed_at)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_insert_error(e, &review))?;

        let Some(opposing) = opposing else {
            tx.commit().await?;
            return Ok(SubmitOutcome::Pending(inserted));
        };

        let counterpart = sqlx::query_as::<_, Review>(&format!(
            r#"
            UPDATE reviews
            SET status = 'released', revealed_at = $2
            WHERE id = $1 AND status = 'pending'
            RETURNING {REVIEW_COLUMNS}
            "#
        ))
        .bind(opposing.id)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        // The row was locked above, so losing it here means another writer
        // bypassed the contract lock. Roll back and let the caller retry.
        let Some(counterpart) = counterpart else {
            return Err(StoreError::Conflict);
        };

        tx.commit().await?;

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
        let review = sqlx::query_as::<_, Review>(&format!(
            r#"
            UPDATE reviews
            SET reply = $2, replied_at = $3
            WHERE id = $1 AND status = 'released' AND reply IS NULL
            RETURNING {REVIEW_COLUMNS}
            "#
        ))
        .bind(review_id)
        .bind(reply)
        .bind(replied_at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(review)
    }

    async fn get_released_reviews_for_reviewee(
        &self,
        reviewee_id: &str,
    ) -> Result<Vec<Review>, StoreError> {
        let reviews = sqlx::query_as::<_, Review>(&format!(
            r#"
            SELECT {REVIEW_COLUMNS} FROM reviews
            WHERE reviewee_id = $1 AND status = 'released'
            ORDER BY revealed_at DESC, id
            "#
        ))
        .bind(reviewee_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(reviews)
    }

    async fn get_pending_reviews_created_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Review>, StoreError> {
        let reviews = sqlx::query_as::<_, Review>(&format!(
            r#"
            SELECT {REVIEW_COLUMNS} FROM reviews
            WHERE status = 'pending' AND created_at < $1
            ORDER BY created_at
            LIMIT $2
            "#
        ))
        .bind(cutoff)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(reviews)
    }

    async fn force_release_review(
        &self,
        review_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<Review>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let contract: Option<(String,)> =
            sqlx::query_as("SELECT contract_id FROM reviews WHERE id = $1")
                .bind(review_id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some((contract_id,)) = contract else {
            return Ok(None);
        };

        lock_contract(&mut tx, &contract_id).await?;

        let released = sqlx::query_as::<_, Review>(&format!(
            r#"
            UPDATE reviews
            SET status = 'released', revealed_at = $2
            WHERE id = $1 AND status = 'pending'
            RETURNING {REVIEW_COLUMNS}
            "#
        ))
        .bind(review_id)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(released)
    }
}
