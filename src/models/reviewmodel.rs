use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "review_status", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewStatus {
    Pending,
    Released,
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow, PartialEq)]
pub struct Review {
    pub id: Uuid,
    pub reviewer_id: String,
    pub reviewee_id: String,
    pub job_id: String,
    pub contract_id: String,
    pub rating_overall: i32,
    pub rating_communication: i32,
    pub rating_quality: i32,
    pub rating_value: i32,
    pub rating_schedule: i32,
    pub private_rating: Option<i32>,
    pub comment: Option<String>,
    pub contract_value: BigDecimal,
    pub status: ReviewStatus,
    pub revealed_at: Option<DateTime<Utc>>,
    pub reply: Option<String>,
    pub replied_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Review {
    pub fn is_released(&self) -> bool {
        self.status == ReviewStatus::Released
    }

    /// Pending reviews are only visible to their author.
    pub fn visible_to(&self, viewer_id: &str) -> bool {
        self.is_released() || self.reviewer_id == viewer_id
    }
}

/// A submission that has passed `ReviewValidator`. The coordinator only
/// accepts this type, never the raw DTO.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReview {
    pub reviewer_id: String,
    pub reviewee_id: String,
    pub job_id: String,
    pub contract_id: String,
    pub ratings: Ratings,
    pub private_rating: Option<i32>,
    pub comment: Option<String>,
    pub contract_value: BigDecimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ratings {
    pub overall: i32,
    pub communication: i32,
    pub quality: i32,
    pub value: i32,
    pub schedule: i32,
}

impl NewReview {
    /// Materializes the row written for this submission.
    pub fn into_review(
        self,
        id: Uuid,
        created_at: DateTime<Utc>,
        revealed_at: Option<DateTime<Utc>>,
    ) -> Review {
        let status = if revealed_at.is_some() {
            ReviewStatus::Released
        } else {
            ReviewStatus::Pending
        };

        Review {
            id,
            reviewer_id: self.reviewer_id,
            reviewee_id: self.reviewee_id,
            job_id: self.job_id,
            contract_id: self.contract_id,
            rating_overall: self.ratings.overall,
            rating_communication: self.ratings.communication,
            rating_quality: self.ratings.quality,
            rating_value: self.ratings.value,
            rating_schedule: self.ratings.schedule,
            private_rating: self.private_rating,
            comment: self.comment,
            contract_value: self.contract_value,
            status,
            revealed_at,
            reply: None,
            replied_at: None,
            created_at,
        }
    }
}

/// Result of the atomic find-opposing-then-write step.
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    /// No pending counterpart; the new review is hidden.
    Pending(Review),
    /// The new review and its counterpart were released together.
    Released { review: Review, counterpart: Review },
}

impl SubmitOutcome {
    pub fn into_review(self) -> Review {
        match self {
            SubmitOutcome::Pending(review) => review,
            SubmitOutcome::Released { review, .. } => review,
        }
    }
}
