use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::models::reviewmodel::{Review, ReviewStatus};

fn validate_identifier(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank_identifier"));
    }
    Ok(())
}

fn validate_reply_text(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank_reply"));
    }
    Ok(())
}

//Review DTOs
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct CreateReviewDto {
    #[validate(custom = "validate_identifier")]
    pub reviewer_id: String,

    #[validate(custom = "validate_identifier")]
    pub reviewee_id: String,

    #[validate(custom = "validate_identifier")]
    pub job_id: String,

    #[validate(custom = "validate_identifier")]
    pub contract_id: String,

    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating_overall: i32,

    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating_communication: i32,

    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating_quality: i32,

    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating_value: i32,

    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating_schedule: i32,

    #[validate(range(min = 1, max = 10, message = "Private rating must be between 1 and 10"))]
    pub private_rating: Option<i32>,

    #[validate(length(max = 2000, message = "Comment must be at most 2000 characters"))]
    pub comment: Option<String>,

    #[serde(default)]
    pub contract_value: BigDecimal,
}

#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct ReplyReviewDto {
    #[validate(
        custom = "validate_reply_text",
        length(min = 1, max = 2000, message = "Reply must be between 1 and 2000 characters")
    )]
    pub reply: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JssResponseDto {
    pub user_id: String,
    pub jss: u8,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub status: String,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(message: &str, data: T) -> Self {
        Self {
            status: "success".to_string(),
            message: message.to_string(),
            data: Some(data),
        }
    }
}

/// Outgoing review. The private rating only feeds the JSS and is shown to
/// nobody but its author.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FilterReviewDto {
    pub id: String,
    pub reviewer_id: String,
    pub reviewee_id: String,
    pub job_id: String,
    pub contract_id: String,
    pub rating_overall: i32,
    pub rating_communication: i32,
    pub rating_quality: i32,
    pub rating_value: i32,
    pub rating_schedule: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_rating: Option<i32>,
    pub comment: Option<String>,
    pub contract_value: BigDecimal,
    pub status: ReviewStatus,
    pub revealed_at: Option<DateTime<Utc>>,
    pub reply: Option<String>,
    pub replied_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl FilterReviewDto {
    pub fn filter_review(review: &Review, viewer_id: &str) -> Self {
        FilterReviewDto {
            id: review.id.to_string(),
            reviewer_id: review.reviewer_id.clone(),
            reviewee_id: review.reviewee_id.clone(),
            job_id: review.job_id.clone(),
            contract_id: review.contract_id.clone(),
            rating_overall: review.rating_overall,
            rating_communication: review.rating_communication,
            rating_quality: review.rating_quality,
            rating_value: review.rating_value,
            rating_schedule: review.rating_schedule,
            private_rating: review
                .private_rating
                .filter(|_| review.reviewer_id == viewer_id),
            comment: review.comment.clone(),
            contract_value: review.contract_value.clone(),
            status: review.status,
            revealed_at: review.revealed_at,
            reply: review.reply.clone(),
            replied_at: review.replied_at,
            created_at: review.created_at,
        }
    }

    pub fn filter_reviews(reviews: &[Review], viewer_id: &str) -> Vec<FilterReviewDto> {
        reviews
            .iter()
            .map(|review| FilterReviewDto::filter_review(review, viewer_id))
            .collect()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReviewListResponseDto {
    pub reviews: Vec<FilterReviewDto>,
    pub results: usize,
}
