// service/reply_service.rs
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::{
    db::reviewdb::ReviewExt,
    dtos::reviewdtos::ReplyReviewDto,
    models::reviewmodel::Review,
    service::{error::ServiceError, review_validator::ReviewValidator},
};

/// Lets the reviewee answer a released review, once.
#[derive(Clone)]
pub struct ReplyService {
    store: Arc<dyn ReviewExt>,
}

impl std::fmt::Debug for ReplyService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplyService").finish_non_exhaustive()
    }
}

impl ReplyService {
    pub fn new(store: Arc<dyn ReviewExt>) -> Self {
        Self { store }
    }

    pub async fn reply_to_review(
        &self,
        review_id: Uuid,
        caller_id: &str,
        dto: ReplyReviewDto,
    ) -> Result<Review, ServiceError> {
        let reply = ReviewValidator::validate_reply(dto)?;

        let review = self
            .store
            .get_review(review_id)
            .await?
            .ok_or(ServiceError::ReviewNotFound(review_id))?;

        if review.reviewee_id != caller_id {
            // A pending review must not leak its existence to non-authors.
            if !review.visible_to(caller_id) {
                return Err(ServiceError::ReviewNotFound(review_id));
            }
            return Err(ServiceError::NotReviewee(review_id));
        }

        if !review.is_released() {
            return Err(ServiceError::NotReleased(review_id));
        }

        if review.reply.is_some() {
            return Err(ServiceError::ReplyExists(review_id));
        }

        // Conditional write: a concurrent reply that won the race leaves nothing to update.
        let updated = self
            .store
            .save_reply(review_id, reply, Utc::now())
            .await?
            .ok_or(ServiceError::ReplyExists(review_id))?;

        tracing::info!("Reviewee {} replied to review {}", caller_id, review_id);

        Ok(updated)
    }
}
