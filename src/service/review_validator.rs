// service/review_validator.rs
use std::collections::BTreeSet;

use bigdecimal::BigDecimal;
use num_traits::Zero;
use validator::{Validate, ValidationErrors};

use crate::{
    dtos::reviewdtos::{CreateReviewDto, ReplyReviewDto},
    models::reviewmodel::{NewReview, Ratings},
    service::error::ServiceError,
};

// Matches the NUMERIC(16, 2) contract_value column.
const CONTRACT_VALUE_SCALE: i64 = 2;
const CONTRACT_VALUE_INTEGER_DIGITS: u32 = 14;

fn contract_value_fits(value: &BigDecimal) -> bool {
    let (_, scale) = value.normalized().as_bigint_and_exponent();
    let limit = BigDecimal::from(10i64.pow(CONTRACT_VALUE_INTEGER_DIGITS));

    *value >= BigDecimal::zero() && scale <= CONTRACT_VALUE_SCALE && *value < limit
}

fn offending_fields(errors: &ValidationErrors) -> BTreeSet<String> {
    errors
        .field_errors()
        .keys()
        .map(|field| field.to_string())
        .collect()
}

/// Shape and range checks for incoming submissions. Pure: no store access.
pub struct ReviewValidator;

impl ReviewValidator {
    pub fn validate_submission(dto: CreateReviewDto) -> Result<NewReview, ServiceError> {
        let mut fields = match dto.validate() {
            Ok(()) => BTreeSet::new(),
            Err(errors) => offending_fields(&errors),
        };

        let reviewer_id = dto.reviewer_id.trim();
        let reviewee_id = dto.reviewee_id.trim();

        if !reviewer_id.is_empty() && reviewer_id == reviewee_id {
            fields.insert("reviewee_id".to_string());
        }

        if !contract_value_fits(&dto.contract_value) {
            fields.insert("contract_value".to_string());
        }

        if !fields.is_empty() {
            return Err(ServiceError::Validation {
                fields: fields.into_iter().collect(),
            });
        }

        Ok(NewReview {
            reviewer_id: reviewer_id.to_string(),
            reviewee_id: reviewee_id.to_string(),
            job_id: dto.job_id.trim().to_string(),
            contract_id: dto.contract_id.trim().to_string(),
            ratings: Ratings {
                overall: dto.rating_overall,
                communication: dto.rating_communication,
                quality: dto.rating_quality,
                value: dto.rating_value,
                schedule: dto.rating_schedule,
            },
            private_rating: dto.private_rating,
            comment: dto
                .comment
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
            contract_value: dto.contract_value,
        })
    }

    pub fn validate_reply(dto: ReplyReviewDto) -> Result<String, ServiceError> {
        if let Err(errors) = dto.validate() {
            return Err(ServiceError::Validation {
                fields: offending_fields(&errors).into_iter().collect(),
            });
        }

        Ok(dto.reply.trim().to_string())
    }
}
