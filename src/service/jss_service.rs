// service/jss_service.rs
use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};

use crate::{
    db::reviewdb::ReviewExt,
    models::reviewmodel::Review,
    service::error::ServiceError,
    utils::decimal::BigDecimalHelpers,
};

const NEW_FREELANCER_JSS: u8 = 100;
const MAX_REPEAT_CLIENT_BONUS: f64 = 5.0;
const STALE_AFTER_MONTHS: f64 = 6.0;

/// Job Success Score for a freelancer, computed from released reviews only.
///
/// Each review scores `0.2 * public + 0.8 * private` on a 0..1 scale, where
/// the private rating falls back to twice the public one. Reviews are weighted
/// by `log10(value + 1)` once the contract is worth more than 100, and count
/// half when older than six months. Repeat reviewers add one point each, up to
/// five.
pub fn compute_jss(user_id: &str, reviews: &[Review], now: DateTime<Utc>) -> u8 {
    let disclosed: Vec<&Review> = reviews
        .iter()
        .filter(|r| r.is_released() && r.reviewee_id == user_id)
        .collect();

    if disclosed.is_empty() {
        return NEW_FREELANCER_JSS;
    }

    let mut weighted_score = 0.0;
    let mut total_weight = 0.0;
    let mut per_reviewer: HashMap<&str, u32> = HashMap::new();

    for review in &disclosed {
        let public_score = f64::from(review.rating_overall) / 5.0;
        let private = review.private_rating.unwrap_or(review.rating_overall * 2);
        let private_score = f64::from(private) / 10.0;
        let base_score = public_score * 0.2 + private_score * 0.8;

        let value = review.contract_value.to_f64_or_zero();
        let contract_weight = if value > 100.0 { (value + 1.0).log10() } else { 1.0 };

        let months_old = (now - review.created_at).num_seconds() as f64 / (60.0 * 60.0 * 24.0 * 30.0);
        let recency_weight = if months_old > STALE_AFTER_MONTHS { 0.5 } else { 1.0 };

        let weight = contract_weight * recency_weight;
        weighted_score += weight * base_score;
        total_weight += weight;

        *per_reviewer.entry(review.reviewer_id.as_str()).or_insert(0) += 1;
    }

    if total_weight == 0.0 {
        return NEW_FREELANCER_JSS;
    }

    let repeat_clients = per_reviewer.values().filter(|count| **count > 1).count() as f64;
    let jss = weighted_score / total_weight * 100.0 + repeat_clients.min(MAX_REPEAT_CLIENT_BONUS);

    jss.round().clamp(0.0, 100.0) as u8
}

#[derive(Clone)]
pub struct JssService {
    store: Arc<dyn ReviewExt>,
}

impl std::fmt::Debug for JssService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JssService").finish_non_exhaustive()
    }
}

impl JssService {
    pub fn new(store: Arc<dyn ReviewExt>) -> Self {
        Self { store }
    }

    pub async fn calculate_jss(&self, user_id: &str) -> Result<u8, ServiceError> {
        let reviews = self.store.get_released_reviews_for_reviewee(user_id).await?;
        Ok(compute_jss(user_id, &reviews, Utc::now()))
    }
}
