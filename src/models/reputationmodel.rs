use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpendTier {
    None,
    Gold,
    Platinum,
    Enterprise,
}

impl SpendTier {
    /// Thresholds are exclusive: exactly 10,000 is still `None`.
    pub fn from_total_spend(total_spend: &BigDecimal) -> Self {
        if *total_spend > BigDecimal::from(1_000_000) {
            SpendTier::Enterprise
        } else if *total_spend > BigDecimal::from(100_000) {
            SpendTier::Platinum
        } else if *total_spend > BigDecimal::from(10_000) {
            SpendTier::Gold
        } else {
            SpendTier::None
        }
    }

    pub fn to_str(&self) -> &str {
        match self {
            SpendTier::None => "none",
            SpendTier::Gold => "gold",
            SpendTier::Platinum => "platinum",
            SpendTier::Enterprise => "enterprise",
        }
    }
}

/// Hiring statistics owned by the job/contract service.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct ClientHiringStats {
    pub hiring_rate: f64,
    pub avg_hourly_rate: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ReputationSnapshot {
    pub client_id: String,
    pub total_spend: BigDecimal,
    pub avg_rating: f64,
    pub reviews_count: i64,
    pub spend_tier: SpendTier,
    pub hiring_rate: Option<f64>,
    pub avg_hourly_rate: Option<f64>,
    /// Set when the job service could not be reached; only the locally derived
    /// fields are trustworthy.
    pub degraded: bool,
    pub computed_at: DateTime<Utc>,
}
