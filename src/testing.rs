// Shared fixtures for unit tests.
use std::{
    str::FromStr,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    config::Config,
    db::{
        cache::LocalSnapshotCache,
        memorydb::MemoryReviewStore,
        reviewdb::{ReviewExt, StoreError},
    },
    dtos::reviewdtos::CreateReviewDto,
    models::{
        reputationmodel::ClientHiringStats,
        reviewmodel::{NewReview, Ratings, Review, SubmitOutcome},
    },
    service::{
        audit_service::{AuditService, AuditSigner, AuditSink, SignedAuditEvent},
        error::ServiceError,
        job_service_client::ClientStatsProvider,
    },
    AppState,
};

pub const TEST_AUDIT_SECRET: &str = "integrity-secret-for-tests";

pub fn new_review(reviewer: &str, reviewee: &str, contract: &str, overall: i32, value: &str) -> NewReview {
    NewReview {
        reviewer_id: reviewer.to_string(),
        reviewee_id: reviewee.to_string(),
        job_id: format!("job-{}", contract),
        contract_id: contract.to_string(),
        ratings: Ratings {
            overall,
            communication: overall,
            quality: overall,
            value: overall,
            schedule: overall,
        },
        private_rating: None,
        comment: None,
        contract_value: BigDecimal::from_str(value).unwrap(),
    }
}

pub fn review_dto(reviewer: &str, reviewee: &str, contract: &str, overall: i32) -> CreateReviewDto {
    CreateReviewDto {
        reviewer_id: reviewer.to_string(),
        reviewee_id: reviewee.to_string(),
        job_id: format!("job-{}", contract),
        contract_id: contract.to_string(),
        rating_overall: overall,
        rating_communication: overall,
        rating_quality: overall,
        rating_value: overall,
        rating_schedule: overall,
        private_rating: None,
        comment: None,
        contract_value: BigDecimal::from(1000),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct StaticStats(Option<ClientHiringStats>);

impl StaticStats {
    pub fn available(hiring_rate: f64, avg_hourly_rate: f64) -> Self {
        Self(Some(ClientHiringStats {
            hiring_rate,
            avg_hourly_rate,
        }))
    }

    pub fn unavailable() -> Self {
        Self(None)
    }
}

#[async_trait]
impl ClientStatsProvider for StaticStats {
    async fn client_hiring_stats(&self, _client_id: &str) -> Result<ClientHiringStats, ServiceError> {
        self.0
            .ok_or_else(|| ServiceError::Upstream("job service unreachable".to_string()))
    }
}

/// Keeps every delivered event; optionally fails delivery after recording.
#[derive(Debug, Default)]
pub struct RecordingAuditSink {
    events: Mutex<Vec<SignedAuditEvent>>,
    fail: bool,
}

impl RecordingAuditSink {
    pub fn failing() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn events(&self) -> Vec<SignedAuditEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, event_type: &str) -> usize {
        self.events()
            .iter()
            .filter(|e| e.event.event_type == event_type)
            .count()
    }
}

#[async_trait]
impl AuditSink for RecordingAuditSink {
    async fn deliver(&self, event: &SignedAuditEvent) -> Result<(), ServiceError> {
        self.events.lock().unwrap().push(event.clone());
        if self.fail {
            return Err(ServiceError::Upstream("audit service returned 500".to_string()));
        }
        Ok(())
    }
}

pub fn audit_service(sink: Arc<RecordingAuditSink>) -> Arc<AuditService> {
    Arc::new(AuditService::new(sink, AuditSigner::new(TEST_AUDIT_SECRET)))
}

/// Wraps the memory store and reports a serialization conflict for the first
/// `conflicts` submissions.
#[derive(Debug, Default)]
pub struct FlakyStore {
    inner: MemoryReviewStore,
    conflicts: AtomicU32,
    pub submit_calls: AtomicU32,
}

impl FlakyStore {
    pub fn conflicting(conflicts: u32) -> Self {
        Self {
            inner: MemoryReviewStore::new(),
            conflicts: AtomicU32::new(conflicts),
            submit_calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl ReviewExt for FlakyStore {
    async fn get_review(&self, review_id: Uuid) -> Result<Option<Review>, StoreError> {
        self.inner.get_review(review_id).await
    }

    async fn submit_review(
        &self,
        review_id: Uuid,
        review: NewReview,
        now: DateTime<Utc>,
    ) -> Result<SubmitOutcome, StoreError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.conflicts.load(Ordering::SeqCst);
        if remaining > 0 {
            self.conflicts.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::Conflict);
        }
        self.inner.submit_review(review_id, review, now).await
    }

    async fn save_reply(
        &self,
        review_id: Uuid,
        reply: String,
        replied_at: DateTime<Utc>,
    ) -> Result<Option<Review>, StoreError> {
        self.inner.save_reply(review_id, reply, replied_at).await
    }

    async fn get_released_reviews_for_reviewee(&self, reviewee_id: &str) -> Result<Vec<Review>, StoreError> {
        self.inner.get_released_reviews_for_reviewee(reviewee_id).await
    }

    async fn get_pending_reviews_created_before(
        &self,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Review>, StoreError> {
        self.inner.get_pending_reviews_created_before(cutoff, limit).await
    }

    async fn force_release_review(&self, review_id: Uuid, now: DateTime<Utc>) -> Result<Option<Review>, StoreError> {
        self.inner.force_release_review(review_id, now).await
    }
}

pub const TEST_JWT_SECRET: &str = "jwt-secret-for-tests";

pub fn test_config() -> Config {
    Config {
        database_url: None,
        jwt_secret: TEST_JWT_SECRET.to_string(),
        port: 8000,
        audit_integrity_secret: TEST_AUDIT_SECRET.to_string(),
        audit_service_url: None,
        job_service_url: None,
        upstream_timeout_ms: 3000,
        review_submit_max_attempts: 3,
        reputation_cache_ttl: chrono::TimeDelta::seconds(300),
        forced_release_after: None,
        forced_release_interval_secs: 3600,
        log_level: "info".to_string(),
        redis_url: None,
    }
}

/// Application state over the memory store, a recording audit sink and an
/// unreachable job service.
pub fn test_app_state() -> Arc<AppState> {
    let store: Arc<dyn ReviewExt> = Arc::new(MemoryReviewStore::new());
    AppState::build(
        test_config(),
        store,
        Arc::new(RecordingAuditSink::default()),
        Arc::new(StaticStats::unavailable()),
        Arc::new(LocalSnapshotCache::new()),
    )
}
