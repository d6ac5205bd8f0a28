// service/audit_service.rs
use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::{models::reviewmodel::Review, service::error::ServiceError};

pub const SERVICE_NAME: &str = "review-service";
pub const REVIEW_PAIR_RELEASED: &str = "REVIEW_PAIR_RELEASED";
pub const REVIEW_FORCED_RELEASE: &str = "REVIEW_FORCED_RELEASE";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub service: String,
    pub event_type: String,
    pub actor_id: Option<String>,
    pub amount: Option<BigDecimal>,
    pub metadata: Value,
    pub reference_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignedAuditEvent {
    #[serde(flatten)]
    pub event: AuditEvent,
    pub checksum: String,
}

/// Field order here is the canonical order; do not reorder.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CanonicalAuditFields<'a> {
    service: &'a str,
    event_type: &'a str,
    actor_id: Option<&'a str>,
    amount: Option<String>,
    metadata: Value,
    reference_id: Option<&'a str>,
}

fn sorted_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), sorted_value(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted_value).collect()),
        other => other.clone(),
    }
}

/// Signs audit events with the shared integrity secret. The secret never
/// leaves this struct and is not part of any payload.
#[derive(Clone)]
pub struct AuditSigner {
    secret: Vec<u8>,
}

impl std::fmt::Debug for AuditSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditSigner").finish_non_exhaustive()
    }
}

impl AuditSigner {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Canonical JSON: fixed field order, object keys sorted at every depth,
    /// amount as an exact decimal string with trailing zeros stripped.
    pub fn canonical_payload(event: &AuditEvent) -> String {
        let fields = CanonicalAuditFields {
            service: &event.service,
            event_type: &event.event_type,
            actor_id: event.actor_id.as_deref(),
            amount: event.amount.as_ref().map(|a| a.normalized().to_string()),
            metadata: sorted_value(&event.metadata),
            reference_id: event.reference_id.as_deref(),
        };

        // Serializing plain strings and a Value cannot fail.
        serde_json::to_string(&fields).unwrap_or_default()
    }

    pub fn checksum(&self, event: &AuditEvent) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.secret)
            .expect("HMAC can take key of any size");
        mac.update(Self::canonical_payload(event).as_bytes());

        hex::encode(mac.finalize().into_bytes())
    }

    pub fn sign(&self, event: AuditEvent) -> SignedAuditEvent {
        let checksum = self.checksum(&event);
        SignedAuditEvent { event, checksum }
    }

    pub fn verify(&self, signed: &SignedAuditEvent) -> bool {
        let expected = self.checksum(&signed.event);

        // Compare in constant time to prevent timing attacks
        ConstantTimeEq::ct_eq(signed.checksum.as_bytes(), expected.as_bytes()).into()
    }
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn deliver(&self, event: &SignedAuditEvent) -> Result<(), ServiceError>;
}

/// Posts events to the audit service.
#[derive(Debug, Clone)]
pub struct HttpAuditSink {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpAuditSink {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/api/audit/logs", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl AuditSink for HttpAuditSink {
    async fn deliver(&self, event: &SignedAuditEvent) -> Result<(), ServiceError> {
        self.client
            .post(&self.endpoint)
            .json(event)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}

/// Used when no audit service is configured: events go to the structured log.
#[derive(Debug, Clone, Default)]
pub struct LogAuditSink;

#[async_trait]
impl AuditSink for LogAuditSink {
    async fn deliver(&self, event: &SignedAuditEvent) -> Result<(), ServiceError> {
        tracing::info!(
            event_type = %event.event.event_type,
            reference_id = ?event.event.reference_id,
            checksum = %event.checksum,
            "audit event"
        );
        Ok(())
    }
}

#[derive(Clone)]
pub struct AuditService {
    sink: Arc<dyn AuditSink>,
    signer: AuditSigner,
}

impl std::fmt::Debug for AuditService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditService").finish_non_exhaustive()
    }
}

impl AuditService {
    pub fn new(sink: Arc<dyn AuditSink>, signer: AuditSigner) -> Self {
        Self { sink, signer }
    }

    pub async fn log_pair_release(
        &self,
        review: &Review,
        counterpart: &Review,
    ) -> Result<SignedAuditEvent, ServiceError> {
        let event = AuditEvent {
            service: SERVICE_NAME.to_string(),
            event_type: REVIEW_PAIR_RELEASED.to_string(),
            actor_id: Some(review.reviewer_id.clone()),
            amount: Some(review.contract_value.clone()),
            metadata: serde_json::json!({
                "contract_id": review.contract_id,
                "job_id": review.job_id,
                "review_ids": [review.id, counterpart.id],
                "reviewer_ids": [review.reviewer_id, counterpart.reviewer_id],
                "revealed_at": review.revealed_at.map(|t| t.to_rfc3339()),
            }),
            reference_id: Some(review.contract_id.clone()),
        };

        self.deliver(event).await
    }

    pub async fn log_forced_release(&self, review: &Review) -> Result<SignedAuditEvent, ServiceError> {
        let event = AuditEvent {
            service: SERVICE_NAME.to_string(),
            event_type: REVIEW_FORCED_RELEASE.to_string(),
            actor_id: None,
            amount: Some(review.contract_value.clone()),
            metadata: serde_json::json!({
                "contract_id": review.contract_id,
                "job_id": review.job_id,
                "review_ids": [review.id],
                "revealed_at": review.revealed_at.map(|t| t.to_rfc3339()),
                "pending_since": review.created_at.to_rfc3339(),
            }),
            reference_id: Some(review.contract_id.clone()),
        };

        self.deliver(event).await
    }

    async fn deliver(&self, event: AuditEvent) -> Result<SignedAuditEvent, ServiceError> {
        let signed = self.signer.sign(event);
        self.sink.deliver(&signed).await?;
        Ok(signed)
    }
}
