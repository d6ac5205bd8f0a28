// service/job_service_client.rs
use std::time::Duration;

use async_trait::async_trait;

use crate::{models::reputationmodel::ClientHiringStats, service::error::ServiceError};

/// Read-only view of the job/contract service.
#[async_trait]
pub trait ClientStatsProvider: Send + Sync {
    async fn client_hiring_stats(&self, client_id: &str) -> Result<ClientHiringStats, ServiceError>;
}

#[derive(Debug, Clone)]
pub struct JobServiceClient {
    client: reqwest::Client,
    base_url: String,
}

impl JobServiceClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ClientStatsProvider for JobServiceClient {
    async fn client_hiring_stats(&self, client_id: &str) -> Result<ClientHiringStats, ServiceError> {
        let url = format!(
            "{}/api/contracts/clients/{}/stats",
            self.base_url,
            urlencoding::encode(client_id)
        );

        let stats = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<ClientHiringStats>()
            .await?;

        Ok(stats)
    }
}

/// Stand-in when `JOB_SERVICE_URL` is not set; every reputation read is
/// served degraded.
#[derive(Debug, Clone, Default)]
pub struct UnconfiguredJobService;

#[async_trait]
impl ClientStatsProvider for UnconfiguredJobService {
    async fn client_hiring_stats(&self, _client_id: &str) -> Result<ClientHiringStats, ServiceError> {
        Err(ServiceError::Upstream("job service is not configured".to_string()))
    }
}
