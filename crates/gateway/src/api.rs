//! The gateway API surface the sync layer depends on.
//!
//! The dashboard poller and the transaction detail view only ever need
//! three read operations. They take the backend as `Arc<dyn JobsApi>`
//! so tests can drive them with an in-memory fake instead of a socket.

use async_trait::async_trait;
use tally_core::job::Job;
use tally_core::transaction::{TransactionFilter, TransactionRecord};
use tally_core::types::{JobId, UserId};

use crate::client::{GatewayClient, GatewayError};

/// Read operations against the gateway's job data.
#[async_trait]
pub trait JobsApi: Send + Sync {
    /// Full job list for a user (the poll-channel snapshot).
    async fn list_jobs(&self, user_id: UserId) -> Result<Vec<Job>, GatewayError>;

    /// One job's current status and counters.
    async fn get_job(&self, job_id: JobId) -> Result<Job, GatewayError>;

    /// One page of a job's transactions under a filter.
    async fn transactions_page(
        &self,
        job_id: JobId,
        page: u32,
        size: u32,
        filter: TransactionFilter,
    ) -> Result<Vec<TransactionRecord>, GatewayError>;
}

#[async_trait]
impl JobsApi for GatewayClient {
    async fn list_jobs(&self, user_id: UserId) -> Result<Vec<Job>, GatewayError> {
        GatewayClient::list_jobs(self, user_id).await
    }

    async fn get_job(&self, job_id: JobId) -> Result<Job, GatewayError> {
        GatewayClient::get_job(self, job_id).await
    }

    async fn transactions_page(
        &self,
        job_id: JobId,
        page: u32,
        size: u32,
        filter: TransactionFilter,
    ) -> Result<Vec<TransactionRecord>, GatewayError> {
        GatewayClient::transactions_page(self, job_id, page, size, filter).await
    }
}
