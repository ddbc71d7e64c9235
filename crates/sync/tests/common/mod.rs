//! Shared test backend for the poller and detail view tests.
//!
//! [`FakeJobsApi`] is a scripted in-memory gateway: the job list and
//! per-job status sequences are set up front, every call is counted,
//! and failures can be toggled per endpoint.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use tally_core::job::{Job, JobStatus};
use tally_core::transaction::{TransactionFilter, TransactionRecord};
use tally_core::types::{JobId, UserId};
use tally_gateway::{GatewayError, JobsApi};

/// One recorded `transactions_page` call.
#[derive(Debug, Clone, PartialEq)]
pub struct PageCall {
    pub job_id: JobId,
    pub page: u32,
    pub size: u32,
    pub filter: TransactionFilter,
}

/// Scripted in-memory gateway backend.
#[derive(Default)]
pub struct FakeJobsApi {
    pub list_calls: AtomicUsize,
    pub status_calls: AtomicUsize,
    pub fail_list: AtomicBool,
    pub fail_transactions: AtomicBool,
    jobs: Mutex<Vec<Job>>,
    statuses: Mutex<HashMap<JobId, VecDeque<Job>>>,
    items: Mutex<Vec<TransactionRecord>>,
    pub page_calls: Mutex<Vec<PageCall>>,
}

impl FakeJobsApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Set the job list returned by `list_jobs`.
    pub fn set_jobs(&self, jobs: Vec<Job>) {
        *self.jobs.lock().unwrap() = jobs;
    }

    /// Queue a `get_job` response for the job's id. The final queued
    /// response repeats once the queue is otherwise drained.
    pub fn script_status(&self, job: Job) {
        self.statuses
            .lock()
            .unwrap()
            .entry(job.id)
            .or_default()
            .push_back(job);
    }

    /// Set the rows returned by `transactions_page`.
    pub fn set_items(&self, items: Vec<TransactionRecord>) {
        *self.items.lock().unwrap() = items;
    }

    pub fn page_calls(&self) -> Vec<PageCall> {
        self.page_calls.lock().unwrap().clone()
    }
}

fn scripted_failure() -> GatewayError {
    GatewayError::Api {
        status: 500,
        detail: "scripted failure".to_string(),
    }
}

#[async_trait]
impl JobsApi for FakeJobsApi {
    async fn list_jobs(&self, _user_id: UserId) -> Result<Vec<Job>, GatewayError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(scripted_failure());
        }
        Ok(self.jobs.lock().unwrap().clone())
    }

    async fn get_job(&self, job_id: JobId) -> Result<Job, GatewayError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let mut statuses = self.statuses.lock().unwrap();
        let queue = statuses.get_mut(&job_id).ok_or_else(scripted_failure)?;
        match queue.len() {
            0 => Err(scripted_failure()),
            1 => Ok(queue.front().cloned().expect("non-empty queue")),
            _ => Ok(queue.pop_front().expect("non-empty queue")),
        }
    }

    async fn transactions_page(
        &self,
        job_id: JobId,
        page: u32,
        size: u32,
        filter: TransactionFilter,
    ) -> Result<Vec<TransactionRecord>, GatewayError> {
        self.page_calls.lock().unwrap().push(PageCall {
            job_id,
            page,
            size,
            filter,
        });
        if self.fail_transactions.load(Ordering::SeqCst) {
            return Err(scripted_failure());
        }
        Ok(self.items.lock().unwrap().clone())
    }
}

/// Build a job with the given id/status/progress and fixed counters.
pub fn job(id: JobId, status: JobStatus, progress_percent: u8) -> Job {
    Job {
        id,
        status,
        progress_percent,
        processed_records: u64::from(progress_percent) * 10,
        total_records: 1000,
        valid_records: 900,
        invalid_records: 50,
        suspicious_records: 50,
        created_at: chrono::Utc::now(),
    }
}

/// Build one transaction row belonging to `job_id`.
pub fn row(job_id: JobId, id: i64) -> TransactionRecord {
    TransactionRecord {
        id,
        job_id,
        transaction_id: format!("TX-{id:05}"),
        user_id: "ACC-1".to_string(),
        amount: 125.0,
        timestamp: chrono::Utc::now(),
        is_valid: true,
        is_suspicious: false,
        error_message: None,
    }
}
