//! Paginated, filtered transaction detail for a single job.
//!
//! [`TransactionPageView`] owns the pagination and filter state for one
//! job's transaction listing plus a short-lived status poll that runs
//! only while the job is RUNNING. The poll stop is edge-triggered: the
//! first non-RUNNING observation causes exactly one final page re-fetch
//! and then latches the poll off for that job for the lifetime of the
//! view. Switching the view to a different job re-arms it.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;

use tally_core::job::Job;
use tally_core::pagination;
use tally_core::transaction::{TransactionFilter, TransactionRecord};
use tally_core::types::JobId;
use tally_gateway::{GatewayError, JobsApi};

use crate::events::SyncEvent;

/// Default page size for the transaction listing.
const DEFAULT_PAGE_SIZE: u32 = 20;

/// Pagination/filter state and fetched data for one job's detail.
struct DetailState {
    job_id: JobId,
    filter: TransactionFilter,
    /// 1-based.
    page: u32,
    page_size: u32,
    /// Latest fetched status/counters for the viewed job.
    job: Option<Job>,
    /// The current page's rows.
    items: Vec<TransactionRecord>,
    /// User-visible error from the most recent failed fetch; a failure
    /// never clears previously fetched rows.
    last_error: Option<String>,
    /// Jobs for which the status poll has observed a terminal status;
    /// polling never resumes for these within this view instance.
    poll_stopped: HashSet<JobId>,
}

/// Shared core of the view: state plus the fetch plumbing the poll task
/// needs after the view handle itself is borrowed elsewhere.
struct DetailInner {
    api: Arc<dyn JobsApi>,
    poll_interval: Duration,
    events: broadcast::Sender<SyncEvent>,
    state: RwLock<DetailState>,
}

/// Transaction detail view for one job.
pub struct TransactionPageView {
    inner: Arc<DetailInner>,
    poll_task: Mutex<Option<(JobId, tokio::task::JoinHandle<()>)>>,
    cancel: CancellationToken,
}

impl TransactionPageView {
    pub fn new(
        api: Arc<dyn JobsApi>,
        job_id: JobId,
        events: broadcast::Sender<SyncEvent>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(DetailInner {
                api,
                poll_interval,
                events,
                state: RwLock::new(DetailState {
                    job_id,
                    filter: TransactionFilter::All,
                    page: 1,
                    page_size: DEFAULT_PAGE_SIZE,
                    job: None,
                    items: Vec::new(),
                    last_error: None,
                    poll_stopped: HashSet::new(),
                }),
            }),
            poll_task: Mutex::new(None),
            cancel: CancellationToken::new(),
        }
    }

    /// Create the view, perform the initial fetch, and start the status
    /// poll when the job turns out to be running.
    pub async fn open(
        api: Arc<dyn JobsApi>,
        job_id: JobId,
        events: broadcast::Sender<SyncEvent>,
        poll_interval: Duration,
    ) -> Self {
        let view = Self::new(api, job_id, events, poll_interval);
        // A failed initial fetch is already recorded as last_error.
        let _ = view.refresh().await;
        view.ensure_status_poll().await;
        view
    }

    // ---- state accessors ----

    pub fn job_id(&self) -> JobId {
        self.inner.read_state().job_id
    }

    pub fn filter(&self) -> TransactionFilter {
        self.inner.read_state().filter
    }

    pub fn page(&self) -> u32 {
        self.inner.read_state().page
    }

    pub fn page_size(&self) -> u32 {
        self.inner.read_state().page_size
    }

    /// Latest fetched status/counters for the viewed job.
    pub fn job(&self) -> Option<Job> {
        self.inner.read_state().job.clone()
    }

    /// The current page's rows.
    pub fn items(&self) -> Vec<TransactionRecord> {
        self.inner.read_state().items.clone()
    }

    /// Message from the most recent failed fetch, if any.
    pub fn last_error(&self) -> Option<String> {
        self.inner.read_state().last_error.clone()
    }

    /// Rows matching the current filter, from the job's counters.
    pub fn total_count(&self) -> u64 {
        let state = self.inner.read_state();
        state
            .job
            .as_ref()
            .map(|job| state.filter.matching_total(job))
            .unwrap_or(0)
    }

    pub fn total_pages(&self) -> u32 {
        let page_size = self.inner.read_state().page_size;
        pagination::total_pages(self.total_count(), page_size)
    }

    /// Page numbers to render in the navigation window.
    pub fn page_window(&self) -> Vec<u32> {
        let page = self.inner.read_state().page;
        pagination::page_window(page, self.total_pages())
    }

    // ---- mutations ----

    /// Change the filter. Resets the page to 1 synchronously with the
    /// change, before the re-fetch is issued, so filter and page can
    /// never race.
    pub async fn set_filter(&self, filter: TransactionFilter) -> Result<(), GatewayError> {
        {
            let mut state = self.inner.write_state();
            if state.filter == filter {
                return Ok(());
            }
            state.filter = filter;
            state.page = 1;
        }
        self.inner.refresh().await
    }

    pub async fn set_page(&self, page: u32) -> Result<(), GatewayError> {
        let page = page.max(1);
        {
            let mut state = self.inner.write_state();
            if state.page == page {
                return Ok(());
            }
            state.page = page;
        }
        self.inner.refresh().await
    }

    pub async fn set_page_size(&self, page_size: u32) -> Result<(), GatewayError> {
        let page_size = page_size.max(1);
        {
            let mut state = self.inner.write_state();
            if state.page_size == page_size {
                return Ok(());
            }
            state.page_size = page_size;
        }
        self.inner.refresh().await
    }

    /// Point the view at a different job.
    ///
    /// Clears fetched data (rows of the old job never show under the
    /// new one), resets the page, and re-arms the status poll. The
    /// edge-trigger latch is per job, so returning to a job whose
    /// terminal status was already observed stays stopped.
    pub async fn set_job(&self, job_id: JobId) -> Result<(), GatewayError> {
        {
            let mut state = self.inner.write_state();
            if state.job_id == job_id {
                return Ok(());
            }
            state.job_id = job_id;
            state.page = 1;
            state.job = None;
            state.items.clear();
            state.last_error = None;
        }
        let result = self.inner.refresh().await;
        self.ensure_status_poll().await;
        result
    }

    /// Re-fetch the job's counters and the current transaction page.
    pub async fn refresh(&self) -> Result<(), GatewayError> {
        self.inner.refresh().await
    }

    /// Start the 3-second status poll when the viewed job is RUNNING.
    ///
    /// A no-op when the job is not running, when a poll for this job is
    /// already live, or when the poll has latched off after observing a
    /// terminal status for this job.
    pub async fn ensure_status_poll(&self) {
        let job_id = {
            let state = self.inner.read_state();
            let running = state
                .job
                .as_ref()
                .map(|job| job.status.is_running())
                .unwrap_or(false);
            if !running || state.poll_stopped.contains(&state.job_id) {
                return;
            }
            state.job_id
        };

        let mut slot = self.poll_task.lock().await;
        if let Some((task_job, handle)) = slot.as_ref() {
            if !handle.is_finished() {
                if *task_job == job_id {
                    return;
                }
                // Stale poll for a previously viewed job; replace it.
                handle.abort();
            }
        }
        let inner = Arc::clone(&self.inner);
        let cancel = self.cancel.clone();
        *slot = Some((
            job_id,
            tokio::spawn(async move {
                inner.run_status_poll(job_id, cancel).await;
            }),
        ));
    }

    /// Tear the view down, cancelling any live status poll.
    pub async fn close(&self) {
        self.cancel.cancel();
        if let Some((_, handle)) = self.poll_task.lock().await.take() {
            let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
        }
    }
}

impl DetailInner {
    fn read_state(&self) -> RwLockReadGuard<'_, DetailState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, DetailState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch the job's counters and one transaction page, then commit
    /// both in a single state update.
    async fn refresh(&self) -> Result<(), GatewayError> {
        let (job_id, filter, page, page_size) = {
            let state = self.read_state();
            (state.job_id, state.filter, state.page, state.page_size)
        };

        let fetched = self.fetch(job_id, filter, page, page_size).await;
        match fetched {
            Ok((job, items)) => {
                let mut state = self.write_state();
                // Commit only if the view has not moved on mid-flight.
                if state.job_id == job_id
                    && state.filter == filter
                    && state.page == page
                    && state.page_size == page_size
                {
                    state.job = Some(job);
                    state.items = items;
                    state.last_error = None;
                }
                Ok(())
            }
            Err(e) => {
                self.write_state().last_error = Some(e.to_string());
                let _ = self.events.send(SyncEvent::DetailFetchFailed {
                    job_id,
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn fetch(
        &self,
        job_id: JobId,
        filter: TransactionFilter,
        page: u32,
        page_size: u32,
    ) -> Result<(Job, Vec<TransactionRecord>), GatewayError> {
        let job = self.api.get_job(job_id).await?;
        let items = self
            .api
            .transactions_page(job_id, page, page_size, filter)
            .await?;
        Ok((job, items))
    }

    /// Status-only poll loop; exits on terminal status, job switch, or
    /// cancellation.
    async fn run_status_poll(self: Arc<Self>, job_id: JobId, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }

            {
                let state = self.read_state();
                if state.job_id != job_id || state.poll_stopped.contains(&job_id) {
                    return;
                }
            }

            match self.api.get_job(job_id).await {
                Ok(job) => {
                    let running = job.status.is_running();
                    {
                        let mut state = self.write_state();
                        if state.job_id == job_id {
                            state.job = Some(job);
                        }
                    }
                    if !running {
                        // Latch first so no new poll can start, then do
                        // the single final page re-fetch.
                        self.write_state().poll_stopped.insert(job_id);
                        tracing::debug!(job_id, "Terminal status observed; detail poll stops");
                        let _ = self.refresh().await;
                        return;
                    }
                }
                Err(e) => {
                    tracing::warn!(job_id, error = %e, "Detail status poll failed");
                    let _ = self.events.send(SyncEvent::DetailFetchFailed {
                        job_id,
                        error: e.to_string(),
                    });
                }
            }
        }
    }
}
