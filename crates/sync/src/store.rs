//! Canonical job list for one user, reconciled from both update sources.
//!
//! Push events merge field-by-field into existing entries; poll
//! snapshots replace the whole list when they differ structurally. The
//! snapshot always wins over event-derived state: the protocol carries
//! no sequence numbers, so the last full refresh is authoritative even
//! when a push event was fresher in wall-clock terms.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tally_core::job::{Job, JobStatus};
use tally_core::types::{JobId, Timestamp};

use crate::messages::ProgressEvent;

/// Ordered job list with uniqueness by id.
///
/// Order invariant: an update never moves an existing entry; entries
/// first seen via a push event are inserted at the head.
#[derive(Debug, Default)]
pub struct JobStateStore {
    jobs: Vec<Job>,
}

impl JobStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current job list, head first.
    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn get(&self, job_id: JobId) -> Option<&Job> {
        self.jobs.iter().find(|job| job.id == job_id)
    }

    /// Whether any job is still producing progress.
    pub fn any_running(&self) -> bool {
        self.jobs.iter().any(|job| job.status.is_running())
    }

    /// Merge a push event into the list.
    ///
    /// Known ids are updated in place, only the fields present in the
    /// event, position and `created_at` untouched. Unknown ids become a
    /// new entry at the head with missing fields defaulted and
    /// `created_at` set to `observed_at`. Returns whether the store
    /// changed.
    pub fn apply_progress_event(&mut self, event: &ProgressEvent, observed_at: Timestamp) -> bool {
        if let Some(job) = self.jobs.iter_mut().find(|job| job.id == event.job_id) {
            let mut changed = false;
            if let Some(status) = event.status {
                changed |= job.status != status;
                job.status = status;
            }
            if let Some(progress_percent) = event.progress_percent {
                changed |= job.progress_percent != progress_percent;
                job.progress_percent = progress_percent;
            }
            if let Some(processed_records) = event.processed_records {
                changed |= job.processed_records != processed_records;
                job.processed_records = processed_records;
            }
            if let Some(total_records) = event.total_records {
                changed |= job.total_records != total_records;
                job.total_records = total_records;
            }
            if let Some(valid_records) = event.valid_records {
                changed |= job.valid_records != valid_records;
                job.valid_records = valid_records;
            }
            if let Some(invalid_records) = event.invalid_records {
                changed |= job.invalid_records != invalid_records;
                job.invalid_records = invalid_records;
            }
            if let Some(suspicious_records) = event.suspicious_records {
                changed |= job.suspicious_records != suspicious_records;
                job.suspicious_records = suspicious_records;
            }
            changed
        } else {
            tracing::debug!(job_id = event.job_id, "First observation of job via push event");
            self.jobs.insert(
                0,
                Job {
                    id: event.job_id,
                    status: event.status.unwrap_or(JobStatus::Pending),
                    progress_percent: event.progress_percent.unwrap_or(0),
                    processed_records: event.processed_records.unwrap_or(0),
                    total_records: event.total_records.unwrap_or(0),
                    valid_records: event.valid_records.unwrap_or(0),
                    invalid_records: event.invalid_records.unwrap_or(0),
                    suspicious_records: event.suspicious_records.unwrap_or(0),
                    created_at: observed_at,
                },
            );
            true
        }
    }

    /// Reconcile a poll snapshot.
    ///
    /// Replaces the whole list when the snapshot differs structurally;
    /// leaves state (and therefore downstream notifications) untouched
    /// when it is equal. Returns whether a replacement happened.
    pub fn apply_snapshot(&mut self, snapshot: Vec<Job>) -> bool {
        if self.jobs == snapshot {
            return false;
        }
        self.jobs = snapshot;
        true
    }
}

/// Store handle shared between the dispatcher, the poller, and views.
pub type SharedJobStore = Arc<RwLock<JobStateStore>>;

pub fn new_shared() -> SharedJobStore {
    Arc::new(RwLock::new(JobStateStore::new()))
}

/// Lock the store for reading, recovering from poisoning.
pub fn read(store: &SharedJobStore) -> RwLockReadGuard<'_, JobStateStore> {
    store.read().unwrap_or_else(PoisonError::into_inner)
}

/// Lock the store for writing, recovering from poisoning.
pub fn write(store: &SharedJobStore) -> RwLockWriteGuard<'_, JobStateStore> {
    store.write().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(job_id: JobId) -> ProgressEvent {
        ProgressEvent {
            job_id,
            user_id: Some(1),
            status: Some(JobStatus::Running),
            progress_percent: Some(40),
            processed_records: Some(400),
            total_records: Some(1000),
            valid_records: Some(900),
            invalid_records: Some(50),
            suspicious_records: Some(50),
            batch_completed: None,
            total_batches: None,
        }
    }

    fn now() -> Timestamp {
        chrono::Utc::now()
    }

    #[test]
    fn first_event_inserts_at_head() {
        let mut store = JobStateStore::new();
        assert!(store.apply_progress_event(&event(1), now()));
        assert!(store.apply_progress_event(&event(2), now()));

        let ids: Vec<_> = store.jobs().iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn one_entry_per_id_across_both_sources() {
        let mut store = JobStateStore::new();
        store.apply_progress_event(&event(1), now());
        store.apply_snapshot(vec![
            Job {
                id: 1,
                status: JobStatus::Running,
                progress_percent: 45,
                processed_records: 450,
                total_records: 1000,
                valid_records: 900,
                invalid_records: 50,
                suspicious_records: 50,
                created_at: now(),
            },
            Job {
                id: 2,
                status: JobStatus::Pending,
                progress_percent: 0,
                processed_records: 0,
                total_records: 0,
                valid_records: 0,
                invalid_records: 0,
                suspicious_records: 0,
                created_at: now(),
            },
        ]);
        store.apply_progress_event(&event(2), now());
        store.apply_progress_event(&event(1), now());

        let mut ids: Vec<_> = store.jobs().iter().map(|j| j.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), store.jobs().len());
    }

    #[test]
    fn repeated_event_is_idempotent_and_keeps_position() {
        let mut store = JobStateStore::new();
        store.apply_progress_event(&event(1), now());
        store.apply_progress_event(&event(2), now());

        let before: Vec<_> = store.jobs().to_vec();
        // Same payload again: no state change, no movement.
        assert!(!store.apply_progress_event(&event(1), now()));
        assert_eq!(store.jobs(), &before[..]);
        assert_eq!(store.jobs()[1].id, 1);
    }

    #[test]
    fn update_changes_only_present_fields() {
        let mut store = JobStateStore::new();
        store.apply_progress_event(&event(1), now());
        let created_at = store.get(1).unwrap().created_at;

        let partial = ProgressEvent {
            job_id: 1,
            user_id: None,
            status: None,
            progress_percent: Some(55),
            processed_records: Some(550),
            total_records: None,
            valid_records: None,
            invalid_records: None,
            suspicious_records: None,
            batch_completed: None,
            total_batches: None,
        };
        assert!(store.apply_progress_event(&partial, now()));

        let job = store.get(1).unwrap();
        assert_eq!(job.progress_percent, 55);
        assert_eq!(job.processed_records, 550);
        assert_eq!(job.total_records, 1000);
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.created_at, created_at);
    }

    #[test]
    fn event_then_snapshot_scenario() {
        // Job with total=1000, valid=900, suspicious=50, invalid=50,
        // RUNNING at 40%; an event advances it to 55%/550; a snapshot
        // then reports it COMPLETED at 100% and fully replaces.
        let mut store = JobStateStore::new();
        store.apply_progress_event(&event(1), now());

        let advance = ProgressEvent {
            progress_percent: Some(55),
            processed_records: Some(550),
            status: None,
            total_records: None,
            valid_records: None,
            invalid_records: None,
            suspicious_records: None,
            user_id: None,
            batch_completed: None,
            total_batches: None,
            job_id: 1,
        };
        store.apply_progress_event(&advance, now());
        assert_eq!(store.get(1).unwrap().progress_percent, 55);
        assert_eq!(store.get(1).unwrap().total_records, 1000);
        assert_eq!(store.jobs()[0].id, 1);

        let completed = Job {
            id: 1,
            status: JobStatus::Completed,
            progress_percent: 100,
            processed_records: 1000,
            total_records: 1000,
            valid_records: 900,
            invalid_records: 50,
            suspicious_records: 50,
            created_at: now(),
        };
        assert!(store.apply_snapshot(vec![completed.clone()]));
        assert_eq!(store.jobs(), &[completed][..]);
    }

    #[test]
    fn equal_snapshot_is_a_noop() {
        let mut store = JobStateStore::new();
        let job = Job {
            id: 1,
            status: JobStatus::Completed,
            progress_percent: 100,
            processed_records: 10,
            total_records: 10,
            valid_records: 10,
            invalid_records: 0,
            suspicious_records: 0,
            created_at: now(),
        };
        assert!(store.apply_snapshot(vec![job.clone()]));
        assert!(!store.apply_snapshot(vec![job]));
    }

    #[test]
    fn stale_snapshot_overwrites_fresher_event_state() {
        // Documented last-full-refresh-wins model: a poll that has not
        // caught up regresses push-derived progress.
        let mut store = JobStateStore::new();
        store.apply_progress_event(&event(1), now());

        let stale = Job {
            id: 1,
            status: JobStatus::Running,
            progress_percent: 20,
            processed_records: 200,
            total_records: 1000,
            valid_records: 900,
            invalid_records: 50,
            suspicious_records: 50,
            created_at: now(),
        };
        assert!(store.apply_snapshot(vec![stale]));
        assert_eq!(store.get(1).unwrap().progress_percent, 20);
    }

    #[test]
    fn any_running_tracks_status() {
        let mut store = JobStateStore::new();
        assert!(!store.any_running());
        store.apply_progress_event(&event(1), now());
        assert!(store.any_running());

        let done = ProgressEvent {
            job_id: 1,
            status: Some(JobStatus::Completed),
            ..event(1)
        };
        store.apply_progress_event(&done, now());
        assert!(!store.any_running());
    }

    #[test]
    fn event_with_missing_fields_defaults_new_job() {
        let mut store = JobStateStore::new();
        let bare = ProgressEvent {
            job_id: 5,
            user_id: None,
            status: None,
            progress_percent: None,
            processed_records: None,
            total_records: None,
            valid_records: None,
            invalid_records: None,
            suspicious_records: None,
            batch_completed: None,
            total_batches: None,
        };
        store.apply_progress_event(&bare, now());

        let job = store.get(5).unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.total_records, 0);
        assert_eq!(job.progress_percent, 0);
    }
}
