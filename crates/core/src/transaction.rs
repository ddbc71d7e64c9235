//! Transaction rows produced by a validation job, and the filter axis
//! of the detail view.

use serde::{Deserialize, Serialize};

use crate::job::Job;
use crate::types::{JobId, Timestamp};

/// One validated CSV row, as returned by the transactions endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: i64,
    pub job_id: JobId,
    /// Transaction identifier from the source CSV, opaque to the client.
    pub transaction_id: String,
    /// Account identifier from the source CSV (not a gateway user id).
    pub user_id: String,
    pub amount: f64,
    pub timestamp: Timestamp,
    pub is_valid: bool,
    pub is_suspicious: bool,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Filter applied to a job's transaction listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionFilter {
    #[default]
    All,
    Valid,
    Suspicious,
    Invalid,
}

impl TransactionFilter {
    /// Value for the `filter` query parameter; `All` sends none.
    pub fn as_query_param(self) -> Option<&'static str> {
        match self {
            TransactionFilter::All => None,
            TransactionFilter::Valid => Some("valid"),
            TransactionFilter::Suspicious => Some("suspicious"),
            TransactionFilter::Invalid => Some("invalid"),
        }
    }

    /// The job counter that totals the rows matching this filter.
    pub fn matching_total(self, job: &Job) -> u64 {
        match self {
            TransactionFilter::All => job.total_records,
            TransactionFilter::Valid => job.valid_records,
            TransactionFilter::Suspicious => job.suspicious_records,
            TransactionFilter::Invalid => job.invalid_records,
        }
    }
}

/// Error returned when parsing a filter name fails.
#[derive(Debug, thiserror::Error)]
#[error("Unknown transaction filter: {0}")]
pub struct ParseFilterError(String);

impl std::str::FromStr for TransactionFilter {
    type Err = ParseFilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(TransactionFilter::All),
            "valid" => Ok(TransactionFilter::Valid),
            "suspicious" => Ok(TransactionFilter::Suspicious),
            "invalid" => Ok(TransactionFilter::Invalid),
            other => Err(ParseFilterError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobStatus;

    fn job_with_counters() -> Job {
        Job {
            id: 1,
            status: JobStatus::Running,
            progress_percent: 40,
            processed_records: 400,
            total_records: 1000,
            valid_records: 900,
            invalid_records: 50,
            suspicious_records: 50,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn matching_total_selects_per_filter() {
        let job = job_with_counters();
        assert_eq!(TransactionFilter::All.matching_total(&job), 1000);
        assert_eq!(TransactionFilter::Valid.matching_total(&job), 900);
        assert_eq!(TransactionFilter::Suspicious.matching_total(&job), 50);
        assert_eq!(TransactionFilter::Invalid.matching_total(&job), 50);
    }

    #[test]
    fn query_param_omitted_for_all() {
        assert_eq!(TransactionFilter::All.as_query_param(), None);
        assert_eq!(TransactionFilter::Invalid.as_query_param(), Some("invalid"));
    }

    #[test]
    fn parse_filter_names() {
        assert_eq!("suspicious".parse::<TransactionFilter>().unwrap(), TransactionFilter::Suspicious);
        assert!("bogus".parse::<TransactionFilter>().is_err());
    }
}
