/// Gateway primary keys are integers.
pub type UserId = i64;

/// Job identifiers are unique within a user's scope.
pub type JobId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
