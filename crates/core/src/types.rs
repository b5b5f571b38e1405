/// Identifies one accepted command's run. UUIDv7, so ids sort by start time.
pub type RunId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Allocate a fresh, time-ordered run id.
pub fn new_run_id() -> RunId {
    uuid::Uuid::now_v7()
}
