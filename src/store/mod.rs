//! Persistence seam for the attendance event log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::model::attendance::AttendanceEvent;

#[cfg(test)]
pub mod memory;
pub mod mysql;

pub use mysql::MySqlAttendanceStore;

pub type StoreResult<T> = Result<T, sqlx::Error>;

/// Selection and paging for event listings.
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    pub user_id: Option<String>,
    /// Restrict to LEAVE events that are not approved yet
    pub pending_leaves_only: bool,
    pub page: u32,
    pub per_page: u32,
}

impl EventQuery {
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.per_page)
    }
}

#[derive(Debug, Clone)]
pub struct EventPage {
    pub events: Vec<AttendanceEvent>,
    pub total: i64,
}

/// Storage operations the attendance service relies on.
///
/// Listings are ordered by `user_name` ascending (missing names first), then
/// by `time` descending.
#[async_trait]
pub trait AttendanceStore: Send + Sync + 'static {
    /// Most recent event ever recorded for the user.
    async fn latest_event(&self, user_id: &str) -> StoreResult<Option<AttendanceEvent>>;

    /// Events with `start <= time < end`, most recent first.
    async fn events_between(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<AttendanceEvent>>;

    /// Appends `event` only while the latest event of its user is still
    /// `expected_latest` (by id, `None` for an empty history). Returns whether
    /// the event was written.
    async fn append_event(
        &self,
        event: &AttendanceEvent,
        expected_latest: Option<&str>,
    ) -> StoreResult<bool>;

    async fn find_event(&self, id: &str) -> StoreResult<Option<AttendanceEvent>>;

    /// Returns the updated row, or `None` when no row has this id.
    async fn set_approval(&self, id: &str, approved: bool) -> StoreResult<Option<AttendanceEvent>>;

    async fn list_events(&self, query: &EventQuery) -> StoreResult<EventPage>;

    /// Every event of one user, oldest first.
    async fn user_history(&self, user_id: &str) -> StoreResult<Vec<AttendanceEvent>>;

    /// The open check-in of every user whose latest event is a check-in.
    async fn open_check_ins(&self) -> StoreResult<Vec<AttendanceEvent>>;
}
