use std::cmp::Ordering;
use std::sync::{Mutex, RwLock};

use actix_web::rt::task::yield_now;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{AttendanceStore, EventPage, EventQuery, StoreResult};
use crate::model::attendance::{AttendanceEvent, EventType};

/// In-process store mirroring the MySQL ordering rules.
///
/// Reads yield to the executor before answering so concurrent callers
/// interleave the way they would against a real database.
#[derive(Default)]
pub struct MemoryAttendanceStore {
    events: RwLock<Vec<AttendanceEvent>>,
    /// Written right before the next append, as another instance would
    interloper: Mutex<Option<AttendanceEvent>>,
}

impl MemoryAttendanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.read().expect("event log poisoned").len()
    }

    /// Makes the next `append_event` find `event` already stored.
    pub fn insert_before_next_append(&self, event: AttendanceEvent) {
        *self.interloper.lock().expect("interloper poisoned") = Some(event);
    }

    fn snapshot(&self) -> Vec<AttendanceEvent> {
        self.events.read().expect("event log poisoned").clone()
    }
}

fn by_time_desc(a: &AttendanceEvent, b: &AttendanceEvent) -> Ordering {
    b.time.cmp(&a.time)
}

fn by_name_then_time_desc(a: &AttendanceEvent, b: &AttendanceEvent) -> Ordering {
    a.user_name.cmp(&b.user_name).then_with(|| by_time_desc(a, b))
}

#[async_trait]
impl AttendanceStore for MemoryAttendanceStore {
    async fn latest_event(&self, user_id: &str) -> StoreResult<Option<AttendanceEvent>> {
        yield_now().await;
        Ok(self
            .snapshot()
            .into_iter()
            .filter(|e| e.user_id == user_id)
            .max_by_key(|e| e.time))
    }

    async fn events_between(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<AttendanceEvent>> {
        yield_now().await;
        let mut events: Vec<_> = self
            .snapshot()
            .into_iter()
            .filter(|e| e.user_id == user_id && e.time >= start && e.time < end)
            .collect();
        events.sort_by(by_time_desc);
        Ok(events)
    }

    async fn append_event(
        &self,
        event: &AttendanceEvent,
        expected_latest: Option<&str>,
    ) -> StoreResult<bool> {
        let mut events = self.events.write().expect("event log poisoned");
        if let Some(other) = self.interloper.lock().expect("interloper poisoned").take() {
            events.push(other);
        }

        let latest = events
            .iter()
            .filter(|e| e.user_id == event.user_id)
            .max_by_key(|e| e.time)
            .map(|e| e.id.as_str());
        if latest != expected_latest {
            return Ok(false);
        }

        events.push(event.clone());
        Ok(true)
    }

    async fn find_event(&self, id: &str) -> StoreResult<Option<AttendanceEvent>> {
        Ok(self.snapshot().into_iter().find(|e| e.id == id))
    }

    async fn set_approval(&self, id: &str, approved: bool) -> StoreResult<Option<AttendanceEvent>> {
        let mut events = self.events.write().expect("event log poisoned");
        Ok(events.iter_mut().find(|e| e.id == id).map(|e| {
            e.is_approved = approved;
            e.clone()
        }))
    }

    async fn list_events(&self, query: &EventQuery) -> StoreResult<EventPage> {
        let mut events: Vec<_> = self
            .snapshot()
            .into_iter()
            .filter(|e| query.user_id.as_deref().is_none_or(|u| e.user_id == u))
            .filter(|e| {
                !query.pending_leaves_only || (e.event_type == EventType::Leave && !e.is_approved)
            })
            .collect();
        events.sort_by(by_name_then_time_desc);

        let total = events.len() as i64;
        let events = events
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.per_page as usize)
            .collect();

        Ok(EventPage { events, total })
    }

    async fn user_history(&self, user_id: &str) -> StoreResult<Vec<AttendanceEvent>> {
        let mut events: Vec<_> = self
            .snapshot()
            .into_iter()
            .filter(|e| e.user_id == user_id)
            .collect();
        events.sort_by_key(|e| e.time);
        Ok(events)
    }

    async fn open_check_ins(&self) -> StoreResult<Vec<AttendanceEvent>> {
        let events = self.snapshot();
        let mut open: Vec<AttendanceEvent> = Vec::new();

        for event in &events {
            let latest = events
                .iter()
                .filter(|e| e.user_id == event.user_id)
                .max_by_key(|e| e.time);
            if latest.map(|l| l.id == event.id).unwrap_or(false) && event.is_open_check_in() {
                open.push(event.clone());
            }
        }

        open.sort_by(by_name_then_time_desc);
        Ok(open)
    }
}
