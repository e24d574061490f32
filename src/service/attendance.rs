use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, SubsecRound, Utc};
use serde::Serialize;
use strum_macros::{Display, EnumString};
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use super::day_window::DayWindow;
use crate::error::AttendanceError;
use crate::model::attendance::{
    AttendanceEvent, AttendanceStatus, DEFAULT_LEAVE_REMARKS, EventType,
};
use crate::store::{AttendanceStore, EventPage, EventQuery};
use crate::utils::user_locks::UserLocks;

/// How the current status of a user is derived from the event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum StatusPolicy {
    /// Only events of the current local calendar day count
    DayWindow,
    /// The single most recent event ever recorded decides
    LatestEvent,
}

#[derive(Debug, Clone)]
pub struct AttendanceSettings {
    pub utc_offset: FixedOffset,
    pub status_policy: StatusPolicy,
    /// Whether an approved leave may later be rejected
    pub allow_leave_revoke: bool,
}

#[derive(Debug, Clone)]
pub struct RecordEvent {
    pub user_id: String,
    pub user_name: Option<String>,
    pub event_type: String,
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Rejection {
    #[strum(serialize = "User already checked in")]
    AlreadyCheckedIn,
    #[strum(serialize = "No active check-in found to check out from")]
    NoActiveCheckIn,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    Recorded {
        event: AttendanceEvent,
        /// Time of the check-in a checkout closed
        check_in_time: Option<DateTime<Utc>>,
    },
    Rejected {
        rejection: Rejection,
        /// Time of the existing open check-in, when there is one
        time: Option<DateTime<Utc>>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[schema(example = json!({
    "user_id": "usr_01HZX3",
    "status": "ABSENT",
    "last_action_time": "2026-01-05T12:30:00Z",
    "first_check_in": "2026-01-05T03:30:00Z",
    "last_check_out": "2026-01-05T12:30:00Z",
    "remarks": null
}))]
pub struct StatusReport {
    pub user_id: String,
    pub status: AttendanceStatus,
    #[schema(format = "date-time", value_type = Option<String>)]
    pub last_action_time: Option<DateTime<Utc>>,
    #[schema(format = "date-time", value_type = Option<String>)]
    pub first_check_in: Option<DateTime<Utc>>,
    #[schema(format = "date-time", value_type = Option<String>)]
    pub last_check_out: Option<DateTime<Utc>>,
    pub remarks: Option<String>,
}

impl StatusReport {
    fn absent(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            status: AttendanceStatus::Absent,
            last_action_time: None,
            first_check_in: None,
            last_check_out: None,
            remarks: None,
        }
    }
}

/// Status for one day from that day's events, most recent first.
pub fn derive_day_status(user_id: &str, events: &[AttendanceEvent]) -> StatusReport {
    let Some(latest) = events.first() else {
        return StatusReport::absent(user_id);
    };

    let first_check_in = events
        .iter()
        .filter(|e| e.event_type == EventType::Checkin)
        .map(|e| e.time)
        .min();

    let mut report = StatusReport::absent(user_id);
    report.last_action_time = Some(latest.time);

    match latest.event_type {
        EventType::Leave => {
            report.status = AttendanceStatus::Leave;
            report.remarks = latest.remarks.clone();
        }
        EventType::Checkin => {
            report.status = AttendanceStatus::Present;
            report.first_check_in = first_check_in;
        }
        EventType::Checkout => {
            report.first_check_in = first_check_in;
            report.last_check_out = Some(latest.time);
        }
    }

    report
}

/// Status from the most recent event regardless of its day.
pub fn derive_latest_status(user_id: &str, latest: Option<&AttendanceEvent>) -> StatusReport {
    let mut report = StatusReport::absent(user_id);
    let Some(latest) = latest else {
        return report;
    };

    report.last_action_time = Some(latest.time);
    match latest.event_type {
        EventType::Checkin => report.status = AttendanceStatus::Present,
        EventType::Leave => {
            report.status = AttendanceStatus::Leave;
            report.remarks = latest.remarks.clone();
        }
        EventType::Checkout => {}
    }

    report
}

/// Longest `user_id` the `VARCHAR(191)` column holds.
pub const MAX_USER_ID_CHARS: usize = 191;
pub const MAX_USER_NAME_CHARS: usize = 255;
/// `TEXT` limit, counted in bytes.
pub const MAX_REMARKS_BYTES: usize = 65_535;

/// Attempts at appending before giving up on a user whose log keeps moving.
const MAX_APPEND_ATTEMPTS: usize = 3;

fn required_user_id(user_id: &str) -> Result<&str, AttendanceError> {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        return Err(AttendanceError::MissingUserId);
    }
    if user_id.chars().count() > MAX_USER_ID_CHARS {
        return Err(AttendanceError::FieldTooLong {
            field: "userId",
            max: MAX_USER_ID_CHARS,
        });
    }
    Ok(user_id)
}

fn check_record_lengths(req: &RecordEvent) -> Result<(), AttendanceError> {
    if req
        .user_name
        .as_deref()
        .is_some_and(|n| n.chars().count() > MAX_USER_NAME_CHARS)
    {
        return Err(AttendanceError::FieldTooLong {
            field: "userName",
            max: MAX_USER_NAME_CHARS,
        });
    }
    if req.remarks.as_deref().is_some_and(|r| r.len() > MAX_REMARKS_BYTES) {
        return Err(AttendanceError::FieldTooLong {
            field: "remarks",
            max: MAX_REMARKS_BYTES,
        });
    }
    Ok(())
}

/// Time for a new event: `now` at the stored microsecond precision, moved
/// just past the user's latest event when the clock has not passed it.
fn next_event_time(now: DateTime<Utc>, latest: Option<&AttendanceEvent>) -> DateTime<Utc> {
    let now = now.trunc_subsecs(6);
    match latest {
        Some(latest) if latest.time >= now => latest.time + Duration::microseconds(1),
        _ => now,
    }
}

pub struct AttendanceService {
    store: Arc<dyn AttendanceStore>,
    locks: UserLocks,
    settings: AttendanceSettings,
}

impl AttendanceService {
    pub fn new(store: Arc<dyn AttendanceStore>, settings: AttendanceSettings) -> Self {
        Self {
            store,
            locks: UserLocks::default(),
            settings,
        }
    }

    pub async fn record_event(&self, req: RecordEvent) -> Result<RecordOutcome, AttendanceError> {
        self.record_event_with(req, Utc::now).await
    }

    /// Records an event as if the clock read `now` once the user's lock is held.
    #[cfg(test)]
    pub async fn record_event_at(
        &self,
        req: RecordEvent,
        now: DateTime<Utc>,
    ) -> Result<RecordOutcome, AttendanceError> {
        self.record_event_with(req, move || now).await
    }

    /// Applies the transition rules for one event.
    ///
    /// The user's lock is held across reading the latest event, stamping the
    /// new one and appending it, so stored times follow the order in which
    /// events were accepted and at most one check-in is open per user. The
    /// append itself only succeeds while the latest event is still the one
    /// that was read; otherwise the decision is taken again.
    #[instrument(name = "record_event", skip(self, req, clock), fields(user_id = %req.user_id, event_type = %req.event_type))]
    async fn record_event_with<C>(
        &self,
        req: RecordEvent,
        clock: C,
    ) -> Result<RecordOutcome, AttendanceError>
    where
        C: Fn() -> DateTime<Utc>,
    {
        let user_id = required_user_id(&req.user_id)?;
        let event_type = req
            .event_type
            .trim()
            .parse::<EventType>()
            .map_err(|_| AttendanceError::UnknownEventType(req.event_type.clone()))?;
        check_record_lengths(&req)?;

        let remarks = (event_type == EventType::Leave).then(|| {
            req.remarks
                .clone()
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_LEAVE_REMARKS.to_string())
        });

        let lock = self.locks.for_user(user_id).await;
        let _guard = lock.lock().await;

        for attempt in 1..=MAX_APPEND_ATTEMPTS {
            let latest = self.store.latest_event(user_id).await?;
            let open_check_in = latest
                .as_ref()
                .filter(|e| e.is_open_check_in())
                .map(|e| e.time);

            match (event_type, open_check_in) {
                (EventType::Checkin, Some(open)) => {
                    debug!(open_since = %open, "Check-in rejected");
                    return Ok(RecordOutcome::Rejected {
                        rejection: Rejection::AlreadyCheckedIn,
                        time: Some(open),
                    });
                }
                (EventType::Checkout, None) => {
                    debug!("Checkout rejected");
                    return Ok(RecordOutcome::Rejected {
                        rejection: Rejection::NoActiveCheckIn,
                        time: None,
                    });
                }
                _ => {}
            }

            let event = AttendanceEvent {
                id: Uuid::new_v4().to_string(),
                user_id: user_id.to_string(),
                user_name: req.user_name.clone(),
                event_type,
                time: next_event_time(clock(), latest.as_ref()),
                status: event_type.status(),
                is_approved: false,
                remarks: remarks.clone(),
            };

            let expected = latest.as_ref().map(|e| e.id.as_str());
            if self.store.append_event(&event, expected).await? {
                info!(event_id = %event.id, "Attendance recorded");
                return Ok(RecordOutcome::Recorded {
                    check_in_time: open_check_in.filter(|_| event_type == EventType::Checkout),
                    event,
                });
            }
            warn!(attempt, "Event log changed while recording, re-reading");
        }

        Err(AttendanceError::ConcurrentUpdate)
    }

    pub async fn get_status(&self, user_id: &str) -> Result<StatusReport, AttendanceError> {
        self.get_status_at(user_id, Utc::now()).await
    }

    #[instrument(skip(self))]
    pub async fn get_status_at(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<StatusReport, AttendanceError> {
        let user_id = required_user_id(user_id)?;

        match self.settings.status_policy {
            StatusPolicy::DayWindow => {
                let window = DayWindow::containing(now, self.settings.utc_offset);
                let events = self
                    .store
                    .events_between(user_id, window.start, window.end)
                    .await?;
                debug!(start = %window.start, count = events.len(), "Deriving day status");
                Ok(derive_day_status(user_id, &events))
            }
            StatusPolicy::LatestEvent => {
                let latest = self.store.latest_event(user_id).await?;
                Ok(derive_latest_status(user_id, latest.as_ref()))
            }
        }
    }

    pub async fn list_events(&self, query: &EventQuery) -> Result<EventPage, AttendanceError> {
        Ok(self.store.list_events(query).await?)
    }

    pub async fn list_pending_leaves(&self, query: &EventQuery) -> Result<EventPage, AttendanceError> {
        let query = EventQuery {
            pending_leaves_only: true,
            ..query.clone()
        };
        Ok(self.store.list_events(&query).await?)
    }

    #[instrument(skip(self))]
    pub async fn set_leave_approval(
        &self,
        event_id: &str,
        approved: bool,
    ) -> Result<AttendanceEvent, AttendanceError> {
        let event = self
            .store
            .find_event(event_id)
            .await?
            .ok_or(AttendanceError::EventNotFound)?;

        if event.event_type != EventType::Leave {
            return Err(AttendanceError::NotALeave);
        }

        if !approved && event.is_approved && !self.settings.allow_leave_revoke {
            return Err(AttendanceError::LeaveAlreadyApproved);
        }

        let updated = self
            .store
            .set_approval(event_id, approved)
            .await?
            .ok_or(AttendanceError::EventNotFound)?;
        info!(approved, "Leave approval updated");

        Ok(updated)
    }

    pub async fn user_history(&self, user_id: &str) -> Result<Vec<AttendanceEvent>, AttendanceError> {
        let user_id = required_user_id(user_id)?;
        Ok(self.store.user_history(user_id).await?)
    }

    pub async fn present_users(&self) -> Result<Vec<AttendanceEvent>, AttendanceError> {
        Ok(self.store.open_check_ins().await?)
    }
}
