use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

/// Placeholder stored on leave requests submitted without a justification.
pub const DEFAULT_LEAVE_REMARKS: &str = "No remarks provided";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum EventType {
    Checkin,
    Checkout,
    Leave,
}

impl EventType {
    /// The status tag written alongside an event of this type.
    pub fn status(self) -> EventStatus {
        match self {
            EventType::Checkin => EventStatus::CheckedIn,
            EventType::Checkout => EventStatus::CheckedOut,
            EventType::Leave => EventStatus::LeaveApplied,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventStatus {
    CheckedIn,
    CheckedOut,
    LeaveApplied,
}

/// Attendance status derived from the event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Leave,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(
    example = json!({
        "id": "7f4c1c0e-5c1a-4d0b-9a57-0a8c3b1f2d11",
        "user_id": "usr_01HZX3",
        "user_name": "Alice",
        "event_type": "LEAVE",
        "time": "2026-01-05T04:30:00Z",
        "status": "leave_applied",
        "is_approved": false,
        "remarks": "Family function"
    })
)]
pub struct AttendanceEvent {
    #[schema(example = "7f4c1c0e-5c1a-4d0b-9a57-0a8c3b1f2d11")]
    pub id: String,

    #[schema(example = "usr_01HZX3")]
    pub user_id: String,

    /// Display name captured when the event was recorded
    #[schema(example = "Alice", nullable = true)]
    pub user_name: Option<String>,

    pub event_type: EventType,

    #[schema(example = "2026-01-05T04:30:00Z", format = "date-time", value_type = String)]
    pub time: DateTime<Utc>,

    pub status: EventStatus,

    /// Only meaningful for LEAVE events
    #[schema(example = false)]
    pub is_approved: bool,

    #[schema(example = "Family function", nullable = true)]
    pub remarks: Option<String>,
}

impl AttendanceEvent {
    pub fn is_open_check_in(&self) -> bool {
        self.event_type == EventType::Checkin && self.status == EventStatus::CheckedIn
    }
}

/// Raw row as stored in `attendance_events`.
#[derive(Debug, FromRow)]
pub struct AttendanceRow {
    pub id: String,
    pub user_id: String,
    pub user_name: Option<String>,
    pub event_type: String,
    pub time: DateTime<Utc>,
    pub status: String,
    pub is_approved: bool,
    pub remarks: Option<String>,
}

impl TryFrom<AttendanceRow> for AttendanceEvent {
    type Error = sqlx::Error;

    fn try_from(row: AttendanceRow) -> Result<Self, Self::Error> {
        let event_type = row
            .event_type
            .parse::<EventType>()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        let status = row
            .status
            .parse::<EventStatus>()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

        Ok(AttendanceEvent {
            id: row.id,
            user_id: row.user_id,
            user_name: row.user_name,
            event_type,
            time: row.time,
            status,
            is_approved: row.is_approved,
            remarks: row.remarks,
        })
    }
}
