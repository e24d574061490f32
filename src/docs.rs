use crate::api::attendance::{
    EventFilter, EventListResponse, RecordEventRequest, RecordEventResponse, StatusQuery,
    StatusResponse,
};
use crate::model::attendance::{AttendanceEvent, AttendanceStatus, EventStatus, EventType};
use crate::service::StatusReport;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HRMS Attendance API",
        version = "1.0.0",
        description = r#"
## Attendance tracking for the HRMS

Employees check in, check out and apply for leave; managers review pending
leave requests.

### Key Features
- **Event log**
  - Every check-in, checkout and leave request is an immutable event
- **Status**
  - PRESENT / ABSENT / LEAVE derived from today's events in the configured timezone
- **Leave review**
  - List pending requests, approve or reject them

### Notes
- Identity is supplied by the caller as `user_id`; authentication is handled upstream.
- A second check-in while one is open, or a checkout without one, answers
  `200` with `success: false` and a message instead of an error code.

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::attendance::record_event,
        crate::api::attendance::get_status,
        crate::api::attendance::list_events,
        crate::api::attendance::list_pending_leaves,
        crate::api::attendance::approve_leave,
        crate::api::attendance::reject_leave,
        crate::api::attendance::user_history,
        crate::api::attendance::present_users,
    ),
    components(
        schemas(
            AttendanceEvent,
            AttendanceStatus,
            EventStatus,
            EventType,
            StatusReport,
            RecordEventRequest,
            RecordEventResponse,
            StatusQuery,
            StatusResponse,
            EventFilter,
            EventListResponse
        )
    ),
    tags(
        (name = "Attendance", description = "Attendance management APIs"),
    )
)]
pub struct ApiDoc;
