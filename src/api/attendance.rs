use actix_web::{HttpResponse, Responder, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::error::AttendanceError;
use crate::model::attendance::{AttendanceEvent, EventType};
use crate::service::{AttendanceService, RecordEvent, RecordOutcome, StatusReport};
use crate::store::{EventPage, EventQuery};

#[derive(Deserialize, ToSchema)]
pub struct RecordEventRequest {
    #[schema(example = "usr_01HZX3")]
    pub user_id: Option<String>,
    #[schema(example = "Alice", nullable = true)]
    pub user_name: Option<String>,
    /// One of CHECKIN, CHECKOUT, LEAVE
    #[schema(example = "CHECKIN")]
    pub event_type: Option<String>,
    /// Justification, used for LEAVE only
    #[schema(example = "Family function", nullable = true)]
    pub remarks: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct RecordEventResponse {
    #[schema(example = true)]
    pub success: bool,
    #[schema(example = "Checked in successfully")]
    pub message: String,
    #[schema(example = "2026-01-05T03:30:00Z", format = "date-time", value_type = Option<String>)]
    pub time: Option<DateTime<Utc>>,
    /// Set on checkout: the check-in it closed
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "2026-01-05T03:30:00Z", format = "date-time", value_type = Option<String>)]
    pub check_in_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<AttendanceEvent>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct StatusQuery {
    /// User whose status is requested
    #[schema(example = "usr_01HZX3")]
    pub user_id: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct StatusResponse {
    #[schema(example = true)]
    pub success: bool,
    #[serde(flatten)]
    pub report: StatusReport,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct EventFilter {
    /// Filter by user ID
    #[schema(example = "usr_01HZX3")]
    pub user_id: Option<String>,
    /// Pagination page number (start with 1)
    #[schema(example = 1)]
    pub page: Option<u32>,
    /// Items per page
    #[schema(example = 20)]
    pub per_page: Option<u32>,
}

impl EventFilter {
    fn to_query(&self) -> EventQuery {
        EventQuery {
            user_id: self
                .user_id
                .as_deref()
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(String::from),
            pending_leaves_only: false,
            page: self.page.unwrap_or(1).max(1),
            per_page: self.per_page.unwrap_or(20).clamp(1, 100),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct EventListResponse {
    pub data: Vec<AttendanceEvent>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

impl EventListResponse {
    fn new(page: EventPage, query: &EventQuery) -> Self {
        Self {
            data: page.events,
            page: query.page,
            per_page: query.per_page,
            total: page.total,
        }
    }
}

fn success_message(event_type: EventType) -> &'static str {
    match event_type {
        EventType::Checkin => "Checked in successfully",
        EventType::Checkout => "Checked out successfully",
        EventType::Leave => "Leave request submitted successfully",
    }
}

/// Record a check-in, checkout or leave request
#[utoipa::path(
    post,
    path = "/api/attendance",
    request_body = RecordEventRequest,
    responses(
        (status = 200, description = "Event recorded, or rejected by sequencing rules (success = false)",
         body = RecordEventResponse,
         example = json!({
            "success": false,
            "message": "User already checked in",
            "time": "2026-01-05T03:30:00Z"
         })
        ),
        (status = 400, description = "Missing userId or type, unknown type, or a field too long", body = Object, example = json!({
            "success": false,
            "message": "Missing userId"
        })),
        (status = 409, description = "The user's events kept changing while recording"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn record_event(
    service: web::Data<AttendanceService>,
    payload: web::Json<RecordEventRequest>,
) -> actix_web::Result<impl Responder> {
    let payload = payload.into_inner();

    let user_id = payload
        .user_id
        .filter(|u| !u.trim().is_empty())
        .ok_or(AttendanceError::MissingUserId)?;
    let event_type = payload
        .event_type
        .filter(|t| !t.trim().is_empty())
        .ok_or(AttendanceError::MissingEventType)?;

    let outcome = service
        .record_event(RecordEvent {
            user_id,
            user_name: payload.user_name,
            event_type,
            remarks: payload.remarks,
        })
        .await?;

    let response = match outcome {
        RecordOutcome::Recorded {
            event,
            check_in_time,
        } => RecordEventResponse {
            success: true,
            message: success_message(event.event_type).to_string(),
            time: Some(event.time),
            check_in_time,
            event: Some(event),
        },
        RecordOutcome::Rejected { rejection, time } => {
            info!(%rejection, "Attendance action rejected");
            RecordEventResponse {
                success: false,
                message: rejection.to_string(),
                time,
                check_in_time: None,
                event: None,
            }
        }
    };

    Ok(HttpResponse::Ok().json(response))
}

/// Current attendance status of a user
#[utoipa::path(
    get,
    path = "/api/attendance/status",
    params(StatusQuery),
    responses(
        (status = 200, description = "Derived status", body = StatusResponse),
        (status = 400, description = "Missing or overlong userId", body = Object, example = json!({
            "success": false,
            "message": "Missing userId"
        })),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn get_status(
    service: web::Data<AttendanceService>,
    query: web::Query<StatusQuery>,
) -> actix_web::Result<impl Responder> {
    let user_id = query
        .user_id
        .as_deref()
        .ok_or(AttendanceError::MissingUserId)?;

    let report = service.get_status(user_id).await?;

    Ok(HttpResponse::Ok().json(StatusResponse {
        success: true,
        report,
    }))
}

/// All attendance events, by user name then newest first
#[utoipa::path(
    get,
    path = "/api/attendance",
    params(EventFilter),
    responses(
        (status = 200, description = "Paginated event list", body = EventListResponse),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn list_events(
    service: web::Data<AttendanceService>,
    filter: web::Query<EventFilter>,
) -> actix_web::Result<impl Responder> {
    let query = filter.to_query();
    let page = service.list_events(&query).await?;

    Ok(HttpResponse::Ok().json(EventListResponse::new(page, &query)))
}

/// Leave requests that are not approved yet
#[utoipa::path(
    get,
    path = "/api/attendance/leaves/pending",
    params(EventFilter),
    responses(
        (status = 200, description = "Paginated pending leave list", body = EventListResponse),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn list_pending_leaves(
    service: web::Data<AttendanceService>,
    filter: web::Query<EventFilter>,
) -> actix_web::Result<impl Responder> {
    let query = filter.to_query();
    let page = service.list_pending_leaves(&query).await?;

    Ok(HttpResponse::Ok().json(EventListResponse::new(page, &query)))
}

/// Approve a leave request
#[utoipa::path(
    put,
    path = "/api/attendance/{event_id}/approve",
    params(
        ("event_id" = String, Path, description = "ID of the leave event to approve")
    ),
    responses(
        (status = 200, description = "Updated leave event", body = AttendanceEvent),
        (status = 400, description = "Event is not a leave request"),
        (status = 404, description = "Event not found", body = Object, example = json!({
            "success": false,
            "message": "Attendance event not found"
        })),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn approve_leave(
    service: web::Data<AttendanceService>,
    path: web::Path<String>,
) -> actix_web::Result<impl Responder> {
    let event_id = path.into_inner();
    let event = service.set_leave_approval(&event_id, true).await?;

    Ok(HttpResponse::Ok().json(event))
}

/// Reject a leave request
#[utoipa::path(
    put,
    path = "/api/attendance/{event_id}/reject",
    params(
        ("event_id" = String, Path, description = "ID of the leave event to reject")
    ),
    responses(
        (status = 200, description = "Updated leave event", body = AttendanceEvent),
        (status = 400, description = "Event is not a leave request"),
        (status = 404, description = "Event not found"),
        (status = 409, description = "Leave already approved and revocation is disabled", body = Object, example = json!({
            "success": false,
            "message": "Leave is already approved and cannot be rejected"
        })),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn reject_leave(
    service: web::Data<AttendanceService>,
    path: web::Path<String>,
) -> actix_web::Result<impl Responder> {
    let event_id = path.into_inner();
    let event = service.set_leave_approval(&event_id, false).await?;

    Ok(HttpResponse::Ok().json(event))
}

/// Full event history of one user, oldest first
#[utoipa::path(
    get,
    path = "/api/attendance/users/{user_id}/events",
    params(
        ("user_id" = String, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "Event history", body = [AttendanceEvent]),
        (status = 400, description = "Overlong user ID"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn user_history(
    service: web::Data<AttendanceService>,
    path: web::Path<String>,
) -> actix_web::Result<impl Responder> {
    let user_id = path.into_inner();
    let events = service.user_history(&user_id).await?;

    Ok(HttpResponse::Ok().json(events))
}

/// Users that are checked in right now, with their open check-in
#[utoipa::path(
    get,
    path = "/api/attendance/present",
    responses(
        (status = 200, description = "Open check-ins", body = [AttendanceEvent]),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn present_users(
    service: web::Data<AttendanceService>,
) -> actix_web::Result<impl Responder> {
    let events = service.present_users().await?;

    Ok(HttpResponse::Ok().json(events))
}
