use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use derive_more::Display;
use serde_json::json;

/// Hard failures of attendance operations.
///
/// Sequencing conflicts (double check-in, checkout without check-in) are not
/// errors; they come back as a rejected outcome.
#[derive(Debug, Display)]
pub enum AttendanceError {
    #[display(fmt = "Missing userId")]
    MissingUserId,

    #[display(fmt = "Missing event type")]
    MissingEventType,

    #[display(fmt = "Unknown attendance type: {}", _0)]
    UnknownEventType(String),

    #[display(fmt = "{} is too long (at most {})", field, max)]
    FieldTooLong { field: &'static str, max: usize },

    #[display(fmt = "Attendance event not found")]
    EventNotFound,

    #[display(fmt = "Attendance event is not a leave request")]
    NotALeave,

    #[display(fmt = "Leave is already approved and cannot be rejected")]
    LeaveAlreadyApproved,

    #[display(fmt = "Attendance changed concurrently, please retry")]
    ConcurrentUpdate,

    #[display(fmt = "Internal Server Error")]
    Storage(sqlx::Error),
}

impl From<sqlx::Error> for AttendanceError {
    fn from(e: sqlx::Error) -> Self {
        AttendanceError::Storage(e)
    }
}

impl ResponseError for AttendanceError {
    fn status_code(&self) -> StatusCode {
        match self {
            AttendanceError::MissingUserId
            | AttendanceError::MissingEventType
            | AttendanceError::UnknownEventType(_)
            | AttendanceError::FieldTooLong { .. }
            | AttendanceError::NotALeave => StatusCode::BAD_REQUEST,
            AttendanceError::EventNotFound => StatusCode::NOT_FOUND,
            AttendanceError::LeaveAlreadyApproved | AttendanceError::ConcurrentUpdate => {
                StatusCode::CONFLICT
            }
            AttendanceError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let AttendanceError::Storage(e) = self {
            tracing::error!(error = %e, "Attendance storage failure");
        }

        HttpResponse::build(self.status_code()).json(json!({
            "success": false,
            "message": self.to_string()
        }))
    }
}
