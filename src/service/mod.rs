pub mod attendance;
pub mod day_window;

pub use attendance::{
    AttendanceService, AttendanceSettings, RecordEvent, RecordOutcome, StatusPolicy,
    StatusReport,
};
