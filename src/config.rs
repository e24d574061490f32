use std::env;
use std::fmt::Display;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use chrono::FixedOffset;
use dotenvy::dotenv;

use crate::service::{AttendanceSettings, StatusPolicy};

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub server_addr: String,
    pub api_prefix: String,

    // Rate limiting
    pub rate_protected_per_min: u32,

    // Attendance rules
    pub utc_offset: FixedOffset,
    pub status_policy: StatusPolicy,
    pub leave_allow_revoke: bool,

    pub log_dir: String,
}

fn required<F>(lookup: &F, key: &str) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).ok_or_else(|| anyhow!("{key} must be set"))
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("{e}"))
            .with_context(|| format!("invalid value {raw:?} for {key}")),
        None => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // default is UTC+5:30
        let offset_minutes: i32 = parse_or(&lookup, "ATTENDANCE_UTC_OFFSET_MINUTES", 330)?;
        let utc_offset = FixedOffset::east_opt(offset_minutes * 60).ok_or_else(|| {
            anyhow!("ATTENDANCE_UTC_OFFSET_MINUTES must be within +/-24h, got {offset_minutes}")
        })?;

        Ok(Self {
            server_addr: required(&lookup, "SERVER_ADDR")?,
            database_url: required(&lookup, "DATABASE_URL")?,
            api_prefix: lookup("API_PREFIX").unwrap_or_else(|| "/api".to_string()),

            rate_protected_per_min: parse_or(&lookup, "RATE_PROTECTED_PER_MIN", 1000)?,

            utc_offset,
            status_policy: parse_or(&lookup, "ATTENDANCE_STATUS_POLICY", StatusPolicy::DayWindow)?,
            leave_allow_revoke: parse_or(&lookup, "LEAVE_ALLOW_REVOKE", true)?,

            log_dir: lookup("LOG_DIR").unwrap_or_else(|| "logs".to_string()),
        })
    }

    pub fn attendance_settings(&self) -> AttendanceSettings {
        AttendanceSettings {
            utc_offset: self.utc_offset,
            status_policy: self.status_policy,
            allow_leave_revoke: self.leave_allow_revoke,
        }
    }
}
