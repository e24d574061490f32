use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::mysql::{MySqlArguments, MySqlConnection};
use sqlx::query::Query;
use sqlx::{MySql, MySqlPool};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{AttendanceStore, EventPage, EventQuery, StoreResult};
use crate::model::attendance::{AttendanceEvent, AttendanceRow};

const EVENT_COLUMNS: &str =
    "id, user_id, user_name, event_type, `time`, status, is_approved, remarks";

/// Seconds to wait for another instance holding the same user's lock.
const USER_LOCK_TIMEOUT_SECS: i64 = 10;

pub struct MySqlAttendanceStore {
    pool: MySqlPool,
}

impl MySqlAttendanceStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

fn into_events(rows: Vec<AttendanceRow>) -> StoreResult<Vec<AttendanceEvent>> {
    rows.into_iter().map(AttendanceEvent::try_from).collect()
}

/// Name of the server-wide lock guarding appends for one user. MySQL caps
/// lock names at 64 characters, so the id is folded into a name-based UUID.
fn user_lock_name(user_id: &str) -> String {
    format!(
        "attendance:{}",
        Uuid::new_v5(&Uuid::NAMESPACE_OID, user_id.as_bytes())
    )
}

fn insert_query(event: &AttendanceEvent) -> Query<'_, MySql, MySqlArguments> {
    sqlx::query(
        r#"
        INSERT INTO attendance_events
            (id, user_id, user_name, event_type, `time`, status, is_approved, remarks)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&event.id)
    .bind(&event.user_id)
    .bind(&event.user_name)
    .bind(event.event_type.as_ref())
    .bind(event.time)
    .bind(event.status.as_ref())
    .bind(event.is_approved)
    .bind(&event.remarks)
}

/// Compare-and-append; the caller holds the user's lock on `conn`.
async fn append_if_latest(
    conn: &mut MySqlConnection,
    event: &AttendanceEvent,
    expected_latest: Option<&str>,
) -> StoreResult<bool> {
    let latest = sqlx::query_scalar::<_, String>(
        "SELECT id FROM attendance_events WHERE user_id = ? ORDER BY `time` DESC LIMIT 1",
    )
    .bind(&event.user_id)
    .fetch_optional(&mut *conn)
    .await?;

    if latest.as_deref() != expected_latest {
        debug!(user_id = %event.user_id, "Latest event moved before append");
        return Ok(false);
    }

    insert_query(event).execute(&mut *conn).await?;
    Ok(true)
}

fn build_where(query: &EventQuery) -> (String, Vec<&str>) {
    let mut conditions = Vec::new();
    let mut bindings = Vec::new();

    if let Some(user_id) = query.user_id.as_deref() {
        conditions.push("user_id = ?");
        bindings.push(user_id);
    }

    if query.pending_leaves_only {
        conditions.push("event_type = 'LEAVE' AND is_approved = FALSE");
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    (where_clause, bindings)
}

#[async_trait]
impl AttendanceStore for MySqlAttendanceStore {
    async fn latest_event(&self, user_id: &str) -> StoreResult<Option<AttendanceEvent>> {
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM attendance_events WHERE user_id = ? ORDER BY `time` DESC LIMIT 1"
        );

        sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .map(AttendanceEvent::try_from)
            .transpose()
    }

    async fn events_between(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<AttendanceEvent>> {
        let sql = format!(
            r#"
            SELECT {EVENT_COLUMNS}
            FROM attendance_events
            WHERE user_id = ? AND `time` >= ? AND `time` < ?
            ORDER BY `time` DESC
            "#
        );

        let rows = sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(user_id)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;

        into_events(rows)
    }

    async fn append_event(
        &self,
        event: &AttendanceEvent,
        expected_latest: Option<&str>,
    ) -> StoreResult<bool> {
        let lock_name = user_lock_name(&event.user_id);
        let mut conn = self.pool.acquire().await?;

        let acquired = sqlx::query_scalar::<_, Option<i64>>("SELECT GET_LOCK(?, ?)")
            .bind(&lock_name)
            .bind(USER_LOCK_TIMEOUT_SECS)
            .fetch_one(&mut *conn)
            .await?;
        if acquired != Some(1) {
            warn!(lock = %lock_name, "Timed out waiting for user lock");
            return Ok(false);
        }

        let appended = append_if_latest(&mut conn, event, expected_latest).await;

        let released = sqlx::query("SELECT RELEASE_LOCK(?)")
            .bind(&lock_name)
            .execute(&mut *conn)
            .await;
        if let Err(e) = released {
            // named locks die with their session
            warn!(error = %e, lock = %lock_name, "Failed to release user lock, closing connection");
            drop(conn.detach());
        }

        appended
    }

    async fn find_event(&self, id: &str) -> StoreResult<Option<AttendanceEvent>> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM attendance_events WHERE id = ?");

        sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(AttendanceEvent::try_from)
            .transpose()
    }

    async fn set_approval(&self, id: &str, approved: bool) -> StoreResult<Option<AttendanceEvent>> {
        // MySQL reports 0 affected rows when the value is unchanged, so the
        // row is re-read instead of trusting rows_affected.
        sqlx::query("UPDATE attendance_events SET is_approved = ? WHERE id = ?")
            .bind(approved)
            .bind(id)
            .execute(&self.pool)
            .await?;

        self.find_event(id).await
    }

    async fn list_events(&self, query: &EventQuery) -> StoreResult<EventPage> {
        let (where_clause, bindings) = build_where(query);

        let count_sql = format!("SELECT COUNT(*) FROM attendance_events {where_clause}");
        debug!(sql = %count_sql, bindings = ?bindings, "Counting attendance events");

        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        for b in &bindings {
            count_query = count_query.bind(*b);
        }
        let total = count_query.fetch_one(&self.pool).await?;

        let data_sql = format!(
            r#"
            SELECT {EVENT_COLUMNS}
            FROM attendance_events
            {where_clause}
            ORDER BY user_name ASC, `time` DESC
            LIMIT ? OFFSET ?
            "#
        );
        debug!(
            sql = %data_sql,
            bindings = ?bindings,
            page = query.page,
            per_page = query.per_page,
            "Fetching attendance events"
        );

        let mut data_query = sqlx::query_as::<_, AttendanceRow>(&data_sql);
        for b in &bindings {
            data_query = data_query.bind(*b);
        }
        let rows = data_query
            .bind(i64::from(query.per_page))
            .bind(query.offset() as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(EventPage {
            events: into_events(rows)?,
            total,
        })
    }

    async fn user_history(&self, user_id: &str) -> StoreResult<Vec<AttendanceEvent>> {
        let sql = format!(
            "SELECT {EVENT_COLUMNS} FROM attendance_events WHERE user_id = ? ORDER BY `time` ASC"
        );

        let rows = sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        into_events(rows)
    }

    async fn open_check_ins(&self) -> StoreResult<Vec<AttendanceEvent>> {
        let rows = sqlx::query_as::<_, AttendanceRow>(
            r#"
            SELECT e.id, e.user_id, e.user_name, e.event_type, e.`time`, e.status, e.is_approved, e.remarks
            FROM attendance_events e
            JOIN (
                SELECT user_id, MAX(`time`) AS latest
                FROM attendance_events
                GROUP BY user_id
            ) l ON l.user_id = e.user_id AND l.latest = e.`time`
            WHERE e.event_type = 'CHECKIN' AND e.status = 'checked_in'
            ORDER BY e.user_name ASC, e.`time` DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        into_events(rows)
    }
}
