use crate::core::ports::IntervalFilter;
use crate::errors::{AppError, AppResult};
use crate::models::{ChangeEvent, Interval, IntervalId, Member, MemberId};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Result, Row, params};

const INTERVAL_COLUMNS: &str =
    "id, member_id, punch_in_ms, punch_out_ms, created_at_ms, member_name, member_email";

fn ms_to_utc(ms: i64, column: usize) -> Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(ms).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            column,
            rusqlite::types::Type::Integer,
            Box::new(AppError::InvalidDate(format!("timestamp out of range: {}", ms))),
        )
    })
}

pub fn map_member(row: &Row) -> Result<Member> {
    Ok(Member {
        id: row.get("id")?,
        name: row.get("name")?,
        email: row.get("email")?,
        is_admin: row.get::<_, i32>("is_admin")? == 1,
    })
}

pub fn map_interval(row: &Row) -> Result<Interval> {
    let punch_in_ms: i64 = row.get("punch_in_ms")?;
    let punch_out_ms: Option<i64> = row.get("punch_out_ms")?;
    let created_at_ms: i64 = row.get("created_at_ms")?;

    Ok(Interval {
        id: row.get("id")?,
        member_id: row.get("member_id")?,
        punch_in: ms_to_utc(punch_in_ms, 2)?,
        punch_out: punch_out_ms.map(|ms| ms_to_utc(ms, 3)).transpose()?,
        created_at: ms_to_utc(created_at_ms, 4)?,
        member_name: row.get("member_name")?,
        member_email: row.get("member_email")?,
    })
}

// ---------------------------
// Members
// ---------------------------

pub fn insert_member(conn: &Connection, m: &Member) -> AppResult<MemberId> {
    conn.execute(
        "INSERT INTO members (name, email, is_admin, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            m.name,
            m.email,
            if m.is_admin { 1 } else { 0 },
            Utc::now().to_rfc3339()
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn load_member(conn: &Connection, id: MemberId) -> AppResult<Option<Member>> {
    let m = conn
        .query_row(
            "SELECT id, name, email, is_admin FROM members WHERE id = ?1",
            [id],
            map_member,
        )
        .optional()?;
    Ok(m)
}

/// Case-insensitive lookup by display name.
pub fn load_member_by_name(conn: &Connection, name: &str) -> AppResult<Vec<Member>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, email, is_admin FROM members
         WHERE lower(name) = lower(?1)
         ORDER BY id ASC",
    )?;
    let rows = stmt.query_map([name.trim()], map_member)?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn load_members(conn: &Connection) -> AppResult<Vec<Member>> {
    let mut stmt =
        conn.prepare("SELECT id, name, email, is_admin FROM members ORDER BY name ASC, id ASC")?;
    let rows = stmt.query_map([], map_member)?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn delete_member(conn: &Connection, id: MemberId) -> AppResult<usize> {
    Ok(conn.execute("DELETE FROM members WHERE id = ?1", [id])?)
}

// ---------------------------
// Intervals
// ---------------------------

/// Insert an open interval, capturing the member's identity on the record.
pub fn insert_open_interval(
    conn: &Connection,
    member: &Member,
    punch_in: DateTime<Utc>,
    created_at: DateTime<Utc>,
) -> AppResult<IntervalId> {
    conn.execute(
        "INSERT INTO intervals (member_id, punch_in_ms, punch_out_ms, created_at_ms, member_name, member_email)
         VALUES (?1, ?2, NULL, ?3, ?4, ?5)",
        params![
            member.id,
            punch_in.timestamp_millis(),
            created_at.timestamp_millis(),
            member.name,
            member.email,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Close an interval only if it is still open. Returns affected rows.
pub fn close_open_interval(
    conn: &Connection,
    id: IntervalId,
    punch_out: DateTime<Utc>,
) -> AppResult<usize> {
    Ok(conn.execute(
        "UPDATE intervals SET punch_out_ms = ?1
         WHERE id = ?2 AND punch_out_ms IS NULL",
        params![punch_out.timestamp_millis(), id],
    )?)
}

pub fn load_interval(conn: &Connection, id: IntervalId) -> AppResult<Option<Interval>> {
    let sql = format!("SELECT {} FROM intervals WHERE id = ?1", INTERVAL_COLUMNS);
    Ok(conn.query_row(&sql, [id], map_interval).optional()?)
}

pub fn load_open_interval_for(
    conn: &Connection,
    member_id: MemberId,
) -> AppResult<Option<Interval>> {
    let sql = format!(
        "SELECT {} FROM intervals
         WHERE member_id = ?1 AND punch_out_ms IS NULL
         ORDER BY punch_in_ms DESC, id DESC
         LIMIT 1",
        INTERVAL_COLUMNS
    );
    Ok(conn.query_row(&sql, [member_id], map_interval).optional()?)
}

pub fn load_intervals(conn: &Connection, filter: &IntervalFilter) -> AppResult<Vec<Interval>> {
    let sql = format!(
        "SELECT {} FROM intervals
         WHERE (?1 IS NULL OR member_id = ?1)
           AND ((?2 = 1 AND punch_out_ms IS NULL)
                OR ((?3 IS NULL OR punch_in_ms >= ?3) AND (?4 IS NULL OR punch_in_ms < ?4)))
         ORDER BY punch_in_ms ASC, id ASC",
        INTERVAL_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![
            filter.member_id,
            if filter.include_open { 1 } else { 0 },
            filter.since.map(|t| t.timestamp_millis()),
            filter.until.map(|t| t.timestamp_millis()),
        ],
        map_interval,
    )?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

// ---------------------------
// Change log
// ---------------------------

pub fn append_change(conn: &Connection, ev: &ChangeEvent) -> AppResult<i64> {
    let payload = serde_json::to_string(&ev.interval)?;
    conn.execute(
        "INSERT INTO changes (kind, interval_id, payload, emitted_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            ev.kind.to_db_str(),
            ev.interval.id,
            payload,
            Utc::now().to_rfc3339()
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Highest sequence number in the change log (0 when empty).
pub fn change_head(conn: &Connection) -> AppResult<i64> {
    Ok(conn.query_row("SELECT COALESCE(MAX(seq), 0) FROM changes", [], |row| {
        row.get(0)
    })?)
}

/// Raw change rows `(seq, kind, payload)` strictly after `after`.
pub fn load_changes_after(
    conn: &Connection,
    after: i64,
    limit: usize,
) -> AppResult<Vec<(i64, String, String)>> {
    let mut stmt = conn.prepare_cached(
        "SELECT seq, kind, payload FROM changes
         WHERE seq > ?1
         ORDER BY seq ASC
         LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![after, limit as i64], |row| {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?))
    })?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}
