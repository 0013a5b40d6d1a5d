pub mod schema;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, ToSql, TransactionBehavior};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use crate::models::{Driver, Session, SessionType, Upsert};

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("database error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("failed to create database directory: {0}")]
  Io(#[from] std::io::Error),

  #[error("database lock poisoned")]
  LockPoisoned,
}

/// Filters for session reads. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct SessionFilter {
  pub year: Option<i32>,
  pub session_type: Option<SessionType>,
  /// Only sessions flagged live whose window contains this instant
  pub live_at: Option<DateTime<Utc>>,
}

/// Local storage for synced records.
///
/// Upserts are atomic: the existing row (if any) is read, handed to `build`,
/// and the result written back as one operation, so concurrent syncs of the
/// same key never produce duplicate rows.
pub trait Store: Send + Sync {
  /// Insert or update the session `session_key` with the row `build` returns.
  fn upsert_session(
    &self,
    session_key: i64,
    build: &dyn Fn(Option<&Session>) -> Session,
  ) -> Result<Upsert, StoreError>;

  /// Insert or update the driver `driver_number` with the row `build` returns.
  fn upsert_driver(
    &self,
    driver_number: i64,
    build: &dyn Fn(Option<&Driver>) -> Driver,
  ) -> Result<Upsert, StoreError>;

  fn session(&self, session_key: i64) -> Result<Option<Session>, StoreError>;

  fn driver(&self, driver_number: i64) -> Result<Option<Driver>, StoreError>;

  /// Sessions matching `filter`, most recent first.
  fn sessions(&self, filter: &SessionFilter) -> Result<Vec<Session>, StoreError>;

  fn session_count(&self) -> Result<u64, StoreError>;

  /// Flip the live flag. Returns false when the session does not exist.
  fn set_session_live(&self, session_key: i64, is_live: bool) -> Result<bool, StoreError>;
}

impl<S: Store + ?Sized> Store for Arc<S> {
  fn upsert_session(
    &self,
    session_key: i64,
    build: &dyn Fn(Option<&Session>) -> Session,
  ) -> Result<Upsert, StoreError> {
    (**self).upsert_session(session_key, build)
  }

  fn upsert_driver(
    &self,
    driver_number: i64,
    build: &dyn Fn(Option<&Driver>) -> Driver,
  ) -> Result<Upsert, StoreError> {
    (**self).upsert_driver(driver_number, build)
  }

  fn session(&self, session_key: i64) -> Result<Option<Session>, StoreError> {
    (**self).session(session_key)
  }

  fn driver(&self, driver_number: i64) -> Result<Option<Driver>, StoreError> {
    (**self).driver(driver_number)
  }

  fn sessions(&self, filter: &SessionFilter) -> Result<Vec<Session>, StoreError> {
    (**self).sessions(filter)
  }

  fn session_count(&self) -> Result<u64, StoreError> {
    (**self).session_count()
  }

  fn set_session_live(&self, session_key: i64, is_live: bool) -> Result<bool, StoreError> {
    (**self).set_session_live(session_key, is_live)
  }
}

/// SQLite-backed store
pub struct Database {
  conn: Mutex<Connection>,
}

const SESSION_COLUMNS: &str = "session_key, meeting_key, session_name, session_type, \
   circuit_name, circuit_short_name, country_name, country_code, date_start, date_end, year, is_live";

const DRIVER_COLUMNS: &str = "driver_number, full_name, name_acronym, team_name, \
   team_colour, headshot_url, country_code, is_active";

impl Database {
  /// Open or create the database at `path`
  pub fn open(path: &Path) -> Result<Self, StoreError> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      std::fs::create_dir_all(parent)?;
    }

    Self::init(Connection::open(path)?)
  }

  pub fn open_in_memory() -> Result<Self, StoreError> {
    Self::init(Connection::open_in_memory()?)
  }

  fn init(conn: Connection) -> Result<Self, StoreError> {
    conn.execute_batch(schema::SCHEMA)?;
    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
    self.conn.lock().map_err(|_| StoreError::LockPoisoned)
  }
}

impl Store for Database {
  fn upsert_session(
    &self,
    session_key: i64,
    build: &dyn Fn(Option<&Session>) -> Session,
  ) -> Result<Upsert, StoreError> {
    let mut conn = self.lock()?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let existing = query_session(&tx, session_key)?;
    let s = build(existing.as_ref());

    tx.execute(
      "INSERT INTO sessions (session_key, meeting_key, session_name, session_type, circuit_name,
         circuit_short_name, country_name, country_code, date_start, date_end, year, is_live)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
       ON CONFLICT(session_key) DO UPDATE SET
         meeting_key = excluded.meeting_key,
         session_name = excluded.session_name,
         session_type = excluded.session_type,
         circuit_name = excluded.circuit_name,
         circuit_short_name = excluded.circuit_short_name,
         country_name = excluded.country_name,
         country_code = excluded.country_code,
         date_start = excluded.date_start,
         date_end = excluded.date_end,
         year = excluded.year,
         is_live = excluded.is_live,
         updated_at = datetime('now')",
      params![
        session_key,
        s.meeting_key,
        s.session_name,
        s.session_type.as_str(),
        s.circuit_name,
        s.circuit_short_name,
        s.country_name,
        s.country_code,
        format_ts(s.date_start),
        s.date_end.map(format_ts),
        s.year,
        s.is_live,
      ],
    )?;
    tx.commit()?;

    Ok(if existing.is_some() {
      Upsert::Updated
    } else {
      Upsert::Created
    })
  }

  fn upsert_driver(
    &self,
    driver_number: i64,
    build: &dyn Fn(Option<&Driver>) -> Driver,
  ) -> Result<Upsert, StoreError> {
    let mut conn = self.lock()?;
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let existing = query_driver(&tx, driver_number)?;
    let d = build(existing.as_ref());

    tx.execute(
      "INSERT INTO drivers (driver_number, full_name, name_acronym, team_name, team_colour,
         headshot_url, country_code, is_active)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
       ON CONFLICT(driver_number) DO UPDATE SET
         full_name = excluded.full_name,
         name_acronym = excluded.name_acronym,
         team_name = excluded.team_name,
         team_colour = excluded.team_colour,
         headshot_url = excluded.headshot_url,
         country_code = excluded.country_code,
         is_active = excluded.is_active,
         updated_at = datetime('now')",
      params![
        driver_number,
        d.full_name,
        d.name_acronym,
        d.team_name,
        d.team_colour,
        d.headshot_url,
        d.country_code,
        d.is_active,
      ],
    )?;
    tx.commit()?;

    Ok(if existing.is_some() {
      Upsert::Updated
    } else {
      Upsert::Created
    })
  }

  fn session(&self, session_key: i64) -> Result<Option<Session>, StoreError> {
    let conn = self.lock()?;
    query_session(&conn, session_key)
  }

  fn driver(&self, driver_number: i64) -> Result<Option<Driver>, StoreError> {
    let conn = self.lock()?;
    query_driver(&conn, driver_number)
  }

  fn sessions(&self, filter: &SessionFilter) -> Result<Vec<Session>, StoreError> {
    let mut sql = format!("SELECT {} FROM sessions WHERE 1 = 1", SESSION_COLUMNS);
    let mut args: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(year) = filter.year {
      sql.push_str(" AND year = ?");
      args.push(Box::new(year));
    }
    if let Some(session_type) = filter.session_type {
      sql.push_str(" AND session_type = ?");
      args.push(Box::new(session_type.as_str()));
    }
    if let Some(now) = filter.live_at {
      sql.push_str(" AND is_live = 1 AND date_start <= ? AND date_end IS NOT NULL AND date_end >= ?");
      args.push(Box::new(format_ts(now)));
      args.push(Box::new(format_ts(now)));
    }
    sql.push_str(" ORDER BY date_start DESC");

    let conn = self.lock()?;
    let mut stmt = conn.prepare(&sql)?;
    let sessions = stmt
      .query_map(params_from_iter(args.iter()), session_from_row)?
      .collect::<Result<Vec<_>, _>>()?;

    Ok(sessions)
  }

  fn session_count(&self) -> Result<u64, StoreError> {
    let conn = self.lock()?;
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?;
    Ok(u64::try_from(count).unwrap_or(0))
  }

  fn set_session_live(&self, session_key: i64, is_live: bool) -> Result<bool, StoreError> {
    let conn = self.lock()?;
    let changed = conn.execute(
      "UPDATE sessions SET is_live = ?, updated_at = datetime('now') WHERE session_key = ?",
      params![is_live, session_key],
    )?;
    Ok(changed > 0)
  }
}

fn query_session(conn: &Connection, session_key: i64) -> Result<Option<Session>, StoreError> {
  let sql = format!("SELECT {} FROM sessions WHERE session_key = ?", SESSION_COLUMNS);
  Ok(
    conn
      .query_row(&sql, params![session_key], session_from_row)
      .optional()?,
  )
}

fn query_driver(conn: &Connection, driver_number: i64) -> Result<Option<Driver>, StoreError> {
  let sql = format!("SELECT {} FROM drivers WHERE driver_number = ?", DRIVER_COLUMNS);
  Ok(
    conn
      .query_row(&sql, params![driver_number], driver_from_row)
      .optional()?,
  )
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<Session> {
  let session_type: String = row.get(3)?;
  let date_end: Option<String> = row.get(9)?;

  Ok(Session {
    session_key: row.get(0)?,
    meeting_key: row.get(1)?,
    session_name: row.get(2)?,
    session_type: SessionType::parse(&session_type).ok_or_else(|| {
      rusqlite::Error::FromSqlConversionFailure(
        3,
        Type::Text,
        format!("unknown session type '{}'", session_type).into(),
      )
    })?,
    circuit_name: row.get(4)?,
    circuit_short_name: row.get(5)?,
    country_name: row.get(6)?,
    country_code: row.get(7)?,
    date_start: parse_ts(8, &row.get::<_, String>(8)?)?,
    date_end: date_end.map(|s| parse_ts(9, &s)).transpose()?,
    year: row.get(10)?,
    is_live: row.get(11)?,
  })
}

fn driver_from_row(row: &Row<'_>) -> rusqlite::Result<Driver> {
  Ok(Driver {
    driver_number: row.get(0)?,
    full_name: row.get(1)?,
    name_acronym: row.get(2)?,
    team_name: row.get(3)?,
    team_colour: row.get(4)?,
    headshot_url: row.get(5)?,
    country_code: row.get(6)?,
    is_active: row.get(7)?,
  })
}

/// Fixed-width UTC form, so text comparison in SQL orders like time.
fn format_ts(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_ts(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
