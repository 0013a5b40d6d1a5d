/// Schema for the local session and driver tables.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    session_key INTEGER PRIMARY KEY,
    meeting_key INTEGER NOT NULL,
    session_name TEXT NOT NULL,
    session_type TEXT NOT NULL,
    circuit_name TEXT NOT NULL,
    circuit_short_name TEXT NOT NULL,
    country_name TEXT NOT NULL,
    country_code TEXT NOT NULL,
    date_start TEXT NOT NULL,
    date_end TEXT,
    year INTEGER NOT NULL,
    is_live INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_sessions_year ON sessions(year);
CREATE INDEX IF NOT EXISTS idx_sessions_date_start ON sessions(date_start);

CREATE TABLE IF NOT EXISTS drivers (
    driver_number INTEGER PRIMARY KEY,
    full_name TEXT NOT NULL,
    name_acronym TEXT NOT NULL,
    team_name TEXT NOT NULL,
    team_colour TEXT NOT NULL,
    headshot_url TEXT NOT NULL,
    country_code TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;
