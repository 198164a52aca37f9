//! SQLite connection setup and schema migrations

use rusqlite::Connection as SyncConnection;
use tokio_rusqlite::Connection;

/// Open (or create) the database at `path` and return an async handle
/// to it. Every connection has foreign keys enabled.
pub async fn async_db(path: &str) -> Result<Connection, anyhow::Error> {
    let db = Connection::open(path).await?;
    db.call(|conn| {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(())
    })
    .await?;
    Ok(db)
}

/// In-memory database with the schema already applied.
pub async fn memory_db() -> Result<Connection, anyhow::Error> {
    let db = Connection::open_in_memory().await?;
    db.call(|conn| {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_db(conn)?;
        Ok(())
    })
    .await?;
    Ok(db)
}

/// Create every table the service needs. Safe to run repeatedly.
pub fn initialize_db(conn: &SyncConnection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS meetings (
            user_id TEXT NOT NULL,
            id TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT,
            start_time TEXT NOT NULL,
            end_time TEXT NOT NULL,
            duration_minutes INTEGER NOT NULL,
            location TEXT,
            meeting_url TEXT,
            organizer_email TEXT NOT NULL,
            organizer_name TEXT NOT NULL,
            cached_at INTEGER NOT NULL,
            PRIMARY KEY (user_id, id)
        );

        CREATE TABLE IF NOT EXISTS meeting_attendees (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            meeting_id TEXT NOT NULL,
            email TEXT NOT NULL,
            name TEXT NOT NULL,
            response_status TEXT NOT NULL DEFAULT 'needsAction',
            FOREIGN KEY (user_id, meeting_id)
                REFERENCES meetings (user_id, id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS user_calendar_connections (
            user_id TEXT PRIMARY KEY NOT NULL,
            provider TEXT NOT NULL DEFAULT 'google',
            access_token TEXT,
            refresh_token TEXT,
            expires_at INTEGER,
            scope TEXT,
            error TEXT,
            error_description TEXT,
            updated_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS session (
            id TEXT PRIMARY KEY NOT NULL,
            user_id TEXT NOT NULL,
            name TEXT,
            picture TEXT,
            expires_at INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS oauth_state (
            state TEXT PRIMARY KEY NOT NULL,
            callback_url TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_meetings_user_start ON meetings (user_id, start_time);
        CREATE INDEX IF NOT EXISTS idx_attendees_meeting ON meeting_attendees (user_id, meeting_id);
        CREATE INDEX IF NOT EXISTS idx_session_expires ON session (expires_at);
        "#,
    )
}

/// Apply schema changes to an existing database.
pub fn migrate_db(conn: &SyncConnection) -> Result<(), rusqlite::Error> {
    initialize_db(conn)
}
