//! Play history, saved tracks and model exchange log, stored in SQLite.
//!
//! Three tables live in `<data_dir>/radiofree/history.db`:
//!
//! - `plays`: one row per observed track change, with who queued it and the
//!   listener's like/skip feedback
//! - `saved`: tracks the listener bookmarked
//! - `exchanges`: one row per prompt/response pair
//!
//! None of it feeds back into recommendation decisions; the in-memory
//! [`RecentHistory`](crate::track::RecentHistory) is what filters repeats.

use crate::error::DjResult;
use crate::track::TrackRef;
use log::{debug, info};
use rusqlite::{params, Connection};
use std::fmt;
use std::path::Path;
use std::sync::Mutex;

/// Who put a played track in front of the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueuedBy {
    /// Came out of the up-next queue.
    Dj,
    /// Picked by the listener, e.g. a mystery choice.
    User,
    Unknown,
}

impl QueuedBy {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QueuedBy::Dj => "dj",
            QueuedBy::User => "user",
            QueuedBy::Unknown => "unknown",
        }
    }
}

impl fmt::Display for QueuedBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Listener feedback on a play.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feedback {
    Liked,
    Skipped,
}

/// One row of the `plays` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayRecord {
    pub track: TrackRef,
    /// SQLite `datetime('now')` text, UTC.
    pub played_at: String,
    pub queued_by: String,
    pub liked: bool,
    pub skipped: bool,
}

/// One row of the `saved` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedTrack {
    pub track: TrackRef,
    pub saved_at: String,
}

/// Columns added to `plays` after the first schema, with their definitions.
const PLAY_COLUMNS: &[(&str, &str)] = &[
    ("queued_by", "TEXT NOT NULL DEFAULT 'unknown'"),
    ("liked", "INTEGER NOT NULL DEFAULT 0"),
    ("skipped", "INTEGER NOT NULL DEFAULT 0"),
];

/// Handle to the history database.
///
/// The connection sits behind a `Mutex` so the store can be shared with the
/// model client's exchange logging.
pub struct HistoryStore {
    conn: Mutex<Connection>,
}

impl HistoryStore {
    /// Open (or create) the database at `path` and ensure the schema exists.
    pub fn open(path: &Path) -> DjResult<Self> {
        debug!("Opening history database at {}", path.display());
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> DjResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> DjResult<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS plays (
                id          INTEGER PRIMARY KEY,
                track_name  TEXT NOT NULL,
                artist_name TEXT NOT NULL,
                played_at   TEXT NOT NULL DEFAULT (datetime('now'))
            );
            CREATE TABLE IF NOT EXISTS saved (
                id          INTEGER PRIMARY KEY,
                track_name  TEXT NOT NULL,
                artist_name TEXT NOT NULL,
                saved_at    TEXT NOT NULL DEFAULT (datetime('now'))
            );
            CREATE TABLE IF NOT EXISTS exchanges (
                id         INTEGER PRIMARY KEY,
                prompt     TEXT NOT NULL,
                response   TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );",
        )?;
        add_missing_play_columns(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn record_play(&self, track: &TrackRef, queued_by: QueuedBy) -> DjResult<()> {
        self.lock().execute(
            "INSERT INTO plays (track_name, artist_name, queued_by) VALUES (?1, ?2, ?3)",
            params![track.track_name, track.artist_name, queued_by.as_str()],
        )?;
        Ok(())
    }

    /// Flag the latest play of `track`.
    ///
    /// When the track was never recorded a listener-attributed play is
    /// inserted carrying the flag.
    pub fn mark_latest(&self, track: &TrackRef, feedback: Feedback) -> DjResult<()> {
        let column = match feedback {
            Feedback::Liked => "liked",
            Feedback::Skipped => "skipped",
        };
        let conn = self.lock();
        let updated = conn.execute(
            &format!(
                "UPDATE plays SET {column} = 1 WHERE id = (
                    SELECT MAX(id) FROM plays WHERE track_name = ?1 AND artist_name = ?2
                )"
            ),
            params![track.track_name, track.artist_name],
        )?;
        if updated == 0 {
            conn.execute(
                &format!(
                    "INSERT INTO plays (track_name, artist_name, queued_by, {column})
                     VALUES (?1, ?2, ?3, 1)"
                ),
                params![track.track_name, track.artist_name, QueuedBy::User.as_str()],
            )?;
        }
        info!("Marked {track} as {column}");
        Ok(())
    }

    pub fn save_track(&self, track: &TrackRef) -> DjResult<()> {
        self.lock().execute(
            "INSERT INTO saved (track_name, artist_name) VALUES (?1, ?2)",
            params![track.track_name, track.artist_name],
        )?;
        Ok(())
    }

    pub fn record_exchange(&self, prompt: &str, response: &str) -> DjResult<()> {
        self.lock().execute(
            "INSERT INTO exchanges (prompt, response) VALUES (?1, ?2)",
            params![prompt, response],
        )?;
        Ok(())
    }

    /// Latest `limit` plays, newest first.
    pub fn recent_plays(&self, limit: usize) -> DjResult<Vec<PlayRecord>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT track_name, artist_name, played_at, queued_by, liked, skipped
             FROM plays ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![sql_limit(limit)], |row| {
            Ok(PlayRecord {
                track: TrackRef::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?),
                played_at: row.get(2)?,
                queued_by: row.get(3)?,
                liked: row.get(4)?,
                skipped: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Latest `limit` saved tracks, newest first.
    pub fn saved_tracks(&self, limit: usize) -> DjResult<Vec<SavedTrack>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT track_name, artist_name, saved_at FROM saved ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![sql_limit(limit)], |row| {
            Ok(SavedTrack {
                track: TrackRef::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?),
                saved_at: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn exchange_count(&self) -> DjResult<usize> {
        let count: i64 = self
            .lock()
            .query_row("SELECT COUNT(*) FROM exchanges", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

/// Bring a `plays` table created before the feedback columns up to date.
fn add_missing_play_columns(conn: &Connection) -> DjResult<()> {
    let existing: Vec<String> = {
        let mut stmt = conn.prepare("PRAGMA table_info(plays)")?;
        let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
        names.collect::<Result<Vec<_>, _>>()?
    };
    for (name, definition) in PLAY_COLUMNS {
        if !existing.iter().any(|column| column == name) {
            debug!("Adding plays.{name}");
            conn.execute_batch(&format!("ALTER TABLE plays ADD COLUMN {name} {definition};"))?;
        }
    }
    Ok(())
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}
