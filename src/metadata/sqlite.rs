//! SQLite-backed metadata store.
//!
//! Uses `rusqlite` with the `bundled` feature so no system SQLite
//! library is required.  All async trait methods are thin wrappers
//! around synchronous rusqlite calls executed under a `Mutex`.
//!
//! UUIDs and timestamps are stored as TEXT (hyphenated UUIDs and RFC 3339
//! with microseconds, which sort chronologically).

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::store::{MetadataStore, VideoRecord};

/// Current schema version. Bumped when migrations are added.
const SCHEMA_VERSION: i64 = 1;

const VIDEO_COLUMNS: &str =
    "id, created_at, updated_at, title, description, thumbnail_url, video_url, user_id";

/// Metadata store backed by a single SQLite database file.
pub struct SqliteMetadataStore {
    /// The database connection, guarded by a mutex for Send + Sync.
    conn: Mutex<Connection>,
}

/// Raw column values, converted outside the rusqlite row callback.
struct RawVideo {
    id: String,
    created_at: String,
    updated_at: String,
    title: String,
    description: String,
    thumbnail_url: Option<String>,
    video_url: Option<String>,
    user_id: String,
}

impl RawVideo {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            created_at: row.get(1)?,
            updated_at: row.get(2)?,
            title: row.get(3)?,
            description: row.get(4)?,
            thumbnail_url: row.get(5)?,
            video_url: row.get(6)?,
            user_id: row.get(7)?,
        })
    }

    fn into_record(self) -> anyhow::Result<VideoRecord> {
        Ok(VideoRecord {
            id: Uuid::parse_str(&self.id)?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            title: self.title,
            description: self.description,
            thumbnail_url: self.thumbnail_url,
            video_url: self.video_url,
            user_id: Uuid::parse_str(&self.user_id)?,
        })
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> anyhow::Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}

impl SqliteMetadataStore {
    /// Open (or create) the database at `path` and initialize the schema.
    ///
    /// Passing `":memory:"` creates an in-memory database (useful for tests).
    pub fn new(path: &str) -> anyhow::Result<Self> {
        if path != ":memory:" {
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.apply_pragmas()?;
        store.init_db()?;
        Ok(store)
    }

    /// Apply recommended SQLite pragmas for performance and safety.
    fn apply_pragmas(&self) -> anyhow::Result<()> {
        let conn = self.conn.lock().expect("mutex poisoned");
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            ",
        )?;
        Ok(())
    }

    /// Create the required tables and indexes if they do not already exist.
    /// This is idempotent -- safe to call on every startup (crash-only design).
    fn init_db(&self) -> anyhow::Result<()> {
        let conn = self.conn.lock().expect("mutex poisoned");
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS schema_version (
                version    INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS videos (
                id            TEXT PRIMARY KEY,
                created_at    TEXT NOT NULL,
                updated_at    TEXT NOT NULL,
                title         TEXT NOT NULL,
                description   TEXT NOT NULL DEFAULT '',
                thumbnail_url TEXT,
                video_url     TEXT,
                user_id       TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_videos_user
                ON videos(user_id, created_at);
            ",
        )?;
        conn.execute(
            "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?1, ?2)",
            params![SCHEMA_VERSION, format_timestamp(&Utc::now())],
        )?;
        Ok(())
    }
}

impl MetadataStore for SqliteMetadataStore {
    fn create_video(
        &self,
        record: &VideoRecord,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        let record = record.clone();
        Box::pin(async move {
            let conn = self.conn.lock().expect("mutex poisoned");
            conn.execute(
                "INSERT INTO videos
                    (id, created_at, updated_at, title, description, thumbnail_url, video_url, user_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.id.to_string(),
                    format_timestamp(&record.created_at),
                    format_timestamp(&record.updated_at),
                    record.title,
                    record.description,
                    record.thumbnail_url,
                    record.video_url,
                    record.user_id.to_string(),
                ],
            )?;
            Ok(())
        })
    }

    fn get_video(
        &self,
        id: Uuid,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<VideoRecord>>> + Send + '_>> {
        Box::pin(async move {
            let raw = {
                let conn = self.conn.lock().expect("mutex poisoned");
                conn.query_row(
                    &format!("SELECT {VIDEO_COLUMNS} FROM videos WHERE id = ?1"),
                    params![id.to_string()],
                    RawVideo::from_row,
                )
                .optional()?
            };
            raw.map(RawVideo::into_record).transpose()
        })
    }

    fn update_video(
        &self,
        record: &VideoRecord,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        let record = record.clone();
        Box::pin(async move {
            let conn = self.conn.lock().expect("mutex poisoned");
            let changed = conn.execute(
                "UPDATE videos
                 SET created_at = ?2, updated_at = ?3, title = ?4, description = ?5,
                     thumbnail_url = ?6, video_url = ?7, user_id = ?8
                 WHERE id = ?1",
                params![
                    record.id.to_string(),
                    format_timestamp(&record.created_at),
                    format_timestamp(&record.updated_at),
                    record.title,
                    record.description,
                    record.thumbnail_url,
                    record.video_url,
                    record.user_id.to_string(),
                ],
            )?;
            if changed == 0 {
                anyhow::bail!("video {} not found", record.id);
            }
            Ok(())
        })
    }

    fn list_videos(
        &self,
        user_id: Uuid,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<VideoRecord>>> + Send + '_>> {
        Box::pin(async move {
            let rows = {
                let conn = self.conn.lock().expect("mutex poisoned");
                let mut stmt = conn.prepare(&format!(
                    "SELECT {VIDEO_COLUMNS} FROM videos WHERE user_id = ?1 ORDER BY created_at DESC"
                ))?;
                let rows = stmt
                    .query_map(params![user_id.to_string()], RawVideo::from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            };
            rows.into_iter().map(RawVideo::into_record).collect()
        })
    }
}
