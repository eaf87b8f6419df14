//! Database module for `SQLite` storage of materialized timelines

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, params};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::cache::LocalCache;
use crate::error::DatabaseError;
use crate::models::{Post, TimelineKey};
use crate::paths;

/// Database connection wrapper
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create the database at the default location
    pub fn open() -> Result<Self> {
        let path = Self::default_path()?;
        Self::open_path(&path)
    }

    /// Open or create the database at a specific path
    pub fn open_path(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create data directory")?;
        }

        let conn = Connection::open(path).context("Failed to open database")?;
        Self::with_connection(conn)
    }

    /// Open a throwaway database that lives in memory
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open database")?;
        Self::with_connection(conn)
    }

    /// Get the default database path
    pub fn default_path() -> Result<PathBuf> {
        paths::database_path()
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init().context("Failed to initialize database")?;
        Ok(db)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Initialize the database schema
    fn init(&self) -> Result<(), DatabaseError> {
        self.conn().execute_batch(
            r"
            -- One row per timeline owner
            CREATE TABLE IF NOT EXISTS timelines (
                timeline TEXT PRIMARY KEY,
                key_json TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- Materialized list, one row per displayed position
            CREATE TABLE IF NOT EXISTS timeline_posts (
                timeline TEXT NOT NULL,
                position INTEGER NOT NULL,
                post_id TEXT NOT NULL,
                post_json TEXT NOT NULL,
                PRIMARY KEY (timeline, position)
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_timeline_posts_post_id ON timeline_posts(timeline, post_id);
            ",
        )?;

        Ok(())
    }

    // ==================== Timelines ====================

    /// Keys of every timeline with a stored list
    pub fn timeline_keys(&self) -> Result<Vec<TimelineKey>, DatabaseError> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT key_json FROM timelines ORDER BY timeline")?;

        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut keys = Vec::new();
        for json in rows {
            keys.push(serde_json::from_str(&json?)?);
        }
        Ok(keys)
    }

    /// Number of posts stored for a timeline
    pub fn count_posts(&self, key: &TimelineKey) -> Result<usize, DatabaseError> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM timeline_posts WHERE timeline = ?1",
            params![key.cache_key()],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Drop every stored timeline
    pub fn clear_all(&self) -> Result<usize, DatabaseError> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM timeline_posts", [])?;
        let count = tx.execute("DELETE FROM timelines", [])?;
        tx.commit()?;

        tracing::info!("Cleared {} cached timelines", count);
        Ok(count)
    }
}

impl LocalCache for Database {
    type Error = DatabaseError;

    fn load(&self, key: &TimelineKey) -> Result<Vec<Post>, Self::Error> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT post_json FROM timeline_posts WHERE timeline = ?1 ORDER BY position",
        )?;

        let rows = stmt.query_map(params![key.cache_key()], |row| row.get::<_, String>(0))?;

        let mut posts = Vec::new();
        for json in rows {
            posts.push(serde_json::from_str(&json?)?);
        }
        Ok(posts)
    }

    fn replace(&self, key: &TimelineKey, posts: &[Post]) -> Result<(), Self::Error> {
        let timeline = key.cache_key();
        let key_json = serde_json::to_string(key)?;

        let mut conn = self.conn();
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM timeline_posts WHERE timeline = ?1",
            params![timeline],
        )?;
        {
            let mut insert = tx.prepare(
                r"INSERT INTO timeline_posts (timeline, position, post_id, post_json)
                   VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (position, post) in posts.iter().enumerate() {
                let position = i64::try_from(position).unwrap_or(i64::MAX);
                insert.execute(params![
                    timeline,
                    position,
                    post.id.as_str(),
                    serde_json::to_string(post)?,
                ])?;
            }
        }
        tx.execute(
            r"INSERT INTO timelines (timeline, key_json, updated_at) VALUES (?1, ?2, ?3)
               ON CONFLICT(timeline) DO UPDATE SET key_json = excluded.key_json, updated_at = excluded.updated_at",
            params![timeline, key_json, Utc::now().to_rfc3339()],
        )?;

        tx.commit()?;
        tracing::debug!("Cached {} posts for {}", posts.len(), key);
        Ok(())
    }

    fn clear(&self, key: &TimelineKey) -> Result<(), Self::Error> {
        let timeline = key.cache_key();

        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM timeline_posts WHERE timeline = ?1",
            params![timeline],
        )?;
        tx.execute("DELETE FROM timelines WHERE timeline = ?1", params![timeline])?;
        tx.commit()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PostId, TimelineKind};
    use crate::timeline::build_threads;
    use tempfile::tempdir;

    fn home() -> TimelineKey {
        TimelineKey::new("example.social", TimelineKind::Home)
    }

    fn posts(ids: &[&str]) -> Vec<Post> {
        ids.iter().map(|id| Post::new(*id)).collect()
    }

    #[test]
    fn test_database_init() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.sqlite");
        let db = Database::open_path(&path).unwrap();
        assert!(db.timeline_keys().unwrap().is_empty());
    }

    #[test]
    fn test_list_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.sqlite");

        {
            let db = Database::open_path(&path).unwrap();
            db.replace(&home(), &posts(&["30", "20", "10"])).unwrap();
        }

        let db = Database::open_path(&path).unwrap();
        let loaded = db.load(&home()).unwrap();
        let ids: Vec<&str> = loaded.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["30", "20", "10"]);
        assert_eq!(db.timeline_keys().unwrap(), vec![home()]);
    }

    #[test]
    fn test_replace_drops_previous_rows() {
        let db = Database::open_in_memory().unwrap();
        let latest = posts(&["9", "8"]);
        db.replace(&home(), &posts(&["5", "4", "3", "2", "1"])).unwrap();
        db.replace(&home(), &latest).unwrap();

        assert_eq!(db.count_posts(&home()).unwrap(), 2);
        assert_eq!(db.load(&home()).unwrap(), latest);
    }

    #[test]
    fn test_threaded_list_is_stored_as_is() {
        let db = Database::open_in_memory().unwrap();
        let mut list = vec![
            Post::new("4").replying_to("2"),
            Post::new("3").replying_to("2"),
            Post::new("2"),
            Post::new("1"),
        ];
        list[3].annotations.has_unloaded_status = true;
        let threaded = build_threads(list);
        assert!(threaded.iter().any(Post::is_anchor_copy));

        db.replace(&home(), &threaded).unwrap();
        assert_eq!(db.load(&home()).unwrap(), threaded);
    }

    #[test]
    fn test_timelines_are_isolated() {
        let db = Database::open_in_memory().unwrap();
        let tag = TimelineKey::new("example.social", TimelineKind::Hashtag("rust".into()));

        db.replace(&home(), &posts(&["2", "1"])).unwrap();
        db.replace(&tag, &posts(&["7"])).unwrap();
        db.clear(&home()).unwrap();

        assert!(db.load(&home()).unwrap().is_empty());
        assert_eq!(db.load(&tag).unwrap()[0].id, PostId::from("7"));
        assert_eq!(db.timeline_keys().unwrap(), vec![tag]);
    }

    #[test]
    fn test_clear_all() {
        let db = Database::open_in_memory().unwrap();
        let local = TimelineKey::new("example.social", TimelineKind::Local);
        db.replace(&home(), &posts(&["2", "1"])).unwrap();
        db.replace(&local, &posts(&["3"])).unwrap();

        assert_eq!(db.clear_all().unwrap(), 2);
        assert!(db.timeline_keys().unwrap().is_empty());
        assert_eq!(db.count_posts(&local).unwrap(), 0);
    }

    #[test]
    fn test_corrupt_row_is_reported() {
        let db = Database::open_in_memory().unwrap();
        db.replace(&home(), &posts(&["1"])).unwrap();
        db.conn()
            .execute("UPDATE timeline_posts SET post_json = 'not json'", [])
            .unwrap();

        assert!(matches!(db.load(&home()), Err(DatabaseError::Json(_))));
    }
}
