use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Result as SqlResult, params};
use std::path::Path;

use super::models::StoredSession;
use crate::common::{AuthSession, AuthUser};

/// Keeps the signed-in session across restarts (single row).
pub struct SessionCache {
    conn: Connection,
}

impl SessionCache {
    /// Initialize the cache at `<data_dir>/session.db`
    pub fn in_dir<P: AsRef<Path>>(data_dir: P) -> SqlResult<Self> {
        Self::with_path(data_dir.as_ref().join("session.db"))
    }

    /// Initialize the cache at custom path
    pub fn with_path<P: AsRef<Path>>(path: P) -> SqlResult<Self> {
        let cache = Self {
            conn: Connection::open(path)?,
        };
        cache.init_schema()?;
        Ok(cache)
    }

    pub fn in_memory() -> SqlResult<Self> {
        let cache = Self {
            conn: Connection::open_in_memory()?,
        };
        cache.init_schema()?;
        Ok(cache)
    }

    fn init_schema(&self) -> SqlResult<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS session (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                user_id TEXT NOT NULL,
                email TEXT NOT NULL,
                name TEXT NOT NULL,
                access_token TEXT NOT NULL,
                refresh_token TEXT,
                expires_at TEXT
            )",
            [],
        )?;
        Ok(())
    }

    /// Save session (replace if exists)
    pub fn save(&self, session: &AuthSession) -> SqlResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO session
                (id, user_id, email, name, access_token, refresh_token, expires_at)
             VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                session.user.id,
                session.user.email,
                session.user.name,
                session.access_token,
                session.refresh_token,
                session.expires_at,
            ],
        )?;
        Ok(())
    }

    pub fn load(&self) -> SqlResult<Option<StoredSession>> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id, email, name, access_token, refresh_token, expires_at
             FROM session WHERE id = 1",
        )?;

        stmt.query_row([], |row| {
            Ok(StoredSession {
                user_id: row.get(0)?,
                email: row.get(1)?,
                name: row.get(2)?,
                access_token: row.get(3)?,
                refresh_token: row.get(4)?,
                expires_at: row.get::<_, Option<DateTime<Utc>>>(5)?,
            })
        })
        .optional()
    }

    pub fn clear(&self) -> SqlResult<()> {
        self.conn.execute("DELETE FROM session", [])?;
        Ok(())
    }
}

impl From<StoredSession> for AuthSession {
    fn from(stored: StoredSession) -> Self {
        AuthSession {
            access_token: stored.access_token,
            refresh_token: stored.refresh_token,
            expires_at: stored.expires_at,
            user: AuthUser {
                id: stored.user_id,
                email: stored.email,
                name: stored.name,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, SubsecRound};

    fn session() -> AuthSession {
        AuthSession {
            access_token: "jwt".into(),
            refresh_token: Some("refresh".into()),
            expires_at: Some((Utc::now() + Duration::hours(1)).trunc_subsecs(0)),
            user: AuthUser {
                id: "u1".into(),
                email: "alice@example.com".into(),
                name: "Alice".into(),
            },
        }
    }

    #[test]
    fn save_then_load_restores_session() {
        let cache = SessionCache::in_memory().unwrap();
        assert!(cache.load().unwrap().is_none());

        let original = session();
        cache.save(&original).unwrap();
        let restored: AuthSession = cache.load().unwrap().unwrap().into();
        assert_eq!(restored, original);
    }

    #[test]
    fn save_replaces_previous_row_and_clear_removes_it() {
        let cache = SessionCache::in_memory().unwrap();
        cache.save(&session()).unwrap();

        let mut next = session();
        next.access_token = "jwt-2".into();
        cache.save(&next).unwrap();
        assert_eq!(cache.load().unwrap().unwrap().access_token, "jwt-2");

        cache.clear().unwrap();
        assert!(cache.load().unwrap().is_none());
    }

    #[test]
    fn file_backed_cache_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        SessionCache::in_dir(dir.path()).unwrap().save(&session()).unwrap();

        let reopened = SessionCache::in_dir(dir.path()).unwrap();
        assert_eq!(reopened.load().unwrap().unwrap().user_id, "u1");
    }
}
