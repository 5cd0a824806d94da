//! SQLite user store.
//!
//! One `users` table; the column layout matches databases written by
//! earlier deployments so they can be opened in place.

use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;

use super::password::{hash_password, new_salt};
use super::{
    StoreError, StoreResult, UserInfo, UserRecord, UserStore, UserUpdate, validate_username,
};
use crate::access::{HomeDir, PermissionSet};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT UNIQUE NOT NULL,
    password_hash TEXT NOT NULL,
    salt TEXT NOT NULL,
    permissions TEXT NOT NULL,
    home_dir TEXT NOT NULL
);
"#;

/// Persistent user store.
pub struct SqliteUserStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteUserStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteUserStore").finish_non_exhaustive()
    }
}

impl SqliteUserStore {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn parse_permissions(username: &str, raw: &str) -> StoreResult<PermissionSet> {
    PermissionSet::parse(raw).map_err(|_| StoreError::Corrupt {
        username: username.to_string(),
        field: "permissions",
    })
}

fn parse_home(username: &str, raw: &str) -> StoreResult<HomeDir> {
    HomeDir::parse(raw).ok_or_else(|| StoreError::Corrupt {
        username: username.to_string(),
        field: "home_dir",
    })
}

/// Raw row before the permission and home columns are validated.
struct RawUser {
    username: String,
    password_hash: String,
    salt: String,
    permissions: String,
    home_dir: String,
}

impl RawUser {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            username: row.get(0)?,
            password_hash: row.get(1)?,
            salt: row.get(2)?,
            permissions: row.get(3)?,
            home_dir: row.get(4)?,
        })
    }
}

impl UserStore for SqliteUserStore {
    fn lookup(&self, username: &str) -> StoreResult<Option<UserRecord>> {
        let conn = self.conn.lock();
        let raw = conn
            .query_row(
                "SELECT username, password_hash, salt, permissions, home_dir
                 FROM users WHERE username = ?1",
                params![username],
                RawUser::from_row,
            )
            .optional()?;

        let Some(raw) = raw else {
            return Ok(None);
        };
        Ok(Some(UserRecord {
            permissions: parse_permissions(&raw.username, &raw.permissions)?,
            home: parse_home(&raw.username, &raw.home_dir)?,
            username: raw.username,
            password_hash: raw.password_hash,
            salt: raw.salt,
        }))
    }

    fn list(&self) -> StoreResult<Vec<UserInfo>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT username, password_hash, salt, permissions, home_dir
             FROM users ORDER BY username",
        )?;
        let rows = stmt.query_map([], RawUser::from_row)?;

        let mut users = Vec::new();
        for raw in rows {
            let raw = raw?;
            users.push(UserInfo {
                permissions: parse_permissions(&raw.username, &raw.permissions)?,
                home: parse_home(&raw.username, &raw.home_dir)?,
                username: raw.username,
            });
        }
        Ok(users)
    }

    fn create(
        &self,
        username: &str,
        password: &str,
        permissions: PermissionSet,
        home: &HomeDir,
    ) -> StoreResult<()> {
        validate_username(username)?;
        let salt = new_salt();
        let hash = hash_password(password, &salt);

        let conn = self.conn.lock();
        let result = conn.execute(
            "INSERT INTO users (username, password_hash, salt, permissions, home_dir)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![username, hash, salt, permissions.to_string(), home.to_string()],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::Duplicate(username.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn update(&self, username: &str, update: &UserUpdate) -> StoreResult<bool> {
        let conn = self.conn.lock();
        let exists = conn
            .query_row(
                "SELECT 1 FROM users WHERE username = ?1",
                params![username],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if !exists {
            return Ok(false);
        }

        let tx = conn.unchecked_transaction()?;
        if let Some(password) = &update.password {
            let salt = new_salt();
            let hash = hash_password(password, &salt);
            tx.execute(
                "UPDATE users SET password_hash = ?1, salt = ?2 WHERE username = ?3",
                params![hash, salt, username],
            )?;
        }
        if let Some(permissions) = update.permissions {
            tx.execute(
                "UPDATE users SET permissions = ?1 WHERE username = ?2",
                params![permissions.to_string(), username],
            )?;
        }
        if let Some(home) = &update.home {
            tx.execute(
                "UPDATE users SET home_dir = ?1 WHERE username = ?2",
                params![home.to_string(), username],
            )?;
        }
        tx.commit()?;
        Ok(true)
    }

    fn delete(&self, username: &str) -> StoreResult<bool> {
        let conn = self.conn.lock();
        let n = conn.execute("DELETE FROM users WHERE username = ?1", params![username])?;
        Ok(n > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::password::verify_password;

    fn perms(s: &str) -> PermissionSet {
        PermissionSet::parse(s).unwrap()
    }

    #[test]
    fn test_user_crud() {
        let store = SqliteUserStore::in_memory().unwrap();
        let home = HomeDir::parse("D:\\data").unwrap();

        store.create("bob", "secret", perms("elr"), &home).unwrap();

        let bob = store.lookup("bob").unwrap().unwrap();
        assert_eq!(bob.permissions.to_string(), "elr");
        assert_eq!(bob.home, home);
        assert!(verify_password("secret", &bob.salt, &bob.password_hash));

        let users = store.list().unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].username, "bob");

        assert!(store.delete("bob").unwrap());
        assert!(store.lookup("bob").unwrap().is_none());
        assert!(!store.delete("bob").unwrap());
    }

    #[test]
    fn test_duplicate_username() {
        let store = SqliteUserStore::in_memory().unwrap();
        store.create("bob", "a", perms("elr"), &HomeDir::Unrestricted).unwrap();
        let err = store
            .create("bob", "b", perms("elr"), &HomeDir::Unrestricted)
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[test]
    fn test_update_regenerates_salt() {
        let store = SqliteUserStore::in_memory().unwrap();
        store.create("bob", "old", perms("elr"), &HomeDir::Unrestricted).unwrap();
        let before = store.lookup("bob").unwrap().unwrap();

        let update = UserUpdate {
            password: Some("new".into()),
            permissions: Some(perms("elradfmw")),
            home: None,
        };
        assert!(store.update("bob", &update).unwrap());

        let after = store.lookup("bob").unwrap().unwrap();
        assert_ne!(before.salt, after.salt);
        assert!(verify_password("new", &after.salt, &after.password_hash));
        assert!(!verify_password("old", &after.salt, &after.password_hash));
        assert_eq!(after.permissions.to_string(), "elradfmw");
        assert_eq!(after.home, HomeDir::Unrestricted);

        assert!(!store.update("ghost", &update).unwrap());
    }

    #[test]
    fn test_corrupt_rows_are_reported() {
        let store = SqliteUserStore::in_memory().unwrap();
        store
            .conn
            .lock()
            .execute(
                "INSERT INTO users (username, password_hash, salt, permissions, home_dir)
                 VALUES ('old', 'x', 'y', 'elrz', '/')",
                [],
            )
            .unwrap();
        assert!(matches!(
            store.lookup("old"),
            Err(StoreError::Corrupt { field: "permissions", .. })
        ));
    }

    #[test]
    fn test_reopen_from_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("users.db");
        {
            let store = SqliteUserStore::open(&path).unwrap();
            store.create("admin", "admin", perms("elradfmwMT"), &HomeDir::Unrestricted).unwrap();
        }
        let store = SqliteUserStore::open(&path).unwrap();
        let admin = store.lookup("admin").unwrap().unwrap();
        assert_eq!(admin.permissions.to_string(), "elradfmwMT");
    }
}
