//! User store.
//!
//! The access controller only ever calls [`UserStore::lookup`]; the rest of
//! the trait exists for the admin tooling.
//!
//! - [`SqliteUserStore`] - The persistent store (`users` table)
//! - [`MemoryUserStore`] - In-process store for tests and embedding

mod memory;
pub mod password;
mod sqlite;

pub use memory::MemoryUserStore;
pub use sqlite::SqliteUserStore;

use thiserror::Error;

use crate::access::{ANONYMOUS, HomeDir, PermissionSet};
use crate::config::SeedUser;
use crate::error::GateError;

/// User store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("user already exists: {0}")]
    Duplicate(String),

    #[error("username is reserved: {0}")]
    Reserved(String),

    #[error("invalid username: {0:?}")]
    InvalidUsername(String),

    #[error("invalid permissions: {0}")]
    InvalidPermissions(String),

    #[error("invalid home directory: {0}")]
    InvalidHome(String),

    #[error("corrupt record for {username}: bad {field}")]
    Corrupt { username: String, field: &'static str },
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for GateError {
    fn from(e: StoreError) -> Self {
        GateError::Store(e.to_string())
    }
}

/// A stored account, credentials included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub username: String,
    pub password_hash: String,
    pub salt: String,
    pub permissions: PermissionSet,
    pub home: HomeDir,
}

/// A stored account without credentials, as listed by admin tooling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub username: String,
    pub permissions: PermissionSet,
    pub home: HomeDir,
}

impl From<&UserRecord> for UserInfo {
    fn from(r: &UserRecord) -> Self {
        Self {
            username: r.username.clone(),
            permissions: r.permissions,
            home: r.home.clone(),
        }
    }
}

/// Partial update; `None` fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    /// New password. A new salt is generated with it.
    pub password: Option<String>,
    pub permissions: Option<PermissionSet>,
    pub home: Option<HomeDir>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.password.is_none() && self.permissions.is_none() && self.home.is_none()
    }
}

/// Account storage consulted by the access controller.
pub trait UserStore: Send + Sync {
    fn lookup(&self, username: &str) -> StoreResult<Option<UserRecord>>;

    /// All accounts ordered by username.
    fn list(&self) -> StoreResult<Vec<UserInfo>>;

    fn create(
        &self,
        username: &str,
        password: &str,
        permissions: PermissionSet,
        home: &HomeDir,
    ) -> StoreResult<()>;

    /// Returns false if the user does not exist.
    fn update(&self, username: &str, update: &UserUpdate) -> StoreResult<bool>;

    /// Returns false if the user does not exist.
    fn delete(&self, username: &str) -> StoreResult<bool>;
}

/// Usernames the store accepts: non-empty, no whitespace, not the
/// built-in anonymous identity.
pub(crate) fn validate_username(username: &str) -> StoreResult<()> {
    if username.eq_ignore_ascii_case(ANONYMOUS) {
        return Err(StoreError::Reserved(username.to_string()));
    }
    if username.is_empty() || username.chars().any(char::is_whitespace) {
        return Err(StoreError::InvalidUsername(username.to_string()));
    }
    Ok(())
}

/// Create every configured user that does not exist yet.
///
/// Existing accounts are never touched. Returns the names created.
pub fn seed_users(store: &dyn UserStore, seeds: &[SeedUser]) -> StoreResult<Vec<String>> {
    let mut created = Vec::new();
    for seed in seeds {
        if store.lookup(&seed.username)?.is_some() {
            continue;
        }
        let permissions = PermissionSet::parse(&seed.permissions)
            .map_err(|c| StoreError::InvalidPermissions(format!("{c:?} for {}", seed.username)))?;
        let home = HomeDir::parse(&seed.home)
            .ok_or_else(|| StoreError::InvalidHome(seed.home.clone()))?;
        store.create(&seed.username, &seed.password, permissions, &home)?;
        tracing::info!(username = %seed.username, "seeded user");
        created.push(seed.username.clone());
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeding_skips_existing_users() {
        let store = MemoryUserStore::new();
        let seeds = vec![
            SeedUser {
                username: "admin".into(),
                password: "admin".into(),
                permissions: "elradfmwMT".into(),
                home: "/".into(),
            },
            SeedUser {
                username: "bob".into(),
                password: "pw".into(),
                permissions: "elr".into(),
                home: "D:\\data".into(),
            },
        ];

        let created = seed_users(&store, &seeds).unwrap();
        assert_eq!(created, vec!["admin", "bob"]);

        let again = seed_users(&store, &seeds).unwrap();
        assert!(again.is_empty());
        assert_eq!(store.list().unwrap().len(), 2);
    }

    #[test]
    fn seeding_rejects_bad_values() {
        let store = MemoryUserStore::new();
        let bad = SeedUser {
            username: "eve".into(),
            password: "pw".into(),
            permissions: "elrz".into(),
            home: "/".into(),
        };
        assert!(matches!(
            seed_users(&store, &[bad]),
            Err(StoreError::InvalidPermissions(_))
        ));
    }

    #[test]
    fn reserved_and_malformed_usernames() {
        assert!(matches!(validate_username("Anonymous"), Err(StoreError::Reserved(_))));
        assert!(matches!(validate_username(""), Err(StoreError::InvalidUsername(_))));
        assert!(matches!(validate_username("a b"), Err(StoreError::InvalidUsername(_))));
        assert!(validate_username("bob").is_ok());
    }
}
