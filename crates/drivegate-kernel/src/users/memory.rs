//! In-process user store.

use parking_lot::RwLock;
use std::collections::BTreeMap;

use super::password::{hash_password, new_salt};
use super::{
    StoreError, StoreResult, UserInfo, UserRecord, UserStore, UserUpdate, validate_username,
};
use crate::access::{HomeDir, PermissionSet};

/// User store held in memory. Contents are lost on drop.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: RwLock<BTreeMap<String, UserRecord>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserStore for MemoryUserStore {
    fn lookup(&self, username: &str) -> StoreResult<Option<UserRecord>> {
        Ok(self.users.read().get(username).cloned())
    }

    fn list(&self) -> StoreResult<Vec<UserInfo>> {
        Ok(self.users.read().values().map(UserInfo::from).collect())
    }

    fn create(
        &self,
        username: &str,
        password: &str,
        permissions: PermissionSet,
        home: &HomeDir,
    ) -> StoreResult<()> {
        validate_username(username)?;
        let mut users = self.users.write();
        if users.contains_key(username) {
            return Err(StoreError::Duplicate(username.to_string()));
        }
        let salt = new_salt();
        users.insert(
            username.to_string(),
            UserRecord {
                username: username.to_string(),
                password_hash: hash_password(password, &salt),
                salt,
                permissions,
                home: home.clone(),
            },
        );
        Ok(())
    }

    fn update(&self, username: &str, update: &UserUpdate) -> StoreResult<bool> {
        let mut users = self.users.write();
        let Some(record) = users.get_mut(username) else {
            return Ok(false);
        };
        if let Some(password) = &update.password {
            record.salt = new_salt();
            record.password_hash = hash_password(password, &record.salt);
        }
        if let Some(permissions) = update.permissions {
            record.permissions = permissions;
        }
        if let Some(home) = &update.home {
            record.home = home.clone();
        }
        Ok(true)
    }

    fn delete(&self, username: &str) -> StoreResult<bool> {
        Ok(self.users.write().remove(username).is_some())
    }
}
