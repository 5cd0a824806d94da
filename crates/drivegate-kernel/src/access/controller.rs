//! Authentication and permission evaluation.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::identity::{ANONYMOUS, HomeDir, Identity};
use super::permission::Permission;
use crate::config::TraceConfig;
use crate::error::{GateError, GateResult};
use crate::namespace::{DriveSource, NativePath, Target};
use crate::users::UserStore;
use crate::users::password::verify_password;

/// Prefix of the synthetic shortcut names (`Disc_C`, `Disc_E`, ...).
pub const ALIAS_PREFIX: &str = "Disc_";

/// Access decisions the protocol engine asks for.
pub trait AccessPolicy: Send + Sync {
    /// Check credentials. `anonymous` always succeeds.
    fn authenticate(&self, username: &str, password: &str) -> GateResult<Identity>;

    /// May `identity` exercise `perm` on `target`?
    fn has_permission(&self, identity: &Identity, perm: Permission, target: &Target) -> bool;

    /// Shortcut name → drive root, for identities confined to one drive.
    fn virtual_aliases(&self, identity: &Identity) -> BTreeMap<String, NativePath>;
}

/// The [`AccessPolicy`] backed by a [`UserStore`].
///
/// Stateless apart from its collaborators; one instance serves every
/// session.
#[derive(Clone)]
pub struct AccessController {
    store: Arc<dyn UserStore>,
    drives: Arc<dyn DriveSource>,
    trace: TraceConfig,
}

impl std::fmt::Debug for AccessController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessController")
            .field("trace", &self.trace)
            .finish_non_exhaustive()
    }
}

impl AccessController {
    pub fn new(store: Arc<dyn UserStore>, drives: Arc<dyn DriveSource>, trace: TraceConfig) -> Self {
        Self {
            store,
            drives,
            trace,
        }
    }

    pub fn store(&self) -> &Arc<dyn UserStore> {
        &self.store
    }

    fn evaluate(identity: &Identity, perm: Permission, target: &Target) -> bool {
        // Everyone may see and enter the drive picker.
        if target.is_root() && matches!(perm, Permission::Enter | Permission::List) {
            return true;
        }

        if identity.is_anonymous() {
            return matches!(perm, Permission::Enter | Permission::List | Permission::Read);
        }

        if !identity.permissions.contains(perm) {
            return false;
        }

        match (&identity.home, target) {
            (HomeDir::Unrestricted, _) => true,
            (_, Target::Root) => false,
            (HomeDir::Drive(home), Target::Native(path)) => path.drive() == *home,
            (HomeDir::Directory(home), Target::Native(path)) => path.is_within(home),
        }
    }
}

impl AccessPolicy for AccessController {
    fn authenticate(&self, username: &str, password: &str) -> GateResult<Identity> {
        if username == ANONYMOUS {
            return Ok(Identity::anonymous());
        }

        let record = self
            .store
            .lookup(username)?
            .ok_or_else(|| GateError::auth_failed(username))?;

        if !verify_password(password, &record.salt, &record.password_hash) {
            return Err(GateError::auth_failed(username));
        }

        Ok(Identity {
            username: record.username,
            permissions: record.permissions,
            home: record.home,
        })
    }

    fn has_permission(&self, identity: &Identity, perm: Permission, target: &Target) -> bool {
        let allowed = Self::evaluate(identity, perm, target);
        if self.trace.permissions {
            tracing::debug!(
                target: "drivegate::access",
                username = %identity.username,
                perm = %perm,
                target = %target,
                allowed,
                "permission checked"
            );
        }
        allowed
    }

    fn virtual_aliases(&self, identity: &Identity) -> BTreeMap<String, NativePath> {
        let HomeDir::Drive(home) = identity.home else {
            return BTreeMap::new();
        };
        self.drives
            .mounted()
            .into_iter()
            .filter(|d| *d != home)
            .map(|d| (format!("{ALIAS_PREFIX}{d}"), d.native_root()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::PermissionSet;
    use crate::namespace::{DriveLetter, DriveTable};
    use crate::users::MemoryUserStore;
    use tempfile::TempDir;

    fn target(s: &str) -> Target {
        Target::parse(s).unwrap()
    }

    fn identity(perms: &str, home: &str) -> Identity {
        Identity {
            username: "someone".into(),
            permissions: PermissionSet::parse(perms).unwrap(),
            home: HomeDir::parse(home).unwrap(),
        }
    }

    fn controller_with(drives: DriveTable) -> AccessController {
        let store = MemoryUserStore::new();
        store
            .create(
                "bob",
                "builder",
                PermissionSet::parse("elr").unwrap(),
                &HomeDir::parse("D:\\data").unwrap(),
            )
            .unwrap();
        AccessController::new(Arc::new(store), Arc::new(drives), TraceConfig::all())
    }

    fn controller() -> AccessController {
        controller_with(DriveTable::default())
    }

    #[test]
    fn authenticate_checks_the_hash() {
        let ac = controller();
        let bob = ac.authenticate("bob", "builder").unwrap();
        assert_eq!(bob.username, "bob");
        assert_eq!(bob.home.to_string(), "D:\\data");

        assert!(matches!(ac.authenticate("bob", "wrong"), Err(GateError::AuthFailed(_))));
        assert!(matches!(ac.authenticate("nobody", "x"), Err(GateError::AuthFailed(_))));
    }

    #[test]
    fn anonymous_ignores_the_store() {
        let store = MemoryUserStore::new();
        let ac = AccessController::new(
            Arc::new(store),
            Arc::new(DriveTable::default()),
            TraceConfig::default(),
        );
        let anon = ac.authenticate("anonymous", "whatever@example.com").unwrap();
        assert_eq!(anon, Identity::anonymous());

        assert!(ac.has_permission(&anon, Permission::Read, &target("C:\\secret.txt")));
        assert!(!ac.has_permission(&anon, Permission::Write, &target("C:\\x")));
        assert!(!ac.has_permission(&anon, Permission::Delete, &target("C:\\x")));
    }

    #[test]
    fn unrestricted_home_reduces_to_membership() {
        let ac = controller();
        let u = identity("elrw", "/");
        for path in ["C:\\", "D:\\data\\x", "Z:\\deep\\er"] {
            for c in "elradfmwMT".chars() {
                let perm = Permission::from_char(c).unwrap();
                assert_eq!(
                    ac.has_permission(&u, perm, &target(path)),
                    u.permissions.contains(perm),
                    "{c} on {path}"
                );
            }
        }
    }

    #[test]
    fn directory_home_confines_to_the_subtree() {
        let ac = controller();
        let bob = ac.authenticate("bob", "builder").unwrap();

        assert!(ac.has_permission(&bob, Permission::Read, &target("D:\\data\\file.txt")));
        assert!(ac.has_permission(&bob, Permission::Enter, &target("d:\\data")));
        assert!(!ac.has_permission(&bob, Permission::Read, &target("C:\\anything")));
        assert!(!ac.has_permission(&bob, Permission::Read, &target("D:\\database")));
        assert!(!ac.has_permission(&bob, Permission::Enter, &target("D:\\")));
        assert!(!ac.has_permission(&bob, Permission::Write, &target("D:\\data\\file.txt")));

        // The drive picker stays visible.
        assert!(ac.has_permission(&bob, Permission::Enter, &Target::Root));
        assert!(ac.has_permission(&bob, Permission::List, &Target::Root));
        assert!(!ac.has_permission(&bob, Permission::Read, &Target::Root));
    }

    #[test]
    fn drive_home_confines_to_the_drive() {
        let ac = controller();
        let u = identity("elrw", "D:\\");
        assert!(ac.has_permission(&u, Permission::Write, &target("D:\\")));
        assert!(ac.has_permission(&u, Permission::Write, &target("D:\\any\\where")));
        assert!(!ac.has_permission(&u, Permission::Enter, &target("C:\\")));
        assert!(!ac.has_permission(&u, Permission::Write, &Target::Root));
    }

    #[test]
    fn aliases_cover_the_other_mounted_drives() {
        let c = TempDir::new().unwrap();
        let d = TempDir::new().unwrap();
        let e = TempDir::new().unwrap();
        let letter = |ch| DriveLetter::new(ch).unwrap();
        let ac = controller_with(DriveTable::mapped([
            (letter('C'), c.path().to_path_buf()),
            (letter('D'), d.path().to_path_buf()),
            (letter('E'), e.path().to_path_buf()),
        ]));

        let on_d = identity("elr", "D:\\");
        let aliases = ac.virtual_aliases(&on_d);
        let names: Vec<_> = aliases.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["Disc_C", "Disc_E"]);
        assert_eq!(aliases["Disc_E"].to_string(), "E:\\");

        drop(e);
        assert_eq!(ac.virtual_aliases(&on_d).len(), 1);

        assert!(ac.virtual_aliases(&identity("elr", "D:\\data")).is_empty());
        assert!(ac.virtual_aliases(&identity("elr", "/")).is_empty());
    }
}
