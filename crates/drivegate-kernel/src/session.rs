//! Per-connection session state.
//!
//! A [`SessionHandler`] owns one connection's login state and working
//! directory and answers protocol operations by consulting an
//! [`AccessPolicy`] first and a [`NamespaceProvider`] second. A failing
//! operation never changes the cwd or the identity.
//!
//! ```text
//! Unauthenticated --USER--> AwaitingPassword --PASS ok--> Authenticated
//!        ^                        |                            |
//!        +-------PASS failed------+                            |
//!  (any state) --close--> Closed <-----------------------------+
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::access::{AccessPolicy, Identity, Permission};
use crate::error::GateError;
use crate::namespace::{DirEntry, NamespaceProvider, Target, VirtualPath};

/// Session-level failures.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("not logged in")]
    NotLoggedIn,

    #[error("login with USER first")]
    UserRequired,

    #[error("already logged in")]
    AlreadyLoggedIn,

    #[error("session closed")]
    Closed,

    #[error("RNFR required first")]
    RenameSequence,

    #[error(transparent)]
    Gate(#[from] GateError),
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Login state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    AwaitingPassword { username: String },
    Authenticated,
    Closed,
}

/// A resolved transfer endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferTarget {
    pub target: Target,
    /// Host file backing the target.
    pub host: PathBuf,
}

/// One connection's state machine.
pub struct SessionHandler {
    namespace: Arc<dyn NamespaceProvider>,
    access: Arc<dyn AccessPolicy>,
    state: SessionState,
    identity: Option<Identity>,
    cwd: VirtualPath,
    failed_attempts: u32,
    rename_from: Option<String>,
}

impl std::fmt::Debug for SessionHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandler")
            .field("state", &self.state)
            .field("identity", &self.identity)
            .field("cwd", &self.cwd)
            .field("failed_attempts", &self.failed_attempts)
            .finish_non_exhaustive()
    }
}

impl SessionHandler {
    pub fn new(namespace: Arc<dyn NamespaceProvider>, access: Arc<dyn AccessPolicy>) -> Self {
        Self {
            namespace,
            access,
            state: SessionState::Unauthenticated,
            identity: None,
            cwd: VirtualPath::root(),
            failed_attempts: 0,
            rename_from: None,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn cwd(&self) -> &VirtualPath {
        &self.cwd
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == SessionState::Authenticated
    }

    pub fn is_closed(&self) -> bool {
        self.state == SessionState::Closed
    }

    /// Failed logins so far. Reported only; nothing acts on it.
    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    // ========================================================================
    // Login
    // ========================================================================

    /// Record a candidate username.
    pub fn user(&mut self, username: &str) -> SessionResult<()> {
        match self.state {
            SessionState::Closed => Err(SessionError::Closed),
            SessionState::Authenticated => Err(SessionError::AlreadyLoggedIn),
            SessionState::Unauthenticated | SessionState::AwaitingPassword { .. } => {
                self.state = SessionState::AwaitingPassword {
                    username: username.to_string(),
                };
                Ok(())
            }
        }
    }

    /// Complete a login started with [`user`](Self::user).
    pub fn pass(&mut self, password: &str) -> SessionResult<&Identity> {
        let username = match &self.state {
            SessionState::Closed => return Err(SessionError::Closed),
            SessionState::AwaitingPassword { username } => username.clone(),
            SessionState::Unauthenticated | SessionState::Authenticated => {
                return Err(SessionError::UserRequired);
            }
        };

        match self.access.authenticate(&username, password) {
            Ok(identity) => {
                self.cwd = self.namespace.native_to_virtual(&identity.home.to_target());
                tracing::info!(username = %identity.username, cwd = %self.cwd, "login");
                self.state = SessionState::Authenticated;
                Ok(self.identity.insert(identity))
            }
            Err(e) => {
                self.failed_attempts += 1;
                self.state = SessionState::Unauthenticated;
                tracing::warn!(
                    username = %username,
                    failed_attempts = self.failed_attempts,
                    "login failed"
                );
                Err(e.into())
            }
        }
    }

    /// End the session. Every later operation fails with `Closed`.
    pub fn close(&mut self) {
        if self.state != SessionState::Closed {
            if let Some(identity) = &self.identity {
                tracing::info!(username = %identity.username, "session closed");
            }
        }
        self.state = SessionState::Closed;
        self.identity = None;
        self.rename_from = None;
    }

    fn require_identity(&self) -> SessionResult<&Identity> {
        match self.state {
            SessionState::Closed => Err(SessionError::Closed),
            SessionState::Authenticated => self.identity.as_ref().ok_or(SessionError::NotLoggedIn),
            _ => Err(SessionError::NotLoggedIn),
        }
    }

    /// Resolve `path` and check `perm` on the result.
    fn authorize(&self, path: &str, perm: Permission) -> SessionResult<Target> {
        let identity = self.require_identity()?;
        let target = self.namespace.virtual_to_native(path, &self.cwd)?;
        if !self.access.has_permission(identity, perm, &target) {
            return Err(GateError::permission_denied(target.to_string()).into());
        }
        Ok(target)
    }

    fn at_home(&self, identity: &Identity) -> bool {
        self.cwd == identity.home.to_virtual()
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    pub fn pwd(&self) -> SessionResult<&VirtualPath> {
        self.require_identity()?;
        Ok(&self.cwd)
    }

    /// Change directory.
    ///
    /// At the home directory a shortcut name (`Disc_C`) is redirected to
    /// that drive's root before resolving.
    pub async fn cwd_to(&mut self, path: &str) -> SessionResult<&VirtualPath> {
        let identity = self.require_identity()?;

        let mut path = path.to_string();
        if self.at_home(identity) {
            let name = path.trim_end_matches('/');
            if let Some(native) = self.access.virtual_aliases(identity).remove(name) {
                path = Target::Native(native).to_virtual().to_string();
            }
        }

        let new_cwd = self.namespace.chdir(&path, &self.cwd).await?;
        let target = new_cwd.to_target();
        if !self.access.has_permission(identity, Permission::Enter, &target) {
            return Err(GateError::permission_denied(target.to_string()).into());
        }

        tracing::debug!(username = %identity.username, from = %self.cwd, to = %new_cwd, "cwd");
        self.cwd = new_cwd;
        Ok(&self.cwd)
    }

    pub async fn cdup(&mut self) -> SessionResult<&VirtualPath> {
        self.cwd_to("..").await
    }

    // ========================================================================
    // Listing
    // ========================================================================

    /// Entries of `path` (the cwd when empty).
    ///
    /// At the home directory of a drive-confined identity the shortcut
    /// entries are appended after the real ones.
    pub async fn list(&self, path: &str) -> SessionResult<Vec<DirEntry>> {
        let target = self.authorize(path, Permission::List)?;
        let identity = self.require_identity()?;

        let mut entries = self.namespace.listdir(path, &self.cwd).await?;

        if !target.is_root() && target.to_virtual() == identity.home.to_virtual() {
            entries.extend(
                self.access
                    .virtual_aliases(identity)
                    .into_keys()
                    .map(DirEntry::synthetic_directory),
            );
        }
        Ok(entries)
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Create a directory; returns its virtual path.
    pub async fn mkdir(&self, path: &str) -> SessionResult<VirtualPath> {
        let target = self.authorize(path, Permission::MakeDir)?;
        self.namespace.mkdir(path, &self.cwd).await?;
        Ok(target.to_virtual())
    }

    pub async fn rmdir(&self, path: &str) -> SessionResult<()> {
        self.authorize(path, Permission::RemoveDir)?;
        self.namespace.rmdir(path, &self.cwd).await?;
        Ok(())
    }

    pub async fn delete(&self, path: &str) -> SessionResult<()> {
        self.authorize(path, Permission::Delete)?;
        self.namespace.remove(path, &self.cwd).await?;
        Ok(())
    }

    /// First half of a rename. The source must exist.
    pub async fn rename_from(&mut self, path: &str) -> SessionResult<()> {
        let target = self.authorize(path, Permission::Rename)?;
        if target.is_root() {
            return Err(GateError::permission_denied("/").into());
        }
        self.namespace.stat(path, &self.cwd).await?;
        self.rename_from = Some(target.to_virtual().to_string());
        Ok(())
    }

    /// Second half of a rename.
    pub async fn rename_to(&mut self, path: &str) -> SessionResult<()> {
        self.require_identity()?;
        let from = self.rename_from.take().ok_or(SessionError::RenameSequence)?;
        self.authorize(path, Permission::Rename)?;
        self.namespace.rename(&from, path, &self.cwd).await?;
        Ok(())
    }

    // ========================================================================
    // Transfers
    // ========================================================================

    /// Resolve a file for the data channel after checking `perm`.
    pub fn resolve_for_transfer(&self, path: &str, perm: Permission) -> SessionResult<TransferTarget> {
        let target = self.authorize(path, perm)?;
        let host = self.namespace.host_path(&target)?;
        Ok(TransferTarget { target, host })
    }

    /// Size of a file in bytes (`r` required).
    pub async fn size(&self, path: &str) -> SessionResult<u64> {
        let target = self.authorize(path, Permission::Read)?;
        let attr = self.namespace.stat(path, &self.cwd).await?;
        if !attr.is_file() {
            return Err(GateError::is_a_directory(target.to_string()).into());
        }
        Ok(attr.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{AccessController, HomeDir, PermissionSet};
    use crate::config::TraceConfig;
    use crate::namespace::{DriveLetter, DriveTable, NamespaceTranslator};
    use crate::users::{MemoryUserStore, UserStore};
    use tempfile::TempDir;

    struct Fixture {
        namespace: Arc<NamespaceTranslator>,
        access: Arc<AccessController>,
        _c: TempDir,
        d: TempDir,
        _e: TempDir,
    }

    impl Fixture {
        fn session(&self) -> SessionHandler {
            SessionHandler::new(self.namespace.clone(), self.access.clone())
        }
    }

    fn setup() -> Fixture {
        let c = TempDir::new().unwrap();
        let d = TempDir::new().unwrap();
        let e = TempDir::new().unwrap();
        std::fs::create_dir_all(d.path().join("data").join("inner")).unwrap();
        std::fs::write(d.path().join("data").join("file.txt"), b"hello").unwrap();
        std::fs::create_dir_all(c.path().join("Windows")).unwrap();

        let letter = |ch| DriveLetter::new(ch).unwrap();
        let drives = Arc::new(DriveTable::mapped([
            (letter('C'), c.path().to_path_buf()),
            (letter('D'), d.path().to_path_buf()),
            (letter('E'), e.path().to_path_buf()),
        ]));

        let store = MemoryUserStore::new();
        let add = |name: &str, perms: &str, home: &str| {
            store
                .create(
                    name,
                    "pw",
                    PermissionSet::parse(perms).unwrap(),
                    &HomeDir::parse(home).unwrap(),
                )
                .unwrap();
        };
        add("bob", "elr", "D:\\data");
        add("dana", "elradfmwMT", "D:\\");
        add("root", "elradfmwMT", "/");

        let trace = TraceConfig::all();
        Fixture {
            namespace: Arc::new(NamespaceTranslator::new(drives.clone(), trace)),
            access: Arc::new(AccessController::new(Arc::new(store), drives, trace)),
            _c: c,
            d,
            _e: e,
        }
    }

    fn login(fx: &Fixture, user: &str) -> SessionHandler {
        let mut s = fx.session();
        s.user(user).unwrap();
        s.pass("pw").unwrap();
        s
    }

    fn names(entries: &[DirEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    #[tokio::test]
    async fn bob_end_to_end() {
        let fx = setup();
        let mut s = login(&fx, "bob");
        assert_eq!(s.cwd().as_str(), "/D/data");

        // Root is always reachable and lists the drives.
        assert_eq!(s.cwd_to("/").await.unwrap().as_str(), "/");
        assert_eq!(names(&s.list("").await.unwrap()), vec!["C", "D", "E"]);

        // Another drive is off limits and the cwd stays put.
        let err = s.cwd_to("/C").await.unwrap_err();
        assert!(matches!(err, SessionError::Gate(GateError::PermissionDenied(_))));
        assert_eq!(s.cwd().as_str(), "/");

        s.cwd_to("/D/data").await.unwrap();
        s.cwd_to("inner").await.unwrap();
        assert_eq!(s.cwd().as_str(), "/D/data/inner");
        s.cwd_to("..").await.unwrap();
        assert_eq!(s.cwd().as_str(), "/D/data");

        // D:\ is the native parent but outside bob's home.
        let err = s.cwd_to("..").await.unwrap_err();
        assert!(matches!(err, SessionError::Gate(GateError::PermissionDenied(_))));
        assert_eq!(s.cwd().as_str(), "/D/data");
    }

    #[tokio::test]
    async fn password_before_user_is_rejected() {
        let fx = setup();
        let mut s = fx.session();
        assert!(matches!(s.pass("pw"), Err(SessionError::UserRequired)));
        assert_eq!(s.state(), &SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn failed_login_resets_and_counts() {
        let fx = setup();
        let mut s = fx.session();
        s.user("bob").unwrap();
        let err = s.pass("nope").unwrap_err();
        assert!(matches!(err, SessionError::Gate(GateError::AuthFailed(_))));
        assert_eq!(s.state(), &SessionState::Unauthenticated);
        assert_eq!(s.failed_attempts(), 1);
        assert!(s.identity().is_none());

        // The candidate was cleared.
        assert!(matches!(s.pass("pw"), Err(SessionError::UserRequired)));

        s.user("bob").unwrap();
        s.pass("pw").unwrap();
        assert!(s.is_authenticated());
        assert_eq!(s.failed_attempts(), 1);
    }

    #[tokio::test]
    async fn user_twice_replaces_the_candidate_but_not_after_login() {
        let fx = setup();
        let mut s = fx.session();
        s.user("nobody").unwrap();
        s.user("root").unwrap();
        s.pass("pw").unwrap();
        assert_eq!(s.identity().unwrap().username, "root");
        assert!(matches!(s.user("bob"), Err(SessionError::AlreadyLoggedIn)));
    }

    #[tokio::test]
    async fn commands_require_login() {
        let fx = setup();
        let mut s = fx.session();
        assert!(matches!(s.pwd(), Err(SessionError::NotLoggedIn)));
        assert!(matches!(s.cwd_to("/").await, Err(SessionError::NotLoggedIn)));
        assert!(matches!(s.list("").await, Err(SessionError::NotLoggedIn)));
    }

    #[tokio::test]
    async fn anonymous_browses_read_only() {
        let fx = setup();
        let mut s = fx.session();
        s.user("anonymous").unwrap();
        s.pass("guest@example.com").unwrap();
        assert_eq!(s.cwd().as_str(), "/");

        s.cwd_to("/D/data").await.unwrap();
        assert_eq!(names(&s.list("").await.unwrap()), vec!["file.txt", "inner"]);
        assert_eq!(s.size("file.txt").await.unwrap(), 5);
        assert!(matches!(
            s.mkdir("new").await,
            Err(SessionError::Gate(GateError::PermissionDenied(_)))
        ));
        assert!(!fx.d.path().join("data/new").exists());
    }

    #[tokio::test]
    async fn drive_confined_user_sees_shortcuts_at_home() {
        let fx = setup();
        let mut s = login(&fx, "dana");
        assert_eq!(s.cwd().as_str(), "/D");

        let listing = s.list("").await.unwrap();
        assert_eq!(names(&listing), vec!["data", "Disc_C", "Disc_E"]);
        assert!(listing[1].is_synthetic());

        // Shortcuts only show at home.
        let listing = s.list("data").await.unwrap();
        assert!(listing.iter().all(|e| !e.is_synthetic()));

        // Following a shortcut lands on the other drive, where dana has no rights.
        let err = s.cwd_to("Disc_C").await.unwrap_err();
        assert!(matches!(err, SessionError::Gate(GateError::PermissionDenied(_))));
        assert_eq!(s.cwd().as_str(), "/D");
    }

    #[tokio::test]
    async fn listing_denied_without_partial_output() {
        let fx = setup();
        let s = login(&fx, "bob");
        assert!(matches!(
            s.list("/C").await,
            Err(SessionError::Gate(GateError::PermissionDenied(_)))
        ));
    }

    #[tokio::test]
    async fn mutations_check_their_permission_first() {
        let fx = setup();
        let mut s = login(&fx, "dana");

        let created = s.mkdir("data/made").await.unwrap();
        assert_eq!(created.as_str(), "/D/data/made");
        assert!(fx.d.path().join("data/made").is_dir());

        s.rename_from("data/made").await.unwrap();
        s.rename_to("data/moved").await.unwrap();
        assert!(fx.d.path().join("data/moved").is_dir());
        assert!(matches!(s.rename_to("x").await, Err(SessionError::RenameSequence)));

        s.rmdir("data/moved").await.unwrap();
        s.delete("data/file.txt").await.unwrap();
        assert!(!fx.d.path().join("data/file.txt").exists());

        assert!(matches!(
            s.mkdir("/C/nope").await,
            Err(SessionError::Gate(GateError::PermissionDenied(_)))
        ));
    }

    #[tokio::test]
    async fn transfer_targets_resolve_to_host_files() {
        let fx = setup();
        let s = login(&fx, "bob");
        let t = s.resolve_for_transfer("file.txt", Permission::Read).unwrap();
        assert_eq!(t.target.to_string(), "D:\\data\\file.txt");
        assert!(t.host.is_file());

        assert!(matches!(
            s.resolve_for_transfer("upload.bin", Permission::Write),
            Err(SessionError::Gate(GateError::PermissionDenied(_)))
        ));
    }

    #[tokio::test]
    async fn closed_sessions_accept_nothing() {
        let fx = setup();
        let mut s = login(&fx, "root");
        s.close();
        assert!(s.is_closed());
        assert!(s.identity().is_none());
        assert!(matches!(s.pwd(), Err(SessionError::Closed)));
        assert!(matches!(s.user("root"), Err(SessionError::Closed)));
        assert!(matches!(s.cwd_to("/").await, Err(SessionError::Closed)));
    }
}
