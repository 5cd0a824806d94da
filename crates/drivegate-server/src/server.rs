//! Listener, connection limits and wiring.

use dashmap::DashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

use drivegate_kernel::users::seed_users;
use drivegate_kernel::{
    AccessController, AccessPolicy, DriveSource, DriveTable, NamespaceProvider,
    NamespaceTranslator, SessionHandler, SqliteUserStore, UserStore,
};

use crate::config::ServerConfig;
use crate::connection::Connection;

/// Live connection counts, total and per client address.
#[derive(Debug, Default)]
pub struct ConnectionLimits {
    total: AtomicUsize,
    per_ip: DashMap<IpAddr, usize>,
}

impl ConnectionLimits {
    /// Reserve a slot for `ip`, or `None` if a limit is reached.
    fn acquire(
        self: &Arc<Self>,
        ip: IpAddr,
        max_total: usize,
        max_per_ip: usize,
    ) -> Option<ConnectionSlot> {
        let mut count = self.per_ip.entry(ip).or_insert(0);
        if *count >= max_per_ip || self.total.fetch_add(1, Ordering::SeqCst) >= max_total {
            if *count < max_per_ip {
                self.total.fetch_sub(1, Ordering::SeqCst);
            }
            drop(count);
            self.per_ip.remove_if(&ip, |_, c| *c == 0);
            return None;
        }
        *count += 1;
        Some(ConnectionSlot {
            limits: Arc::clone(self),
            ip,
        })
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    pub fn for_ip(&self, ip: IpAddr) -> usize {
        self.per_ip.get(&ip).map(|c| *c).unwrap_or(0)
    }
}

/// Releases its reservation on drop.
struct ConnectionSlot {
    limits: Arc<ConnectionLimits>,
    ip: IpAddr,
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.limits.total.fetch_sub(1, Ordering::SeqCst);
        self.limits
            .per_ip
            .remove_if_mut(&self.ip, |_, count| {
                *count = count.saturating_sub(1);
                *count == 0
            });
    }
}

/// The FTP server.
pub struct FtpServer {
    config: Arc<ServerConfig>,
    namespace: Arc<dyn NamespaceProvider>,
    access: Arc<dyn AccessPolicy>,
    limits: Arc<ConnectionLimits>,
}

impl FtpServer {
    pub fn new(
        config: ServerConfig,
        namespace: Arc<dyn NamespaceProvider>,
        access: Arc<dyn AccessPolicy>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            namespace,
            access,
            limits: Arc::new(ConnectionLimits::default()),
        }
    }

    /// Build the translator, user store and controller the config describes.
    pub fn from_config(config: ServerConfig) -> anyhow::Result<Self> {
        let db_path = config.user_db_path();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let store = SqliteUserStore::open(&db_path)?;
        let seeded = seed_users(&store, &config.seed_users)?;
        tracing::info!(path = %db_path.display(), seeded = seeded.len(), "user store open");

        let drives: Arc<dyn DriveSource> = Arc::new(DriveTable::from_config(&config.drives));
        let store: Arc<dyn UserStore> = Arc::new(store);
        let namespace = Arc::new(NamespaceTranslator::new(drives.clone(), config.trace));
        let access = Arc::new(AccessController::new(store, drives, config.trace));
        Ok(Self::new(config, namespace, access))
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn limits(&self) -> &Arc<ConnectionLimits> {
        &self.limits
    }

    /// Bind the configured address and serve forever.
    pub async fn run(self) -> anyhow::Result<()> {
        let addr = self.config.listen_addr()?;
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await?;
        Ok(())
    }

    /// Serve on an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> std::io::Result<()> {
        let local = listener.local_addr()?;
        tracing::info!(addr = %local, "FTP server listening");
        for d in self.namespace.mounted_drives() {
            tracing::info!(drive = %d, "drive mounted");
        }

        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                    continue;
                }
            };
            self.accept(stream, peer);
        }
    }

    fn accept(&self, mut stream: TcpStream, peer: SocketAddr) {
        let slot = self.limits.acquire(
            peer.ip(),
            self.config.max_connections,
            self.config.max_connections_per_ip,
        );
        let Some(slot) = slot else {
            tracing::warn!(peer = %peer, "connection refused, too many connections");
            tokio::spawn(async move {
                let _ = stream
                    .write_all(b"421 Too many connections, try again later.\r\n")
                    .await;
                let _ = stream.shutdown().await;
            });
            return;
        };

        tracing::info!(peer = %peer, "connection accepted");
        let session = SessionHandler::new(self.namespace.clone(), self.access.clone());
        let config = self.config.clone();

        tokio::spawn(async move {
            let _slot = slot;
            let result = match Connection::new(stream, session, config) {
                Ok(conn) => conn.run().await,
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                tracing::warn!(peer = %peer, error = %e, "connection error");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_are_enforced_and_released() {
        let limits = Arc::new(ConnectionLimits::default());
        let a: IpAddr = "10.0.0.1".parse().unwrap();
        let b: IpAddr = "10.0.0.2".parse().unwrap();

        let s1 = limits.acquire(a, 3, 2).unwrap();
        let s2 = limits.acquire(a, 3, 2).unwrap();
        assert!(limits.acquire(a, 3, 2).is_none());
        assert_eq!(limits.for_ip(a), 2);

        let s3 = limits.acquire(b, 3, 2).unwrap();
        assert!(limits.acquire(b, 3, 2).is_none());
        assert_eq!(limits.total(), 3);

        drop(s1);
        assert_eq!(limits.for_ip(a), 1);
        drop(s2);
        drop(s3);
        assert_eq!(limits.total(), 0);
        assert_eq!(limits.for_ip(a), 0);
    }
}
