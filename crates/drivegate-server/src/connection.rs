//! One control connection.
//!
//! Commands are read and answered strictly in order. Data transfers use a
//! passive listener opened by the preceding PASV/EPSV and consumed by the
//! next transfer command.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::SystemTime;

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use drivegate_kernel::listing::{list_line, name_line};
use drivegate_kernel::{GateError, Permission, SessionHandler, TransferTarget};

use crate::command::Command;
use crate::config::ServerConfig;
use crate::constants::{DATA_CONNECT_TIMEOUT, MAX_LINE_LENGTH};
use crate::reply::Reply;

/// Whether the loop keeps reading after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

pub(crate) struct Connection {
    session: SessionHandler,
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    local_ip: IpAddr,
    peer: SocketAddr,
    config: Arc<ServerConfig>,
    passive: Option<TcpListener>,
}

impl Connection {
    pub(crate) fn new(
        stream: TcpStream,
        session: SessionHandler,
        config: Arc<ServerConfig>,
    ) -> std::io::Result<Self> {
        let peer = stream.peer_addr()?;
        let local_ip = stream.local_addr()?.ip();
        let (read, writer) = stream.into_split();
        Ok(Self {
            session,
            reader: BufReader::new(read),
            writer,
            local_ip,
            peer,
            config,
            passive: None,
        })
    }

    /// Greet the client and serve commands until QUIT, EOF or idle timeout.
    pub(crate) async fn run(mut self) -> std::io::Result<()> {
        let banner = Reply::new(220, self.config.banner.clone());
        self.send(&banner).await?;

        let result = self.command_loop().await;
        self.session.close();
        tracing::info!(peer = %self.peer, "connection closed");
        result
    }

    async fn command_loop(&mut self) -> std::io::Result<()> {
        let idle = self.config.idle_timeout();
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let read = timeout(
                idle,
                (&mut self.reader)
                    .take(MAX_LINE_LENGTH as u64)
                    .read_until(b'\n', &mut buf),
            )
            .await;

            match read {
                Err(_) => {
                    tracing::info!(peer = %self.peer, "idle timeout");
                    self.send(&Reply::new(421, "Idle timeout, closing control connection."))
                        .await?;
                    return Ok(());
                }
                Ok(Err(e)) => return Err(e),
                Ok(Ok(0)) => return Ok(()),
                Ok(Ok(_)) => {}
            }

            if !buf.ends_with(b"\n") && buf.len() >= MAX_LINE_LENGTH {
                self.send(&Reply::new(500, "Command line too long.")).await?;
                return Ok(());
            }

            let line = String::from_utf8_lossy(&buf).into_owned();
            let line = line.trim_end_matches(['\r', '\n']);
            if line.is_empty() {
                continue;
            }
            log_command(self.peer, line);

            let (reply, flow) = match line.parse::<Command>() {
                Ok(command) => self.dispatch(command).await?,
                Err(e) => (Reply::from(&e), Flow::Continue),
            };
            self.send(&reply).await?;
            if flow == Flow::Quit {
                return Ok(());
            }
        }
    }

    async fn send(&mut self, reply: &Reply) -> std::io::Result<()> {
        self.writer.write_all(reply.to_string().as_bytes()).await?;
        self.writer.flush().await
    }

    async fn dispatch(&mut self, command: Command) -> std::io::Result<(Reply, Flow)> {
        let reply = match command {
            Command::Quit => return Ok((Reply::new(221, "Goodbye."), Flow::Quit)),
            Command::User(name) => self.user(&name),
            Command::Pass(password) => match self.session.pass(&password) {
                Ok(identity) => Reply::new(230, format!("User {} logged in.", identity.username)),
                Err(e) => Reply::from(&e),
            },
            Command::Noop => Reply::new(200, "NOOP ok."),
            Command::Syst => Reply::new(215, "UNIX Type: L8"),
            Command::Feat => Reply::multiline(
                211,
                ["Features:", "EPSV", "MFMT", "PASV", "SIZE", "UTF8", "End"]
                    .map(String::from)
                    .to_vec(),
            ),
            Command::Opts(opt) if opt.eq_ignore_ascii_case("UTF8 ON") => {
                Reply::new(200, "Always in UTF8 mode.")
            }
            Command::Opts(_) => Reply::new(501, "Option not understood."),
            command => {
                if !self.session.is_authenticated() {
                    return Ok((Reply::new(530, "Log in with USER and PASS first."), Flow::Continue));
                }
                self.dispatch_authenticated(command).await?
            }
        };
        Ok((reply, Flow::Continue))
    }

    fn user(&mut self, name: &str) -> Reply {
        match self.session.user(name) {
            Ok(()) if name == drivegate_kernel::access::ANONYMOUS => {
                Reply::new(331, "Guest login ok, send your email address as password.")
            }
            Ok(()) => Reply::new(331, format!("Password required for {name}.")),
            Err(e) => Reply::from(&e),
        }
    }

    async fn dispatch_authenticated(&mut self, command: Command) -> std::io::Result<Reply> {
        let reply = match command {
            Command::Type(kind) => match kind.to_ascii_uppercase().as_str() {
                "A" | "A N" => Reply::new(200, "Type set to A."),
                "I" | "L 8" => Reply::new(200, "Type set to I."),
                _ => Reply::new(504, format!("Type {kind} not supported.")),
            },
            Command::Pwd => match self.session.pwd() {
                Ok(cwd) => Reply::new(257, format!("{} is the current directory.", quote(cwd.as_str()))),
                Err(e) => Reply::from(&e),
            },
            Command::Cwd(path) => match self.session.cwd_to(&path).await {
                Ok(cwd) => Reply::new(250, format!("{} is the current directory.", quote(cwd.as_str()))),
                Err(e) => Reply::from(&e),
            },
            Command::Cdup => match self.session.cdup().await {
                Ok(cwd) => Reply::new(250, format!("{} is the current directory.", quote(cwd.as_str()))),
                Err(e) => Reply::from(&e),
            },
            Command::List(path) => self.list(&path, false).await?,
            Command::Nlst(path) => self.list(&path, true).await?,
            Command::Mkd(path) => match self.session.mkdir(&path).await {
                Ok(created) => Reply::new(257, format!("{} directory created.", quote(created.as_str()))),
                Err(e) => Reply::from(&e),
            },
            Command::Rmd(path) => match self.session.rmdir(&path).await {
                Ok(()) => Reply::new(250, "Directory removed."),
                Err(e) => Reply::from(&e),
            },
            Command::Dele(path) => match self.session.delete(&path).await {
                Ok(()) => Reply::new(250, "File removed."),
                Err(e) => Reply::from(&e),
            },
            Command::Rnfr(path) => match self.session.rename_from(&path).await {
                Ok(()) => Reply::new(350, "Ready for destination name."),
                Err(e) => Reply::from(&e),
            },
            Command::Rnto(path) => match self.session.rename_to(&path).await {
                Ok(()) => Reply::new(250, "Renaming ok."),
                Err(e) => Reply::from(&e),
            },
            Command::Size(path) => match self.session.size(&path).await {
                Ok(size) => Reply::new(213, size.to_string()),
                Err(e) => Reply::from(&e),
            },
            Command::Pasv => self.pasv().await,
            Command::Epsv => self.epsv().await,
            Command::Retr(path) => self.retr(&path).await?,
            Command::Stor(path) => self.stor(&path, Permission::Write).await?,
            Command::Appe(path) => self.stor(&path, Permission::Append).await?,
            Command::Mfmt { mtime, path } => self.mfmt(mtime, &path).await,
            // Handled before login is required.
            Command::Quit
            | Command::User(_)
            | Command::Pass(_)
            | Command::Noop
            | Command::Syst
            | Command::Feat
            | Command::Opts(_) => Reply::new(503, "Bad sequence of commands."),
        };
        Ok(reply)
    }

    // ========================================================================
    // Passive mode
    // ========================================================================

    async fn bind_passive(&mut self) -> Option<u16> {
        let ports: Vec<u16> = match self.config.passive_ports {
            Some((lo, hi)) => (lo..=hi).collect(),
            None => vec![0],
        };
        for port in ports {
            if let Ok(listener) = TcpListener::bind((self.local_ip, port)).await {
                let port = listener.local_addr().ok()?.port();
                self.passive = Some(listener);
                return Some(port);
            }
        }
        tracing::warn!(peer = %self.peer, "no passive port available");
        None
    }

    async fn pasv(&mut self) -> Reply {
        let IpAddr::V4(ip) = self.local_ip else {
            return Reply::new(425, "Use EPSV for IPv6.");
        };
        let Some(port) = self.bind_passive().await else {
            return Reply::new(425, "Can't open passive connection.");
        };
        let [a, b, c, d] = ip.octets();
        Reply::new(
            227,
            format!(
                "Entering Passive Mode ({a},{b},{c},{d},{},{}).",
                port >> 8,
                port & 0xff
            ),
        )
    }

    async fn epsv(&mut self) -> Reply {
        match self.bind_passive().await {
            Some(port) => Reply::new(229, format!("Entering Extended Passive Mode (|||{port}|).")),
            None => Reply::new(425, "Can't open passive connection."),
        }
    }

    /// Send 150 and accept the data connection.
    async fn open_data(&mut self) -> std::io::Result<Result<TcpStream, Reply>> {
        let Some(listener) = self.passive.take() else {
            return Ok(Err(Reply::new(425, "Use PASV or EPSV first.")));
        };
        self.send(&Reply::new(150, "Opening data connection.")).await?;
        match timeout(DATA_CONNECT_TIMEOUT, self.accept_from_peer(&listener)).await {
            Ok(Ok(stream)) => Ok(Ok(stream)),
            _ => Ok(Err(Reply::new(425, "Can't open data connection."))),
        }
    }

    /// Accept the first data connection that comes from the control peer's
    /// address; anything else is dropped.
    async fn accept_from_peer(&self, listener: &TcpListener) -> std::io::Result<TcpStream> {
        loop {
            let (stream, from) = listener.accept().await?;
            if from.ip() == self.peer.ip() {
                return Ok(stream);
            }
            tracing::warn!(peer = %self.peer, from = %from, "rejected foreign data connection");
        }
    }

    // ========================================================================
    // Transfers
    // ========================================================================

    async fn list(&mut self, path: &str, names_only: bool) -> std::io::Result<Reply> {
        // Permission and resolution errors are reported before any data moves.
        let entries = match self.session.list(path).await {
            Ok(entries) => entries,
            Err(e) => return Ok(Reply::from(&e)),
        };
        let body: String = entries
            .iter()
            .map(|e| if names_only { name_line(e) } else { list_line(e) })
            .collect();

        let mut stream = match self.open_data().await? {
            Ok(stream) => stream,
            Err(reply) => return Ok(reply),
        };
        let sent = async {
            stream.write_all(body.as_bytes()).await?;
            stream.shutdown().await
        }
        .await;
        Ok(finish(sent.map(|_| body.len() as u64)))
    }

    async fn retr(&mut self, path: &str) -> std::io::Result<Reply> {
        let TransferTarget { target, host } =
            match self.session.resolve_for_transfer(path, Permission::Read) {
                Ok(t) => t,
                Err(e) => return Ok(Reply::from(&e)),
            };
        let file = match tokio::fs::metadata(&host).await {
            Ok(meta) if meta.is_dir() => {
                return Ok(Reply::from(&GateError::is_a_directory(target.to_string())));
            }
            Ok(_) => File::open(&host).await,
            Err(e) => Err(e),
        };
        let mut file = match file {
            Ok(file) => file,
            Err(e) => return Ok(Reply::from(&GateError::from_io(e, target.to_string()))),
        };

        let mut stream = match self.open_data().await? {
            Ok(stream) => stream,
            Err(reply) => return Ok(reply),
        };
        let sent = async {
            let n = tokio::io::copy(&mut file, &mut stream).await?;
            stream.shutdown().await?;
            Ok::<_, std::io::Error>(n)
        }
        .await;
        if let Ok(n) = &sent {
            tracing::info!(peer = %self.peer, path = %target, bytes = *n, "sent file");
        }
        Ok(finish(sent))
    }

    async fn stor(&mut self, path: &str, perm: Permission) -> std::io::Result<Reply> {
        let TransferTarget { target, host } = match self.session.resolve_for_transfer(path, perm) {
            Ok(t) => t,
            Err(e) => return Ok(Reply::from(&e)),
        };

        // The file is only touched once a data connection exists.
        let mut stream = match self.open_data().await? {
            Ok(stream) => stream,
            Err(reply) => return Ok(reply),
        };

        let mut options = OpenOptions::new();
        options.write(true).create(true);
        if perm == Permission::Append {
            options.append(true);
        } else {
            options.truncate(true);
        }
        let mut file = match options.open(&host).await {
            Ok(file) => file,
            Err(e) => return Ok(Reply::from(&GateError::from_io(e, target.to_string()))),
        };
        let received = async {
            let n = tokio::io::copy(&mut stream, &mut file).await?;
            file.flush().await?;
            Ok::<_, std::io::Error>(n)
        }
        .await;
        if let Ok(n) = &received {
            tracing::info!(peer = %self.peer, path = %target, bytes = *n, "received file");
        }
        Ok(finish(received))
    }

    async fn mfmt(&mut self, mtime: chrono::NaiveDateTime, path: &str) -> Reply {
        let TransferTarget { target, host } =
            match self.session.resolve_for_transfer(path, Permission::SetTime) {
                Ok(t) => t,
                Err(e) => return Reply::from(&e),
            };
        let when = SystemTime::from(mtime.and_utc());
        let set = tokio::task::spawn_blocking(move || {
            let file = std::fs::File::options().write(true).open(&host)?;
            if file.metadata()?.is_dir() {
                return Err(std::io::Error::from(std::io::ErrorKind::IsADirectory));
            }
            file.set_modified(when)
        })
        .await
        .unwrap_or_else(|e| Err(std::io::Error::other(e)));

        match set {
            Ok(()) => Reply::new(
                213,
                format!("Modify={}; {}", mtime.format("%Y%m%d%H%M%S"), path),
            ),
            Err(e) => Reply::from(&GateError::from_io(e, target.to_string())),
        }
    }
}

fn finish(result: std::io::Result<u64>) -> Reply {
    match result {
        Ok(_) => Reply::new(226, "Transfer complete."),
        Err(e) => {
            tracing::warn!(error = %e, "transfer aborted");
            Reply::new(426, "Connection closed; transfer aborted.")
        }
    }
}

/// RFC 959 path quoting: wrap in quotes, double embedded quotes.
fn quote(path: &str) -> String {
    format!("\"{}\"", path.replace('"', "\"\""))
}

fn log_command(peer: SocketAddr, line: &str) {
    let shown = match line.split_once(' ') {
        Some((verb, _)) if verb.eq_ignore_ascii_case("PASS") => "PASS ****",
        _ => line,
    };
    tracing::debug!(peer = %peer, command = shown, "command");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting_doubles_quotes() {
        assert_eq!(quote("/D/data"), "\"/D/data\"");
        assert_eq!(quote("/D/say \"hi\""), "\"/D/say \"\"hi\"\"\"");
    }

    #[test]
    fn transfer_outcomes() {
        assert_eq!(finish(Ok(10)).code, 226);
        assert_eq!(finish(Err(std::io::Error::other("reset"))).code, 426);
    }
}
