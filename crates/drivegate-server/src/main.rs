//! drivegate binary
//!
//! ## Usage
//!
//! ```bash
//! # Run the server
//! drivegate serve [--config FILE] [--listen ADDR]
//!
//! # Account management
//! drivegate user add <name> <password> [--permissions elr] [--home 'D:\data']
//! drivegate user update <name> [--password P] [--permissions P] [--home H]
//! drivegate user remove <name>
//! drivegate user list
//!
//! # Drive table
//! drivegate drives
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use drivegate_kernel::access::parse_permissions;
use drivegate_kernel::{DriveSource, DriveTable, HomeDir, SqliteUserStore, UserStore, UserUpdate};
use drivegate_server::{FtpServer, ServerConfig};

#[derive(Parser, Debug)]
#[command(name = "drivegate")]
#[command(about = "FTP server exposing every mounted drive as one tree")]
struct Args {
    /// Config file (default: platform config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Cmd>,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Run the FTP server (default)
    Serve {
        /// Override the listen address, `host:port`
        #[arg(long)]
        listen: Option<String>,
    },
    /// Manage accounts in the user database
    #[command(subcommand)]
    User(UserCmd),
    /// Show configured drives and whether they are mounted
    Drives,
}

#[derive(Subcommand, Debug)]
enum UserCmd {
    Add {
        username: String,
        password: String,
        /// Preset (read-only, read-write, full) or letters from `elradfmwMT`
        #[arg(long, default_value = "read-only")]
        permissions: String,
        /// `/`, a drive (`D:`) or a directory (`D:\data`)
        #[arg(long, default_value = "/")]
        home: String,
    },
    Update {
        username: String,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        permissions: Option<String>,
        #[arg(long)]
        home: Option<String>,
    },
    Remove {
        username: String,
    },
    List,
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config_path = args.config.unwrap_or_else(ServerConfig::default_path);
    let config = match ServerConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let result = match args.command.unwrap_or(Cmd::Serve { listen: None }) {
        Cmd::Serve { listen } => run_server(config, listen).await,
        Cmd::User(cmd) => cmd_user(&config, cmd),
        Cmd::Drives => {
            cmd_drives(&config);
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run_server(mut config: ServerConfig, listen: Option<String>) -> anyhow::Result<()> {
    if let Some(listen) = listen {
        config.listen = listen;
    }
    tracing::info!("Starting drivegate on {}...", config.listen);
    FtpServer::from_config(config)?.run().await
}

fn open_store(config: &ServerConfig) -> anyhow::Result<SqliteUserStore> {
    let path = config.user_db_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(SqliteUserStore::open(&path)?)
}

fn parse_home(s: &str) -> anyhow::Result<HomeDir> {
    HomeDir::parse(s).ok_or_else(|| anyhow::anyhow!("invalid home directory {s:?}"))
}

fn cmd_user(config: &ServerConfig, cmd: UserCmd) -> anyhow::Result<()> {
    let store = open_store(config)?;
    match cmd {
        UserCmd::Add {
            username,
            password,
            permissions,
            home,
        } => {
            let perms = parse_permissions(&permissions).map_err(anyhow::Error::msg)?;
            let home = parse_home(&home)?;
            store.create(&username, &password, perms, &home)?;
            println!("Added {username} ({perms}, home {home})");
        }
        UserCmd::Update {
            username,
            password,
            permissions,
            home,
        } => {
            let update = UserUpdate {
                password,
                permissions: permissions
                    .as_deref()
                    .map(parse_permissions)
                    .transpose()
                    .map_err(anyhow::Error::msg)?,
                home: home.as_deref().map(parse_home).transpose()?,
            };
            if update.is_empty() {
                anyhow::bail!("nothing to update; pass --password, --permissions or --home");
            }
            if !store.update(&username, &update)? {
                anyhow::bail!("no such user {username:?}");
            }
            println!("Updated {username}");
        }
        UserCmd::Remove { username } => {
            if !store.delete(&username)? {
                anyhow::bail!("no such user {username:?}");
            }
            println!("Removed {username}");
        }
        UserCmd::List => {
            let users = store.list()?;
            if users.is_empty() {
                println!("No users found. Add one with: drivegate user add <name> <password>");
                return Ok(());
            }
            println!("{:<16} {:<12} {}", "USER", "PERMS", "HOME");
            println!("{}", "-".repeat(48));
            for user in users {
                println!("{:<16} {:<12} {}", user.username, user.permissions.to_string(), user.home);
            }
        }
    }
    Ok(())
}

fn cmd_drives(config: &ServerConfig) {
    let table = DriveTable::from_config(&config.drives);
    println!("{:<6} {:<8} {}", "DRIVE", "MOUNTED", "ROOT");
    for (letter, root) in table.configured() {
        let mounted = if table.is_mounted(letter) { "yes" } else { "" };
        println!("{:<6} {:<8} {}", format!("/{letter}"), mounted, root.display());
    }
}
