#![deny(unsafe_code)]

//! Thin CLI driver exercising the `lanshare` core end-to-end.
//!
//! This binary is ambient tooling: it supplies concrete, non-GUI
//! implementations of [`protocol::Folder`], [`protocol::ConflictPrompt`],
//! and [`protocol::UserPrompts`] so the workspace builds and runs
//! standalone, and wires them into an [`engine::Fleet`].

use clap::{Parser, Subcommand};
use engine::Fleet;
use is_terminal::IsTerminal;
use protocol::{ConflictPrompt, ConflictResolution, Folder, UserPrompts};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "lanshare", about = "Resumable, many-to-many LAN file transfer")]
struct Cli {
    /// Directory files are received into (and sent from, for relative
    /// `send` paths).
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Shared password gate; empty accepts any peer's password.
    #[arg(long, default_value = "")]
    password: String,

    /// TCP control port.
    #[arg(long, default_value_t = lanshare_core::constants::PORT)]
    port: u16,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Listen for incoming transfers and announce this peer over LAN
    /// discovery until interrupted.
    Serve,
    /// Send a single file to a peer's IPv4 address.
    Send {
        /// Path of the file to send.
        file: PathBuf,
        /// The receiving peer's IPv4 address.
        #[arg(long)]
        peer: Ipv4Addr,
    },
    /// Listen for discovery broadcasts for a fixed window and print
    /// whichever peers were heard, then exit.
    Discover {
        /// How many seconds to listen before printing results.
        #[arg(long, default_value_t = 5)]
        seconds: u64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    lanshare_core::logging::init();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "lanshare exited with an error");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), engine::TransferError> {
    let root = RootDir(cli.root.clone());
    let conflict: Arc<dyn ConflictPrompt> = Arc::new(CliConflictPrompt::new());
    let prompts = CliPrompts::new();

    let fleet = Arc::new(Fleet::new(
        root,
        lanshare_core::constants::METADATA_DIR,
        cli.password,
        conflict,
    ));

    match cli.command {
        Command::Serve => {
            fleet.start(cli.port)?;
            info!(port = cli.port, root = %cli.root.display(), "serving; press Ctrl-C to stop");
            let _ = tokio::signal::ctrl_c().await;
            fleet.stop();
        }
        Command::Send { file, peer } => {
            let size = tokio::fs::metadata(&file)
                .await
                .map_err(|e| engine::TransferError::FileUnavailable(e.to_string()))?
                .len();
            if !prompts.confirm_transfer(&file.display().to_string(), size as i64) {
                info!("send cancelled by user");
                return Ok(());
            }
            let addr = SocketAddr::from((peer, cli.port));
            fleet.start_outgoing(&file, addr).await?;
            // `start_outgoing` only waits for the dial and parameter
            // exchange; give the background transfer task a moment to run
            // before the process exits.
            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        }
        Command::Discover { seconds } => {
            fleet.start(cli.port)?;
            tokio::time::sleep(std::time::Duration::from_secs(seconds)).await;
            for addr in fleet.peers().snapshot() {
                println!("{addr}");
            }
            fleet.stop();
        }
    }

    Ok(())
}

/// [`Folder`] implementation rooted at a real filesystem directory.
///
/// The only `Folder` implementation in this workspace; GUI hosts would
/// supply their own bookmarked-directory equivalent.
#[derive(Clone)]
struct RootDir(PathBuf);

impl Folder for RootDir {
    type Sub = Self;

    fn get_or_create_sub(&self, name: &str) -> std::io::Result<Self::Sub> {
        let path = self.0.join(name);
        std::fs::create_dir_all(&path)?;
        Ok(Self(path))
    }

    fn get_or_create_file(&self, name: &str) -> std::io::Result<PathBuf> {
        let path = self.0.join(name);
        if !path.exists() {
            std::fs::File::create(&path)?;
        }
        Ok(path)
    }

    fn delete_file(&self, name: &str) -> std::io::Result<()> {
        std::fs::remove_file(self.0.join(name))
    }

    fn file_exists(&self, name: &str) -> bool {
        self.0.join(name).exists()
    }

    fn create_file(&self, name: &str) -> std::io::Result<PathBuf> {
        let path = self.0.join(name);
        std::fs::File::create(&path)?;
        Ok(path)
    }

    fn files_exist(&self, names: &[String]) -> Vec<bool> {
        let entries: std::collections::HashSet<std::ffi::OsString> = match std::fs::read_dir(&self.0) {
            Ok(dir) => dir.filter_map(|entry| entry.ok()).map(|entry| entry.file_name()).collect(),
            Err(_) => return vec![false; names.len()],
        };
        names
            .iter()
            .map(|name| entries.contains(std::ffi::OsStr::new(name)))
            .collect()
    }
}

/// Resolves name conflicts non-interactively when stdin is not a TTY
/// (scripted/background use), otherwise prompts on stdin/stdout.
///
/// The non-interactive default is a driver-level convenience, not a core
/// decision.
struct CliConflictPrompt {
    interactive: bool,
}

impl CliConflictPrompt {
    fn new() -> Self {
        Self {
            interactive: std::io::stdin().is_terminal(),
        }
    }
}

impl ConflictPrompt for CliConflictPrompt {
    fn resolve(&self, candidate: &str) -> ConflictResolution {
        if !self.interactive {
            return ConflictResolution::Rename;
        }

        println!("'{candidate}' already exists. [o]verwrite, [r]ename, [a]bort?");
        let mut line = String::new();
        if std::io::stdin().read_line(&mut line).is_err() {
            return ConflictResolution::Abort;
        }
        match line.trim().to_lowercase().as_str() {
            "o" | "overwrite" => ConflictResolution::Overwrite,
            "a" | "abort" => ConflictResolution::Abort,
            _ => ConflictResolution::Rename,
        }
    }
}

/// Broader user prompts; shares the same TTY detection as
/// [`CliConflictPrompt`] but is not itself a `ConflictPrompt` — `Session`
/// only ever calls the latter during file resolution.
struct CliPrompts {
    conflict: CliConflictPrompt,
}

impl CliPrompts {
    fn new() -> Self {
        Self {
            conflict: CliConflictPrompt::new(),
        }
    }
}

impl UserPrompts for CliPrompts {
    fn confirm_transfer(&self, name: &str, size: i64) -> bool {
        if !self.conflict.interactive {
            return true;
        }
        println!("Send '{name}' ({size} bytes)? [y/N]");
        let mut line = String::new();
        if std::io::stdin().read_line(&mut line).is_err() {
            return false;
        }
        matches!(line.trim().to_lowercase().as_str(), "y" | "yes")
    }

    fn resolve_conflict(&self, name: &str) -> ConflictResolution {
        self.conflict.resolve(name)
    }

    fn report_error(&self, message: &str) {
        error!("{message}");
    }
}
