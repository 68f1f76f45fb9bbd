use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use cmd::commands::{
    cat_command, init_command, list_command, mkdir_command, mount_command, mounts_command,
    mv_command, rm_command, unmount_command, watch_command, write_command,
};
use cmd::common::FsContext;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "deskfs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Host directory holding the root drive (overrides DESKFS_ROOT)
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    /// Directory for mount and migration state (overrides DESKFS_STATE)
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the default layout, migrating legacy data and finishing interrupted moves
    Init,
    /// Print a folder or file as JSON
    Ls(ListArgs),
    /// Print a file's content
    Cat {
        /// File path to read
        path: String,
    },
    /// Create or replace a file
    Write {
        /// File path to write
        path: String,
        /// New content
        content: String,
    },
    /// Create a folder and any missing parents
    Mkdir {
        /// Folder path to create
        path: String,
    },
    /// Remove a file or folder recursively
    Rm {
        /// Path to remove
        path: String,
    },
    /// Move or rename, across mounts if needed
    Mv {
        /// Existing path
        from: String,
        /// Destination path
        to: String,
    },
    /// Mount a host directory at /mnt/<name>
    Mount {
        /// Mount name
        name: String,
        /// Host directory to mount
        dir: PathBuf,
    },
    /// Remove a mount
    Unmount {
        /// Mount name
        name: String,
    },
    /// List the current mounts
    Mounts,
    /// Print a path every time it changes
    Watch(WatchArgs),
}

#[derive(Args)]
struct ListArgs {
    /// Path to list
    #[arg(default_value = "/")]
    path: String,

    /// Include every descendant and file content
    #[arg(short, long)]
    deep: bool,
}

#[derive(Args)]
struct WatchArgs {
    /// Path to watch
    path: String,

    /// Include every descendant and file content
    #[arg(short, long)]
    deep: bool,

    /// Exit after this many updates
    #[arg(short = 'n', long)]
    updates: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    diagnostics::init();

    let cli = Cli::parse();
    let ctx = FsContext::new(cli.root, cli.state_dir);
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    let result = match cli.command {
        Commands::Init => init_command(&ctx, &mut out).await,
        Commands::Ls(args) => list_command(&ctx, &args.path, args.deep, &mut out).await,
        Commands::Cat { path } => cat_command(&ctx, &path, &mut out).await,
        Commands::Write { path, content } => write_command(&ctx, &path, &content).await,
        Commands::Mkdir { path } => mkdir_command(&ctx, &path).await,
        Commands::Rm { path } => rm_command(&ctx, &path).await,
        Commands::Mv { from, to } => mv_command(&ctx, &from, &to).await,
        Commands::Mount { name, dir } => mount_command(&ctx, &name, &dir).await,
        Commands::Unmount { name } => unmount_command(&ctx, &name).await,
        Commands::Mounts => mounts_command(&ctx, &mut out).await,
        Commands::Watch(args) => {
            watch_command(&ctx, &args.path, args.deep, args.updates, &mut out).await
        }
    };
    out.flush()?;
    result
}
