use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "volkeeper", version, about = "Track and drive lifecycle actions on container volumes")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v for verbose, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode: suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: <config dir>/volkeeper/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Backend service URL, overriding the config file
    #[arg(long, global = true)]
    pub backend: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List volumes with their size and any action in progress
    Ls,

    /// Show actions currently in progress
    Progress,

    /// Recompute a volume's size
    Size(VolumeArgs),

    /// Clone a volume into another volume
    Clone(CloneArgs),

    /// Export a volume's content to a .tar.gz file
    Export(PathArgs),

    /// Import a .tar.gz file into a volume, replacing its content
    Import(PathArgs),

    /// Save a volume's content into a local image
    Save(ImageArgs),

    /// Load a local image's content into a volume
    Load(ImageArgs),

    /// Push a volume's content to a registry
    Push(ReferenceArgs),

    /// Pull a volume's content from a registry
    Pull(ReferenceArgs),

    /// Transfer a volume to another host
    Transfer(TransferArgs),

    /// Remove all content from a volume
    Empty(VolumeArgs),

    /// Delete a volume permanently
    Delete(DeleteArgs),

    /// Follow volumes and actions live until interrupted
    Watch(WatchArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Arguments for commands that only take a volume.
#[derive(clap::Args, Debug)]
pub struct VolumeArgs {
    /// Volume name
    pub volume: String,
}

/// Arguments for `volkeeper clone`.
#[derive(clap::Args, Debug)]
pub struct CloneArgs {
    /// Volume to clone
    pub volume: String,
    /// Name of the new volume
    pub dest: String,
}

/// Arguments for `volkeeper export` and `volkeeper import`.
#[derive(clap::Args, Debug)]
pub struct PathArgs {
    /// Volume name
    pub volume: String,
    /// Directory to export into, or .tar.gz file to import from
    pub path: String,
}

/// Arguments for `volkeeper save` and `volkeeper load`.
#[derive(clap::Args, Debug)]
pub struct ImageArgs {
    /// Volume name
    pub volume: String,
    /// Image name (e.g., my-volume-backup:latest)
    pub image: String,
}

/// Arguments for `volkeeper push` and `volkeeper pull`.
#[derive(clap::Args, Debug)]
pub struct ReferenceArgs {
    /// Volume name
    pub volume: String,
    /// Registry reference (e.g., registry.example.com/team/data:1)
    pub reference: String,
}

/// Arguments for `volkeeper transfer`.
#[derive(clap::Args, Debug)]
pub struct TransferArgs {
    /// Volume to transfer
    pub volume: String,
    /// Destination host (e.g., ssh://user@host)
    pub host: String,
    /// Volume name on the destination host (default: same name)
    #[arg(long)]
    pub dest_volume: Option<String>,
}

/// Arguments for `volkeeper delete`.
#[derive(clap::Args, Debug)]
pub struct DeleteArgs {
    /// Volume to delete
    pub volume: String,
    /// Confirm permanent deletion
    #[arg(long)]
    pub yes: bool,
}

/// Arguments for `volkeeper watch`.
#[derive(clap::Args, Debug)]
pub struct WatchArgs {
    /// Seconds between progress polls (0 disables), overriding the config file
    #[arg(long)]
    pub interval: Option<u64>,
    /// Do not restart event streams that close
    #[arg(long)]
    pub no_reconnect: bool,
}

/// Arguments for the `volkeeper completions` command.
#[derive(clap::Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}
