use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "sy", about = concat!("[=] syncboard v", env!("CARGO_PKG_VERSION"), " - your trackers, one board"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Run against a different config directory
    #[arg(short = 'C', long = "config-dir", global = true)]
    pub config_dir: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the config and panel stores
    Init(InitArgs),
    /// Validate the config and panel stores
    Check,
    /// List a panel's rows
    List(ListArgs),
}

// ---------------------------------------------------------------------------
// Init args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct InitArgs {
    /// Overwrite an existing board.toml
    #[arg(long)]
    pub force: bool,
}

// ---------------------------------------------------------------------------
// List args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ListArgs {
    /// Panel to list (default: all panels)
    pub panel: Option<String>,
    /// Include completed rows
    #[arg(long)]
    pub all: bool,
}
