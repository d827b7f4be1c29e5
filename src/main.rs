use std::path::Path;

use clap::Parser;
use syncboard::cli::commands::Cli;
use syncboard::cli::handlers;

fn main() {
    let cli = Cli::parse();

    match cli.command {
        None => {
            // No subcommand → launch TUI
            let root = cli.config_dir.as_deref().map(Path::new);
            if let Err(e) = syncboard::tui::run(root) {
                eprintln!("error: {}", e);
                std::process::exit(1);
            }
        }
        Some(_) => {
            if let Err(e) = handlers::dispatch(cli) {
                eprintln!("error: {}", e);
                std::process::exit(1);
            }
        }
    }
}
