mod cli;
mod commands;
mod document;
mod error;
mod layout;
mod loader;
mod model;
mod organizer;
mod pipeline;
mod render;
mod resolver;
#[cfg(test)]
mod test_support;
mod util;
mod writer;

use anyhow::Result;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::pipeline::Direction;

fn main() {
    init_tracing();

    if let Err(err) = run() {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect(args) => commands::inspect::run(args),
        Commands::Folders(args) => commands::folders::run(args),
        Commands::MovePhotos(args) => commands::photos::run(args, Direction::IntoUnitFolders),
        Commands::MoveBack(args) => commands::photos::run(args, Direction::BackToRoot),
        Commands::Render(args) => commands::documents::render(args),
        Commands::MoveDocs(args) => commands::documents::place(args),
        Commands::Run(args) => commands::run::run(args),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
