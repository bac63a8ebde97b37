//! commit-history - git post-commit hook that records commit metadata.

use std::process::ExitCode;

use clap::Parser;
use tracing::{debug, error};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commit_history::cli::{self, Cli, Commands};
use commit_history::git::GitCli;
use commit_history::Error;

fn main() -> ExitCode {
    // Logs go to stderr; stdout carries command output
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("commit_history=info")),
        )
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "commit-history failed");
            eprintln!("commit-history: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Error> {
    let start = match cli.repo {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    // Hooks and `--repo` may point anywhere inside the working tree
    let repo_root = GitCli::new(&start).toplevel().unwrap_or_else(|e| {
        debug!(path = %start.display(), error = %e, "No git working tree found, using path as is");
        start
    });

    match cli.command {
        Commands::Record { no_tests } => {
            cli::record::run(&repo_root, no_tests)?;
        }
        Commands::Install => {
            if cli::hooks::install_hook(&repo_root)? {
                println!("Post-commit hook installed.");
            } else {
                println!("Post-commit hook already installed.");
            }
        }
        Commands::Uninstall => {
            if cli::hooks::uninstall_hook(&repo_root)? {
                println!("Post-commit hook removed.");
            } else {
                println!("No commit-history hook found.");
            }
        }
        Commands::Summary { branch, last } => {
            cli::summary::run(&repo_root, branch.as_deref(), last)?;
        }
    }

    Ok(())
}
