use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use git_sync::{Syncer, logging, profile};

mod cli;

use cli::Cli;

/// Marker file in the invoking user's home that disables synchronization.
const OPT_OUT_FILE: &str = ".git-sync-off";

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("ERROR - cannot open {}: {e}", logging::LOG_FILE);
        return ExitCode::FAILURE;
    }

    if opted_out() {
        log::info!("{OPT_OUT_FILE} found in home directory; skipping synchronization");
        logging::discard();
        return ExitCode::SUCCESS;
    }

    let outcome = profile::time("sync", || run(&cli));

    if cli.profile {
        print!("{}", profile::report(100));
    }

    match outcome {
        Ok(()) => {
            logging::discard();
            ExitCode::SUCCESS
        }
        Err(err) => {
            log::error!("{err:#}");
            logging::preserve(&cli.repo_dir);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let mut syncer = Syncer::new(&cli.repo_url, &cli.branch, &cli.repo_dir)?;
    syncer.sync()
}

fn opted_out() -> bool {
    home::home_dir().is_some_and(|h| h.join(OPT_OUT_FILE).exists())
}
