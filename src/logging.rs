//! The `gs4.log` sink.
//!
//! Records go to a log file in the invoking working directory and are
//! mirrored to stdout, formatted as `<LEVEL> - <message>`. The file is
//! removed after a successful run and parked inside the clone as
//! `gs4.failed.log` after a failed one, so a broken sync always leaves a
//! trail next to the tree it failed on.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use log::{LevelFilter, Log, Metadata, Record};

pub const LOG_FILE: &str = "gs4.log";
pub const FAILED_LOG_FILE: &str = "gs4.failed.log";

static LOGGER: OnceLock<SyncLogger> = OnceLock::new();

struct SyncLogger {
    file: Mutex<File>,
    path: PathBuf,
}

impl Log for SyncLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        // log::Level's Display is already the uppercase name
        let line = format!("{} - {}", record.level(), record.args());
        let _ = writeln!(io::stdout(), "{line}");
        if let Ok(mut file) = self.file.lock() {
            let _ = writeln!(file, "{line}");
        }
    }

    fn flush(&self) {
        if let Ok(mut file) = self.file.lock() {
            let _ = file.flush();
        }
        let _ = io::stdout().flush();
    }
}

/// Install the logger, truncating `gs4.log` in the current working
/// directory. `verbose` raises the level from INFO to DEBUG.
pub fn init(verbose: bool) -> io::Result<()> {
    init_at(std::env::current_dir()?.join(LOG_FILE), verbose)
}

fn init_at(path: PathBuf, verbose: bool) -> io::Result<()> {
    let file = File::create(&path)?;
    let logger = LOGGER.get_or_init(|| SyncLogger {
        file: Mutex::new(file),
        path,
    });
    log::set_logger(logger).map_err(io::Error::other)?;
    log::set_max_level(if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });
    Ok(())
}

/// Successful run: the log has served its purpose.
pub fn discard() {
    if let Some(logger) = LOGGER.get() {
        logger.flush();
        let _ = fs::remove_file(&logger.path);
    }
}

/// Failed run: park the log inside the clone, when there is one.
pub fn preserve(repo_dir: &Path) {
    let Some(logger) = LOGGER.get() else {
        return;
    };
    logger.flush();
    if !repo_dir.is_dir() {
        return;
    }
    let dest = repo_dir.join(FAILED_LOG_FILE);
    if fs::rename(&logger.path, &dest).is_err() {
        // The clone may sit on another filesystem
        if fs::copy(&logger.path, &dest).is_ok() {
            let _ = fs::remove_file(&logger.path);
        }
    }
}
