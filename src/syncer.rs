//! The reconciliation engine.
//!
//! [`Syncer::sync`] brings a local checkout to the upstream branch's exact
//! tree while preserving every user-originated artifact. User artifacts are
//! set aside under a timestamped backup name, upstream content is restored
//! via fetch/reset/checkout, backups move back to their original names when
//! nothing collides, and the upstream-owned portion of the tree is locked
//! read-only. A damaged checkout never blocks progress: any failure during
//! the update path quarantines the whole tree and falls back to a fresh
//! clone.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result, bail};
use chrono::Utc;

use crate::git::Repository;
use crate::path::SyncPath;
use crate::pathset::PathSet;
use crate::status::{ChangeKind, StatusEntry, parse_status};
use crate::{profile, walk};

/// Name of the instructions file, both beside the executable and at its
/// two destinations in and above the clone.
pub const INSTRUCTIONS_FILE: &str = "SYNC-INSTRUCTIONS.md";

const REMOTE: &str = "origin";

static RUN_STAMP: OnceLock<String> = OnceLock::new();

/// The 8-hex-digit backup suffix, derived once per process from
/// seconds-since-epoch. Restore strips exactly one `.<stamp>` component,
/// so every backup within an invocation must share this value.
pub fn run_stamp() -> &'static str {
    RUN_STAMP.get_or_init(|| format!("{:08x}", Utc::now().timestamp()))
}

pub struct Syncer {
    repo_url: String,
    branch: String,
    repo_dir: SyncPath,
    program_dir: PathBuf,
    all_dirs: PathSet,
    all_files: PathSet,
    user_dirs: PathSet,
    user_files: PathSet,
    backups: PathSet,
}

impl Syncer {
    pub fn new(
        repo_url: impl Into<String>,
        branch: impl Into<String>,
        repo_dir: &Path,
    ) -> Result<Self> {
        let repo_dir = std::path::absolute(repo_dir)
            .with_context(|| format!("resolving {}", repo_dir.display()))?;
        let program_dir = std::env::current_exe()
            .context("locating the running executable")?
            .parent()
            .context("executable has no parent directory")?
            .to_path_buf();
        Ok(Syncer {
            repo_url: repo_url.into(),
            branch: branch.into(),
            repo_dir: SyncPath::dir(repo_dir),
            program_dir,
            all_dirs: PathSet::new(),
            all_files: PathSet::new(),
            user_dirs: PathSet::new(),
            user_files: PathSet::new(),
            backups: PathSet::new(),
        })
    }

    /// Converge the clone on upstream. On return the tree matches
    /// `origin/<branch>` for upstream-owned paths, user artifacts are
    /// restored or retained under backup names, upstream files are
    /// read-only, and the instructions file is in place.
    pub fn sync(&mut self) -> Result<()> {
        if self.repo_dir.exists() {
            if let Err(err) = profile::time("sync.update", || self.update()) {
                log::error!("Updating failed: {err:#}");
                self.quarantine_clone()?;
                profile::time("sync.clone", || self.fresh_clone())?;
            }
        } else {
            profile::time("sync.clone", || self.fresh_clone())?;
        }
        profile::time("sync.finalize", || self.finalize())
    }

    fn fresh_clone(&mut self) -> Result<()> {
        log::info!(
            "Cloning {} (branch {}) into {}",
            self.repo_url,
            self.branch,
            self.repo_dir
        );
        let repo = Repository::clone_blobless(&self.repo_url, &self.branch, self.repo_dir.path())?;
        repo.configure_safe_directory()?;
        repo.fetch(REMOTE, &self.branch)?;
        Ok(())
    }

    /// Recovery: whatever occupies `repo_dir` becomes a single timestamped
    /// sibling artifact, and reconciler bookkeeping starts over.
    fn quarantine_clone(&mut self) -> Result<()> {
        let quarantine = self.repo_dir.append_suffix(run_stamp())?;
        log::warn!("Setting aside damaged clone as {quarantine}");
        self.repo_dir
            .add_mode_bits(0o700)
            .with_context(|| format!("reclaiming access to {}", self.repo_dir))?;
        self.repo_dir
            .rename_to(&quarantine)
            .with_context(|| format!("setting aside {}", self.repo_dir))?;
        self.all_dirs.clear();
        self.all_files.clear();
        self.user_dirs.clear();
        self.user_files.clear();
        self.backups.clear();
        Ok(())
    }

    fn update(&mut self) -> Result<()> {
        log::info!("Updating existing clone at {}", self.repo_dir);
        self.refresh_tree_sets()?;

        let repo = Repository::at(self.repo_dir.path());
        let status = repo.status_porcelain()?;
        self.classify(&status)?;
        self.refresh_tree_sets()?;

        // Replace origin outright; a user may have pointed it elsewhere.
        repo.remove_remote(REMOTE)?;
        repo.add_remote(REMOTE, &self.repo_url)?;
        repo.configure_safe_directory()?;
        repo.fetch(REMOTE, &self.branch)?;

        repo.reset_index()?;
        repo.checkout_from_index()?;
        repo.checkout(&self.remote_ref())?;

        self.refresh_tree_sets()?;
        self.restore_backups()?;
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        self.refresh_tree_sets()?;
        self.validate(true)?;
        self.lock_clone()?;
        self.copy_instructions()?;
        self.validate(false)?;
        log::info!("Clone at {} matches {}", self.repo_dir, self.remote_ref());
        Ok(())
    }

    /// Decide, for every status entry, whether the path is a user artifact
    /// that must be set aside before upstream content is restored.
    fn classify(&mut self, status_text: &str) -> Result<()> {
        for entry in parse_status(status_text) {
            match entry.kind {
                // Checkout restores deleted paths; a rename's old name is
                // already gone and its new name shows up separately as
                // untracked.
                ChangeKind::Deleted | ChangeKind::Renamed => {
                    log::debug!("{}: left for checkout", entry.path);
                }
                ChangeKind::Unknown => {
                    log::error!("Unrecognized status output:\n{status_text}");
                    bail!("unrecognized status line for {}", entry.path);
                }
                _ => self.back_up(&entry)?,
            }
        }
        Ok(())
    }

    fn back_up(&mut self, entry: &StatusEntry) -> Result<()> {
        let combined = self.repo_dir.join(&entry.path)?;
        let backup = combined.append_suffix(run_stamp())?;
        log::info!("Backing up {} ({}) as {}", combined, entry.kind, backup);
        combined
            .rename_to(&backup)
            .with_context(|| format!("backing up {combined}"))?;

        self.backups.insert(backup.clone());
        if backup.is_dir_kind() {
            // The backup carries the whole subtree with it.
            self.user_dirs.insert(backup.clone());
            self.user_dirs.extend(walk::all_dirs(backup.path())?);
            self.user_files.extend(walk::all_files(backup.path())?);
        } else {
            self.user_files.insert(backup);
        }
        Ok(())
    }

    /// Move every backup whose original name is free back into place;
    /// backups that collide with upstream content stay put.
    fn restore_backups(&mut self) -> Result<()> {
        for backup in self.backups.clone() {
            let original = backup.strip_suffix()?;
            if original.exists() {
                log::info!("Keeping backup {backup} ({original} is upstream content)");
                continue;
            }
            log::info!("Restoring {backup} to {original}");
            backup
                .rename_to(&original)
                .with_context(|| format!("restoring {backup}"))?;

            self.backups.remove(&backup);
            if backup.is_dir_kind() {
                self.user_dirs.remove_under(backup.path());
                self.user_files.remove_under(backup.path());
                self.user_dirs.insert(original.clone());
                self.user_dirs.extend(walk::all_dirs(original.path())?);
                self.user_files.extend(walk::all_files(original.path())?);
            } else {
                self.user_files.remove(&backup);
                self.user_files.insert(original);
            }
        }
        Ok(())
    }

    /// Upstream-owned files, i.e. everything not classified as the user's
    /// and not the instructions file.
    fn git_files(&self) -> PathSet {
        let mut owned = &self.all_files - &self.user_files;
        owned.remove(&self.instructions_in_repo());
        owned
    }

    fn git_dirs(&self) -> PathSet {
        &self.all_dirs - &self.user_dirs
    }

    /// Clear write bits on upstream files; keep upstream directories
    /// user-traversable so the next run can relock their contents.
    fn lock_clone(&self) -> Result<()> {
        let dirs = self.git_dirs();
        let files = self.git_files();
        log::info!(
            "Locking {} upstream files across {} directories",
            files.len(),
            dirs.len()
        );
        for dir in &dirs {
            dir.add_mode_bits(0o700)
                .with_context(|| format!("opening directory {dir}"))?;
        }
        for file in &files {
            file.clear_mode_bits(0o222)
                .with_context(|| format!("locking {file}"))?;
        }
        Ok(())
    }

    fn copy_instructions(&self) -> Result<()> {
        let source = SyncPath::file(self.program_dir.join(INSTRUCTIONS_FILE));
        let text = source
            .read_text()
            .with_context(|| format!("reading {source}"))?;

        self.instructions_in_repo()
            .write_text(&text)
            .context("writing instructions into the clone")?;
        if let Some(parent) = self.repo_dir.parent() {
            SyncPath::file(parent.path().join(INSTRUCTIONS_FILE))
                .write_text(&text)
                .context("writing instructions beside the clone")?;
        }
        Ok(())
    }

    /// After a sync the only acceptable status entries are untracked ones
    /// (backups and the instructions file). With `diff` set, additionally
    /// require the working tree to be byte-identical to upstream.
    fn validate(&self, diff: bool) -> Result<()> {
        let repo = Repository::at(self.repo_dir.path());
        let status_text = repo.status_porcelain()?;
        for entry in parse_status(&status_text) {
            if entry.kind != ChangeKind::Untracked {
                log::error!("Unexpected status after sync:\n{status_text}");
                bail!(
                    "{} is {} after sync; expected only untracked entries",
                    entry.path,
                    entry.kind
                );
            }
        }
        if diff {
            repo.diff_clean(&self.remote_ref())
                .context("working tree differs from upstream")?;
        }
        Ok(())
    }

    fn refresh_tree_sets(&mut self) -> Result<()> {
        self.all_files = walk::all_files(self.repo_dir.path())
            .with_context(|| format!("enumerating files under {}", self.repo_dir))?;
        self.all_dirs = walk::all_dirs(self.repo_dir.path())
            .with_context(|| format!("enumerating directories under {}", self.repo_dir))?;
        log::debug!(
            "tree holds {} files in {} directories",
            self.all_files.len(),
            self.all_dirs.len()
        );
        Ok(())
    }

    fn remote_ref(&self) -> String {
        format!("{REMOTE}/{}", self.branch)
    }

    fn instructions_in_repo(&self) -> SyncPath {
        SyncPath::file(self.repo_dir.path().join(INSTRUCTIONS_FILE))
    }
}
