//! Thin adapter over the git porcelain.
//!
//! All VCS access funnels through [`Repository`], so the reconciler never
//! spells out a git invocation itself. Scripts run under the strict-mode
//! shell runner; anything interpolated into a script is quoted first.

use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::shell::{Shell, ShellError};

#[derive(Debug)]
pub enum GitError {
    CommandFailed(String),
}

impl fmt::Display for GitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GitError::CommandFailed(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for GitError {}

impl From<ShellError> for GitError {
    fn from(e: ShellError) -> Self {
        GitError::CommandFailed(e.to_string())
    }
}

fn quote(s: &str) -> Cow<'_, str> {
    shell_escape::unix::escape(Cow::Borrowed(s))
}

fn quote_path(p: &Path) -> String {
    shell_escape::unix::escape(p.to_string_lossy()).into_owned()
}

/// A local checkout to run porcelain commands against.
#[derive(Debug, Clone)]
pub struct Repository {
    path: PathBuf,
}

impl Repository {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Repository { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Blobless clone of `branch` from `url` into `dir`. Runs from `dir`'s
    /// parent, since the checkout does not exist yet.
    pub fn clone_blobless(url: &str, branch: &str, dir: &Path) -> Result<Repository, GitError> {
        let parent = dir
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        Shell::in_dir(parent).run(&format!(
            "git clone --filter=blob:none --branch {} {} {}",
            quote(branch),
            quote(url),
            quote_path(dir)
        ))?;
        Ok(Repository::at(dir))
    }

    /// Mark this checkout as a safe directory, so syncs keep working when
    /// the tree was created by a different uid.
    pub fn configure_safe_directory(&self) -> Result<(), GitError> {
        self.run(&format!(
            "git config --global --add safe.directory {}",
            quote_path(&self.path)
        ))?;
        Ok(())
    }

    /// Delete a remote if it exists; absence is not an error.
    pub fn remove_remote(&self, name: &str) -> Result<(), GitError> {
        Shell::in_dir(&self.path)
            .check(false)
            .run(&format!("git remote remove {}", quote(name)))?;
        Ok(())
    }

    pub fn add_remote(&self, name: &str, url: &str) -> Result<(), GitError> {
        self.run(&format!("git remote add {} {}", quote(name), quote(url)))?;
        Ok(())
    }

    pub fn fetch(&self, remote: &str, branch: &str) -> Result<(), GitError> {
        self.run(&format!("git fetch {} {}", quote(remote), quote(branch)))?;
        Ok(())
    }

    /// Unstage everything.
    pub fn reset_index(&self) -> Result<(), GitError> {
        self.run("git reset")?;
        Ok(())
    }

    /// Rebuild the working tree from the index.
    pub fn checkout_from_index(&self) -> Result<(), GitError> {
        self.run("git checkout -- .")?;
        Ok(())
    }

    /// Check out a ref (typically a remote-tracking ref, leaving HEAD
    /// detached at upstream).
    pub fn checkout(&self, refname: &str) -> Result<(), GitError> {
        self.run(&format!("git checkout {}", quote(refname)))?;
        Ok(())
    }

    pub fn status_porcelain(&self) -> Result<String, GitError> {
        self.run("git status --porcelain")
    }

    /// Fail unless the working tree is byte-identical to `refname` for all
    /// tracked paths.
    pub fn diff_clean(&self, refname: &str) -> Result<(), GitError> {
        self.run(&format!("git diff --exit-code {}", quote(refname)))?;
        Ok(())
    }

    fn run(&self, script: &str) -> Result<String, GitError> {
        Ok(Shell::in_dir(&self.path).run(script)?.stdout)
    }
}
