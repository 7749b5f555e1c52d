// Some helpers are only used by a subset of the scenario tests.
#![allow(dead_code)]

//! Test harness for the `gs` binary.
//!
//! Builds a throwaway upstream repository plus an isolated environment
//! (private HOME, private git config, private working directory for the
//! log file) and runs the real binary against it. Git invocations made by
//! the harness itself pin author identity and config locations so nothing
//! leaks in from the machine running the tests.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::Once;

use tempfile::TempDir;

const INSTRUCTIONS_TEXT: &str =
    "# About this synchronized directory\n\nTest copy of the sync instructions.\n";

/// Locate the `gs` binary and make sure `SYNC-INSTRUCTIONS.md` sits next
/// to it, the way a real installation ships it.
pub fn gs_bin() -> PathBuf {
    static INSTALL: Once = Once::new();
    let bin = insta_cmd::get_cargo_bin("gs");
    INSTALL.call_once(|| {
        let dir = bin.parent().expect("binary has a parent directory");
        fs::write(dir.join("SYNC-INSTRUCTIONS.md"), INSTRUCTIONS_TEXT)
            .expect("write instructions beside the binary");
    });
    bin
}

pub struct SyncHarness {
    _temp: TempDir,
    /// The authoritative repository (plain path, used as the clone URL)
    pub upstream: PathBuf,
    /// Where the tool maintains the checkout
    pub repo_dir: PathBuf,
    /// Isolated HOME for the tool process
    pub home: PathBuf,
    /// Working directory of the tool process (gs4.log lands here)
    pub cwd: PathBuf,
}

impl SyncHarness {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("create temp dir");
        let upstream = temp.path().join("upstream");
        let home = temp.path().join("home");
        let cwd = temp.path().join("cwd");
        let clones = temp.path().join("clones");
        for dir in [&upstream, &home, &cwd, &clones] {
            fs::create_dir(dir).expect("create harness dir");
        }

        git(&upstream, &["init", "-q", "-b", "main"]);
        // Allow partial (blobless) clones from this repository
        git(&upstream, &["config", "uploadpack.allowFilter", "true"]);
        git(&upstream, &["config", "uploadpack.allowAnySHA1InWant", "true"]);

        fs::write(upstream.join("README.md"), "# Course\n").unwrap();
        fs::write(upstream.join("lecture.md"), "lecture one\n").unwrap();
        fs::create_dir(upstream.join("datasets")).unwrap();
        fs::write(upstream.join("datasets/data.csv"), "a,b\n1,2\n").unwrap();
        git(&upstream, &["add", "-A"]);
        git(&upstream, &["commit", "-q", "-m", "initial content"]);

        SyncHarness {
            _temp: temp,
            upstream,
            repo_dir: clones.join("course"),
            home,
            cwd,
        }
    }

    /// Add or replace a file upstream and commit it.
    pub fn commit_upstream(&self, name: &str, contents: &str) {
        let path = self.upstream.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
        git(&self.upstream, &["add", "-A"]);
        git(&self.upstream, &["commit", "-q", "-m", "update"]);
    }

    pub fn sync(&self) -> Output {
        self.sync_args(&[])
    }

    pub fn sync_args(&self, extra: &[&str]) -> Output {
        let mut cmd = Command::new(gs_bin());
        cmd.arg(&self.upstream)
            .arg("main")
            .arg(&self.repo_dir)
            .args(extra)
            .current_dir(&self.cwd)
            .env("HOME", &self.home)
            .env("GIT_CONFIG_GLOBAL", self.home.join(".gitconfig"))
            .env("GIT_CONFIG_SYSTEM", "/dev/null")
            .env("GIT_CONFIG_NOSYSTEM", "1");
        cmd.output().expect("run gs binary")
    }

    pub fn assert_sync_ok(&self) {
        let out = self.sync();
        assert!(
            out.status.success(),
            "sync failed\nstdout:\n{}\nstderr:\n{}",
            String::from_utf8_lossy(&out.stdout),
            String::from_utf8_lossy(&out.stderr)
        );
    }

    /// Entries directly inside `repo_dir` whose name is `prefix` plus one
    /// 8-hex-digit backup suffix.
    pub fn backups_of(&self, prefix: &str) -> Vec<PathBuf> {
        let mut found: Vec<PathBuf> = fs::read_dir(&self.repo_dir)
            .expect("read repo dir")
            .map(|e| e.unwrap().path())
            .filter(|p| {
                let name = p.file_name().unwrap().to_string_lossy().into_owned();
                name.strip_prefix(prefix)
                    .and_then(|rest| rest.strip_prefix('.'))
                    .is_some_and(is_hex8)
            })
            .collect();
        found.sort();
        found
    }

    /// Sibling paths of `repo_dir` carrying a backup suffix (quarantined
    /// whole-tree backups).
    pub fn quarantined_clones(&self) -> Vec<PathBuf> {
        let parent = self.repo_dir.parent().unwrap();
        let prefix = format!(
            "{}.",
            self.repo_dir.file_name().unwrap().to_string_lossy()
        );
        let mut found: Vec<PathBuf> = fs::read_dir(parent)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| {
                let name = p.file_name().unwrap().to_string_lossy().into_owned();
                name.strip_prefix(&prefix).is_some_and(is_hex8)
            })
            .collect();
        found.sort();
        found
    }

    /// Relative paths of everything in the checkout except the VCS
    /// metadata, sorted, for before/after comparisons.
    pub fn tree_listing(&self) -> Vec<String> {
        let mut names = Vec::new();
        collect_tree(&self.repo_dir, &self.repo_dir, &mut names);
        names.sort();
        names
    }

    pub fn mode_of(&self, rel: &str) -> u32 {
        fs::metadata(self.repo_dir.join(rel))
            .expect("stat path")
            .permissions()
            .mode()
            & 0o777
    }

    /// Make a locked upstream file writable again, as a user with their
    /// own permissions would before editing it.
    pub fn unlock(&self, rel: &str) {
        let path = self.repo_dir.join(rel);
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        fs::set_permissions(&path, fs::Permissions::from_mode(mode | 0o200)).unwrap();
    }
}

/// Fixture so scenario tests can take the harness as an argument.
#[rstest::fixture]
pub fn harness() -> SyncHarness {
    SyncHarness::new()
}

pub fn is_hex8(s: &str) -> bool {
    s.len() == 8 && s.chars().all(|c| c.is_ascii_hexdigit())
}

fn collect_tree(root: &Path, dir: &Path, names: &mut Vec<String>) {
    for entry in fs::read_dir(dir).expect("read dir") {
        let path = entry.unwrap().path();
        let rel = path.strip_prefix(root).unwrap().display().to_string();
        if rel == ".git" {
            continue;
        }
        names.push(rel);
        if path.is_dir() {
            collect_tree(root, &path, names);
        }
    }
}

/// Run git with pinned identity and no access to real user/system config.
pub fn git(dir: &Path, args: &[&str]) {
    let out = Command::new("git")
        .args([
            "-c",
            "user.name=Upstream",
            "-c",
            "user.email=upstream@example.invalid",
            "-c",
            "commit.gpgsign=false",
        ])
        .args(args)
        .current_dir(dir)
        .env("GIT_CONFIG_GLOBAL", "/dev/null")
        .env("GIT_CONFIG_SYSTEM", "/dev/null")
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .output()
        .expect("run git");
    assert!(
        out.status.success(),
        "git {args:?} failed in {}:\n{}",
        dir.display(),
        String::from_utf8_lossy(&out.stderr)
    );
}
