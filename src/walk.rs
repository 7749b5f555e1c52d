//! Filesystem enumeration with traversal permission repair.
//!
//! A previous lock-down (or a hostile chmod) can leave directories without
//! user rwx, which would make the tree impossible to enumerate. The walker
//! therefore repairs every directory mode it encounters while descending.
//! File modes are never altered here. The `<root>/.git` subtree is pruned;
//! nested `.git` directories elsewhere in the tree are ordinary content.

use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use ignore::WalkBuilder;

use crate::path::SyncPath;
use crate::pathset::PathSet;

const USER_RWX: u32 = 0o700;

/// Every file below `root`, excluding the VCS metadata subtree.
pub fn all_files(root: &Path) -> io::Result<PathSet> {
    walk(root, Keep::Files)
}

/// Every directory below `root` (the root itself excluded), excluding the
/// VCS metadata subtree.
pub fn all_dirs(root: &Path) -> io::Result<PathSet> {
    walk(root, Keep::Dirs)
}

#[derive(Clone, Copy)]
enum Keep {
    Files,
    Dirs,
}

fn walk(root: &Path, keep: Keep) -> io::Result<PathSet> {
    if !root.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotADirectory,
            format!("{} is not a directory", root.display()),
        ));
    }
    repair(root)?;

    let git_dir = root.join(".git");
    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .follow_links(false)
        .filter_entry(move |entry| {
            if entry.path() == git_dir {
                return false;
            }
            // Repair before descent; a failure here surfaces as a read
            // error on the directory itself.
            if entry.file_type().is_some_and(|t| t.is_dir()) {
                let _ = repair(entry.path());
            }
            true
        })
        .build();

    let mut set = PathSet::new();
    for result in walker {
        let entry = result.map_err(io::Error::other)?;
        if entry.path() == root {
            continue;
        }
        let Some(file_type) = entry.file_type() else {
            continue;
        };
        match keep {
            Keep::Dirs if file_type.is_dir() => {
                set.insert(SyncPath::dir(entry.path()));
            }
            Keep::Files if !file_type.is_dir() => {
                set.insert(SyncPath::file(entry.path()));
            }
            _ => {}
        }
    }
    Ok(set)
}

/// Ensure the owning user can list, read and enter `dir`.
fn repair(dir: &Path) -> io::Result<()> {
    let mode = fs::metadata(dir)?.permissions().mode();
    if mode & USER_RWX != USER_RWX {
        fs::set_permissions(dir, fs::Permissions::from_mode(mode | USER_RWX))?;
    }
    Ok(())
}
