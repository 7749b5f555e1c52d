//! File/directory path kinds and safe concatenation.
//!
//! Every path the reconciler touches is either a [`SyncPath::File`] or a
//! [`SyncPath::Dir`]. The kind is carried along from the moment a path is
//! first seen (status parse or walk) so later stages can tell a renamed
//! file from a renamed subtree without re-probing the filesystem.

use std::fmt;
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum PathError {
    /// Left operand of a concatenation was not a directory path
    NotADirectory(PathBuf),
    /// Right operand of a concatenation was absolute
    AbsoluteJoin(PathBuf),
    /// Path has no `.suffix` component to strip
    NoSuffix(PathBuf),
    /// Path has no final component to extend
    NoFileName(PathBuf),
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathError::NotADirectory(p) => {
                write!(f, "cannot join onto file path {}", p.display())
            }
            PathError::AbsoluteJoin(p) => {
                write!(f, "cannot join absolute path {}", p.display())
            }
            PathError::NoSuffix(p) => {
                write!(f, "no suffix to strip from {}", p.display())
            }
            PathError::NoFileName(p) => {
                write!(f, "path {} has no final component", p.display())
            }
        }
    }
}

impl std::error::Error for PathError {}

/// A filesystem path tagged as file-like or directory-like.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SyncPath {
    File(PathBuf),
    Dir(PathBuf),
}

impl SyncPath {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        SyncPath::File(path.into())
    }

    pub fn dir(path: impl Into<PathBuf>) -> Self {
        SyncPath::Dir(path.into())
    }

    /// Construct by probing the filesystem: an existing file is file-kind,
    /// anything else (existing directory, or nothing at all) is dir-kind.
    pub fn from_disk(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if path.is_file() {
            SyncPath::File(path)
        } else {
            SyncPath::Dir(path)
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            SyncPath::File(p) | SyncPath::Dir(p) => p,
        }
    }

    pub fn is_dir_kind(&self) -> bool {
        matches!(self, SyncPath::Dir(_))
    }

    /// Whether anything is present at this path. Uses `symlink_metadata` so
    /// a dangling symlink still counts as occupying the name.
    pub fn exists(&self) -> bool {
        fs::symlink_metadata(self.path()).is_ok()
    }

    /// Concatenate a relative path onto a directory path. The result takes
    /// the kind of the right operand; a file-path left operand or an
    /// absolute right operand is an error.
    pub fn join(&self, rel: &SyncPath) -> Result<SyncPath, PathError> {
        let base = match self {
            SyncPath::Dir(p) => p,
            SyncPath::File(p) => return Err(PathError::NotADirectory(p.clone())),
        };
        if rel.path().is_absolute() {
            return Err(PathError::AbsoluteJoin(rel.path().to_path_buf()));
        }
        Ok(match rel {
            SyncPath::File(p) => SyncPath::File(base.join(p)),
            SyncPath::Dir(p) => SyncPath::Dir(base.join(p)),
        })
    }

    /// Concatenate a plain name onto a directory path, resolving the kind
    /// of the result by probing the filesystem (dir-kind when nothing
    /// exists yet).
    pub fn resolve(&self, name: &str) -> Result<SyncPath, PathError> {
        let base = match self {
            SyncPath::Dir(p) => p,
            SyncPath::File(p) => return Err(PathError::NotADirectory(p.clone())),
        };
        Ok(SyncPath::from_disk(base.join(name)))
    }

    /// Extend the final component with `.{suffix}`, preserving the kind.
    /// This is how backup names are formed for files and subtrees alike.
    pub fn append_suffix(&self, suffix: &str) -> Result<SyncPath, PathError> {
        let name = self
            .path()
            .file_name()
            .ok_or_else(|| PathError::NoFileName(self.path().to_path_buf()))?;
        let mut name = name.to_os_string();
        name.push(".");
        name.push(suffix);
        Ok(self.with_file_name(name))
    }

    /// Remove exactly the final `.component` from the name, preserving the
    /// kind. The inverse of [`append_suffix`](Self::append_suffix).
    pub fn strip_suffix(&self) -> Result<SyncPath, PathError> {
        let name = self
            .path()
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| PathError::NoFileName(self.path().to_path_buf()))?;
        match name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => Ok(self.with_file_name(stem.into())),
            _ => Err(PathError::NoSuffix(self.path().to_path_buf())),
        }
    }

    pub fn parent(&self) -> Option<SyncPath> {
        self.path().parent().map(SyncPath::dir)
    }

    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.path().starts_with(prefix)
    }

    pub fn rename_to(&self, dest: &SyncPath) -> io::Result<()> {
        fs::rename(self.path(), dest.path())
    }

    /// Permission bits of the underlying inode (the 12 mode bits only).
    pub fn mode(&self) -> io::Result<u32> {
        Ok(fs::metadata(self.path())?.permissions().mode() & 0o7777)
    }

    pub fn set_mode(&self, mode: u32) -> io::Result<()> {
        fs::set_permissions(self.path(), fs::Permissions::from_mode(mode))
    }

    pub fn add_mode_bits(&self, bits: u32) -> io::Result<()> {
        self.set_mode(self.mode()? | bits)
    }

    pub fn clear_mode_bits(&self, bits: u32) -> io::Result<()> {
        self.set_mode(self.mode()? & !bits)
    }

    pub fn read_text(&self) -> io::Result<String> {
        fs::read_to_string(self.path())
    }

    pub fn write_text(&self, text: &str) -> io::Result<()> {
        fs::write(self.path(), text)
    }

    fn with_file_name(&self, name: std::ffi::OsString) -> SyncPath {
        let path = self.path().with_file_name(name);
        match self {
            SyncPath::File(_) => SyncPath::File(path),
            SyncPath::Dir(_) => SyncPath::Dir(path),
        }
    }
}

// Ordered by textual path so sets of paths iterate deterministically;
// the kind only breaks exact-path ties.
impl Ord for SyncPath {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.path()
            .as_os_str()
            .cmp(other.path().as_os_str())
            .then_with(|| self.is_dir_kind().cmp(&other.is_dir_kind()))
    }
}

impl PartialOrd for SyncPath {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SyncPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path().display())
    }
}
