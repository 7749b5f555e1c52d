//! Deterministic sets of paths.
//!
//! Every collection of paths in the reconciler is a [`PathSet`], which
//! iterates in sorted textual order. Logs and test assertions built from
//! these sets are therefore stable across runs.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::{BitAnd, BitOr, BitXor, Sub};
use std::path::Path;

use crate::path::SyncPath;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathSet(BTreeSet<SyncPath>);

impl PathSet {
    pub fn new() -> Self {
        PathSet(BTreeSet::new())
    }

    pub fn insert(&mut self, path: SyncPath) -> bool {
        self.0.insert(path)
    }

    pub fn remove(&mut self, path: &SyncPath) -> bool {
        self.0.remove(path)
    }

    pub fn contains(&self, path: &SyncPath) -> bool {
        self.0.contains(path)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Sorted iteration.
    pub fn iter(&self) -> impl Iterator<Item = &SyncPath> {
        self.0.iter()
    }

    /// Drop every member located under `prefix` (the prefix itself
    /// included). Used when a restored subtree invalidates bookkeeping
    /// recorded under its backup name.
    pub fn remove_under(&mut self, prefix: &Path) {
        self.0.retain(|p| !p.starts_with(prefix));
    }
}

impl FromIterator<SyncPath> for PathSet {
    fn from_iter<I: IntoIterator<Item = SyncPath>>(iter: I) -> Self {
        PathSet(iter.into_iter().collect())
    }
}

impl Extend<SyncPath> for PathSet {
    fn extend<I: IntoIterator<Item = SyncPath>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl IntoIterator for PathSet {
    type Item = SyncPath;
    type IntoIter = std::collections::btree_set::IntoIter<SyncPath>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a PathSet {
    type Item = &'a SyncPath;
    type IntoIter = std::collections::btree_set::Iter<'a, SyncPath>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// Set operations mirror BTreeSet's by-reference operator impls so chained
// expressions stay sorted PathSets throughout.

impl BitOr for &PathSet {
    type Output = PathSet;

    fn bitor(self, rhs: &PathSet) -> PathSet {
        PathSet(&self.0 | &rhs.0)
    }
}

impl BitAnd for &PathSet {
    type Output = PathSet;

    fn bitand(self, rhs: &PathSet) -> PathSet {
        PathSet(&self.0 & &rhs.0)
    }
}

impl Sub for &PathSet {
    type Output = PathSet;

    fn sub(self, rhs: &PathSet) -> PathSet {
        PathSet(&self.0 - &rhs.0)
    }
}

impl BitXor for &PathSet {
    type Output = PathSet;

    fn bitxor(self, rhs: &PathSet) -> PathSet {
        PathSet(&self.0 ^ &rhs.0)
    }
}

impl fmt::Display for PathSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        write!(f, "{{")?;
        for path in &self.0 {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{path}")?;
            first = false;
        }
        write!(f, "}}")
    }
}
