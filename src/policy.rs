//! The jail's allow/deny matcher.
//!
//! A [`PolicyTree`] is the compiled form of a [`FsRule`] list: a trie keyed
//! by path component, where each node remembers whether it was named
//! exactly, or named as the root of a recursive subtree. `check` is a pure
//! function of the trie and the query path -- no filesystem access happens
//! here, which is what lets [`crate::access`] call it twice per request
//! (once for the normalized path, once for the symlink-resolved one)
//! cheaply.

use crate::error::{Error, ErrorImpl};

use std::{
    collections::HashMap,
    ffi::{OsStr, OsString},
    path::Path,
};

/// A single filesystem access rule, as supplied by the embedding executor
/// when it builds a [`crate::jail::Jail`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsRule {
    /// Matches exactly one absolute path (not its children, if it's a dir).
    ExactFile(String),
    /// Matches the named directory itself, but not its children.
    ExactDir(String),
    /// Matches the named directory and every path beneath it.
    RecursiveDir(String),
}

impl FsRule {
    fn path(&self) -> &str {
        match self {
            Self::ExactFile(p) | Self::ExactDir(p) | Self::RecursiveDir(p) => p,
        }
    }

    fn is_recursive(&self) -> bool {
        matches!(self, Self::RecursiveDir(_))
    }
}

#[derive(Default, Debug)]
struct Node {
    children: HashMap<OsString, Node>,
    /// Set by either `ExactFile` or `ExactDir` landing on this node -- the
    /// two are indistinguishable once compiled, since neither admits
    /// children and `check` takes no "is this a directory" hint.
    exact: bool,
    /// Set by `RecursiveDir`: this node and everything beneath it matches.
    recursive: bool,
}

/// The compiled, immutable form of a rule list.
#[derive(Debug)]
pub struct PolicyTree {
    root: Node,
}

impl PolicyTree {
    /// Compile `rules` into a matcher.
    ///
    /// Every rule path must already be absolute and lexically normalized
    /// (no `.`/`..` components, no trailing slash except `/` itself) --
    /// this mirrors the precondition [`crate::resolver::resolve`] already
    /// enforces on paths it hands to [`PolicyTree::check`], so a jail built
    /// from un-normalized rules would silently never match what callers
    /// expect.
    pub fn compile(rules: &[FsRule]) -> Result<Self, Error> {
        let mut root = Node::default();
        for rule in rules {
            let path = rule.path();
            validate_rule_path(path)?;

            let mut node = &mut root;
            for component in split_components(OsStr::new(path)) {
                node = node.children.entry(component.to_os_string()).or_default();
            }
            if rule.is_recursive() {
                node.recursive = true;
            } else {
                node.exact = true;
            }
        }
        Ok(Self { root })
    }

    /// An empty policy tree, which denies every path.
    pub fn empty() -> Self {
        Self {
            root: Node::default(),
        }
    }

    /// Is `path` admitted by this policy?
    ///
    /// `path` must already be absolute and lexically normalized; this
    /// function does no normalization and no filesystem access.
    pub fn check(&self, path: &Path) -> bool {
        let mut node = &self.root;
        if node.recursive {
            return true;
        }
        for component in split_components(path.as_os_str()) {
            node = match node.children.get(component) {
                Some(n) => n,
                None => return false,
            };
            if node.recursive {
                return true;
            }
        }
        node.exact
    }
}

fn validate_rule_path(path: &str) -> Result<(), Error> {
    if !path.starts_with('/') {
        return Err(ErrorImpl::InvalidRule {
            name: "filesystem access rule".into(),
            description: format!("{path:?} is not absolute").into(),
        }
        .into());
    }
    for component in split_components(OsStr::new(path)) {
        if component == "." || component == ".." {
            return Err(ErrorImpl::InvalidRule {
                name: "filesystem access rule".into(),
                description: format!("{path:?} contains a '.'/'..' component").into(),
            }
            .into());
        }
    }
    Ok(())
}

fn split_components(path: &OsStr) -> impl Iterator<Item = &OsStr> {
    path.as_encoded_bytes()
        .split(|&b| b == b'/')
        .filter(|s| !s.is_empty())
        // SAFETY-free: splitting encoded bytes on an ASCII separator always
        // yields valid sub-slices of the original (potentially non-UTF8,
        // but always validly-encoded) OsStr.
        .map(|s| unsafe { OsStr::from_encoded_bytes_unchecked(s) })
}
