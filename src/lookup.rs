//! Fuzzy class-token lookup over a tree of named entries
//!
//! A key such as `"Player walking flip-horiz"` is split into tokens. The
//! lookup walks down from the root: at each directory the first remaining
//! token naming a child is consumed and the walk continues into that
//! child. When no token matches, the walk falls back to the directory's
//! `normal` child if there is one. The deepest entry reached is the result,
//! so token order in the key does not matter and unknown tokens (flip
//! flags, unrelated classes) are ignored.

use log::trace;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use crate::error::RenderError;

/// Name used for the root directory in diagnostics.
pub const ROOT_NAME: &str = "base";

/// A tree that can be navigated by token.
pub trait TokenTree {
    /// Stable handle to an entry in the tree.
    type Handle: Copy + Eq + Hash + fmt::Debug;

    /// The root directory.
    fn root(&self) -> Self::Handle;

    /// Whether the entry can contain children.
    fn is_directory(&self, handle: Self::Handle) -> bool;

    /// The child named `name`, if `parent` is a directory containing it.
    fn child(&self, parent: Self::Handle, name: &str) -> Option<Self::Handle>;

    /// Child directories of `parent` with their names.
    fn subdirectories(&self, parent: Self::Handle) -> Vec<(String, Self::Handle)>;
}

/// Memoizing class-token lookup.
#[derive(Debug, Clone)]
pub struct ClassLookup<H> {
    normal: Option<String>,
    cache: HashMap<String, H>,
}

impl<H: Copy + Eq + Hash + fmt::Debug> ClassLookup<H> {
    /// Create a lookup over `tree`.
    ///
    /// With `require_normal`, every directory must contain the `normal`
    /// child; otherwise construction fails with `MissingNormalKey` listing
    /// every offending directory path.
    pub fn new<T>(tree: &T, normal: Option<String>, require_normal: bool) -> Result<Self, RenderError>
    where
        T: TokenTree<Handle = H>,
    {
        if require_normal {
            let Some(normal) = normal.as_deref() else {
                return Err(RenderError::NormalKeyRequired);
            };
            let paths = find_lacking_normal(tree, normal);
            if !paths.is_empty() {
                return Err(RenderError::MissingNormalKey { normal: normal.to_string(), paths });
            }
        }
        Ok(Self { normal, cache: HashMap::new() })
    }

    /// Resolve `key`, memoizing the result under both the raw and the
    /// normalized key.
    pub fn get<T>(&mut self, tree: &T, key: &str) -> H
    where
        T: TokenTree<Handle = H>,
    {
        if let Some(&found) = self.cache.get(key) {
            trace!("lookup cache hit for '{}'", key);
            return found;
        }

        let tokens = self.tokens(key);
        let normalized = tokens.join(" ");
        if let Some(&found) = self.cache.get(&normalized) {
            self.cache.insert(key.to_string(), found);
            return found;
        }

        let found = self.follow(tree, &tokens);
        self.cache.insert(normalized, found);
        self.cache.insert(key.to_string(), found);
        found
    }

    /// Forget the cached result for `key`.
    pub fn clear_cached(&mut self, key: &str) {
        let normalized = self.tokens(key).join(" ");
        self.cache.remove(key);
        self.cache.remove(&normalized);
    }

    pub fn is_cached(&self, key: &str) -> bool {
        self.cache.contains_key(key)
    }

    /// Cache keys that resolving `key` would add: the raw key and its
    /// normalized form, whichever are not cached yet.
    pub fn uncached_keys(&self, key: &str) -> Vec<String> {
        let normalized = self.tokens(key).join(" ");
        let mut keys = Vec::new();
        if !self.cache.contains_key(key) {
            keys.push(key.to_string());
        }
        if normalized != key && !self.cache.contains_key(&normalized) {
            keys.push(normalized);
        }
        keys
    }

    /// Remove exactly the given cache keys.
    pub fn forget(&mut self, keys: &[String]) {
        for key in keys {
            self.cache.remove(key);
        }
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Split a key on whitespace, dropping the implicit normal token.
    fn tokens<'k>(&self, key: &'k str) -> Vec<&'k str> {
        key.split_whitespace()
            .filter(|token| Some(*token) != self.normal.as_deref())
            .collect()
    }

    fn follow<T>(&self, tree: &T, tokens: &[&str]) -> H
    where
        T: TokenTree<Handle = H>,
    {
        let mut consumed = vec![false; tokens.len()];
        let mut current = tree.root();
        // Directories entered through `normal` since the last consumed token
        let mut normal_trail: Vec<H> = Vec::new();

        loop {
            if !tree.is_directory(current) {
                return current;
            }

            let matched = tokens
                .iter()
                .enumerate()
                .filter(|(i, _)| !consumed[*i])
                .find_map(|(i, token)| tree.child(current, token).map(|child| (i, child)));

            if let Some((i, child)) = matched {
                consumed[i] = true;
                normal_trail.clear();
                current = child;
                continue;
            }

            let fallback = self.normal.as_deref().and_then(|normal| tree.child(current, normal));
            match fallback {
                Some(child) if child != current && !normal_trail.contains(&child) => {
                    normal_trail.push(current);
                    current = child;
                }
                _ => return current,
            }
        }
    }
}

/// Paths of every directory (root included) that lacks a `normal` child.
pub fn find_lacking_normal<T: TokenTree>(tree: &T, normal: &str) -> Vec<String> {
    let mut missing = Vec::new();
    let mut stack = vec![(ROOT_NAME.to_string(), tree.root())];
    let mut visited = Vec::new();

    while let Some((path, dir)) = stack.pop() {
        if visited.contains(&dir) {
            continue;
        }
        visited.push(dir);

        if tree.child(dir, normal).is_none() {
            missing.push(path.clone());
        }
        let mut children = tree.subdirectories(dir);
        children.sort_by(|a, b| b.0.cmp(&a.0));
        for (name, child) in children {
            stack.push((format!("{} {}", path, name), child));
        }
    }

    missing
}
