//! Sprite library: the parsed tree of named sprite sources
//!
//! A raw library is a nested JSON object. String leaves are compressed
//! sprites, array leaves are commands (`same`, `filter`, `multiple`) and
//! object leaves are directories. Parsing stores every source in an arena
//! of slots; directories hold handles into the arena.
//!
//! Resolving a `same` or `filter` command overwrites the command's slot
//! with a redirect to its target. Every directory entry holding that
//! handle sees the resolved target from then on.

use log::debug;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::RenderError;
use crate::filter::FilterRegistry;
use crate::lookup::{TokenTree, ROOT_NAME};
use crate::models::{Command, SpriteAttributes};
use crate::sprite::Sprite;

/// Handle to a sprite source slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Handle to a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DirId(usize);

/// A directory entry: either a sprite source or a nested directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entry {
    Node(NodeId),
    Directory(DirId),
}

/// Where a node's pixels come from.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    /// A compressed sprite string
    Literal(String),
    /// A command still to be resolved, or a `multiple` composite
    Command(Command),
}

/// Cache key for a generated sprite: the request key plus its attributes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SpriteKey {
    pub key: String,
    pub attributes: SpriteAttributes,
}

/// A sprite source and the sprites already generated from it.
#[derive(Debug, Clone)]
pub struct SourceNode {
    pub source: Source,
    /// Filters applied in order before converting to pixels
    pub filters: Vec<String>,
    /// Library path the node was created at
    pub path: Vec<String>,
    sprites: HashMap<SpriteKey, Rc<Sprite>>,
}

impl SourceNode {
    fn new(source: Source, filters: Vec<String>, path: Vec<String>) -> Self {
        Self { source, filters, path, sprites: HashMap::new() }
    }

    /// Whether this node is a `same`/`filter` command not yet resolved.
    pub fn is_pending(&self) -> bool {
        matches!(
            self.source,
            Source::Command(Command::Same(_)) | Source::Command(Command::Filter { .. })
        )
    }

    pub fn sprite(&self, key: &SpriteKey) -> Option<Rc<Sprite>> {
        self.sprites.get(key).cloned()
    }

    pub fn insert_sprite(&mut self, key: SpriteKey, sprite: Rc<Sprite>) {
        self.sprites.insert(key, sprite);
    }

    pub fn sprite_count(&self) -> usize {
        self.sprites.len()
    }

    pub fn clear_sprites(&mut self) {
        self.sprites.clear();
    }

    fn display_path(&self) -> String {
        if self.path.is_empty() {
            ROOT_NAME.to_string()
        } else {
            self.path.join(" ")
        }
    }
}

#[derive(Debug, Clone)]
enum Slot {
    Node(SourceNode),
    Redirect(Entry),
}

#[derive(Debug, Clone, Default)]
struct Directory {
    entries: HashMap<String, Entry>,
}

/// The raw library and its parsed arena.
#[derive(Debug, Clone)]
pub struct SourceTree {
    raw: Value,
    slots: Vec<Slot>,
    dirs: Vec<Directory>,
}

impl SourceTree {
    /// Parse a raw library object.
    pub fn parse(raw: Value) -> Result<Self, RenderError> {
        let mut tree = Self { raw: Value::Null, slots: Vec::new(), dirs: Vec::new() };
        let Value::Object(map) = &raw else {
            return Err(RenderError::invalid_entry(&[], "library must be an object"));
        };
        tree.parse_directory(map, &mut Vec::new())?;
        tree.raw = raw;
        debug!("parsed sprite library: {} sources, {} directories", tree.slots.len(), tree.dirs.len());
        Ok(tree)
    }

    fn parse_directory(
        &mut self,
        map: &Map<String, Value>,
        path: &mut Vec<String>,
    ) -> Result<DirId, RenderError> {
        let id = DirId(self.dirs.len());
        self.dirs.push(Directory::default());

        for (name, value) in map {
            path.push(name.clone());
            let entry = match value {
                Value::String(source) => {
                    self.push_node(SourceNode::new(Source::Literal(source.clone()), Vec::new(), path.clone()))
                }
                Value::Array(items) => {
                    let command = Command::from_value(path, items)?;
                    self.push_node(SourceNode::new(Source::Command(command), Vec::new(), path.clone()))
                }
                Value::Object(children) => Entry::Directory(self.parse_directory(children, path)?),
                _ => {
                    return Err(RenderError::invalid_entry(
                        path,
                        "expected a string, command array or object",
                    ))
                }
            };
            path.pop();
            self.dirs[id.0].entries.insert(name.clone(), entry);
        }

        Ok(id)
    }

    fn push_node(&mut self, node: SourceNode) -> Entry {
        self.slots.push(Slot::Node(node));
        Entry::Node(NodeId(self.slots.len() - 1))
    }

    /// The raw library this tree was parsed from.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn root_dir(&self) -> DirId {
        DirId(0)
    }

    /// Follow redirects until reaching a node or directory.
    pub fn resolve_entry(&self, mut entry: Entry) -> Entry {
        while let Entry::Node(id) = entry {
            match &self.slots[id.0] {
                Slot::Redirect(target) => entry = *target,
                Slot::Node(_) => break,
            }
        }
        entry
    }

    /// The node in a slot, or `None` if the slot was redirected.
    pub fn node(&self, id: NodeId) -> Option<&SourceNode> {
        match &self.slots[id.0] {
            Slot::Node(node) => Some(node),
            Slot::Redirect(_) => None,
        }
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut SourceNode> {
        match &mut self.slots[id.0] {
            Slot::Node(node) => Some(node),
            Slot::Redirect(_) => None,
        }
    }

    /// Read-only walk of `path` from the root, following resolved redirects.
    pub fn entry_at(&self, path: &[&str]) -> Option<Entry> {
        let mut current = Entry::Directory(self.root_dir());
        for segment in path {
            let Entry::Directory(dir) = self.resolve_entry(current) else {
                return None;
            };
            current = *self.dirs[dir.0].entries.get(*segment)?;
        }
        Some(self.resolve_entry(current))
    }

    /// Total generated sprites cached across all nodes.
    pub fn sprite_count(&self) -> usize {
        self.slots
            .iter()
            .map(|slot| match slot {
                Slot::Node(node) => node.sprite_count(),
                Slot::Redirect(_) => 0,
            })
            .sum()
    }

    /// Clear every node's generated-sprite cache.
    pub fn clear_sprites(&mut self) {
        for slot in &mut self.slots {
            if let Slot::Node(node) = slot {
                node.clear_sprites();
            }
        }
    }

    /// Resolve a pending `same`/`filter` node.
    ///
    /// Returns the entry the node now stands for. Nodes that are not
    /// pending resolve to themselves.
    pub fn resolve(&mut self, id: NodeId, filters: &FilterRegistry) -> Result<Entry, RenderError> {
        let mut chain = Vec::new();
        self.resolve_node(id, filters, &mut chain)
    }

    fn resolve_node(
        &mut self,
        id: NodeId,
        filters: &FilterRegistry,
        chain: &mut Vec<NodeId>,
    ) -> Result<Entry, RenderError> {
        let command = match &self.slots[id.0] {
            Slot::Redirect(target) => return Ok(self.resolve_entry(*target)),
            Slot::Node(node) => match &node.source {
                Source::Command(command @ (Command::Same(_) | Command::Filter { .. })) => command.clone(),
                _ => return Ok(Entry::Node(id)),
            },
        };

        if let Some(start) = chain.iter().position(|seen| *seen == id) {
            let mut names: Vec<String> = chain[start..].iter().map(|n| self.node_name(*n)).collect();
            names.push(self.node_name(id));
            return Err(RenderError::CyclicAlias { chain: names });
        }
        chain.push(id);

        let replacement = match &command {
            Command::Same(path) => self.follow_path(path, filters, chain)?,
            Command::Filter { path, filter } => {
                filters.get(filter)?;
                let target = self.follow_path(path, filters, chain)?;
                let at = self.node(id).map(|n| n.path.clone()).unwrap_or_default();
                self.filter_entry(target, filter, &at, filters, chain, &mut Vec::new())?
            }
            Command::Multiple { .. } => Entry::Node(id),
        };

        debug!("resolved '{}' to {:?}", self.node_name(id), replacement);
        chain.pop();
        self.slots[id.0] = Slot::Redirect(replacement);
        Ok(replacement)
    }

    /// Walk `path` from the root, resolving pending nodes along the way.
    fn follow_path(
        &mut self,
        path: &[String],
        filters: &FilterRegistry,
        chain: &mut Vec<NodeId>,
    ) -> Result<Entry, RenderError> {
        let mut current = Entry::Directory(self.root_dir());
        for segment in path {
            let Entry::Directory(dir) = self.settle(current, filters, chain)? else {
                return Err(RenderError::UnknownKey(path.join(" ")));
            };
            current = *self.dirs[dir.0]
                .entries
                .get(segment)
                .ok_or_else(|| RenderError::UnknownKey(path.join(" ")))?;
        }
        self.settle(current, filters, chain)
    }

    /// Resolve an entry fully: redirects followed, pending commands run.
    fn settle(
        &mut self,
        entry: Entry,
        filters: &FilterRegistry,
        chain: &mut Vec<NodeId>,
    ) -> Result<Entry, RenderError> {
        match self.resolve_entry(entry) {
            Entry::Node(id) => self.resolve_node(id, filters, chain),
            dir => Ok(dir),
        }
    }

    /// Build a filtered copy of a node, or of every node under a directory.
    fn filter_entry(
        &mut self,
        target: Entry,
        filter: &str,
        at: &[String],
        filters: &FilterRegistry,
        chain: &mut Vec<NodeId>,
        dirs_seen: &mut Vec<DirId>,
    ) -> Result<Entry, RenderError> {
        match target {
            Entry::Node(source_id) => {
                let Some(source) = self.node(source_id) else {
                    return Err(RenderError::UnknownKey(at.join(" ")));
                };
                let mut node_filters = source.filters.clone();
                node_filters.push(filter.to_string());
                let node = SourceNode::new(source.source.clone(), node_filters, at.to_vec());
                Ok(self.push_node(node))
            }
            Entry::Directory(dir) => {
                if dirs_seen.contains(&dir) {
                    return Err(RenderError::CyclicAlias {
                        chain: vec![at.join(" "), at.join(" ")],
                    });
                }
                dirs_seen.push(dir);

                let mut names: Vec<String> = self.dirs[dir.0].entries.keys().cloned().collect();
                names.sort();
                let mut filtered = Directory::default();
                for name in names {
                    let child = self.dirs[dir.0].entries[&name];
                    let child = self.settle(child, filters, chain)?;
                    let mut child_at = at.to_vec();
                    child_at.push(name.clone());
                    let entry = self.filter_entry(child, filter, &child_at, filters, chain, dirs_seen)?;
                    filtered.entries.insert(name, entry);
                }

                dirs_seen.pop();
                self.dirs.push(filtered);
                Ok(Entry::Directory(DirId(self.dirs.len() - 1)))
            }
        }
    }

    fn node_name(&self, id: NodeId) -> String {
        self.node(id).map(SourceNode::display_path).unwrap_or_else(|| format!("#{}", id.0))
    }
}

impl TokenTree for SourceTree {
    type Handle = Entry;

    fn root(&self) -> Entry {
        Entry::Directory(DirId(0))
    }

    fn is_directory(&self, handle: Entry) -> bool {
        matches!(self.resolve_entry(handle), Entry::Directory(_))
    }

    fn child(&self, parent: Entry, name: &str) -> Option<Entry> {
        match self.resolve_entry(parent) {
            Entry::Directory(dir) => {
                self.dirs[dir.0].entries.get(name).map(|entry| self.resolve_entry(*entry))
            }
            Entry::Node(_) => None,
        }
    }

    fn subdirectories(&self, parent: Entry) -> Vec<(String, Entry)> {
        match self.resolve_entry(parent) {
            Entry::Directory(dir) => self.dirs[dir.0]
                .entries
                .iter()
                .map(|(name, entry)| (name.clone(), self.resolve_entry(*entry)))
                .filter(|(_, entry)| matches!(entry, Entry::Directory(_)))
                .collect(),
            Entry::Node(_) => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;
    use serde_json::json;

    fn filters() -> FilterRegistry {
        let mut registry = FilterRegistry::new();
        registry.register(Filter::new("swap", HashMap::from([(0, 1), (1, 0)])));
        registry.register(Filter::new("dark", HashMap::from([(1, 2)])));
        registry
    }

    fn node_at(tree: &SourceTree, path: &[&str]) -> NodeId {
        match tree.entry_at(path) {
            Some(Entry::Node(id)) => id,
            other => panic!("Expected node at {:?}, got {:?}", path, other),
        }
    }

    #[test]
    fn test_parse_shapes() {
        let tree = SourceTree::parse(json!({
            "Box": "0101",
            "Player": {"normal": "11", "walking": ["same", ["Box"]]},
        }))
        .unwrap();

        let box_id = node_at(&tree, &["Box"]);
        assert_eq!(tree.node(box_id).unwrap().source, Source::Literal("0101".to_string()));
        assert!(matches!(tree.entry_at(&["Player"]), Some(Entry::Directory(_))));
        let walking = node_at(&tree, &["Player", "walking"]);
        assert!(tree.node(walking).unwrap().is_pending());
        assert_eq!(tree.node(walking).unwrap().path, vec!["Player", "walking"]);
    }

    #[test]
    fn test_parse_rejects_bad_leaf() {
        let err = SourceTree::parse(json!({"Box": 12})).unwrap_err();
        assert!(matches!(err, RenderError::InvalidEntry { ref path, .. } if path == "Box"));
        assert!(SourceTree::parse(json!(["not", "an", "object"])).is_err());
    }

    #[test]
    fn test_same_redirects_slot() {
        let mut tree = SourceTree::parse(json!({"Box": "0101", "Crate": ["same", ["Box"]]})).unwrap();
        let box_id = node_at(&tree, &["Box"]);
        let crate_id = node_at(&tree, &["Crate"]);

        let resolved = tree.resolve(crate_id, &filters()).unwrap();
        assert_eq!(resolved, Entry::Node(box_id));
        assert!(tree.node(crate_id).is_none());
        assert_eq!(tree.entry_at(&["Crate"]), Some(Entry::Node(box_id)));
    }

    #[test]
    fn test_same_chain_resolves_through_pending() {
        let mut tree = SourceTree::parse(json!({
            "A": ["same", ["B"]],
            "B": ["same", ["C"]],
            "C": "1",
        }))
        .unwrap();
        let a = node_at(&tree, &["A"]);
        let c = node_at(&tree, &["C"]);
        assert_eq!(tree.resolve(a, &filters()).unwrap(), Entry::Node(c));
        assert_eq!(tree.entry_at(&["B"]), Some(Entry::Node(c)));
    }

    #[test]
    fn test_same_to_directory() {
        let mut tree = SourceTree::parse(json!({
            "Player": {"normal": "0"},
            "Luigi": ["same", ["Player"]],
        }))
        .unwrap();
        let luigi = node_at(&tree, &["Luigi"]);
        let resolved = tree.resolve(luigi, &filters()).unwrap();
        assert!(matches!(resolved, Entry::Directory(_)));
        assert!(matches!(tree.entry_at(&["Luigi", "normal"]), Some(Entry::Node(_))));
    }

    #[test]
    fn test_cyclic_alias() {
        let mut tree = SourceTree::parse(json!({
            "A": ["same", ["B"]],
            "B": ["same", ["A"]],
        }))
        .unwrap();
        let a = node_at(&tree, &["A"]);
        let err = tree.resolve(a, &filters()).unwrap_err();
        assert_eq!(
            err,
            RenderError::CyclicAlias {
                chain: vec!["A".to_string(), "B".to_string(), "A".to_string()]
            }
        );
        // Nothing was rewritten
        assert!(tree.node(a).unwrap().is_pending());
    }

    #[test]
    fn test_self_alias_is_cyclic() {
        let mut tree = SourceTree::parse(json!({"A": ["same", ["A"]]})).unwrap();
        let a = node_at(&tree, &["A"]);
        assert!(matches!(tree.resolve(a, &filters()), Err(RenderError::CyclicAlias { .. })));
    }

    #[test]
    fn test_unknown_path() {
        let mut tree = SourceTree::parse(json!({"A": ["same", ["Nowhere", "x"]]})).unwrap();
        let a = node_at(&tree, &["A"]);
        assert_eq!(
            tree.resolve(a, &filters()).unwrap_err(),
            RenderError::UnknownKey("Nowhere x".to_string())
        );
    }

    #[test]
    fn test_filter_node_shares_source() {
        let mut tree = SourceTree::parse(json!({
            "Goomba": "0011",
            "DarkGoomba": ["filter", ["Goomba"], "dark"],
        }))
        .unwrap();
        let dark = node_at(&tree, &["DarkGoomba"]);
        let Entry::Node(filtered) = tree.resolve(dark, &filters()).unwrap() else {
            panic!("Expected node");
        };
        let node = tree.node(filtered).unwrap();
        assert_eq!(node.source, Source::Literal("0011".to_string()));
        assert_eq!(node.filters, vec!["dark"]);

        let goomba = node_at(&tree, &["Goomba"]);
        assert!(tree.node(goomba).unwrap().filters.is_empty());
    }

    #[test]
    fn test_filter_directory_recurses() {
        let mut tree = SourceTree::parse(json!({
            "Koopa": {"normal": "01", "shell": {"normal": "10"}},
            "Red": ["filter", ["Koopa"], "swap"],
        }))
        .unwrap();
        let red = node_at(&tree, &["Red"]);
        tree.resolve(red, &filters()).unwrap();

        let shell = node_at(&tree, &["Red", "shell", "normal"]);
        let node = tree.node(shell).unwrap();
        assert_eq!(node.filters, vec!["swap"]);
        assert_eq!(node.path, vec!["Red", "shell", "normal"]);
    }

    #[test]
    fn test_filter_of_filter_composes() {
        let mut tree = SourceTree::parse(json!({
            "Base": "01",
            "Once": ["filter", ["Base"], "swap"],
            "Twice": ["filter", ["Once"], "dark"],
        }))
        .unwrap();
        let twice = node_at(&tree, &["Twice"]);
        let Entry::Node(id) = tree.resolve(twice, &filters()).unwrap() else {
            panic!("Expected node");
        };
        assert_eq!(tree.node(id).unwrap().filters, vec!["swap", "dark"]);
    }

    #[test]
    fn test_filter_unknown_name() {
        let mut tree =
            SourceTree::parse(json!({"A": "0", "B": ["filter", ["A"], "sepia"]})).unwrap();
        let b = node_at(&tree, &["B"]);
        assert_eq!(
            tree.resolve(b, &filters()).unwrap_err(),
            RenderError::UnknownFilter("sepia".to_string())
        );
    }

    #[test]
    fn test_token_tree_follows_redirects() {
        let mut tree = SourceTree::parse(json!({
            "Player": {"normal": "0"},
            "Luigi": ["same", ["Player"]],
        }))
        .unwrap();
        let root = TokenTree::root(&tree);
        let luigi = tree.child(root, "Luigi").unwrap();
        assert!(!tree.is_directory(luigi));

        let Entry::Node(id) = luigi else { panic!("Expected node") };
        tree.resolve(id, &filters()).unwrap();
        let luigi = tree.child(root, "Luigi").unwrap();
        assert!(tree.is_directory(luigi));
        assert_eq!(tree.subdirectories(root).len(), 2);
    }
}
