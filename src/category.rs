//! Category hierarchy resolution
//!
//! Categories of one import run live in an arena ([`CategoryTree`]). Nodes
//! refer to their parent and children by [`CategoryId`], so a node chain can
//! be walked both ways without owning cycles. A node is identified by its
//! parent plus its case-normalised label; interning the same pair twice
//! returns the same id.

use crate::catalog::builtin::{CATEGORY_LEVEL_FIELDS, CATEGORY_PATH_FIELD};
use crate::mapping::FieldMapping;
use crate::source::SourceRow;
use log::debug;
use std::collections::{BTreeSet, HashMap};

/// Index of a node inside its [`CategoryTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CategoryId(usize);

impl CategoryId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// What is known about a node on the remote system
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RemoteStatus {
    /// Not looked up yet
    #[default]
    Unresolved,
    /// Exists remotely under this name (found or created)
    Present(String),
    /// Creation failed; dependent records must fail
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct CategoryNode {
    pub label: String,
    pub normalized: String,
    pub parent: Option<CategoryId>,
    pub children: BTreeSet<CategoryId>,
    pub remote: RemoteStatus,
}

/// Arena of category nodes for one import run
#[derive(Debug, Clone, Default)]
pub struct CategoryTree {
    nodes: Vec<CategoryNode>,
    index: HashMap<(Option<CategoryId>, String), CategoryId>,
}

impl CategoryTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of the child `label` under `parent`, creating it if needed
    pub fn intern(&mut self, parent: Option<CategoryId>, label: &str) -> CategoryId {
        let normalized = normalize_label(label);
        if let Some(&id) = self.index.get(&(parent, normalized.clone())) {
            return id;
        }

        let id = CategoryId(self.nodes.len());
        self.nodes.push(CategoryNode {
            label: label.trim().to_string(),
            normalized: normalized.clone(),
            parent,
            children: BTreeSet::new(),
            remote: RemoteStatus::Unresolved,
        });
        if let Some(parent) = parent {
            self.nodes[parent.0].children.insert(id);
        }
        self.index.insert((parent, normalized), id);
        id
    }

    pub fn node(&self, id: CategoryId) -> &CategoryNode {
        &self.nodes[id.0]
    }

    pub fn parent(&self, id: CategoryId) -> Option<CategoryId> {
        self.nodes[id.0].parent
    }

    /// Root-to-node chain ending at `id`
    pub fn path(&self, id: CategoryId) -> Vec<CategoryId> {
        let mut chain = vec![id];
        let mut current = id;
        while let Some(parent) = self.nodes[current.0].parent {
            chain.push(parent);
            current = parent;
        }
        chain.reverse();
        chain
    }

    /// Labels of a chain, root first
    pub fn labels(&self, chain: &[CategoryId]) -> Vec<&str> {
        chain.iter().map(|id| self.nodes[id.0].label.as_str()).collect()
    }

    pub fn remote(&self, id: CategoryId) -> &RemoteStatus {
        &self.nodes[id.0].remote
    }

    pub fn set_remote(&mut self, id: CategoryId, status: RemoteStatus) {
        self.nodes[id.0].remote = status;
    }

    /// Mark `id` and every node below it as failed
    pub fn fail_subtree(&mut self, id: CategoryId, reason: &str) {
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = &mut self.nodes[current.0];
            node.remote = RemoteStatus::Failed(reason.to_string());
            stack.extend(node.children.iter().copied());
        }
    }

    /// Label and failure reason of the first failed node in a chain
    pub fn first_failure<'a>(&'a self, chain: &[CategoryId]) -> Option<(&'a str, &'a str)> {
        chain.iter().find_map(|id| match &self.nodes[id.0].remote {
            RemoteStatus::Failed(reason) => Some((self.nodes[id.0].label.as_str(), reason.as_str())),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Case-normalised label used for deduplication
pub fn normalize_label(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Raw category values of one record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryInput {
    pub levels: [Option<String>; 4],
    pub path: Option<String>,
}

impl CategoryInput {
    /// Read the category slots of a row through its mapping
    pub fn from_row(row: &SourceRow, mapping: &FieldMapping) -> Self {
        let value = |field: &str| {
            mapping
                .source_for(field)
                .and_then(|column| row.get(column))
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        Self {
            levels: CATEGORY_LEVEL_FIELDS.map(value),
            path: value(CATEGORY_PATH_FIELD),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_none() && self.levels.iter().all(Option::is_none)
    }
}

/// Builds deduplicated category chains for the records of one run
#[derive(Debug, Clone)]
pub struct CategoryResolver {
    delimiter: String,
    tree: CategoryTree,
}

impl Default for CategoryResolver {
    fn default() -> Self {
        Self::new(">")
    }
}

impl CategoryResolver {
    pub fn new(delimiter: impl Into<String>) -> Self {
        let delimiter = delimiter.into();
        Self {
            delimiter: if delimiter.is_empty() { ">".to_string() } else { delimiter },
            tree: CategoryTree::new(),
        }
    }

    /// Labels of the category path, root first.
    ///
    /// A path string wins over level columns. Path segments are trimmed and
    /// empty segments dropped; level columns stop at the first empty level.
    pub fn labels(&self, input: &CategoryInput) -> Vec<String> {
        if let Some(path) = &input.path {
            return path
                .split(self.delimiter.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }

        input
            .levels
            .iter()
            .map_while(|level| level.as_deref().map(str::trim).filter(|l| !l.is_empty()))
            .map(str::to_string)
            .collect()
    }

    /// Root-to-leaf node chain for a record; empty when it has no category
    pub fn resolve(&mut self, input: &CategoryInput) -> Vec<CategoryId> {
        let labels = self.labels(input);
        let mut chain = Vec::with_capacity(labels.len());
        let mut parent = None;
        for label in &labels {
            let id = self.tree.intern(parent, label);
            chain.push(id);
            parent = Some(id);
        }
        if !chain.is_empty() {
            debug!("Resolved category path {}", labels.join(" > "));
        }
        chain
    }

    pub fn tree(&self) -> &CategoryTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut CategoryTree {
        &mut self.tree
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn levels(values: &[&str]) -> CategoryInput {
        let mut input = CategoryInput::default();
        for (slot, value) in input.levels.iter_mut().zip(values) {
            *slot = Some(value.to_string());
        }
        input
    }

    fn path(value: &str) -> CategoryInput {
        CategoryInput {
            path: Some(value.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_levels_and_path_give_same_chain() {
        let mut resolver = CategoryResolver::default();
        let from_levels = resolver.resolve(&levels(&["Regale", "Steckregale", "Verzinkt"]));
        let from_path = resolver.resolve(&path("Regale > Steckregale > Verzinkt"));

        assert_eq!(from_levels, from_path);
        assert_eq!(resolver.tree().len(), 3);

        let mut other = CategoryResolver::default();
        let chain = other.resolve(&path(" Regale>Steckregale >Verzinkt "));
        assert_eq!(
            other.tree().labels(&chain),
            resolver.tree().labels(&from_levels)
        );
    }

    #[test]
    fn test_dedup_is_case_insensitive_within_parent() {
        let mut resolver = CategoryResolver::default();
        let a = resolver.resolve(&path("Regale > Zubehör"));
        let b = resolver.resolve(&path("REGALE > zubehör"));
        let c = resolver.resolve(&path("Schränke > Zubehör"));

        assert_eq!(a, b);
        assert_ne!(a[1], c[1]);
        assert_eq!(resolver.tree().len(), 4);
        assert_eq!(resolver.tree().node(a[0]).children.len(), 1);
    }

    #[test]
    fn test_path_wins_over_levels() {
        let resolver = CategoryResolver::default();
        let input = CategoryInput {
            levels: [Some("X".into()), None, None, None],
            path: Some("A > B".into()),
        };
        assert_eq!(resolver.labels(&input), vec!["A", "B"]);
    }

    #[test]
    fn test_levels_stop_at_first_empty() {
        let resolver = CategoryResolver::default();
        let input = CategoryInput {
            levels: [Some("A".into()), Some("B".into()), None, Some("D".into())],
            path: None,
        };
        assert_eq!(resolver.labels(&input), vec!["A", "B"]);
    }

    #[test]
    fn test_custom_delimiter_and_empty_segments() {
        let resolver = CategoryResolver::new("/");
        assert_eq!(resolver.labels(&path("A / / B/")), vec!["A", "B"]);
        assert!(resolver.labels(&CategoryInput::default()).is_empty());
    }

    #[test]
    fn test_path_and_parent_links() {
        let mut resolver = CategoryResolver::default();
        let chain = resolver.resolve(&path("A > B > C"));
        let tree = resolver.tree();

        assert_eq!(tree.path(chain[2]), chain);
        assert_eq!(tree.parent(chain[0]), None);
        assert_eq!(tree.parent(chain[2]), Some(chain[1]));
    }

    #[test]
    fn test_fail_subtree() {
        let mut resolver = CategoryResolver::default();
        let chain = resolver.resolve(&path("A > B > C"));
        let sibling = resolver.resolve(&path("A > D"));
        resolver.tree_mut().fail_subtree(chain[1], "denied");

        let tree = resolver.tree();
        assert_eq!(tree.remote(chain[0]), &RemoteStatus::Unresolved);
        assert_eq!(tree.remote(chain[2]), &RemoteStatus::Failed("denied".into()));
        assert_eq!(tree.first_failure(&chain), Some(("B", "denied")));
        assert_eq!(tree.first_failure(&sibling), None);
    }

    #[test]
    fn test_input_from_row() {
        let mapping: FieldMapping = [("Kat1", "category_level_1"), ("Kat2", "category_level_2")]
            .into_iter()
            .collect();
        let row = SourceRow::from_pairs(1, [("Kat1", " Regale "), ("Kat2", "")]);

        let input = CategoryInput::from_row(&row, &mapping);
        assert_eq!(input.levels[0].as_deref(), Some("Regale"));
        assert_eq!(input.levels[1], None);
        assert!(!input.is_empty());
    }
}
