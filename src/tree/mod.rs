//! Schema-less nested store addressed by dotted paths.

mod json;
mod keys;
mod path;

use std::fmt::{Display, Formatter};
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub use keys::error_keys;
pub use path::{get_in, get_leaf_in, get_leaf_in_or, index_segment, set_in, set_leaf_in};

/// A node of a path-addressed store.
///
/// Children are reference counted so that [`set_in`] can hand back a new tree
/// that shares every untouched branch with its input.
#[derive(Clone, Debug, PartialEq)]
pub enum Tree<L> {
    Map(IndexMap<String, Arc<Tree<L>>>),
    /// `None` slots are holes: never written, or deleted.
    Seq(Vec<Option<Arc<Tree<L>>>>),
    Leaf(L),
}

impl<L> Tree<L> {
    pub fn empty() -> Self {
        Self::Map(IndexMap::new())
    }

    pub fn leaf(value: L) -> Self {
        Self::Leaf(value)
    }

    pub fn is_container(&self) -> bool {
        !matches!(self, Self::Leaf(_))
    }

    /// True for a container without entries. Holes are not entries.
    pub fn is_empty_container(&self) -> bool {
        match self {
            Self::Map(entries) => entries.is_empty(),
            Self::Seq(items) => items.iter().all(Option::is_none),
            Self::Leaf(_) => false,
        }
    }

    pub fn as_leaf(&self) -> Option<&L> {
        match self {
            Self::Leaf(value) => Some(value),
            _ => None,
        }
    }

    pub fn child(&self, key: &str) -> Option<&Tree<L>> {
        match self {
            Self::Map(entries) => entries.get(key).map(Arc::as_ref),
            Self::Seq(items) => index_segment(key)
                .and_then(|index| items.get(index))
                .and_then(Option::as_deref),
            Self::Leaf(_) => None,
        }
    }

    /// Number of entries; holes excluded, zero for leaves.
    pub fn len(&self) -> usize {
        match self {
            Self::Map(entries) => entries.len(),
            Self::Seq(items) => items.iter().flatten().count(),
            Self::Leaf(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rebuilds the tree keeping only the leaves `f` maps to `Some`.
    ///
    /// Containers left without entries are dropped, except the root which
    /// comes back as an empty container of its own kind.
    pub fn filter_map_leaves<M>(&self, f: &impl Fn(&L) -> Option<M>) -> Tree<M> {
        match self {
            Self::Map(entries) => Tree::Map(
                entries
                    .iter()
                    .filter_map(|(key, child)| {
                        prune(child.filter_map_leaves(f)).map(|node| (key.clone(), Arc::new(node)))
                    })
                    .collect(),
            ),
            Self::Seq(items) => {
                let mut mapped = items
                    .iter()
                    .map(|item| {
                        item.as_deref()
                            .and_then(|child| prune(child.filter_map_leaves(f)))
                            .map(Arc::new)
                    })
                    .collect::<Vec<_>>();
                trim_holes(&mut mapped);
                Tree::Seq(mapped)
            }
            Self::Leaf(value) => match f(value) {
                Some(mapped) => Tree::Leaf(mapped),
                None => Tree::Map(IndexMap::new()),
            },
        }
    }
}

impl<L> Default for Tree<L> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<L> From<L> for Tree<L> {
    fn from(value: L) -> Self {
        Self::Leaf(value)
    }
}

impl<K, L> FromIterator<(K, Tree<L>)> for Tree<L>
where
    K: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, Tree<L>)>>(iter: I) -> Self {
        Self::Map(
            iter.into_iter()
                .map(|(key, node)| (key.into(), Arc::new(node)))
                .collect(),
        )
    }
}

fn prune<L>(node: Tree<L>) -> Option<Tree<L>> {
    (!node.is_empty_container()).then_some(node)
}

pub(crate) fn trim_holes<T>(items: &mut Vec<Option<T>>) {
    while items.last().is_some_and(Option::is_none) {
        items.pop();
    }
}

/// Leaf type of the `values` tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(number) => Some(*number),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(flag) => Some(*flag),
            _ => None,
        }
    }
}

impl Default for FieldValue {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl Display for FieldValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Number(number) => write!(f, "{number}"),
            Self::Bool(flag) => write!(f, "{flag}"),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// The `values` tree of a form.
pub type Values = Tree<FieldValue>;
