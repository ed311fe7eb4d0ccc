use std::sync::Arc;

use indexmap::IndexMap;

use super::{Tree, trim_holes};

/// Highest index a path segment may address in a sequence. Larger numeric
/// segments (ids, phone numbers) are mapping keys.
pub const MAX_SEQUENCE_INDEX: usize = 1 << 16;

/// Sequence index addressed by a path segment, if the segment is digit-only
/// and within [`MAX_SEQUENCE_INDEX`].
pub fn index_segment(segment: &str) -> Option<usize> {
    if segment.is_empty() || !segment.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    segment
        .parse()
        .ok()
        .filter(|index| *index <= MAX_SEQUENCE_INDEX)
}

pub fn get_in<'a, L>(store: &'a Tree<L>, path: &str) -> Option<&'a Tree<L>> {
    path.split('.')
        .try_fold(store, |node, segment| node.child(segment))
}

pub fn get_leaf_in<'a, L>(store: &'a Tree<L>, path: &str) -> Option<&'a L> {
    get_in(store, path).and_then(Tree::as_leaf)
}

pub fn get_leaf_in_or<L: Clone>(store: &Tree<L>, path: &str, default: L) -> L {
    get_leaf_in(store, path).cloned().unwrap_or(default)
}

/// Returns a copy of `store` with `value` written at `path`.
///
/// Only the containers along `path` are copied; every other branch is shared
/// with `store`. Writing `None` (or an empty container) deletes the key and
/// then every ancestor that became empty, stopping below the root.
pub fn set_in<L>(path: &str, value: Option<Tree<L>>, store: &Tree<L>) -> Tree<L> {
    let segments = path.split('.').collect::<Vec<_>>();
    match segments.split_first() {
        Some((key, rest)) => set_path(key, rest, value.map(Arc::new), Some(store)),
        None => set_path(path, &[], value.map(Arc::new), Some(store)),
    }
}

pub fn set_leaf_in<L>(path: &str, value: Option<L>, store: &Tree<L>) -> Tree<L> {
    set_in(path, value.map(Tree::Leaf), store)
}

fn set_path<L>(
    key: &str,
    rest: &[&str],
    value: Option<Arc<Tree<L>>>,
    node: Option<&Tree<L>>,
) -> Tree<L> {
    let child = match rest.split_first() {
        None => value,
        Some((next, rest)) => {
            let current = node.and_then(|node| node.child(key));
            Some(Arc::new(set_path(next, rest, value, current)))
        }
    };
    let child = child.filter(|child| !child.is_empty_container());

    let mut container = shallow_container(key, node);
    put_child(&mut container, key, child);
    container
}

/// Copies the container that will hold `key`, picking its kind from the key.
///
/// A mapping only becomes a sequence when every key it holds is an index.
fn shallow_container<L>(key: &str, node: Option<&Tree<L>>) -> Tree<L> {
    let wants_seq = index_segment(key).is_some();
    match node {
        Some(Tree::Seq(items)) if wants_seq => Tree::Seq(items.clone()),
        Some(Tree::Map(entries))
            if !wants_seq || entries.keys().any(|entry| index_segment(entry).is_none()) =>
        {
            Tree::Map(entries.clone())
        }
        Some(Tree::Map(entries)) => {
            let mut items = Vec::new();
            for (entry_key, child) in entries {
                let index = index_segment(entry_key);
                if let Some(slot) = index.and_then(|index| slot_mut(&mut items, index)) {
                    *slot = Some(child.clone());
                }
            }
            Tree::Seq(items)
        }
        Some(Tree::Seq(items)) => Tree::Map(
            items
                .iter()
                .enumerate()
                .filter_map(|(index, item)| item.clone().map(|child| (index.to_string(), child)))
                .collect(),
        ),
        _ if wants_seq => Tree::Seq(Vec::new()),
        _ => Tree::Map(IndexMap::new()),
    }
}

fn put_child<L>(container: &mut Tree<L>, key: &str, child: Option<Arc<Tree<L>>>) {
    match container {
        Tree::Map(entries) => match child {
            Some(child) => {
                entries.insert(key.to_owned(), child);
            }
            None => {
                entries.shift_remove(key);
            }
        },
        Tree::Seq(items) => {
            let Some(index) = index_segment(key) else {
                return;
            };
            match child {
                Some(child) => {
                    if let Some(slot) = slot_mut(items, index) {
                        *slot = Some(child);
                    }
                }
                None => {
                    if let Some(slot) = items.get_mut(index) {
                        *slot = None;
                    }
                    trim_holes(items);
                }
            }
        }
        Tree::Leaf(_) => {}
    }
}

/// Grows `items` with holes until `index` exists.
fn slot_mut<T>(items: &mut Vec<Option<T>>, index: usize) -> Option<&mut Option<T>> {
    let len = index.checked_add(1)?;
    if items.len() < len {
        items.resize_with(len, || None);
    }
    items.get_mut(index)
}
