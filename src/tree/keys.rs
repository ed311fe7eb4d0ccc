use indexmap::IndexSet;

use super::Tree;

/// Flattens an error tree into the paths errors are addressed by.
///
/// A sequence of plain values is a single error unit addressed by the
/// sequence's own path (`tags`); sequences of containers are addressed per
/// element (`rows.0.name`). Paths come back deduplicated in first-seen order.
pub fn error_keys<L>(tree: &Tree<L>) -> Vec<String> {
    let mut keys = IndexSet::new();
    collect(tree, "", &mut keys);
    keys.into_iter().collect()
}

fn collect<L>(node: &Tree<L>, prefix: &str, keys: &mut IndexSet<String>) {
    match node {
        Tree::Map(entries) => {
            for (key, child) in entries {
                let path = join(prefix, key);
                if child.is_container() {
                    collect(child, &path, keys);
                } else {
                    keys.insert(path);
                }
            }
        }
        Tree::Seq(items) => {
            for (index, child) in items.iter().enumerate() {
                let Some(child) = child else {
                    continue;
                };
                if child.is_container() {
                    collect(child, &join(prefix, &index.to_string()), keys);
                } else if !prefix.is_empty() {
                    keys.insert(prefix.to_owned());
                }
            }
        }
        Tree::Leaf(_) => {
            if !prefix.is_empty() {
                keys.insert(prefix.to_owned());
            }
        }
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_owned()
    } else {
        format!("{prefix}.{key}")
    }
}
