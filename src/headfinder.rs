//! Head-finding strategies
//!
//! Head relations (`>>#`, `<<#`, `>#`, `<#`) are defined relative to a
//! pluggable strategy that picks, for each internal node, which child is its
//! head. The engine only consumes the trait; concrete grammars supply their
//! own strategies.

use std::sync::Arc;

use crate::tree::{NodeId, Tree};

/// Strategy selecting the head child of an internal node.
///
/// `determine_head` must be deterministic for a given tree, return one of
/// the node's own children, and return `None` only for leaves.
pub trait HeadFinder: Send + Sync {
    fn determine_head(&self, tree: &Tree, node: NodeId) -> Option<NodeId>;
}

/// Shared handle to a head-finding strategy.
///
/// Head relations are interned per strategy instance: two handles pointing
/// at the same allocation yield the same canonical relation.
pub type HeadFinderRef = Arc<dyn HeadFinder>;

/// Head finder that always picks the leftmost child
#[derive(Debug, Clone, Copy, Default)]
pub struct LeftHeadFinder;

impl HeadFinder for LeftHeadFinder {
    fn determine_head(&self, tree: &Tree, node: NodeId) -> Option<NodeId> {
        tree.first_child(node)
    }
}

/// Projection from a fine-grained category label to its coarse form,
/// used by `@`-prefixed category patterns
pub type BasicCat = for<'a> fn(&'a str) -> &'a str;

/// Basic-category projection for Penn-treebank-style labels: everything up
/// to the first `-`, `=`, or `|`. Labels that themselves start with `-`
/// (`-LRB-`, `-NONE-`) are returned whole.
pub fn penn_basic_category(label: &str) -> &str {
    if label.starts_with('-') {
        return label;
    }
    match label.find(['-', '=', '|']) {
        Some(i) => &label[..i],
        None => label,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_left_head_finder() {
        let mut tree = Tree::new();
        let vp = tree.add_node("VP");
        let vbd = tree.add_node("VBD");
        let ran = tree.add_node("ran");
        tree.add_child(vp, vbd);
        tree.add_child(vbd, ran);

        let hf = LeftHeadFinder;
        assert_eq!(hf.determine_head(&tree, vp), Some(vbd));
        assert_eq!(hf.determine_head(&tree, vbd), Some(ran));
        assert_eq!(hf.determine_head(&tree, ran), None);
    }

    #[test]
    fn test_penn_basic_category() {
        assert_eq!(penn_basic_category("NP-SBJ"), "NP");
        assert_eq!(penn_basic_category("NP-SBJ-1"), "NP");
        assert_eq!(penn_basic_category("NP=2"), "NP");
        assert_eq!(penn_basic_category("S|VP"), "S");
        assert_eq!(penn_basic_category("VP"), "VP");
        assert_eq!(penn_basic_category("-LRB-"), "-LRB-");
    }
}
