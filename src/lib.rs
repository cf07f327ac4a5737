//! Treematch: pattern matching over constituency parse trees
//!
//! A relation algebra for querying phrase-structure trees: ~30 structural
//! relations (dominance, precedence, sisterhood, headship, ...) that each
//! support a boolean test and a lazy candidate search, driven by a
//! backtracking matcher with backreference support.

pub mod headfinder; // Pluggable head-finding strategies
pub mod matcher; // Root context and backtracking driver
pub mod reader; // Penn-bracket treebank parsing
pub mod registry; // Relation interning and factory functions
pub mod relation; // The relation algebra itself
pub mod tree; // Arena tree data structures
pub mod variables; // Backreference variable bindings

// Re-exports for convenience
pub use headfinder::{BasicCat, HeadFinder, HeadFinderRef, LeftHeadFinder, penn_basic_category};
pub use matcher::{
    Constraint, Match, MatchContext, PatternError, PatternMatcher, PatternNode, Pred, TreePattern,
    matches, search_all,
};
pub use reader::{ParseError, TreeReader, read_tree};
pub use registry::{RelationError, get_relation, get_relation_with_arg};
pub use relation::{CategoryPattern, NodeSearch, Relation, RelationRef};
pub use tree::{Node, NodeId, Tree};
pub use variables::{BackreferenceConflict, VariableStrings};
