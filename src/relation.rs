//! Relations between tree nodes
//!
//! A `Relation` is an immutable value identified by its textual operator
//! (`<<`, `$+`, `<+(NP)`, ...) plus any arguments. Every relation supports
//! two operations that must agree: a boolean `satisfies` test on an ordered
//! node pair, and `search_candidates`, which lazily enumerates exactly the
//! nodes standing in the relation with a seed node.
//!
//! Searches are explicit state machines (`NodeSearch`) rather than closures,
//! so a backtracking driver can hold many paused searches at once. All the
//! transitive `satisfies` tests are iterative; none recurse.

use std::fmt;
use std::mem;
use std::sync::Arc;

use regex::Regex;
use rustc_hash::FxHashSet;

use crate::headfinder::{BasicCat, HeadFinderRef};
use crate::matcher::MatchContext;
use crate::registry::RelationError;
use crate::tree::{NodeId, Tree};

/// Shared handle to an interned relation.
///
/// The registry guarantees one instance per distinct signature, so pointer
/// equality (`Arc::ptr_eq`) is a valid fast path for logical equality.
pub type RelationRef = Arc<Relation>;

/// A compiled category pattern, the argument of the unbroken-category
/// relations: optionally negated (`!`), optionally projected through a
/// basic-category function (`@`), then a regex, the wildcard `__`, or a
/// bare identifier/alternation matched against the whole label.
#[derive(Clone)]
pub struct CategoryPattern {
    raw: String,
    regex: Regex,
    negated: bool,
    project: Option<BasicCat>,
}

impl CategoryPattern {
    pub fn parse(arg: &str, basic_cat: Option<BasicCat>) -> Result<Self, RelationError> {
        let mut rest = arg;
        let negated = rest.starts_with('!');
        if negated {
            rest = &rest[1..];
        }
        let project = if rest.starts_with('@') {
            rest = &rest[1..];
            match basic_cat {
                Some(f) => Some(f),
                None => {
                    return Err(RelationError::InvalidArgument(format!(
                        "category pattern \"{arg}\" uses '@' but no basic-category function was supplied"
                    )));
                }
            }
        } else {
            None
        };
        let source = if rest.len() >= 2 && rest.starts_with('/') && rest.ends_with('/') {
            rest[1..rest.len() - 1].to_string()
        } else if rest == "__" {
            "^.*$".to_string()
        } else {
            format!("^(?:{rest})$")
        };
        let regex = Regex::new(&source)
            .map_err(|e| RelationError::InvalidArgument(format!("category pattern \"{arg}\": {e}")))?;
        Ok(Self {
            raw: arg.to_string(),
            regex,
            negated,
            project,
        })
    }

    /// The argument text as written, used in the relation's symbol
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Whether a search path may continue through a node with this label
    pub fn admits(&self, label: &str) -> bool {
        let label = match self.project {
            Some(f) => f(label),
            None => label,
        };
        self.regex.is_match(label) != self.negated
    }
}

impl fmt::Debug for CategoryPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CategoryPattern").field(&self.raw).finish()
    }
}

// Compare the written argument, not the compiled automaton
impl PartialEq for CategoryPattern {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for CategoryPattern {}

/// A relation between an ordered pair of nodes in one tree.
///
/// Obtain instances through the registry (`get_relation`,
/// `get_relation_with_arg`) so that equal signatures share one allocation.
#[derive(Clone)]
pub enum Relation {
    /// `<<`: t1 properly dominates t2
    Dominates,
    /// `>>`: t1 is properly dominated by t2
    DominatedBy,
    /// `<`: t1 is the parent of t2
    ParentOf,
    /// `>`: t1 is a child of t2
    ChildOf,
    /// `..`: t1's yield ends no later than t2's begins
    Precedes,
    /// `.`: t1's yield ends exactly where t2's begins
    ImmediatelyPrecedes,
    /// `,,`: t1 follows t2
    Follows,
    /// `,`: t1 immediately follows t2
    ImmediatelyFollows,
    /// `<<,`: t2 is reached from t1 by first children only
    HasLeftmostDescendant,
    /// `<<-`: t2 is reached from t1 by last children only
    HasRightmostDescendant,
    /// `>>,`: t1 is the leftmost descendant of t2
    LeftmostDescendantOf,
    /// `>>-`: t1 is the rightmost descendant of t2
    RightmostDescendantOf,
    /// `$`: t1 and t2 share a parent and differ
    SisterOf,
    /// `$++`: t1 is a sister somewhere left of t2
    LeftSisterOf,
    /// `$--`: t1 is a sister somewhere right of t2
    RightSisterOf,
    /// `$+`: t1 is the sister immediately left of t2
    ImmediateLeftSisterOf,
    /// `$-`: t1 is the sister immediately right of t2
    ImmediateRightSisterOf,
    /// `>:`: t1 is the only child of t2
    OnlyChildOf,
    /// `<:`: t2 is the only child of t1
    HasOnlyChild,
    /// `==`: t1 and t2 are the same node
    Equals,
    /// `:`: no constraint; segments independent sub-patterns
    PatternSplitter,
    /// `<<:`: a chain of only-children leads from t1 down to t2
    UnaryPathAncestorOf,
    /// `>>:`: a chain of only-children leads from t2 down to t1
    UnaryPathDescendantOf,
    /// `>>#`: t1 heads t2 through a chain of head choices
    Heads(HeadFinderRef),
    /// `<<#`: t2 heads t1
    HeadedBy(HeadFinderRef),
    /// `>#`: t1 is the immediate head child of t2
    ImmediatelyHeads(HeadFinderRef),
    /// `<#`: t2 is the immediate head child of t1
    ImmediatelyHeadedBy(HeadFinderRef),
    /// `<N`: t2 is the Nth child of t1 (negative N counts from the end)
    HasIthChild(i32),
    /// `>N`: t1 is the Nth child of t2
    IthChildOf(i32),
    /// `<+(pat)`: t1 dominates t2 through intermediate nodes matching pat
    UnbrokenCategoryDominates(CategoryPattern),
    /// `>+(pat)`: t2 dominates t1 through intermediate nodes matching pat
    UnbrokenCategoryIsDominatedBy(CategoryPattern),
    /// `.+(pat)`: precedence through a pat-matching chain (search-enforced)
    UnbrokenCategoryPrecedes(CategoryPattern),
    /// `,+(pat)`: the mirror image of `.+(pat)`
    UnbrokenCategoryFollows(CategoryPattern),
}

impl Relation {
    /// The relation's textual operator, exactly as a pattern would spell it
    pub fn symbol(&self) -> String {
        match self {
            Relation::Dominates => "<<".to_string(),
            Relation::DominatedBy => ">>".to_string(),
            Relation::ParentOf => "<".to_string(),
            Relation::ChildOf => ">".to_string(),
            Relation::Precedes => "..".to_string(),
            Relation::ImmediatelyPrecedes => ".".to_string(),
            Relation::Follows => ",,".to_string(),
            Relation::ImmediatelyFollows => ",".to_string(),
            Relation::HasLeftmostDescendant => "<<,".to_string(),
            Relation::HasRightmostDescendant => "<<-".to_string(),
            Relation::LeftmostDescendantOf => ">>,".to_string(),
            Relation::RightmostDescendantOf => ">>-".to_string(),
            Relation::SisterOf => "$".to_string(),
            Relation::LeftSisterOf => "$++".to_string(),
            Relation::RightSisterOf => "$--".to_string(),
            Relation::ImmediateLeftSisterOf => "$+".to_string(),
            Relation::ImmediateRightSisterOf => "$-".to_string(),
            Relation::OnlyChildOf => ">:".to_string(),
            Relation::HasOnlyChild => "<:".to_string(),
            Relation::Equals => "==".to_string(),
            Relation::PatternSplitter => ":".to_string(),
            Relation::UnaryPathAncestorOf => "<<:".to_string(),
            Relation::UnaryPathDescendantOf => ">>:".to_string(),
            Relation::Heads(_) => ">>#".to_string(),
            Relation::HeadedBy(_) => "<<#".to_string(),
            Relation::ImmediatelyHeads(_) => ">#".to_string(),
            Relation::ImmediatelyHeadedBy(_) => "<#".to_string(),
            Relation::HasIthChild(n) => format!("<{n}"),
            Relation::IthChildOf(n) => format!(">{n}"),
            Relation::UnbrokenCategoryDominates(p) => format!("<+({})", p.raw),
            Relation::UnbrokenCategoryIsDominatedBy(p) => format!(">+({})", p.raw),
            Relation::UnbrokenCategoryPrecedes(p) => format!(".+({})", p.raw),
            Relation::UnbrokenCategoryFollows(p) => format!(",+({})", p.raw),
        }
    }

    /// Whether (t1, t2) stand in this relation, relative to the context root
    pub fn satisfies(&self, ctx: &MatchContext, t1: NodeId, t2: NodeId) -> bool {
        let tree = ctx.tree();
        let root = ctx.root();
        match self {
            Relation::Dominates => t1 != t2 && dominates(tree, t1, t2),
            Relation::DominatedBy => t1 != t2 && dominates(tree, t2, t1),
            Relation::ParentOf => tree.children(t1).contains(&t2),
            Relation::ChildOf => tree.children(t2).contains(&t1),
            Relation::Precedes => precedes(tree, root, t1, t2),
            Relation::ImmediatelyPrecedes => immediately_precedes(tree, root, t1, t2),
            Relation::Follows => precedes(tree, root, t2, t1),
            Relation::ImmediatelyFollows => immediately_precedes(tree, root, t2, t1),
            Relation::HasLeftmostDescendant => leftmost_chain_contains(tree, t1, t2),
            Relation::HasRightmostDescendant => rightmost_chain_contains(tree, t1, t2),
            Relation::LeftmostDescendantOf => leftmost_chain_contains(tree, t2, t1),
            Relation::RightmostDescendantOf => rightmost_chain_contains(tree, t2, t1),
            Relation::SisterOf => {
                t1 != t2
                    && match ctx.parent(t1) {
                        Some(p) => tree.children(p).contains(&t2),
                        None => false,
                    }
            }
            Relation::LeftSisterOf => left_sister_of(ctx, t1, t2),
            Relation::RightSisterOf => left_sister_of(ctx, t2, t1),
            Relation::ImmediateLeftSisterOf => immediate_left_sister_of(ctx, t1, t2),
            Relation::ImmediateRightSisterOf => immediate_left_sister_of(ctx, t2, t1),
            Relation::OnlyChildOf => {
                tree.num_children(t2) == 1 && tree.first_child(t2) == Some(t1)
            }
            Relation::HasOnlyChild => {
                tree.num_children(t1) == 1 && tree.first_child(t1) == Some(t2)
            }
            Relation::Equals => t1 == t2,
            Relation::PatternSplitter => true,
            Relation::UnaryPathAncestorOf => unary_chain_contains(tree, t1, t2),
            Relation::UnaryPathDescendantOf => unary_chain_contains(tree, t2, t1),
            Relation::Heads(hf) => heads_transitively(tree, hf, t1, t2),
            Relation::HeadedBy(hf) => heads_transitively(tree, hf, t2, t1),
            Relation::ImmediatelyHeads(hf) => hf.determine_head(tree, t2) == Some(t1),
            Relation::ImmediatelyHeadedBy(hf) => hf.determine_head(tree, t1) == Some(t2),
            Relation::HasIthChild(n) => ith_child(tree, t1, *n) == Some(t2),
            Relation::IthChildOf(n) => ith_child(tree, t2, *n) == Some(t1),
            Relation::UnbrokenCategoryDominates(pat) => unbroken_dominates(tree, pat, t1, t2),
            Relation::UnbrokenCategoryIsDominatedBy(pat) => unbroken_dominates(tree, pat, t2, t1),
            // path legality is enforced by the search, not here
            Relation::UnbrokenCategoryPrecedes(_) | Relation::UnbrokenCategoryFollows(_) => true,
        }
    }

    /// Lazily enumerate exactly `{ t2 : self.satisfies(ctx, t, t2) }`, with
    /// no duplicates, in the order documented per relation family
    pub fn search_candidates<'m, 't>(
        &self,
        ctx: &'m MatchContext<'t>,
        t: NodeId,
    ) -> NodeSearch<'m, 't> {
        let tree = ctx.tree();
        let state = match self {
            Relation::Equals => State::Once(Some(t)),
            Relation::PatternSplitter => State::Dfs {
                stack: vec![ctx.root()],
            },
            Relation::Dominates => State::Dfs {
                stack: rev_children(tree, t),
            },
            Relation::DominatedBy => State::Ancestors { cur: ctx.parent(t) },
            Relation::ParentOf => State::Children { parent: t, next: 0 },
            Relation::ChildOf => State::Once(ctx.parent(t)),
            Relation::Precedes => State::Dfs {
                stack: linear_seed_stack(ctx, t, Dir::Right),
            },
            Relation::Follows => State::Dfs {
                stack: linear_seed_stack(ctx, t, Dir::Left),
            },
            Relation::ImmediatelyPrecedes => State::FirstChain {
                cur: adjacent_right(ctx, t),
            },
            Relation::ImmediatelyFollows => State::LastChain {
                cur: adjacent_left(ctx, t),
            },
            Relation::HasLeftmostDescendant => State::FirstChain {
                cur: tree.first_child(t),
            },
            Relation::HasRightmostDescendant => State::LastChain {
                cur: tree.last_child(t),
            },
            Relation::LeftmostDescendantOf => State::LeftmostAncestors {
                cur: ctx.parent(t).filter(|&p| tree.first_child(p) == Some(t)),
            },
            Relation::RightmostDescendantOf => State::RightmostAncestors {
                cur: ctx.parent(t).filter(|&p| tree.last_child(p) == Some(t)),
            },
            Relation::SisterOf => match ctx.parent(t) {
                Some(parent) => State::Sisters {
                    parent,
                    next: 0,
                    skip: t,
                },
                None => State::Once(None),
            },
            Relation::LeftSisterOf => match ctx.parent(t) {
                Some(parent) => State::RightSisters {
                    parent,
                    next: tree.num_children(parent) as isize - 1,
                    stop: t,
                },
                None => State::Once(None),
            },
            Relation::RightSisterOf => match ctx.parent(t) {
                Some(parent) => State::LeftSisters {
                    parent,
                    next: 0,
                    stop: t,
                },
                None => State::Once(None),
            },
            Relation::ImmediateLeftSisterOf => State::Once(right_sibling(ctx, t)),
            Relation::ImmediateRightSisterOf => State::Once(left_sibling(ctx, t)),
            Relation::OnlyChildOf => {
                State::Once(ctx.parent(t).filter(|&p| tree.num_children(p) == 1))
            }
            Relation::HasOnlyChild => State::Once(if tree.num_children(t) == 1 {
                tree.first_child(t)
            } else {
                None
            }),
            Relation::UnaryPathAncestorOf => State::UnaryDown {
                cur: if tree.num_children(t) == 1 {
                    tree.first_child(t)
                } else {
                    None
                },
            },
            Relation::UnaryPathDescendantOf => State::UnaryUp {
                cur: ctx.parent(t).filter(|&p| tree.num_children(p) == 1),
            },
            Relation::Heads(hf) => State::HeadAncestors {
                cur: ctx
                    .parent(t)
                    .filter(|&p| hf.determine_head(tree, p) == Some(t)),
                hf: hf.clone(),
            },
            Relation::HeadedBy(hf) => State::HeadChain {
                cur: hf.determine_head(tree, t),
                hf: hf.clone(),
            },
            Relation::ImmediatelyHeads(hf) => State::Once(
                ctx.parent(t)
                    .filter(|&p| hf.determine_head(tree, p) == Some(t)),
            ),
            Relation::ImmediatelyHeadedBy(hf) => State::Once(hf.determine_head(tree, t)),
            Relation::HasIthChild(n) => State::Once(ith_child(tree, t, *n)),
            Relation::IthChildOf(n) => {
                State::Once(ctx.parent(t).filter(|&p| ith_child(tree, p, *n) == Some(t)))
            }
            Relation::UnbrokenCategoryDominates(pat) => State::GatedDfs {
                stack: rev_children(tree, t),
                pat: pat.clone(),
            },
            Relation::UnbrokenCategoryIsDominatedBy(pat) => State::GatedAncestors {
                cur: ctx.parent(t),
                pat: pat.clone(),
            },
            Relation::UnbrokenCategoryPrecedes(pat) => State::Prebuilt {
                stack: gated_linear_stack(ctx, t, pat, Dir::Right),
            },
            Relation::UnbrokenCategoryFollows(pat) => State::Prebuilt {
                stack: gated_linear_stack(ctx, t, pat, Dir::Left),
            },
        };
        NodeSearch { ctx, state }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.symbol())
    }
}

impl fmt::Debug for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Relation({})", self.symbol())
    }
}

// Equal iff symbol and arguments are equal; head-finder arguments compare
// by instance identity.
impl PartialEq for Relation {
    fn eq(&self, other: &Self) -> bool {
        use Relation::*;
        match (self, other) {
            (Heads(a), Heads(b))
            | (HeadedBy(a), HeadedBy(b))
            | (ImmediatelyHeads(a), ImmediatelyHeads(b))
            | (ImmediatelyHeadedBy(a), ImmediatelyHeadedBy(b)) => Arc::ptr_eq(a, b),
            (HasIthChild(a), HasIthChild(b)) | (IthChildOf(a), IthChildOf(b)) => a == b,
            (UnbrokenCategoryDominates(a), UnbrokenCategoryDominates(b))
            | (UnbrokenCategoryIsDominatedBy(a), UnbrokenCategoryIsDominatedBy(b))
            | (UnbrokenCategoryPrecedes(a), UnbrokenCategoryPrecedes(b))
            | (UnbrokenCategoryFollows(a), UnbrokenCategoryFollows(b)) => a == b,
            _ => mem::discriminant(self) == mem::discriminant(other),
        }
    }
}

impl Eq for Relation {}

/// Lazy candidate search for one (relation, seed node) pair.
///
/// The cursor belongs to exactly one point in a backtracking recursion; it
/// is driven to exhaustion or dropped, never shared.
pub struct NodeSearch<'m, 't> {
    ctx: &'m MatchContext<'t>,
    state: State,
}

impl<'m, 't> NodeSearch<'m, 't> {
    /// Preorder search over every node under the context root
    pub(crate) fn whole_tree(ctx: &'m MatchContext<'t>) -> Self {
        Self {
            ctx,
            state: State::Dfs {
                stack: vec![ctx.root()],
            },
        }
    }
}

enum State {
    /// Zero or one candidates
    Once(Option<NodeId>),
    /// A node's children in order
    Children { parent: NodeId, next: usize },
    /// Preorder expansion of everything on the stack
    Dfs { stack: Vec<NodeId> },
    /// Preorder expansion that only descends through admitted labels
    GatedDfs {
        stack: Vec<NodeId>,
        pat: CategoryPattern,
    },
    /// Parent chain, bottom-up
    Ancestors { cur: Option<NodeId> },
    /// Parent chain that stops at the first label the pattern rejects
    GatedAncestors {
        cur: Option<NodeId>,
        pat: CategoryPattern,
    },
    /// First-child chain downward
    FirstChain { cur: Option<NodeId> },
    /// Last-child chain downward
    LastChain { cur: Option<NodeId> },
    /// Parent chain upward while the previous node stays a first child
    LeftmostAncestors { cur: Option<NodeId> },
    /// Parent chain upward while the previous node stays a last child
    RightmostAncestors { cur: Option<NodeId> },
    /// All of a parent's children in order, skipping the seed
    Sisters {
        parent: NodeId,
        next: usize,
        skip: NodeId,
    },
    /// Siblings right of the seed, rightmost first
    RightSisters {
        parent: NodeId,
        next: isize,
        stop: NodeId,
    },
    /// Siblings left of the seed, leftmost first
    LeftSisters {
        parent: NodeId,
        next: usize,
        stop: NodeId,
    },
    /// Only-child chain downward
    UnaryDown { cur: Option<NodeId> },
    /// Chain of only-child parents upward
    UnaryUp { cur: Option<NodeId> },
    /// Parent chain upward while the previous node stays the head
    HeadAncestors {
        cur: Option<NodeId>,
        hf: HeadFinderRef,
    },
    /// Head-choice chain downward
    HeadChain {
        cur: Option<NodeId>,
        hf: HeadFinderRef,
    },
    /// Candidates computed up front, popped in order
    Prebuilt { stack: Vec<NodeId> },
}

impl Iterator for NodeSearch<'_, '_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let tree = self.ctx.tree();
        match &mut self.state {
            State::Once(slot) => slot.take(),
            State::Children { parent, next } => {
                let kids = tree.children(*parent);
                if *next < kids.len() {
                    let n = kids[*next];
                    *next += 1;
                    Some(n)
                } else {
                    None
                }
            }
            State::Dfs { stack } => {
                let n = stack.pop()?;
                for &c in tree.children(n).iter().rev() {
                    stack.push(c);
                }
                Some(n)
            }
            State::GatedDfs { stack, pat } => {
                let n = stack.pop()?;
                if pat.admits(tree.label(n)) {
                    for &c in tree.children(n).iter().rev() {
                        stack.push(c);
                    }
                }
                Some(n)
            }
            State::Ancestors { cur } => {
                let n = (*cur)?;
                *cur = self.ctx.parent(n);
                Some(n)
            }
            State::GatedAncestors { cur, pat } => {
                let n = (*cur)?;
                *cur = if pat.admits(tree.label(n)) {
                    self.ctx.parent(n)
                } else {
                    None
                };
                Some(n)
            }
            State::FirstChain { cur } => {
                let n = (*cur)?;
                *cur = tree.first_child(n);
                Some(n)
            }
            State::LastChain { cur } => {
                let n = (*cur)?;
                *cur = tree.last_child(n);
                Some(n)
            }
            State::LeftmostAncestors { cur } => {
                let n = (*cur)?;
                *cur = self
                    .ctx
                    .parent(n)
                    .filter(|&p| tree.first_child(p) == Some(n));
                Some(n)
            }
            State::RightmostAncestors { cur } => {
                let n = (*cur)?;
                *cur = self
                    .ctx
                    .parent(n)
                    .filter(|&p| tree.last_child(p) == Some(n));
                Some(n)
            }
            State::Sisters { parent, next, skip } => loop {
                let kids = tree.children(*parent);
                if *next >= kids.len() {
                    return None;
                }
                let n = kids[*next];
                *next += 1;
                if n != *skip {
                    return Some(n);
                }
            },
            State::RightSisters { parent, next, stop } => {
                if *next < 0 {
                    return None;
                }
                let n = tree.children(*parent)[*next as usize];
                if n == *stop {
                    *next = -1;
                    return None;
                }
                *next -= 1;
                Some(n)
            }
            State::LeftSisters { parent, next, stop } => {
                let kids = tree.children(*parent);
                if *next >= kids.len() {
                    return None;
                }
                let n = kids[*next];
                if n == *stop {
                    *next = kids.len();
                    return None;
                }
                *next += 1;
                Some(n)
            }
            State::UnaryDown { cur } => {
                let n = (*cur)?;
                *cur = if tree.num_children(n) == 1 {
                    tree.first_child(n)
                } else {
                    None
                };
                Some(n)
            }
            State::UnaryUp { cur } => {
                let n = (*cur)?;
                *cur = self.ctx.parent(n).filter(|&p| tree.num_children(p) == 1);
                Some(n)
            }
            State::HeadAncestors { cur, hf } => {
                let n = (*cur)?;
                *cur = self
                    .ctx
                    .parent(n)
                    .filter(|&p| hf.determine_head(tree, p) == Some(n));
                Some(n)
            }
            State::HeadChain { cur, hf } => {
                let n = (*cur)?;
                *cur = hf.determine_head(tree, n);
                Some(n)
            }
            State::Prebuilt { stack } => stack.pop(),
        }
    }
}

/// Sibling direction for the linear-order searches
#[derive(Clone, Copy, PartialEq, Eq)]
enum Dir {
    Left,
    Right,
}

fn rev_children(tree: &Tree, t: NodeId) -> Vec<NodeId> {
    tree.children(t).iter().rev().copied().collect()
}

fn dominates(tree: &Tree, a: NodeId, b: NodeId) -> bool {
    let mut stack: Vec<NodeId> = tree.children(a).to_vec();
    while let Some(n) = stack.pop() {
        if n == b {
            return true;
        }
        stack.extend_from_slice(tree.children(n));
    }
    false
}

fn precedes(tree: &Tree, root: NodeId, t1: NodeId, t2: NodeId) -> bool {
    match (tree.right_edge(t1, root), tree.left_edge(t2, root)) {
        (Some(r), Some(l)) => r <= l,
        _ => false,
    }
}

fn immediately_precedes(tree: &Tree, root: NodeId, t1: NodeId, t2: NodeId) -> bool {
    match (tree.right_edge(t1, root), tree.left_edge(t2, root)) {
        (Some(r), Some(l)) => r == l,
        _ => false,
    }
}

fn leftmost_chain_contains(tree: &Tree, a: NodeId, b: NodeId) -> bool {
    let mut cur = a;
    while let Some(c) = tree.first_child(cur) {
        if c == b {
            return true;
        }
        cur = c;
    }
    false
}

fn rightmost_chain_contains(tree: &Tree, a: NodeId, b: NodeId) -> bool {
    let mut cur = a;
    while let Some(c) = tree.last_child(cur) {
        if c == b {
            return true;
        }
        cur = c;
    }
    false
}

fn unary_chain_contains(tree: &Tree, a: NodeId, b: NodeId) -> bool {
    let mut cur = a;
    while tree.num_children(cur) == 1 {
        let c = tree.children(cur)[0];
        if c == b {
            return true;
        }
        cur = c;
    }
    false
}

fn left_sister_of(ctx: &MatchContext, t1: NodeId, t2: NodeId) -> bool {
    if t1 == t2 {
        return false;
    }
    let Some(parent) = ctx.parent(t1) else {
        return false;
    };
    let kids = ctx.tree().children(parent);
    // scan right to left; whichever of t1/t2 turns up first decides
    for i in (1..kids.len()).rev() {
        if kids[i] == t1 {
            return false;
        }
        if kids[i] == t2 {
            return true;
        }
    }
    false
}

fn immediate_left_sister_of(ctx: &MatchContext, t1: NodeId, t2: NodeId) -> bool {
    if t1 == t2 {
        return false;
    }
    let Some(parent) = ctx.parent(t1) else {
        return false;
    };
    let kids = ctx.tree().children(parent);
    for i in (1..kids.len()).rev() {
        if kids[i] == t1 {
            return false;
        }
        if kids[i] == t2 {
            return kids[i - 1] == t1;
        }
    }
    false
}

fn heads_transitively(tree: &Tree, hf: &HeadFinderRef, head: NodeId, phrase: NodeId) -> bool {
    let mut cur = phrase;
    loop {
        if tree.is_leaf(cur) {
            return false;
        }
        // a preterminal is headed by its sole terminal child
        if tree.is_preterminal(cur) {
            return tree.first_child(cur) == Some(head);
        }
        match hf.determine_head(tree, cur) {
            Some(h) if h == head => return true,
            Some(h) => cur = h,
            None => return false,
        }
    }
}

fn ith_child(tree: &Tree, t: NodeId, num: i32) -> Option<NodeId> {
    let kids = tree.children(t);
    let idx = if num > 0 {
        (num - 1) as usize
    } else {
        kids.len().checked_sub(num.unsigned_abs() as usize)?
    };
    kids.get(idx).copied()
}

fn unbroken_dominates(tree: &Tree, pat: &CategoryPattern, a: NodeId, b: NodeId) -> bool {
    let mut stack: Vec<NodeId> = tree.children(a).to_vec();
    while let Some(n) = stack.pop() {
        if n == b {
            return true;
        }
        if pat.admits(tree.label(n)) {
            stack.extend_from_slice(tree.children(n));
        }
    }
    false
}

fn right_sibling(ctx: &MatchContext, t: NodeId) -> Option<NodeId> {
    let parent = ctx.parent(t)?;
    let kids = ctx.tree().children(parent);
    let i = kids.iter().position(|&k| k == t)?;
    kids.get(i + 1).copied()
}

fn left_sibling(ctx: &MatchContext, t: NodeId) -> Option<NodeId> {
    let parent = ctx.parent(t)?;
    let kids = ctx.tree().children(parent);
    let i = kids.iter().position(|&k| k == t)?;
    if i > 0 { Some(kids[i - 1]) } else { None }
}

/// Nearest node adjacent to `t`'s right edge: climb while `t` is a last
/// child, then step to the next sibling over
fn adjacent_right(ctx: &MatchContext, t: NodeId) -> Option<NodeId> {
    let tree = ctx.tree();
    let mut current = t;
    loop {
        let parent = ctx.parent(current)?;
        if tree.last_child(parent) == Some(current) {
            current = parent;
        } else {
            let kids = tree.children(parent);
            let i = kids.iter().position(|&k| k == current)?;
            return kids.get(i + 1).copied();
        }
    }
}

fn adjacent_left(ctx: &MatchContext, t: NodeId) -> Option<NodeId> {
    let tree = ctx.tree();
    let mut current = t;
    loop {
        let parent = ctx.parent(current)?;
        if tree.first_child(parent) == Some(current) {
            current = parent;
        } else {
            let kids = tree.children(parent);
            let i = kids.iter().position(|&k| k == current)?;
            return if i > 0 { Some(kids[i - 1]) } else { None };
        }
    }
}

/// Seed stack for the `..`/`,,` searches: climb the ancestor chain,
/// collecting the siblings on the `dir` side of each level. The top of the
/// stack ends up being the nearest sibling at the highest level, which the
/// DFS expansion then works through
fn linear_seed_stack(ctx: &MatchContext, t: NodeId, dir: Dir) -> Vec<NodeId> {
    let tree = ctx.tree();
    let mut stack = Vec::new();
    let mut current = t;
    while let Some(parent) = ctx.parent(current) {
        let kids = tree.children(parent);
        match dir {
            Dir::Right => {
                for i in (0..kids.len()).rev() {
                    if kids[i] == current {
                        break;
                    }
                    stack.push(kids[i]);
                }
            }
            Dir::Left => {
                for &kid in kids {
                    if kid == current {
                        break;
                    }
                    stack.push(kid);
                }
            }
        }
        current = parent;
    }
    stack
}

/// Candidates for the `.+`/`,+` searches, computed up front: starting from
/// the seed, every adjacent neighbor (at any ancestor level, descending its
/// edge-ward child chain) is a candidate, and the walk continues through
/// neighbors whose label the pattern admits. Each node is recorded once even
/// when reachable along more than one path
fn gated_linear_stack(
    ctx: &MatchContext,
    t: NodeId,
    pat: &CategoryPattern,
    dir: Dir,
) -> Vec<NodeId> {
    let tree = ctx.tree();
    let root = ctx.root();
    let mut seen = FxHashSet::default();
    let mut out = Vec::new();
    let mut work = vec![t];
    while let Some(from) = work.pop() {
        // climb until `from` has a neighbor on the `dir` side, stopping at root
        let mut node = from;
        let mut neighbor = None;
        while let Some(parent) = ctx.parent(node) {
            let kids = tree.children(parent);
            let Some(i) = kids.iter().position(|&k| k == node) else {
                break;
            };
            let adjacent = match dir {
                Dir::Right => kids.get(i + 1).copied(),
                Dir::Left => {
                    if i > 0 {
                        Some(kids[i - 1])
                    } else {
                        None
                    }
                }
            };
            if adjacent.is_some() || parent == root {
                neighbor = adjacent;
                break;
            }
            node = parent;
        }
        let mut next = neighbor;
        while let Some(nb) = next {
            if seen.insert(nb) {
                out.push(nb);
                if pat.admits(tree.label(nb)) {
                    work.push(nb);
                }
            }
            next = match dir {
                Dir::Right => tree.first_child(nb),
                Dir::Left => tree.last_child(nb),
            };
        }
    }
    out
}
