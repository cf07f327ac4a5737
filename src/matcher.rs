//! Backtracking pattern matching
//!
//! `MatchContext` is the per-attempt root context: it pins the root node that
//! bounds every relation evaluation and supplies the parent lookup that trees
//! themselves do not carry. `PatternMatcher` drives relation searches with an
//! explicit frame stack, binding pattern nodes one at a time and unwinding
//! variable bindings as it backtracks.

use std::fmt;

use regex::Regex;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::relation::{NodeSearch, RelationRef};
use crate::tree::{NodeId, Tree};
use crate::variables::VariableStrings;

/// Root context for one match attempt.
///
/// Built once per attempt; the parent index covers exactly the subtree under
/// `root`, so the root itself has no parent and nodes outside the subtree
/// are unknown.
pub struct MatchContext<'t> {
    tree: &'t Tree,
    root: NodeId,
    parents: Vec<Option<NodeId>>,
}

impl<'t> MatchContext<'t> {
    pub fn new(tree: &'t Tree, root: NodeId) -> Self {
        let mut parents = vec![None; tree.len()];
        let mut stack = vec![root];
        while let Some(n) = stack.pop() {
            for &c in tree.children(n) {
                parents[c] = Some(n);
                stack.push(c);
            }
        }
        Self {
            tree,
            root,
            parents,
        }
    }

    pub fn tree(&self) -> &'t Tree {
        self.tree
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The parent of `node` within the root's subtree, or `None` for the
    /// root itself and for nodes not under it
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        if node == self.root {
            None
        } else {
            self.parents.get(node).copied().flatten()
        }
    }
}

/// Predicate on a single node's label
#[derive(Clone)]
pub enum Pred {
    Any,
    /// Exact label match
    Label(String),
    /// Regex match against the label (pattern source kept for Debug/Eq)
    Regex(String, Regex),
    /// Label must equal the string already bound to a variable
    Var(String),
}

impl Pred {
    pub fn regex(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Pred::Regex(pattern.to_string(), Regex::new(pattern)?))
    }

    fn admits(&self, vars: &VariableStrings, label: &str) -> bool {
        match self {
            Pred::Any => true,
            Pred::Label(want) => want == label,
            Pred::Regex(_, re) => re.is_match(label),
            Pred::Var(var) => vars.get(var) == Some(label),
        }
    }
}

impl fmt::Debug for Pred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pred::Any => f.write_str("Any"),
            Pred::Label(s) => f.debug_tuple("Label").field(s).finish(),
            Pred::Regex(pattern, _) => f.debug_tuple("Regex").field(pattern).finish(),
            Pred::Var(v) => f.debug_tuple("Var").field(v).finish(),
        }
    }
}

// Compare pattern strings, not compiled regexes
impl PartialEq for Pred {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Pred::Any, Pred::Any) => true,
            (Pred::Label(a), Pred::Label(b)) => a == b,
            (Pred::Regex(a, _), Pred::Regex(b, _)) => a == b,
            (Pred::Var(a), Pred::Var(b)) => a == b,
            _ => false,
        }
    }
}

/// One named node of a pattern
#[derive(Debug, Clone)]
pub struct PatternNode {
    pub name: String,
    pub pred: Pred,
    /// Bind the matched node's label to this variable for the duration of
    /// the branch (backreference source)
    pub capture: Option<String>,
}

impl PatternNode {
    pub fn new(name: &str, pred: Pred) -> Self {
        Self {
            name: name.to_string(),
            pred,
            capture: None,
        }
    }

    pub fn capture(mut self, var: &str) -> Self {
        self.capture = Some(var.to_string());
        self
    }
}

/// `rel.satisfies(anchor, target)` must hold between two pattern nodes
#[derive(Debug, Clone)]
pub struct Constraint {
    pub anchor: usize,
    pub rel: RelationRef,
    pub target: usize,
}

/// Error building a `TreePattern`
#[derive(Debug, Error)]
pub enum PatternError {
    #[error("constraint references pattern node {0}, but there are only {1} nodes")]
    NodeOutOfRange(usize, usize),
    #[error("constraint relates pattern node {0} to itself")]
    SelfRelation(usize),
    #[error("pattern node \"{0}\" is not anchored to any earlier node")]
    UnanchoredNode(String),
}

/// A pattern over tree nodes: named nodes with label predicates, connected
/// by relation constraints.
///
/// Nodes are bound in declaration order. Every node after the first must be
/// the target of at least one constraint anchored at an earlier node; its
/// first such constraint generates its candidates, and all remaining
/// constraints are checked as the later endpoint binds.
#[derive(Debug, Clone)]
pub struct TreePattern {
    nodes: Vec<PatternNode>,
    constraints: Vec<Constraint>,
    generators: Vec<Option<usize>>,
    checks: Vec<Vec<usize>>,
}

impl TreePattern {
    pub fn new(nodes: Vec<PatternNode>, constraints: Vec<Constraint>) -> Result<Self, PatternError> {
        let n = nodes.len();
        let mut generators = vec![None; n];
        let mut checks: Vec<Vec<usize>> = vec![Vec::new(); n];
        for (ci, c) in constraints.iter().enumerate() {
            if c.anchor >= n {
                return Err(PatternError::NodeOutOfRange(c.anchor, n));
            }
            if c.target >= n {
                return Err(PatternError::NodeOutOfRange(c.target, n));
            }
            if c.anchor == c.target {
                return Err(PatternError::SelfRelation(c.anchor));
            }
            if c.target > c.anchor && generators[c.target].is_none() {
                generators[c.target] = Some(ci);
            } else {
                checks[c.anchor.max(c.target)].push(ci);
            }
        }
        for (i, g) in generators.iter().enumerate().skip(1) {
            if g.is_none() {
                return Err(PatternError::UnanchoredNode(nodes[i].name.clone()));
            }
        }
        Ok(Self {
            nodes,
            constraints,
            generators,
            checks,
        })
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }
}

/// One successful binding of every pattern node
#[derive(Debug, Clone)]
pub struct Match {
    bindings: FxHashMap<String, NodeId>,
}

impl Match {
    /// The node bound to the pattern node with this name
    pub fn get(&self, name: &str) -> Option<NodeId> {
        self.bindings.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, NodeId)> + '_ {
        self.bindings.iter().map(|(name, &id)| (name.as_str(), id))
    }
}

struct Frame<'m, 't> {
    search: NodeSearch<'m, 't>,
    /// Variable this frame bound, to be released before rebinding
    captured: Option<String>,
}

/// Iterator over every way a pattern binds to nodes of one tree.
///
/// Depth-first: each frame owns the candidate search for one pattern node,
/// and exhausting a frame backtracks to the one below it. Candidates whose
/// capture would conflict with an existing variable binding are skipped, not
/// fatal.
pub struct PatternMatcher<'p, 'm, 't> {
    pattern: &'p TreePattern,
    ctx: &'m MatchContext<'t>,
    frames: Vec<Frame<'m, 't>>,
    bindings: Vec<Option<NodeId>>,
    vars: VariableStrings,
    done: bool,
}

impl<'p, 'm, 't> PatternMatcher<'p, 'm, 't> {
    pub fn new(pattern: &'p TreePattern, ctx: &'m MatchContext<'t>) -> Self {
        let n = pattern.nodes.len();
        let mut matcher = Self {
            pattern,
            ctx,
            frames: Vec::with_capacity(n),
            bindings: vec![None; n],
            vars: VariableStrings::new(),
            done: n == 0,
        };
        if n > 0 {
            matcher.frames.push(Frame {
                search: NodeSearch::whole_tree(ctx),
                captured: None,
            });
        }
        matcher
    }

    fn frame_for(&self, depth: usize) -> Frame<'m, 't> {
        let ci = self.pattern.generators[depth]
            .expect("matcher bug: non-initial pattern node without a generator");
        let c = &self.pattern.constraints[ci];
        let anchor = self.bindings[c.anchor]
            .expect("matcher bug: anchor node unbound when its dependent opened");
        Frame {
            search: c.rel.search_candidates(self.ctx, anchor),
            captured: None,
        }
    }

    fn admits(&self, depth: usize, cand: NodeId) -> bool {
        let tree = self.ctx.tree();
        if !self.pattern.nodes[depth]
            .pred
            .admits(&self.vars, tree.label(cand))
        {
            return false;
        }
        for &ci in &self.pattern.checks[depth] {
            let c = &self.pattern.constraints[ci];
            let bound = |i: usize| {
                if i == depth {
                    cand
                } else {
                    self.bindings[i].expect("matcher bug: checked node unbound")
                }
            };
            if !c.rel.satisfies(self.ctx, bound(c.anchor), bound(c.target)) {
                return false;
            }
        }
        true
    }

    fn to_match(&self) -> Match {
        let bindings = self
            .pattern
            .nodes
            .iter()
            .zip(&self.bindings)
            .map(|(node, b)| {
                (
                    node.name.clone(),
                    b.expect("matcher bug: incomplete match yielded"),
                )
            })
            .collect();
        Match { bindings }
    }
}

impl Iterator for PatternMatcher<'_, '_, '_> {
    type Item = Match;

    fn next(&mut self) -> Option<Match> {
        if self.done {
            return None;
        }
        loop {
            let depth = self.frames.len() - 1;

            // release whatever this frame bound last time around
            if let Some(var) = self.frames[depth].captured.take() {
                self.vars.unset_var(&var);
            }
            self.bindings[depth] = None;

            let Some(cand) = self.frames[depth].search.next() else {
                self.frames.pop();
                if self.frames.is_empty() {
                    self.done = true;
                    return None;
                }
                continue;
            };

            if !self.admits(depth, cand) {
                continue;
            }
            self.bindings[depth] = Some(cand);

            if let Some(var) = self.pattern.nodes[depth].capture.clone() {
                let label = self.ctx.tree().label(cand);
                // a conflicting backreference fails this candidate only
                if self.vars.set_var(&var, label).is_err() {
                    self.bindings[depth] = None;
                    continue;
                }
                self.frames[depth].captured = Some(var);
            }

            if depth + 1 == self.pattern.nodes.len() {
                return Some(self.to_match());
            }
            let frame = self.frame_for(depth + 1);
            self.frames.push(frame);
        }
    }
}

/// Collect every match of `pattern` in the subtree rooted at `root`
pub fn search_all(tree: &Tree, root: NodeId, pattern: &TreePattern) -> Vec<Match> {
    let ctx = MatchContext::new(tree, root);
    PatternMatcher::new(pattern, &ctx).collect()
}

/// Whether `pattern` matches anywhere in the subtree rooted at `root`
pub fn matches(tree: &Tree, root: NodeId, pattern: &TreePattern) -> bool {
    let ctx = MatchContext::new(tree, root);
    PatternMatcher::new(pattern, &ctx).next().is_some()
}
