use divan::{Bencher, black_box};
use std::sync::Arc;

use treematch::{
    Constraint, HeadFinderRef, LeftHeadFinder, MatchContext, PatternMatcher, PatternNode, Pred,
    Tree, TreePattern, get_relation, read_tree,
};

fn main() {
    divan::main();
}

/// Right-branching tree of the given depth, three children per level
fn deep_tree(depth: usize) -> Tree {
    let mut text = String::new();
    for _ in 0..depth {
        text.push_str("(S (NP (DT the) (NN dog)) (VBD saw) ");
    }
    text.push_str("(NN it)");
    for _ in 0..depth {
        text.push(')');
    }
    read_tree(&text).unwrap()
}

#[divan::bench(sample_count = 100)]
fn dominates_search(bencher: Bencher) {
    let tree = deep_tree(50);
    let ctx = MatchContext::new(&tree, 0);
    let hf: HeadFinderRef = Arc::new(LeftHeadFinder);
    let rel = get_relation("<<", None, &hf).unwrap();

    bencher.bench_local(|| {
        let count = rel.search_candidates(black_box(&ctx), 0).count();
        black_box(count);
    });
}

#[divan::bench(sample_count = 100)]
fn precedes_satisfies(bencher: Bencher) {
    let tree = deep_tree(50);
    let ctx = MatchContext::new(&tree, 0);
    let hf: HeadFinderRef = Arc::new(LeftHeadFinder);
    let rel = get_relation("..", None, &hf).unwrap();
    let nodes: Vec<_> = tree.preorder(0).collect();

    bencher.bench_local(|| {
        let mut hits = 0usize;
        for &a in nodes.iter().step_by(7) {
            for &b in nodes.iter().step_by(11) {
                if rel.satisfies(black_box(&ctx), a, b) {
                    hits += 1;
                }
            }
        }
        black_box(hits);
    });
}

#[divan::bench(sample_count = 100)]
fn pattern_match(bencher: Bencher) {
    let tree = deep_tree(50);
    let hf: HeadFinderRef = Arc::new(LeftHeadFinder);
    let pattern = TreePattern::new(
        vec![
            PatternNode::new("np", Pred::Label("NP".to_string())),
            PatternNode::new("nn", Pred::Label("NN".to_string())),
        ],
        vec![Constraint {
            anchor: 0,
            rel: get_relation("<<", None, &hf).unwrap(),
            target: 1,
        }],
    )
    .unwrap();

    bencher.bench_local(|| {
        let ctx = MatchContext::new(black_box(&tree), 0);
        let count = PatternMatcher::new(&pattern, &ctx).count();
        black_box(count);
    });
}
