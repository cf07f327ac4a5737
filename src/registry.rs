//! Relation registry and canonicalizer
//!
//! Every relation is handed out through the factory functions here, backed
//! by a process-wide interning pool: one `Arc<Relation>` per distinct
//! (symbol, argument, head-finder) signature. Equal lookups return the same
//! allocation, so pointer equality doubles as logical equality for callers
//! that cache relations.
//!
//! The pool is populated with the argument-free relations the first time it
//! is touched and is read-mostly afterwards; it can be shared freely across
//! threads.

use std::sync::{Arc, Mutex, OnceLock};

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::headfinder::{BasicCat, HeadFinderRef};
use crate::relation::{CategoryPattern, Relation, RelationRef};

/// Error from the relation factories
#[derive(Debug, Error)]
pub enum RelationError {
    /// Symbol (or symbol/argument combination) not in the relation grammar
    #[error("unrecognized relation {0}")]
    UnrecognizedRelation(String),
    /// Argument that can never be valid for the relation it was given to
    #[error("invalid relation argument: {0}")]
    InvalidArgument(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RelationKey {
    symbol: String,
    arg: Option<String>,
    /// Head-finder instance identity for the head-backed relations, else 0
    head: usize,
}

fn simple_key(symbol: &str) -> RelationKey {
    RelationKey {
        symbol: symbol.to_string(),
        arg: None,
        head: 0,
    }
}

fn head_id(head_finder: &HeadFinderRef) -> usize {
    Arc::as_ptr(head_finder) as *const () as usize
}

type Pool = Mutex<FxHashMap<RelationKey, RelationRef>>;

static POOL: OnceLock<Pool> = OnceLock::new();

fn pool() -> &'static Pool {
    POOL.get_or_init(|| {
        let mut map = FxHashMap::default();
        preregister_simple(&mut map);
        Mutex::new(map)
    })
}

fn preregister_simple(map: &mut FxHashMap<RelationKey, RelationRef>) {
    let simple = [
        ("<<", Relation::Dominates),
        (">>", Relation::DominatedBy),
        ("<", Relation::ParentOf),
        (">", Relation::ChildOf),
        ("..", Relation::Precedes),
        (".", Relation::ImmediatelyPrecedes),
        (",,", Relation::Follows),
        (",", Relation::ImmediatelyFollows),
        ("<<,", Relation::HasLeftmostDescendant),
        ("<<-", Relation::HasRightmostDescendant),
        (">>,", Relation::LeftmostDescendantOf),
        (">>-", Relation::RightmostDescendantOf),
        ("$", Relation::SisterOf),
        ("$++", Relation::LeftSisterOf),
        ("$--", Relation::RightSisterOf),
        ("$+", Relation::ImmediateLeftSisterOf),
        ("$-", Relation::ImmediateRightSisterOf),
        (">:", Relation::OnlyChildOf),
        ("<:", Relation::HasOnlyChild),
        ("==", Relation::Equals),
        (":", Relation::PatternSplitter),
        ("<<:", Relation::UnaryPathAncestorOf),
        (">>:", Relation::UnaryPathDescendantOf),
    ];
    for (sym, rel) in simple {
        map.insert(simple_key(sym), Arc::new(rel));
    }
    // alternate spellings share the canonical instance
    let aliases = [
        ("<<`", "<<-"),
        (">>`", ">>-"),
        ("$..", "$++"),
        ("$,,", "$--"),
        ("$.", "$+"),
        ("$,", "$-"),
    ];
    for (alias, canonical) in aliases {
        let rel = map[&simple_key(canonical)].clone();
        map.insert(simple_key(alias), rel);
    }
}

fn intern(key: RelationKey, rel: Relation) -> RelationRef {
    let mut map = pool().lock().unwrap();
    map.entry(key).or_insert_with(|| Arc::new(rel)).clone()
}

/// Look up an argument-free relation by symbol.
///
/// Covers the simple relations and their alternate spellings, the
/// first/last-child shorthands (`<,` `<-` `` <` `` and `>,` `>-` `` >` ``,
/// which resolve to i-th-child relations), and the head-finder-backed
/// relations `>>#` `<<#` `>#` `<#`.
pub fn get_relation(
    symbol: &str,
    basic_cat: Option<BasicCat>,
    head_finder: &HeadFinderRef,
) -> Result<RelationRef, RelationError> {
    if let Some(rel) = pool().lock().unwrap().get(&simple_key(symbol)) {
        return Ok(rel.clone());
    }

    // shorthands for relations with arguments
    match symbol {
        "<," => return get_relation_with_arg("<", Some("1"), basic_cat, head_finder),
        "<-" | "<`" => return get_relation_with_arg("<", Some("-1"), basic_cat, head_finder),
        ">," => return get_relation_with_arg(">", Some("1"), basic_cat, head_finder),
        ">-" | ">`" => return get_relation_with_arg(">", Some("-1"), basic_cat, head_finder),
        _ => {}
    }

    let rel = match symbol {
        ">>#" => Relation::Heads(head_finder.clone()),
        "<<#" => Relation::HeadedBy(head_finder.clone()),
        ">#" => Relation::ImmediatelyHeads(head_finder.clone()),
        "<#" => Relation::ImmediatelyHeadedBy(head_finder.clone()),
        _ => return Err(RelationError::UnrecognizedRelation(symbol.to_string())),
    };
    let key = RelationKey {
        symbol: symbol.to_string(),
        arg: None,
        head: head_id(head_finder),
    };
    Ok(intern(key, rel))
}

/// Look up a relation taking an argument: i-th child (`<N` `>N`, nonzero,
/// negative counts from the last child) and the unbroken-category relations
/// (`<+` `>+` `.+` `,+`, whose argument is a category pattern).
///
/// With no argument this falls back to `get_relation`.
pub fn get_relation_with_arg(
    symbol: &str,
    arg: Option<&str>,
    basic_cat: Option<BasicCat>,
    head_finder: &HeadFinderRef,
) -> Result<RelationRef, RelationError> {
    let Some(arg) = arg else {
        return get_relation(symbol, basic_cat, head_finder);
    };
    let rel = match symbol {
        "<" => Relation::HasIthChild(parse_child_index(arg)?),
        ">" => Relation::IthChildOf(parse_child_index(arg)?),
        "<+" => Relation::UnbrokenCategoryDominates(CategoryPattern::parse(arg, basic_cat)?),
        ">+" => Relation::UnbrokenCategoryIsDominatedBy(CategoryPattern::parse(arg, basic_cat)?),
        ".+" => Relation::UnbrokenCategoryPrecedes(CategoryPattern::parse(arg, basic_cat)?),
        ",+" => Relation::UnbrokenCategoryFollows(CategoryPattern::parse(arg, basic_cat)?),
        _ => {
            return Err(RelationError::UnrecognizedRelation(format!(
                "{symbol} {arg}"
            )));
        }
    };
    let key = RelationKey {
        symbol: symbol.to_string(),
        arg: Some(arg.to_string()),
        head: 0,
    };
    Ok(intern(key, rel))
}

fn parse_child_index(arg: &str) -> Result<i32, RelationError> {
    let n: i32 = arg.trim().parse().map_err(|_| {
        RelationError::InvalidArgument(format!("child index \"{arg}\" is not an integer"))
    })?;
    if n == 0 {
        return Err(RelationError::InvalidArgument(
            "there is no zeroth child".to_string(),
        ));
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headfinder::{LeftHeadFinder, penn_basic_category};

    fn hf() -> HeadFinderRef {
        Arc::new(LeftHeadFinder)
    }

    #[test]
    fn test_simple_relations_are_interned() {
        let h = hf();
        let a = get_relation("<<", None, &h).unwrap();
        let b = get_relation("<<", None, &h).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.symbol(), "<<");
    }

    #[test]
    fn test_parameterized_relations_are_interned() {
        let h = hf();
        let a = get_relation_with_arg("<", Some("2"), None, &h).unwrap();
        let b = get_relation_with_arg("<", Some("2"), None, &h).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(*a, Relation::HasIthChild(2));

        let c = get_relation_with_arg("<", Some("3"), None, &h).unwrap();
        assert!(!Arc::ptr_eq(&a, &c));

        let p = get_relation_with_arg("<+", Some("VP"), None, &h).unwrap();
        let q = get_relation_with_arg("<+", Some("VP"), None, &h).unwrap();
        assert!(Arc::ptr_eq(&p, &q));
    }

    #[test]
    fn test_head_relations_keyed_by_strategy_instance() {
        let h1 = hf();
        let h2 = hf();
        let a = get_relation(">>#", None, &h1).unwrap();
        let b = get_relation(">>#", None, &h1).unwrap();
        let c = get_relation(">>#", None, &h2).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(a.symbol(), c.symbol());
    }

    #[test]
    fn test_shorthands_resolve_to_ith_child() {
        let h = hf();
        let first = get_relation("<,", None, &h).unwrap();
        let by_arg = get_relation_with_arg("<", Some("1"), None, &h).unwrap();
        assert!(Arc::ptr_eq(&first, &by_arg));

        let last_dash = get_relation("<-", None, &h).unwrap();
        let last_tick = get_relation("<`", None, &h).unwrap();
        assert!(Arc::ptr_eq(&last_dash, &last_tick));
        assert_eq!(*last_dash, Relation::HasIthChild(-1));

        let child_last = get_relation(">`", None, &h).unwrap();
        assert_eq!(*child_last, Relation::IthChildOf(-1));
    }

    #[test]
    fn test_alias_spellings_share_canonical_instance() {
        let h = hf();
        for (alias, canonical) in [
            ("<<`", "<<-"),
            (">>`", ">>-"),
            ("$..", "$++"),
            ("$,,", "$--"),
            ("$.", "$+"),
            ("$,", "$-"),
        ] {
            let a = get_relation(alias, None, &h).unwrap();
            let c = get_relation(canonical, None, &h).unwrap();
            assert!(Arc::ptr_eq(&a, &c), "{alias} should intern to {canonical}");
        }
    }

    #[test]
    fn test_unrecognized_symbols() {
        let h = hf();
        let err = get_relation("<<<", None, &h).unwrap_err();
        assert!(matches!(err, RelationError::UnrecognizedRelation(s) if s == "<<<"));

        let err = get_relation_with_arg("%", Some("x"), None, &h).unwrap_err();
        assert!(matches!(err, RelationError::UnrecognizedRelation(s) if s == "% x"));
    }

    #[test]
    fn test_bad_child_indices() {
        let h = hf();
        let err = get_relation_with_arg("<", Some("0"), None, &h).unwrap_err();
        assert!(matches!(err, RelationError::InvalidArgument(_)));

        let err = get_relation_with_arg(">", Some("two"), None, &h).unwrap_err();
        assert!(matches!(err, RelationError::InvalidArgument(_)));
    }

    #[test]
    fn test_basic_cat_required_for_at_patterns() {
        let h = hf();
        let err = get_relation_with_arg("<+", Some("@NP"), None, &h).unwrap_err();
        assert!(matches!(err, RelationError::InvalidArgument(_)));

        let ok = get_relation_with_arg("<+", Some("@NP"), Some(penn_basic_category), &h);
        assert!(ok.is_ok());
    }

    #[test]
    fn test_bad_regex_argument() {
        let h = hf();
        let err = get_relation_with_arg("<+", Some("/[/"), None, &h).unwrap_err();
        assert!(matches!(err, RelationError::InvalidArgument(_)));
    }

    #[test]
    fn test_missing_arg_falls_back_to_simple_lookup() {
        let h = hf();
        let a = get_relation_with_arg("<<", None, None, &h).unwrap();
        let b = get_relation("<<", None, &h).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_value_equality_matches_interning() {
        let h = hf();
        let a = get_relation_with_arg("<", Some("2"), None, &h).unwrap();
        assert_eq!(*a, Relation::HasIthChild(2));
        assert_ne!(*a, Relation::HasIthChild(3));
        assert_ne!(*a, Relation::IthChildOf(2));

        let d = get_relation("<<", None, &h).unwrap();
        assert_eq!(*d, Relation::Dominates);
        assert_ne!(*d, Relation::DominatedBy);
    }
}
