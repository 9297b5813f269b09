use super::*;
use proptest::prelude::*;

fn row(id: &str, parent: Option<&str>, key: &str) -> TreeRow {
    TreeRow {
        id: id.to_string(),
        parent_id: parent.map(str::to_string),
        order_key: key.to_string(),
        deleted: false,
    }
}

fn sample() -> BlockTree {
    // a ── b ── c
    //  └── d
    // e
    BlockTree::from_rows([
        row("c", Some("b"), "a0"),
        row("a", None, "a0"),
        row("b", Some("a"), "a0"),
        row("d", Some("a"), "a1"),
        row("e", None, "a1"),
    ])
}

#[test]
fn cycle_detection_follows_parent_chain() {
    let tree = sample();
    assert!(!tree.would_create_cycle("b", None));
    assert!(tree.would_create_cycle("b", Some("b")));
    assert!(tree.would_create_cycle("a", Some("c")));
    assert!(tree.would_create_cycle("b", Some("c")));
    assert!(!tree.would_create_cycle("c", Some("d")));
    assert!(!tree.would_create_cycle("a", Some("e")));
}

#[test]
fn deleted_blocks_still_count_for_cycles() {
    let mut tree = sample();
    tree.mark_deleted("b");
    assert!(tree.would_create_cycle("a", Some("c")));
}

#[test]
fn ancestors_are_parent_first() {
    let tree = sample();
    assert_eq!(tree.ancestors("c"), vec!["b".to_string(), "a".to_string()]);
    assert!(tree.ancestors("a").is_empty());
    assert!(tree.ancestors("missing").is_empty());
}

#[test]
fn descendants_cover_every_depth() {
    let tree = sample();
    let mut found = tree.descendants("a");
    found.sort();
    assert_eq!(found, vec!["b", "c", "d"]);
    assert!(tree.descendants("e").is_empty());
}

#[test]
fn height_counts_levels_below_a_block() {
    let mut tree = sample();
    assert_eq!(tree.height("a"), 2);
    assert_eq!(tree.height("b"), 1);
    assert_eq!(tree.height("c"), 0);
    assert_eq!(tree.height("missing"), 0);

    tree.mark_deleted("c");
    assert_eq!(tree.height("a"), 2);
    tree.relocate("c", Some("e"), "a0");
    assert_eq!(tree.height("a"), 1);
    assert_eq!(tree.height("e"), 1);
}

#[test]
fn sibling_keys_respect_parent_and_liveness() {
    let mut tree = sample();
    assert!(tree.sibling_key_taken(None, "a0", None));
    assert!(!tree.sibling_key_taken(None, "a0", Some("a")));
    assert!(tree.sibling_key_taken(Some("a"), "a1", None));
    assert!(!tree.sibling_key_taken(Some("b"), "a1", None));

    tree.mark_deleted("d");
    assert!(!tree.sibling_key_taken(Some("a"), "a1", None));
}

#[test]
fn relocate_moves_between_sibling_lists() {
    let mut tree = sample();
    assert!(tree.relocate("b", None, "b"));
    assert!(tree.sibling_key_taken(None, "b", None));
    assert!(!tree.sibling_key_taken(Some("a"), "a0", None));
    assert!(tree.ancestors("c") == vec!["b".to_string()]);
    assert!(!tree.would_create_cycle("a", Some("c")));
}

#[test]
fn insert_rejects_duplicate_ids() {
    let mut tree = sample();
    assert!(!tree.insert("a", None, "zz"));
    assert!(tree.insert("f", Some("e"), "a0"));
    assert_eq!(tree.ancestors("f"), vec!["e".to_string()]);
}

proptest! {
    #[test]
    fn cycle_iff_self_or_descendant(parents in prop::collection::vec(prop::option::of(0usize..64), 1..40), pick in (0usize..40, 0usize..40)) {
        // node i may only point at an earlier node, so the input is a forest
        let rows: Vec<TreeRow> = parents
            .iter()
            .copied()
            .enumerate()
            .map(|(i, parent)| {
                let parent = parent.filter(|_| i > 0).map(|p| format!("n{}", p % i));
                TreeRow {
                    id: format!("n{i}"),
                    parent_id: parent,
                    order_key: format!("k{i}"),
                    deleted: false,
                }
            })
            .collect();
        let tree = BlockTree::from_rows(rows);
        let b = format!("n{}", pick.0 % parents.len());
        let p = format!("n{}", pick.1 % parents.len());
        let expected = p == b || tree.descendants(&b).contains(&p);
        prop_assert_eq!(tree.would_create_cycle(&b, Some(&p)), expected);
        prop_assert!(!tree.would_create_cycle(&b, None));
    }
}
