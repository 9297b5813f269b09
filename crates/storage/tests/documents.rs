#![forbid(unsafe_code)]

mod common;

use bdoc_core::order_key::{compare, n_keys_between};
use bdoc_storage::{BlockNode, GetDocumentOptions, PatchRequest};
use common::{delete, fixture, insert, move_to, text};
use std::cmp::Ordering;

fn ids(nodes: &[BlockNode]) -> Vec<&str> {
    nodes.iter().map(|node| node.id.as_str()).collect()
}

fn assert_strictly_ordered(nodes: &[BlockNode]) {
    for pair in nodes.windows(2) {
        assert_eq!(
            compare(&pair[0].order_key, &pair[1].order_key),
            Ordering::Less,
            "{} must sort before {}",
            pair[0].order_key,
            pair[1].order_key
        );
    }
    for node in nodes {
        assert_strictly_ordered(&node.children);
    }
}

#[test]
fn siblings_come_back_sorted_by_order_key() {
    let mut fx = fixture();
    let page = fx.page("Sorted");
    let keys = n_keys_between(None, None, 4).expect("keys");

    // Inserted out of order on purpose.
    fx.store
        .apply_patch(PatchRequest::new(
            &page.id,
            vec![
                insert("d", None, &keys[3], text("d")),
                insert("b", None, &keys[1], text("b")),
                insert("a", None, &keys[0], text("a")),
                insert("c", None, &keys[2], text("c")),
                insert("b-2", Some("b"), "a1", text("b-2")),
                insert("b-1", Some("b"), "a0V", text("b-1")),
                insert("b-0", Some("b"), "Zz", text("b-0")),
            ],
        ))
        .expect("seed");

    let doc = fx
        .store
        .get_document(&page.id, GetDocumentOptions::default())
        .expect("document");
    assert_eq!(ids(&doc.blocks), vec!["a", "b", "c", "d"]);
    assert_eq!(ids(&doc.blocks[1].children), vec!["b-0", "b-1", "b-2"]);
    assert_strictly_ordered(&doc.blocks);
}

#[test]
fn moving_a_child_to_root_reorders_the_forest() {
    let mut fx = fixture();
    let page = fx.page("Move");
    fx.store
        .apply_patch(PatchRequest::new(
            &page.id,
            vec![
                insert("A", None, "a0", text("A")),
                insert("B", Some("A"), "a0", text("B")),
            ],
        ))
        .expect("seed");

    fx.store
        .apply_patch(PatchRequest::new(&page.id, vec![move_to("B", None, "b")]))
        .expect("move to root");

    let doc = fx
        .store
        .get_document(&page.id, GetDocumentOptions::default())
        .expect("document");
    assert_eq!(ids(&doc.blocks), vec!["A", "B"]);
    assert!(doc.blocks[0].children.is_empty());
    assert_eq!(doc.blocks[1].parent_block_id, None);
}

#[test]
fn subtree_delete_cascades_and_plain_delete_does_not() {
    let mut fx = fixture();
    let page = fx.page("Delete");
    fx.store
        .apply_patch(PatchRequest::new(
            &page.id,
            vec![
                insert("root", None, "a0", text("root")),
                insert("mid", Some("root"), "a0", text("mid")),
                insert("leaf", Some("mid"), "a0", text("leaf")),
                insert("solo", None, "a1", text("solo")),
                insert("solo-child", Some("solo"), "a0", text("solo child")),
            ],
        ))
        .expect("seed");

    let result = fx
        .store
        .apply_patch(PatchRequest::new(
            &page.id,
            vec![delete("root", true), delete("solo", false)],
        ))
        .expect("delete");
    assert_eq!(
        result.applied.deleted_block_ids,
        vec!["root", "mid", "leaf", "solo"]
    );

    let live = fx
        .store
        .get_document(&page.id, GetDocumentOptions::default())
        .expect("live document");
    // "solo-child" is still live but its parent is not, so no root reaches it.
    assert!(live.blocks.is_empty());

    let all = fx
        .store
        .get_document(
            &page.id,
            GetDocumentOptions {
                include_deleted: true,
            },
        )
        .expect("full document");
    for id in ["root", "mid", "leaf", "solo"] {
        let node = all.find(id).expect("present with deleted");
        assert!(node.deleted_at_ms.is_some(), "{id} should be deleted");
    }
    let orphan = all.find("solo-child").expect("solo-child");
    assert!(orphan.deleted_at_ms.is_none());
}

#[test]
fn deleting_twice_succeeds_and_keeps_first_timestamp() {
    let mut fx = fixture();
    let page = fx.page("Twice");
    fx.store
        .apply_patch(PatchRequest::new(
            &page.id,
            vec![
                insert("x", None, "a0", text("x")),
                insert("y", Some("x"), "a0", text("y")),
            ],
        ))
        .expect("seed");
    fx.store
        .apply_patch(PatchRequest::new(&page.id, vec![delete("y", false)]))
        .expect("first delete");

    let include_deleted = GetDocumentOptions {
        include_deleted: true,
    };
    let first_deleted_at = fx
        .store
        .get_document(&page.id, include_deleted)
        .expect("doc")
        .find("y")
        .expect("y")
        .deleted_at_ms;

    let result = fx
        .store
        .apply_patch(PatchRequest::new(&page.id, vec![delete("x", true)]))
        .expect("second delete");
    assert_eq!(result.applied.deleted_block_ids, vec!["x", "y"]);

    let again = fx
        .store
        .apply_patch(PatchRequest::new(&page.id, vec![delete("y", false)]))
        .expect("delete deleted block");
    assert_eq!(again.applied.deleted_block_ids, vec!["y"]);

    let doc = fx
        .store
        .get_document(&page.id, include_deleted)
        .expect("doc");
    assert_eq!(doc.find("y").expect("y").deleted_at_ms, first_deleted_at);
    assert_eq!(doc.doc_version, 4);
}

#[test]
fn missing_or_deleted_object_has_no_document() {
    let mut fx = fixture();
    let err = fx
        .store
        .get_document("absent", GetDocumentOptions::default())
        .expect_err("absent");
    assert_eq!(err.code(), "NOT_FOUND_OBJECT");

    let page = fx.page("Gone");
    fx.store.delete_object(&page.id).expect("delete");
    let err = fx
        .store
        .get_document(
            &page.id,
            GetDocumentOptions {
                include_deleted: true,
            },
        )
        .expect_err("deleted object");
    assert_eq!(err.code(), "NOT_FOUND_OBJECT");
    assert!(fx.store.get_object(&page.id).expect("get").is_none());
}

#[test]
fn chain_at_depth_limit_reads_back() {
    let mut fx = fixture();
    let page = fx.page("Deep");
    let max_depth = fx.store.config().max_tree_depth;

    let chain: Vec<String> = (0..max_depth).map(|level| format!("lvl{level}")).collect();
    let ops = chain
        .iter()
        .enumerate()
        .map(|(level, id)| {
            let parent = level.checked_sub(1).map(|above| chain[above].as_str());
            insert(id, parent, "a0", text(id))
        })
        .collect();
    fx.store
        .apply_patch(PatchRequest::new(&page.id, ops))
        .expect("chain at limit");

    let doc = fx
        .store
        .get_document(&page.id, GetDocumentOptions::default())
        .expect("document");
    assert_eq!(doc.iter().count(), max_depth);
    let mut level = 0;
    let mut nodes = doc.blocks.as_slice();
    while let [node] = nodes {
        assert_eq!(node.id, chain[level]);
        nodes = node.children.as_slice();
        level += 1;
    }
    assert!(nodes.is_empty());
    assert_eq!(level, max_depth);

    let err = fx
        .store
        .apply_patch(PatchRequest::new(
            &page.id,
            vec![insert("too-deep", chain.last().map(String::as_str), "a0", text("x"))],
        ))
        .expect_err("past the limit");
    assert_eq!(err.code(), "VALIDATION");
}
