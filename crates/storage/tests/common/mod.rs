#![forbid(unsafe_code)]
#![allow(dead_code)]

use bdoc_storage::{CreateObjectRequest, ObjectRow, PatchOp, SqliteStore, StoreConfig};
use serde_json::{Value, json};
use tempfile::TempDir;

pub struct Fixture {
    pub store: SqliteStore,
    pub page_type: String,
    pub home_type: String,
    _dir: TempDir,
}

pub fn fixture() -> Fixture {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let dir = tempfile::tempdir().expect("temp dir");
    let mut store = SqliteStore::open(StoreConfig::new(dir.path())).expect("open store");
    let page_type = store.create_object_type("page", "Page").expect("page type").id;
    let home_type = store.create_object_type("home", "Home").expect("home type").id;
    Fixture {
        store,
        page_type,
        home_type,
        _dir: dir,
    }
}

impl Fixture {
    pub fn page(&mut self, title: &str) -> ObjectRow {
        self.store
            .create_object(CreateObjectRequest {
                type_id: self.page_type.clone(),
                title: title.to_string(),
                properties: None,
            })
            .expect("create page")
    }
}

pub fn text(value: &str) -> Value {
    json!({"inline": [{"type": "text", "text": value}]})
}

pub fn insert(block_id: &str, parent: Option<&str>, order_key: &str, content: Value) -> PatchOp {
    PatchOp::Insert {
        block_id: block_id.to_string(),
        parent_block_id: parent.map(str::to_string),
        block_type: "paragraph".to_string(),
        content,
        order_key: order_key.to_string(),
        meta: None,
    }
}

pub fn update_content(block_id: &str, content: Value) -> PatchOp {
    PatchOp::Update {
        block_id: block_id.to_string(),
        content: Some(content),
        meta: None,
    }
}

pub fn move_to(block_id: &str, parent: Option<&str>, order_key: &str) -> PatchOp {
    PatchOp::Move {
        block_id: block_id.to_string(),
        new_parent_block_id: parent.map(str::to_string),
        new_order_key: order_key.to_string(),
    }
}

pub fn delete(block_id: &str, subtree: bool) -> PatchOp {
    PatchOp::Delete {
        block_id: block_id.to_string(),
        subtree,
    }
}
