#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateObjectRequest {
    pub type_id: String,
    pub title: String,
    #[serde(default)]
    pub properties: Option<Value>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetDocumentOptions {
    #[serde(default)]
    pub include_deleted: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOptions {
    #[serde(default)]
    pub object_id: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl SearchOptions {
    pub fn in_object(object_id: impl Into<String>) -> Self {
        Self {
            object_id: Some(object_id.into()),
            limit: None,
        }
    }
}
