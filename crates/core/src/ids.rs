#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use std::fmt;

const MAX_ID_LEN: usize = 128;
const MAX_BLOCK_TYPE_LEN: usize = 64;

macro_rules! string_id {
    ($name:ident, $label:literal) => {
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }

            pub fn try_new(value: impl Into<String>) -> Result<Self, IdError> {
                let value = value.into();
                validate_id(&value).map_err(|kind| IdError {
                    field: $label,
                    kind,
                })?;
                Ok(Self(value))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(ObjectId, "objectId");
string_id!(BlockId, "blockId");
string_id!(TypeId, "typeId");

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdErrorKind {
    Empty,
    TooLong,
    Padded,
    ContainsControl,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IdError {
    pub field: &'static str,
    pub kind: IdErrorKind,
}

impl IdError {
    pub fn message(&self) -> String {
        let reason = match self.kind {
            IdErrorKind::Empty => "must not be empty",
            IdErrorKind::TooLong => "is too long",
            IdErrorKind::Padded => "must not have surrounding whitespace",
            IdErrorKind::ContainsControl => "contains control characters",
        };
        format!("{} {reason}", self.field)
    }
}

fn validate_id(value: &str) -> Result<(), IdErrorKind> {
    if value.trim().is_empty() {
        return Err(IdErrorKind::Empty);
    }
    if value.len() > MAX_ID_LEN {
        return Err(IdErrorKind::TooLong);
    }
    if value.trim() != value {
        return Err(IdErrorKind::Padded);
    }
    if value.chars().any(|c| c.is_control()) {
        return Err(IdErrorKind::ContainsControl);
    }
    Ok(())
}

/// Time-sortable opaque id (UUIDv7, hyphen-less).
pub fn generate_id() -> String {
    uuid::Uuid::now_v7().simple().to_string()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockTypeError {
    Empty,
    TooLong,
    InvalidChar { ch: char, index: usize },
}

impl BlockTypeError {
    pub fn message(&self) -> String {
        match self {
            Self::Empty => "blockType must not be empty".to_string(),
            Self::TooLong => "blockType is too long".to_string(),
            Self::InvalidChar { ch, index } => {
                format!("blockType has invalid char {ch:?} at {index}")
            }
        }
    }
}

/// Block type tags are lowercase ascii words, e.g. `paragraph`, `heading_2`, `code-block`.
pub fn validate_block_type(value: &str) -> Result<(), BlockTypeError> {
    if value.is_empty() {
        return Err(BlockTypeError::Empty);
    }
    if value.len() > MAX_BLOCK_TYPE_LEN {
        return Err(BlockTypeError::TooLong);
    }
    for (index, ch) in value.chars().enumerate() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() || matches!(ch, '_' | '-') {
            continue;
        }
        return Err(BlockTypeError::InvalidChar { ch, index });
    }
    Ok(())
}
