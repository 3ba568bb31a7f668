//! Driver result types returned by write and find-and-modify operations.

use bson::{Bson, Document};

/// Result of `insert_one`. `ops` holds the stored document, `_id` included.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertOneResult {
    pub inserted_id: Bson,
    pub ops: Vec<Document>,
}

/// Result of `insert_many`. `ops` holds the stored documents in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertManyResult {
    pub inserted_ids: Vec<Bson>,
    pub ops: Vec<Document>,
}

impl InsertManyResult {
    pub fn inserted_count(&self) -> usize {
        self.inserted_ids.len()
    }
}

/// Result of `update_one`, `update_many` and `replace_one`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateResult {
    pub matched_count: u64,
    pub modified_count: u64,
    pub upserted_id: Option<Bson>,
}

/// Result of `delete_one` and `delete_many`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteResult {
    pub deleted_count: u64,
}

/// Result of the find-and-modify family. `value` is `None` when nothing matched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModifyResult {
    pub value: Option<Document>,
}

impl From<Option<Document>> for ModifyResult {
    fn from(value: Option<Document>) -> Self {
        Self { value }
    }
}
