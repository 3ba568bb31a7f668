//! Per-operation option structs.
//!
//! Every collection operation that accepts options takes `impl Into<Option<T>>`, so callers
//! pass either `None` or a configured struct. Missing options fall back to the struct's
//! `Default`, which carries the documented defaults (for example find-and-modify
//! operations return the modified document unless `return_original` is set).

use bson::Document;

use crate::fields::{FieldSpec, parse_fields, parse_sort};

/// Options for `find`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub projection: Option<Document>,
    pub sort: Option<Document>,
    pub limit: Option<i64>,
    pub skip: Option<u64>,
}

impl FindOptions {
    pub fn builder() -> FindOptionsBuilder {
        FindOptionsBuilder::default()
    }
}

/// Builder for [`FindOptions`]; accepts projection and sort as text specifications.
#[derive(Debug, Default)]
pub struct FindOptionsBuilder {
    options: FindOptions,
}

impl FindOptionsBuilder {
    /// Sets the projection, e.g. `"name -password"`.
    pub fn projection(mut self, fields: impl Into<FieldSpec>) -> Self {
        self.options.projection = non_empty(parse_fields(fields));
        self
    }

    /// Sets the sort order, e.g. `"-age name"`.
    pub fn sort(mut self, sort: impl Into<FieldSpec>) -> Self {
        self.options.sort = non_empty(parse_sort(sort));
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.options.limit = Some(limit);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.options.skip = Some(skip);
        self
    }

    pub fn build(self) -> FindOptions {
        self.options
    }
}

/// Options for `find_one` and `find_by_id`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOneOptions {
    pub projection: Option<Document>,
    pub sort: Option<Document>,
    pub skip: Option<u64>,
}

impl FindOneOptions {
    pub fn with_projection(mut self, fields: impl Into<FieldSpec>) -> Self {
        self.projection = non_empty(parse_fields(fields));
        self
    }

    pub fn with_sort(mut self, sort: impl Into<FieldSpec>) -> Self {
        self.sort = non_empty(parse_sort(sort));
        self
    }
}

/// Options for `find_one_and_update`, `find_one_and_replace` and `find_by_id_and_update`.
///
/// `return_original` defaults to `false`: the document as it is after the change is returned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOneAndModifyOptions {
    pub projection: Option<Document>,
    pub sort: Option<Document>,
    pub upsert: bool,
    pub return_original: bool,
}

impl FindOneAndModifyOptions {
    pub fn with_projection(mut self, fields: impl Into<FieldSpec>) -> Self {
        self.projection = non_empty(parse_fields(fields));
        self
    }

    pub fn with_sort(mut self, sort: impl Into<FieldSpec>) -> Self {
        self.sort = non_empty(parse_sort(sort));
        self
    }

    pub fn with_upsert(mut self, upsert: bool) -> Self {
        self.upsert = upsert;
        self
    }

    pub fn with_return_original(mut self, return_original: bool) -> Self {
        self.return_original = return_original;
        self
    }
}

/// Options for `find_one_and_delete` and `find_by_id_and_delete`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOneAndDeleteOptions {
    pub projection: Option<Document>,
    pub sort: Option<Document>,
}

impl FindOneAndDeleteOptions {
    pub fn with_sort(mut self, sort: impl Into<FieldSpec>) -> Self {
        self.sort = non_empty(parse_sort(sort));
        self
    }
}

/// Options for `update_one`, `update_many` and `replace_one`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOptions {
    pub upsert: bool,
}

impl UpdateOptions {
    pub fn upsert() -> Self {
        Self { upsert: true }
    }
}

/// Options for `count`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CountOptions {
    pub limit: Option<u64>,
    pub skip: Option<u64>,
}

/// Options for `aggregate`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateOptions {
    pub allow_disk_use: Option<bool>,
    pub batch_size: Option<u32>,
}

/// An index declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSpec {
    pub keys: Document,
    pub name: Option<String>,
    pub unique: bool,
}

impl IndexSpec {
    /// Creates an index over `keys`, e.g. `doc! { "username": 1 }` or `"username -created"`.
    pub fn new(keys: impl Into<FieldSpec>) -> Self {
        Self {
            keys: parse_sort(keys),
            name: None,
            unique: false,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// The explicit name, or the driver's default `field_direction` naming.
    pub fn resolved_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => self
                .keys
                .iter()
                .map(|(key, value)| format!("{key}_{value}"))
                .collect::<Vec<_>>()
                .join("_"),
        }
    }
}

fn non_empty(document: Document) -> Option<Document> {
    if document.is_empty() { None } else { Some(document) }
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;

    #[test]
    fn modify_defaults_return_new_document() {
        let options = FindOneAndModifyOptions::default();

        assert!(!options.return_original);
        assert!(!options.upsert);
    }

    #[test]
    fn builder_parses_text_specs() {
        let options = FindOptions::builder()
            .projection("name -secret")
            .sort("-age")
            .limit(10)
            .skip(20)
            .build();

        assert_eq!(options.projection, Some(doc! { "name": true, "secret": false }));
        assert_eq!(options.sort, Some(doc! { "age": -1 }));
        assert_eq!(options.limit, Some(10));
        assert_eq!(options.skip, Some(20));
    }

    #[test]
    fn empty_specs_are_dropped() {
        let options = FindOptions::builder().projection("").sort("").build();

        assert_eq!(options, FindOptions::default());
    }

    #[test]
    fn index_names() {
        assert_eq!(IndexSpec::new("username").resolved_name(), "username_1");
        assert_eq!(IndexSpec::new("a -b").resolved_name(), "a_1_b_-1");
        assert_eq!(IndexSpec::new("a").named("by_a").resolved_name(), "by_a");
    }
}
