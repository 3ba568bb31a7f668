//! Paged find requests and results.
//!
//! A [`PageRequest`] describes one window of a filtered, sorted result set. The collection
//! answers it with a [`Page`] holding the window's data plus navigation metadata, which
//! serializes as:
//!
//! ```json
//! {
//!   "data": [...],
//!   "pages": { "current": 1, "prev": 0, "hasPrev": false, "next": 2, "hasNext": true, "total": 2 },
//!   "items": { "limit": 2, "begin": 1, "end": 2, "total": 3 }
//! }
//! ```

use bson::Document;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ModelError, ModelResult},
    fields::{FieldSpec, parse_fields, parse_sort},
    options::{CountOptions, FindOptions},
};

/// A single page of results plus navigation metadata.
///
/// # Type Parameters
///
/// * `T` - The type of items contained in this page
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// The documents in this window, in sort order.
    pub data: Vec<T>,
    pub pages: Pages,
    pub items: Items,
}

/// Page navigation metadata.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Pages {
    pub current: i64,
    pub prev: i64,
    /// `prev != 0`. On page 1 this is `false`; for pages below 1 it is `true`.
    pub has_prev: bool,
    pub next: i64,
    pub has_next: bool,
    /// Number of pages, `ceil(items.total / limit)`.
    pub total: i64,
}

/// Item range metadata. `begin` and `end` are 1-based and never exceed `total`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Items {
    pub limit: i64,
    pub begin: i64,
    pub end: i64,
    pub total: i64,
}

impl<T> Page<T> {
    /// Builds a page from a fetched window and the total number of matching documents.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let request = PageRequest::new(doc! {}).with_limit(2).with_page(1);
    /// let page = Page::assemble(vec!["Ren", "Stimpy"], 3, &request);
    ///
    /// assert_eq!(page.pages.total, 2);
    /// assert!(page.pages.has_next);
    /// assert_eq!((page.items.begin, page.items.end), (1, 2));
    /// ```
    pub fn assemble(data: Vec<T>, total_matching: u64, request: &PageRequest) -> Self {
        let limit = request.limit;
        let current = request.page;
        let total = i64::try_from(total_matching).unwrap_or(i64::MAX);

        let total_pages = if limit > 0 {
            total / limit + i64::from(total % limit != 0)
        } else {
            0
        };

        let next = current.saturating_add(1);
        let prev = current.saturating_sub(1);

        Page {
            data,
            pages: Pages {
                current,
                prev,
                has_prev: prev != 0,
                next,
                has_next: next <= total_pages,
                total: total_pages,
            },
            items: Items {
                limit,
                begin: current
                    .saturating_mul(limit)
                    .saturating_sub(limit)
                    .saturating_add(1)
                    .min(total),
                end: current.saturating_mul(limit).min(total),
                total,
            },
        }
    }

    /// Converts every item of the page, keeping its metadata.
    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<Page<U>, E> {
        Ok(Page {
            data: self.data.into_iter().map(f).collect::<Result<Vec<_>, _>>()?,
            pages: self.pages,
            items: self.items,
        })
    }
}

/// Parameters of a paged find.
///
/// Pages are 1-based. `limit` must be positive.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest {
    pub filter: Document,
    pub fields: FieldSpec,
    pub sort: FieldSpec,
    pub limit: i64,
    pub page: i64,
}

impl PageRequest {
    /// Creates a request for the first page of 20 items matching `filter`.
    pub fn new(filter: Document) -> Self {
        Self {
            filter,
            fields: FieldSpec::None,
            sort: FieldSpec::None,
            limit: 20,
            page: 1,
        }
    }

    pub fn with_fields(mut self, fields: impl Into<FieldSpec>) -> Self {
        self.fields = fields.into();
        self
    }

    pub fn with_sort(mut self, sort: impl Into<FieldSpec>) -> Self {
        self.sort = sort.into();
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_page(mut self, page: i64) -> Self {
        self.page = page;
        self
    }

    /// Number of documents to skip, `(page - 1) * limit`, floored at zero.
    pub fn skip(&self) -> u64 {
        u64::try_from(self.page.saturating_sub(1).saturating_mul(self.limit)).unwrap_or(0)
    }

    /// Checks the request and derives the count and find calls it needs.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidArgument`] when `limit` is not positive.
    pub(crate) fn plan(&self) -> ModelResult<(CountOptions, FindOptions)> {
        if self.limit <= 0 {
            return Err(ModelError::InvalidArgument(format!(
                "page limit must be positive, got {}",
                self.limit
            )));
        }

        let projection = parse_fields(self.fields.clone());
        let sort = parse_sort(self.sort.clone());

        Ok((
            CountOptions::default(),
            FindOptions {
                projection: (!projection.is_empty()).then_some(projection),
                sort: (!sort.is_empty()).then_some(sort),
                limit: Some(self.limit),
                skip: Some(self.skip()),
            },
        ))
    }
}
