//! Filter construction for model queries.
//!
//! Filters passed to collection operations are plain BSON documents in MongoDB query
//! syntax. This module offers a typed way to build them:
//!
//! ```ignore
//! use mongo_models::query::{Query, Filter};
//!
//! let query = Query::builder()
//!     .filter(Filter::eq("role", "admin").and(Filter::gte("age", 18)))
//!     .projection("name -password")
//!     .sort("-age")
//!     .limit(10)
//!     .build();
//! ```
//!
//! # Filter Expression API
//!
//! - Comparison: `eq`, `ne`, `gt`, `gte`, `lt`, `lte`
//! - Membership: `any_of`, `none_of`
//! - Existence: `exists`, `not_exists`
//! - Logical: `and`, `or`, plus [`Expr::not`]
//!
//! Expressions are compiled with a [`QueryVisitor`]; [`FilterCompiler`] produces the
//! MongoDB filter document.

use bson::{Bson, Document, doc};

use crate::{
    error::{ModelError, ModelResult},
    fields::{FieldSpec, parse_fields, parse_sort},
    options::FindOptions,
};

/// Field comparison operators for filter expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Field equals any of the given values.
    AnyOf,
    /// Field equals none of the given values.
    NoneOf,
}

impl FieldOp {
    fn operator(&self) -> &'static str {
        match self {
            FieldOp::Eq => "$eq",
            FieldOp::Ne => "$ne",
            FieldOp::Gt => "$gt",
            FieldOp::Gte => "$gte",
            FieldOp::Lt => "$lt",
            FieldOp::Lte => "$lte",
            FieldOp::AnyOf => "$in",
            FieldOp::NoneOf => "$nin",
        }
    }
}

/// A filter expression for querying documents.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// All expressions must match.
    And(Vec<Expr>),
    /// Any expression must match.
    Or(Vec<Expr>),
    /// Inverts the result.
    Not(Box<Expr>),
    /// Checks if a field exists or doesn't exist.
    Exists(String, bool),
    /// Field comparison expression.
    Field {
        field: String,
        op: FieldOp,
        value: Bson,
    },
}

impl Expr {
    /// Creates a field comparison expression.
    pub fn field(field: String, op: FieldOp, value: Bson) -> Self {
        Expr::Field { field, op, value }
    }

    /// Combines this expression with another using logical AND.
    ///
    /// If this expression is already an AND, the other expression is appended.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut list) => {
                list.push(other);
                Expr::And(list)
            }
            _ => Expr::And(vec![self, other]),
        }
    }

    /// Combines this expression with another using logical OR.
    ///
    /// If this expression is already an OR, the other expression is appended.
    pub fn or(self, other: Expr) -> Self {
        match self {
            Expr::Or(mut list) => {
                list.push(other);
                Expr::Or(list)
            }
            _ => Expr::Or(vec![self, other]),
        }
    }

    /// Negates this expression.
    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }

    /// Compiles the expression into a MongoDB filter document.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidArgument`] when a membership operator is given a
    /// non-array value.
    pub fn to_document(&self) -> ModelResult<Document> {
        FilterCompiler.visit_expr(self)
    }
}

/// Helper for constructing filter expressions.
///
/// ```ignore
/// let expr = Filter::eq("name", "Ren").and(Filter::gt("age", 3));
/// ```
pub struct Filter;

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Eq, value.into())
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Ne, value.into())
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gt, value.into())
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Gte, value.into())
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lt, value.into())
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
        Expr::field(field.into(), FieldOp::Lte, value.into())
    }

    /// Matches documents where the field equals any of `values`.
    pub fn any_of(field: impl Into<String>, values: impl IntoIterator<Item = impl Into<Bson>>) -> Expr {
        Expr::field(field.into(), FieldOp::AnyOf, collect_array(values))
    }

    /// Matches documents where the field equals none of `values`.
    pub fn none_of(field: impl Into<String>, values: impl IntoIterator<Item = impl Into<Bson>>) -> Expr {
        Expr::field(field.into(), FieldOp::NoneOf, collect_array(values))
    }

    pub fn exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), true)
    }

    pub fn not_exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), false)
    }

    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(exprs.into_iter().collect())
    }

    pub fn or(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Or(exprs.into_iter().collect())
    }
}

fn collect_array(values: impl IntoIterator<Item = impl Into<Bson>>) -> Bson {
    Bson::Array(values.into_iter().map(Into::into).collect())
}

/// A find query: filter, projection, sort and window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filter: Option<Expr>,
    pub projection: Option<Document>,
    pub sort: Option<Document>,
    pub limit: Option<i64>,
    pub skip: Option<u64>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }

    /// Splits the query into the filter document and find options.
    ///
    /// # Errors
    ///
    /// Fails if the filter expression does not compile.
    pub fn into_parts(self) -> ModelResult<(Document, FindOptions)> {
        let filter = match &self.filter {
            Some(expr) => expr.to_document()?,
            None => Document::new(),
        };

        Ok((
            filter,
            FindOptions {
                projection: self.projection,
                sort: self.sort,
                limit: self.limit,
                skip: self.skip,
            },
        ))
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    pub fn new() -> Self {
        QueryBuilder {
            query: Query::default(),
        }
    }

    pub fn filter(mut self, filter: Expr) -> Self {
        self.query.filter = Some(filter);
        self
    }

    /// Sets the projection from a field specification such as `"name -password"`.
    pub fn projection(mut self, fields: impl Into<FieldSpec>) -> Self {
        let fields = parse_fields(fields);
        self.query.projection = (!fields.is_empty()).then_some(fields);
        self
    }

    /// Sets the sort order from a specification such as `"-age name"`.
    pub fn sort(mut self, sort: impl Into<FieldSpec>) -> Self {
        let sort = parse_sort(sort);
        self.query.sort = (!sort.is_empty()).then_some(sort);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.query.limit = Some(limit);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.query.skip = Some(skip);
        self
    }

    pub fn build(self) -> Query {
        self.query
    }
}

pub trait QueryVisitor {
    type Output;
    type Error: Into<ModelError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error>;
    fn visit_exists(
        &mut self,
        field: &str,
        should_exist: bool,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_field(
        &mut self,
        field: &str,
        op: &FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Or(exprs) => self.visit_or(exprs),
            Expr::Not(expr) => self.visit_not(expr),
            Expr::Exists(field, should_exist) => self.visit_exists(field, *should_exist),
            Expr::Field { field, op, value } => self.visit_field(field, op, value),
        }
    }
}

/// Compiles expressions into MongoDB filter documents.
pub struct FilterCompiler;

impl QueryVisitor for FilterCompiler {
    type Output = Document;
    type Error = ModelError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$and": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$or": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    // `$not` only applies to field operators; a whole expression is negated with `$nor`
    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$nor": [self.visit_expr(expr)?],
        })
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: { "$exists": should_exist },
        })
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        if matches!(op, FieldOp::AnyOf | FieldOp::NoneOf) && !matches!(value, Bson::Array(_)) {
            return Err(ModelError::InvalidArgument(format!(
                "{} on {field} requires an array value",
                op.operator()
            )));
        }

        Ok(doc! {
            field: { op.operator(): value.clone() },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_comparisons() {
        let filter = Filter::eq("name", "Ren").and(Filter::gte("age", 3));

        assert_eq!(
            filter.to_document().unwrap(),
            doc! { "$and": [{ "name": { "$eq": "Ren" } }, { "age": { "$gte": 3 } }] }
        );
    }

    #[test]
    fn compiles_membership_and_existence() {
        let filter = Filter::or([
            Filter::any_of("role", ["admin", "owner"]),
            Filter::not_exists("role.special"),
        ]);

        assert_eq!(
            filter.to_document().unwrap(),
            doc! { "$or": [
                { "role": { "$in": ["admin", "owner"] } },
                { "role.special": { "$exists": false } },
            ] }
        );
    }

    #[test]
    fn negation_uses_nor() {
        assert_eq!(
            Filter::eq("name", "Yak").not().to_document().unwrap(),
            doc! { "$nor": [{ "name": { "$eq": "Yak" } }] }
        );
    }

    #[test]
    fn membership_requires_array() {
        let expr = Expr::field("role".into(), FieldOp::AnyOf, Bson::String("admin".into()));

        assert!(matches!(expr.to_document(), Err(ModelError::InvalidArgument(_))));
    }

    #[test]
    fn query_into_parts() {
        let (filter, options) = Query::builder()
            .filter(Filter::eq("name", "Ren"))
            .projection("name")
            .sort("-name")
            .limit(2)
            .skip(4)
            .build()
            .into_parts()
            .unwrap();

        assert_eq!(filter, doc! { "name": { "$eq": "Ren" } });
        assert_eq!(options.projection, Some(doc! { "name": true }));
        assert_eq!(options.sort, Some(doc! { "name": -1 }));
        assert_eq!(options.limit, Some(2));
        assert_eq!(options.skip, Some(4));
    }
}
