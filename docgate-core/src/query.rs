//! Executable query representation and the visitor used by backends.
//!
//! A [`Query`] is the backend-facing form of a request: an optional filter
//! expression, an ordered list of sort keys, a projection and an offset/limit
//! window. It is usually produced by lowering a
//! [`QueryDescriptor`](crate::builder::QueryDescriptor), then mutated by the
//! pre-hooks of a [`HookPipeline`](crate::hook::HookPipeline) before a backend
//! executes it.
//!
//! ```ignore
//! use docgate::query::{Query, Filter, Sort};
//!
//! let query = Query::new()
//!     .with_filter(Filter::eq("difficulty", "easy"))
//!     .with_sort(vec![Sort::desc("price")])
//!     .with_limit(10);
//! ```
//!
//! Every step consumes and returns the query, so a query value is never shared
//! between two partially built requests.

use std::collections::BTreeSet;

use bson::{Bson, Document, Uuid};
use serde::{Deserialize, Serialize};

use crate::error::DocumentStoreError;

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

/// Sort specification for query results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    /// The field name to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

impl Sort {
    pub fn asc(field: impl Into<String>) -> Self {
        Self { field: field.into(), direction: SortDirection::Asc }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self { field: field.into(), direction: SortDirection::Desc }
    }
}

/// Field comparison operators for filter expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    /// Equal to (exact match).
    Eq,
    /// Not equal to. A missing field is never equal.
    Ne,
    /// Greater than.
    Gt,
    /// Greater than or equal to.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal to.
    Lte,
}

/// A filter expression for querying documents.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Logical AND of multiple expressions (all must match).
    And(Vec<Expr>),
    /// Field comparison expression.
    Field {
        /// The field name to compare.
        field: String,
        /// The comparison operator.
        op: FieldOp,
        /// The value to compare against.
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
    /// If this expression is already an AND, the other expression is appended
    /// to the list. Otherwise, a new AND expression is created.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut list) => {
                list.push(other);
                Expr::And(list)
            }
            _ => Expr::And(vec![self, other]),
        }
    }
}

/// Helper struct for constructing filter expressions.
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

    /// Combines multiple expressions such that all must match.
    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(exprs.into_iter().collect())
    }
}

/// Name of the identifier field every document carries.
pub const ID_FIELD: &str = "id";

/// The set of fields returned for each matching document.
///
/// A projection is either an inclusion set or an exclusion set, never both.
/// An inclusion always keeps [`ID_FIELD`]; only an exclusion can drop it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Projection {
    /// Only these fields are returned.
    Include(BTreeSet<String>),
    /// Every field except these is returned.
    Exclude(BTreeSet<String>),
}

impl Projection {
    pub fn include<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Projection::Include(fields.into_iter().map(Into::into).collect())
    }

    pub fn exclude<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Projection::Exclude(fields.into_iter().map(Into::into).collect())
    }

    /// Returns the field names named by this projection.
    pub fn fields(&self) -> &BTreeSet<String> {
        match self {
            Projection::Include(fields) | Projection::Exclude(fields) => fields,
        }
    }

    /// Applies this projection to a document, preserving field order.
    pub fn apply(&self, document: &Document) -> Document {
        document
            .iter()
            .filter(|(key, _)| match self {
                Projection::Include(fields) => *key == ID_FIELD || fields.contains(key.as_str()),
                Projection::Exclude(fields) => !fields.contains(key.as_str()),
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

/// A structured query for retrieving documents from a backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Restricts the query to documents with these IDs.
    pub ids: Option<Vec<Uuid>>,
    /// Optional filter expression to match documents.
    pub filter: Option<Expr>,
    /// Sort keys, applied in order. Empty means natural order.
    pub sort: Vec<Sort>,
    /// Fields to return. `None` returns whole documents.
    pub projection: Option<Projection>,
    /// Number of documents to skip (for pagination).
    pub offset: Option<usize>,
    /// Maximum number of documents to return.
    pub limit: Option<usize>,
}

impl Query {
    /// Creates a new empty query with no filters or limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query matching the single document with the given ID.
    pub fn by_id(id: Uuid) -> Self {
        Self { ids: Some(vec![id]), ..Self::default() }
    }

    /// Replaces the filter expression.
    pub fn with_filter(mut self, filter: Expr) -> Self {
        self.filter = Some(filter);
        self
    }

    /// ANDs an expression into the current filter.
    ///
    /// The caller-supplied filter is kept intact, so the added clause narrows
    /// the result set and can never widen it.
    pub fn and_filter(mut self, expr: Expr) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(expr),
            None => expr,
        });
        self
    }

    pub fn with_sort(mut self, sort: Vec<Sort>) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.projection = Some(projection);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Walks an [`Expr`] tree, producing a backend specific output.
pub trait QueryVisitor {
    type Output;
    type Error: Into<DocumentStoreError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;
    fn visit_field(
        &mut self,
        field: &str,
        op: &FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(exprs) => self.visit_and(exprs),
            Expr::Field { field, op, value } => self.visit_field(field, op, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;

    #[test]
    fn and_filter_keeps_existing_clause() {
        let query = Query::new()
            .with_filter(Filter::eq("secretTour", true))
            .and_filter(Filter::ne("secretTour", true));

        assert_eq!(
            query.filter,
            Some(Expr::And(vec![
                Filter::eq("secretTour", true),
                Filter::ne("secretTour", true),
            ]))
        );
    }

    #[test]
    fn and_filter_on_empty_query_sets_filter() {
        let query = Query::new().and_filter(Filter::gte("duration", 5));
        assert_eq!(query.filter, Some(Filter::gte("duration", 5)));
    }

    #[test]
    fn projection_apply_include_and_exclude() {
        let document = doc! { "name": "The Sea Explorer", "price": 497, "__v": 0 };

        let included = Projection::include(["name", "price"]).apply(&document);
        assert_eq!(included, doc! { "name": "The Sea Explorer", "price": 497 });

        let excluded = Projection::exclude(["__v"]).apply(&document);
        assert_eq!(excluded, doc! { "name": "The Sea Explorer", "price": 497 });
    }

    #[test]
    fn inclusion_keeps_the_id_and_exclusion_can_drop_it() {
        let document = doc! { "id": "a1", "name": "The Sea Explorer", "price": 497 };

        let included = Projection::include(["name"]).apply(&document);
        assert_eq!(included, doc! { "id": "a1", "name": "The Sea Explorer" });

        let excluded = Projection::exclude(["id"]).apply(&document);
        assert_eq!(excluded, doc! { "name": "The Sea Explorer", "price": 497 });
    }
}
