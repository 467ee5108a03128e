//! Translation of raw client parameters into a query descriptor.
//!
//! [`QueryBuilder::build`] folds four independent steps (filter, sort,
//! projection, pagination) over an immutable [`QueryDescriptor`]. Each step
//! takes a descriptor by value and returns a new one, so the same parameters
//! always translate to the same descriptor.
//!
//! Only the filter and projection steps can fail. Everything else degrades to
//! the configured defaults.
//!
//! ```ignore
//! use docgate::{builder::QueryBuilder, params::QueryParams};
//!
//! let params = QueryParams::parse("difficulty=easy&duration[gte]=5&sort=-price&limit=2");
//! let descriptor = QueryBuilder::default().build(&params)?;
//! let query = descriptor.into_query();
//! ```

use std::{collections::BTreeMap, str::FromStr};

use bson::{Bson, DateTime};
use chrono::NaiveDate;

use crate::{
    config::QueryConfig,
    error::{DocumentStoreError, DocumentStoreResult},
    page::Pagination,
    params::{FIELDS, LIMIT, PAGE, QueryParams, RESERVED, SORT},
    query::{Expr, FieldOp, Projection, Query, Sort},
};

/// Range operators accepted in `field[op]=value` parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOp {
    Gte,
    Gt,
    Lte,
    Lt,
}

impl FromStr for RangeOp {
    type Err = DocumentStoreError;

    fn from_str(op: &str) -> Result<Self, Self::Err> {
        match op {
            "gte" => Ok(RangeOp::Gte),
            "gt" => Ok(RangeOp::Gt),
            "lte" => Ok(RangeOp::Lte),
            "lt" => Ok(RangeOp::Lt),
            other => Err(DocumentStoreError::InvalidFilterOperator(other.to_string())),
        }
    }
}

impl From<RangeOp> for FieldOp {
    fn from(op: RangeOp) -> Self {
        match op {
            RangeOp::Gte => FieldOp::Gte,
            RangeOp::Gt => FieldOp::Gt,
            RangeOp::Lte => FieldOp::Lte,
            RangeOp::Lt => FieldOp::Lt,
        }
    }
}

/// Every comparison requested for a single field.
///
/// Equality is last-wins; ranges accumulate. All of them are ANDed together
/// when the descriptor is lowered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldFilter {
    pub eq: Option<Bson>,
    pub ranges: Vec<(RangeOp, Bson)>,
}

impl FieldFilter {
    fn to_exprs(&self, field: &str) -> impl Iterator<Item = Expr> + '_ {
        let field = field.to_string();

        self.eq
            .iter()
            .map(|value| (FieldOp::Eq, value))
            .chain(
                self.ranges
                    .iter()
                    .map(|(op, value)| (FieldOp::from(*op), value)),
            )
            .map(move |(op, value)| Expr::field(field.clone(), op, value.clone()))
    }
}

/// Filter fields keyed by name.
pub type FilterMap = BTreeMap<String, FieldFilter>;

/// Intermediate representation of a not yet executed list query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDescriptor {
    pub filter: FilterMap,
    pub sort: Vec<Sort>,
    pub projection: Projection,
    pub pagination: Pagination,
}

impl QueryDescriptor {
    fn empty() -> Self {
        Self {
            filter: FilterMap::new(),
            sort: Vec::new(),
            projection: Projection::Exclude(Default::default()),
            pagination: Pagination::default(),
        }
    }

    /// Lowers the filter map into a single expression, or `None` when empty.
    pub fn filter_expr(&self) -> Option<Expr> {
        let mut exprs = self
            .filter
            .iter()
            .flat_map(|(field, filter)| filter.to_exprs(field))
            .collect::<Vec<_>>();

        match exprs.len() {
            0 => None,
            1 => exprs.pop(),
            _ => Some(Expr::And(exprs)),
        }
    }

    /// Converts this descriptor into an executable [`Query`].
    pub fn into_query(self) -> Query {
        let filter = self.filter_expr();

        Query {
            ids: None,
            filter,
            sort: self.sort,
            projection: Some(self.projection),
            offset: Some(self.pagination.offset()),
            limit: Some(self.pagination.page_size),
        }
    }
}

type Step = fn(&QueryBuilder, QueryDescriptor, &QueryParams) -> DocumentStoreResult<QueryDescriptor>;

/// Stateless translator from [`QueryParams`] to [`QueryDescriptor`].
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    config: QueryConfig,
}

impl QueryBuilder {
    const STEPS: [Step; 4] = [
        QueryBuilder::filter_step,
        QueryBuilder::sort_step,
        QueryBuilder::projection_step,
        QueryBuilder::pagination_step,
    ];

    pub fn new(config: QueryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Runs every translation step over `params`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidFilterOperator`] or
    /// [`DocumentStoreError::InvalidProjection`]; nothing else is rejected.
    pub fn build(&self, params: &QueryParams) -> DocumentStoreResult<QueryDescriptor> {
        Self::STEPS
            .iter()
            .try_fold(QueryDescriptor::empty(), |descriptor, step| step(self, descriptor, params))
    }

    /// Collects every non-reserved parameter into a filter map.
    pub fn parse_filter(&self, params: &QueryParams) -> DocumentStoreResult<FilterMap> {
        params
            .iter()
            .try_fold(FilterMap::new(), |mut filter, (key, raw)| {
                let (field, op) = split_key(key)?;
                if RESERVED.contains(&field) {
                    return Ok(filter);
                }

                let entry = filter.entry(field.to_string()).or_default();
                match op {
                    Some(op) => entry.ranges.push((op, coerce_value(raw))),
                    None => entry.eq = Some(coerce_value(raw)),
                }

                Ok(filter)
            })
    }

    /// Parses `sort=a,-b` into ascending `a` then descending `b`.
    pub fn parse_sort(&self, params: &QueryParams) -> Vec<Sort> {
        let keys = params
            .get(SORT)
            .map(|raw| {
                tokens(raw)
                    .map(|token| match token.strip_prefix('-') {
                        Some(field) => Sort::desc(field),
                        None => Sort::asc(token),
                    })
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        if keys.is_empty() {
            self.config.default_sort.clone()
        } else {
            keys
        }
    }

    /// Parses `fields=a,b` (inclusion) or `fields=-a,-b` (exclusion).
    pub fn parse_projection(&self, params: &QueryParams) -> DocumentStoreResult<Projection> {
        let Some(raw) = params.get(FIELDS) else {
            return Ok(self.config.default_projection());
        };

        let (excluded, included): (Vec<&str>, Vec<&str>) = tokens(raw).partition(|t| t.starts_with('-'));

        match (excluded.is_empty(), included.is_empty()) {
            (true, true) => Ok(self.config.default_projection()),
            (true, false) => Ok(Projection::include(included)),
            (false, true) => Ok(Projection::exclude(
                excluded
                    .into_iter()
                    .map(|field| field.trim_start_matches('-')),
            )),
            (false, false) => Err(DocumentStoreError::InvalidProjection(format!(
                "cannot mix included and excluded fields in `{raw}`"
            ))),
        }
    }

    /// Reads `page` and `limit`, falling back to defaults on anything unusable.
    pub fn parse_pagination(&self, params: &QueryParams) -> Pagination {
        Pagination::new(
            params
                .get(PAGE)
                .and_then(parse_positive)
                .unwrap_or(1),
            params
                .get(LIMIT)
                .and_then(parse_positive)
                .unwrap_or(self.config.page_size()),
        )
    }

    fn filter_step(&self, descriptor: QueryDescriptor, params: &QueryParams) -> DocumentStoreResult<QueryDescriptor> {
        Ok(QueryDescriptor { filter: self.parse_filter(params)?, ..descriptor })
    }

    fn sort_step(&self, descriptor: QueryDescriptor, params: &QueryParams) -> DocumentStoreResult<QueryDescriptor> {
        Ok(QueryDescriptor { sort: self.parse_sort(params), ..descriptor })
    }

    fn projection_step(&self, descriptor: QueryDescriptor, params: &QueryParams) -> DocumentStoreResult<QueryDescriptor> {
        Ok(QueryDescriptor { projection: self.parse_projection(params)?, ..descriptor })
    }

    fn pagination_step(&self, descriptor: QueryDescriptor, params: &QueryParams) -> DocumentStoreResult<QueryDescriptor> {
        Ok(QueryDescriptor { pagination: self.parse_pagination(params), ..descriptor })
    }
}

/// A canned rewrite of the reserved parameters, applied before translation.
///
/// Caller-supplied filter parameters are left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preset {
    pub limit: Option<usize>,
    pub sort: Option<&'static str>,
    pub fields: Option<&'static str>,
}

impl Preset {
    /// A "top results" view: fixed page size, sort and projection.
    pub const fn top_n(limit: usize, sort: &'static str, fields: &'static str) -> Self {
        Self { limit: Some(limit), sort: Some(sort), fields: Some(fields) }
    }

    pub fn apply(&self, params: QueryParams) -> QueryParams {
        let params = match self.limit {
            Some(limit) => params.set(LIMIT, limit.to_string()),
            None => params,
        };
        let params = match self.sort {
            Some(sort) => params.set(SORT, sort),
            None => params,
        };
        match self.fields {
            Some(fields) => params.set(FIELDS, fields),
            None => params,
        }
    }
}

fn tokens(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty() && *token != "-")
}

fn split_key(key: &str) -> DocumentStoreResult<(&str, Option<RangeOp>)> {
    let invalid = || DocumentStoreError::InvalidFilterOperator(key.to_string());

    let (field, op) = match key.split_once('[') {
        Some((field, rest)) => (field, Some(rest.strip_suffix(']').ok_or_else(invalid)?)),
        None if key.contains(']') => return Err(invalid()),
        None => (key, None),
    };

    if field.is_empty() || field.starts_with('$') {
        return Err(invalid());
    }

    Ok((field, op.map(RangeOp::from_str).transpose()?))
}

fn parse_positive(raw: &str) -> Option<usize> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|n| *n > 0)
        .and_then(|n| usize::try_from(n).ok())
}

/// Interprets a raw parameter value as the most specific BSON scalar.
///
/// The value is trimmed first. Coercion does not know the field's type, so a
/// numeric-looking value such as `name=2021` becomes an `Int64` and will not
/// match a string field.
pub fn coerce_value(raw: &str) -> Bson {
    let trimmed = raw.trim();

    if let Ok(value) = trimmed.parse::<bool>() {
        return Bson::Boolean(value);
    }
    if let Ok(value) = trimmed.parse::<i64>() {
        return Bson::Int64(value);
    }
    if let Ok(value) = trimmed.parse::<f64>() {
        if value.is_finite() {
            return Bson::Double(value);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Bson::DateTime(DateTime::from_chrono(midnight.and_utc()));
        }
    }
    if let Ok(instant) = chrono::DateTime::parse_from_rfc3339(trimmed) {
        return Bson::DateTime(DateTime::from_chrono(instant));
    }

    Bson::String(trimmed.to_string())
}
