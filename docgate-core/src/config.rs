//! Defaults used when a request leaves a query parameter out.
//!
//! [`QueryConfig`] can be built in code through [`QueryConfigBuilder`] or
//! deserialized from any serde format. Missing keys take their default value.
//!
//! ```ignore
//! use docgate::config::QueryConfig;
//!
//! let config: QueryConfig = serde_json::from_str(r#"{ "default_page_size": 20 }"#)?;
//! assert_eq!(config.default_page_size, 20);
//! ```

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{
    page::DEFAULT_PAGE_SIZE,
    query::{Projection, Sort},
};

/// Field sorted on when the request has no `sort` parameter.
pub const DEFAULT_SORT_FIELD: &str = "createdAt";

/// Internal version field hidden when the request has no `fields` parameter.
pub const VERSION_FIELD: &str = "__v";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Page size used when `limit` is absent or unusable. Must be positive.
    pub default_page_size: usize,
    /// Sort keys used when `sort` is absent.
    pub default_sort: Vec<Sort>,
    /// Fields excluded when `fields` is absent.
    pub default_excluded_fields: BTreeSet<String>,
}

impl QueryConfig {
    pub fn builder() -> QueryConfigBuilder {
        QueryConfigBuilder::default()
    }

    /// Page size to use, never zero.
    pub fn page_size(&self) -> usize {
        if self.default_page_size == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            self.default_page_size
        }
    }

    pub fn default_projection(&self) -> Projection {
        Projection::Exclude(self.default_excluded_fields.clone())
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            default_sort: vec![Sort::desc(DEFAULT_SORT_FIELD)],
            default_excluded_fields: BTreeSet::from([VERSION_FIELD.to_string()]),
        }
    }
}

/// Builder for [`QueryConfig`]. Unset values keep their defaults.
#[derive(Debug, Default)]
pub struct QueryConfigBuilder {
    config: QueryConfig,
}

impl QueryConfigBuilder {
    pub fn with_default_page_size(mut self, page_size: usize) -> Self {
        self.config.default_page_size = page_size;
        self
    }

    pub fn with_default_sort(mut self, sort: Vec<Sort>) -> Self {
        self.config.default_sort = sort;
        self
    }

    pub fn with_default_excluded_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.default_excluded_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn build(self) -> QueryConfig {
        self.config
    }
}
