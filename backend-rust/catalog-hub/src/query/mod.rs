//! Catalog filter translation.
//!
//! Raw query-string parameters are parsed into a [`ProductFilter`], which can
//! be evaluated in memory ([`ProductFilter::matches`]) or rendered as a SQL
//! `WHERE` fragment for the store ([`ProductFilter::to_sql`]). Both forms
//! AND together every supplied constraint; absent constraints match all.

use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

use crate::models::{Product, ValidationError};

/// Name of the SQLite scalar function the store registers for
/// case-insensitive substring matching.
pub const CONTAINS_FN: &str = "contains_ci";

/// Query string as received on `GET /api/products`. Values stay as text so
/// malformed numbers can be reported instead of silently ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductQuery {
    pub category: Option<String>,
    #[serde(rename = "minTHC")]
    pub min_thc: Option<String>,
    #[serde(rename = "maxTHC")]
    pub max_thc: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProductFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(rename = "minTHC", skip_serializing_if = "Option::is_none")]
    pub min_thc: Option<f64>,
    #[serde(rename = "maxTHC", skip_serializing_if = "Option::is_none")]
    pub max_thc: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

/// A `WHERE` clause with positional parameters (`?1`, `?2`, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct SqlPredicate {
    pub clause: String,
    pub params: Vec<Value>,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

fn parse_bound(name: &str, raw: Option<&str>) -> Result<Option<f64>, ValidationError> {
    let Some(raw) = non_blank(raw) else {
        return Ok(None);
    };
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(ValidationError(format!(
            "{} must be a number, got '{}'",
            name, raw
        ))),
    }
}

/// Case-insensitive substring test shared by the in-memory predicate and
/// the SQL function.
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

impl ProductFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the raw query. Blank parameters count as absent.
    pub fn from_query(query: &ProductQuery) -> Result<Self, ValidationError> {
        Ok(Self {
            category: non_blank(query.category.as_deref()).map(str::to_string),
            min_thc: parse_bound("minTHC", query.min_thc.as_deref())?,
            max_thc: parse_bound("maxTHC", query.max_thc.as_deref())?,
            search: non_blank(query.search.as_deref()).map(str::to_string),
        })
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        let category = category.into();
        self.category = non_blank(Some(&category)).map(str::to_string);
        self
    }

    pub fn min_thc(mut self, value: f64) -> Self {
        self.min_thc = Some(value);
        self
    }

    pub fn max_thc(mut self, value: f64) -> Self {
        self.max_thc = Some(value);
        self
    }

    pub fn search(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.search = non_blank(Some(&text)).map(str::to_string);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.category.is_none()
            && self.min_thc.is_none()
            && self.max_thc.is_none()
            && self.search.is_none()
    }

    pub fn matches(&self, product: &Product) -> bool {
        if let Some(category) = &self.category {
            if product.category.as_str() != category {
                return false;
            }
        }
        if let Some(min) = self.min_thc {
            if product.thc < min {
                return false;
            }
        }
        if let Some(max) = self.max_thc {
            if product.thc > max {
                return false;
            }
        }
        if let Some(search) = &self.search {
            if !contains_ignore_case(&product.name, search) {
                return false;
            }
        }
        true
    }

    /// Render against a products table aliased as `p`.
    pub fn to_sql(&self) -> SqlPredicate {
        let mut clauses = Vec::new();
        let mut params = Vec::new();

        if let Some(category) = &self.category {
            params.push(Value::Text(category.clone()));
            clauses.push(format!("p.category = ?{}", params.len()));
        }
        if let Some(min) = self.min_thc {
            params.push(Value::Real(min));
            clauses.push(format!("p.thc >= ?{}", params.len()));
        }
        if let Some(max) = self.max_thc {
            params.push(Value::Real(max));
            clauses.push(format!("p.thc <= ?{}", params.len()));
        }
        if let Some(search) = &self.search {
            params.push(Value::Text(search.clone()));
            clauses.push(format!("{}(p.name, ?{})", CONTAINS_FN, params.len()));
        }

        let clause = if clauses.is_empty() {
            "1 = 1".to_string()
        } else {
            clauses.join(" AND ")
        };

        SqlPredicate { clause, params }
    }
}
