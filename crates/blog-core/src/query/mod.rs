//! Query model for the post store.
//!
//! A [`PostQuery`] is a filter tree plus ordering and a slice window. Stores
//! translate it into their own representation; nothing here touches storage.

mod lookup;
mod parse;
mod q;

pub use lookup::{Comparison, Condition, DatePart, FieldKind, Lookup, PostField, Value};
pub use parse::parse_timestamp;
pub use q::Q;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::RepoError;

/// Sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderBy {
    Asc(PostField),
    Desc(PostField),
    Random,
}

impl OrderBy {
    pub fn field(self) -> Option<PostField> {
        match self {
            OrderBy::Asc(field) | OrderBy::Desc(field) => Some(field),
            OrderBy::Random => None,
        }
    }
}

/// Granularity of a date bucket, as used by date drill-down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DateKind {
    Year,
    Month,
    Day,
}

impl DateKind {
    pub fn name(self) -> &'static str {
        match self {
            DateKind::Year => "year",
            DateKind::Month => "month",
            DateKind::Day => "day",
        }
    }

    /// First day of the bucket containing `date`.
    pub fn truncate(self, date: NaiveDate) -> NaiveDate {
        match self {
            DateKind::Year => date.with_ordinal(1),
            DateKind::Month => date.with_day(1),
            DateKind::Day => Some(date),
        }
        .unwrap_or(date)
    }
}

/// Default ordering: newest `publish` first.
pub const DEFAULT_ORDERING: [OrderBy; 1] = [OrderBy::Desc(PostField::Publish)];

/// A filterable, orderable, sliceable selection of posts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostQuery {
    pub filter: Q,
    pub ordering: Vec<OrderBy>,
    pub offset: u64,
    pub limit: Option<u64>,
}

impl PostQuery {
    /// Every post, in default order.
    pub fn all() -> Self {
        Self::default()
    }

    /// Keep posts matching `q` (AND with existing filters).
    pub fn filter(mut self, q: Q) -> Self {
        self.filter = std::mem::take(&mut self.filter) & q;
        self
    }

    /// Drop posts matching `q`.
    pub fn exclude(mut self, q: Q) -> Self {
        self.filter = std::mem::take(&mut self.filter) & !q;
        self
    }

    /// Replace the ordering.
    pub fn order_by(mut self, ordering: impl IntoIterator<Item = OrderBy>) -> Self {
        self.ordering = ordering.into_iter().collect();
        self
    }

    /// Narrow the window to `[offset, offset + limit)` of the current window.
    /// `limit = None` runs to the end.
    pub fn slice(mut self, offset: u64, limit: Option<u64>) -> Self {
        let limit = match self.limit {
            None => limit,
            Some(current) => {
                let remaining = current.saturating_sub(offset);
                Some(limit.map_or(remaining, |l| l.min(remaining)))
            }
        };
        self.offset += offset;
        self.limit = limit;
        self
    }

    pub fn limit(self, limit: u64) -> Self {
        self.slice(0, Some(limit))
    }

    pub fn first(self) -> Self {
        self.limit(1)
    }

    /// Same filter, no window.
    pub fn unsliced(&self) -> Self {
        Self {
            filter: self.filter.clone(),
            ordering: self.ordering.clone(),
            offset: 0,
            limit: None,
        }
    }

    pub fn is_sliced(&self) -> bool {
        self.offset > 0 || self.limit.is_some()
    }

    /// The ordering stores must apply.
    pub fn effective_ordering(&self) -> &[OrderBy] {
        if self.ordering.is_empty() {
            &DEFAULT_ORDERING[..]
        } else {
            self.ordering.as_slice()
        }
    }

    /// Whether executing the query needs the author relationship.
    pub fn uses_related(&self) -> bool {
        self.filter.uses_related()
            || self
                .effective_ordering()
                .iter()
                .filter_map(|o| o.field())
                .any(PostField::is_related)
    }

    pub fn validate(&self) -> Result<(), RepoError> {
        self.filter.validate()
    }

    /// Build a query from `key=value` pairs.
    ///
    /// `ordering`, `offset` and `limit` are reserved; every other key is a
    /// `field__lookup` filter. Keys prefixed with `!` are exclusions.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self, RepoError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut query = PostQuery::all();
        let mut offset = 0;
        let mut limit = None;

        for (key, value) in pairs {
            match key {
                "ordering" => {
                    let ordering = value
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(parse::parse_ordering)
                        .collect::<Result<Vec<_>, _>>()?;
                    query = query.order_by(ordering);
                }
                "offset" => offset = parse::parse_count(key, value)?,
                "limit" => limit = Some(parse::parse_count(key, value)?),
                _ => {
                    if let Some(key) = key.strip_prefix('!') {
                        query = query.exclude(parse::parse_pair(key, value)?);
                    } else {
                        query = query.filter(parse::parse_pair(key, value)?);
                    }
                }
            }
        }

        Ok(query.slice(offset, limit))
    }
}

impl Q {
    /// Parse a `field__lookup=value` pair such as `title__istartswith=Hello`.
    pub fn parse_pair(key: &str, value: &str) -> Result<Q, RepoError> {
        parse::parse_pair(key, value)
    }
}

impl OrderBy {
    /// Parse `field`, `-field` or `?`.
    pub fn parse(key: &str) -> Result<OrderBy, RepoError> {
        parse::parse_ordering(key)
    }
}
