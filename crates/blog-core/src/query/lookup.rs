//! Fields, lookups and values that make up a single filter condition.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::PostStatus;
use crate::error::RepoError;

/// A filterable/orderable attribute of a post, including attributes reached
/// through the author relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PostField {
    Id,
    Title,
    Slug,
    Body,
    Publish,
    Created,
    Updated,
    Status,
    Author,
    AuthorUsername,
    AuthorEmail,
}

/// Storage type of a field, used to type-check conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Int,
    Text,
    Timestamp,
    Status,
    Uuid,
}

impl PostField {
    pub const ALL: [PostField; 11] = [
        PostField::Id,
        PostField::Title,
        PostField::Slug,
        PostField::Body,
        PostField::Publish,
        PostField::Created,
        PostField::Updated,
        PostField::Status,
        PostField::Author,
        PostField::AuthorUsername,
        PostField::AuthorEmail,
    ];

    /// Lookup path of the field (`author__username` for related fields).
    pub fn name(self) -> &'static str {
        match self {
            PostField::Id => "id",
            PostField::Title => "title",
            PostField::Slug => "slug",
            PostField::Body => "body",
            PostField::Publish => "publish",
            PostField::Created => "created",
            PostField::Updated => "updated",
            PostField::Status => "status",
            PostField::Author => "author",
            PostField::AuthorUsername => "author__username",
            PostField::AuthorEmail => "author__email",
        }
    }

    pub fn kind(self) -> FieldKind {
        match self {
            PostField::Id => FieldKind::Int,
            PostField::Title
            | PostField::Slug
            | PostField::Body
            | PostField::AuthorUsername
            | PostField::AuthorEmail => FieldKind::Text,
            PostField::Publish | PostField::Created | PostField::Updated => FieldKind::Timestamp,
            PostField::Status => FieldKind::Status,
            PostField::Author => FieldKind::Uuid,
        }
    }

    /// Whether evaluating this field requires the author relationship.
    pub fn is_related(self) -> bool {
        matches!(self, PostField::AuthorUsername | PostField::AuthorEmail)
    }
}

impl fmt::Display for PostField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Component extracted from a timestamp before comparing. Computed in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatePart {
    Date,
    Year,
    Month,
    Day,
    /// 1 = Sunday ... 7 = Saturday.
    WeekDay,
}

impl DatePart {
    pub fn name(self) -> &'static str {
        match self {
            DatePart::Date => "date",
            DatePart::Year => "year",
            DatePart::Month => "month",
            DatePart::Day => "day",
            DatePart::WeekDay => "week_day",
        }
    }
}

/// Comparison applied to an extracted date part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparison {
    Exact,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Range,
}

impl Comparison {
    pub fn name(self) -> &'static str {
        match self {
            Comparison::Exact => "exact",
            Comparison::Gt => "gt",
            Comparison::Gte => "gte",
            Comparison::Lt => "lt",
            Comparison::Lte => "lte",
            Comparison::In => "in",
            Comparison::Range => "range",
        }
    }
}

/// How a field is compared to a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lookup {
    Exact,
    IExact,
    Contains,
    IContains,
    StartsWith,
    IStartsWith,
    EndsWith,
    IEndsWith,
    Regex,
    IRegex,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
    /// Inclusive on both ends.
    Range,
    /// Value is a `Bool`: `true` matches missing values.
    IsNull,
    /// Compare a component of a timestamp field.
    Part(DatePart, Comparison),
}

impl Lookup {
    pub fn name(self) -> String {
        match self {
            Lookup::Exact => "exact".into(),
            Lookup::IExact => "iexact".into(),
            Lookup::Contains => "contains".into(),
            Lookup::IContains => "icontains".into(),
            Lookup::StartsWith => "startswith".into(),
            Lookup::IStartsWith => "istartswith".into(),
            Lookup::EndsWith => "endswith".into(),
            Lookup::IEndsWith => "iendswith".into(),
            Lookup::Regex => "regex".into(),
            Lookup::IRegex => "iregex".into(),
            Lookup::Gt => "gt".into(),
            Lookup::Gte => "gte".into(),
            Lookup::Lt => "lt".into(),
            Lookup::Lte => "lte".into(),
            Lookup::In => "in".into(),
            Lookup::NotIn => "not_in".into(),
            Lookup::Range => "range".into(),
            Lookup::IsNull => "isnull".into(),
            Lookup::Part(part, cmp) => format!("{}__{}", part.name(), cmp.name()),
        }
    }

    /// Whether the lookup only makes sense on text columns.
    pub fn is_textual(self) -> bool {
        matches!(
            self,
            Lookup::IExact
                | Lookup::Contains
                | Lookup::IContains
                | Lookup::StartsWith
                | Lookup::IStartsWith
                | Lookup::EndsWith
                | Lookup::IEndsWith
                | Lookup::Regex
                | Lookup::IRegex
        )
    }
}

/// A literal operand of a condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    Text(String),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Uuid(Uuid),
    Status(PostStatus),
    Bool(bool),
    List(Vec<Value>),
    Range(Box<Value>, Box<Value>),
}

impl Value {
    pub fn range(lo: impl Into<Value>, hi: impl Into<Value>) -> Self {
        Value::Range(Box::new(lo.into()), Box::new(hi.into()))
    }

    pub fn list<T: Into<Value>>(items: impl IntoIterator<Item = T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }

    fn is_scalar_of(&self, kind: ScalarKind) -> bool {
        matches!(
            (self, kind),
            (Value::Int(_), ScalarKind::Int)
                | (Value::Text(_), ScalarKind::Text)
                | (Value::Timestamp(_), ScalarKind::Timestamp)
                | (Value::Date(_), ScalarKind::Date)
                | (Value::Uuid(_), ScalarKind::Uuid)
                | (Value::Status(_), ScalarKind::Status)
        )
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Value::Uuid(v)
    }
}

impl From<PostStatus> for Value {
    fn from(v: PostStatus) -> Self {
        Value::Status(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScalarKind {
    Int,
    Text,
    Timestamp,
    Date,
    Uuid,
    Status,
}

impl From<FieldKind> for ScalarKind {
    fn from(kind: FieldKind) -> Self {
        match kind {
            FieldKind::Int => ScalarKind::Int,
            FieldKind::Text => ScalarKind::Text,
            FieldKind::Timestamp => ScalarKind::Timestamp,
            FieldKind::Status => ScalarKind::Status,
            FieldKind::Uuid => ScalarKind::Uuid,
        }
    }
}

/// One `field__lookup=value` test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub field: PostField,
    pub lookup: Lookup,
    pub value: Value,
}

impl Condition {
    pub fn new(field: PostField, lookup: Lookup, value: impl Into<Value>) -> Self {
        Self {
            field,
            lookup,
            value: value.into(),
        }
    }

    /// Type-check the lookup against the field and the value.
    pub fn validate(&self) -> Result<(), RepoError> {
        let kind = self.field.kind();

        let operand = match self.lookup {
            Lookup::IsNull => {
                return match self.value {
                    Value::Bool(_) => Ok(()),
                    _ => Err(self.mismatch("expects a boolean")),
                };
            }
            Lookup::Part(part, cmp) => {
                if kind != FieldKind::Timestamp {
                    return Err(self.mismatch("date parts only apply to timestamp fields"));
                }
                let scalar = if part == DatePart::Date {
                    ScalarKind::Date
                } else {
                    ScalarKind::Int
                };
                return self.check_shape(comparison_shape(cmp), scalar);
            }
            lookup if lookup.is_textual() => {
                if kind != FieldKind::Text {
                    return Err(self.mismatch("text lookups only apply to text fields"));
                }
                Shape::Scalar
            }
            Lookup::Gt | Lookup::Gte | Lookup::Lt | Lookup::Lte | Lookup::Range
                if kind == FieldKind::Uuid =>
            {
                return Err(self.mismatch("author ids are not ordered"));
            }
            Lookup::In | Lookup::NotIn => Shape::List,
            Lookup::Range => Shape::Range,
            _ => Shape::Scalar,
        };

        self.check_shape(operand, kind.into())
    }

    fn check_shape(&self, shape: Shape, scalar: ScalarKind) -> Result<(), RepoError> {
        let ok = match (&self.value, shape) {
            (v, Shape::Scalar) => v.is_scalar_of(scalar),
            (Value::List(items), Shape::List) => items.iter().all(|v| v.is_scalar_of(scalar)),
            (Value::Range(lo, hi), Shape::Range) => {
                lo.is_scalar_of(scalar) && hi.is_scalar_of(scalar)
            }
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            Err(self.mismatch(&format!("value {:?} has the wrong type", self.value)))
        }
    }

    fn mismatch(&self, reason: &str) -> RepoError {
        RepoError::InvalidQuery(format!(
            "{}__{}: {}",
            self.field.name(),
            self.lookup.name(),
            reason
        ))
    }
}

#[derive(Debug, Clone, Copy)]
enum Shape {
    Scalar,
    List,
    Range,
}

fn comparison_shape(cmp: Comparison) -> Shape {
    match cmp {
        Comparison::In => Shape::List,
        Comparison::Range => Shape::Range,
        _ => Shape::Scalar,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_conditions() {
        let cases = [
            Condition::new(PostField::Title, Lookup::IStartsWith, "Hello"),
            Condition::new(PostField::Id, Lookup::In, Value::list([1, 2, 3])),
            Condition::new(
                PostField::Publish,
                Lookup::Part(DatePart::Year, Comparison::Exact),
                2025,
            ),
            Condition::new(
                PostField::Publish,
                Lookup::Part(DatePart::Date, Comparison::Range),
                Value::range(
                    NaiveDate::from_ymd_opt(2025, 10, 30).unwrap(),
                    NaiveDate::from_ymd_opt(2025, 10, 31).unwrap(),
                ),
            ),
            Condition::new(PostField::Status, Lookup::Exact, PostStatus::Published),
            Condition::new(PostField::AuthorUsername, Lookup::IRegex, "^ann.*"),
            Condition::new(PostField::Id, Lookup::IsNull, false),
        ];
        for cond in cases {
            assert!(cond.validate().is_ok(), "{cond:?}");
        }
    }

    #[test]
    fn test_invalid_conditions() {
        let cases = [
            Condition::new(PostField::Id, Lookup::Contains, "1"),
            Condition::new(PostField::Title, Lookup::Exact, 5),
            Condition::new(
                PostField::Title,
                Lookup::Part(DatePart::Year, Comparison::Exact),
                2025,
            ),
            Condition::new(PostField::Author, Lookup::Gt, Uuid::nil()),
            Condition::new(PostField::Id, Lookup::Range, 5),
            Condition::new(PostField::Id, Lookup::IsNull, 1),
        ];
        for cond in cases {
            assert!(
                matches!(cond.validate(), Err(RepoError::InvalidQuery(_))),
                "{cond:?}"
            );
        }
    }
}
