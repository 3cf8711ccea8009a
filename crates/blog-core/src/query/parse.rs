//! Parsing of `field__lookup=value` keys.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use super::OrderBy;
use super::lookup::{Comparison, DatePart, FieldKind, Lookup, PostField, Value};
use super::q::Q;
use crate::domain::PostStatus;
use crate::error::RepoError;

pub(super) fn parse_pair(key: &str, raw: &str) -> Result<Q, RepoError> {
    let segments: Vec<&str> = key.split("__").collect();
    let (field, rest) = parse_field(&segments)?;

    let (part, rest) = match rest.split_first() {
        Some((segment, tail)) => match parse_date_part(segment) {
            Some(part) => (Some(part), tail),
            None => (None, rest),
        },
        None => (None, rest),
    };
    // `date__year` reads the year of the UTC date, which is the year itself.
    let (part, rest) = match (part, rest.split_first()) {
        (Some(DatePart::Date), Some((segment, tail))) => match parse_date_part(segment) {
            Some(inner) if inner != DatePart::Date => (Some(inner), tail),
            _ => (part, rest),
        },
        _ => (part, rest),
    };

    let lookup_name = match rest {
        [] => "exact",
        [name] => *name,
        _ => return Err(invalid(format!("unsupported lookup path '{key}'"))),
    };

    let lookup = match part {
        Some(part) => {
            if field.kind() != FieldKind::Timestamp {
                return Err(invalid(format!("'{}' is not a date field", field.name())));
            }
            Lookup::Part(part, parse_comparison(lookup_name)?)
        }
        None => parse_lookup(lookup_name)?,
    };

    let value = parse_value(field, lookup, raw)?;
    let q = Q::new(field, lookup, value);
    q.validate()?;
    Ok(q)
}

pub(super) fn parse_ordering(key: &str) -> Result<OrderBy, RepoError> {
    if key == "?" {
        return Ok(OrderBy::Random);
    }
    let (descending, name) = match key.strip_prefix('-') {
        Some(name) => (true, name),
        None => (false, key),
    };
    let segments: Vec<&str> = name.split("__").collect();
    let (field, rest) = parse_field(&segments)?;
    if !rest.is_empty() {
        return Err(invalid(format!("cannot order by '{key}'")));
    }
    Ok(if descending {
        OrderBy::Desc(field)
    } else {
        OrderBy::Asc(field)
    })
}

pub(super) fn parse_count(key: &str, raw: &str) -> Result<u64, RepoError> {
    raw.trim().parse().map_err(|_| {
        invalid(format!(
            "'{key}' must be a non-negative integer, got '{raw}'"
        ))
    })
}

/// Parse an RFC 3339 timestamp, or a bare `YYYY-MM-DD` date as midnight UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn parse_field<'a, 'b>(segments: &'b [&'a str]) -> Result<(PostField, &'b [&'a str]), RepoError> {
    let Some((head, tail)) = segments.split_first() else {
        return Err(invalid("empty field name".to_string()));
    };
    let field = match *head {
        "id" | "pk" => PostField::Id,
        "title" => PostField::Title,
        "slug" => PostField::Slug,
        "body" => PostField::Body,
        "publish" => PostField::Publish,
        "created" => PostField::Created,
        "updated" => PostField::Updated,
        "status" => PostField::Status,
        "author_id" => PostField::Author,
        "author" => {
            return Ok(match tail.split_first() {
                Some((&"id", rest)) => (PostField::Author, rest),
                Some((&"username", rest)) => (PostField::AuthorUsername, rest),
                Some((&"email", rest)) => (PostField::AuthorEmail, rest),
                _ => (PostField::Author, tail),
            });
        }
        other => return Err(invalid(format!("unknown field '{other}'"))),
    };
    Ok((field, tail))
}

fn parse_date_part(segment: &str) -> Option<DatePart> {
    match segment {
        "date" => Some(DatePart::Date),
        "year" => Some(DatePart::Year),
        "month" => Some(DatePart::Month),
        "day" => Some(DatePart::Day),
        "week_day" => Some(DatePart::WeekDay),
        _ => None,
    }
}

fn parse_comparison(name: &str) -> Result<Comparison, RepoError> {
    Ok(match name {
        "exact" => Comparison::Exact,
        "gt" => Comparison::Gt,
        "gte" => Comparison::Gte,
        "lt" => Comparison::Lt,
        "lte" => Comparison::Lte,
        "in" => Comparison::In,
        "range" => Comparison::Range,
        other => return Err(invalid(format!("unsupported date lookup '{other}'"))),
    })
}

fn parse_lookup(name: &str) -> Result<Lookup, RepoError> {
    Ok(match name {
        "exact" => Lookup::Exact,
        "iexact" => Lookup::IExact,
        "contains" => Lookup::Contains,
        "icontains" => Lookup::IContains,
        "startswith" => Lookup::StartsWith,
        "istartswith" => Lookup::IStartsWith,
        "endswith" => Lookup::EndsWith,
        "iendswith" => Lookup::IEndsWith,
        "regex" => Lookup::Regex,
        "iregex" => Lookup::IRegex,
        "gt" => Lookup::Gt,
        "gte" => Lookup::Gte,
        "lt" => Lookup::Lt,
        "lte" => Lookup::Lte,
        "in" => Lookup::In,
        "not_in" => Lookup::NotIn,
        "range" => Lookup::Range,
        "isnull" => Lookup::IsNull,
        other => return Err(invalid(format!("unknown lookup '{other}'"))),
    })
}

fn parse_value(field: PostField, lookup: Lookup, raw: &str) -> Result<Value, RepoError> {
    let scalar = |s: &str| -> Result<Value, RepoError> {
        match lookup {
            Lookup::Part(DatePart::Date, _) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map(Value::Date)
                .map_err(|_| invalid(format!("invalid date '{s}'"))),
            Lookup::Part(_, _) => s
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| invalid(format!("invalid number '{s}'"))),
            _ => parse_scalar(field, s),
        }
    };

    match lookup {
        Lookup::IsNull => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(Value::Bool(true)),
            "false" | "0" => Ok(Value::Bool(false)),
            other => Err(invalid(format!("isnull expects true/false, got '{other}'"))),
        },
        Lookup::In | Lookup::NotIn | Lookup::Part(_, Comparison::In) => raw
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(scalar)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        Lookup::Range | Lookup::Part(_, Comparison::Range) => {
            let bounds: Vec<&str> = raw.split(',').collect();
            match bounds.as_slice() {
                [lo, hi] => Ok(Value::Range(Box::new(scalar(*lo)?), Box::new(scalar(*hi)?))),
                _ => Err(invalid(format!("range expects 'low,high', got '{raw}'"))),
            }
        }
        _ => scalar(raw),
    }
}

fn parse_scalar(field: PostField, raw: &str) -> Result<Value, RepoError> {
    match field.kind() {
        FieldKind::Int => raw
            .trim()
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| invalid(format!("invalid number '{raw}' for {field}"))),
        FieldKind::Text => Ok(Value::Text(raw.to_string())),
        FieldKind::Timestamp => parse_timestamp(raw)
            .map(Value::Timestamp)
            .ok_or_else(|| invalid(format!("invalid timestamp '{raw}' for {field}"))),
        FieldKind::Status => Ok(Value::Status(raw.parse::<PostStatus>()?)),
        FieldKind::Uuid => Uuid::parse_str(raw.trim())
            .map(Value::Uuid)
            .map_err(|_| invalid(format!("invalid id '{raw}' for {field}"))),
    }
}

fn invalid(message: String) -> RepoError {
    RepoError::InvalidQuery(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Condition;

    fn condition(q: Q) -> Condition {
        match q {
            Q::Condition(cond) => cond,
            other => panic!("expected a condition, got {other:?}"),
        }
    }

    #[test]
    fn test_default_lookup_is_exact() {
        let cond = condition(parse_pair("id", "1").unwrap());
        assert_eq!(cond.field, PostField::Id);
        assert_eq!(cond.lookup, Lookup::Exact);
        assert_eq!(cond.value, Value::Int(1));
    }

    #[test]
    fn test_text_and_related_lookups() {
        let cond = condition(parse_pair("title__istartswith", "Hello").unwrap());
        assert_eq!(cond.lookup, Lookup::IStartsWith);

        let cond = condition(parse_pair("author__username__icontains", "ann").unwrap());
        assert_eq!(cond.field, PostField::AuthorUsername);
        assert_eq!(cond.lookup, Lookup::IContains);

        let cond = condition(parse_pair("author__username", "ann").unwrap());
        assert_eq!(cond.field, PostField::AuthorUsername);
        assert_eq!(cond.lookup, Lookup::Exact);
    }

    #[test]
    fn test_date_lookups() {
        let cond = condition(parse_pair("publish__year", "2025").unwrap());
        assert_eq!(cond.lookup, Lookup::Part(DatePart::Year, Comparison::Exact));
        assert_eq!(cond.value, Value::Int(2025));

        let cond = condition(parse_pair("publish__date__gte", "2025-10-30").unwrap());
        assert_eq!(cond.lookup, Lookup::Part(DatePart::Date, Comparison::Gte));
        assert_eq!(
            cond.value,
            Value::Date(NaiveDate::from_ymd_opt(2025, 10, 30).unwrap())
        );

        let cond = condition(parse_pair("publish__date__range", "2025-10-30,2025-10-31").unwrap());
        assert!(matches!(cond.value, Value::Range(_, _)));

        let cond = condition(parse_pair("created__gt", "2025-01-01T00:00:00Z").unwrap());
        assert!(matches!(cond.value, Value::Timestamp(_)));
    }

    #[test]
    fn test_parts_of_the_date_match_parts_of_the_timestamp() {
        for (key, part) in [
            ("publish__date__year", DatePart::Year),
            ("publish__date__month", DatePart::Month),
            ("publish__date__day", DatePart::Day),
            ("publish__date__week_day", DatePart::WeekDay),
        ] {
            let cond = condition(parse_pair(key, "5").unwrap());
            assert_eq!(cond.lookup, Lookup::Part(part, Comparison::Exact), "{key}");
            assert_eq!(cond.value, Value::Int(5));
        }

        let cond = condition(parse_pair("created__date__year__gte", "2024").unwrap());
        assert_eq!(cond.lookup, Lookup::Part(DatePart::Year, Comparison::Gte));
        assert!(parse_pair("publish__date__date", "2025-01-01").is_err());
    }

    #[test]
    fn test_list_and_null_lookups() {
        let cond = condition(parse_pair("id__in", "1,2,3").unwrap());
        assert_eq!(cond.value, Value::list([1, 2, 3]));

        let cond = condition(parse_pair("id__isnull", "false").unwrap());
        assert_eq!(cond.value, Value::Bool(false));
    }

    #[test]
    fn test_status_values_are_checked() {
        let cond = condition(parse_pair("status", "Published").unwrap());
        assert_eq!(cond.value, Value::Status(PostStatus::Published));
        assert!(matches!(
            parse_pair("status", "XX"),
            Err(RepoError::Invalid(_))
        ));
    }

    #[test]
    fn test_rejects_unknown_paths() {
        assert!(matches!(
            parse_pair("rating", "5"),
            Err(RepoError::InvalidQuery(_))
        ));
        assert!(matches!(
            parse_pair("title__soundslike", "x"),
            Err(RepoError::InvalidQuery(_))
        ));
        assert!(matches!(
            parse_pair("title__year", "2025"),
            Err(RepoError::InvalidQuery(_))
        ));
        assert!(matches!(
            parse_pair("id", "abc"),
            Err(RepoError::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_parse_ordering() {
        assert_eq!(
            parse_ordering("-publish").unwrap(),
            OrderBy::Desc(PostField::Publish)
        );
        assert_eq!(
            parse_ordering("author__username").unwrap(),
            OrderBy::Asc(PostField::AuthorUsername)
        );
        assert_eq!(parse_ordering("?").unwrap(), OrderBy::Random);
        assert!(parse_ordering("title__icontains").is_err());
    }
}
