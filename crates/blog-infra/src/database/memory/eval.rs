//! Evaluation of the query model against in-memory rows.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use regex::{Regex, RegexBuilder};
use uuid::Uuid;

use blog_core::domain::{Post, PostStatus, User};
use blog_core::error::RepoError;
use blog_core::query::{Comparison, Condition, DatePart, Lookup, OrderBy, PostField, Q, Value};

/// A post joined with its author.
#[derive(Debug, Clone, Copy)]
pub(super) struct Row<'a> {
    pub post: &'a Post,
    pub author: Option<&'a User>,
}

#[derive(Debug, Clone, Copy)]
enum Cell<'a> {
    Int(i64),
    Text(&'a str),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Status(PostStatus),
    Uuid(Uuid),
}

impl<'a> Row<'a> {
    fn cell(&self, field: PostField) -> Option<Cell<'a>> {
        let post = self.post;
        Some(match field {
            PostField::Id => Cell::Int(post.id),
            PostField::Title => Cell::Text(&post.title),
            PostField::Slug => Cell::Text(&post.slug),
            PostField::Body => Cell::Text(&post.body),
            PostField::Publish => Cell::Timestamp(post.publish),
            PostField::Created => Cell::Timestamp(post.created),
            PostField::Updated => Cell::Timestamp(post.updated),
            PostField::Status => Cell::Status(post.status),
            PostField::Author => Cell::Uuid(post.author_id),
            PostField::AuthorUsername => Cell::Text(&self.author?.username),
            PostField::AuthorEmail => Cell::Text(&self.author?.email),
        })
    }
}

/// Compiled form of a filter tree.
pub(super) struct Matcher<'q> {
    filter: &'q Q,
    regexes: HashMap<(String, bool), Regex>,
}

impl<'q> Matcher<'q> {
    /// Type-check `filter` and compile its regular expressions.
    pub fn new(filter: &'q Q) -> Result<Self, RepoError> {
        filter.validate()?;
        let mut regexes = HashMap::new();
        collect_regexes(filter, &mut regexes)?;
        Ok(Self { filter, regexes })
    }

    pub fn matches(&self, row: &Row<'_>) -> bool {
        self.filter.eval(&mut |cond| self.test(cond, row))
    }

    fn test(&self, cond: &Condition, row: &Row<'_>) -> bool {
        let cell = row.cell(cond.field);

        if cond.lookup == Lookup::IsNull {
            return matches!(cond.value, Value::Bool(want) if want == cell.is_none());
        }
        let Some(cell) = cell else {
            return false;
        };

        match (cond.lookup, cell, &cond.value) {
            (Lookup::Part(part, cmp), Cell::Timestamp(ts), value) => {
                compare_with(&extract(ts, part), cmp, value)
            }
            (Lookup::Regex | Lookup::IRegex, Cell::Text(text), Value::Text(pattern)) => {
                let insensitive = cond.lookup == Lookup::IRegex;
                self.regexes
                    .get(&(pattern.clone(), insensitive))
                    .is_some_and(|re| re.is_match(text))
            }
            (lookup, Cell::Text(text), Value::Text(pattern)) if lookup.is_textual() => {
                match_text(lookup, text, pattern)
            }
            (Lookup::NotIn, cell, value) => !compare_with(&cell, Comparison::In, value),
            (lookup, cell, value) => match comparison(lookup) {
                Some(cmp) => compare_with(&cell, cmp, value),
                None => false,
            },
        }
    }
}

fn collect_regexes(q: &Q, out: &mut HashMap<(String, bool), Regex>) -> Result<(), RepoError> {
    match q {
        Q::All => Ok(()),
        Q::Condition(cond) => {
            let insensitive = match cond.lookup {
                Lookup::Regex => false,
                Lookup::IRegex => true,
                _ => return Ok(()),
            };
            if let Value::Text(pattern) = &cond.value {
                let key = (pattern.clone(), insensitive);
                if !out.contains_key(&key) {
                    let re = RegexBuilder::new(pattern)
                        .case_insensitive(insensitive)
                        .build()
                        .map_err(|e| RepoError::InvalidQuery(format!("invalid regex: {e}")))?;
                    out.insert(key, re);
                }
            }
            Ok(())
        }
        Q::And(parts) | Q::Or(parts) | Q::Xor(parts) => {
            parts.iter().try_for_each(|q| collect_regexes(q, out))
        }
        Q::Not(inner) => collect_regexes(inner, out),
    }
}

fn comparison(lookup: Lookup) -> Option<Comparison> {
    Some(match lookup {
        Lookup::Exact => Comparison::Exact,
        Lookup::Gt => Comparison::Gt,
        Lookup::Gte => Comparison::Gte,
        Lookup::Lt => Comparison::Lt,
        Lookup::Lte => Comparison::Lte,
        Lookup::In => Comparison::In,
        Lookup::Range => Comparison::Range,
        _ => return None,
    })
}

fn extract(ts: DateTime<Utc>, part: DatePart) -> Cell<'static> {
    match part {
        DatePart::Date => Cell::Date(ts.date_naive()),
        DatePart::Year => Cell::Int(ts.year().into()),
        DatePart::Month => Cell::Int(ts.month().into()),
        DatePart::Day => Cell::Int(ts.day().into()),
        DatePart::WeekDay => Cell::Int(i64::from(ts.weekday().num_days_from_sunday()) + 1),
    }
}

fn match_text(lookup: Lookup, text: &str, pattern: &str) -> bool {
    match lookup {
        Lookup::IExact => text.to_lowercase() == pattern.to_lowercase(),
        Lookup::Contains => text.contains(pattern),
        Lookup::IContains => text.to_lowercase().contains(&pattern.to_lowercase()),
        Lookup::StartsWith => text.starts_with(pattern),
        Lookup::IStartsWith => text.to_lowercase().starts_with(&pattern.to_lowercase()),
        Lookup::EndsWith => text.ends_with(pattern),
        Lookup::IEndsWith => text.to_lowercase().ends_with(&pattern.to_lowercase()),
        _ => false,
    }
}

fn compare(cell: &Cell<'_>, value: &Value) -> Option<Ordering> {
    match (cell, value) {
        (Cell::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Cell::Text(a), Value::Text(b)) => Some((*a).cmp(b.as_str())),
        (Cell::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
        (Cell::Date(a), Value::Date(b)) => Some(a.cmp(b)),
        (Cell::Status(a), Value::Status(b)) => Some(a.code().cmp(b.code())),
        (Cell::Uuid(a), Value::Uuid(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn compare_with(cell: &Cell<'_>, cmp: Comparison, value: &Value) -> bool {
    use Ordering::{Equal, Greater, Less};

    match (cmp, value) {
        (Comparison::In, Value::List(items)) => {
            items.iter().any(|v| compare(cell, v) == Some(Equal))
        }
        (Comparison::Range, Value::Range(lo, hi)) => {
            matches!(compare(cell, lo), Some(Greater | Equal))
                && matches!(compare(cell, hi), Some(Less | Equal))
        }
        (Comparison::Exact, v) => compare(cell, v) == Some(Equal),
        (Comparison::Gt, v) => compare(cell, v) == Some(Greater),
        (Comparison::Gte, v) => matches!(compare(cell, v), Some(Greater | Equal)),
        (Comparison::Lt, v) => compare(cell, v) == Some(Less),
        (Comparison::Lte, v) => matches!(compare(cell, v), Some(Less | Equal)),
        _ => false,
    }
}

fn cmp_cells(a: Option<Cell<'_>>, b: Option<Cell<'_>>) -> Ordering {
    match (a, b) {
        (Some(Cell::Int(a)), Some(Cell::Int(b))) => a.cmp(&b),
        (Some(Cell::Text(a)), Some(Cell::Text(b))) => a.cmp(b),
        (Some(Cell::Timestamp(a)), Some(Cell::Timestamp(b))) => a.cmp(&b),
        (Some(Cell::Date(a)), Some(Cell::Date(b))) => a.cmp(&b),
        (Some(Cell::Status(a)), Some(Cell::Status(b))) => a.code().cmp(b.code()),
        (Some(Cell::Uuid(a)), Some(Cell::Uuid(b))) => a.cmp(&b),
        // Missing values sort last, as in PostgreSQL's default ascending order.
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

/// Sort `rows` by `ordering`. `keys` carries one random key per row for
/// `OrderBy::Random`.
pub(super) fn sort_rows(rows: &mut [(Row<'_>, u64)], ordering: &[OrderBy]) {
    rows.sort_by(|(a, ka), (b, kb)| {
        ordering
            .iter()
            .map(|order| match *order {
                OrderBy::Asc(field) => cmp_cells(a.cell(field), b.cell(field)),
                OrderBy::Desc(field) => cmp_cells(b.cell(field), a.cell(field)),
                OrderBy::Random => ka.cmp(kb),
            })
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use blog_core::domain::NewPost;
    use chrono::TimeZone;

    fn fixture() -> (Post, User) {
        let author = User::new("tassawer.hussain", "t@example.com");
        let at = Utc.with_ymd_and_hms(2025, 10, 30, 8, 0, 0).unwrap();
        let post = NewPost::new(author.id, "Hello World", "hello-world", "This is a test post")
            .with_status(PostStatus::Published)
            .into_post(1, at);
        (post, author)
    }

    fn check(q: Q) -> bool {
        let (post, author) = fixture();
        let row = Row {
            post: &post,
            author: Some(&author),
        };
        Matcher::new(&q).unwrap().matches(&row)
    }

    #[test]
    fn test_text_lookups() {
        assert!(check(Q::new(PostField::Title, Lookup::Exact, "Hello World")));
        assert!(check(Q::new(PostField::Title, Lookup::IExact, "hello world")));
        assert!(check(Q::new(PostField::Title, Lookup::Contains, "lo Wo")));
        assert!(!check(Q::new(PostField::Title, Lookup::Contains, "hello")));
        assert!(check(Q::new(PostField::Title, Lookup::IContains, "HELLO")));
        assert!(check(Q::new(PostField::Title, Lookup::EndsWith, "World")));
        assert!(check(Q::new(PostField::Title, Lookup::IEndsWith, "world")));
        assert!(check(Q::new(PostField::Title, Lookup::IRegex, "^hello.*world$")));
        assert!(!check(Q::new(PostField::Title, Lookup::Regex, "^hello")));
    }

    #[test]
    fn test_date_parts() {
        let part = |p, v: i64| {
            Q::new(PostField::Publish, Lookup::Part(p, Comparison::Exact), v)
        };
        assert!(check(part(DatePart::Year, 2025)));
        assert!(check(part(DatePart::Month, 10)));
        assert!(check(part(DatePart::Day, 30)));
        // 2025-10-30 is a Thursday.
        assert!(check(part(DatePart::WeekDay, 5)));
        assert!(check(Q::new(
            PostField::Publish,
            Lookup::Part(DatePart::Date, Comparison::Range),
            Value::range(
                NaiveDate::from_ymd_opt(2025, 10, 30).unwrap(),
                NaiveDate::from_ymd_opt(2025, 10, 31).unwrap()
            )
        )));
        assert!(!check(Q::new(
            PostField::Publish,
            Lookup::Part(DatePart::Date, Comparison::Gt),
            NaiveDate::from_ymd_opt(2025, 10, 30).unwrap()
        )));
    }

    #[test]
    fn test_comparisons_and_sets() {
        assert!(check(Q::new(PostField::Id, Lookup::Gte, 1)));
        assert!(!check(Q::new(PostField::Id, Lookup::Gt, 1)));
        assert!(check(Q::new(PostField::Id, Lookup::In, Value::list([1, 2, 3]))));
        assert!(!check(Q::new(PostField::Id, Lookup::NotIn, Value::list([1, 2, 3]))));
        assert!(check(Q::new(PostField::Id, Lookup::IsNull, false)));
        assert!(check(Q::exact(PostField::Status, PostStatus::Published)));
    }

    #[test]
    fn test_related_lookups() {
        assert!(check(Q::new(
            PostField::AuthorUsername,
            Lookup::IStartsWith,
            "TASSAWER"
        )));
        assert!(check(Q::new(
            PostField::AuthorUsername,
            Lookup::IRegex,
            "^tassawer.*hussain$"
        )));

        let (post, _) = fixture();
        let orphan = Row {
            post: &post,
            author: None,
        };
        let q = Q::new(PostField::AuthorUsername, Lookup::IsNull, true);
        assert!(Matcher::new(&q).unwrap().matches(&orphan));
    }

    #[test]
    fn test_invalid_regex_is_rejected() {
        let q = Q::new(PostField::Title, Lookup::Regex, "(unclosed");
        assert!(matches!(Matcher::new(&q), Err(RepoError::InvalidQuery(_))));
    }
}
