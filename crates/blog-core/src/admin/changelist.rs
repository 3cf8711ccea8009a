use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{DateRange, PostAdmin, ShowFacets};
use crate::domain::{PostStatus, User};
use crate::error::RepoError;
use crate::ports::{PostRepository, UserRepository};
use crate::query::{Comparison, DateKind, DatePart, FieldKind, Lookup, PostField, PostQuery, Q};

/// Request state of a changelist page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeListParams {
    /// Free-text search over the admin's search fields.
    pub search: Option<String>,
    /// Selected list-filter choices: status code, author id or date range key.
    pub filters: Vec<(PostField, String)>,
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
    /// 1-based; 0 is treated as 1 and pages past the end clamp to the last.
    pub page: u64,
    /// Ask for facet counts when the admin only allows them.
    pub facets: bool,
}

/// One rendered row: the post id and its `list_display` cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeListRow {
    pub id: i64,
    pub cells: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetChoice {
    pub label: String,
    /// Parameter value selecting this choice; `None` clears the filter.
    pub value: Option<String>,
    pub selected: bool,
    pub count: Option<u64>,
}

/// Choices of one list filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facet {
    pub field: PostField,
    pub choices: Vec<FacetChoice>,
}

/// Date drill-down state and the buckets of the next level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateDrill {
    pub field: PostField,
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
    /// Granularity of `buckets`.
    pub level: DateKind,
    pub buckets: Vec<NaiveDate>,
}

/// A rendered page of the post changelist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeList {
    pub columns: Vec<PostField>,
    pub rows: Vec<ChangeListRow>,
    /// Posts matching search, filters and drill-down.
    pub result_count: u64,
    /// Posts in the store.
    pub full_count: u64,
    pub page: u64,
    pub num_pages: u64,
    pub facets: Vec<Facet>,
    pub date_hierarchy: Option<DateDrill>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Selection {
    Status(PostStatus),
    Author(Uuid),
    Date(DateRange),
}

impl ChangeList {
    /// Run `admin` against the stores for the given request state.
    pub async fn load(
        admin: &PostAdmin,
        posts: &dyn PostRepository,
        users: &dyn UserRepository,
        params: &ChangeListParams,
        now: DateTime<Utc>,
    ) -> Result<ChangeList, RepoError> {
        admin
            .check()
            .map_err(|e| RepoError::InvalidQuery(e.to_string()))?;

        let mut selections = Vec::with_capacity(params.filters.len());
        for (field, raw) in &params.filters {
            if !admin.list_filter.contains(field) {
                return Err(RepoError::InvalidQuery(format!(
                    "'{field}' is not a list filter"
                )));
            }
            selections.push((*field, parse_selection(*field, raw)?));
        }

        let search = params
            .search
            .as_deref()
            .map(|text| admin.search_query(text))
            .unwrap_or(Q::All);
        let base = search & drill_filter(admin.date_hierarchy, params)?;
        let filtered = selections
            .iter()
            .fold(base.clone(), |acc, (field, sel)| acc & selection_q(*field, *sel, now));

        let query = PostQuery::all()
            .filter(filtered.clone())
            .order_by(admin.ordering.iter().copied());
        let result_count = posts.count(&query).await?;
        let full_count = posts.count(&PostQuery::all()).await?;

        let per_page = admin.list_per_page;
        let num_pages = result_count.div_ceil(per_page).max(1);
        let page = params.page.clamp(1, num_pages);
        let page_posts = posts
            .list(&query.slice((page - 1) * per_page, Some(per_page)))
            .await?;

        let mut authors: HashMap<Uuid, User> = HashMap::new();
        for post in &page_posts {
            remember_author(users, &mut authors, post.author_id).await?;
        }
        let rows = page_posts
            .iter()
            .map(|post| ChangeListRow {
                id: post.id,
                cells: admin
                    .display_row(post, authors.get(&post.author_id))
                    .into_iter()
                    .map(|(field, value)| (field.name().to_string(), value))
                    .collect(),
            })
            .collect();

        let show_counts = match admin.show_facets {
            ShowFacets::Always => true,
            ShowFacets::Allow => params.facets,
            ShowFacets::Never => false,
        };
        let mut facets = Vec::with_capacity(admin.list_filter.len());
        for &field in &admin.list_filter {
            let others = selections
                .iter()
                .filter(|(f, _)| *f != field)
                .fold(base.clone(), |acc, (f, sel)| acc & selection_q(*f, *sel, now));
            let selected = selections
                .iter()
                .find(|(f, _)| *f == field)
                .map(|(_, sel)| *sel);
            let facet = FacetBuilder {
                posts,
                users,
                authors: &mut authors,
                others,
                selected,
                show_counts,
                now,
            }
            .build(field)
            .await?;
            facets.push(facet);
        }

        let date_hierarchy = match admin.date_hierarchy {
            Some(field) => Some(load_drill(posts, field, params, &filtered).await?),
            None => None,
        };

        tracing::debug!(
            result_count,
            full_count,
            page,
            num_pages,
            "Loaded post changelist"
        );

        Ok(ChangeList {
            columns: admin.list_display.clone(),
            rows,
            result_count,
            full_count,
            page,
            num_pages,
            facets,
            date_hierarchy,
        })
    }
}

struct FacetBuilder<'a> {
    posts: &'a dyn PostRepository,
    users: &'a dyn UserRepository,
    authors: &'a mut HashMap<Uuid, User>,
    others: Q,
    selected: Option<Selection>,
    show_counts: bool,
    now: DateTime<Utc>,
}

impl FacetBuilder<'_> {
    async fn build(self, field: PostField) -> Result<Facet, RepoError> {
        let choices = match field.kind() {
            FieldKind::Status => self.status_choices(field).await?,
            FieldKind::Timestamp => self.date_choices(field).await?,
            FieldKind::Uuid => self.author_choices().await?,
            _ => return Err(RepoError::InvalidQuery(format!("'{field}' has no facets"))),
        };
        Ok(Facet { field, choices })
    }

    async fn count(&self, q: Q) -> Result<Option<u64>, RepoError> {
        if !self.show_counts {
            return Ok(None);
        }
        let query = PostQuery::all().filter(self.others.clone() & q);
        Ok(Some(self.posts.count(&query).await?))
    }

    async fn status_choices(&self, field: PostField) -> Result<Vec<FacetChoice>, RepoError> {
        let mut choices = vec![FacetChoice {
            label: "All".to_string(),
            value: None,
            selected: self.selected.is_none(),
            count: self.count(Q::All).await?,
        }];
        for status in PostStatus::ALL {
            choices.push(FacetChoice {
                label: status.label().to_string(),
                value: Some(status.code().to_string()),
                selected: self.selected == Some(Selection::Status(status)),
                count: self.count(Q::exact(field, status)).await?,
            });
        }
        Ok(choices)
    }

    async fn date_choices(&self, field: PostField) -> Result<Vec<FacetChoice>, RepoError> {
        let mut choices = Vec::with_capacity(DateRange::ALL.len());
        for range in DateRange::ALL {
            let selected = match self.selected {
                Some(Selection::Date(sel)) => sel == range,
                _ => range == DateRange::AnyDate,
            };
            choices.push(FacetChoice {
                label: range.label().to_string(),
                value: (range != DateRange::AnyDate).then(|| range.key().to_string()),
                selected,
                count: self.count(range.q(field, self.now)).await?,
            });
        }
        Ok(choices)
    }

    async fn author_choices(self) -> Result<Vec<FacetChoice>, RepoError> {
        let query = PostQuery::all().filter(self.others.clone());
        let counts = self.posts.author_counts(&query).await?;
        let total: u64 = counts.iter().map(|(_, n)| n).sum();

        let mut choices = vec![FacetChoice {
            label: "All".to_string(),
            value: None,
            selected: self.selected.is_none(),
            count: self.show_counts.then_some(total),
        }];
        for (author_id, n) in counts {
            remember_author(self.users, self.authors, author_id).await?;
            let label = self
                .authors
                .get(&author_id)
                .map(|u| u.username.clone())
                .unwrap_or_else(|| author_id.to_string());
            choices.push(FacetChoice {
                label,
                value: Some(author_id.to_string()),
                selected: self.selected == Some(Selection::Author(author_id)),
                count: self.show_counts.then_some(n),
            });
        }
        Ok(choices)
    }
}

async fn remember_author(
    users: &dyn UserRepository,
    authors: &mut HashMap<Uuid, User>,
    author_id: Uuid,
) -> Result<(), RepoError> {
    if !authors.contains_key(&author_id) {
        if let Some(user) = users.find_by_id(author_id).await? {
            authors.insert(author_id, user);
        }
    }
    Ok(())
}

fn parse_selection(field: PostField, raw: &str) -> Result<Selection, RepoError> {
    match field.kind() {
        FieldKind::Status => Ok(Selection::Status(raw.parse()?)),
        FieldKind::Uuid => Uuid::parse_str(raw.trim())
            .map(Selection::Author)
            .map_err(|_| RepoError::InvalidQuery(format!("invalid author id '{raw}'"))),
        FieldKind::Timestamp => DateRange::parse(raw)
            .map(Selection::Date)
            .ok_or_else(|| RepoError::InvalidQuery(format!("unknown date range '{raw}'"))),
        _ => Err(RepoError::InvalidQuery(format!(
            "'{field}' cannot be filtered from the changelist"
        ))),
    }
}

fn selection_q(field: PostField, selection: Selection, now: DateTime<Utc>) -> Q {
    match selection {
        Selection::Status(status) => Q::exact(field, status),
        Selection::Author(id) => Q::exact(field, id),
        Selection::Date(range) => range.q(field, now),
    }
}

fn drill_filter(field: Option<PostField>, params: &ChangeListParams) -> Result<Q, RepoError> {
    let Some(field) = field else {
        return Ok(Q::All);
    };
    if params.month.is_some() && params.year.is_none() {
        return Err(RepoError::InvalidQuery("month drill-down needs a year".into()));
    }
    if params.day.is_some() && params.month.is_none() {
        return Err(RepoError::InvalidQuery("day drill-down needs a month".into()));
    }

    let part = |part: DatePart, value: i64| {
        Q::new(field, Lookup::Part(part, Comparison::Exact), value)
    };
    let mut q = Q::All;
    if let Some(year) = params.year {
        q = q & part(DatePart::Year, year.into());
    }
    if let Some(month) = params.month {
        q = q & part(DatePart::Month, month.into());
    }
    if let Some(day) = params.day {
        q = q & part(DatePart::Day, day.into());
    }
    Ok(q)
}

async fn load_drill(
    posts: &dyn PostRepository,
    field: PostField,
    params: &ChangeListParams,
    filtered: &Q,
) -> Result<DateDrill, RepoError> {
    let (level, deepest) = match (params.year, params.month, params.day) {
        (None, _, _) => (DateKind::Year, false),
        (Some(_), None, _) => (DateKind::Month, false),
        (Some(_), Some(_), None) => (DateKind::Day, false),
        (Some(_), Some(_), Some(_)) => (DateKind::Day, true),
    };
    let buckets = if deepest {
        Vec::new()
    } else {
        let query = PostQuery::all().filter(filtered.clone());
        posts.dates(&query, field, level).await?
    };
    Ok(DateDrill {
        field,
        year: params.year,
        month: params.month,
        day: params.day,
        level,
        buckets,
    })
}
