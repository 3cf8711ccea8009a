//! Administrative console configuration for posts.
//!
//! [`PostAdmin`] declares how posts are listed, filtered and searched.
//! [`ChangeList`] runs that configuration against a post store and returns
//! what a console would render: rows, facet counts and date drill-down.

mod changelist;
mod date_range;

pub use changelist::{
    ChangeList, ChangeListParams, ChangeListRow, DateDrill, Facet, FacetChoice,
};
pub use date_range::DateRange;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Post, User, slugify};
use crate::query::{FieldKind, Lookup, OrderBy, PostField, Q};

/// When facet counts are shown next to filter choices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShowFacets {
    /// Always computed.
    #[default]
    Always,
    /// Computed when the request asks for them.
    Allow,
    Never,
}

/// Inconsistent admin configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdminConfigError {
    #[error("'{0}' cannot be used as a list filter")]
    UnsupportedFilter(PostField),

    #[error("date_hierarchy '{0}' is not a timestamp field")]
    NotADateField(PostField),

    #[error("search field '{0}' is not a text field")]
    NotSearchable(PostField),

    #[error("prepopulated field '{0}' has no source fields")]
    EmptyPrepopulation(PostField),

    #[error("list_per_page must be positive")]
    EmptyPage,
}

/// List, filter and search configuration for posts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostAdmin {
    pub list_display: Vec<PostField>,
    pub list_filter: Vec<PostField>,
    pub search_fields: Vec<PostField>,
    /// Target field and the fields its value is derived from.
    pub prepopulated_fields: Vec<(PostField, Vec<PostField>)>,
    /// Relations entered by id lookup instead of a dropdown.
    pub raw_id_fields: Vec<PostField>,
    pub date_hierarchy: Option<PostField>,
    pub ordering: Vec<OrderBy>,
    pub show_facets: ShowFacets,
    pub list_per_page: u64,
}

impl Default for PostAdmin {
    fn default() -> Self {
        Self {
            list_display: vec![
                PostField::Title,
                PostField::Slug,
                PostField::Author,
                PostField::Publish,
                PostField::Status,
            ],
            list_filter: vec![
                PostField::Status,
                PostField::Created,
                PostField::Publish,
                PostField::Author,
            ],
            search_fields: vec![PostField::Title, PostField::Body],
            prepopulated_fields: vec![(PostField::Slug, vec![PostField::Title])],
            raw_id_fields: vec![PostField::Author],
            date_hierarchy: Some(PostField::Publish),
            ordering: vec![
                OrderBy::Asc(PostField::Status),
                OrderBy::Asc(PostField::Publish),
            ],
            show_facets: ShowFacets::Always,
            list_per_page: 100,
        }
    }
}

impl PostAdmin {
    /// Check the configuration for fields used in the wrong role.
    pub fn check(&self) -> Result<(), AdminConfigError> {
        for &field in &self.list_filter {
            match field.kind() {
                FieldKind::Status | FieldKind::Timestamp | FieldKind::Uuid => {}
                _ => return Err(AdminConfigError::UnsupportedFilter(field)),
            }
        }
        if let Some(field) = self
            .date_hierarchy
            .filter(|f| f.kind() != FieldKind::Timestamp)
        {
            return Err(AdminConfigError::NotADateField(field));
        }
        if let Some(&field) = self
            .search_fields
            .iter()
            .find(|f| f.kind() != FieldKind::Text)
        {
            return Err(AdminConfigError::NotSearchable(field));
        }
        if let Some((target, _)) = self
            .prepopulated_fields
            .iter()
            .find(|(_, sources)| sources.is_empty())
        {
            return Err(AdminConfigError::EmptyPrepopulation(*target));
        }
        if self.list_per_page == 0 {
            return Err(AdminConfigError::EmptyPage);
        }
        Ok(())
    }

    /// Derive the value of a prepopulated `target` from its source fields.
    ///
    /// Returns `None` when `target` is not prepopulated.
    pub fn prepopulate<'a, F>(&self, target: PostField, source: F) -> Option<String>
    where
        F: Fn(PostField) -> Option<&'a str>,
    {
        let (_, sources) = self
            .prepopulated_fields
            .iter()
            .find(|(field, _)| *field == target)?;
        let joined = sources
            .iter()
            .filter_map(|&field| source(field))
            .collect::<Vec<_>>()
            .join(" ");
        Some(slugify(&joined))
    }

    /// Slug suggested while a title is being typed.
    pub fn prepopulate_slug(&self, title: &str) -> Option<String> {
        self.prepopulate(PostField::Slug, |field| {
            (field == PostField::Title).then_some(title)
        })
    }

    pub fn is_raw_id(&self, field: PostField) -> bool {
        self.raw_id_fields.contains(&field)
    }

    /// Free-text search: every whitespace-separated term must appear
    /// (case-insensitively) in at least one search field.
    pub fn search_query(&self, text: &str) -> Q {
        text.split_whitespace()
            .map(|term| {
                self.search_fields
                    .iter()
                    .map(|&field| Q::new(field, Lookup::IContains, term))
                    .fold(None, |acc: Option<Q>, q| {
                        Some(match acc {
                            Some(acc) => acc | q,
                            None => q,
                        })
                    })
                    .unwrap_or(Q::All)
            })
            .fold(Q::All, |acc, q| acc & q)
    }

    /// Render the `list_display` columns of one post.
    pub fn display_row(&self, post: &Post, author: Option<&User>) -> Vec<(PostField, String)> {
        self.list_display
            .iter()
            .map(|&field| (field, display_value(post, author, field)))
            .collect()
    }
}

fn display_value(post: &Post, author: Option<&User>, field: PostField) -> String {
    match field {
        PostField::Id => post.id.to_string(),
        PostField::Title => post.title.clone(),
        PostField::Slug => post.slug.clone(),
        PostField::Body => post.body.clone(),
        PostField::Publish => post.publish.to_rfc3339(),
        PostField::Created => post.created.to_rfc3339(),
        PostField::Updated => post.updated.to_rfc3339(),
        PostField::Status => post.status.label().to_string(),
        PostField::Author | PostField::AuthorUsername => author
            .map(|u| u.username.clone())
            .unwrap_or_else(|| post.author_id.to_string()),
        PostField::AuthorEmail => author.map(|u| u.email.clone()).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NewPost;
    use chrono::Utc;

    #[test]
    fn test_default_matches_console_layout() {
        let admin = PostAdmin::default();
        assert!(admin.check().is_ok());
        assert_eq!(admin.date_hierarchy, Some(PostField::Publish));
        assert!(admin.is_raw_id(PostField::Author));
        assert_eq!(admin.show_facets, ShowFacets::Always);
        assert_eq!(
            admin.ordering,
            vec![
                OrderBy::Asc(PostField::Status),
                OrderBy::Asc(PostField::Publish)
            ]
        );
    }

    #[test]
    fn test_check_rejects_bad_fields() {
        let admin = PostAdmin {
            list_filter: vec![PostField::Body],
            ..PostAdmin::default()
        };
        assert_eq!(
            admin.check(),
            Err(AdminConfigError::UnsupportedFilter(PostField::Body))
        );

        let admin = PostAdmin {
            date_hierarchy: Some(PostField::Title),
            ..PostAdmin::default()
        };
        assert_eq!(
            admin.check(),
            Err(AdminConfigError::NotADateField(PostField::Title))
        );

        let admin = PostAdmin {
            search_fields: vec![PostField::Id],
            ..PostAdmin::default()
        };
        assert_eq!(
            admin.check(),
            Err(AdminConfigError::NotSearchable(PostField::Id))
        );
    }

    #[test]
    fn test_prepopulate_slug_from_title() {
        let admin = PostAdmin::default();
        assert_eq!(
            admin.prepopulate_slug("Who was Django Reinhardt?").as_deref(),
            Some("who-was-django-reinhardt")
        );
        assert_eq!(admin.prepopulate(PostField::Title, |_| None), None);
    }

    #[test]
    fn test_search_query_shape() {
        let admin = PostAdmin::default();
        assert_eq!(admin.search_query("   "), Q::All);

        let q = admin.search_query("django music");
        match q {
            Q::And(terms) => {
                assert_eq!(terms.len(), 2);
                assert!(terms.iter().all(|t| matches!(t, Q::Or(f) if f.len() == 2)));
            }
            other => panic!("unexpected search query {other:?}"),
        }
    }

    #[test]
    fn test_display_row() {
        let admin = PostAdmin::default();
        let user = User::new("ann", "ann@example.com");
        let post = NewPost::new(user.id, "Hello World", "hello-world", "Body")
            .into_post(7, Utc::now());

        let row = admin.display_row(&post, Some(&user));
        let cells: Vec<&str> = row.iter().map(|(_, v)| v.as_str()).collect();
        assert_eq!(cells[0], "Hello World");
        assert_eq!(cells[1], "hello-world");
        assert_eq!(cells[2], "ann");
        assert_eq!(cells[4], "Draft");

        let row = admin.display_row(&post, None);
        assert_eq!(row[2].1, user.id.to_string());
    }
}
