use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use blog_core::admin::{ChangeList, ChangeListParams, PostAdmin};
use blog_core::domain::{PostChanges, PostStatus};
use blog_core::query::{DateKind, Lookup, OrderBy, Q, Value};

use super::*;

fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
}

async fn seed_author(store: &InMemoryBlogStore, username: &str) -> User {
    store
        .users()
        .create(User::new(username, format!("{username}@example.com")))
        .await
        .unwrap()
}

async fn seed_post(
    store: &InMemoryBlogStore,
    author: &User,
    title: &str,
    publish: DateTime<Utc>,
) -> Post {
    store
        .posts()
        .create(NewPost::from_title(author.id, title, "Some body text").with_publish(publish))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_default_ordering_is_newest_publish_first() {
    let store = InMemoryBlogStore::new();
    let author = seed_author(&store, "ann").await;
    for (title, publish) in [
        ("January", at(2025, 1, 1)),
        ("June", at(2025, 6, 1)),
        ("March", at(2025, 3, 1)),
    ] {
        store
            .posts()
            .create(
                NewPost::from_title(author.id, title, "Some body text")
                    .with_status(PostStatus::Published)
                    .with_publish(publish),
            )
            .await
            .unwrap();
    }

    let posts = store.posts().list(&PostQuery::all()).await.unwrap();
    assert!(posts.iter().all(|p| p.status == PostStatus::Published));
    let publish: Vec<_> = posts.iter().map(|p| p.publish).collect();
    assert_eq!(publish, vec![at(2025, 6, 1), at(2025, 3, 1), at(2025, 1, 1)]);
}

#[tokio::test]
async fn test_istartswith_is_case_insensitive() {
    let store = InMemoryBlogStore::new();
    let author = seed_author(&store, "ann").await;
    seed_post(&store, &author, "Hello World", at(2025, 1, 1)).await;
    let repo = store.posts();

    for prefix in ["Hello", "hello"] {
        let query = PostQuery::all().filter(Q::new(
            PostField::Title,
            Lookup::IStartsWith,
            prefix,
        ));
        assert_eq!(repo.count(&query).await.unwrap(), 1, "prefix {prefix}");
    }

    let query = PostQuery::all().filter(Q::new(PostField::Title, Lookup::IStartsWith, "World"));
    assert!(!repo.exists(&query).await.unwrap());
}

#[tokio::test]
async fn test_count_and_exists_by_author() {
    let store = InMemoryBlogStore::new();
    let a = seed_author(&store, "ann").await;
    let b = seed_author(&store, "bob").await;
    for i in 0..5 {
        seed_post(&store, &a, &format!("Post {i}"), at(2025, 1, i + 1)).await;
    }
    let repo = store.posts();

    let by_a = PostQuery::all().filter(Q::exact(PostField::Author, a.id));
    let by_b = PostQuery::all().filter(Q::exact(PostField::Author, b.id));
    assert_eq!(repo.count(&by_a).await.unwrap(), 5);
    assert!(repo.exists(&by_a).await.unwrap());
    assert_eq!(repo.count(&by_b).await.unwrap(), 0);
    assert!(!repo.exists(&by_b).await.unwrap());

    let by_username = PostQuery::all().filter(Q::exact(PostField::AuthorUsername, "ann"));
    assert_eq!(repo.count(&by_username).await.unwrap(), 5);
}

#[tokio::test]
async fn test_deleting_user_cascades_to_their_posts_only() {
    let store = InMemoryBlogStore::new();
    let a = seed_author(&store, "ann").await;
    let b = seed_author(&store, "bob").await;
    seed_post(&store, &a, "Ann one", at(2025, 1, 1)).await;
    seed_post(&store, &a, "Ann two", at(2025, 1, 2)).await;
    let kept = seed_post(&store, &b, "Bob one", at(2025, 1, 3)).await;

    store.users().delete(a.id).await.unwrap();

    let remaining = store.posts().list(&PostQuery::all()).await.unwrap();
    assert_eq!(remaining, vec![kept]);
    assert!(store.users().find_by_id(a.id).await.unwrap().is_none());
    assert!(matches!(
        store.users().delete(a.id).await,
        Err(RepoError::NotFound)
    ));
}

#[tokio::test]
async fn test_update_bumps_updated_and_keeps_created() {
    let store = InMemoryBlogStore::new();
    let author = seed_author(&store, "ann").await;
    let post = seed_post(&store, &author, "Hello World", at(2025, 1, 1)).await;
    let repo = store.posts();

    let first = repo
        .update(post.id, PostChanges::default().title("Hello again"))
        .await
        .unwrap();
    let second = repo
        .update(post.id, PostChanges::default().status(PostStatus::Published))
        .await
        .unwrap();

    assert!(first.updated > post.updated);
    assert!(second.updated > first.updated);
    assert_eq!(second.created, post.created);
    assert_eq!(second.title, "Hello again");
    assert!(second.is_published());
}

#[tokio::test]
async fn test_invalid_updates_are_rejected() {
    let store = InMemoryBlogStore::new();
    let author = seed_author(&store, "ann").await;
    let post = seed_post(&store, &author, "Hello World", at(2025, 1, 1)).await;
    let repo = store.posts();

    let result = repo.update(post.id, PostChanges::default().title("")).await;
    assert!(matches!(result, Err(RepoError::Invalid(_))));

    let result = repo
        .update(post.id, PostChanges::default().slug("not a slug"))
        .await;
    assert!(matches!(result, Err(RepoError::Invalid(_))));

    let unchanged = repo.get(post.id).await.unwrap();
    assert_eq!(unchanged, post);

    let result = repo.update(999, PostChanges::default().title("x")).await;
    assert!(matches!(result, Err(RepoError::NotFound)));
}

#[tokio::test]
async fn test_invalid_status_is_rejected_at_the_boundary() {
    assert!("XX".parse::<PostStatus>().is_err());
    assert!(matches!(
        Q::parse_pair("status", "XX"),
        Err(RepoError::Invalid(_))
    ));
    assert!(PostQuery::from_pairs([("status__in", "DF,ZZ")]).is_err());
}

#[tokio::test]
async fn test_create_enforces_author_and_unique_slug() {
    let store = InMemoryBlogStore::new();
    let author = seed_author(&store, "ann").await;
    let repo = store.posts();
    seed_post(&store, &author, "Hello World", at(2025, 1, 1)).await;

    let duplicate = repo
        .create(NewPost::from_title(author.id, "Hello World", "Another body"))
        .await;
    assert!(matches!(duplicate, Err(RepoError::Constraint(_))));

    let orphan = repo
        .create(NewPost::from_title(Uuid::new_v4(), "Orphan", "Body"))
        .await;
    assert!(matches!(orphan, Err(RepoError::Constraint(_))));

    let blank = repo
        .create(NewPost::new(author.id, "Title", "title", "   "))
        .await;
    assert!(matches!(blank, Err(RepoError::Invalid(_))));

    let found = repo.find_by_slug("hello-world").await.unwrap().unwrap();
    assert_eq!(found.status, PostStatus::Draft);
}

#[tokio::test]
async fn test_duplicate_username_is_rejected() {
    let store = InMemoryBlogStore::new();
    seed_author(&store, "ann").await;
    let result = store
        .users()
        .create(User::new("ann", "other@example.com"))
        .await;
    assert!(matches!(result, Err(RepoError::Constraint(_))));
    assert!(store.users().find_by_username("ann").await.unwrap().is_some());
}

#[tokio::test]
async fn test_combinators_and_exclusion() {
    let store = InMemoryBlogStore::new();
    let author = seed_author(&store, "ann").await;
    let repo = store.posts();
    for (title, status) in [
        ("Rust tips", PostStatus::Published),
        ("Rust drafts", PostStatus::Draft),
        ("Django notes", PostStatus::Published),
    ] {
        repo.create(NewPost::from_title(author.id, title, "Body").with_status(status))
            .await
            .unwrap();
    }

    let rust = Q::new(PostField::Title, Lookup::StartsWith, "Rust");
    let published = Q::exact(PostField::Status, PostStatus::Published);

    let both = PostQuery::all().filter(rust.clone() & published.clone());
    assert_eq!(repo.count(&both).await.unwrap(), 1);

    let either = PostQuery::all().filter(rust.clone() | published.clone());
    assert_eq!(repo.count(&either).await.unwrap(), 3);

    let one_of = PostQuery::all().filter(rust.clone() ^ published.clone());
    let titles: Vec<_> = repo
        .list(&one_of.order_by([OrderBy::Asc(PostField::Title)]))
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.title)
        .collect();
    assert_eq!(titles, vec!["Django notes", "Rust drafts"]);

    let not_rust = PostQuery::all().exclude(rust);
    assert_eq!(repo.count(&not_rust).await.unwrap(), 1);
}

#[tokio::test]
async fn test_slicing_and_windowed_count() {
    let store = InMemoryBlogStore::new();
    let author = seed_author(&store, "ann").await;
    for day in 1..=10 {
        seed_post(&store, &author, &format!("Day {day}"), at(2025, 1, day)).await;
    }
    let repo = store.posts();

    let window = PostQuery::all()
        .order_by([OrderBy::Asc(PostField::Publish)])
        .slice(2, Some(3));
    let titles: Vec<_> = repo
        .list(&window)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.title)
        .collect();
    assert_eq!(titles, vec!["Day 3", "Day 4", "Day 5"]);
    assert_eq!(repo.count(&window).await.unwrap(), 3);
    assert_eq!(repo.count(&PostQuery::all().slice(8, None)).await.unwrap(), 2);

    assert!(matches!(
        repo.delete_matching(&window).await,
        Err(RepoError::InvalidQuery(_))
    ));
}

#[tokio::test]
async fn test_delete_matching() {
    let store = InMemoryBlogStore::new();
    let author = seed_author(&store, "ann").await;
    for day in 1..=4 {
        seed_post(&store, &author, &format!("Day {day}"), at(2025, 1, day)).await;
    }
    let repo = store.posts();

    let early = PostQuery::all().filter(Q::new(PostField::Publish, Lookup::Lt, at(2025, 1, 3)));
    assert_eq!(repo.delete_matching(&early).await.unwrap(), 2);
    assert_eq!(repo.count(&PostQuery::all()).await.unwrap(), 2);
}

#[tokio::test]
async fn test_ordering_by_related_field_and_random() {
    let store = InMemoryBlogStore::new();
    let zed = seed_author(&store, "zed").await;
    let amy = seed_author(&store, "amy").await;
    seed_post(&store, &zed, "By zed", at(2025, 1, 1)).await;
    seed_post(&store, &amy, "By amy", at(2025, 1, 2)).await;
    let repo = store.posts();

    let by_author = PostQuery::all().order_by([OrderBy::Asc(PostField::AuthorUsername)]);
    let titles: Vec<_> = repo
        .list(&by_author)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.title)
        .collect();
    assert_eq!(titles, vec!["By amy", "By zed"]);

    let shuffled = repo
        .list(&PostQuery::all().order_by([OrderBy::Random]))
        .await
        .unwrap();
    assert_eq!(shuffled.len(), 2);
}

#[tokio::test]
async fn test_date_part_lookups() {
    let store = InMemoryBlogStore::new();
    let author = seed_author(&store, "ann").await;
    seed_post(&store, &author, "Old", at(2024, 12, 31)).await;
    seed_post(&store, &author, "New", at(2025, 10, 30)).await;
    let repo = store.posts();

    let in_2025 = PostQuery::from_pairs([("publish__year", "2025")]).unwrap();
    assert_eq!(repo.count(&in_2025).await.unwrap(), 1);

    let thursdays = PostQuery::from_pairs([("publish__week_day", "5")]).unwrap();
    let found = repo.list(&thursdays).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].title, "New");

    let by_date = PostQuery::all().filter(Q::new(
        PostField::Publish,
        Lookup::Part(blog_core::query::DatePart::Date, blog_core::query::Comparison::Exact),
        Value::Date(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()),
    ));
    assert_eq!(repo.count(&by_date).await.unwrap(), 1);
}

#[tokio::test]
async fn test_dates_and_author_counts() {
    let store = InMemoryBlogStore::new();
    let a = seed_author(&store, "ann").await;
    let b = seed_author(&store, "bob").await;
    seed_post(&store, &a, "One", at(2024, 5, 3)).await;
    seed_post(&store, &a, "Two", at(2025, 2, 10)).await;
    seed_post(&store, &b, "Three", at(2025, 2, 20)).await;
    let repo = store.posts();

    let years = repo
        .dates(&PostQuery::all(), PostField::Publish, DateKind::Year)
        .await
        .unwrap();
    assert_eq!(
        years,
        vec![
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
        ]
    );

    let months = repo
        .dates(
            &PostQuery::from_pairs([("publish__year", "2025")]).unwrap(),
            PostField::Publish,
            DateKind::Month,
        )
        .await
        .unwrap();
    assert_eq!(months, vec![NaiveDate::from_ymd_opt(2025, 2, 1).unwrap()]);

    assert!(matches!(
        repo.dates(&PostQuery::all(), PostField::Title, DateKind::Day)
            .await,
        Err(RepoError::InvalidQuery(_))
    ));

    let mut expected = vec![(a.id, 2), (b.id, 1)];
    expected.sort();
    assert_eq!(
        repo.author_counts(&PostQuery::all()).await.unwrap(),
        expected
    );
}

#[tokio::test]
async fn test_changelist_search_facets_and_drill_down() {
    let store = InMemoryBlogStore::new();
    let a = seed_author(&store, "ann").await;
    let b = seed_author(&store, "bob").await;
    let posts = store.posts();
    let users = store.users();
    posts
        .create(
            NewPost::from_title(a.id, "Django tips", "All about Django")
                .with_publish(at(2025, 3, 1))
                .with_status(PostStatus::Published),
        )
        .await
        .unwrap();
    posts
        .create(NewPost::from_title(a.id, "Rust tips", "Ownership").with_publish(at(2025, 4, 1)))
        .await
        .unwrap();
    posts
        .create(NewPost::from_title(b.id, "Music", "Django Reinhardt").with_publish(at(2024, 7, 1)))
        .await
        .unwrap();

    let admin = PostAdmin::default();
    let now = at(2025, 4, 15);

    let params = ChangeListParams {
        search: Some("django".to_string()),
        ..ChangeListParams::default()
    };
    let page = ChangeList::load(&admin, &posts, &users, &params, now)
        .await
        .unwrap();
    assert_eq!(page.result_count, 2);
    assert_eq!(page.full_count, 3);
    // Drafts sort before published posts.
    assert_eq!(page.rows[0].cells[0].1, "Music");
    assert_eq!(page.rows[1].cells[0].1, "Django tips");

    let status = page
        .facets
        .iter()
        .find(|f| f.field == PostField::Status)
        .unwrap();
    let counts: Vec<_> = status.choices.iter().map(|c| c.count).collect();
    assert_eq!(counts, vec![Some(2), Some(1), Some(1)]);

    let authors = page
        .facets
        .iter()
        .find(|f| f.field == PostField::Author)
        .unwrap();
    assert!(authors.choices.iter().any(|c| c.label == "bob" && c.count == Some(1)));

    let drill = page.date_hierarchy.as_ref().unwrap();
    assert_eq!(drill.level, DateKind::Year);
    assert_eq!(drill.buckets.len(), 2);

    let params = ChangeListParams {
        filters: vec![(PostField::Status, "DF".to_string())],
        year: Some(2025),
        ..ChangeListParams::default()
    };
    let page = ChangeList::load(&admin, &posts, &users, &params, now)
        .await
        .unwrap();
    assert_eq!(page.result_count, 1);
    assert_eq!(page.rows[0].cells[0].1, "Rust tips");
    let drill = page.date_hierarchy.unwrap();
    assert_eq!(drill.level, DateKind::Month);
    assert_eq!(drill.buckets, vec![NaiveDate::from_ymd_opt(2025, 4, 1).unwrap()]);

    // The status facet ignores its own selection.
    let status = page
        .facets
        .iter()
        .find(|f| f.field == PostField::Status)
        .unwrap();
    assert_eq!(status.choices[0].count, Some(2));
    assert!(status.choices[1].selected);
}

#[tokio::test]
async fn test_changelist_pagination_and_bad_filters() {
    let store = InMemoryBlogStore::new();
    let author = seed_author(&store, "ann").await;
    for day in 1..=5 {
        seed_post(&store, &author, &format!("Day {day}"), at(2025, 1, day)).await;
    }
    let admin = PostAdmin {
        list_per_page: 2,
        ..PostAdmin::default()
    };
    let (posts, users) = (store.posts(), store.users());

    let params = ChangeListParams {
        page: 10,
        ..ChangeListParams::default()
    };
    let page = ChangeList::load(&admin, &posts, &users, &params, Utc::now())
        .await
        .unwrap();
    assert_eq!(page.num_pages, 3);
    assert_eq!(page.page, 3);
    assert_eq!(page.rows.len(), 1);

    let params = ChangeListParams {
        filters: vec![(PostField::Title, "x".to_string())],
        ..ChangeListParams::default()
    };
    assert!(
        ChangeList::load(&admin, &posts, &users, &params, Utc::now())
            .await
            .is_err()
    );

    let params = ChangeListParams {
        month: Some(2),
        ..ChangeListParams::default()
    };
    assert!(
        ChangeList::load(&admin, &posts, &users, &params, Utc::now())
            .await
            .is_err()
    );
}
