use storefront_core::db::open_db_in_memory;
use storefront_core::{
    BlogPost, BlogPostListQuery, BlogPostRepository, EntityRef, RepoError,
    SqliteBlogPostRepository,
};

fn seed(repo: &SqliteBlogPostRepository<'_>) -> Vec<i64> {
    [
        ("Getting started", "Install the toolchain and run the app", "alice"),
        ("Order workflow", "Orders start pending and ship later", "bob"),
        ("Profiles", "Every user owns one profile", "alice"),
        ("100% uptime", "A story about retries", "carol"),
    ]
    .into_iter()
    .map(|(title, content, author)| {
        let mut post = BlogPost::new(title, content, author).unwrap();
        repo.create_post(&mut post).unwrap()
    })
    .collect()
}

fn titles(posts: &[BlogPost]) -> Vec<&str> {
    posts.iter().map(|post| post.title.as_str()).collect()
}

#[test]
fn create_writes_back_id_and_timestamps() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteBlogPostRepository::try_new(&conn).unwrap();

    let mut post = BlogPost::new("Hello", "First post", "alice").unwrap();
    let id = repo.create_post(&mut post).unwrap();

    assert!(id > 0);
    assert_eq!(post.id(), Some(id));
    assert!(post.created_at().is_some());

    let loaded = repo.get_post(id).unwrap().unwrap();
    assert_eq!(loaded, post);
    assert!(repo.get_post(id + 1).unwrap().is_none());

    assert!(matches!(
        repo.create_post(&mut post),
        Err(RepoError::AlreadyPersisted(EntityRef::BlogPost(existing))) if existing == id
    ));
}

#[test]
fn list_is_newest_first_and_paginated() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteBlogPostRepository::try_new(&conn).unwrap();
    seed(&repo);

    let all = repo.list_posts(&BlogPostListQuery::default()).unwrap();
    assert_eq!(
        titles(&all),
        vec!["100% uptime", "Profiles", "Order workflow", "Getting started"]
    );

    let page = repo
        .list_posts(&BlogPostListQuery {
            limit: Some(2),
            offset: 1,
            ..BlogPostListQuery::default()
        })
        .unwrap();
    assert_eq!(titles(&page), vec!["Profiles", "Order workflow"]);

    assert_eq!(repo.count_posts().unwrap(), 4);
}

#[test]
fn list_filters_by_author_and_search() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteBlogPostRepository::try_new(&conn).unwrap();
    seed(&repo);

    let by_alice = repo
        .list_posts(&BlogPostListQuery {
            author: Some("alice".to_string()),
            ..BlogPostListQuery::default()
        })
        .unwrap();
    assert_eq!(titles(&by_alice), vec!["Profiles", "Getting started"]);

    // Title or content match.
    let orders = repo
        .list_posts(&BlogPostListQuery {
            search: Some("order".to_string()),
            ..BlogPostListQuery::default()
        })
        .unwrap();
    assert_eq!(titles(&orders), vec!["Order workflow"]);

    let profile_by_alice = repo
        .list_posts(&BlogPostListQuery {
            author: Some("alice".to_string()),
            search: Some("profile".to_string()),
            ..BlogPostListQuery::default()
        })
        .unwrap();
    assert_eq!(titles(&profile_by_alice), vec!["Profiles"]);

    // `%` is matched literally, not as a wildcard.
    let percent = repo
        .list_posts(&BlogPostListQuery {
            search: Some("0%".to_string()),
            ..BlogPostListQuery::default()
        })
        .unwrap();
    assert_eq!(titles(&percent), vec!["100% uptime"]);
}

#[test]
fn update_and_delete_report_missing_posts() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteBlogPostRepository::try_new(&conn).unwrap();
    let ids = seed(&repo);

    let mut post = repo.get_post(ids[0]).unwrap().unwrap();
    post.title = "Getting started, revised".to_string();
    post.content = "Now with screenshots".to_string();
    repo.update_post(&mut post).unwrap();

    let loaded = repo.get_post(ids[0]).unwrap().unwrap();
    assert_eq!(loaded.title, "Getting started, revised");
    assert_eq!(loaded.content, "Now with screenshots");
    assert!(loaded.updated_at().unwrap() >= loaded.created_at().unwrap());

    post.title = "  ".to_string();
    assert!(matches!(
        repo.update_post(&mut post),
        Err(RepoError::Validation(_))
    ));

    repo.delete_post(ids[0]).unwrap();
    assert!(repo.get_post(ids[0]).unwrap().is_none());
    assert_eq!(repo.count_posts().unwrap(), 3);
    assert!(matches!(
        repo.delete_post(ids[0]),
        Err(RepoError::NotFound(EntityRef::BlogPost(id))) if id == ids[0]
    ));

    let mut ghost = BlogPost::new("Ghost", "Never stored", "nobody").unwrap();
    assert!(matches!(
        repo.update_post(&mut ghost),
        Err(RepoError::Unpersisted("blog post"))
    ));
}
