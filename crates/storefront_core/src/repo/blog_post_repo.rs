//! Blog post repository contracts and SQLite implementation.
//!
//! # Invariants
//! - Listings are ordered by `created_at DESC, id DESC`.
//! - Search matches title or content as a literal substring.
//! - Update and delete of a missing post report `NotFound`.

use crate::model::blog_post::{BlogPost, BlogPostId};
use crate::repo::{ensure_schema_ready, like_pattern, EntityRef, RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const BLOG_POST_SELECT_SQL: &str = "SELECT
    id,
    title,
    content,
    author,
    created_at,
    updated_at
FROM blog_posts";

const POSTS_DEFAULT_LIMIT: u32 = 10;
const POSTS_LIMIT_MAX: u32 = 50;

/// Query options for blog post listings.
///
/// `author` and `search` combine with `AND`; an empty query lists every post
/// page by page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlogPostListQuery {
    /// Exact author match.
    pub author: Option<String>,
    /// Substring match over title or content.
    pub search: Option<String>,
    /// Maximum rows to return. Defaults to 10 and clamps to 50.
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for blog posts.
pub trait BlogPostRepository {
    /// Inserts the post and writes generated id and timestamps back onto it.
    fn create_post(&self, post: &mut BlogPost) -> RepoResult<BlogPostId>;
    fn get_post(&self, id: BlogPostId) -> RepoResult<Option<BlogPost>>;
    /// Newest posts first, filtered and paginated by `query`.
    fn list_posts(&self, query: &BlogPostListQuery) -> RepoResult<Vec<BlogPost>>;
    fn count_posts(&self) -> RepoResult<u64>;
    /// Rewrites title, content and author and bumps `updated_at`.
    fn update_post(&self, post: &mut BlogPost) -> RepoResult<()>;
    fn delete_post(&self, id: BlogPostId) -> RepoResult<()>;
}

/// SQLite-backed blog post repository.
pub struct SqliteBlogPostRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteBlogPostRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self { conn })
    }

    fn timestamps(&self, id: BlogPostId) -> RepoResult<(i64, i64)> {
        Ok(self.conn.query_row(
            "SELECT created_at, updated_at FROM blog_posts WHERE id = ?1;",
            [id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?)
    }
}

impl BlogPostRepository for SqliteBlogPostRepository<'_> {
    fn create_post(&self, post: &mut BlogPost) -> RepoResult<BlogPostId> {
        post.validate()?;
        if let Some(id) = post.id {
            return Err(RepoError::AlreadyPersisted(EntityRef::BlogPost(id)));
        }

        self.conn.execute(
            "INSERT INTO blog_posts (title, content, author) VALUES (?1, ?2, ?3);",
            params![
                post.title.as_str(),
                post.content.as_str(),
                post.author.as_str()
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        let (created_at, updated_at) = self.timestamps(id)?;

        post.id = Some(id);
        post.created_at = Some(created_at);
        post.updated_at = Some(updated_at);
        Ok(id)
    }

    fn get_post(&self, id: BlogPostId) -> RepoResult<Option<BlogPost>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{BLOG_POST_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_blog_post_row(row)?)),
            None => Ok(None),
        }
    }

    fn list_posts(&self, query: &BlogPostListQuery) -> RepoResult<Vec<BlogPost>> {
        let mut sql = format!("{BLOG_POST_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(author) = normalized(query.author.as_deref()) {
            sql.push_str(" AND author = ?");
            bind_values.push(Value::Text(author.to_string()));
        }
        if let Some(search) = normalized(query.search.as_deref()) {
            sql.push_str(" AND (title LIKE ? ESCAPE '\\' OR content LIKE ? ESCAPE '\\')");
            let pattern = like_pattern(search);
            bind_values.push(Value::Text(pattern.clone()));
            bind_values.push(Value::Text(pattern));
        }

        sql.push_str(" ORDER BY created_at DESC, id DESC LIMIT ?");
        bind_values.push(Value::Integer(i64::from(normalize_post_limit(query.limit))));
        if query.offset > 0 {
            sql.push_str(" OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut posts = Vec::new();
        while let Some(row) = rows.next()? {
            posts.push(parse_blog_post_row(row)?);
        }
        Ok(posts)
    }

    fn count_posts(&self) -> RepoResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM blog_posts;", [], |row| row.get(0))?;
        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative blog post count `{count}`")))
    }

    fn update_post(&self, post: &mut BlogPost) -> RepoResult<()> {
        post.validate()?;
        let id = post.id.ok_or(RepoError::Unpersisted("blog post"))?;

        let changed = self.conn.execute(
            "UPDATE blog_posts
             SET
                title = ?2,
                content = ?3,
                author = ?4,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![
                id,
                post.title.as_str(),
                post.content.as_str(),
                post.author.as_str()
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(EntityRef::BlogPost(id)));
        }

        let (_, updated_at) = self.timestamps(id)?;
        post.updated_at = Some(updated_at);
        Ok(())
    }

    fn delete_post(&self, id: BlogPostId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM blog_posts WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound(EntityRef::BlogPost(id)));
        }
        Ok(())
    }
}

/// Normalizes list limit according to the blog post listing contract.
pub fn normalize_post_limit(limit: Option<u32>) -> u32 {
    match limit {
        Some(0) | None => POSTS_DEFAULT_LIMIT,
        Some(value) => value.min(POSTS_LIMIT_MAX),
    }
}

fn normalized(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn parse_blog_post_row(row: &Row<'_>) -> RepoResult<BlogPost> {
    let post = BlogPost {
        id: Some(row.get("id")?),
        title: row.get("title")?,
        content: row.get("content")?,
        author: row.get("author")?,
        created_at: Some(row.get("created_at")?),
        updated_at: Some(row.get("updated_at")?),
    };
    post.validate()
        .map_err(|err| RepoError::InvalidData(format!("blog post `{}`: {err}", post.title)))?;
    Ok(post)
}
