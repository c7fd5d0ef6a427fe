//! Blog post model.
//!
//! # Invariants
//! - `id` and timestamps are assigned by storage and never read from
//!   serialized input.
//! - Title, content and author are trimmed and never blank.

use crate::model::validation::{ValidationError, MAX_TITLE_CHARS};
use serde::{Deserialize, Serialize};

/// Storage-assigned blog post identifier.
pub type BlogPostId = i64;

/// One published article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogPost {
    #[serde(skip_deserializing)]
    pub(crate) id: Option<BlogPostId>,
    pub title: String,
    /// Markdown or plain text body.
    pub content: String,
    /// Display name of the writer; not linked to `users`.
    pub author: String,
    #[serde(skip_deserializing)]
    pub(crate) created_at: Option<i64>,
    #[serde(skip_deserializing)]
    pub(crate) updated_at: Option<i64>,
}

impl BlogPost {
    /// Creates an unsaved post with trimmed fields.
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        author: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let post = Self {
            id: None,
            title: title.into().trim().to_string(),
            content: content.into().trim().to_string(),
            author: author.into().trim().to_string(),
            created_at: None,
            updated_at: None,
        };
        post.validate()?;
        Ok(post)
    }

    pub fn id(&self) -> Option<BlogPostId> {
        self.id
    }

    pub fn created_at(&self) -> Option<i64> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<i64> {
        self.updated_at
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::BlankTitle);
        }
        let title_chars = self.title.chars().count();
        if title_chars > MAX_TITLE_CHARS {
            return Err(ValidationError::TitleTooLong(title_chars));
        }
        if self.content.trim().is_empty() {
            return Err(ValidationError::BlankContent);
        }
        if self.author.trim().is_empty() {
            return Err(ValidationError::BlankAuthor);
        }
        Ok(())
    }
}
