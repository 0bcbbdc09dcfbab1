//! Domain entities mirrored from persistent storage.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::types::{ArticleType, MarkupFormat};

const BIG_ARTICLE_HTML_CHARS: usize = 2_000;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArticleRecord {
    pub id: Uuid,
    pub permalink: String,
    pub article_type: ArticleType,
    pub title: String,
    pub body: String,
    pub html: String,
    pub format: MarkupFormat,
    pub tags: Vec<String>,
    pub legacy_id: Option<String>,
    pub published: OffsetDateTime,
    pub updated: OffsetDateTime,
    pub num_comments: i32,
    pub associated: AssociatedData,
}

impl ArticleRecord {
    /// Long articles and articles with side material get the two-column layout.
    pub fn is_big(&self) -> bool {
        self.html.chars().count() > BIG_ARTICLE_HTML_CHARS || !self.associated.is_empty()
    }

    pub fn path(&self) -> String {
        format!("/{}", self.permalink)
    }
}

/// Free-form side material shown next to an article.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociatedData {
    pub relevant_links: Option<String>,
    pub amazon_items: Option<String>,
}

impl AssociatedData {
    pub fn is_empty(&self) -> bool {
        self.relevant_links.is_none() && self.amazon_items.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentRecord {
    pub id: Uuid,
    pub article_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub email: String,
    pub homepage: Option<String>,
    pub title: Option<String>,
    pub body: String,
    pub thread: String,
    pub published: OffsetDateTime,
}

impl CommentRecord {
    /// Fragment identifier used by reply forms (`<permalink>#comment-<id>`).
    pub fn anchor(&self) -> String {
        format!("comment-{}", self.id.simple())
    }

    /// Nesting depth derived from the thread string (`001` → 0, `001.002` → 1).
    pub fn depth(&self) -> usize {
        self.thread.matches('.').count()
    }
}
