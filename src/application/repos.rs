//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::entities::{ArticleRecord, AssociatedData, CommentRecord};
use crate::domain::types::{ArticleType, MarkupFormat};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Half-open publication window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishedRange {
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
}

impl PublishedRange {
    pub fn contains(&self, instant: OffsetDateTime) -> bool {
        instant >= self.start && instant < self.end
    }
}

/// Filters for article listings; every listing is ordered newest `published` first.
#[derive(Debug, Clone, Default)]
pub struct ArticleQuery {
    pub article_type: Option<ArticleType>,
    pub tag: Option<String>,
    pub search: Option<String>,
    pub published: Option<PublishedRange>,
    pub limit: u32,
    pub offset: u32,
}

impl ArticleQuery {
    /// In-process evaluation of the filter, shared by adapters without a query language.
    pub fn matches(&self, article: &ArticleRecord) -> bool {
        if let Some(kind) = self.article_type
            && article.article_type != kind
        {
            return false;
        }
        if let Some(tag) = self.tag.as_deref()
            && !article.tags.iter().any(|t| t == tag)
        {
            return false;
        }
        if let Some(term) = self.search.as_deref() {
            let needle = term.to_lowercase();
            let in_tags = article.tags.iter().any(|t| t == term);
            let in_title = article.title.to_lowercase().contains(&needle);
            if !in_tags && !in_title {
                return false;
            }
        }
        if let Some(range) = self.published
            && !range.contains(article.published)
        {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone)]
pub struct ArticlePage {
    pub items: Vec<ArticleRecord>,
    pub has_more: bool,
}

#[derive(Debug, Clone)]
pub struct CreateArticleParams {
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
    pub associated: AssociatedData,
}

#[derive(Debug, Clone)]
pub struct UpdateArticleParams {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    pub html: String,
    pub format: MarkupFormat,
    pub tags: Vec<String>,
    pub updated: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct CreateCommentParams {
    pub article_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub email: String,
    pub homepage: Option<String>,
    pub title: Option<String>,
    pub body: String,
    pub published: OffsetDateTime,
}

#[async_trait]
pub trait ArticlesRepo: Send + Sync {
    async fn find_by_permalink(&self, permalink: &str) -> Result<Option<ArticleRecord>, RepoError>;

    async fn find_by_legacy_id(&self, legacy_id: &str) -> Result<Option<ArticleRecord>, RepoError>;

    async fn list_articles(&self, query: &ArticleQuery) -> Result<ArticlePage, RepoError>;

    /// Oldest stored article, used by the maintenance delete.
    async fn first_article(&self) -> Result<Option<ArticleRecord>, RepoError>;
}

#[async_trait]
pub trait ArticlesWriteRepo: Send + Sync {
    async fn create_article(&self, params: CreateArticleParams)
    -> Result<ArticleRecord, RepoError>;

    async fn update_article(&self, params: UpdateArticleParams)
    -> Result<ArticleRecord, RepoError>;

    /// Deletes the article and its comments.
    async fn delete_article(&self, id: Uuid) -> Result<(), RepoError>;
}

#[async_trait]
pub trait CommentsRepo: Send + Sync {
    async fn list_for_article(&self, article_id: Uuid) -> Result<Vec<CommentRecord>, RepoError>;

    async fn find_comment(&self, id: Uuid) -> Result<Option<CommentRecord>, RepoError>;

    /// Insert the comment, assign its thread and bump the article's comment count atomically.
    async fn create_comment(&self, params: CreateCommentParams)
    -> Result<CommentRecord, RepoError>;

    /// Oldest stored comment, used by the maintenance delete.
    async fn first_comment(&self) -> Result<Option<CommentRecord>, RepoError>;

    async fn delete_comment(&self, id: Uuid) -> Result<(), RepoError>;
}

#[async_trait]
pub trait HealthRepo: Send + Sync {
    async fn health_check(&self) -> Result<(), RepoError>;
}
