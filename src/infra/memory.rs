//! Process-local datastore used when no database is configured and in tests.

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::application::repos::{
    ArticlePage, ArticleQuery, ArticlesRepo, ArticlesWriteRepo, CommentsRepo,
    CreateArticleParams, CreateCommentParams, HealthRepo, RepoError, UpdateArticleParams,
};
use crate::domain::entities::{ArticleRecord, CommentRecord};
use crate::domain::thread::{child_thread, next_ordinal};

#[derive(Default)]
struct Store {
    articles: Vec<ArticleRecord>,
    comments: Vec<CommentRecord>,
}

impl Store {
    fn article_mut(&mut self, id: Uuid) -> Result<&mut ArticleRecord, RepoError> {
        self.articles
            .iter_mut()
            .find(|article| article.id == id)
            .ok_or(RepoError::NotFound)
    }

    fn refresh_comment_count(&mut self, article_id: Uuid) {
        let count = self
            .comments
            .iter()
            .filter(|comment| comment.article_id == article_id)
            .count();
        if let Ok(article) = self.article_mut(article_id) {
            article.num_comments = i32::try_from(count).unwrap_or(i32::MAX);
        }
    }
}

#[derive(Default)]
pub struct InMemoryRepositories {
    store: RwLock<Store>,
}

impl InMemoryRepositories {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArticlesRepo for InMemoryRepositories {
    async fn find_by_permalink(&self, permalink: &str) -> Result<Option<ArticleRecord>, RepoError> {
        let store = self.store.read().await;
        Ok(store
            .articles
            .iter()
            .find(|article| article.permalink == permalink)
            .cloned())
    }

    async fn find_by_legacy_id(&self, legacy_id: &str) -> Result<Option<ArticleRecord>, RepoError> {
        let store = self.store.read().await;
        Ok(store
            .articles
            .iter()
            .find(|article| article.legacy_id.as_deref() == Some(legacy_id))
            .cloned())
    }

    async fn list_articles(&self, query: &ArticleQuery) -> Result<ArticlePage, RepoError> {
        let store = self.store.read().await;
        let mut matching: Vec<&ArticleRecord> =
            store.articles.iter().filter(|a| query.matches(a)).collect();
        matching.sort_by(|a, b| b.published.cmp(&a.published));

        let offset = query.offset as usize;
        let limit = if query.limit == 0 {
            usize::MAX
        } else {
            query.limit as usize
        };
        let has_more = matching.len() > offset.saturating_add(limit);
        let items = matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        Ok(ArticlePage { items, has_more })
    }

    async fn first_article(&self) -> Result<Option<ArticleRecord>, RepoError> {
        let store = self.store.read().await;
        Ok(store
            .articles
            .iter()
            .min_by_key(|article| article.published)
            .cloned())
    }
}

#[async_trait]
impl ArticlesWriteRepo for InMemoryRepositories {
    async fn create_article(
        &self,
        params: CreateArticleParams,
    ) -> Result<ArticleRecord, RepoError> {
        let mut store = self.store.write().await;
        if store
            .articles
            .iter()
            .any(|article| article.permalink == params.permalink)
        {
            return Err(RepoError::Duplicate {
                constraint: "articles_permalink_key".to_string(),
            });
        }

        let article = ArticleRecord {
            id: Uuid::new_v4(),
            permalink: params.permalink,
            article_type: params.article_type,
            title: params.title,
            body: params.body,
            html: params.html,
            format: params.format,
            tags: params.tags,
            legacy_id: params.legacy_id,
            published: params.published,
            updated: params.updated,
            num_comments: 0,
            associated: params.associated,
        };
        store.articles.push(article.clone());
        Ok(article)
    }

    async fn update_article(
        &self,
        params: UpdateArticleParams,
    ) -> Result<ArticleRecord, RepoError> {
        let mut store = self.store.write().await;
        let article = store.article_mut(params.id)?;
        article.title = params.title;
        article.body = params.body;
        article.html = params.html;
        article.format = params.format;
        article.tags = params.tags;
        article.updated = params.updated;
        Ok(article.clone())
    }

    async fn delete_article(&self, id: Uuid) -> Result<(), RepoError> {
        let mut store = self.store.write().await;
        let before = store.articles.len();
        store.articles.retain(|article| article.id != id);
        if store.articles.len() == before {
            return Err(RepoError::NotFound);
        }
        store.comments.retain(|comment| comment.article_id != id);
        Ok(())
    }
}

#[async_trait]
impl CommentsRepo for InMemoryRepositories {
    async fn list_for_article(&self, article_id: Uuid) -> Result<Vec<CommentRecord>, RepoError> {
        let store = self.store.read().await;
        let mut comments: Vec<CommentRecord> = store
            .comments
            .iter()
            .filter(|comment| comment.article_id == article_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| a.thread.cmp(&b.thread));
        Ok(comments)
    }

    async fn find_comment(&self, id: Uuid) -> Result<Option<CommentRecord>, RepoError> {
        let store = self.store.read().await;
        Ok(store.comments.iter().find(|c| c.id == id).cloned())
    }

    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentRecord, RepoError> {
        let mut store = self.store.write().await;
        store.article_mut(params.article_id)?;

        let parent = params.parent_id.and_then(|parent_id| {
            store
                .comments
                .iter()
                .find(|c| c.id == parent_id && c.article_id == params.article_id)
                .cloned()
        });
        let parent_id = parent.as_ref().map(|p| p.id);
        let ordinal = next_ordinal(
            store
                .comments
                .iter()
                .filter(|c| c.article_id == params.article_id && c.parent_id == parent_id)
                .map(|c| c.thread.as_str()),
        )
        .ok_or_else(|| RepoError::InvalidInput {
            message: "comment thread has no room for another reply".to_string(),
        })?;
        let thread = child_thread(parent.as_ref().map(|p| p.thread.as_str()), ordinal);

        let comment = CommentRecord {
            id: Uuid::new_v4(),
            article_id: params.article_id,
            parent_id,
            name: params.name,
            email: params.email,
            homepage: params.homepage,
            title: params.title,
            body: params.body,
            thread,
            published: params.published,
        };
        store.comments.push(comment.clone());
        store.refresh_comment_count(params.article_id);
        Ok(comment)
    }

    async fn first_comment(&self) -> Result<Option<CommentRecord>, RepoError> {
        let store = self.store.read().await;
        Ok(store
            .comments
            .iter()
            .min_by_key(|comment| comment.published)
            .cloned())
    }

    async fn delete_comment(&self, id: Uuid) -> Result<(), RepoError> {
        let mut store = self.store.write().await;
        let target = store
            .comments
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or(RepoError::NotFound)?;

        // Replies go with their parent.
        let prefix = format!("{}.", target.thread);
        store.comments.retain(|c| {
            c.article_id != target.article_id
                || (c.id != target.id && !c.thread.starts_with(&prefix))
        });
        store.refresh_comment_count(target.article_id);
        Ok(())
    }
}

#[async_trait]
impl HealthRepo for InMemoryRepositories {
    async fn health_check(&self) -> Result<(), RepoError> {
        Ok(())
    }
}
