//! The comment side of the mutation pipeline.

use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{debug, info};
use url::Url;

use crate::application::auth::Principal;
use crate::application::error::AppError;
use crate::application::markup::MarkupRenderer;
use crate::application::properties::{NewComment, SubmittedForm};
use crate::application::repos::{CommentsRepo, CreateCommentParams, RepoError};
use crate::domain::entities::{ArticleRecord, CommentRecord};
use crate::domain::thread::parent_comment_id;

const ANONYMOUS_NAME: &str = "Anonymous";

#[derive(Clone)]
pub struct CommentService {
    comments: Arc<dyn CommentsRepo>,
    markup: Arc<MarkupRenderer>,
}

impl CommentService {
    pub fn new(comments: Arc<dyn CommentsRepo>, markup: Arc<MarkupRenderer>) -> Self {
        Self { comments, markup }
    }

    /// Add a comment to `article`, threading it under the comment named by `key`.
    pub async fn add(
        &self,
        article: &ArticleRecord,
        form: &SubmittedForm,
        author: Option<&Principal>,
    ) -> Result<CommentRecord, AppError> {
        let submission = NewComment::from_form(form, OffsetDateTime::now_utc())?;
        let parent_id = self.parent_for(article, submission.key.as_deref()).await?;

        let name = submission
            .name
            .or_else(|| author.map(|p| p.name.clone()))
            .unwrap_or_else(|| ANONYMOUS_NAME.to_string());
        let email = submission
            .email
            .or_else(|| author.and_then(|p| p.email.clone()))
            .unwrap_or_default();

        let comment = self
            .comments
            .create_comment(CreateCommentParams {
                article_id: article.id,
                parent_id,
                name,
                email,
                homepage: submission.homepage.and_then(|link| linkable_homepage(&link)),
                title: submission.title,
                body: self.markup.sanitize_comment(&submission.body),
                published: submission.published,
            })
            .await
            .map_err(|err| match err {
                RepoError::NotFound => AppError::NotFound,
                other => AppError::Repo(other),
            })?;

        info!(
            target = "pagina::comments",
            permalink = %article.permalink,
            thread = %comment.thread,
            "comment added"
        );
        Ok(comment)
    }

    async fn parent_for(
        &self,
        article: &ArticleRecord,
        key: Option<&str>,
    ) -> Result<Option<uuid::Uuid>, AppError> {
        let Some(id) = key.and_then(parent_comment_id) else {
            return Ok(None);
        };
        match self.comments.find_comment(id).await? {
            Some(parent) if parent.article_id == article.id => Ok(Some(parent.id)),
            _ => {
                debug!(
                    target = "pagina::comments",
                    parent = %id,
                    "reply target unknown; posting top-level"
                );
                Ok(None)
            }
        }
    }
}

/// Keep a commenter homepage only when it is an absolute `http(s)` URL.
fn linkable_homepage(raw: &str) -> Option<String> {
    match Url::parse(raw.trim()) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Some(url.into()),
        _ => {
            debug!(target = "pagina::comments", homepage = raw, "dropping unlinkable homepage");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::repos::{ArticlesRepo, ArticlesWriteRepo, CreateArticleParams};
    use crate::domain::entities::AssociatedData;
    use crate::domain::types::{ArticleType, MarkupFormat, Role};
    use crate::infra::memory::InMemoryRepositories;
    use time::macros::datetime;

    async fn setup() -> (Arc<InMemoryRepositories>, CommentService, ArticleRecord) {
        let repos = Arc::new(InMemoryRepositories::new());
        let article = repos
            .create_article(CreateArticleParams {
                permalink: "About".to_string(),
                article_type: ArticleType::Article,
                title: "About".to_string(),
                body: "b".to_string(),
                html: "b".to_string(),
                format: MarkupFormat::Html,
                tags: Vec::new(),
                legacy_id: None,
                published: datetime!(2009-01-01 00:00:00 UTC),
                updated: datetime!(2009-01-01 00:00:00 UTC),
                associated: AssociatedData::default(),
            })
            .await
            .unwrap();
        let service = CommentService::new(repos.clone(), Arc::new(MarkupRenderer::new()));
        (repos, service, article)
    }

    fn form(pairs: &[(&str, &str)]) -> SubmittedForm {
        pairs.iter().copied().collect()
    }

    #[tokio::test]
    async fn replies_nest_under_their_parent() {
        let (repos, service, article) = setup().await;
        let first = service
            .add(&article, &form(&[("body", "first")]), None)
            .await
            .unwrap();
        let second = service
            .add(&article, &form(&[("body", "second")]), None)
            .await
            .unwrap();
        let key = format!("/About#{}", first.anchor());
        let reply = service
            .add(&article, &form(&[("body", "reply"), ("key", key.as_str())]), None)
            .await
            .unwrap();

        assert_eq!(first.thread, "001");
        assert_eq!(second.thread, "002");
        assert_eq!(reply.thread, "001.001");
        assert_eq!(reply.parent_id, Some(first.id));

        let stored = repos.find_by_permalink("About").await.unwrap().unwrap();
        assert_eq!(stored.num_comments, 3);
    }

    #[tokio::test]
    async fn unknown_parents_fall_back_to_top_level() {
        let (_repos, service, article) = setup().await;
        let comment = service
            .add(
                &article,
                &form(&[
                    ("body", "orphan"),
                    ("key", "/About#comment-00000000000000000000000000000000"),
                ]),
                None,
            )
            .await
            .unwrap();
        assert_eq!(comment.thread, "001");
        assert_eq!(comment.parent_id, None);
    }

    #[tokio::test]
    async fn author_details_default_from_the_principal() {
        let (_repos, service, article) = setup().await;
        let principal = Principal {
            name: "reader".to_string(),
            email: Some("reader@example.com".to_string()),
            role: Role::User,
        };
        let comment = service
            .add(
                &article,
                &form(&[("body", "<b>hi</b><script>x</script>")]),
                Some(&principal),
            )
            .await
            .unwrap();
        assert_eq!(comment.name, "reader");
        assert_eq!(comment.email, "reader@example.com");
        assert_eq!(comment.body, "<b>hi</b>");
    }

    #[test]
    fn only_web_homepages_are_kept() {
        assert_eq!(
            linkable_homepage("https://example.com/me").as_deref(),
            Some("https://example.com/me")
        );
        assert_eq!(
            linkable_homepage(" http://example.com ").as_deref(),
            Some("http://example.com/")
        );
        assert_eq!(linkable_homepage("javascript:alert(1)"), None);
        assert_eq!(linkable_homepage("JavaScript:alert(1)"), None);
        assert_eq!(linkable_homepage("data:text/html,hi"), None);
        assert_eq!(linkable_homepage("example.com"), None);
    }

    #[tokio::test]
    async fn comments_need_a_body() {
        let (_repos, service, article) = setup().await;
        let err = service
            .add(&article, &form(&[("name", "x")]), None)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }
}
