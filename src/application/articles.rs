//! Article reads and the article side of the mutation pipeline.

use std::sync::Arc;

use time::{Date, Month, OffsetDateTime};
use tracing::{debug, info};

use crate::application::error::AppError;
use crate::application::markup::MarkupRenderer;
use crate::application::properties::{ArticleEdit, NewArticle, SubmittedForm};
use crate::application::repos::{
    ArticleQuery, ArticlesRepo, ArticlesWriteRepo, CommentsRepo, CreateArticleParams,
    PublishedRange, RepoError, UpdateArticleParams,
};
use crate::domain::entities::{ArticleRecord, CommentRecord};
use crate::domain::permalink::{PermalinkAsyncError, permalink_for, unique_permalink};
use crate::domain::types::ArticleType;

pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// What an article listing shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing {
    /// Blog entries on the front page.
    Recent,
    Year(i32),
    Month { year: i32, month: u8 },
    Tag(String),
    Search(String),
}

impl Listing {
    pub fn heading(&self) -> String {
        match self {
            Listing::Recent => "Recent entries".to_string(),
            Listing::Year(year) => format!("Articles for {year}"),
            Listing::Month { year, month } => format!("Articles for {month}/{year}"),
            Listing::Tag(tag) => format!("Articles tagged {tag}"),
            Listing::Search(term) => format!("Search results for {term}"),
        }
    }

    fn query(&self) -> Result<ArticleQuery, AppError> {
        let mut query = ArticleQuery::default();
        match self {
            Listing::Recent => query.article_type = Some(ArticleType::BlogEntry),
            Listing::Year(year) => {
                query.published = Some(year_window(*year).ok_or(AppError::NotFound)?);
            }
            Listing::Month { year, month } => {
                query.published = Some(month_window(*year, *month).ok_or(AppError::NotFound)?);
            }
            Listing::Tag(tag) => query.tag = Some(tag.clone()),
            Listing::Search(term) => query.search = Some(term.clone()),
        }
        Ok(query)
    }
}

/// `[Jan 1, next Jan 1)` of the given year.
pub fn year_window(year: i32) -> Option<PublishedRange> {
    let start = Date::from_calendar_date(year, Month::January, 1).ok()?;
    let end = Date::from_calendar_date(year.checked_add(1)?, Month::January, 1).ok()?;
    Some(PublishedRange {
        start: start.midnight().assume_utc(),
        end: end.midnight().assume_utc(),
    })
}

/// `[first of month, first of next month)`; `None` for months outside 1..=12.
pub fn month_window(year: i32, month: u8) -> Option<PublishedRange> {
    let month = Month::try_from(month).ok()?;
    let start = Date::from_calendar_date(year, month, 1).ok()?;
    let end = match month {
        Month::December => Date::from_calendar_date(year.checked_add(1)?, Month::January, 1),
        other => Date::from_calendar_date(year, other.next(), 1),
    }
    .ok()?;
    Some(PublishedRange {
        start: start.midnight().assume_utc(),
        end: end.midnight().assume_utc(),
    })
}

#[derive(Debug, Clone)]
pub struct ArticleListing {
    pub listing: Listing,
    pub heading: String,
    pub articles: Vec<ArticleRecord>,
    pub page: u32,
    pub has_more: bool,
}

#[derive(Debug, Clone)]
pub struct ArticleDetail {
    pub article: ArticleRecord,
    /// Sorted by thread, which is display order.
    pub comments: Vec<CommentRecord>,
}

/// Entities removable through the `DELETE /article` and `DELETE /comment` utility paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaintenanceTarget {
    Article,
    Comment,
}

impl MaintenanceTarget {
    pub fn from_path(path: &str) -> Option<Self> {
        match path.to_ascii_lowercase().as_str() {
            "article" => Some(MaintenanceTarget::Article),
            "comment" => Some(MaintenanceTarget::Comment),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct ArticleService {
    reader: Arc<dyn ArticlesRepo>,
    writer: Arc<dyn ArticlesWriteRepo>,
    comments: Arc<dyn CommentsRepo>,
    markup: Arc<MarkupRenderer>,
    page_size: u32,
}

impl ArticleService {
    pub fn new(
        reader: Arc<dyn ArticlesRepo>,
        writer: Arc<dyn ArticlesWriteRepo>,
        comments: Arc<dyn CommentsRepo>,
        markup: Arc<MarkupRenderer>,
        page_size: u32,
    ) -> Self {
        Self {
            reader,
            writer,
            comments,
            markup,
            page_size: page_size.max(1),
        }
    }

    pub async fn list(&self, listing: Listing, page: u32) -> Result<ArticleListing, AppError> {
        let page = page.max(1);
        let heading = listing.heading();

        if let Listing::Search(term) = &listing
            && term.trim().is_empty()
        {
            return Ok(ArticleListing {
                listing,
                heading: "Search".to_string(),
                articles: Vec::new(),
                page,
                has_more: false,
            });
        }

        let mut query = listing.query()?;
        query.limit = self.page_size;
        query.offset = (page - 1).saturating_mul(self.page_size);

        let result = self.reader.list_articles(&query).await?;
        debug!(
            target = "pagina::articles",
            heading = %heading,
            page,
            count = result.items.len(),
            "listed articles"
        );

        Ok(ArticleListing {
            listing,
            heading,
            articles: result.items,
            page,
            has_more: result.has_more,
        })
    }

    /// Latest blog entries for the feed.
    pub async fn latest_entries(&self, limit: u32) -> Result<Vec<ArticleRecord>, AppError> {
        let query = ArticleQuery {
            article_type: Some(ArticleType::BlogEntry),
            limit,
            ..ArticleQuery::default()
        };
        Ok(self.reader.list_articles(&query).await?.items)
    }

    pub async fn detail(&self, article: ArticleRecord) -> Result<ArticleDetail, AppError> {
        let mut comments = self.comments.list_for_article(article.id).await?;
        comments.sort_by(|a, b| a.thread.cmp(&b.thread));
        Ok(ArticleDetail { article, comments })
    }

    pub async fn create(
        &self,
        article_type: ArticleType,
        form: &SubmittedForm,
    ) -> Result<ArticleRecord, AppError> {
        let submission = NewArticle::from_form(form, OffsetDateTime::now_utc())?;
        let base = permalink_for(article_type, &submission.title, submission.published)?;

        let reader = self.reader.clone();
        let permalink = unique_permalink(&base, move |candidate| {
            let reader = reader.clone();
            let candidate = candidate.to_string();
            async move {
                reader
                    .find_by_permalink(&candidate)
                    .await
                    .map(|existing| existing.is_none())
            }
        })
        .await
        .map_err(|err| match err {
            PermalinkAsyncError::Permalink(err) => AppError::from(err),
            PermalinkAsyncError::Predicate(err) => AppError::Repo(err),
        })?;

        let html = self.markup.render_html(&submission.body, submission.format);
        let article = self
            .writer
            .create_article(CreateArticleParams {
                permalink,
                article_type,
                title: submission.title,
                body: submission.body,
                html,
                format: submission.format,
                tags: submission.tags,
                legacy_id: submission.legacy_id,
                published: submission.published,
                updated: submission.updated,
                associated: submission.associated,
            })
            .await?;

        info!(
            target = "pagina::articles",
            permalink = %article.permalink,
            article_type = article.article_type.as_str(),
            "article created"
        );
        Ok(article)
    }

    /// Apply a partial edit. The permalink never changes.
    pub async fn edit(
        &self,
        article: ArticleRecord,
        form: &SubmittedForm,
    ) -> Result<ArticleRecord, AppError> {
        let edit = ArticleEdit::from_form(form, OffsetDateTime::now_utc())?;
        let rerender = edit.rerenders();

        let body = edit.body.unwrap_or(article.body);
        let format = edit.format.unwrap_or(article.format);
        let html = if rerender {
            self.markup.render_html(&body, format)
        } else {
            article.html
        };

        let updated = self
            .writer
            .update_article(UpdateArticleParams {
                id: article.id,
                title: edit.title.unwrap_or(article.title),
                body,
                html,
                format,
                tags: edit.tags.unwrap_or(article.tags),
                updated: edit.updated,
            })
            .await
            .map_err(not_found_as_app)?;

        info!(
            target = "pagina::articles",
            permalink = %updated.permalink,
            rerendered = rerender,
            "article edited"
        );
        Ok(updated)
    }

    pub async fn delete(&self, article: &ArticleRecord) -> Result<(), AppError> {
        self.writer
            .delete_article(article.id)
            .await
            .map_err(not_found_as_app)?;
        info!(
            target = "pagina::articles",
            permalink = %article.permalink,
            "article deleted"
        );
        Ok(())
    }

    /// Delete the oldest stored entity of the given kind, returning its identifier.
    pub async fn delete_first(&self, target: MaintenanceTarget) -> Result<String, AppError> {
        let deleted = match target {
            MaintenanceTarget::Article => {
                let article = self.reader.first_article().await?.ok_or(AppError::NotFound)?;
                self.writer.delete_article(article.id).await?;
                article.permalink
            }
            MaintenanceTarget::Comment => {
                let comment = self.comments.first_comment().await?.ok_or(AppError::NotFound)?;
                self.comments.delete_comment(comment.id).await?;
                comment.anchor()
            }
        };
        info!(
            target = "pagina::articles",
            deleted = %deleted,
            kind = ?target,
            "maintenance delete"
        );
        Ok(deleted)
    }
}

fn not_found_as_app(err: RepoError) -> AppError {
    match err {
        RepoError::NotFound => AppError::NotFound,
        other => AppError::Repo(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::memory::InMemoryRepositories;
    use time::macros::datetime;

    fn service(repos: &Arc<InMemoryRepositories>, page_size: u32) -> ArticleService {
        ArticleService::new(
            repos.clone(),
            repos.clone(),
            repos.clone(),
            Arc::new(MarkupRenderer::new()),
            page_size,
        )
    }

    fn form(pairs: &[(&str, &str)]) -> SubmittedForm {
        pairs.iter().copied().collect()
    }

    #[test]
    fn month_windows_end_at_the_next_month() {
        let window = month_window(2008, 2).unwrap();
        assert_eq!(window.start, datetime!(2008-02-01 00:00:00 UTC));
        assert_eq!(window.end, datetime!(2008-03-01 00:00:00 UTC));
        assert!(window.contains(datetime!(2008-02-29 23:59:59 UTC)));

        let december = month_window(2008, 12).unwrap();
        assert_eq!(december.end, datetime!(2009-01-01 00:00:00 UTC));

        assert!(month_window(2008, 13).is_none());
        assert!(month_window(2008, 0).is_none());
    }

    #[test]
    fn year_windows_are_half_open() {
        let window = year_window(2008).unwrap();
        assert!(window.contains(datetime!(2008-12-31 23:59:59 UTC)));
        assert!(!window.contains(datetime!(2009-01-01 00:00:00 UTC)));
    }

    #[tokio::test]
    async fn created_blog_entries_get_dated_unique_permalinks() {
        let repos = Arc::new(InMemoryRepositories::new());
        let service = service(&repos, 10);
        let submitted = form(&[
            ("title", "Hello World"),
            ("body", "# Hi"),
            ("format", "markdown"),
            ("published", "2008-05-03 10:00:00"),
            ("tags", "rust, web"),
        ]);

        let first = service
            .create(ArticleType::BlogEntry, &submitted)
            .await
            .unwrap();
        assert_eq!(first.permalink, "2008/5/Hello-World");
        assert_eq!(first.html.trim(), "<h1>Hi</h1>");
        assert_eq!(first.tags, vec!["rust".to_string(), "web".to_string()]);

        let second = service
            .create(ArticleType::BlogEntry, &submitted)
            .await
            .unwrap();
        assert_eq!(second.permalink, "2008/5/Hello-World-2");
    }

    #[tokio::test]
    async fn create_rejects_missing_body() {
        let repos = Arc::new(InMemoryRepositories::new());
        let err = service(&repos, 10)
            .create(ArticleType::Article, &form(&[("title", "About")]))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn edits_keep_the_permalink_and_rerender() {
        let repos = Arc::new(InMemoryRepositories::new());
        let service = service(&repos, 10);
        let article = service
            .create(
                ArticleType::Article,
                &form(&[("title", "About"), ("body", "old")]),
            )
            .await
            .unwrap();

        let edited = service
            .edit(
                article,
                &form(&[
                    ("title", "About me"),
                    ("body", "*new*"),
                    ("format", "markdown"),
                ]),
            )
            .await
            .unwrap();
        assert_eq!(edited.permalink, "About");
        assert_eq!(edited.title, "About me");
        assert_eq!(edited.html.trim(), "<p><em>new</em></p>");
    }

    #[tokio::test]
    async fn listings_page_newest_first() {
        let repos = Arc::new(InMemoryRepositories::new());
        let service = service(&repos, 2);
        for day in 1..=3 {
            let title = format!("Entry {day}");
            let published = format!("2010-03-0{day} 12:00:00");
            service
                .create(
                    ArticleType::BlogEntry,
                    &form(&[
                        ("title", title.as_str()),
                        ("body", "text"),
                        ("published", published.as_str()),
                    ]),
                )
                .await
                .unwrap();
        }

        let first = service.list(Listing::Recent, 1).await.unwrap();
        let titles: Vec<_> = first.articles.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["Entry 3", "Entry 2"]);
        assert!(first.has_more);

        let second = service.list(Listing::Recent, 2).await.unwrap();
        assert_eq!(second.articles.len(), 1);
        assert!(!second.has_more);

        let month = service
            .list(Listing::Month { year: 2010, month: 3 }, 1)
            .await
            .unwrap();
        assert_eq!(month.heading, "Articles for 3/2010");

        let err = service
            .list(Listing::Month { year: 2010, month: 13 }, 1)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn maintenance_delete_removes_the_oldest_article() {
        let repos = Arc::new(InMemoryRepositories::new());
        let service = service(&repos, 10);
        for (title, published) in [("Newer", "2011-01-02 00:00:00"), ("Older", "2011-01-01 00:00:00")] {
            service
                .create(
                    ArticleType::Article,
                    &form(&[("title", title), ("body", "b"), ("published", published)]),
                )
                .await
                .unwrap();
        }

        let deleted = service
            .delete_first(MaintenanceTarget::Article)
            .await
            .unwrap();
        assert_eq!(deleted, "Older");

        let err = service
            .delete_first(MaintenanceTarget::Comment)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
