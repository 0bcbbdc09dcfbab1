use crate::application::articles::{ArticleDetail, ArticleListing, Listing};
use crate::application::error::{ErrorReport, HttpError};
use crate::domain::entities::{ArticleRecord, CommentRecord};
use askama::{Error as AskamaError, Template};
use axum::{
    http::{HeaderValue, StatusCode, header::CACHE_CONTROL},
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::{OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};

/// Error pages are static; let browsers and proxies hold on to them.
pub const ERROR_PAGE_CACHE_CONTROL: &str = "public, max-age=36000";

const DISPLAY_DATE: &[BorrowedFormatItem<'static>] =
    format_description!("[month repr:long] [day padding:none], [year]");
const ISO_DATE: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

pub fn render_not_found_response(chrome: LayoutChrome) -> Response {
    render_error_page(
        chrome,
        ErrorPageView::not_found(),
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
}

pub fn render_unauthorized_response(
    chrome: LayoutChrome,
    status: StatusCode,
    detail: impl Into<String>,
) -> Response {
    render_error_page(chrome, ErrorPageView::unauthorized(), status, detail)
}

fn render_error_page(
    chrome: LayoutChrome,
    content: ErrorPageView,
    status: StatusCode,
    detail: impl Into<String>,
) -> Response {
    let view = LayoutContext::new(chrome, content);
    let mut response = render_template_response(ErrorTemplate { view }, status);
    if response.status() == status {
        response.headers_mut().insert(
            CACHE_CONTROL,
            HeaderValue::from_static(ERROR_PAGE_CACHE_CONTROL),
        );
    }
    ErrorReport::from_message("presentation::views::render_error_page", status, detail)
        .attach(&mut response);
    response
}

#[derive(Clone)]
pub struct BrandView {
    pub title: String,
    pub description: String,
    pub href: String,
}

#[derive(Clone)]
pub struct PageMetaView {
    pub title: String,
    pub feed_href: String,
}

/// Site-wide pieces every page shares.
#[derive(Clone)]
pub struct LayoutChrome {
    pub brand: BrandView,
    pub meta: PageMetaView,
    /// The viewer holds the admin role and sees edit affordances.
    pub can_edit: bool,
}

impl LayoutChrome {
    pub fn new(title: &str, description: &str) -> Self {
        Self {
            brand: BrandView {
                title: title.to_string(),
                description: description.to_string(),
                href: "/".to_string(),
            },
            meta: PageMetaView {
                title: title.to_string(),
                feed_href: "/atom.xml".to_string(),
            },
            can_edit: false,
        }
    }

    pub fn with_title(self, page_title: &str) -> Self {
        let title = format!("{page_title} | {}", self.brand.title);
        Self {
            meta: PageMetaView {
                title,
                ..self.meta
            },
            ..self
        }
    }

    pub fn with_can_edit(self, can_edit: bool) -> Self {
        Self { can_edit, ..self }
    }
}

#[derive(Clone)]
pub struct LayoutContext<T> {
    pub brand: BrandView,
    pub meta: PageMetaView,
    pub can_edit: bool,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(chrome: LayoutChrome, content: T) -> Self {
        Self {
            brand: chrome.brand,
            meta: chrome.meta,
            can_edit: chrome.can_edit,
            content,
        }
    }
}

#[derive(Clone)]
pub struct TagBadge {
    pub label: String,
    pub href: String,
}

#[derive(Clone)]
pub struct ArticleSummaryView {
    pub href: String,
    pub title: String,
    pub html: String,
    pub published: String,
    pub iso_date: String,
    pub tags: Vec<TagBadge>,
    pub num_comments: i32,
}

impl From<&ArticleRecord> for ArticleSummaryView {
    fn from(article: &ArticleRecord) -> Self {
        Self {
            href: article.path(),
            title: article.title.clone(),
            html: article.html.clone(),
            published: display_date(article.published),
            iso_date: iso_date(article.published),
            tags: build_tag_badges(&article.tags),
            num_comments: article.num_comments,
        }
    }
}

pub struct ListingView {
    pub heading: String,
    pub articles: Vec<ArticleSummaryView>,
    pub has_results: bool,
    pub previous_href: Option<String>,
    pub next_href: Option<String>,
    /// Where the admin "new entry" form posts, if this listing accepts one.
    pub create_href: Option<String>,
    pub search_term: String,
}

impl ListingView {
    pub fn from_listing(listing: &ArticleListing, path: &str) -> Self {
        let extra = match &listing.listing {
            Listing::Search(term) => format!("s={}&", encode_query_value(term)),
            _ => String::new(),
        };
        let previous_href = (listing.page > 1)
            .then(|| format!("{path}?{extra}page={}", listing.page - 1));
        let next_href = listing
            .has_more
            .then(|| format!("{path}?{extra}page={}", listing.page + 1));
        let create_href = match &listing.listing {
            Listing::Recent => Some("/".to_string()),
            Listing::Month { .. } => Some(path.to_string()),
            _ => None,
        };
        let search_term = match &listing.listing {
            Listing::Search(term) => term.clone(),
            _ => String::new(),
        };

        Self {
            heading: listing.heading.clone(),
            has_results: !listing.articles.is_empty(),
            articles: listing.articles.iter().map(ArticleSummaryView::from).collect(),
            previous_href,
            next_href,
            create_href,
            search_term,
        }
    }
}

#[derive(Template)]
#[template(path = "articles.html")]
pub struct ArticlesTemplate {
    pub view: LayoutContext<ListingView>,
}

#[derive(Clone)]
pub struct CommentView {
    pub anchor: String,
    pub name: String,
    pub homepage: Option<String>,
    pub title: Option<String>,
    pub body: String,
    pub published: String,
    pub depth: usize,
}

impl From<&CommentRecord> for CommentView {
    fn from(comment: &CommentRecord) -> Self {
        Self {
            anchor: comment.anchor(),
            name: comment.name.clone(),
            homepage: comment.homepage.clone(),
            title: comment.title.clone(),
            body: comment.body.clone(),
            published: display_date(comment.published),
            depth: comment.depth(),
        }
    }
}

pub struct ArticleView {
    pub article: ArticleSummaryView,
    pub body: String,
    pub format: &'static str,
    pub tags_value: String,
    pub two_columns: bool,
    pub relevant_links: Option<String>,
    pub amazon_items: Option<String>,
    pub comments: Vec<CommentView>,
}

impl From<&ArticleDetail> for ArticleView {
    fn from(detail: &ArticleDetail) -> Self {
        let article = &detail.article;
        Self {
            article: ArticleSummaryView::from(article),
            body: article.body.clone(),
            format: article.format.as_str(),
            tags_value: article.tags.join(", "),
            two_columns: article.is_big(),
            relevant_links: article.associated.relevant_links.clone(),
            amazon_items: article.associated.amazon_items.clone(),
            comments: detail.comments.iter().map(CommentView::from).collect(),
        }
    }
}

#[derive(Template)]
#[template(path = "article.html")]
pub struct ArticleTemplate {
    pub view: LayoutContext<ArticleView>,
}

pub struct ErrorPageView {
    pub title: String,
    pub message: String,
    pub primary_action: Option<ErrorAction>,
}

impl ErrorPageView {
    pub fn not_found() -> Self {
        Self {
            title: "Page Not Found".to_string(),
            message: "The page you requested does not exist.".to_string(),
            primary_action: Some(ErrorAction::home()),
        }
    }

    pub fn unauthorized() -> Self {
        Self {
            title: "Not Authorized".to_string(),
            message: "You are not allowed to do that. Sign in with a token that carries the required role."
                .to_string(),
            primary_action: Some(ErrorAction::home()),
        }
    }
}

pub struct ErrorAction {
    pub href: String,
    pub label: String,
}

impl ErrorAction {
    pub fn home() -> Self {
        Self {
            href: "/".to_string(),
            label: "Back to home".to_string(),
        }
    }
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}

pub fn build_tag_badges(tags: &[String]) -> Vec<TagBadge> {
    tags.iter()
        .map(|tag| TagBadge {
            label: tag.clone(),
            href: format!("/tag/{}", encode_path_segment(tag)),
        })
        .collect()
}

fn display_date(instant: OffsetDateTime) -> String {
    instant
        .format(DISPLAY_DATE)
        .unwrap_or_else(|_| instant.date().to_string())
}

fn iso_date(instant: OffsetDateTime) -> String {
    instant
        .format(ISO_DATE)
        .unwrap_or_else(|_| instant.date().to_string())
}

fn encode_path_segment(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

fn encode_query_value(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::AssociatedData;
    use crate::domain::types::{ArticleType, MarkupFormat};
    use time::macros::datetime;
    use uuid::Uuid;

    fn entry(title: &str, tags: &[&str]) -> ArticleRecord {
        let published = datetime!(2008-05-04 10:00 UTC);
        ArticleRecord {
            id: Uuid::nil(),
            permalink: format!("2008/5/{title}"),
            article_type: ArticleType::BlogEntry,
            title: title.to_string(),
            body: "<p>body</p>".to_string(),
            html: "<p>body</p>".to_string(),
            format: MarkupFormat::Html,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            legacy_id: None,
            published,
            updated: published,
            num_comments: 0,
            associated: AssociatedData::default(),
        }
    }

    #[test]
    fn summaries_link_tags_and_format_dates() {
        let view = ArticleSummaryView::from(&entry("Hello", &["App Engine"]));
        assert_eq!(view.href, "/2008/5/Hello");
        assert_eq!(view.published, "May 4, 2008");
        assert_eq!(view.iso_date, "2008-05-04");
        assert_eq!(view.tags[0].href, "/tag/App%20Engine");
    }

    #[test]
    fn search_paging_keeps_the_term() {
        let listing = ArticleListing {
            listing: Listing::Search("rust lang".to_string()),
            heading: "Search results for rust lang".to_string(),
            articles: vec![entry("Hello", &[])],
            page: 2,
            has_more: true,
        };
        let view = ListingView::from_listing(&listing, "/search");
        assert_eq!(
            view.previous_href.as_deref(),
            Some("/search?s=rust+lang&page=1")
        );
        assert_eq!(view.next_href.as_deref(), Some("/search?s=rust+lang&page=3"));
        assert!(view.create_href.is_none());
    }

    #[test]
    fn error_pages_are_publicly_cacheable() {
        let response = render_not_found_response(LayoutChrome::new("Blog", ""));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get(CACHE_CONTROL).unwrap(),
            ERROR_PAGE_CACHE_CONTROL
        );
        assert!(response.extensions().get::<ErrorReport>().is_some());
    }

    #[test]
    fn article_page_renders_comments_and_edit_form() {
        let detail = ArticleDetail {
            article: entry("Hello", &["rust"]),
            comments: vec![CommentRecord {
                id: Uuid::nil(),
                article_id: Uuid::nil(),
                parent_id: None,
                name: "Ann".to_string(),
                email: String::new(),
                homepage: None,
                title: None,
                body: "<p>Nice</p>".to_string(),
                thread: "001".to_string(),
                published: datetime!(2008-05-05 10:00 UTC),
            }],
        };
        let chrome = LayoutChrome::new("Blog", "").with_can_edit(true);
        let html = ArticleTemplate {
            view: LayoutContext::new(chrome, ArticleView::from(&detail)),
        }
        .render()
        .expect("article renders");

        assert!(html.contains("<p>Nice</p>"));
        assert!(html.contains("_method=PUT"));
        assert!(html.contains("_method=DELETE"));

        let anonymous = ArticleTemplate {
            view: LayoutContext::new(LayoutChrome::new("Blog", ""), ArticleView::from(&detail)),
        }
        .render()
        .expect("article renders");
        assert!(!anonymous.contains("_method=PUT"));
    }
}
