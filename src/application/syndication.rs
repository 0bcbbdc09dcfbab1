//! Atom feed of the latest blog entries.

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::application::articles::ArticleService;
use crate::application::error::AppError;
use crate::domain::entities::ArticleRecord;

pub const DEFAULT_FEED_SIZE: u32 = 10;

/// Site-level values the feed is stamped with.
#[derive(Debug, Clone)]
pub struct FeedMetadata {
    pub title: String,
    pub author: String,
    pub public_site_url: String,
    pub size: u32,
}

#[derive(Clone)]
pub struct SyndicationService {
    articles: ArticleService,
    metadata: FeedMetadata,
}

impl SyndicationService {
    pub fn new(articles: ArticleService, metadata: FeedMetadata) -> Self {
        Self { articles, metadata }
    }

    pub async fn atom_feed(&self) -> Result<String, AppError> {
        let entries = self.articles.latest_entries(self.metadata.size.max(1)).await?;
        Ok(render_atom(&self.metadata, &entries))
    }
}

/// Render the feed document. `<updated>` follows the newest entry, or the epoch when empty.
pub fn render_atom(metadata: &FeedMetadata, entries: &[ArticleRecord]) -> String {
    let base = normalize_public_site_url(&metadata.public_site_url);
    let updated = entries
        .first()
        .map(|article| article.updated)
        .unwrap_or(OffsetDateTime::UNIX_EPOCH);

    let mut body = String::new();
    for article in entries {
        let link = format!("{base}{}", article.permalink);
        body.push_str(&format!(
            "  <entry>\n    <title>{}</title>\n    <link href=\"{}\"/>\n    <id>{}</id>\n    <published>{}</published>\n    <updated>{}</updated>\n{}    <content type=\"html\">{}</content>\n  </entry>\n",
            xml_escape(&article.title),
            xml_escape(&link),
            xml_escape(&link),
            rfc3339(article.published),
            rfc3339(article.updated),
            article
                .tags
                .iter()
                .map(|tag| format!("    <category term=\"{}\"/>\n", xml_escape(tag)))
                .collect::<String>(),
            xml_escape(&article.html),
        ));
    }

    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<feed xmlns=\"http://www.w3.org/2005/Atom\">\n  <title>{}</title>\n  <id>{}</id>\n  <updated>{}</updated>\n  <author><name>{}</name></author>\n  <link href=\"{}\"/>\n  <link href=\"{}atom.xml\" rel=\"self\"/>\n{}</feed>\n",
        xml_escape(&metadata.title),
        xml_escape(&base),
        rfc3339(updated),
        xml_escape(&metadata.author),
        xml_escape(&base),
        xml_escape(&base),
        body
    )
}

fn rfc3339(instant: OffsetDateTime) -> String {
    instant
        .format(&Rfc3339)
        .unwrap_or_else(|_| instant.to_string())
}

fn normalize_public_site_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    format!("{trimmed}/")
}

fn xml_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
