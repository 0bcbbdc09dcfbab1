//! Markup conversion for article bodies and comment sanitising.

use ammonia::Builder as AmmoniaBuilder;
use comrak::options::Options;

use crate::domain::types::MarkupFormat;

/// Converts stored article sources into the HTML served to readers.
///
/// Article bodies come from admins and may carry raw HTML; comments are
/// written by any user and always go through the sanitizer.
pub struct MarkupRenderer {
    options: Options<'static>,
    comments: AmmoniaBuilder<'static>,
}

impl MarkupRenderer {
    pub fn new() -> Self {
        Self {
            options: markdown_options(),
            comments: comment_sanitizer(),
        }
    }

    pub fn render_html(&self, body: &str, format: MarkupFormat) -> String {
        match format {
            MarkupFormat::Html => body.to_string(),
            MarkupFormat::Markdown => comrak::markdown_to_html(body, &self.options),
        }
    }

    pub fn sanitize_comment(&self, body: &str) -> String {
        self.comments.clean(body).to_string()
    }
}

impl Default for MarkupRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn markdown_options() -> Options<'static> {
    let mut options = Options::default();

    let ext = &mut options.extension;
    ext.strikethrough = true;
    ext.table = true;
    ext.autolink = true;
    ext.footnotes = true;

    let render = &mut options.render;
    render.r#unsafe = true;

    options
}

fn comment_sanitizer() -> AmmoniaBuilder<'static> {
    let mut builder = AmmoniaBuilder::default();
    builder.link_rel(Some("nofollow noopener noreferrer"));
    builder.url_schemes(["http", "https", "mailto"].into_iter().collect());
    builder
}
