//! Permalink derivation for articles and blog entries.
//!
//! A permalink is the canonical, path-derived identifier of an article. Undated
//! articles use a friendly form of their title (`Hello-World`); blog entries are
//! prefixed with the publication year and month (`2008/5/Hello-World`, month not
//! zero padded). Chinese titles are transliterated through `pinyin` first so they
//! do not collapse into an empty permalink.

use std::future::Future;

use once_cell::sync::Lazy;
use pinyin::{Pinyin, ToPinyin};
use regex::Regex;
use thiserror::Error;
use time::OffsetDateTime;

use crate::domain::types::ArticleType;

const MAX_SUFFIX_ATTEMPTS: usize = 32;

static WHITESPACE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern must compile"));
static NON_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_-]").expect("word pattern must compile"));
static DASH_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"-+").expect("dash pattern must compile"));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PermalinkError {
    #[error("permalink source title is empty")]
    EmptyTitle,
    #[error("title `{title}` does not contain any usable characters")]
    Unrepresentable { title: String },
    #[error("exhausted attempts to find a free permalink for `{base}`")]
    Exhausted { base: String },
}

#[derive(Debug, Error)]
pub enum PermalinkAsyncError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    #[error(transparent)]
    Permalink(#[from] PermalinkError),
    #[error(transparent)]
    Predicate(E),
}

/// Turn a title into the friendly URL segment used by permalinks.
pub fn friendly_url(title: &str) -> Result<String, PermalinkError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(PermalinkError::EmptyTitle);
    }

    let transliterated = transliterate_to_ascii(trimmed);
    let dashed = WHITESPACE_RUN.replace_all(transliterated.trim(), "-");
    let word_only = NON_WORD.replace_all(&dashed, "");
    let collapsed = DASH_RUN.replace_all(&word_only, "-");
    let candidate = collapsed.trim_matches('-');

    if candidate.is_empty() {
        return Err(PermalinkError::Unrepresentable {
            title: title.to_string(),
        });
    }

    Ok(candidate.to_string())
}

/// Derive the permalink of a new article from its type, title and publication time.
pub fn permalink_for(
    article_type: ArticleType,
    title: &str,
    published: OffsetDateTime,
) -> Result<String, PermalinkError> {
    let friendly = friendly_url(title)?;
    Ok(match article_type {
        ArticleType::Article => friendly,
        ArticleType::BlogEntry => format!(
            "{}/{}/{}",
            published.year(),
            u8::from(published.month()),
            friendly
        ),
    })
}

/// Permalink of a blog entry addressed by its URL segments.
pub fn blog_entry_permalink(year: i32, month: u8, stem: &str) -> String {
    format!("{year}/{month}/{stem}")
}

/// Find a permalink that is not taken yet, suffixing `-2`, `-3`, … on collision.
///
/// `is_free` must resolve to `true` when no stored article uses the candidate.
pub async fn unique_permalink<F, Fut, E>(
    base: &str,
    mut is_free: F,
) -> Result<String, PermalinkAsyncError<E>>
where
    F: FnMut(&str) -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    if is_free(base).await.map_err(PermalinkAsyncError::Predicate)? {
        return Ok(base.to_string());
    }

    for attempt in 2..=MAX_SUFFIX_ATTEMPTS + 1 {
        let candidate = format!("{base}-{attempt}");
        if is_free(&candidate)
            .await
            .map_err(PermalinkAsyncError::Predicate)?
        {
            return Ok(candidate);
        }
    }

    Err(PermalinkAsyncError::Permalink(PermalinkError::Exhausted {
        base: base.to_string(),
    }))
}

fn transliterate_to_ascii(input: &str) -> String {
    let mut output = String::with_capacity(input.len());

    for ch in input.chars() {
        if ch.is_ascii() {
            output.push(ch);
            continue;
        }

        match ch.to_pinyin() {
            Some(py) => append_pinyin(&mut output, py),
            None if ch.is_whitespace() => output.push(' '),
            // Dropped later by the word filter.
            None => output.push(ch),
        }
    }

    output
}

fn append_pinyin(buffer: &mut String, pinyin: Pinyin) {
    if !buffer.is_empty() && !buffer.ends_with(' ') {
        buffer.push(' ');
    }
    buffer.push_str(pinyin.plain());
    buffer.push(' ');
}
