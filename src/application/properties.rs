//! Submitted property sets for the write operations.
//!
//! Forms arrive urlencoded in the body and may also carry fields in the query
//! string (the body wins). Empty values count as not sent.

use std::collections::HashMap;

use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

use crate::domain::entities::AssociatedData;
use crate::domain::error::DomainError;
use crate::domain::types::MarkupFormat;

const SUBMITTED_DATETIME: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmittedForm {
    fields: HashMap<String, String>,
}

impl SubmittedForm {
    pub fn parse(query: Option<&str>, body: &[u8]) -> Self {
        let mut fields = HashMap::new();
        let query_pairs = query
            .map(|q| url::form_urlencoded::parse(q.as_bytes()))
            .into_iter()
            .flatten();
        for (key, value) in query_pairs.chain(url::form_urlencoded::parse(body)) {
            if value.trim().is_empty() {
                continue;
            }
            fields.insert(key.into_owned(), value.into_owned());
        }
        Self { fields }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn require(&self, key: &'static str) -> Result<&str, DomainError> {
        self.get(key)
            .ok_or_else(|| DomainError::validation(key, "is required"))
    }

    fn owned(&self, key: &str) -> Option<String> {
        self.get(key).map(str::to_string)
    }
}

impl<K, V> FromIterator<(K, V)> for SubmittedForm
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let fields = iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(_, v): &(String, String)| !v.trim().is_empty())
            .collect();
        Self { fields }
    }
}

/// Parse `YYYY-MM-DD HH:MM:SS` as UTC; absent means `now`.
pub fn parse_datetime(
    field: &'static str,
    value: Option<&str>,
    now: OffsetDateTime,
) -> Result<OffsetDateTime, DomainError> {
    match value {
        None => Ok(now),
        Some(raw) => PrimitiveDateTime::parse(raw.trim(), SUBMITTED_DATETIME)
            .map(PrimitiveDateTime::assume_utc)
            .map_err(|err| DomainError::validation(field, format!("`{raw}` is not a timestamp: {err}"))),
    }
}

/// Comma separated tags; `None` when nothing usable was sent.
pub fn parse_tags(value: Option<&str>) -> Option<Vec<String>> {
    let tags: Vec<String> = value?
        .split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect();
    (!tags.is_empty()).then_some(tags)
}

pub fn parse_format(value: Option<&str>) -> MarkupFormat {
    MarkupFormat::from_submitted(value)
}

/// 1-based `page` parameter; anything unparsable is the first page.
pub fn page_number(value: Option<&str>) -> u32 {
    value
        .and_then(|raw| raw.trim().parse::<u32>().ok())
        .filter(|page| *page > 0)
        .unwrap_or(1)
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewArticle {
    pub title: String,
    pub body: String,
    pub format: MarkupFormat,
    pub tags: Vec<String>,
    pub legacy_id: Option<String>,
    pub published: OffsetDateTime,
    pub updated: OffsetDateTime,
    pub associated: AssociatedData,
}

impl NewArticle {
    pub fn from_form(form: &SubmittedForm, now: OffsetDateTime) -> Result<Self, DomainError> {
        Ok(Self {
            title: form.require("title")?.to_string(),
            body: form.require("body")?.to_string(),
            format: parse_format(form.get("format")),
            tags: parse_tags(form.get("tags")).unwrap_or_default(),
            legacy_id: form.owned("legacy_id"),
            published: parse_datetime("published", form.get("published"), now)?,
            updated: parse_datetime("updated", form.get("updated"), now)?,
            associated: AssociatedData {
                relevant_links: form.owned("relevant_links"),
                amazon_items: form.owned("amazon_items"),
            },
        })
    }
}

/// Partial update of an existing article. `updated` is always refreshed.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleEdit {
    pub title: Option<String>,
    pub body: Option<String>,
    pub format: Option<MarkupFormat>,
    pub tags: Option<Vec<String>>,
    pub updated: OffsetDateTime,
}

impl ArticleEdit {
    pub fn from_form(form: &SubmittedForm, now: OffsetDateTime) -> Result<Self, DomainError> {
        let edit = Self {
            title: form.owned("title"),
            body: form.owned("body"),
            format: form.contains("format").then(|| parse_format(form.get("format"))),
            tags: parse_tags(form.get("tags")),
            updated: parse_datetime("updated", form.get("updated"), now)?,
        };
        if edit.is_empty() {
            return Err(DomainError::validation(
                "article",
                "no editable property was sent",
            ));
        }
        Ok(edit)
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.body.is_none() && self.format.is_none() && self.tags.is_none()
    }

    pub fn rerenders(&self) -> bool {
        self.body.is_some() || self.format.is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewComment {
    pub name: Option<String>,
    pub email: Option<String>,
    pub homepage: Option<String>,
    pub title: Option<String>,
    pub body: String,
    /// Reply target in the form `<permalink>#comment-<id>`.
    pub key: Option<String>,
    pub published: OffsetDateTime,
}

impl NewComment {
    pub fn from_form(form: &SubmittedForm, now: OffsetDateTime) -> Result<Self, DomainError> {
        Ok(Self {
            name: form.owned("name"),
            email: form.owned("email"),
            homepage: form.owned("homepage"),
            title: form.owned("title"),
            body: form.require("body")?.to_string(),
            key: form.owned("key"),
            published: parse_datetime("published", form.get("published"), now)?,
        })
    }
}
