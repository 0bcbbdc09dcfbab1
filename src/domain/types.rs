//! Shared domain enumerations.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Articles live off the root (`/about`); blog entries are dated (`/2008/5/hello`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleType {
    Article,
    BlogEntry,
}

impl ArticleType {
    pub fn as_str(self) -> &'static str {
        match self {
            ArticleType::Article => "article",
            ArticleType::BlogEntry => "blog_entry",
        }
    }
}

impl TryFrom<&str> for ArticleType {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "article" => Ok(ArticleType::Article),
            "blog_entry" | "blog entry" => Ok(ArticleType::BlogEntry),
            _ => Err(()),
        }
    }
}

/// Source markup of an article body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkupFormat {
    #[default]
    Html,
    Markdown,
}

impl MarkupFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            MarkupFormat::Html => "html",
            MarkupFormat::Markdown => "markdown",
        }
    }

    /// Lenient parse used for submitted forms: anything unknown is HTML.
    pub fn from_submitted(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("markdown") | Some("md") => MarkupFormat::Markdown,
            _ => MarkupFormat::Html,
        }
    }
}

/// Write-protection roles. An admin satisfies every user requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn satisfies(self, required: Role) -> bool {
        self >= required
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role `{other}`")),
        }
    }
}

/// Blog software whose URL scheme is still honoured for old links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LegacySoftware {
    Drupal,
}

impl FromStr for LegacySoftware {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "drupal" => Ok(LegacySoftware::Drupal),
            other => Err(format!("unsupported legacy blog software `{other}`")),
        }
    }
}
