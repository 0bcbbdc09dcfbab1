//! Path resolution: from an addressed resource to a stored article.
//!
//! Undated article paths go through a fixed chain on GET: the legacy alias
//! table, then the legacy-ID pattern of the previous blog software, then the
//! canonical permalink. Writes only ever address canonical permalinks.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::application::dispatch::Verb;
use crate::application::repos::{ArticlesRepo, RepoError};
use crate::application::routing::Resource;
use crate::domain::entities::ArticleRecord;
use crate::domain::permalink::blog_entry_permalink;
use crate::domain::types::LegacySoftware;

static DRUPAL_NODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^node/(\d+)").expect("drupal node pattern must compile"));

/// Precomputed redirects from old URL paths, matched case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    redirects: HashMap<String, String>,
}

impl AliasTable {
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let redirects = entries
            .into_iter()
            .map(|(from, to)| (normalize_alias_key(from.as_ref()), to.into()))
            .collect();
        Self { redirects }
    }

    /// Add entries, replacing any existing alias that matches case-insensitively.
    pub fn extend<I, K, V>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        self.redirects.extend(
            entries
                .into_iter()
                .map(|(from, to)| (normalize_alias_key(from.as_ref()), to.into())),
        );
    }

    pub fn lookup(&self, path: &str) -> Option<&str> {
        self.redirects
            .get(&normalize_alias_key(path))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.redirects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.redirects.is_empty()
    }
}

fn normalize_alias_key(path: &str) -> String {
    path.trim().trim_matches('/').to_lowercase()
}

/// Extracts the identifier an old blog engine embedded in its URLs.
pub trait LegacyIdPattern: Send + Sync {
    fn extract<'a>(&self, path: &'a str) -> Option<&'a str>;
}

/// Drupal's `node/<nid>` URLs.
#[derive(Debug, Clone, Copy, Default)]
pub struct DrupalNodePattern;

impl LegacyIdPattern for DrupalNodePattern {
    fn extract<'a>(&self, path: &'a str) -> Option<&'a str> {
        DRUPAL_NODE
            .captures(path)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }
}

pub fn legacy_pattern_for(software: LegacySoftware) -> Arc<dyn LegacyIdPattern> {
    match software {
        LegacySoftware::Drupal => Arc::new(DrupalNodePattern),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStrategy {
    LegacyId,
    Permalink,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The path is a legacy alias; the client should be sent to the target.
    Redirect(String),
    Found {
        article: Box<ArticleRecord>,
        strategy: ResolutionStrategy,
    },
    NotFound,
}

impl Resolution {
    fn found(article: ArticleRecord, strategy: ResolutionStrategy) -> Self {
        Resolution::Found {
            article: Box::new(article),
            strategy,
        }
    }

    pub fn into_article(self) -> Option<ArticleRecord> {
        match self {
            Resolution::Found { article, .. } => Some(*article),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct PathResolver {
    aliases: Arc<AliasTable>,
    legacy: Option<Arc<dyn LegacyIdPattern>>,
    articles: Arc<dyn ArticlesRepo>,
}

impl PathResolver {
    pub fn new(
        aliases: AliasTable,
        legacy: Option<Arc<dyn LegacyIdPattern>>,
        articles: Arc<dyn ArticlesRepo>,
    ) -> Self {
        Self {
            aliases: Arc::new(aliases),
            legacy,
            articles,
        }
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    /// Resolve an article-addressing resource for the given verb.
    pub async fn resolve(
        &self,
        resource: &Resource,
        verb: Verb,
    ) -> Result<Resolution, RepoError> {
        match resource {
            Resource::Article(path) if verb == Verb::Get => self.resolve_read(path).await,
            Resource::Article(path) => self.resolve_permalink(path).await,
            Resource::BlogEntry { year, month, stem } => {
                self.resolve_permalink(&blog_entry_permalink(*year, *month, stem))
                    .await
            }
            _ => Ok(Resolution::NotFound),
        }
    }

    async fn resolve_read(&self, path: &str) -> Result<Resolution, RepoError> {
        if let Some(target) = self.aliases.lookup(path) {
            debug!(
                target = "pagina::resolver",
                path, redirect = target, "legacy alias matched"
            );
            return Ok(Resolution::Redirect(target.to_string()));
        }

        if let Some(pattern) = self.legacy.as_ref()
            && let Some(legacy_id) = pattern.extract(path)
            && let Some(article) = self.articles.find_by_legacy_id(legacy_id).await?
        {
            debug!(
                target = "pagina::resolver",
                path, legacy_id, permalink = %article.permalink, "legacy id matched"
            );
            return Ok(Resolution::found(article, ResolutionStrategy::LegacyId));
        }

        self.resolve_permalink(path).await
    }

    async fn resolve_permalink(&self, permalink: &str) -> Result<Resolution, RepoError> {
        Ok(match self.articles.find_by_permalink(permalink).await? {
            Some(article) => Resolution::found(article, ResolutionStrategy::Permalink),
            None => Resolution::NotFound,
        })
    }
}
