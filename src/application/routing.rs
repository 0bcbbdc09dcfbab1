//! Classification of request paths into addressable resources.
//!
//! The URL space is fixed: a handful of named resources, then the dated
//! hierarchy (`YYYY`, `YYYY/M`, `YYYY/M/<stem>`), and everything else is an
//! undated article looked up by permalink.

use std::borrow::Cow;
use std::fmt;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static YEAR_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})$").expect("year pattern must compile"));
static MONTH_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})/(\d{1,2})$").expect("month pattern must compile"));
static BLOG_ENTRY_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})/(\d{1,2})/(.+)$").expect("blog entry pattern must compile")
});
static PERCENT_ESCAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:%25|%)([0-9A-Fa-f]{2})").expect("percent escape pattern must compile")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    Root,
    Atom,
    Search,
    Tag(String),
    NotFoundPage,
    UnauthorizedPage,
    Year(i32),
    Month { year: i32, month: u8 },
    BlogEntry { year: i32, month: u8, stem: String },
    Article(String),
}

impl Resource {
    /// Classify a raw (still percent-encoded) request path.
    pub fn classify(raw_path: &str) -> Self {
        let trimmed = raw_path.trim_matches('/');

        match trimmed {
            "" => return Resource::Root,
            "atom.xml" | "feed" | "feed/atom.xml" => return Resource::Atom,
            "search" => return Resource::Search,
            "404.html" => return Resource::NotFoundPage,
            "403.html" => return Resource::UnauthorizedPage,
            _ => {}
        }

        if let Some(encoded) = trimmed.strip_prefix("tag/")
            && !encoded.is_empty()
        {
            return Resource::Tag(decode_percent(encoded).into_owned());
        }

        if let Some(caps) = YEAR_PATH.captures(trimmed)
            && let Some(year) = capture_number::<i32>(&caps, 1)
        {
            return Resource::Year(year);
        }

        if let Some(caps) = MONTH_PATH.captures(trimmed)
            && let (Some(year), Some(month)) =
                (capture_number::<i32>(&caps, 1), capture_number::<u8>(&caps, 2))
        {
            return Resource::Month { year, month };
        }

        if let Some(caps) = BLOG_ENTRY_PATH.captures(trimmed)
            && let (Some(year), Some(month), Some(stem)) = (
                capture_number::<i32>(&caps, 1),
                capture_number::<u8>(&caps, 2),
                caps.get(3),
            )
        {
            return Resource::BlogEntry {
                year,
                month,
                stem: decode_percent(stem.as_str()).into_owned(),
            };
        }

        Resource::Article(decode_percent(trimmed).into_owned())
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Root => ResourceKind::Root,
            Resource::Atom => ResourceKind::Atom,
            Resource::Search => ResourceKind::Search,
            Resource::Tag(_) => ResourceKind::Tag,
            Resource::NotFoundPage => ResourceKind::NotFoundPage,
            Resource::UnauthorizedPage => ResourceKind::UnauthorizedPage,
            Resource::Year(_) => ResourceKind::Year,
            Resource::Month { .. } => ResourceKind::Month,
            Resource::BlogEntry { .. } => ResourceKind::BlogEntry,
            Resource::Article(_) => ResourceKind::Article,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Root,
    Atom,
    Search,
    Tag,
    NotFoundPage,
    UnauthorizedPage,
    Year,
    Month,
    BlogEntry,
    Article,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Root => "root",
            ResourceKind::Atom => "atom",
            ResourceKind::Search => "search",
            ResourceKind::Tag => "tag",
            ResourceKind::NotFoundPage => "not_found",
            ResourceKind::UnauthorizedPage => "unauthorized",
            ResourceKind::Year => "year",
            ResourceKind::Month => "month",
            ResourceKind::BlogEntry => "blog_entry",
            ResourceKind::Article => "article",
        };
        f.write_str(name)
    }
}

/// Decode `%XX` escapes, including double-encoded `%25XX`, into raw bytes.
pub fn decode_percent(input: &str) -> Cow<'_, str> {
    if !input.contains('%') {
        return Cow::Borrowed(input);
    }

    let mut bytes = Vec::with_capacity(input.len());
    let mut last = 0;
    for caps in PERCENT_ESCAPE.captures_iter(input) {
        let (Some(whole), Some(hex_digits)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        bytes.extend_from_slice(input[last..whole.start()].as_bytes());
        match u8::from_str_radix(hex_digits.as_str(), 16) {
            Ok(byte) => bytes.push(byte),
            Err(_) => bytes.extend_from_slice(whole.as_str().as_bytes()),
        }
        last = whole.end();
    }
    bytes.extend_from_slice(input[last..].as_bytes());

    Cow::Owned(String::from_utf8_lossy(&bytes).into_owned())
}

fn capture_number<T: std::str::FromStr>(caps: &Captures<'_>, index: usize) -> Option<T> {
    caps.get(index)?.as_str().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_resources_are_recognised() {
        assert_eq!(Resource::classify("/"), Resource::Root);
        assert_eq!(Resource::classify(""), Resource::Root);
        assert_eq!(Resource::classify("/atom.xml"), Resource::Atom);
        assert_eq!(Resource::classify("/search"), Resource::Search);
        assert_eq!(Resource::classify("/404.html"), Resource::NotFoundPage);
        assert_eq!(Resource::classify("/403.html"), Resource::UnauthorizedPage);
    }

    #[test]
    fn dated_hierarchy_is_recognised() {
        assert_eq!(Resource::classify("/2008"), Resource::Year(2008));
        assert_eq!(Resource::classify("/2008/"), Resource::Year(2008));
        assert_eq!(
            Resource::classify("/2008/05"),
            Resource::Month {
                year: 2008,
                month: 5
            }
        );
        assert_eq!(
            Resource::classify("/2008/5/Hello-World"),
            Resource::BlogEntry {
                year: 2008,
                month: 5,
                stem: "Hello-World".to_string()
            }
        );
    }

    #[test]
    fn other_paths_are_articles() {
        assert_eq!(
            Resource::classify("/About"),
            Resource::Article("About".to_string())
        );
        assert_eq!(
            Resource::classify("/node/42"),
            Resource::Article("node/42".to_string())
        );
        assert_eq!(
            Resource::classify("/20080/5"),
            Resource::Article("20080/5".to_string())
        );
        assert_eq!(
            Resource::classify("/tag/"),
            Resource::Article("tag".to_string())
        );
    }

    #[test]
    fn tags_are_percent_decoded_once_or_twice() {
        assert_eq!(
            Resource::classify("/tag/App%20Engine"),
            Resource::Tag("App Engine".to_string())
        );
        assert_eq!(
            Resource::classify("/tag/App%2520Engine"),
            Resource::Tag("App Engine".to_string())
        );
        assert_eq!(
            Resource::classify("/tag/caf%C3%A9"),
            Resource::Tag("café".to_string())
        );
    }

    #[test]
    fn malformed_escapes_are_left_alone() {
        assert_eq!(decode_percent("100%"), "100%");
        assert_eq!(decode_percent("a%zzb"), "a%zzb");
    }
}
