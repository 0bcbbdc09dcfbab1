//! Comment thread strings.
//!
//! Each comment carries a thread path made of zero-padded ordinals: top-level
//! comments are `001`, `002`, …; a reply to `002` is `002.001`. Ordering comments
//! by this string yields the threaded display order, which holds as long as
//! no comment has more than [`MAX_SIBLINGS`] direct children.

use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

const SEGMENT_WIDTH: usize = 3;

/// Largest ordinal that still fits a thread segment.
pub const MAX_SIBLINGS: usize = 999;

static PARENT_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^#]*#comment-(\w+)$").expect("parent key pattern must compile"));

/// Thread string for the `ordinal`-th (1-based) child of `parent_thread`.
pub fn child_thread(parent_thread: Option<&str>, ordinal: usize) -> String {
    let segment = format!("{ordinal:0width$}", width = SEGMENT_WIDTH);
    match parent_thread {
        Some(parent) if !parent.is_empty() => format!("{parent}.{segment}"),
        _ => segment,
    }
}

/// Ordinal for the next child given the threads of the existing siblings.
///
/// The next ordinal is one past the highest surviving sibling; gaps left by
/// deleted comments are not refilled. `None` once the segment is full.
pub fn next_ordinal<'a>(sibling_threads: impl IntoIterator<Item = &'a str>) -> Option<usize> {
    let next = sibling_threads
        .into_iter()
        .filter_map(|thread| thread.rsplit('.').next()?.parse::<usize>().ok())
        .max()
        .unwrap_or(0)
        + 1;
    (next <= MAX_SIBLINGS).then_some(next)
}

/// Extract the parent comment id from a reply key shaped `<path>#comment-<id>`.
pub fn parent_comment_id(key: &str) -> Option<Uuid> {
    let captures = PARENT_KEY.captures(key.trim())?;
    Uuid::parse_str(captures.get(1)?.as_str()).ok()
}
