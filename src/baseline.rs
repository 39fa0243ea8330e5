//! Recover the last announced route from the text of a previous post.
//!
//! Grammar, applied to the first line of the post body:
//!
//! ```text
//! line  := any* "operating on route " token any*
//! token := non-whitespace+
//! ```
//!
//! When the phrase occurs more than once on that line the last occurrence
//! wins. There is no fallback: without a parsable post there is nothing to
//! compare against, so the invocation fails.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{BotError, Result};
use crate::models::{LastAnnouncement, OwnPost};

static RE_ROUTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^.*operating on route (\S+)").expect("valid regex"));

/// Extract the route token from a post body.
pub fn parse_line_ref(content: &str) -> Option<&str> {
    RE_ROUTE
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Build the baseline from the latest qualifying post, if there is one.
pub fn last_announcement(post: Option<&OwnPost>) -> Result<LastAnnouncement> {
    let post = post
        .ok_or_else(|| BotError::NoBaselinePost("account has no qualifying posts".into()))?;

    let line_ref = parse_line_ref(&post.content).ok_or_else(|| {
        BotError::NoBaselinePost(format!("no route token in latest post: {:?}", post.content))
    })?;

    Ok(LastAnnouncement {
        line_ref: line_ref.to_string(),
        posted_at: post.created_at,
    })
}
