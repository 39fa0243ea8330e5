use chrono::{DateTime, Utc};

/// Which route the tracked vehicle is serving at the moment of a feed fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    /// Short route code (e.g., "19"); `None` when the vehicle is not in service
    pub line_ref: Option<String>,

    /// Route name as published by the feed (e.g., "POLK")
    pub published_line_name: String,
}

impl Observation {
    pub fn new(line_ref: Option<&str>, published_line_name: &str) -> Self {
        Self {
            line_ref: line_ref.map(str::to_string),
            published_line_name: published_line_name.to_string(),
        }
    }

    /// Check if the vehicle is currently assigned to a route
    pub fn is_operating(&self) -> bool {
        self.line_ref.is_some()
    }
}

/// The route announced by the most recent qualifying post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastAnnouncement {
    pub line_ref: String,
    pub posted_at: DateTime<Utc>,
}

/// A self-authored post as returned by the social platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnPost {
    /// Post body, possibly HTML
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Display for Observation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.line_ref {
            Some(line_ref) => write!(f, "Route {} {}", line_ref, self.published_line_name),
            None => write!(f, "Not in service"),
        }
    }
}

impl std::fmt::Display for LastAnnouncement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Route {} [{}]",
            self.line_ref,
            self.posted_at.format("%Y-%m-%d %H:%M:%S")
        )
    }
}
