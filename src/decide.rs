use chrono::{DateTime, Duration, Utc};

use crate::models::{LastAnnouncement, Observation};
use crate::namer::display_name;

/// Why an invocation ended without posting. Neither case is a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotOperating,
    NoChange,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NotOperating => write!(f, "not operating"),
            SkipReason::NoChange => write!(f, "no change"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Announce { line_ref: String, display_name: String },
    Skip(SkipReason),
}

/// An announcement is repeated once it is this old, even without a route change.
pub fn repost_after() -> Duration {
    Duration::days(1)
}

/// Classify an observation against the last announcement.
pub fn decide(observation: &Observation, last: &LastAnnouncement, now: DateTime<Utc>) -> Decision {
    let Some(line_ref) = observation.line_ref.as_deref() else {
        return Decision::Skip(SkipReason::NotOperating);
    };

    let display_name = display_name(&observation.published_line_name);

    if line_ref == last.line_ref && now - last.posted_at < repost_after() {
        return Decision::Skip(SkipReason::NoChange);
    }

    Decision::Announce {
        line_ref: line_ref.to_string(),
        display_name,
    }
}
