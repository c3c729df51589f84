use std::env;
use std::str::FromStr;

use crate::observability::layer::DEFAULT_EVENT_CAPACITY;

/// Coordinator configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Buffered observability events before slow subscribers lag
    pub observability_capacity: usize,
    /// Hand published posts to the search indexer
    pub index_published_posts: bool,
    /// Emit success/failure notices when a publish finishes
    pub post_notices: bool,
    /// Repair in-flight posts and resume failed ones when the worker starts
    pub resume_on_start: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            observability_capacity: DEFAULT_EVENT_CAPACITY,
            index_published_posts: true,
            post_notices: true,
            resume_on_start: false,
        }
    }
}

impl CoordinatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `DOG_PUBLISH_*` variables, keeping defaults for anything
    /// missing or unparseable
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            observability_capacity: env_or("DOG_PUBLISH_OBSERVABILITY_CAPACITY", defaults.observability_capacity),
            index_published_posts: env_or("DOG_PUBLISH_INDEX_PUBLISHED", defaults.index_published_posts),
            post_notices: env_or("DOG_PUBLISH_POST_NOTICES", defaults.post_notices),
            resume_on_start: env_or("DOG_PUBLISH_RESUME_ON_START", defaults.resume_on_start),
        }
    }

    pub fn with_observability_capacity(mut self, capacity: usize) -> Self {
        self.observability_capacity = capacity;
        self
    }

    pub fn with_index_published_posts(mut self, enabled: bool) -> Self {
        self.index_published_posts = enabled;
        self
    }

    pub fn with_post_notices(mut self, enabled: bool) -> Self {
        self.post_notices = enabled;
        self
    }

    pub fn with_resume_on_start(mut self, enabled: bool) -> Self {
        self.resume_on_start = enabled;
        self
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}
