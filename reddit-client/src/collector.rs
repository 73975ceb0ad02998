//! Multi-source collection loop.
//!
//! Walks the source list round after round, keeping posts whose normalized
//! title is new, until the target is met. Unlike an open-ended scrape loop it
//! always terminates: after `max_rounds` passes, or as soon as a pass adds
//! nothing and the per-source limit can no longer grow.

use logipost_core::{CollectSettings, CoreError, Post, ShutdownState, TitleIndex};
use tracing::{info, warn};

/// Upstream that yields the newest posts of a named source.
pub trait PostSource {
    async fn fetch_new(&self, source: &str, limit: u32) -> Result<Vec<Post>, CoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectPolicy {
    pub target: usize,
    pub initial_limit: u32,
    pub limit_step: Option<u32>,
    pub max_limit: u32,
    pub max_rounds: u32,
}

impl From<&CollectSettings> for CollectPolicy {
    fn from(settings: &CollectSettings) -> Self {
        Self {
            target: settings.target,
            initial_limit: settings.initial_limit,
            limit_step: settings.limit_step,
            max_limit: settings.max_limit,
            max_rounds: settings.max_rounds,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectStatus {
    Complete,
    TargetUnreachable,
    Interrupted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectReport {
    pub status: CollectStatus,
    pub rounds: u32,
    pub collected: usize,
    pub failed_fetches: usize,
}

pub struct Collector<'a, S> {
    source: &'a S,
    sources: Vec<String>,
    policy: CollectPolicy,
    shutdown: ShutdownState,
}

impl<'a, S: PostSource> Collector<'a, S> {
    pub fn new(source: &'a S, sources: Vec<String>, policy: CollectPolicy) -> Self {
        Self {
            source,
            sources,
            policy,
            shutdown: ShutdownState::new(),
        }
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownState) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Collects into `posts`. Titles already present in `posts` count as seen.
    pub async fn collect_into(&self, posts: &mut Vec<Post>) -> CollectReport {
        let mut seen: TitleIndex = posts.iter().collect();
        let mut limit = self.policy.initial_limit;
        let mut failed_fetches = 0;
        let mut rounds = 0;

        let finish = |status, rounds, posts: &Vec<Post>, failed_fetches| CollectReport {
            status,
            rounds,
            collected: posts.len(),
            failed_fetches,
        };

        if self.sources.is_empty() {
            return finish(CollectStatus::TargetUnreachable, rounds, posts, failed_fetches);
        }

        while rounds < self.policy.max_rounds {
            rounds += 1;
            let before_round = posts.len();
            let mut limit_grew = false;

            for source in &self.sources {
                if posts.len() >= self.policy.target {
                    return finish(CollectStatus::Complete, rounds, posts, failed_fetches);
                }
                if self.shutdown.is_shutting_down() {
                    info!(collected = posts.len(), "Stop requested; ending collection");
                    return finish(CollectStatus::Interrupted, rounds, posts, failed_fetches);
                }

                info!(source = %source, limit, round = rounds, "Scraping source");
                let fetched = match self.source.fetch_new(source, limit).await {
                    Ok(fetched) => fetched,
                    Err(e) => {
                        warn!(source = %source, error = %e, "Failed to fetch source; moving on");
                        failed_fetches += 1;
                        continue;
                    }
                };

                let fetched_count = fetched.len();
                for post in fetched {
                    if posts.len() >= self.policy.target {
                        break;
                    }
                    if seen.insert(&post.title) {
                        posts.push(post);
                    }
                }
                info!(collected = posts.len(), "Unique posts collected so far");

                if fetched_count < limit as usize {
                    if let Some(step) = self.policy.limit_step {
                        if limit < self.policy.max_limit {
                            limit = limit.saturating_add(step).min(self.policy.max_limit);
                            limit_grew = true;
                            info!(source = %source, limit, "Source exhausted; increasing post limit");
                        }
                    }
                }
            }

            if posts.len() >= self.policy.target {
                return finish(CollectStatus::Complete, rounds, posts, failed_fetches);
            }
            if posts.len() == before_round && !limit_grew {
                warn!(
                    collected = posts.len(),
                    target = self.policy.target,
                    "A full round added nothing; target unreachable"
                );
                return finish(CollectStatus::TargetUnreachable, rounds, posts, failed_fetches);
            }
        }

        warn!(
            collected = posts.len(),
            target = self.policy.target,
            rounds,
            "Round limit reached before target"
        );
        finish(CollectStatus::TargetUnreachable, rounds, posts, failed_fetches)
    }
}
