//! End-to-end orchestration: collect, dedupe, filter, classify, rewrite and
//! persist each intermediate artifact.

pub mod flush;
pub mod signal;

pub use flush::FlushGuard;
pub use signal::spawn_signal_listener;

use llm_interface::{Paraphraser, RewriteReport, Rewriter};
use logipost_core::{
    dedupe_posts, exclude_seen, filter_relevant, load_posts, save_posts, strip_ids, Classifier,
    CoreError, PipelineConfig, Post, ShutdownState, TieBreak,
};
use reddit_client::{CollectPolicy, CollectReport, CollectStatus, Collector, PostSource};
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug)]
pub struct ScrapeOutcome {
    pub report: CollectReport,
    pub posts: Vec<Post>,
}

#[derive(Debug)]
pub struct RunSummary {
    pub collect: CollectReport,
    pub scraped: usize,
    pub filtered: usize,
    /// `None` when the run was stopped before rewriting began.
    pub rewrite: Option<RewriteReport>,
}

pub struct Pipeline<S, P> {
    config: PipelineConfig,
    source: S,
    rewriter: Rewriter<P>,
    shutdown: ShutdownState,
}

impl<S, P> Pipeline<S, P> {
    /// `source` and `paraphraser` may be `()` for commands that never use
    /// them.
    pub fn new(config: PipelineConfig, source: S, paraphraser: P) -> Self {
        let rewriter = Rewriter::new(paraphraser).with_cap(config.rewrite.cap);
        Self {
            config,
            source,
            rewriter,
            shutdown: ShutdownState::new(),
        }
    }

    /// Observed by collection and rewriting. A source that pages on its own,
    /// such as `RedditClient`, needs the same state passed to it directly.
    pub fn with_shutdown(mut self, shutdown: ShutdownState) -> Self {
        self.rewriter = self.rewriter.with_shutdown(shutdown.clone());
        self.shutdown = shutdown;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    fn classifier(&self) -> Classifier {
        Classifier::new(
            self.config.categories.clone(),
            self.config.default_category.clone(),
        )
    }

    /// Normalizes and paraphrases an existing post file.
    pub async fn rewrite_file(&self, input: &Path, output: &Path) -> Result<RewriteReport, CoreError>
    where
        P: Paraphraser,
    {
        let mut posts = load_posts(input);
        let report = self.rewriter.rewrite_posts(&mut posts).await;
        save_posts(output, &posts)?;
        Ok(report)
    }
}

impl<S: PostSource, P> Pipeline<S, P> {
    /// Collects unique posts and saves them to the scraped-posts file. The
    /// file is written even if collection is cut short.
    pub async fn scrape(&self) -> Result<ScrapeOutcome, CoreError> {
        let mut guard = FlushGuard::new(&self.config.files.scraped);
        let collector = Collector::new(
            &self.source,
            self.config.subreddits.clone(),
            CollectPolicy::from(&self.config.collect),
        )
        .with_shutdown(self.shutdown.clone());

        info!(
            sources = self.config.subreddits.len(),
            target = self.config.collect.target,
            "Starting Reddit scraper"
        );
        let report = collector.collect_into(&mut guard).await;

        let posts = std::mem::take(&mut *guard);
        *guard = dedupe_posts(posts, self.config.tie_break());
        let posts = guard.persist()?;

        match report.status {
            CollectStatus::Complete => info!(collected = posts.len(), "Collection complete"),
            CollectStatus::TargetUnreachable => warn!(
                collected = posts.len(),
                target = self.config.collect.target,
                "Collection stopped short of target"
            ),
            CollectStatus::Interrupted => info!(collected = posts.len(), "Collection interrupted"),
        }

        Ok(ScrapeOutcome { report, posts })
    }

    /// Full run: scraped → filtered → ready → final (ids stripped).
    pub async fn run(&self) -> Result<RunSummary, CoreError>
    where
        P: Paraphraser,
    {
        let ScrapeOutcome { report, posts } = self.scrape().await?;
        let scraped = posts.len();

        if report.status == CollectStatus::Interrupted {
            return Ok(RunSummary {
                collect: report,
                scraped,
                filtered: 0,
                rewrite: None,
            });
        }

        let mut filtered = filter_relevant(posts, &self.config.topics, self.config.filter_limit);
        self.classifier().classify_all(&mut filtered);
        save_posts(&self.config.files.filtered, &filtered)?;
        info!(
            scraped,
            relevant = filtered.len(),
            "Filtered posts by topic keywords"
        );

        if self.shutdown.is_shutting_down() {
            info!("Stop requested; skipping rewrite");
            return Ok(RunSummary {
                collect: report,
                scraped,
                filtered: filtered.len(),
                rewrite: None,
            });
        }

        let mut ready = filtered;
        let rewrite = self.rewriter.rewrite_posts(&mut ready).await;
        if rewrite.interrupted {
            info!("Rewrite interrupted; ready and final files not written");
            return Ok(RunSummary {
                collect: report,
                scraped,
                filtered: ready.len(),
                rewrite: Some(rewrite),
            });
        }
        save_posts(&self.config.files.ready, &ready)?;

        strip_ids(&mut ready);
        save_posts(&self.config.files.final_posts, &ready)?;
        info!("Scraping and processing completed");

        Ok(RunSummary {
            collect: report,
            scraped,
            filtered: ready.len(),
            rewrite: Some(rewrite),
        })
    }
}

/// Collapses duplicate titles in `input` and writes the survivors to `output`.
pub fn dedupe_file(input: &Path, output: &Path, tie_break: TieBreak) -> Result<usize, CoreError> {
    let posts = load_posts(input);
    let before = posts.len();
    let unique = dedupe_posts(posts, tie_break);
    info!(before, after = unique.len(), "Removed duplicate titles");
    save_posts(output, &unique)?;
    Ok(unique.len())
}

/// Drops posts of `current` already published in `previous`, strips ids and
/// writes the rest to `output`.
pub fn merge_files(current: &Path, previous: &Path, output: &Path) -> Result<usize, CoreError> {
    let published = load_posts(previous);
    let mut fresh = exclude_seen(load_posts(current), &published);
    strip_ids(&mut fresh);
    info!(
        previous = published.len(),
        fresh = fresh.len(),
        "Excluded previously published titles"
    );
    save_posts(output, &fresh)?;
    Ok(fresh.len())
}

#[cfg(test)]
mod tests;
