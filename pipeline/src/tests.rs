use super::*;
use logipost_core::{load_posts, CoreError, KeywordTable, LlmError, Topic};
use reddit_client::CollectStatus;
use std::cell::Cell;

fn fixed_posts(source: &str) -> Vec<Post> {
    match source {
        "freight" => vec![
            Post::new("Freight rates spike", "<p>Rates are **up**</p>").with_upvotes(3),
            Post::new("Lunch thread", "anything goes").with_upvotes(50),
        ],
        "shipping" => vec![
            Post::new("freight rates spike", "duplicate with more votes").with_upvotes(9),
            Post::new("Parcel carrier comparison", "UPS vs FedEx").with_upvotes(7),
        ],
        _ => Vec::new(),
    }
}

struct FakeSource;

impl PostSource for FakeSource {
    async fn fetch_new(&self, source: &str, limit: u32) -> Result<Vec<Post>, CoreError> {
        Ok(fixed_posts(source)
            .into_iter()
            .take(limit as usize)
            .enumerate()
            .map(|(i, mut post)| {
                post.id = Some(format!("{source}{i}"));
                post.subreddit = source.to_string();
                post
            })
            .collect())
    }
}

struct Echo {
    calls: Cell<usize>,
}

impl Paraphraser for Echo {
    async fn paraphrase(&self, text: &str) -> Result<String, CoreError> {
        self.calls.set(self.calls.get() + 1);
        if text.contains("UPS") {
            return Err(LlmError::RequestTimeout {
                provider: "fake".to_string(),
            }
            .into());
        }
        Ok(format!("Paraphrased: {text}"))
    }
}

/// Requests a stop from inside its first call.
struct StopOnFirstCall {
    shutdown: ShutdownState,
    calls: Cell<usize>,
}

impl Paraphraser for StopOnFirstCall {
    async fn paraphrase(&self, text: &str) -> Result<String, CoreError> {
        self.calls.set(self.calls.get() + 1);
        self.shutdown.start_shutdown();
        Ok(text.to_string())
    }
}

fn config(dir: &Path) -> PipelineConfig {
    PipelineConfig::default()
        .with_subreddits(["freight", "shipping"])
        .with_target(3)
        .with_topics(KeywordTable::new(vec![Topic::new(
            "Freight",
            &["freight", "carrier"],
        )]))
        .with_categories(
            KeywordTable::new(vec![Topic::new("Carrier Comparison", &["carrier"])]),
            "general",
        )
        .with_data_dir(dir)
}

fn pipeline(dir: &Path) -> Pipeline<FakeSource, Echo> {
    Pipeline::new(config(dir), FakeSource, Echo { calls: Cell::new(0) })
}

#[test]
fn test_scrape_collects_unique_titles_and_saves() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(dir.path());

    let outcome = tokio_test::block_on(pipeline.scrape()).unwrap();

    assert_eq!(outcome.report.status, CollectStatus::Complete);
    let titles: Vec<&str> = outcome.posts.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(
        titles,
        vec!["Freight rates spike", "Lunch thread", "Parcel carrier comparison"]
    );
    assert_eq!(load_posts(&pipeline.config().files.scraped), outcome.posts);
}

#[test]
fn test_run_writes_every_stage() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(dir.path());

    let summary = tokio_test::block_on(pipeline.run()).unwrap();

    assert_eq!(summary.scraped, 3);
    assert_eq!(summary.filtered, 2);
    let rewrite = summary.rewrite.unwrap();
    assert_eq!(rewrite.paraphrased, 1);
    assert_eq!(rewrite.fallbacks, 1);

    let files = &pipeline.config().files;
    let filtered = load_posts(&files.filtered);
    assert_eq!(filtered[0].title, "Parcel carrier comparison");
    assert_eq!(filtered[0].category.as_deref(), Some("Carrier Comparison"));
    assert_eq!(filtered[1].category.as_deref(), Some("general"));

    let ready = load_posts(&files.ready);
    assert_eq!(ready[0].content, "UPS vs FedEx");
    assert_eq!(ready[1].content, "Paraphrased: Rates are up");
    assert!(ready.iter().all(|p| p.id.is_some()));

    let final_posts = load_posts(&files.final_posts);
    assert_eq!(final_posts.len(), 2);
    assert!(final_posts.iter().all(|p| p.id.is_none()));
}

#[test]
fn test_rewrite_cap_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(
        config(dir.path()).with_rewrite_cap(0),
        FakeSource,
        Echo { calls: Cell::new(0) },
    );

    let summary = tokio_test::block_on(pipeline.run()).unwrap();

    assert_eq!(summary.rewrite.unwrap().skipped, 2);
    assert_eq!(pipeline.rewriter.paraphraser().calls.get(), 0);
}

#[test]
fn test_interrupted_run_still_saves_scraped_file() {
    let dir = tempfile::tempdir().unwrap();
    let shutdown = ShutdownState::new();
    shutdown.start_shutdown();
    let pipeline = pipeline(dir.path()).with_shutdown(shutdown);

    let summary = tokio_test::block_on(pipeline.run()).unwrap();

    assert_eq!(summary.collect.status, CollectStatus::Interrupted);
    assert!(summary.rewrite.is_none());
    let files = &pipeline.config().files;
    assert!(files.scraped.exists());
    assert!(!files.filtered.exists());
}

#[test]
fn test_stop_during_rewrite_makes_no_further_calls() {
    let dir = tempfile::tempdir().unwrap();
    let shutdown = ShutdownState::new();
    let paraphraser = StopOnFirstCall {
        shutdown: shutdown.clone(),
        calls: Cell::new(0),
    };
    let pipeline =
        Pipeline::new(config(dir.path()), FakeSource, paraphraser).with_shutdown(shutdown);

    let summary = tokio_test::block_on(pipeline.run()).unwrap();

    assert_eq!(summary.collect.status, CollectStatus::Complete);
    assert_eq!(pipeline.rewriter.paraphraser().calls.get(), 1);
    assert!(summary.rewrite.unwrap().interrupted);
    let files = &pipeline.config().files;
    assert!(files.filtered.exists());
    assert!(!files.ready.exists());
    assert!(!files.final_posts.exists());
}

#[test]
fn test_dedupe_file_keeps_higher_upvotes() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("scraped.json");
    let output = dir.path().join("cleaned.json");
    let mut posts = fixed_posts("freight");
    posts.extend(fixed_posts("shipping"));
    save_posts(&input, &posts).unwrap();

    let kept = dedupe_file(&input, &output, TieBreak::Upvotes).unwrap();

    assert_eq!(kept, 3);
    let cleaned = load_posts(&output);
    assert_eq!(cleaned[0].title, "freight rates spike");
    assert_eq!(cleaned[0].upvotes, 9);
}

#[test]
fn test_merge_excludes_published_and_strips_ids() {
    let dir = tempfile::tempdir().unwrap();
    let current = dir.path().join("current.json");
    let previous = dir.path().join("previous.json");
    let output = dir.path().join("merged.json");

    let mut fresh = Post::new("New lane opened", "");
    fresh.id = Some("n1".to_string());
    save_posts(&current, &[fresh, Post::new("OLD TITLE", "")]).unwrap();
    save_posts(&previous, &[Post::new("old title", "")]).unwrap();

    let kept = merge_files(&current, &previous, &output).unwrap();

    assert_eq!(kept, 1);
    let merged = load_posts(&output);
    assert_eq!(merged[0].title, "New lane opened");
    assert!(merged[0].id.is_none());
}

#[test]
fn test_missing_input_file_yields_empty_output() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.json");

    let kept = dedupe_file(&dir.path().join("nope.json"), &output, TieBreak::Upvotes).unwrap();

    assert_eq!(kept, 0);
    assert!(load_posts(&output).is_empty());
}
