use crate::Paraphraser;
use logipost_core::{normalize_text, ErrorExt, Post, ShutdownState};
use tracing::{info, warn};

pub const DEFAULT_REWRITE_CAP: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteReport {
    pub paraphrased: usize,
    /// Posts within the cap that kept their normalized text.
    pub fallbacks: usize,
    /// Posts past the cap, left untouched.
    pub skipped: usize,
    /// A stop was requested before every post within the cap was handled.
    pub interrupted: bool,
}

/// Normalizes and paraphrases post bodies, bounding service calls per run.
pub struct Rewriter<P> {
    paraphraser: P,
    cap: usize,
    shutdown: ShutdownState,
}

impl<P> Rewriter<P> {
    pub fn new(paraphraser: P) -> Self {
        Self {
            paraphraser,
            cap: DEFAULT_REWRITE_CAP,
            shutdown: ShutdownState::new(),
        }
    }

    pub fn with_cap(mut self, cap: usize) -> Self {
        self.cap = cap;
        self
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownState) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn paraphraser(&self) -> &P {
        &self.paraphraser
    }
}

impl<P: Paraphraser> Rewriter<P> {
    pub async fn rewrite_posts(&self, posts: &mut [Post]) -> RewriteReport {
        let mut report = RewriteReport::default();
        let total = posts.len();

        for (index, post) in posts.iter_mut().enumerate() {
            if index >= self.cap {
                report.skipped = total - self.cap;
                info!(
                    cap = self.cap,
                    skipped = report.skipped,
                    "Rewrite cap reached; remaining posts left as-is"
                );
                break;
            }
            if self.shutdown.is_shutting_down() {
                info!(handled = index, "Stop requested; ending rewrite");
                report.interrupted = true;
                break;
            }

            let cleaned = normalize_text(&post.content);
            if cleaned.is_empty() {
                post.content = cleaned;
                report.fallbacks += 1;
                continue;
            }

            match self.paraphraser.paraphrase(&cleaned).await {
                Ok(rewritten) => {
                    post.content = rewritten;
                    report.paraphrased += 1;
                }
                Err(e) => {
                    e.log_warn();
                    warn!(title = %post.title, "Paraphrasing failed; keeping cleaned text");
                    post.content = cleaned;
                    report.fallbacks += 1;
                }
            }
        }

        info!(
            paraphrased = report.paraphrased,
            fallbacks = report.fallbacks,
            skipped = report.skipped,
            interrupted = report.interrupted,
            "Rewrite finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logipost_core::{CoreError, LlmError};
    use std::cell::Cell;

    struct Upper {
        calls: Cell<usize>,
    }

    impl Paraphraser for Upper {
        async fn paraphrase(&self, text: &str) -> Result<String, CoreError> {
            self.calls.set(self.calls.get() + 1);
            Ok(text.to_uppercase())
        }
    }

    struct Down;

    impl Paraphraser for Down {
        async fn paraphrase(&self, _text: &str) -> Result<String, CoreError> {
            Err(LlmError::RequestTimeout {
                provider: "fake".to_string(),
            }
            .into())
        }
    }

    fn posts(n: usize) -> Vec<Post> {
        (0..n)
            .map(|i| Post::new(format!("t{i}"), format!("<p>body   **{i}**</p>")))
            .collect()
    }

    #[test]
    fn test_cap_bounds_service_calls() {
        let rewriter = Rewriter::new(Upper { calls: Cell::new(0) });
        let mut batch = posts(12);

        let report = tokio_test::block_on(rewriter.rewrite_posts(&mut batch));

        assert_eq!(rewriter.paraphraser().calls.get(), 10);
        assert_eq!(report.paraphrased, 10);
        assert_eq!(report.skipped, 2);
        assert_eq!(batch[0].content, "BODY 0");
        assert_eq!(batch[11].content, "<p>body   **11**</p>");
    }

    #[test]
    fn test_failure_keeps_normalized_text() {
        let rewriter = Rewriter::new(Down).with_cap(3);
        let mut batch = posts(2);

        let report = tokio_test::block_on(rewriter.rewrite_posts(&mut batch));

        assert_eq!(report.fallbacks, 2);
        assert_eq!(batch[1].content, "body 1");
    }

    #[test]
    fn test_empty_body_not_sent() {
        let rewriter = Rewriter::new(Upper { calls: Cell::new(0) });
        let mut batch = vec![Post::new("image post", "<img src=x>")];

        tokio_test::block_on(rewriter.rewrite_posts(&mut batch));

        assert_eq!(rewriter.paraphraser().calls.get(), 0);
        assert_eq!(batch[0].content, "");
    }

    struct StopAfterFirst {
        shutdown: ShutdownState,
        calls: Cell<usize>,
    }

    impl Paraphraser for StopAfterFirst {
        async fn paraphrase(&self, text: &str) -> Result<String, CoreError> {
            self.calls.set(self.calls.get() + 1);
            self.shutdown.start_shutdown();
            Ok(text.to_string())
        }
    }

    #[test]
    fn test_stop_request_ends_rewrite_at_next_post() {
        let shutdown = ShutdownState::new();
        let paraphraser = StopAfterFirst {
            shutdown: shutdown.clone(),
            calls: Cell::new(0),
        };
        let rewriter = Rewriter::new(paraphraser).with_shutdown(shutdown);
        let mut batch = posts(4);

        let report = tokio_test::block_on(rewriter.rewrite_posts(&mut batch));

        assert_eq!(rewriter.paraphraser().calls.get(), 1);
        assert!(report.interrupted);
        assert_eq!(report.paraphrased, 1);
        assert_eq!(batch[1].content, "<p>body   **1**</p>");
    }
}
