//! Sequential batch upload and delete against a [`SinkApi`].
//!
//! Items are processed one at a time with a fixed pause between calls. A
//! connection failure aborts the batch; every other failure is recorded and
//! the batch moves on.

use crate::api::{NewComment, NewPost, SinkApi};
use logipost_core::{ErrorExt, Post, SinkError};
use std::time::Duration;
use tracing::{error, info, warn};

pub const DEFAULT_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Uploaded { title: String, id: String },
    Deleted { id: String },
    NotFound { id: String },
    Failed { item: String, reason: String },
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: usize,
    pub failed: usize,
    /// Deletes answered with 404; also counted in `failed`.
    pub not_found: usize,
    pub outcomes: Vec<ItemOutcome>,
    /// Set when the sink became unreachable; later items were not attempted.
    pub aborted: Option<SinkError>,
}

impl BatchReport {
    pub fn is_aborted(&self) -> bool {
        self.aborted.is_some()
    }

    fn record(&mut self, outcome: ItemOutcome) {
        match &outcome {
            ItemOutcome::Uploaded { .. } | ItemOutcome::Deleted { .. } => self.succeeded += 1,
            ItemOutcome::NotFound { .. } => {
                self.not_found += 1;
                self.failed += 1;
            }
            ItemOutcome::Failed { .. } => self.failed += 1,
        }
        self.outcomes.push(outcome);
    }
}

pub struct Uploader<S> {
    sink: S,
    delay: Duration,
    default_category: String,
}

impl<S: SinkApi> Uploader<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            delay: DEFAULT_DELAY,
            default_category: "Carrier Comparison".to_string(),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_default_category(mut self, category: impl Into<String>) -> Self {
        self.default_category = category.into();
        self
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub async fn upload_posts(&self, posts: &[Post]) -> BatchReport {
        let mut report = BatchReport::default();
        let total = posts.len();
        info!(total, "Starting upload");

        for (index, post) in posts.iter().enumerate() {
            let payload = NewPost::from_post(post, &self.default_category);
            let response = match self.sink.upload_post(&payload).await {
                Ok(response) => response,
                Err(e) => {
                    if let Some(fatal) = self.abort_on(e, &mut report, &post.title) {
                        report.aborted = Some(fatal);
                        return report;
                    }
                    self.pause().await;
                    continue;
                }
            };

            if response.status != 201 {
                warn!(
                    index = index + 1,
                    total,
                    status = response.status,
                    body = %response.body,
                    "Failed to upload post"
                );
                report.record(ItemOutcome::Failed {
                    item: post.title.clone(),
                    reason: format!("status {}", response.status),
                });
                self.pause().await;
                continue;
            }

            let id = match response.created_id() {
                Ok(id) => id,
                Err(e) => {
                    e.log_warn();
                    report.record(ItemOutcome::Failed {
                        item: post.title.clone(),
                        reason: e.to_string(),
                    });
                    self.pause().await;
                    continue;
                }
            };
            info!(index = index + 1, total, id = %id, "Uploaded post");

            for comment in &post.comments {
                match self
                    .sink
                    .upload_comment(&id, &NewComment::from(comment))
                    .await
                {
                    Ok(response) if response.status == 201 => {}
                    Ok(response) => {
                        warn!(post_id = %id, status = response.status, body = %response.body, "Failed to upload comment");
                    }
                    Err(e) if e.is_fatal() => {
                        e.log_error();
                        report.record(ItemOutcome::Uploaded {
                            title: post.title.clone(),
                            id,
                        });
                        report.aborted = Some(e);
                        return report;
                    }
                    Err(e) => {
                        warn!(post_id = %id, error = %e, "Failed to upload comment");
                    }
                }
            }

            report.record(ItemOutcome::Uploaded {
                title: post.title.clone(),
                id,
            });
            self.pause().await;
        }

        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            "Upload finished"
        );
        report
    }

    pub async fn delete_posts(&self, ids: &[String]) -> BatchReport {
        let mut report = BatchReport::default();
        let total = ids.len();
        info!(total, "Starting deletion");

        for (index, id) in ids.iter().enumerate() {
            match self.sink.delete_post(id).await {
                Ok(response) if response.status == 200 => {
                    info!(index = index + 1, total, id = %id, "Deleted post");
                    report.record(ItemOutcome::Deleted { id: id.clone() });
                }
                Ok(response) if response.status == 404 => {
                    warn!(index = index + 1, total, id = %id, "Post not found");
                    report.record(ItemOutcome::NotFound { id: id.clone() });
                }
                Ok(response) => {
                    warn!(
                        index = index + 1,
                        total,
                        id = %id,
                        status = response.status,
                        body = %response.body,
                        "Failed to delete post"
                    );
                    report.record(ItemOutcome::Failed {
                        item: id.clone(),
                        reason: format!("status {}", response.status),
                    });
                }
                Err(e) => {
                    if let Some(fatal) = self.abort_on(e, &mut report, id) {
                        report.aborted = Some(fatal);
                        return report;
                    }
                }
            }
            self.pause().await;
        }

        info!(
            succeeded = report.succeeded,
            not_found = report.not_found,
            failed = report.failed,
            "Deletion finished"
        );
        report
    }

    /// Returns the error back when it must stop the batch; otherwise records
    /// it against `item`.
    fn abort_on(&self, e: SinkError, report: &mut BatchReport, item: &str) -> Option<SinkError> {
        if e.is_fatal() {
            error!(error = %e, "Could not connect to the sink; stopping batch");
            return Some(e);
        }
        warn!(item, error = %e, "Sink request failed");
        report.record(ItemOutcome::Failed {
            item: item.to_string(),
            reason: e.to_string(),
        });
        None
    }

    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}
