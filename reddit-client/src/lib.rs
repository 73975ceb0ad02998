pub mod api;
pub mod auth;
pub mod collector;
pub mod metrics;

#[cfg(test)]
mod tests;

pub use api::RedditApiClient;
pub use auth::{AppOnlyAuthenticator, RedditOAuth2Config, RedditToken};
pub use collector::{CollectPolicy, CollectReport, CollectStatus, Collector, PostSource};

use api::MAX_PAGE_SIZE;
use logipost_core::{Classifier, CoreError, Post, ShutdownState, MAX_COMMENTS};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Read-only Reddit client: newest posts of a subreddit with their first few
/// top-level comments.
pub struct RedditClient {
    api: RedditApiClient,
    authenticator: AppOnlyAuthenticator,
    token: Mutex<Option<RedditToken>>,
    classifier: Option<Classifier>,
    max_comments: usize,
    shutdown: ShutdownState,
}

impl RedditClient {
    pub fn new(config: RedditOAuth2Config) -> Result<Self, CoreError> {
        let api = RedditApiClient::new(config.user_agent.clone())?;
        let authenticator = AppOnlyAuthenticator::new(&config, api.http_client().clone())?;

        Ok(Self {
            api,
            authenticator,
            token: Mutex::new(None),
            classifier: None,
            max_comments: MAX_COMMENTS,
            shutdown: ShutdownState::new(),
        })
    }

    /// Labels every fetched post with a category as it arrives.
    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_max_comments(mut self, max_comments: usize) -> Self {
        self.max_comments = max_comments.min(MAX_COMMENTS);
        self
    }

    /// Stops paging and comment lookups once a stop is requested, returning
    /// the posts fetched so far.
    pub fn with_shutdown(mut self, shutdown: ShutdownState) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn with_api_base(mut self, url: &str) -> Self {
        self.api = self.api.with_base_url(url);
        self
    }

    pub fn api(&self) -> &RedditApiClient {
        &self.api
    }

    async fn access_token(&self) -> Result<String, CoreError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.access_token.clone());
        }

        let token = self.authenticator.fetch_token().await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    /// Up to `limit` of the newest posts, following `after` cursors in pages
    /// of at most 100. A failed first page is an error; a later failure keeps
    /// the pages already fetched.
    pub async fn fetch_new_posts(&self, subreddit: &str, limit: u32) -> Result<Vec<Post>, CoreError> {
        let token = self.access_token().await?;
        let mut posts = Vec::new();
        let mut after: Option<String> = None;

        'pages: while posts.len() < limit as usize {
            let remaining = limit - posts.len() as u32;
            let page = match self
                .api
                .get_new_posts(&token, subreddit, remaining.min(MAX_PAGE_SIZE), after.as_deref())
                .await
            {
                Ok(page) => page,
                Err(e) if after.is_none() => return Err(e),
                Err(e) => {
                    warn!(
                        subreddit,
                        fetched = posts.len(),
                        error = %e,
                        "Failed to fetch next listing page; keeping posts so far"
                    );
                    break;
                }
            };

            let page_len = page.data.children.len();
            for child in page.data.children {
                if posts.len() >= limit as usize {
                    break;
                }
                if self.shutdown.is_shutting_down() {
                    debug!(subreddit, fetched = posts.len(), "Stop requested; ending listing");
                    break 'pages;
                }
                let mut post = Post::from(child.data);
                if let Some(id) = post.id.clone() {
                    post.comments = self.comments_or_empty(&token, &id).await;
                }
                if let Some(classifier) = &self.classifier {
                    post.category = Some(classifier.classify(&post.title).to_string());
                }
                posts.push(post);
            }

            after = page.data.after;
            if page_len == 0 || after.is_none() {
                debug!(subreddit, fetched = posts.len(), "Listing exhausted");
                break;
            }
        }

        Ok(posts)
    }

    async fn comments_or_empty(&self, token: &str, post_id: &str) -> Vec<logipost_core::Comment> {
        if self.max_comments == 0 {
            return Vec::new();
        }
        match self.api.get_top_comments(token, post_id, self.max_comments).await {
            Ok(comments) => comments,
            Err(e) => {
                warn!(post_id, error = %e, "Failed to fetch comments; keeping post without them");
                Vec::new()
            }
        }
    }
}

impl PostSource for RedditClient {
    async fn fetch_new(&self, source: &str, limit: u32) -> Result<Vec<Post>, CoreError> {
        self.fetch_new_posts(source, limit).await
    }
}
