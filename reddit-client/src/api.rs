use crate::metrics::{MetricsCollector, RequestMetrics};
use chrono::{DateTime, Utc};
use logipost_core::{author_or_anonymous, Comment, CoreError, Post, RedditApiError};
use reqwest::{Client, Method, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

pub const REDDIT_API_BASE: &str = "https://oauth.reddit.com";

/// Reddit returns at most this many children per listing page.
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListing<T> {
    pub kind: String,
    pub data: RedditListingData<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingData<T> {
    pub children: Vec<T>,
    pub after: Option<String>,
    pub before: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditListingChild<T> {
    pub kind: String,
    pub data: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditPostData {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    #[serde(default)]
    pub author: Option<String>,
    pub subreddit: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub permalink: String,
    pub created_utc: f64,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub num_comments: u32,
    #[serde(default)]
    pub stickied: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditCommentData {
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub created_utc: f64,
}

/// A child of a comment tree. `more` entries are "load more" placeholders and
/// carry no comment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum RedditCommentThing {
    #[serde(rename = "t1")]
    Comment(RedditCommentData),
    #[serde(rename = "more")]
    More(serde_json::Value),
}

pub type PostListing = RedditListing<RedditListingChild<RedditPostData>>;
pub type CommentListing = RedditListing<RedditCommentThing>;

#[derive(Debug)]
pub struct RedditApiClient {
    http_client: Client,
    metrics: Arc<MetricsCollector>,
    user_agent: String,
    base_url: String,
}

impl RedditApiClient {
    pub fn new(user_agent: String) -> Result<Self, CoreError> {
        let http_client = Client::builder()
            .user_agent(&user_agent)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http_client,
            metrics: Arc::new(MetricsCollector::new()),
            user_agent,
            base_url: REDDIT_API_BASE.to_string(),
        })
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn http_client(&self) -> &Client {
        &self.http_client
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub async fn make_request(
        &self,
        method: Method,
        endpoint: &str,
        metrics_key: &str,
        access_token: &str,
        query_params: &[(&str, String)],
    ) -> Result<Response, CoreError> {
        let url = format!("{}{}", self.base_url, endpoint);
        let start_time = Instant::now();

        let request_builder = self
            .http_client
            .request(method.clone(), &url)
            .bearer_auth(access_token)
            .query(query_params);

        debug!("Making Reddit API request: {} {}", method, endpoint);
        let result = request_builder.send().await;

        let status_code = result.as_ref().ok().map(|r| r.status().as_u16());
        self.metrics
            .record_request(RequestMetrics {
                endpoint: metrics_key.to_string(),
                status_code,
                response_time: start_time.elapsed(),
                success: status_code.is_some_and(|s| (200..300).contains(&s)),
                rate_limited: status_code == Some(429),
            })
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                error!("Network error for {} {}: {}", method, endpoint, e);
                if e.is_timeout() {
                    return Err(CoreError::RedditApi(RedditApiError::RequestTimeout));
                }
                return Err(CoreError::Network(e));
            }
        };

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        error!("Request failed with status: {} for {}", status, endpoint);
        let error = match status.as_u16() {
            429 => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                warn!("Rate limited, retry after {} seconds", retry_after);
                RedditApiError::RateLimitExceeded { retry_after }
            }
            401 => RedditApiError::InvalidToken,
            403 => RedditApiError::Forbidden {
                resource: endpoint.to_string(),
            },
            404 => RedditApiError::InvalidResponse {
                details: format!("Resource not found: {}", endpoint),
            },
            code if status.is_server_error() => RedditApiError::ServerError { status_code: code },
            code => RedditApiError::InvalidResponse {
                details: format!("Unexpected status {} for {}", code, endpoint),
            },
        };
        Err(CoreError::RedditApi(error))
    }

    /// One page of the newest submissions of `subreddit`.
    pub async fn get_new_posts(
        &self,
        access_token: &str,
        subreddit: &str,
        limit: u32,
        after: Option<&str>,
    ) -> Result<PostListing, CoreError> {
        let endpoint = format!("/r/{}/new", subreddit);
        let mut params = vec![
            ("limit", limit.min(MAX_PAGE_SIZE).to_string()),
            ("raw_json", "1".to_string()),
        ];
        if let Some(after_val) = after {
            params.push(("after", after_val.to_string()));
        }

        let response = self
            .make_request(Method::GET, &endpoint, "listing", access_token, &params)
            .await
            .map_err(|e| match e {
                CoreError::RedditApi(RedditApiError::InvalidResponse { .. }) => {
                    CoreError::RedditApi(RedditApiError::SubredditNotFound {
                        subreddit: subreddit.to_string(),
                    })
                }
                other => other,
            })?;

        let listing: PostListing = response.json().await.map_err(|e| {
            error!("Failed to parse subreddit posts: {}", e);
            CoreError::RedditApi(RedditApiError::InvalidResponse {
                details: format!("Failed to parse posts for r/{}", subreddit),
            })
        })?;

        info!(
            "Retrieved {} posts from r/{}",
            listing.data.children.len(),
            subreddit
        );
        Ok(listing)
    }

    /// First `max_comments` top-level comments of a submission, in thread order.
    pub async fn get_top_comments(
        &self,
        access_token: &str,
        post_id: &str,
        max_comments: usize,
    ) -> Result<Vec<Comment>, CoreError> {
        let endpoint = format!("/comments/{}", post_id);
        let params = [
            ("depth", "1".to_string()),
            ("limit", (max_comments * 2).max(1).to_string()),
            ("raw_json", "1".to_string()),
        ];

        let response = self
            .make_request(Method::GET, &endpoint, "comments", access_token, &params)
            .await?;

        let (_submission, comments): (serde_json::Value, CommentListing) =
            response.json().await.map_err(|e| {
                error!("Failed to parse comments: {}", e);
                CoreError::RedditApi(RedditApiError::InvalidResponse {
                    details: format!("Failed to parse comments for {}", post_id),
                })
            })?;

        Ok(top_level_comments(comments, max_comments))
    }

    pub async fn get_metrics(&self) -> crate::metrics::ApiMetrics {
        self.metrics.get_metrics().await
    }
}

/// Flattens a comment listing, dropping "load more" placeholders.
pub fn top_level_comments(listing: CommentListing, max_comments: usize) -> Vec<Comment> {
    listing
        .data
        .children
        .into_iter()
        .filter_map(|child| match child {
            RedditCommentThing::Comment(data) => Some(Comment::from(data)),
            RedditCommentThing::More(_) => None,
        })
        .take(max_comments)
        .collect()
}

pub fn epoch_to_datetime(created_utc: f64) -> DateTime<Utc> {
    DateTime::from_timestamp(created_utc as i64, 0).unwrap_or_default()
}

impl From<RedditPostData> for Post {
    fn from(post_data: RedditPostData) -> Self {
        Self {
            id: Some(post_data.id),
            title: post_data.title.trim().to_string(),
            content: post_data.selftext,
            subreddit: post_data.subreddit,
            author: author_or_anonymous(post_data.author),
            upvotes: post_data.score,
            created_at: epoch_to_datetime(post_data.created_utc),
            url: post_data.url,
            comments: Vec::new(),
            category: None,
        }
    }
}

impl From<RedditCommentData> for Comment {
    fn from(data: RedditCommentData) -> Self {
        Self {
            author: author_or_anonymous(data.author),
            content: data.body,
            upvotes: data.score,
            created_at: epoch_to_datetime(data.created_utc),
        }
    }
}
