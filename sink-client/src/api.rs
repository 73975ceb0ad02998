//! HTTP surface of the posts backend.

use chrono::{DateTime, SecondsFormat, Utc};
use logipost_core::{Comment, Post, SinkError};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Raw status and body of a sink call; interpretation is left to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// The `id` of a created record, accepting either a JSON string or number.
    pub fn created_id(&self) -> Result<String, SinkError> {
        let missing = || SinkError::MissingPostId {
            body: self.body.clone(),
        };
        let value: serde_json::Value = serde_json::from_str(&self.body).map_err(|_| missing())?;
        match value.get("id") {
            Some(serde_json::Value::String(id)) if !id.is_empty() => Ok(id.clone()),
            Some(serde_json::Value::Number(id)) => Ok(id.to_string()),
            _ => Err(missing()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub author: String,
    pub category: String,
    pub upvotes: i64,
    pub created_at: String,
}

impl NewPost {
    pub fn from_post(post: &Post, default_category: &str) -> Self {
        Self {
            title: post.title.clone(),
            content: post.content.clone(),
            author: post.author.clone(),
            category: post
                .category
                .clone()
                .unwrap_or_else(|| default_category.to_string()),
            upvotes: post.upvotes,
            created_at: iso8601(&post.created_at),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewComment {
    pub content: String,
    pub author: String,
    pub created_at: String,
}

impl From<&Comment> for NewComment {
    fn from(comment: &Comment) -> Self {
        Self {
            content: comment.content.clone(),
            author: comment.author.clone(),
            created_at: iso8601(&comment.created_at),
        }
    }
}

fn iso8601(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub trait SinkApi {
    async fn upload_post(&self, post: &NewPost) -> Result<ApiResponse, SinkError>;
    async fn upload_comment(
        &self,
        post_id: &str,
        comment: &NewComment,
    ) -> Result<ApiResponse, SinkError>;
    async fn delete_post(&self, post_id: &str) -> Result<ApiResponse, SinkError>;
}

#[derive(Debug, Clone)]
pub struct HttpSink {
    http: reqwest::Client,
    base_url: String,
}

impl HttpSink {
    pub fn new(base_url: &str) -> Result<Self, SinkError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SinkError::RequestFailed {
                reason: e.to_string(),
            })?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<ApiResponse, SinkError> {
        let response = request.send().await.map_err(|e| self.map_transport_error(e))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| self.map_transport_error(e))?;
        Ok(ApiResponse { status, body })
    }

    fn map_transport_error(&self, e: reqwest::Error) -> SinkError {
        if e.is_connect() {
            SinkError::Unreachable {
                base_url: self.base_url.clone(),
            }
        } else {
            SinkError::RequestFailed {
                reason: e.to_string(),
            }
        }
    }
}

impl SinkApi for HttpSink {
    async fn upload_post(&self, post: &NewPost) -> Result<ApiResponse, SinkError> {
        let url = format!("{}/upload_post/", self.base_url);
        debug!(%url, "Uploading post");
        self.send(self.http.post(&url).json(post)).await
    }

    async fn upload_comment(
        &self,
        post_id: &str,
        comment: &NewComment,
    ) -> Result<ApiResponse, SinkError> {
        let url = format!("{}/upload_comment/{}", self.base_url, post_id);
        debug!(%url, "Uploading comment");
        self.send(self.http.post(&url).json(comment)).await
    }

    async fn delete_post(&self, post_id: &str) -> Result<ApiResponse, SinkError> {
        let url = format!("{}/delete_post/{}", self.base_url, post_id);
        debug!(%url, "Deleting post");
        self.send(self.http.delete(&url)).await
    }
}
