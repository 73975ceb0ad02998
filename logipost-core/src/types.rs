use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

pub const DEFAULT_AUTHOR: &str = "Anonymous";
pub const MAX_COMMENTS: usize = 5;

/// A scraped post as it moves through the pipeline and lands in the JSON files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,
    #[serde(default, alias = "source")]
    pub subreddit: String,
    #[serde(default = "default_author", deserialize_with = "null_as_anonymous")]
    pub author: String,
    #[serde(default)]
    pub upvotes: i64,
    #[serde(default = "Utc::now", alias = "created_utc")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(default = "default_author", deserialize_with = "null_as_anonymous")]
    pub author: String,
    #[serde(default, alias = "body", deserialize_with = "null_as_empty")]
    pub content: String,
    #[serde(default)]
    pub upvotes: i64,
    #[serde(default = "Utc::now", alias = "created_utc")]
    pub created_at: DateTime<Utc>,
}

impl Post {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            content: content.into(),
            subreddit: String::new(),
            author: DEFAULT_AUTHOR.to_string(),
            upvotes: 0,
            created_at: Utc::now(),
            url: String::new(),
            comments: Vec::new(),
            category: None,
        }
    }

    pub fn with_upvotes(mut self, upvotes: i64) -> Self {
        self.upvotes = upvotes;
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Appends comments in source order, dropping anything past [`MAX_COMMENTS`].
    pub fn with_comments(mut self, comments: impl IntoIterator<Item = Comment>) -> Self {
        self.comments.extend(comments);
        self.comments.truncate(MAX_COMMENTS);
        self
    }

    pub fn normalized_title(&self) -> String {
        crate::dedup::normalized_title(&self.title)
    }

    pub fn comment_count(&self) -> usize {
        self.comments.len()
    }
}

impl Comment {
    pub fn new(author: Option<String>, content: impl Into<String>) -> Self {
        Self {
            author: author_or_anonymous(author),
            content: content.into(),
            upvotes: 0,
            created_at: Utc::now(),
        }
    }
}

/// Reddit reports removed accounts as missing or `[deleted]`; both collapse
/// to the anonymous sentinel.
pub fn author_or_anonymous(author: Option<String>) -> String {
    match author {
        Some(name) if !name.is_empty() && name != "[deleted]" => name,
        _ => DEFAULT_AUTHOR.to_string(),
    }
}

fn default_author() -> String {
    DEFAULT_AUTHOR.to_string()
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_anonymous<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(author_or_anonymous(Option::<String>::deserialize(
        deserializer,
    )?))
}
