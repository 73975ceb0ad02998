//! JSON array files of posts on disk.

use crate::error::CoreError;
use crate::types::Post;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{error, info};

/// Reads a JSON array of posts. A missing or malformed file is logged and
/// yields an empty list so callers continue with empty input.
pub fn load_posts(path: &Path) -> Vec<Post> {
    match read_json::<Vec<Post>>(path) {
        Ok(posts) => {
            info!(path = %path.display(), count = posts.len(), "Loaded posts");
            posts
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "Could not load posts");
            Vec::new()
        }
    }
}

/// Ids of the records in `path` that carry one.
pub fn load_post_ids(path: &Path) -> Vec<String> {
    #[derive(Deserialize)]
    struct IdOnly {
        #[serde(default)]
        id: Option<serde_json::Value>,
    }

    match read_json::<Vec<IdOnly>>(path) {
        Ok(records) => records
            .into_iter()
            .filter_map(|record| match record.id? {
                serde_json::Value::String(id) => Some(id),
                serde_json::Value::Number(id) => Some(id.to_string()),
                _ => None,
            })
            .collect(),
        Err(e) => {
            error!(path = %path.display(), error = %e, "Could not load post ids");
            Vec::new()
        }
    }
}

pub fn save_posts(path: &Path, posts: &[Post]) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let body = serde_json::to_string_pretty(posts)?;
    fs::write(path, body)?;
    info!(path = %path.display(), count = posts.len(), "Saved posts");
    Ok(())
}

pub fn strip_ids(posts: &mut [Post]) {
    for post in posts.iter_mut() {
        post.id = None;
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, CoreError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}
