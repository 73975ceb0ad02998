use logipost_core::{save_posts, CoreError, ErrorExt, Post};
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use tracing::info;

/// Owns a post accumulator and writes it to `path` when dropped, so that
/// whatever was collected survives an early return, cancellation or panic.
/// [`FlushGuard::persist`] saves explicitly and disarms the guard.
pub struct FlushGuard {
    path: PathBuf,
    posts: Vec<Post>,
    armed: bool,
}

impl FlushGuard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_posts(path, Vec::new())
    }

    pub fn with_posts(path: impl Into<PathBuf>, posts: Vec<Post>) -> Self {
        Self {
            path: path.into(),
            posts,
            armed: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn persist(mut self) -> Result<Vec<Post>, CoreError> {
        self.armed = false;
        save_posts(&self.path, &self.posts)?;
        Ok(std::mem::take(&mut self.posts))
    }

    /// Gives the posts back without writing anything.
    pub fn disarm(mut self) -> Vec<Post> {
        self.armed = false;
        std::mem::take(&mut self.posts)
    }
}

impl Deref for FlushGuard {
    type Target = Vec<Post>;

    fn deref(&self) -> &Self::Target {
        &self.posts
    }
}

impl DerefMut for FlushGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.posts
    }
}

impl Drop for FlushGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        info!(
            path = %self.path.display(),
            count = self.posts.len(),
            "Saving collected posts before exit"
        );
        if let Err(e) = save_posts(&self.path, &self.posts) {
            e.log_error();
        }
    }
}
