use logipost_core::CoreError;

pub mod openai;
pub mod rewriter;

pub use openai::OpenAiProvider;
pub use rewriter::{RewriteReport, Rewriter, DEFAULT_REWRITE_CAP};

/// A service that restates text without changing its meaning.
pub trait Paraphraser {
    async fn paraphrase(&self, text: &str) -> Result<String, CoreError>;
}
