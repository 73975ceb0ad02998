pub mod api;
pub mod uploader;

pub use api::{ApiResponse, HttpSink, NewComment, NewPost, SinkApi};
pub use uploader::{BatchReport, ItemOutcome, Uploader, DEFAULT_DELAY};
