pub mod config;
pub mod dedup;
pub mod error;
pub mod error_utils;
pub mod filter;
pub mod normalize;
pub mod shutdown;
pub mod store;
pub mod types;

pub use config::*;
pub use dedup::*;
pub use error::*;
pub use error_utils::*;
pub use filter::*;
pub use normalize::*;
pub use shutdown::*;
pub use store::*;
pub use types::*;
