//! Local media indexing, folder browsing and bounded playback history.

pub mod catalog;
pub mod config;
pub mod error;
pub mod filter;
pub mod folders;
pub mod history;
pub mod indexer;
pub mod kv;
pub mod library;
pub mod model;
pub mod player_log;
pub mod session;
pub mod stream;
pub mod worker;

pub use error::{MediaError, Result};
