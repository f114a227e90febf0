// shared/src/lib.rs

/// Errors surfaced by fetch operations behind the response cache. Cloneable
/// so one failure can be handed to every caller waiting on the same fetch.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("fetch failed: {0}")]
    Fetch(String),
}

pub type Result<T> = std::result::Result<T, Error>;

pub mod config;
