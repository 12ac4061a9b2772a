//! Errors for the site memory layer. Per spec §7 ("Cookie, memory, and
//! log write failures are swallowed and never surfaced"), callers inside
//! the agent loop generally discard these rather than propagate them;
//! they exist so the store itself, and its tests, can tell failure modes
//! apart.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SiteMemoryError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no card found for domain '{0}'")]
    DomainNotFound(String),

    #[error("invalid domain: {0}")]
    InvalidDomain(String),
}

pub type Result<T> = std::result::Result<T, SiteMemoryError>;
