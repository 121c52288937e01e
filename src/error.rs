//! Error taxonomy shared by the core pipeline.
//!
//! Every failure mode a caller may want to branch on gets its own variant;
//! the HTTP layer maps them to status codes and the CLI prints them through
//! `anyhow`. Backend failures are split so "embedding service is down" and
//! "generation failed" remain distinguishable from "no document loaded".

use std::path::PathBuf;

/// Errors produced by the docchat core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed caller input, e.g. an unknown chunking strategy name.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An operation that needs an index was attempted before one was built.
    #[error("no document loaded. Upload a document first.")]
    NotReady,

    /// The referenced document file does not exist.
    #[error("document not found: {0}")]
    NotFound(PathBuf),

    /// The embedding backend failed or timed out.
    #[error("embedding backend failed: {0}")]
    Embedding(String),

    /// The generation backend failed or timed out.
    #[error("answer synthesis failed: {0}")]
    Synthesis(String),

    /// The guardrail vetoed the query. A policy decision, not a system
    /// error; the message is safe to show to the user.
    #[error("{0}")]
    Rejected(String),
}

pub type Result<T> = std::result::Result<T, Error>;
