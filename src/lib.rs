//! # docchat
//!
//! Document question-answering with retrieval-augmented generation.
//!
//! Upload a document, have it split into passages and embedded into an
//! in-memory vector index, then ask natural-language questions answered
//! from retrieved passages by a generation model. A self-supervised
//! evaluator measures retrieval quality (Hit Rate, MRR) without external
//! labels.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌──────────────┐
//! │  Loader  │──▶│ Chunker  │──▶│ Vector Index │
//! │ PDF/text │   │ passages │   │ embed+cosine │
//! └──────────┘   └──────────┘   └──────┬───────┘
//!                                      │
//!            ┌─────────────┬───────────┤
//!            ▼             ▼           ▼
//!       ┌─────────┐  ┌───────────┐ ┌───────────┐
//!       │ Query + │  │ Evaluator │ │ retrieve_ │
//!       │ Answer  │  │ HitRate / │ │ chunks    │
//!       │ (LLM)   │  │ MRR       │ │           │
//!       └─────────┘  └───────────┘ └───────────┘
//! ```
//!
//! Queries pass through the guardrail before touching retrieval. One
//! engine instance holds at most one indexed document; each upload
//! rebuilds the index atomically and nothing persists across restarts.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error taxonomy |
//! | [`models`] | Core data types |
//! | [`loader`] | Document loading (PDF, plain text) |
//! | [`chunker`] | Splitting strategies: fixed, medium, sentence |
//! | [`embedding`] | Embedding backends (Ollama, OpenAI, hash) |
//! | [`index`] | In-memory vector index |
//! | [`guardrail`] | Query validation |
//! | [`synthesis`] | Answer generation from retrieved context |
//! | [`eval`] | Retrieval-quality evaluation |
//! | [`engine`] | Orchestration and shared state |
//! | [`server`] | HTTP API |

pub mod chunker;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod eval;
pub mod guardrail;
pub mod index;
pub mod loader;
pub mod models;
pub mod server;
pub mod synthesis;
