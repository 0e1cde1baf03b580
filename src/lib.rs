//! # Evidence Harness
//!
//! Per-organization sentence retrieval over paginated scraped documents.
//!
//! Evidence Harness reads each organization's scraped documents, splits
//! them into page-tagged sentences, embeds every sentence once, and answers
//! a table of (organization, question) rows with the sentences most similar
//! to each question, restricted to that organization's documents.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────┐   ┌────────────────┐
//! │    Loader    │──▶│  Segment  │──▶│ EmbeddingIndex │
//! │ content.csv  │   │ page+sent │   │  encode once   │
//! └──────────────┘   └───────────┘   └───────┬────────┘
//!                                            │
//! ┌──────────────┐   ┌───────────┐   ┌───────▼────────┐
//! │  output.csv  │◀──│ Aggregate │◀──│   Retrieval    │
//! │ +6 columns   │   │  per row  │   │ threshold/top-k│
//! └──────────────┘   └───────────┘   └────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! evh corpus                    # check what was scraped
//! evh query "water targets" --org Acme
//! evh run                       # answer every question row
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`loader`] | Corpus discovery and `content.csv` parsing |
//! | [`segment`] | Page and sentence segmentation |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | In-memory embedding index and query cache |
//! | [`keyword`] | Keyword extraction for keyword mode |
//! | [`retrieval`] | Threshold, top-k and fallback selection |
//! | [`questions`] | Question table |
//! | [`aggregate`] | Result columns and CSV output |
//! | [`pipeline`] | End-to-end run |
//! | [`stats`] | Corpus statistics |
//! | [`progress`] | Progress reporting |
//! | [`error`] | Fatal encoder errors |

pub mod aggregate;
pub mod config;
pub mod embedding;
pub mod error;
pub mod index;
pub mod keyword;
pub mod loader;
pub mod models;
pub mod pipeline;
pub mod progress;
pub mod questions;
pub mod retrieval;
pub mod segment;
pub mod stats;
