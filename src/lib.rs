//! # Knowledge Compiler
//!
//! Compiles a directory of heterogeneous files into a single structured
//! knowledge artifact for downstream LLM consumption.
//!
//! The pipeline walks a source tree, extracts text and metadata from each
//! supported file type (PDF, images, JSON/YAML/CSV/XML/DOCX, plain text,
//! zip archives), folds the results into one nested store bucketed by
//! content type, splits oversized values into bounded chunks, and writes the
//! whole thing out as JSON or Markdown.
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌─────────────┐   ┌──────────┐
//! │   Scan    │──▶│  Extract   │──▶│  Aggregate   │──▶│  Export   │
//! │ walk+zip  │   │ per-format │   │ classify/key │   │ json/md  │
//! └──────────┘   └───────────┘   │ chunk/normal │   └──────────┘
//!                                └─────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`scan`] | Directory traversal and exclusion rules |
//! | [`archive`] | Zip expansion |
//! | [`extract`] | Per-format extraction |
//! | [`classify`] | Content-type classification |
//! | [`chunk`] | Bounded-size text chunking |
//! | [`organize`] | Aggregation, key allocation, deep normalization |
//! | [`export`] | JSON/Markdown artifact writers |

pub mod archive;
pub mod chunk;
pub mod classify;
pub mod config;
pub mod export;
pub mod extract;
pub mod models;
pub mod organize;
pub mod scan;
