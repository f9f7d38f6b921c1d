//! Artifact extraction from free-form model responses
//!
//! Completion responses are prose with code embedded in markdown fences.
//! This module pulls out the pieces the rest of the pipeline can act on:
//!
//! ```text
//! raw response ─→ fenced bodies + inline `spans` ─→ candidate list
//!                                                      │
//!                       ┌──────────────────────────────┴──────────┐
//!                  Install mode                               Code mode
//!            keep "pip" / "apt-get"                  keep import/def/class/print
//!                 (all matches)                         (longest one only)
//! ```
//!
//! Extraction is purely textual. Nothing here parses the generated language.

pub mod blocks;

pub use blocks::{candidate_blocks, extract, ExtractionMode, InstallSet};
