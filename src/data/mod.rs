//! Artifact storage, layer codecs and external rate sources
//!
//! # Components
//!
//! - **artifacts**: `ArtifactStore` trait with filesystem and in-memory stores
//! - **codec**: byte encodings of the bronze, silver and gold layers
//! - **sources**: rate-quote API integrations

pub mod artifacts;
pub mod codec;
pub mod sources;

pub use artifacts::{ArtifactStore, FsArtifactStore, InMemoryArtifactStore, Layer};
pub use sources::{ExchangeRateApiSource, RateQuoteSource};
