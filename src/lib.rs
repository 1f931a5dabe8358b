//! # rusty-fx
//!
//! A daily exchange-rate pipeline organised in refinement layers.
//!
//! Raw rate quotes are captured untouched (bronze), normalized into a
//! validated long table (silver), pivoted into one wide snapshot per day with
//! derived cross rates (gold), and finally compared with the previous day to
//! produce a chart and an optional narrative.
//!
//! ## Example
//!
//! ```rust,no_run
//! use rusty_fx::prelude::*;
//!
//! # async fn example() -> Result<()> {
//! let config = PipelineConfig::load(None)?;
//! let store = FsArtifactStore::from_config(&config);
//! let source = ExchangeRateApiSource::from_config(&config)?;
//! let generator = GeminiClient::from_config(&config.llm)?;
//!
//! let engine = PipelineEngine::new(config, store);
//! let run = engine
//!     .run(&source, generator.as_ref(), chrono::Local::now().date_naive())
//!     .await;
//! println!("{} finished {}", run.id, run.state);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod schema;
pub mod types;

pub mod prelude {
    //! Commonly used types and traits
    pub use crate::config::PipelineConfig;
    pub use crate::data::{
        ArtifactStore, ExchangeRateApiSource, FsArtifactStore, InMemoryArtifactStore, Layer,
        RateQuoteSource,
    };
    pub use crate::engine::{PipelineEngine, PipelineRun, RunState};
    pub use crate::error::{FxError, Result};
    pub use crate::pipeline::{GeminiClient, NarrativeGenerator, StageOutcome};
    pub use crate::schema::ReportSchema;
    pub use crate::types::*;
}
