//! Natural-language dataset search.
//!
//! `dataset-scout` turns a request such as "housing prices in California"
//! into a structured query with an LLM, searches Kaggle, Hugging Face and
//! Google Dataset Search concurrently through [`scout_search`], and returns
//! one ranked, deduplicated list of datasets.
//!
//! # Example
//!
//! ```no_run
//! # async fn example() -> dataset_scout::error::Result<()> {
//! use dataset_scout::{Scout, ScoutConfig, SearchRequest};
//!
//! let config = ScoutConfig::load(None)?;
//! let scout = Scout::from_config(&config)?;
//! let outcome = scout.search(&SearchRequest::new("housing prices in California")).await?;
//! for record in &outcome.result.records {
//!     println!("{:.2} {} <{}>", record.score, record.title, record.url);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod llm;
pub mod scout;

pub use config::{LlmConfig, ScoutConfig};
pub use error::{Result, ScoutError};
pub use llm::OpenAiCapability;
pub use scout::{Scout, SearchOutcome, SearchRequest};

pub use scout_search;
