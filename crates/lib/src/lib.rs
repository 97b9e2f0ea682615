//! # Generative Call Governor
//!
//! This crate drives batch generation of SEO travel content through a
//! rate-limited AI provider. Every call for an item goes through an
//! [`ItemPipeline`]: the prompt is composed from a template, the provider call
//! waits on a [`RateLimiter`], the answer is repaired and parsed as JSON, and the
//! suggested links are checked by a [`LinkValidator`] before the record is
//! persisted by the [`BatchRunner`].

pub mod batch;
pub mod data;
pub mod errors;
pub mod links;
pub mod normalize;
pub mod pipeline;
pub mod prompts;
pub mod providers;
pub mod rate_limit;
pub mod storage;
pub mod types;

pub use batch::{BatchRunner, BatchSettings, OptionCollector};
pub use data::{storage_key, CityCatalog, SortColumn};
pub use errors::{BatchError, ItemError, ProviderError, TemplateError};
pub use links::LinkValidator;
pub use normalize::{normalize, parse, repair, NormalizedPayload, Repair, REPAIR_RULES};
pub use pipeline::{Discarded, ImageStage, ItemPipeline, ItemStage};
pub use prompts::{render, PromptTemplates};
pub use rate_limit::RateLimiter;
pub use storage::{ImageStore, RecordStore};
pub use types::{BatchSummary, CityRecords, CityRow, ContentRecord, Item, MissingReport, OptionEntry, OptionList};
