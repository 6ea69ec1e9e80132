//! Default implementations of the capabilities the chat engine consumes:
//! intent classification, slot extraction and product recommendation.
//!
//! All of them are deterministic. The engine only sees the traits in
//! `chatflow_core::ports`, so any of these can be swapped for a model-backed
//! implementation without touching the workflow.

pub mod classifier;
pub mod extractors;
pub mod recommend;

pub use classifier::KeywordIntentClassifier;
pub use extractors::{
    default_extractors, ComplaintSummaryExtractor, FreeTextExtractor, OrderNumberExtractor,
    PhoneNumberExtractor,
};
pub use recommend::PreferenceRecommender;
