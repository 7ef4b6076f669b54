mod batch_enrichment_service;
mod event_enricher;
mod event_normalizer;
mod pipeline_observer;
mod safety_evaluator;

pub use batch_enrichment_service::*;
pub use event_enricher::*;
pub use event_normalizer::*;
pub use pipeline_observer::*;
pub use safety_evaluator::*;
