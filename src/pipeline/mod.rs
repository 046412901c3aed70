//! Case notification pipeline.
//!
//! Pending work items flow through:
//! 1. `WorkItem::try_from`: construction-time validation of the raw payload
//! 2. `CaseProcessor::process`: enrichment, validation, dispatch, cleanup
//! 3. `BatchDriver::run`: sequential processing and the bulk status update

pub mod attachment;
pub mod batch;
pub mod processor;
pub mod types;
pub mod validation;

pub use batch::{BatchDriver, BatchReport};
pub use processor::{CaseProcessor, ProcessReport, ProcessorDeps};
