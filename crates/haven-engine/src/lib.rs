//! # haven-engine
//!
//! The companion's model-facing machinery on top of the vault:
//!
//! - the **memory extraction pipeline**, a detached background job that
//!   digests recent activity into a daily memory via a single LLM call;
//! - the **context window assembler**, which shapes everything the vault
//!   knows into one bounded prompt payload per conversational turn;
//! - the **crisis gate**, which consults the (external) crisis classifier
//!   before any model request is constructed.
//!
//! Everything here is non-fatal to the primary chat flow: a broken
//! extraction or a missing context section degrades the experience, never
//! the user's ability to send and receive messages.

pub mod context;
pub mod crisis;
pub mod extraction;

mod error;

pub use context::{ActivityInsights, ContextAssembler, ContextRequest, NoInsights};
pub use crisis::{gate_message, CrisisClassifier, MessageGate};
pub use error::EngineError;
pub use extraction::{ExtractionOutcome, ExtractionPipeline};
