//! Open Synthesis synthesis engine
//!
//! Turns retrieved evidence into grounded text:
//! - Single-slot admission control for the inference backend
//! - Prompt construction and context-window budgeting
//! - Blocking and streaming synthesis
//! - Model-driven validation passes
//! - Multi-section paper generation

pub mod admission;
pub mod paper;
pub mod prompts;
pub mod synthesizer;
pub mod validation;

pub use admission::{GenerationSlot, SlotGuard};
pub use paper::PaperPipeline;
pub use synthesizer::{EventStream, SourceSummary, SynthesisEvent, Synthesizer};
pub use validation::{ModelOutput, Validator};

#[cfg(test)]
pub(crate) mod testing;
