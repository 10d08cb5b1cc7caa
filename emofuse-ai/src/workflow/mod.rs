//! Analysis workflow
//!
//! Collaborator traits and the shared input model ([`input`]) plus the
//! request orchestrator ([`orchestrator`]).

pub mod input;
pub mod orchestrator;

pub use input::{DecodedInput, InputAcquirer, ModalityAnalyzer, ScratchDir, SourceDescriptor};
pub use orchestrator::{Analysis, FusionOrchestrator, SourceInfo};
