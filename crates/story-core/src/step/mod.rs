//! Contratos neutrales de un paso del pipeline.

mod definition;
mod descriptor;

pub use definition::{ParsedPayload, PromptBundle, StepDefinition, StepPlan, SubPrompt};
pub use descriptor::StepDescriptor;
