// src/lib.rs

//! Orka: a small async workflow engine.
//!
//! A pipeline is an ordered list of named steps. Each step carries `before`, `on` and `after`
//! handlers that receive a shared [`ContextData`] and return a [`PipelineControl`] signal.
//!
//!  - Steps can be skipped with a `skip_if` condition evaluated against the context.
//!  - Any handler may halt the pipeline early with `PipelineControl::Stop`.
//!  - Optional steps are failure boundaries: a failing handler in an optional step is logged
//!    and the pipeline moves on to the next step.
//!  - The [`Orka`] registry keys pipelines by their context type and dispatches `run` calls.

pub mod core;
pub mod error;
pub mod pipeline;
pub mod registry;

pub use crate::core::context::Handler;
pub use crate::core::context_data::ContextData;
pub use crate::core::control::{PipelineControl, PipelineResult};
pub use crate::core::step::{SkipCondition, StepDef};

pub use crate::pipeline::definition::Pipeline;

pub use crate::error::{OrkaError, OrkaResult};

pub use crate::registry::Orka;
