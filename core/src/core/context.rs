// src/core/context.rs

//! The boxed handler type stored for each step phase.

use crate::core::context_data::ContextData;
use crate::core::control::PipelineControl;
use std::future::Future;
use std::pin::Pin;

/// A pipeline step handler.
///
/// Handlers receive a clone of the pipeline's `ContextData<TData>` and resolve to a
/// `PipelineControl` signal or the pipeline's error type. Lock guards taken inside a handler
/// must be released before the handler awaits anything.
pub type Handler<TData, Err> = Box<
  dyn Fn(ContextData<TData>) -> Pin<Box<dyn Future<Output = Result<PipelineControl, Err>> + Send>>
    + Send
    + Sync,
>;
