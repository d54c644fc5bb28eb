//! Job pipeline facade for FrameSight.
//!
//! This crate wires the queue, worker pool, status tracker and change
//! notifier into the single object external callers use.

pub mod pipeline;

pub use pipeline::{JobPipeline, PipelineConfig};
