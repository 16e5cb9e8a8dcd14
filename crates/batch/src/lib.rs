//! VideoStove Batch Coordinator
//!
//! Runs many projects through the full pipeline:
//!
//! ```text
//! resolve ─► plan transitions ─► synchronize ─► align captions ─► build plan ─► execute
//! ```
//!
//! A failure in any stage is recorded against its project and the batch
//! moves on. [`run_sequential`] is a plain loop; [`run`] bounds concurrency
//! with a semaphore and renders on the blocking thread pool.

pub mod coordinator;
pub mod manifest;
pub mod pipeline;
pub mod report;

pub use coordinator::*;
pub use manifest::*;
pub use pipeline::*;
pub use report::*;
