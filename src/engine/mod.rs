//! Core re-encoding engine
//!
//! The coordinator drives a playback session, paints sampled frames onto a
//! capture surface and collects what the stream encoder produces from it.

pub mod coordinator;
pub mod encoder;
pub mod progress;
pub mod sampler;
pub mod scheduler;
pub mod session;

pub use coordinator::{PipelineRun, RunDeps, RunKind, RunPlan, RunState};
pub use progress::{
    ConsoleProgressCallback, JsonProgressCallback, NoOpProgressCallback, ProgressCallback,
    ProgressReporter,
};
pub use scheduler::{DisplayRefresh, IntervalTicker, TickScheduler, TickSource};
