// Application layer - Use cases over the engine

pub mod container;
pub mod highlights;
pub mod pipeline;

pub use container::{AppContainer, DefaultAppContainer};
pub use highlights::{export_highlights, HighlightOutcome};
pub use pipeline::Pipeline;
