// Adapters - External system implementations

pub mod encoder_libav;
pub mod playback_libav;
pub mod synthetic;
pub mod toml_config;

// Re-export adapters
pub use encoder_libav::LibavEncoderFactory;
pub use playback_libav::LibavMediaBackend;
pub use synthetic::{ResourceTracker, SyntheticBackend, SyntheticClip, SyntheticEncoderFactory};
pub use toml_config::{PipelineConfig, TomlConfigAdapter};
