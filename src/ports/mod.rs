// Ports - Interface definitions (contracts)

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::errors::{PipelineError, PipelineResult};
use crate::domain::model::*;
use crate::domain::surface::SharedSurface;

/// Playback state of a decode session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Paused,
    Playing,
    Ended,
}

/// A decoded frame in tightly packed RGBA at source resolution
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    /// Increments with every newly decoded frame
    pub sequence: u64,
    /// Presentation time in seconds
    pub time: f64,
    pub rgba: Arc<Vec<u8>>,
}

/// Port for opening video assets
#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Read intrinsic metadata without creating a playback session
    async fn probe(&self, asset: &SourceAsset) -> PipelineResult<MediaMetadata>;

    /// Open a time-addressable playback session
    async fn open(&self, asset: &SourceAsset) -> PipelineResult<Box<dyn PlaybackPort>>;
}

/// Port for one decode/playback session.
///
/// The session owns a playback clock. `current_frame` is the frame visible
/// at `current_time`.
#[async_trait]
pub trait PlaybackPort: Send {
    fn metadata(&self) -> &MediaMetadata;

    /// Move the playback position; resolves once the frame at `time` is visible
    async fn seek(&mut self, time: f64) -> PipelineResult<()>;

    /// Change the playback rate multiplier; takes effect immediately
    fn set_rate(&mut self, rate: f64) -> PipelineResult<()>;

    /// Start advancing the clock
    async fn play(&mut self) -> PipelineResult<()>;

    fn pause(&mut self);

    fn current_time(&self) -> f64;

    fn state(&self) -> PlaybackState;

    fn current_frame(&self) -> Option<VideoFrame>;

    /// Resolves when playback reaches end of media. Cancel-safe.
    async fn ended(&mut self);

    /// Release decoder resources and any temporary handle bound to the asset
    async fn close(&mut self);
}

/// Events emitted by a running encoder, in emission order
#[derive(Debug)]
pub enum EncoderEvent {
    /// Compressed bytes; consumers ignore empty chunks
    Chunk(Vec<u8>),
    /// All chunks have been delivered
    Finalized,
    /// Encoder failed after start
    Failed(PipelineError),
}

/// A constructed encoder plus its event stream
pub struct EncoderHandle {
    pub encoder: Box<dyn StreamEncoder>,
    pub events: mpsc::UnboundedReceiver<EncoderEvent>,
}

/// Port for building live stream encoders
#[async_trait]
pub trait EncoderFactory: Send + Sync {
    /// Construct an encoder for one codec preference.
    ///
    /// Failure here means only this preference is unusable.
    async fn create(
        &self,
        preference: &CodecPreference,
        settings: &EncoderSettings,
        surface: SharedSurface,
    ) -> PipelineResult<EncoderHandle>;
}

/// Port for a live encoder sampling a capture surface at its own rate
#[async_trait]
pub trait StreamEncoder: Send {
    /// Begin capturing the surface
    fn start(&mut self) -> PipelineResult<()>;

    /// Finish capturing; emits the remaining chunks then `Finalized`.
    /// No-op unless recording.
    fn stop(&mut self);

    fn is_recording(&self) -> bool;

    /// Discard everything and release resources
    async fn abort(&mut self);
}
