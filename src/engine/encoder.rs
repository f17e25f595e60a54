//! Stream encoder stage: codec negotiation and chunk collection

use tracing::{debug, info, warn};

use crate::domain::errors::{PipelineError, PipelineResult};
use crate::domain::model::{CodecPreference, EncoderSettings, OutputArtifact};
use crate::domain::surface::SharedSurface;
use crate::engine::session::{EncodingSession, SessionState};
use crate::ports::{EncoderEvent, EncoderFactory, StreamEncoder};
use tokio::sync::mpsc;

/// What the coordinator should do after an encoder event
#[derive(Debug)]
pub enum StageSignal {
    /// Keep going
    Continue,
    /// All chunks delivered; artifact can be assembled
    Finalized,
}

/// A negotiated encoder together with the session collecting its output
pub struct EncoderStage {
    preference: CodecPreference,
    encoder: Box<dyn StreamEncoder>,
    events: mpsc::UnboundedReceiver<EncoderEvent>,
    session: EncodingSession,
    finalized: bool,
}

/// Build an encoder from the first preference the factory accepts.
///
/// Rejected preferences are logged and skipped; only exhausting the list
/// is an error.
pub async fn negotiate(
    factory: &dyn EncoderFactory,
    preferences: &[CodecPreference],
    settings: &EncoderSettings,
    surface: &SharedSurface,
) -> PipelineResult<EncoderStage> {
    let mut tried = Vec::with_capacity(preferences.len());

    for preference in preferences {
        match factory.create(preference, settings, surface.clone()).await {
            Ok(handle) => {
                info!(
                    codec = %preference.codec,
                    container = %preference.container,
                    "Encoder negotiated"
                );
                return Ok(EncoderStage {
                    preference: preference.clone(),
                    encoder: handle.encoder,
                    events: handle.events,
                    session: EncodingSession::new(),
                    finalized: false,
                });
            }
            Err(e) => {
                warn!(codec = %preference.codec, error = %e, "Codec rejected, trying next preference");
                tried.push(preference.codec.clone());
            }
        }
    }

    Err(PipelineError::EncoderInit {
        tried: if tried.is_empty() {
            "none".to_string()
        } else {
            tried.join(", ")
        },
    })
}

impl EncoderStage {
    pub fn preference(&self) -> &CodecPreference {
        &self.preference
    }

    pub fn session(&self) -> &EncodingSession {
        &self.session
    }

    /// Start capturing and open the session for chunks
    pub fn start(&mut self) -> PipelineResult<()> {
        self.encoder.start()?;
        self.session.begin();
        Ok(())
    }

    /// Request finalization; safe to call more than once
    pub fn stop(&mut self) {
        if self.encoder.is_recording() {
            debug!("Stopping encoder");
        }
        self.encoder.stop();
    }

    /// Wait for the next encoder event. `None` means the encoder went away.
    pub async fn next_event(&mut self) -> Option<EncoderEvent> {
        self.events.recv().await
    }

    /// Fold one event into the session
    pub fn absorb(&mut self, event: Option<EncoderEvent>) -> PipelineResult<StageSignal> {
        match event {
            Some(EncoderEvent::Chunk(chunk)) => {
                self.session.append(chunk);
                Ok(StageSignal::Continue)
            }
            Some(EncoderEvent::Finalized) => {
                if self.session.state() != SessionState::Recording {
                    return Err(PipelineError::encode("encoder finalized before it started"));
                }
                self.finalized = true;
                Ok(StageSignal::Finalized)
            }
            Some(EncoderEvent::Failed(err)) => Err(err),
            None => Err(PipelineError::encode(
                "encoder exited without finalizing",
            )),
        }
    }

    /// Concatenate the session into the output artifact
    pub fn take_artifact(&mut self) -> PipelineResult<OutputArtifact> {
        if !self.finalized {
            return Err(PipelineError::encode("artifact requested before finalize"));
        }
        self.session
            .finish(&self.preference)
            .ok_or_else(|| PipelineError::encode("encoding session already closed"))
    }

    /// Release the encoder; drops any chunks not yet turned into an artifact
    pub async fn release(&mut self) {
        self.encoder.abort().await;
        if self.session.state() == SessionState::Recording {
            self.session.discard();
        }
        self.events.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::synthetic::{ResourceTracker, SyntheticEncoderFactory};
    use crate::domain::model::SurfaceSize;
    use crate::domain::surface::CaptureSurface;

    fn settings() -> EncoderSettings {
        EncoderSettings {
            size: SurfaceSize { width: 8, height: 8 },
            capture_fps: 10,
            bitrate: 100_000,
            time_scale: 1.0,
        }
    }

    #[tokio::test]
    async fn test_negotiate_prefers_first_codec() {
        let tracker = ResourceTracker::new();
        let factory = SyntheticEncoderFactory::new(tracker.clone());
        let surface = CaptureSurface::shared(SurfaceSize { width: 8, height: 8 }).unwrap();

        let mut stage = negotiate(
            &factory,
            &CodecPreference::default_preferences(),
            &settings(),
            &surface,
        )
        .await
        .unwrap();
        assert_eq!(stage.preference().codec, "libvpx-vp9");
        assert_eq!(tracker.open_encoders(), 1);

        stage.release().await;
        assert_eq!(tracker.open_encoders(), 0);
    }

    #[tokio::test]
    async fn test_negotiate_falls_back() {
        let tracker = ResourceTracker::new();
        let factory = SyntheticEncoderFactory::new(tracker.clone()).reject_codec("libvpx-vp9");
        let surface = CaptureSurface::shared(SurfaceSize { width: 8, height: 8 }).unwrap();

        let mut stage = negotiate(
            &factory,
            &CodecPreference::default_preferences(),
            &settings(),
            &surface,
        )
        .await
        .unwrap();
        assert_eq!(stage.preference().codec, "libvpx");
        stage.release().await;
    }

    #[tokio::test]
    async fn test_negotiate_exhausted() {
        let tracker = ResourceTracker::new();
        let factory = SyntheticEncoderFactory::new(tracker.clone())
            .reject_codec("libvpx-vp9")
            .reject_codec("libvpx")
            .reject_codec("libx264");
        let surface = CaptureSurface::shared(SurfaceSize { width: 8, height: 8 }).unwrap();

        let err = negotiate(
            &factory,
            &CodecPreference::default_preferences(),
            &settings(),
            &surface,
        )
        .await
        .err()
        .unwrap();
        assert!(matches!(err, PipelineError::EncoderInit { .. }));
        assert!(err.to_string().contains("libx264"));
        assert_eq!(tracker.open_encoders(), 0);
    }

    #[tokio::test]
    async fn test_finalized_before_start_is_an_error() {
        let tracker = ResourceTracker::new();
        let factory = SyntheticEncoderFactory::new(tracker);
        let surface = CaptureSurface::shared(SurfaceSize { width: 8, height: 8 }).unwrap();
        let mut stage = negotiate(&factory, &CodecPreference::default_preferences(), &settings(), &surface)
            .await
            .unwrap();

        assert!(stage.absorb(Some(EncoderEvent::Finalized)).is_err());
        assert!(stage.absorb(None).is_err());
        stage.release().await;
    }
}
