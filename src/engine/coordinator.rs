//! Progress/completion coordinator.
//!
//! One [`PipelineRun`] drives a single compression or extraction through
//! `Init -> Seeking -> Recording -> Finalizing -> Done`, with `Errored`
//! reachable from any non-terminal state. The run owns its driver, surface
//! and encoder; nothing is shared between runs.
//!
//! Suspension points are the seek, the settle delay, `play()`, each
//! rendering tick and the encoder's finalize signal. Every wait also races
//! the run's cancellation token.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::domain::errors::{PipelineError, PipelineResult};
use crate::domain::model::{CodecPreference, EncoderSettings, OutputArtifact, SourceAsset};
use crate::domain::rules::{recording_percent, surface_size, SizingPolicy};
use crate::domain::surface::{CaptureSurface, SharedSurface};
use crate::engine::encoder::{negotiate, EncoderStage, StageSignal};
use crate::engine::progress::ProgressReporter;
use crate::engine::sampler::FrameSampler;
use crate::engine::scheduler::{TickScheduler, TickSource};
use crate::ports::{EncoderEvent, EncoderFactory, MediaBackend, PlaybackPort, PlaybackState};

static NEXT_RUN_ID: AtomicU64 = AtomicU64::new(1);

/// Coordinator states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    Seeking,
    Recording,
    Finalizing,
    Done,
    Errored,
}

/// Which pipeline a run belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    /// Whole video, accelerated; completes on end of media
    Compress,
    /// `[start, end)` at real time; completes when the clock passes `end`
    Extract,
}

/// Everything a run needs to know up front
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub kind: RunKind,
    pub start: f64,
    /// `None` runs to the end of the media
    pub end: Option<f64>,
    pub sizing: SizingPolicy,
    pub playback_rate: f64,
    pub capture_fps: u32,
    pub bitrate: u64,
    /// Wait after the seek completes, before the encoder starts
    pub settle_delay: Duration,
    pub preferences: Vec<CodecPreference>,
}

/// Collaborators borrowed for the duration of a run
pub struct RunDeps<'a> {
    pub backend: &'a dyn MediaBackend,
    pub encoders: &'a dyn EncoderFactory,
    pub ticks: &'a dyn TickSource,
    pub cancel: CancellationToken,
}

/// What woke the recording loop
enum Trigger {
    Tick,
    MediaEnded,
    Encoder(Option<EncoderEvent>),
    Cancelled,
}

/// Result of handling one rendering tick
#[derive(Debug, PartialEq, Eq)]
enum TickOutcome {
    Continue,
    /// Stop scheduling ticks but keep waiting for end of media
    Idle,
    Complete,
}

/// Per-run context and state machine
pub struct PipelineRun {
    id: u64,
    plan: RunPlan,
    state: RunState,
    driver: Option<Box<dyn PlaybackPort>>,
    surface: Option<SharedSurface>,
    encoder: Option<EncoderStage>,
    progress: ProgressReporter,
    sampler: FrameSampler,
    target_end: f64,
    ticks: u64,
}

impl PipelineRun {
    pub fn new(plan: RunPlan, progress: ProgressReporter) -> Self {
        Self {
            id: NEXT_RUN_ID.fetch_add(1, Ordering::Relaxed),
            plan,
            state: RunState::Init,
            driver: None,
            surface: None,
            encoder: None,
            progress,
            sampler: FrameSampler::default(),
            target_end: 0.0,
            ticks: 0,
        }
    }

    /// Drive the run to `Done` or `Errored`. Resources are released on both paths.
    pub async fn execute(
        mut self,
        asset: &SourceAsset,
        deps: &RunDeps<'_>,
    ) -> PipelineResult<OutputArtifact> {
        let span = info_span!("pipeline", run = self.id, kind = ?self.plan.kind);
        async move {
            info!(asset = %asset.name(), bytes = asset.size(), "Run started");
            let outcome = self.drive(asset, deps).await;
            match outcome {
                Ok(artifact) => {
                    self.release().await;
                    self.transition(RunState::Done);
                    info!(
                        bytes = artifact.len(),
                        ticks = self.ticks,
                        codec = ?artifact.codec,
                        "Run finished"
                    );
                    Ok(artifact)
                }
                Err(err) => {
                    self.on_error(&err);
                    self.release().await;
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn drive(
        &mut self,
        asset: &SourceAsset,
        deps: &RunDeps<'_>,
    ) -> PipelineResult<OutputArtifact> {
        self.on_init(asset, deps).await?;

        self.transition(RunState::Seeking);
        self.on_seek(deps).await?;

        self.transition(RunState::Recording);
        self.on_record_start(deps).await?;
        self.record(deps).await?;

        self.transition(RunState::Finalizing);
        self.finalize(deps).await
    }

    fn transition(&mut self, next: RunState) {
        debug!(from = ?self.state, to = ?next, "State transition");
        self.state = next;
    }

    /// Open the asset and size the capture surface
    async fn on_init(&mut self, asset: &SourceAsset, deps: &RunDeps<'_>) -> PipelineResult<()> {
        let driver = tokio::select! {
            _ = deps.cancel.cancelled() => return Err(PipelineError::Cancelled),
            opened = deps.backend.open(asset) => opened?,
        };
        let meta = driver.metadata().clone();
        self.driver = Some(driver);

        let size = surface_size(&meta, self.plan.sizing)?;
        self.surface = Some(CaptureSurface::shared(size)?);
        self.target_end = self.plan.end.unwrap_or(meta.duration);

        info!(
            source_width = meta.width,
            source_height = meta.height,
            duration = meta.duration,
            surface_width = size.width,
            surface_height = size.height,
            "Capture surface sized"
        );
        Ok(())
    }

    /// Seek to the effective start and wait until it is safe to sample
    async fn on_seek(&mut self, deps: &RunDeps<'_>) -> PipelineResult<()> {
        let start = self.plan.start;
        let driver = self.driver_mut()?;
        tokio::select! {
            _ = deps.cancel.cancelled() => return Err(PipelineError::Cancelled),
            done = driver.seek(start) => done?,
        }
        debug!(start, "Seek completed");

        if !self.plan.settle_delay.is_zero() {
            tokio::select! {
                _ = deps.cancel.cancelled() => return Err(PipelineError::Cancelled),
                _ = tokio::time::sleep(self.plan.settle_delay) => {}
            }
        }
        Ok(())
    }

    /// Start the encoder, then playback
    async fn on_record_start(&mut self, deps: &RunDeps<'_>) -> PipelineResult<()> {
        let surface = self
            .surface
            .clone()
            .ok_or_else(|| PipelineError::surface("surface missing at record start"))?;
        let size = crate::domain::surface::lock_surface(&surface).size();
        let settings = EncoderSettings {
            size,
            capture_fps: self.plan.capture_fps,
            bitrate: self.plan.bitrate,
            time_scale: self.plan.playback_rate,
        };

        let stage = tokio::select! {
            _ = deps.cancel.cancelled() => return Err(PipelineError::Cancelled),
            stage = negotiate(deps.encoders, &self.plan.preferences, &settings, &surface) => stage?,
        };
        let stage = self.encoder.insert(stage);
        stage.start()?;

        let rate = self.plan.playback_rate;
        let driver = self.driver_mut()?;
        driver.set_rate(rate)?;
        tokio::select! {
            _ = deps.cancel.cancelled() => return Err(PipelineError::Cancelled),
            played = driver.play() => played?,
        }
        debug!(rate, "Playback started");
        Ok(())
    }

    /// Tick loop: sample, report, and watch for the completion trigger
    async fn record(&mut self, deps: &RunDeps<'_>) -> PipelineResult<()> {
        let mut ticker: Box<dyn TickScheduler> = deps.ticks.ticker();
        let mut ticking = true;
        let wait_for_end = self.plan.kind == RunKind::Compress;

        loop {
            let trigger = {
                let (driver, encoder) = match (self.driver.as_mut(), self.encoder.as_mut()) {
                    (Some(driver), Some(encoder)) => (driver, encoder),
                    _ => return Err(PipelineError::encode("recording without driver or encoder")),
                };
                tokio::select! {
                    biased;
                    _ = deps.cancel.cancelled() => Trigger::Cancelled,
                    event = encoder.next_event() => Trigger::Encoder(event),
                    _ = driver.ended(), if wait_for_end => Trigger::MediaEnded,
                    _ = ticker.tick(), if ticking => Trigger::Tick,
                }
            };

            match trigger {
                Trigger::Cancelled => return Err(PipelineError::Cancelled),
                Trigger::Encoder(event) => self.on_encoder_event(event)?,
                Trigger::MediaEnded => {
                    self.on_media_ended();
                    return Ok(());
                }
                Trigger::Tick => match self.on_tick()? {
                    TickOutcome::Continue => {}
                    TickOutcome::Idle => ticking = false,
                    TickOutcome::Complete => return Ok(()),
                },
            }
        }
    }

    fn on_tick(&mut self) -> PipelineResult<TickOutcome> {
        self.ticks += 1;
        let kind = self.plan.kind;
        let (start, end) = (self.plan.start, self.target_end);

        let (time, state) = {
            let driver = self.driver_mut()?;
            (driver.current_time(), driver.state())
        };

        match (kind, state) {
            (_, PlaybackState::Ended) | (RunKind::Extract, PlaybackState::Paused) => {
                return Ok(if kind == RunKind::Compress {
                    TickOutcome::Idle
                } else {
                    TickOutcome::Complete
                });
            }
            (RunKind::Compress, PlaybackState::Paused) => {
                return Err(PipelineError::playback(
                    "playback paused before end of media",
                ));
            }
            _ => {}
        }

        if time >= end {
            return Ok(match kind {
                RunKind::Extract => {
                    self.driver_mut()?.pause();
                    debug!(time, end, "Clip end reached");
                    TickOutcome::Complete
                }
                RunKind::Compress => TickOutcome::Idle,
            });
        }

        let (driver, surface) = match (self.driver.as_deref(), self.surface.as_ref()) {
            (Some(driver), Some(surface)) => (driver, surface),
            _ => return Err(PipelineError::surface("surface released during recording")),
        };
        self.sampler.sample(driver, surface)?;
        self.progress.report(recording_percent(time, start, end));
        Ok(TickOutcome::Continue)
    }

    fn on_media_ended(&mut self) {
        let time = self
            .driver
            .as_ref()
            .map(|d| d.current_time())
            .unwrap_or_default();
        debug!(time, "End of media");
    }

    fn on_encoder_event(&mut self, event: Option<EncoderEvent>) -> PipelineResult<()> {
        let stage = self.encoder_mut()?;
        match stage.absorb(event)? {
            StageSignal::Continue => Ok(()),
            StageSignal::Finalized => Err(PipelineError::encode(
                "encoder finalized before it was stopped",
            )),
        }
    }

    /// Stop the encoder and collect everything up to its finalize signal
    async fn finalize(&mut self, deps: &RunDeps<'_>) -> PipelineResult<OutputArtifact> {
        let stage = self.encoder_mut()?;
        stage.stop();

        loop {
            let event = tokio::select! {
                _ = deps.cancel.cancelled() => return Err(PipelineError::Cancelled),
                event = stage.next_event() => event,
            };
            if let StageSignal::Finalized = stage.absorb(event)? {
                break;
            }
        }

        debug!(
            chunks = stage.session().chunk_count(),
            bytes = stage.session().byte_len(),
            "Encoder finalized"
        );
        let artifact = stage.take_artifact()?;
        self.progress.complete();
        Ok(artifact)
    }

    fn on_error(&mut self, err: &PipelineError) {
        warn!(state = ?self.state, kind = err.kind(), error = %err, "Run failed");
        self.transition(RunState::Errored);
    }

    /// Release the encoder and the playback session; idempotent
    async fn release(&mut self) {
        if let Some(mut stage) = self.encoder.take() {
            stage.release().await;
        }
        if let Some(mut driver) = self.driver.take() {
            driver.close().await;
        }
        self.surface = None;
    }

    fn driver_mut(&mut self) -> PipelineResult<&mut Box<dyn PlaybackPort>> {
        self.driver
            .as_mut()
            .ok_or_else(|| PipelineError::load("playback session is not open"))
    }

    fn encoder_mut(&mut self) -> PipelineResult<&mut EncoderStage> {
        self.encoder
            .as_mut()
            .ok_or_else(|| PipelineError::encode("encoder is not running"))
    }
}
