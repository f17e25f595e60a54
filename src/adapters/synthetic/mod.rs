// Synthetic adapters - Deterministic in-process media and encoder
//
// Playback runs on the tokio clock, so runs under a paused runtime are fully
// reproducible. The encoder writes one JSON line per captured frame instead
// of compressed video, which lets callers inspect exactly what was captured.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

use crate::domain::errors::{PipelineError, PipelineResult};
use crate::domain::model::*;
use crate::domain::surface::{lock_surface, SharedSurface};
use crate::ports::*;

/// Counts open playback sessions and encoders across clones
#[derive(Debug, Clone, Default)]
pub struct ResourceTracker {
    playbacks: Arc<AtomicUsize>,
    encoders: Arc<AtomicUsize>,
    playbacks_opened: Arc<AtomicUsize>,
}

impl ResourceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_playbacks(&self) -> usize {
        self.playbacks.load(Ordering::SeqCst)
    }

    pub fn open_encoders(&self) -> usize {
        self.encoders.load(Ordering::SeqCst)
    }

    /// Playback sessions created over the tracker's lifetime
    pub fn playbacks_opened(&self) -> usize {
        self.playbacks_opened.load(Ordering::SeqCst)
    }

    /// True when nothing is left open
    pub fn is_idle(&self) -> bool {
        self.open_playbacks() == 0 && self.open_encoders() == 0
    }
}

/// A fake video: dimensions, duration and failure switches
#[derive(Debug, Clone)]
pub struct SyntheticClip {
    pub width: u32,
    pub height: u32,
    pub duration: f64,
    pub frame_rate: f64,
    pub seek_latency: Duration,
    pub refuse_play: bool,
    pub corrupt: bool,
}

impl SyntheticClip {
    pub fn new(width: u32, height: u32, duration: f64) -> Self {
        Self {
            width,
            height,
            duration,
            frame_rate: 30.0,
            seek_latency: Duration::ZERO,
            refuse_play: false,
            corrupt: false,
        }
    }

    pub fn with_frame_rate(mut self, frame_rate: f64) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    pub fn with_seek_latency(mut self, latency: Duration) -> Self {
        self.seek_latency = latency;
        self
    }

    /// `play()` fails as if autoplay were blocked
    pub fn refusing_play(mut self) -> Self {
        self.refuse_play = true;
        self
    }

    /// Opening fails as if the container were unreadable
    pub fn corrupt(mut self) -> Self {
        self.corrupt = true;
        self
    }

    fn metadata(&self) -> MediaMetadata {
        MediaMetadata {
            width: self.width,
            height: self.height,
            duration: self.duration,
            frame_rate: self.frame_rate,
        }
    }
}

/// Media backend serving [`SyntheticClip`]s by asset name
#[derive(Debug, Clone)]
pub struct SyntheticBackend {
    tracker: ResourceTracker,
    clips: HashMap<String, SyntheticClip>,
}

impl SyntheticBackend {
    pub fn new(tracker: ResourceTracker) -> Self {
        Self {
            tracker,
            clips: HashMap::new(),
        }
    }

    pub fn with_clip(mut self, name: impl Into<String>, clip: SyntheticClip) -> Self {
        self.clips.insert(name.into(), clip);
        self
    }

    fn lookup(&self, asset: &SourceAsset) -> PipelineResult<&SyntheticClip> {
        let clip = self.clips.get(asset.name()).ok_or_else(|| {
            PipelineError::load(format!("{}: unsupported or unknown media", asset.name()))
        })?;
        if clip.corrupt {
            return Err(PipelineError::load(format!(
                "{}: failed to decode container",
                asset.name()
            )));
        }
        Ok(clip)
    }
}

#[async_trait]
impl MediaBackend for SyntheticBackend {
    async fn probe(&self, asset: &SourceAsset) -> PipelineResult<MediaMetadata> {
        Ok(self.lookup(asset)?.metadata())
    }

    async fn open(&self, asset: &SourceAsset) -> PipelineResult<Box<dyn PlaybackPort>> {
        let clip = self.lookup(asset)?.clone();
        self.tracker.playbacks.fetch_add(1, Ordering::SeqCst);
        self.tracker.playbacks_opened.fetch_add(1, Ordering::SeqCst);
        debug!(asset = %asset.name(), "Synthetic playback opened");
        Ok(Box::new(SyntheticPlayback::new(clip, self.tracker.clone())))
    }
}

/// Playback session whose clock is the tokio clock scaled by the rate
pub struct SyntheticPlayback {
    metadata: MediaMetadata,
    clip: SyntheticClip,
    tracker: ResourceTracker,
    /// Media time at `anchor`, or the frozen position while paused
    base: f64,
    anchor: Option<Instant>,
    rate: f64,
    frame_ready: bool,
    frame_cache: Mutex<Option<VideoFrame>>,
    closed: bool,
}

impl SyntheticPlayback {
    fn new(clip: SyntheticClip, tracker: ResourceTracker) -> Self {
        Self {
            metadata: clip.metadata(),
            clip,
            tracker,
            base: 0.0,
            anchor: None,
            rate: 1.0,
            frame_ready: false,
            frame_cache: Mutex::new(None),
            closed: false,
        }
    }

    /// Instant at which the running clock reaches the end of media
    fn end_instant(&self) -> Option<Instant> {
        let anchor = self.anchor?;
        let remaining = (self.metadata.duration - self.base).max(0.0) / self.rate;
        Some(anchor + Duration::from_secs_f64(remaining))
    }

    fn at_end(&self) -> bool {
        match self.end_instant() {
            Some(end) => Instant::now() >= end,
            None => self.base >= self.metadata.duration,
        }
    }

    fn sequence_at(&self, time: f64) -> u64 {
        (time * self.clip.frame_rate).floor().max(0.0) as u64
    }

    fn render(&self, sequence: u64, time: f64) -> VideoFrame {
        let (w, h) = (self.metadata.width, self.metadata.height);
        let shade = (sequence % 256) as u8;
        let mut rgba = Vec::with_capacity(w as usize * h as usize * 4);
        for y in 0..h {
            let row = (y % 256) as u8;
            for _ in 0..w {
                rgba.extend_from_slice(&[shade, row, 255 - shade, 255]);
            }
        }
        VideoFrame {
            width: w,
            height: h,
            sequence,
            time,
            rgba: Arc::new(rgba),
        }
    }
}

#[async_trait]
impl PlaybackPort for SyntheticPlayback {
    fn metadata(&self) -> &MediaMetadata {
        &self.metadata
    }

    async fn seek(&mut self, time: f64) -> PipelineResult<()> {
        if !time.is_finite() {
            return Err(PipelineError::range(format!("cannot seek to {}", time)));
        }
        if !self.clip.seek_latency.is_zero() {
            tokio::time::sleep(self.clip.seek_latency).await;
        }
        self.base = time.clamp(0.0, self.metadata.duration);
        if self.anchor.is_some() {
            self.anchor = Some(Instant::now());
        }
        self.frame_ready = true;
        Ok(())
    }

    fn set_rate(&mut self, rate: f64) -> PipelineResult<()> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(PipelineError::playback(format!(
                "unsupported playback rate {}",
                rate
            )));
        }
        if self.anchor.is_some() {
            self.base = self.current_time();
            self.anchor = Some(Instant::now());
        }
        self.rate = rate;
        Ok(())
    }

    async fn play(&mut self) -> PipelineResult<()> {
        if self.clip.refuse_play {
            return Err(PipelineError::playback(
                "play() request was denied by the environment",
            ));
        }
        if self.anchor.is_none() {
            self.anchor = Some(Instant::now());
        }
        self.frame_ready = true;
        Ok(())
    }

    fn pause(&mut self) {
        if self.anchor.is_some() {
            self.base = self.current_time();
            self.anchor = None;
        }
    }

    fn current_time(&self) -> f64 {
        match self.anchor {
            Some(_) if self.at_end() => self.metadata.duration,
            Some(anchor) => {
                let elapsed = Instant::now().duration_since(anchor).as_secs_f64();
                (self.base + elapsed * self.rate).min(self.metadata.duration)
            }
            None => self.base,
        }
    }

    fn state(&self) -> PlaybackState {
        if self.at_end() && self.frame_ready {
            PlaybackState::Ended
        } else if self.anchor.is_some() {
            PlaybackState::Playing
        } else {
            PlaybackState::Paused
        }
    }

    fn current_frame(&self) -> Option<VideoFrame> {
        if !self.frame_ready || self.closed {
            return None;
        }
        let time = self.current_time();
        let last = ((self.metadata.duration * self.clip.frame_rate).ceil() as u64).saturating_sub(1);
        let sequence = self.sequence_at(time).min(last);

        let mut cache = self
            .frame_cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match cache.as_ref() {
            Some(frame) if frame.sequence == sequence => Some(frame.clone()),
            _ => {
                let frame = self.render(sequence, sequence as f64 / self.clip.frame_rate);
                *cache = Some(frame.clone());
                Some(frame)
            }
        }
    }

    async fn ended(&mut self) {
        match self.end_instant() {
            Some(end) => tokio::time::sleep_until(end).await,
            None => std::future::pending::<()>().await,
        }
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.anchor = None;
        self.tracker.playbacks.fetch_sub(1, Ordering::SeqCst);
        debug!("Synthetic playback closed");
    }
}

/// What the synthetic encoder writes for each captured frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntheticFrameRecord {
    pub index: u64,
    pub pts_ms: i64,
    pub width: u32,
    pub height: u32,
    /// Decoded frame on the surface when it was captured
    pub painted_sequence: Option<u64>,
}

impl SyntheticFrameRecord {
    /// Parse an artifact produced by [`SyntheticEncoderFactory`]
    pub fn decode_all(bytes: &[u8]) -> serde_json::Result<Vec<Self>> {
        bytes
            .split(|b| *b == b'\n')
            .filter(|line| !line.is_empty())
            .map(serde_json::from_slice)
            .collect()
    }
}

/// Encoder factory with per-codec rejection and failure injection
#[derive(Debug, Clone)]
pub struct SyntheticEncoderFactory {
    tracker: ResourceTracker,
    rejected: HashSet<String>,
    frames_per_chunk: usize,
    fail_after: Option<u64>,
}

impl SyntheticEncoderFactory {
    pub fn new(tracker: ResourceTracker) -> Self {
        Self {
            tracker,
            rejected: HashSet::new(),
            frames_per_chunk: 10,
            fail_after: None,
        }
    }

    pub fn reject_codec(mut self, codec: impl Into<String>) -> Self {
        self.rejected.insert(codec.into());
        self
    }

    pub fn with_frames_per_chunk(mut self, frames: usize) -> Self {
        self.frames_per_chunk = frames.max(1);
        self
    }

    /// Report an encode failure after this many captured frames
    pub fn fail_after_frames(mut self, frames: u64) -> Self {
        self.fail_after = Some(frames);
        self
    }
}

#[async_trait]
impl EncoderFactory for SyntheticEncoderFactory {
    async fn create(
        &self,
        preference: &CodecPreference,
        settings: &EncoderSettings,
        surface: SharedSurface,
    ) -> PipelineResult<EncoderHandle> {
        if self.rejected.contains(&preference.codec) {
            return Err(PipelineError::encode(format!(
                "{} is not supported",
                preference.codec
            )));
        }
        if settings.capture_fps == 0 {
            return Err(PipelineError::encode("capture rate must be positive"));
        }

        let (events_tx, events) = mpsc::unbounded_channel();
        self.tracker.encoders.fetch_add(1, Ordering::SeqCst);
        let encoder = SyntheticEncoder {
            settings: settings.clone(),
            surface,
            events_tx,
            tracker: self.tracker.clone(),
            frames_per_chunk: self.frames_per_chunk,
            fail_after: self.fail_after,
            task: None,
            stop_tx: None,
            released: false,
        };
        Ok(EncoderHandle {
            encoder: Box::new(encoder),
            events,
        })
    }
}

struct SyntheticEncoder {
    settings: EncoderSettings,
    surface: SharedSurface,
    events_tx: mpsc::UnboundedSender<EncoderEvent>,
    tracker: ResourceTracker,
    frames_per_chunk: usize,
    fail_after: Option<u64>,
    task: Option<JoinHandle<()>>,
    stop_tx: Option<oneshot::Sender<()>>,
    released: bool,
}

#[async_trait]
impl StreamEncoder for SyntheticEncoder {
    fn start(&mut self) -> PipelineResult<()> {
        if self.task.is_some() || self.released {
            return Err(PipelineError::encode("encoder cannot be restarted"));
        }
        let (stop_tx, stop_rx) = oneshot::channel();
        self.stop_tx = Some(stop_tx);
        self.task = Some(tokio::spawn(capture_loop(
            Instant::now(),
            self.settings.clone(),
            self.surface.clone(),
            self.events_tx.clone(),
            self.frames_per_chunk,
            self.fail_after,
            stop_rx,
        )));
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(stop) = self.stop_tx.take() {
            let _ = stop.send(());
        }
    }

    fn is_recording(&self) -> bool {
        self.stop_tx.is_some()
    }

    async fn abort(&mut self) {
        self.stop_tx = None;
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if !self.released {
            self.released = true;
            self.tracker.encoders.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

async fn capture_loop(
    started: Instant,
    settings: EncoderSettings,
    surface: SharedSurface,
    events: mpsc::UnboundedSender<EncoderEvent>,
    frames_per_chunk: usize,
    fail_after: Option<u64>,
    mut stop: oneshot::Receiver<()>,
) {
    let period = Duration::from_secs_f64(1.0 / settings.capture_fps as f64);
    let mut ticker = tokio::time::interval_at(started, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut pending = Vec::new();
    let mut buffered = 0usize;
    let mut captured = 0u64;
    let mut next_slot = 0u64;

    loop {
        tokio::select! {
            biased;
            _ = &mut stop => break,
            _ = ticker.tick() => {
                // ticks missed while stalled keep their place on the timeline
                let elapsed = Instant::now().duration_since(started).as_secs_f64();
                let index = ((elapsed / period.as_secs_f64()).round() as u64).max(next_slot);
                next_slot = index + 1;
                let record = {
                    let guard = lock_surface(&surface);
                    SyntheticFrameRecord {
                        index,
                        pts_ms: settings.frame_pts_ms(index),
                        width: guard.size().width,
                        height: guard.size().height,
                        painted_sequence: guard.painted_sequence(),
                    }
                };
                if serde_json::to_writer(&mut pending, &record).is_err() {
                    let _ = events.send(EncoderEvent::Failed(PipelineError::encode("frame record serialization failed")));
                    return;
                }
                pending.push(b'\n');
                captured += 1;
                buffered += 1;

                if fail_after.is_some_and(|limit| captured >= limit) {
                    let _ = events.send(EncoderEvent::Failed(PipelineError::encode(
                        format!("synthetic encoder failed after {} frames", captured),
                    )));
                    return;
                }
                if buffered >= frames_per_chunk {
                    buffered = 0;
                    let _ = events.send(EncoderEvent::Chunk(std::mem::take(&mut pending)));
                }
            }
        }
    }

    if !pending.is_empty() {
        let _ = events.send(EncoderEvent::Chunk(pending));
    }
    let _ = events.send(EncoderEvent::Finalized);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::surface::CaptureSurface;

    fn asset() -> SourceAsset {
        SourceAsset::from_bytes("clip.mp4", vec![1u8; 16], None)
    }

    #[tokio::test(start_paused = true)]
    async fn test_playback_clock_follows_rate() {
        let tracker = ResourceTracker::new();
        let backend = SyntheticBackend::new(tracker.clone())
            .with_clip("clip.mp4", SyntheticClip::new(8, 8, 10.0));
        let mut playback = backend.open(&asset()).await.unwrap();
        assert_eq!(tracker.open_playbacks(), 1);

        playback.seek(2.0).await.unwrap();
        playback.set_rate(2.0).unwrap();
        playback.play().await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!((playback.current_time() - 4.0).abs() < 1e-6);
        assert_eq!(playback.state(), PlaybackState::Playing);

        playback.ended().await;
        assert_eq!(playback.state(), PlaybackState::Ended);
        assert_eq!(playback.current_time(), 10.0);

        playback.close().await;
        playback.close().await;
        assert_eq!(tracker.open_playbacks(), 0);
    }

    #[tokio::test]
    async fn test_unknown_and_corrupt_assets_fail_to_load() {
        let backend = SyntheticBackend::new(ResourceTracker::new())
            .with_clip("bad.mp4", SyntheticClip::new(8, 8, 1.0).corrupt());
        let unknown = backend.probe(&asset()).await.unwrap_err();
        assert!(matches!(unknown, PipelineError::Load { .. }));

        let bad = SourceAsset::from_bytes("bad.mp4", vec![0u8; 4], None);
        assert!(matches!(backend.open(&bad).await.err().unwrap(), PipelineError::Load { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_encoder_emits_records_then_finalizes() {
        let tracker = ResourceTracker::new();
        let factory = SyntheticEncoderFactory::new(tracker.clone()).with_frames_per_chunk(2);
        let size = SurfaceSize { width: 4, height: 4 };
        let settings = EncoderSettings {
            size,
            capture_fps: 10,
            bitrate: 1,
            time_scale: 2.0,
        };
        let surface = CaptureSurface::shared(size).unwrap();
        let preference = CodecPreference::default_preferences().remove(0);
        let EncoderHandle { mut encoder, mut events } =
            factory.create(&preference, &settings, surface).await.unwrap();

        encoder.start().unwrap();
        tokio::time::sleep(Duration::from_millis(450)).await;
        encoder.stop();

        let mut bytes = Vec::new();
        loop {
            match events.recv().await.unwrap() {
                EncoderEvent::Chunk(chunk) => bytes.extend(chunk),
                EncoderEvent::Finalized => break,
                EncoderEvent::Failed(e) => panic!("unexpected failure: {}", e),
            }
        }
        let records = SyntheticFrameRecord::decode_all(&bytes).unwrap();
        assert_eq!(records.len(), 5);
        assert_eq!(records[1].pts_ms, 200);
        assert!(records.iter().all(|r| r.painted_sequence.is_none()));

        encoder.abort().await;
        assert!(tracker.is_idle());
    }

    async fn collect(events: &mut mpsc::UnboundedReceiver<EncoderEvent>) -> Vec<u8> {
        let mut bytes = Vec::new();
        loop {
            match events.recv().await.unwrap() {
                EncoderEvent::Chunk(chunk) => bytes.extend(chunk),
                EncoderEvent::Finalized => return bytes,
                EncoderEvent::Failed(e) => panic!("unexpected failure: {}", e),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_capture_keeps_media_timeline() {
        let tracker = ResourceTracker::new();
        let factory = SyntheticEncoderFactory::new(tracker.clone());
        let size = SurfaceSize { width: 4, height: 4 };
        let settings = EncoderSettings {
            size,
            capture_fps: 10,
            bitrate: 1,
            time_scale: 1.0,
        };
        let surface = CaptureSurface::shared(size).unwrap();
        let preference = CodecPreference::default_preferences().remove(0);
        let EncoderHandle { mut encoder, mut events } =
            factory.create(&preference, &settings, surface).await.unwrap();

        encoder.start().unwrap();
        // the capture task gets no chance to run for a full second
        tokio::time::advance(Duration::from_secs(1)).await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        encoder.stop();

        let records = SyntheticFrameRecord::decode_all(&collect(&mut events).await).unwrap();
        assert!(records.len() < 20, "{} frames captured", records.len());
        assert!(records.windows(2).all(|w| w[0].pts_ms < w[1].pts_ms));
        let last = records.last().unwrap().pts_ms;
        assert!((1900..=2000).contains(&last), "last pts {}", last);

        encoder.abort().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_seek_past_end_shows_final_frame() {
        let tracker = ResourceTracker::new();
        let backend = SyntheticBackend::new(tracker.clone())
            .with_clip("clip.mp4", SyntheticClip::new(8, 8, 3.0).with_frame_rate(10.0));
        let mut playback = backend.open(&asset()).await.unwrap();

        playback.seek(7.5).await.unwrap();
        assert_eq!(playback.current_time(), 3.0);
        assert_eq!(playback.state(), PlaybackState::Ended);
        let frame = playback.current_frame().unwrap();
        assert_eq!(frame.sequence, 29);
        assert!((frame.time - 2.9).abs() < 1e-9);

        playback.seek(3.0).await.unwrap();
        assert_eq!(playback.current_frame().unwrap().sequence, 29);

        playback.close().await;
        assert!(tracker.is_idle());
    }
}
