// Playback LibAV adapter - Decode sessions backed by ffmpeg-next
//
// Each session runs a dedicated decode thread that owns the demuxer and
// decoder. The async side keeps the playback clock and tells the thread where
// the clock stands; the thread decodes up to it and publishes the visible
// frame through a watch channel.

use std::path::{Path, PathBuf};
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use async_trait::async_trait;
use ffmpeg_next::format::{self, Pixel};
use ffmpeg_next::media::Type as MediaType;
use ffmpeg_next::software::scaling::{Context as ScaleCtx, Flags as ScaleFlags};
use ffmpeg_next::util::frame::video::Video as RawFrame;
use ffmpeg_next::{codec, decoder, Packet, Rational};
use tempfile::NamedTempFile;
use tokio::sync::{oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::domain::errors::{PipelineError, PipelineResult};
use crate::domain::model::{AssetData, MediaMetadata, SourceAsset};
use crate::ports::{MediaBackend, PlaybackPort, PlaybackState, VideoFrame};

/// Longest the decode thread sleeps while playing before re-checking the clock
const MAX_IDLE: Duration = Duration::from_millis(10);

/// Media backend decoding with libavformat/libavcodec
#[derive(Debug, Clone, Default)]
pub struct LibavMediaBackend {
    threads: usize,
}

impl LibavMediaBackend {
    pub fn new() -> Self {
        Self {
            threads: num_cpus::get().clamp(1, 8),
        }
    }
}

#[async_trait]
impl MediaBackend for LibavMediaBackend {
    async fn probe(&self, asset: &SourceAsset) -> PipelineResult<MediaMetadata> {
        let asset = asset.clone();
        tokio::task::spawn_blocking(move || {
            let source = MaterializedAsset::new(&asset)?;
            let input = open_input(source.path())?;
            Ok(input.metadata)
        })
        .await
        .map_err(|e| PipelineError::load(format!("probe task failed: {}", e)))?
    }

    async fn open(&self, asset: &SourceAsset) -> PipelineResult<Box<dyn PlaybackPort>> {
        let (commands, command_rx) = std_mpsc::channel();
        let (frames_tx, frames) = watch::channel(None);
        let (ready_tx, ready_rx) = oneshot::channel();
        let asset_for_thread = asset.clone();
        let threads = self.threads;

        let thread = std::thread::Builder::new()
            .name(format!("reelcut-decode-{}", asset.name()))
            .spawn(move || {
                decode_thread(asset_for_thread, threads, command_rx, frames_tx, ready_tx)
            })?;

        let metadata = match ready_rx.await {
            Ok(Ok(metadata)) => metadata,
            Ok(Err(err)) => {
                let _ = thread.join();
                return Err(err);
            }
            Err(_) => {
                let _ = thread.join();
                return Err(PipelineError::load("decode thread exited during open"));
            }
        };
        info!(
            asset = %asset.name(),
            width = metadata.width,
            height = metadata.height,
            duration = metadata.duration,
            "Decode session opened"
        );

        Ok(Box::new(LibavPlayback {
            metadata,
            commands,
            frames,
            thread: Some(thread),
            clock: Clock::default(),
        }))
    }
}

/// Playback clock: `base + elapsed × rate` while running
#[derive(Debug, Clone, Copy)]
struct Clock {
    base: f64,
    anchor: Option<Instant>,
    rate: f64,
}

impl Default for Clock {
    fn default() -> Self {
        Self {
            base: 0.0,
            anchor: None,
            rate: 1.0,
        }
    }
}

impl Clock {
    fn now(&self, duration: f64) -> f64 {
        match self.anchor {
            Some(anchor) => (self.base + anchor.elapsed().as_secs_f64() * self.rate).min(duration),
            None => self.base.min(duration),
        }
    }

    fn end_instant(&self, duration: f64) -> Option<Instant> {
        let anchor = self.anchor?;
        let remaining = (duration - self.base).max(0.0) / self.rate;
        Some(anchor + Duration::from_secs_f64(remaining))
    }
}

enum DecodeCommand {
    Seek {
        time: f64,
        reply: oneshot::Sender<PipelineResult<()>>,
    },
    Run {
        base: f64,
        anchor: std::time::Instant,
        rate: f64,
    },
    Hold,
    Close,
}

/// Playback session handle held by the coordinator
pub struct LibavPlayback {
    metadata: MediaMetadata,
    commands: std_mpsc::Sender<DecodeCommand>,
    frames: watch::Receiver<Option<VideoFrame>>,
    thread: Option<JoinHandle<()>>,
    clock: Clock,
}

impl LibavPlayback {
    fn send(&self, command: DecodeCommand) -> PipelineResult<()> {
        self.commands
            .send(command)
            .map_err(|_| PipelineError::playback("decode thread is gone"))
    }

    fn publish_clock(&self) -> PipelineResult<()> {
        match self.clock.anchor {
            Some(anchor) => self.send(DecodeCommand::Run {
                base: self.clock.base,
                anchor: anchor.into_std(),
                rate: self.clock.rate,
            }),
            None => self.send(DecodeCommand::Hold),
        }
    }
}

#[async_trait]
impl PlaybackPort for LibavPlayback {
    fn metadata(&self) -> &MediaMetadata {
        &self.metadata
    }

    async fn seek(&mut self, time: f64) -> PipelineResult<()> {
        let time = time.clamp(0.0, self.metadata.duration);
        let (reply, done) = oneshot::channel();
        self.send(DecodeCommand::Seek { time, reply })?;
        done.await
            .map_err(|_| PipelineError::load("decode thread exited during seek"))??;

        self.clock.base = time;
        if self.clock.anchor.is_some() {
            self.clock.anchor = Some(Instant::now());
        }
        self.publish_clock()
    }

    fn set_rate(&mut self, rate: f64) -> PipelineResult<()> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(PipelineError::playback(format!(
                "unsupported playback rate {}",
                rate
            )));
        }
        if self.clock.anchor.is_some() {
            self.clock.base = self.clock.now(self.metadata.duration);
            self.clock.anchor = Some(Instant::now());
        }
        self.clock.rate = rate;
        self.publish_clock()
    }

    async fn play(&mut self) -> PipelineResult<()> {
        if self.clock.anchor.is_none() {
            self.clock.anchor = Some(Instant::now());
        }
        self.publish_clock()
    }

    fn pause(&mut self) {
        if self.clock.anchor.is_some() {
            self.clock.base = self.clock.now(self.metadata.duration);
            self.clock.anchor = None;
            if self.publish_clock().is_err() {
                debug!("Pause after decode thread exit");
            }
        }
    }

    fn current_time(&self) -> f64 {
        self.clock.now(self.metadata.duration)
    }

    fn state(&self) -> PlaybackState {
        if self.current_time() >= self.metadata.duration {
            PlaybackState::Ended
        } else if self.clock.anchor.is_some() {
            PlaybackState::Playing
        } else {
            PlaybackState::Paused
        }
    }

    fn current_frame(&self) -> Option<VideoFrame> {
        self.frames.borrow().clone()
    }

    async fn ended(&mut self) {
        match self.clock.end_instant(self.metadata.duration) {
            Some(end) => tokio::time::sleep_until(end).await,
            None => std::future::pending::<()>().await,
        }
    }

    async fn close(&mut self) {
        let _ = self.commands.send(DecodeCommand::Close);
        if let Some(thread) = self.thread.take() {
            let joined = tokio::task::spawn_blocking(move || thread.join()).await;
            if !matches!(joined, Ok(Ok(()))) {
                warn!("Decode thread did not shut down cleanly");
            }
            debug!("Decode session closed");
        }
    }
}

/// An asset addressable by path; in-memory bytes are spilled to a temp file
/// that lives as long as this value
struct MaterializedAsset {
    path: PathBuf,
    _spill: Option<NamedTempFile>,
}

impl MaterializedAsset {
    fn new(asset: &SourceAsset) -> PipelineResult<Self> {
        match asset.data() {
            AssetData::File(path) => Ok(Self {
                path: path.clone(),
                _spill: None,
            }),
            AssetData::Memory(bytes) => {
                use std::io::Write;

                let suffix = Path::new(asset.name())
                    .extension()
                    .map(|e| format!(".{}", e.to_string_lossy()))
                    .unwrap_or_default();
                let mut spill = tempfile::Builder::new()
                    .prefix("reelcut-src-")
                    .suffix(&suffix)
                    .tempfile()?;
                spill.write_all(bytes)?;
                spill.flush()?;
                Ok(Self {
                    path: spill.path().to_path_buf(),
                    _spill: Some(spill),
                })
            }
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

/// Opened demuxer plus the metadata of its best video stream
struct OpenedInput {
    input: format::context::Input,
    stream_index: usize,
    time_base: Rational,
    metadata: MediaMetadata,
}

fn open_input(path: &Path) -> PipelineResult<OpenedInput> {
    let input = format::input(&path)
        .map_err(|e| PipelineError::load(format!("cannot open {}: {}", path.display(), e)))?;

    let stream = input
        .streams()
        .best(MediaType::Video)
        .ok_or_else(|| PipelineError::load("no video stream found"))?;
    let stream_index = stream.index();
    let time_base = stream.time_base();

    let params = codec::context::Context::from_parameters(stream.parameters())
        .map_err(|e| PipelineError::load(format!("unsupported codec parameters: {}", e)))?;
    let video = params
        .decoder()
        .video()
        .map_err(|e| PipelineError::load(format!("no decoder for video stream: {}", e)))?;

    let container_duration = input.duration();
    let duration = if container_duration > 0 {
        container_duration as f64 / f64::from(ffmpeg_next::ffi::AV_TIME_BASE)
    } else if stream.duration() > 0 {
        stream.duration() as f64 * f64::from(time_base)
    } else {
        return Err(PipelineError::load("media duration is unknown"));
    };

    let rate = stream.avg_frame_rate();
    let frame_rate = if rate.denominator() != 0 && rate.numerator() > 0 {
        f64::from(rate)
    } else {
        0.0
    };

    let metadata = MediaMetadata {
        width: video.width(),
        height: video.height(),
        duration,
        frame_rate,
    };
    Ok(OpenedInput {
        input,
        stream_index,
        time_base,
        metadata,
    })
}

/// Demux/decode state owned by the decode thread
struct Decoder {
    input: format::context::Input,
    decoder: decoder::Video,
    stream_index: usize,
    time_base: Rational,
    scaler: Option<ScaleCtx>,
    input_eof: bool,
    /// Decoded frame whose time is still ahead of the clock
    pending: Option<(f64, RawFrame)>,
    sequence: u64,
}

impl Decoder {
    fn new(opened: OpenedInput, threads: usize) -> PipelineResult<Self> {
        let stream = opened
            .input
            .stream(opened.stream_index)
            .ok_or_else(|| PipelineError::load("video stream disappeared"))?;
        let mut context = codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| PipelineError::load(e.to_string()))?;
        context.set_threading(codec::threading::Config {
            kind: codec::threading::Type::Frame,
            count: threads,
            ..Default::default()
        });
        let decoder = context
            .decoder()
            .video()
            .map_err(|e| PipelineError::load(format!("cannot open decoder: {}", e)))?;

        Ok(Self {
            input: opened.input,
            decoder,
            stream_index: opened.stream_index,
            time_base: opened.time_base,
            scaler: None,
            input_eof: false,
            pending: None,
            sequence: 0,
        })
    }

    /// Next decoded frame and its time in seconds, `None` at end of stream
    fn next_frame(&mut self) -> PipelineResult<Option<(f64, RawFrame)>> {
        if let Some(pending) = self.pending.take() {
            return Ok(Some(pending));
        }
        let mut frame = RawFrame::empty();
        loop {
            if self.decoder.receive_frame(&mut frame).is_ok() {
                let ts = frame.timestamp().or_else(|| frame.pts()).unwrap_or(0);
                let time = ts as f64 * f64::from(self.time_base);
                return Ok(Some((time, frame)));
            }
            if self.input_eof {
                return Ok(None);
            }

            let mut packet = Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) => {
                    if packet.stream() == self.stream_index {
                        self.decoder
                            .send_packet(&packet)
                            .map_err(|e| PipelineError::load(format!("decode failed: {}", e)))?;
                    }
                }
                Err(ffmpeg_next::Error::Eof) => {
                    let _ = self.decoder.send_eof();
                    self.input_eof = true;
                }
                Err(e) => return Err(PipelineError::load(format!("demux failed: {}", e))),
            }
        }
    }

    /// Decode forward and return the last frame at or before `time`
    fn advance_to(&mut self, time: f64) -> PipelineResult<Option<(f64, RawFrame)>> {
        let mut visible = None;
        while let Some((frame_time, frame)) = self.next_frame()? {
            if frame_time > time && visible.is_some() {
                self.pending = Some((frame_time, frame));
                break;
            }
            visible = Some((frame_time, frame));
            if frame_time > time {
                break;
            }
        }
        Ok(visible)
    }

    fn seek(&mut self, time: f64) -> PipelineResult<Option<(f64, RawFrame)>> {
        let ts = (time * f64::from(ffmpeg_next::ffi::AV_TIME_BASE)) as i64;
        self.input
            .seek(ts, ..=ts)
            .map_err(|e| PipelineError::load(format!("seek to {:.3}s failed: {}", time, e)))?;
        self.decoder.flush();
        self.pending = None;
        self.input_eof = false;
        self.advance_to(time)
    }

    /// Time of the next frame without consuming it
    fn peek_time(&mut self) -> PipelineResult<Option<f64>> {
        if self.pending.is_none() {
            self.pending = self.next_frame()?;
        }
        Ok(self.pending.as_ref().map(|(t, _)| *t))
    }

    fn to_rgba(&mut self, time: f64, frame: &RawFrame) -> PipelineResult<VideoFrame> {
        let (width, height) = (frame.width(), frame.height());
        let rebuild = match &self.scaler {
            Some(scaler) => {
                scaler.input().width != width
                    || scaler.input().height != height
                    || scaler.input().format != frame.format()
            }
            None => true,
        };
        if rebuild {
            self.scaler = Some(
                ScaleCtx::get(
                    frame.format(),
                    width,
                    height,
                    Pixel::RGBA,
                    width,
                    height,
                    ScaleFlags::BILINEAR,
                )
                .map_err(|e| PipelineError::load(format!("cannot convert frames: {}", e)))?,
            );
        }
        let scaler = self
            .scaler
            .as_mut()
            .ok_or_else(|| PipelineError::load("scaler unavailable"))?;

        let mut rgba = RawFrame::empty();
        scaler
            .run(frame, &mut rgba)
            .map_err(|e| PipelineError::load(format!("frame conversion failed: {}", e)))?;

        let stride = rgba.stride(0);
        let row_bytes = width as usize * 4;
        let data = rgba.data(0);
        let mut pixels = Vec::with_capacity(row_bytes * height as usize);
        for row in 0..height as usize {
            let start = row * stride;
            pixels.extend_from_slice(&data[start..start + row_bytes]);
        }

        self.sequence += 1;
        Ok(VideoFrame {
            width,
            height,
            sequence: self.sequence,
            time,
            rgba: Arc::new(pixels),
        })
    }
}

/// Where the decode thread believes the playback clock is
enum ThreadClock {
    Held,
    Running {
        base: f64,
        anchor: std::time::Instant,
        rate: f64,
    },
}

impl ThreadClock {
    fn now(&self) -> Option<f64> {
        match self {
            ThreadClock::Held => None,
            ThreadClock::Running { base, anchor, rate } => {
                Some(base + anchor.elapsed().as_secs_f64() * rate)
            }
        }
    }
}

fn decode_thread(
    asset: SourceAsset,
    threads: usize,
    commands: std_mpsc::Receiver<DecodeCommand>,
    frames: watch::Sender<Option<VideoFrame>>,
    ready: oneshot::Sender<PipelineResult<MediaMetadata>>,
) {
    // keeps a spilled copy alive until the thread exits
    let source = match MaterializedAsset::new(&asset) {
        Ok(source) => source,
        Err(err) => {
            let _ = ready.send(Err(err));
            return;
        }
    };
    let mut state = match open_input(source.path()).and_then(|opened| {
        let metadata = opened.metadata.clone();
        Decoder::new(opened, threads).map(|d| (d, metadata))
    }) {
        Ok((decoder, metadata)) => {
            if ready.send(Ok(metadata)).is_err() {
                return;
            }
            decoder
        }
        Err(err) => {
            let _ = ready.send(Err(err));
            return;
        }
    };

    let mut clock = ThreadClock::Held;
    loop {
        let command = match clock.now() {
            None => match commands.recv() {
                Ok(command) => Some(command),
                Err(_) => break,
            },
            Some(now) => {
                let wait = match publish_due_frames(&mut state, &frames, now, &clock) {
                    Ok(wait) => wait,
                    Err(err) => {
                        warn!(error = %err, "Decoding stopped");
                        clock = ThreadClock::Held;
                        continue;
                    }
                };
                match commands.recv_timeout(wait) {
                    Ok(command) => Some(command),
                    Err(std_mpsc::RecvTimeoutError::Timeout) => None,
                    Err(std_mpsc::RecvTimeoutError::Disconnected) => break,
                }
            }
        };

        match command {
            None => {}
            Some(DecodeCommand::Seek { time, reply }) => {
                let result = state.seek(time).and_then(|visible| match visible {
                    Some((t, frame)) => {
                        let converted = state.to_rgba(t, &frame)?;
                        let _ = frames.send(Some(converted));
                        Ok(())
                    }
                    None => Ok(()),
                });
                let _ = reply.send(result);
            }
            Some(DecodeCommand::Run { base, anchor, rate }) => {
                clock = ThreadClock::Running { base, anchor, rate };
            }
            Some(DecodeCommand::Hold) => clock = ThreadClock::Held,
            Some(DecodeCommand::Close) => break,
        }
    }
    debug!(asset = %asset.name(), "Decode thread exiting");
}

/// Publish the frame visible at `now`; returns how long to wait for the next one
fn publish_due_frames(
    state: &mut Decoder,
    frames: &watch::Sender<Option<VideoFrame>>,
    now: f64,
    clock: &ThreadClock,
) -> PipelineResult<Duration> {
    if let Some((time, frame)) = state.advance_to(now)? {
        if time <= now || frames.borrow().is_none() {
            let converted = state.to_rgba(time, &frame)?;
            frames.send_replace(Some(converted));
        } else {
            state.pending = Some((time, frame));
        }
    }

    let rate = match clock {
        ThreadClock::Running { rate, .. } => *rate,
        ThreadClock::Held => 1.0,
    };
    Ok(match state.peek_time()? {
        Some(next) if next > now => {
            Duration::from_secs_f64(((next - now) / rate).max(0.0)).min(MAX_IDLE)
        }
        Some(_) => Duration::ZERO,
        None => MAX_IDLE,
    })
}
